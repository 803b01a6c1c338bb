use crate::config::{load_project_config, ProjectConfig};
use crate::rounds::RoundName;
use crate::shared::serde_ext::parse_flexible_bool;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// `--flag value` pairs and bare `--switch` flags for one command. Value
/// flags may repeat; `value` returns the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: BTreeMap<String, Vec<String>>,
    switches: BTreeSet<String>,
}

impl CommandArgs {
    pub fn parse(
        args: &[String],
        value_flags: &[&str],
        switch_flags: &[&str],
    ) -> Result<Self, String> {
        let mut parsed = Self::default();
        let mut i = 0usize;
        while i < args.len() {
            let raw = args[i].as_str();
            let Some(name) = raw.strip_prefix("--") else {
                return Err(format!("unexpected argument `{raw}`"));
            };
            if switch_flags.contains(&name) {
                parsed.switches.insert(name.to_string());
                i += 1;
                continue;
            }
            if !value_flags.contains(&name) {
                return Err(format!("unknown flag `{raw}`"));
            }
            let Some(value) = args.get(i + 1) else {
                return Err(format!("{raw} requires a value"));
            };
            parsed
                .values
                .entry(name.to_string())
                .or_default()
                .push(value.clone());
            i += 2;
        }
        Ok(parsed)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn required(&self, name: &str) -> Result<&str, String> {
        self.value(name)
            .ok_or_else(|| format!("missing required flag --{name}"))
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.value(name).map(PathBuf::from)
    }

    pub fn parsed<T>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.value(name)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| format!("invalid value for --{name}: {e}"))
            })
            .transpose()
    }

    pub fn flexible_bool(&self, name: &str) -> Result<Option<bool>, String> {
        self.value(name)
            .map(|raw| parse_flexible_bool(raw).map_err(|e| format!("invalid value for --{name}: {e}")))
            .transpose()
    }

    pub fn round(&self, name: &str) -> Result<Option<RoundName>, String> {
        self.value(name)
            .map(|raw| RoundName::parse(raw).map_err(|e| format!("invalid value for --{name}: {e}")))
            .transpose()
    }

    pub fn project_root(&self) -> Result<PathBuf, String> {
        self.required("project-root").map(PathBuf::from)
    }
}

pub fn load_project(args: &CommandArgs) -> Result<ProjectConfig, String> {
    load_project_config(&args.project_root()?).map_err(map_err)
}

pub fn map_err(err: impl Display) -> String {
    err.to_string()
}

pub fn to_json_output<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode output: {e}"))
}
