use crate::rounds::RoundName;
use crate::shared::clock::now_rfc3339;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    FailedRecoverable,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::FailedRecoverable => "failed_recoverable",
        }
    }
}

/// Per-project session document, overwritten on every workflow-level
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub current_run_id: Option<String>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
    #[serde(default = "now_rfc3339")]
    pub updated_at: String,
}

impl SessionState {
    pub fn new(course_id: Option<String>) -> Self {
        let now = now_rfc3339();
        Self {
            course_id,
            status: SessionStatus::Idle,
            current_run_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn transition(&mut self, status: SessionStatus, current_run_id: Option<String>) {
        self.status = status;
        self.current_run_id = current_run_id;
        self.updated_at = now_rfc3339();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
}

impl RoundStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }
}

/// `{round_name -> status}` with every round present. Unknown keys and
/// unrecognized statuses in a stored document are ignored and read back as
/// `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStatusMap {
    statuses: BTreeMap<RoundName, RoundStatus>,
}

impl Default for RoundStatusMap {
    fn default() -> Self {
        Self {
            statuses: RoundName::ALL
                .iter()
                .map(|round| (*round, RoundStatus::Pending))
                .collect(),
        }
    }
}

impl RoundStatusMap {
    pub fn get(&self, round: RoundName) -> RoundStatus {
        self.statuses.get(&round).copied().unwrap_or_default()
    }

    pub fn set(&mut self, round: RoundName, status: RoundStatus) {
        self.statuses.insert(round, status);
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoundName, RoundStatus)> + '_ {
        RoundName::ALL.iter().map(|round| (*round, self.get(*round)))
    }
}

impl Serialize for RoundStatusMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RoundName::ALL.len()))?;
        for (round, status) in self.iter() {
            map.serialize_entry(round.as_str(), status.as_str())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoundStatusMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RoundStatusVisitor;

        impl<'de> Visitor<'de> for RoundStatusVisitor {
            type Value = RoundStatusMap;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a mapping of round name to status")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = RoundStatusMap::default();
                while let Some((key, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let Ok(round) = RoundName::parse(&key) else {
                        continue;
                    };
                    if let Some(status) = value.as_str().and_then(RoundStatus::parse) {
                        map.set(round, status);
                    }
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(RoundStatusVisitor)
    }
}
