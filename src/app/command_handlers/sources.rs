use crate::app::command_support::{map_err, to_json_output, CommandArgs};
use crate::snapshot::{create_snapshot, verify_snapshot_hashes, SnapshotRequest};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn cmd_snapshot_sources(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &["project-root", "source", "lecture", "snapshot-id"],
        &[],
    )?;

    let mut lecture_mapping = BTreeMap::new();
    for raw in args.values("lecture") {
        let (source, lecture) = raw
            .split_once('=')
            .ok_or_else(|| "--lecture requires <source>=<lecture>".to_string())?;
        lecture_mapping.insert(PathBuf::from(source), lecture.to_string());
    }

    let request = SnapshotRequest {
        project_root: args.project_root()?,
        sources: args.values("source").iter().map(PathBuf::from).collect(),
        lecture_mapping,
        snapshot_id: args.value("snapshot-id").map(str::to_string),
    };
    let result = create_snapshot(&request).map_err(map_err)?;
    to_json_output(&result)
}

pub fn cmd_verify_snapshot(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["project-root"], &[])?;
    let result = verify_snapshot_hashes(&args.project_root()?);
    to_json_output(&result)
}
