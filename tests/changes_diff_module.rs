use notes_agent::changes::{capture_state, write_diff_artifacts, DiffSummary};
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn diff_artifacts_cover_added_modified_and_deleted_files() {
    let dir = tempdir().expect("tempdir");
    let notes = dir.path().join("notes");
    let lectures = notes.join("notes/lectures");
    fs::create_dir_all(&lectures).expect("lectures");
    fs::write(lectures.join("a.md"), "line1\nline2\n").expect("write a");
    fs::write(lectures.join("b.md"), "old-b\n").expect("write b");

    let before = capture_state(&notes).expect("before");

    fs::write(lectures.join("a.md"), "line1\nline2-mod\n").expect("modify a");
    fs::remove_file(lectures.join("b.md")).expect("delete b");
    fs::write(lectures.join("c.md"), "new-c\n").expect("write c");

    let after = capture_state(&notes).expect("after");
    let run_dir = dir.path().join("run");
    let summary = write_diff_artifacts(&notes, &before, &after, &run_dir).expect("diff");

    assert_eq!(summary.changed_files, 3);
    assert_eq!(
        summary.changed_rel_paths,
        vec![
            "notes/lectures/a.md".to_string(),
            "notes/lectures/b.md".to_string(),
            "notes/lectures/c.md".to_string(),
        ]
    );
    assert_eq!(summary.added_lines, 2);
    assert_eq!(summary.removed_lines, 2);
    assert_eq!(summary.changed_lines, 4);

    let patch = fs::read_to_string(&summary.patch_path).expect("patch");
    assert!(patch.contains("a/notes/lectures/a.md"));
    assert!(patch.contains("b/notes/lectures/a.md"));
    assert!(patch.contains("a/notes/lectures/b.md"));
    assert!(patch.contains("b/notes/lectures/c.md"));

    let snapshot = &summary.notes_snapshot_path;
    assert_eq!(
        fs::read_to_string(snapshot.join("notes/lectures/a.md")).expect("snapshot a"),
        "line1\nline2-mod\n"
    );
    assert!(snapshot.join("notes/lectures/c.md").exists());
    assert!(!snapshot.join("notes/lectures/b.md").exists());

    let deleted: Value = serde_json::from_slice(
        &fs::read(snapshot.join("deleted_files.json")).expect("deleted manifest"),
    )
    .expect("parse deleted");
    assert_eq!(deleted["deleted_files"][0], "notes/lectures/b.md");

    let stored: DiffSummary = serde_json::from_slice(
        &fs::read(run_dir.join("diff_summary.json")).expect("summary file"),
    )
    .expect("parse summary");
    assert_eq!(stored, summary);
}

#[test]
fn capture_state_ignores_symlink_to_outside() {
    let dir = tempdir().expect("tempdir");
    let notes = dir.path().join("notes");
    let lectures = notes.join("notes/lectures");
    fs::create_dir_all(&lectures).expect("lectures");
    let outside = dir.path().join("outside.txt");
    fs::write(&outside, "outside\n").expect("outside");
    fs::write(lectures.join("safe.md"), "safe\n").expect("safe");
    std::os::unix::fs::symlink(&outside, lectures.join("outside_link.md")).expect("symlink");
    std::os::unix::fs::symlink(dir.path(), notes.join("escape_dir")).expect("dir symlink");
    std::os::unix::fs::symlink(lectures.join("safe.md"), notes.join("inner_link.md"))
        .expect("inner symlink");

    let state = capture_state(&notes).expect("capture");
    assert!(state.contains_key("notes/lectures/safe.md"));
    assert!(!state.contains_key("notes/lectures/outside_link.md"));
    assert!(!state.keys().any(|key| key.starts_with("escape_dir")));
    assert_eq!(state.get("inner_link.md").map(String::as_str), Some("safe\n"));
}

#[test]
fn capture_state_of_missing_root_is_empty() {
    let dir = tempdir().expect("tempdir");
    let state = capture_state(&dir.path().join("absent")).expect("capture");
    assert!(state.is_empty());
}

#[test]
fn non_utf8_content_is_captured_lossily() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("bin.dat"), [0x66, 0xff, 0x6f]).expect("write");
    let state = capture_state(dir.path()).expect("capture");
    assert_eq!(state["bin.dat"], "f\u{fffd}o");
}
