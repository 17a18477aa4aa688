use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_tool(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_media-date-fill"))
        .args(args)
        .current_dir(cwd)
        .env_remove("MEDIA_DATE_FILL_LOG_LEVEL")
        .output()
        .expect("run media-date-fill")
}

#[test]
fn media_dir_that_is_a_file_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("photo.jpg");
    fs::write(&file, b"x").unwrap();

    let output = run_tool(&["-m", file.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}

#[test]
fn missing_media_dir_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere");

    let output = run_tool(&["-m", missing.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn bad_flag_exits_with_usage_code() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(&["-m", ".", "--verbosity", "LOUD"], dir.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn dry_run_logs_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    fs::create_dir_all(&media).unwrap();
    fs::write(media.join("clip.mov"), b"moov").unwrap();

    let output = run_tool(&["-m", media.to_str().unwrap(), "-v", "info"], dir.path());
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("clip.mov: skipped, unsupported format"), "{}", stderr);
    assert!(stderr.contains("Dry run complete"), "{}", stderr);
}
