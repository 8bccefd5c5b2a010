//! Recording snapshots and reading revisions back

use crate::common::TestProject;
use crate::lh;
use anyhow::Result;

#[test]
fn test_snapshot_then_history_and_show() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;

    project.write("a.txt", "one")?;
    let first = lh!(dir, "snapshot", "-m", "first").assert_success()?;
    assert!(first.contains_stdout("Recorded"));
    assert!(first.contains_stdout("proj/a.txt"));

    project.write("a.txt", "one two")?;
    lh!(dir, "snapshot", "-m", "second").assert_success()?;

    let history = lh!(dir, "history", "a.txt").assert_success()?;
    assert!(history.contains_stdout("proj/a.txt"));
    assert!(history.contains_stdout("first"));
    assert!(history.contains_stdout("second"));

    let current = lh!(dir, "show", "a.txt").assert_success()?;
    assert_eq!(current.stdout, "one two");

    // First set holds two changes, so its id is 3
    let old = lh!(dir, "show", "a.txt", "--at", "3").assert_success()?;
    assert_eq!(old.stdout, "one");
    Ok(())
}

#[test]
fn test_unchanged_tree_records_nothing() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("src/lib.rs", "pub fn f() {}")?;

    lh!(dir, "snapshot").assert_success()?;
    let again = lh!(dir, "snapshot").assert_success()?;
    assert!(again.contains_stdout("Nothing changed"));

    let status = lh!(dir, "status").assert_success()?;
    assert!(status.contains_stdout("History Status"));
    assert!(status.contains_stdout("Change sets: 1"));
    Ok(())
}

#[test]
fn test_deleted_file_is_recorded() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("gone.txt", "bye")?;
    project.write("kept.txt", "hi")?;
    lh!(dir, "snapshot", "-m", "before").assert_success()?;

    project.remove("gone.txt")?;
    let result = lh!(dir, "snapshot", "-m", "after").assert_success()?;
    assert!(result.contains_stdout("- proj/gone.txt"));
    assert!(result.contains_stdout("0 created, 0 modified, 1 deleted"));

    let log = lh!(dir, "log", "--recent").assert_success()?;
    assert!(log.contains_stdout("after"));
    assert!(log.contains_stdout("- proj/gone.txt"));
    Ok(())
}

#[test]
fn test_history_from_subdirectory() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("src/main.rs", "fn main() {}")?;
    lh!(dir, "snapshot").assert_success()?;

    let history = lh!(dir.join("src"), "history", "main.rs").assert_success()?;
    assert!(history.contains_stdout("proj/src/main.rs"));
    Ok(())
}
