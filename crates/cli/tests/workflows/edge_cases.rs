//! Failures and unusual inputs

use crate::common::TestProject;
use crate::lh;
use anyhow::Result;

#[test]
fn test_commands_outside_repository_fail() -> Result<()> {
    let project = TestProject::new()?;
    let result = lh!(project.root(), "status").assert_failure()?;
    assert!(result.contains_stderr("Not a local history repository"));
    Ok(())
}

#[test]
fn test_init_twice_fails() -> Result<()> {
    let project = TestProject::new()?;
    lh!(project.root(), "init").assert_success()?;
    let result = lh!(project.root(), "init").assert_failure()?;
    assert!(result.contains_stderr("already initialized"));
    Ok(())
}

#[test]
fn test_unknown_label_fails() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("a.txt", "a")?;
    lh!(dir, "snapshot").assert_success()?;

    let result = lh!(dir, "show", "a.txt", "--label", "nope").assert_failure()?;
    assert!(result.contains_stderr("Label not found: nope"));
    Ok(())
}

#[test]
fn test_unknown_revision_fails() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("a.txt", "a")?;
    lh!(dir, "snapshot").assert_success()?;

    let result = lh!(dir, "show", "a.txt", "--at", "999").assert_failure()?;
    assert!(result.contains_stderr("No revision 999"));
    Ok(())
}

#[test]
fn test_ignored_files_stay_out_of_history() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write(".lhignore", "*.tmp\n")?;
    project.write("scratch.tmp", "junk")?;
    project.write("real.txt", "data")?;

    let result = lh!(dir, "snapshot").assert_success()?;
    assert!(result.contains_stdout("proj/real.txt"));
    assert!(!result.contains_stdout("scratch.tmp"));
    assert!(!result.contains_stdout(".lh/"));

    lh!(dir, "history", "scratch.tmp").assert_failure()?;
    Ok(())
}

#[test]
fn test_label_on_unknown_path_fails() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    let result = lh!(dir, "label", "x", "--path", "missing").assert_failure()?;
    assert!(result.contains_stderr("not in history yet"));
    Ok(())
}
