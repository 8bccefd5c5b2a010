//! Labels, diffs against them and purging

use crate::common::TestProject;
use crate::lh;
use anyhow::Result;

#[test]
fn test_label_then_show_and_diff() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;

    project.write("notes.md", "draft\n")?;
    lh!(dir, "snapshot", "-m", "draft").assert_success()?;
    let labeled = lh!(dir, "label", "v1").assert_success()?;
    assert!(labeled.contains_stdout("v1"));

    project.write("notes.md", "final version\n")?;
    lh!(dir, "snapshot", "-m", "final").assert_success()?;

    let at_label = lh!(dir, "show", "notes.md", "--label", "v1").assert_success()?;
    assert_eq!(at_label.stdout, "draft\n");

    let diff = lh!(dir, "show", "notes.md", "--label", "v1", "--diff").assert_success()?;
    assert!(diff.contains_stdout("-draft"));
    assert!(diff.contains_stdout("+final version"));

    let log = lh!(dir, "log").assert_success()?;
    assert!(log.contains_stdout("[v1]"));
    Ok(())
}

#[test]
fn test_label_content_of_deleted_file() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("old.txt", "kept in history")?;
    lh!(dir, "snapshot").assert_success()?;
    lh!(dir, "label", "before-delete").assert_success()?;

    project.remove("old.txt")?;
    lh!(dir, "snapshot").assert_success()?;

    let shown = lh!(dir, "show", "old.txt", "--label", "before-delete").assert_success()?;
    assert_eq!(shown.stdout, "kept in history");
    Ok(())
}

#[test]
fn test_scoped_label_shows_in_status() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("a/b.txt", "x")?;
    lh!(dir, "snapshot").assert_success()?;

    lh!(dir, "label", "checkpoint", "--path", "a").assert_success()?;
    let status = lh!(dir, "status").assert_success()?;
    assert!(status.contains_stdout("checkpoint"));
    assert!(status.contains_stdout("(proj/a)"));
    Ok(())
}

#[test]
fn test_scoped_label_stays_out_of_sibling_history() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("a/x.txt", "x")?;
    project.write("b/y.txt", "y")?;
    lh!(dir, "snapshot").assert_success()?;
    lh!(dir, "label", "onlya", "--path", "a").assert_success()?;
    lh!(dir, "label", "everywhere").assert_success()?;

    let in_b = lh!(dir, "history", "b/y.txt").assert_success()?;
    assert!(!in_b.contains_stdout("onlya"));
    assert!(in_b.contains_stdout("[everywhere]"));

    let in_a = lh!(dir, "history", "a/x.txt").assert_success()?;
    assert!(in_a.contains_stdout("[onlya]"));
    let dir_a = lh!(dir, "history", "a").assert_success()?;
    assert!(dir_a.contains_stdout("[onlya]"));

    let shown = lh!(dir, "show", "a/x.txt", "--label", "onlya").assert_success()?;
    assert_eq!(shown.stdout, "x");
    let refused = lh!(dir, "show", "b/y.txt", "--label", "onlya").assert_failure()?;
    assert!(refused.contains_stderr("does not cover"));
    Ok(())
}

#[test]
fn test_purge_keeps_recent_history() -> Result<()> {
    let project = TestProject::new()?;
    let dir = project.root();
    lh!(dir, "init").assert_success()?;
    project.write("a.txt", "a")?;
    lh!(dir, "snapshot").assert_success()?;

    let purge = lh!(dir, "purge", "--days", "1").assert_success()?;
    assert!(purge.contains_stdout("Purge complete"));
    assert!(purge.contains_stdout("Change sets removed:  0"));
    assert!(purge.contains_stdout("Change sets kept:     1"));

    let shown = lh!(dir, "show", "a.txt").assert_success()?;
    assert_eq!(shown.stdout, "a");
    Ok(())
}
