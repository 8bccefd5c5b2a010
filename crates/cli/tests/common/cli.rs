//! Running the `lh` binary from tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One invocation of `lh` in a working directory
pub struct LhCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl LhCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(env!("CARGO_BIN_EXE_lh"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env("LH_LOG", "warn")
            .output()
            .with_context(|| format!("Failed to run lh {:?}", self.args))?;
        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Run and fail the test unless `lh` exits with 0
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        anyhow::ensure!(
            result.success(),
            "lh {:?} exited with {}\nstdout: {}\nstderr: {}",
            self.args,
            result.exit_code,
            result.stdout,
            result.stderr
        );
        Ok(result)
    }

    /// Run and fail the test if `lh` succeeds
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        anyhow::ensure!(
            !result.success(),
            "lh {:?} should have failed\nstdout: {}",
            self.args,
            result.stdout
        );
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Build an `lh` command: `lh!(dir, "show", "a.txt").assert_success()?`
#[macro_export]
macro_rules! lh {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::LhCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
