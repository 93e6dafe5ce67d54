//! External process adapter
//!
//! Commands are typed argument vectors handed straight to the OS; nothing is
//! interpreted by a shell.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use watchshot_common::TargetVariant;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Arguments as lossy strings, handy for matching in logs and fakes
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Exit code zero and nothing written to stderr
    pub fn succeeded(&self) -> bool {
        self.status == Some(0) && self.stderr.trim().is_empty()
    }
}

/// Runs external commands to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine) -> E2eResult<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> E2eResult<CommandOutput> {
        info!("{}", command);

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| E2eError::Process {
                command: command.to_string(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        };
        debug!("`{}` exited with {:?}", command.program, result.status);
        Ok(result)
    }
}

/// Command lines of the watch SDK tool
#[derive(Debug, Clone)]
pub struct SdkCli {
    binary: String,
}

impl SdkCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn build(&self) -> CommandLine {
        CommandLine::new(&self.binary).arg("build")
    }

    pub fn kill(&self) -> CommandLine {
        CommandLine::new(&self.binary).arg("kill")
    }

    pub fn clean(&self) -> CommandLine {
        CommandLine::new(&self.binary).arg("clean")
    }

    pub fn install(&self, variant: TargetVariant) -> CommandLine {
        CommandLine::new(&self.binary)
            .arg("install")
            .arg("--emulator")
            .arg(variant.as_str())
    }

    pub fn screenshot(&self, variant: TargetVariant, path: &Path) -> CommandLine {
        CommandLine::new(&self.binary)
            .arg("screenshot")
            .arg("--emulator")
            .arg(variant.as_str())
            .arg("--no-open")
            .arg(path.as_os_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_command_keeps_path_whole() {
        let sdk = SdkCli::new("pebble");
        let cmd = sdk.screenshot(TargetVariant::Basalt, Path::new("out dir/img/Case-basalt.png"));

        assert_eq!(
            cmd.args_lossy(),
            vec!["screenshot", "--emulator", "basalt", "--no-open", "out dir/img/Case-basalt.png"]
        );
        assert_eq!(
            cmd.to_string(),
            "pebble screenshot --emulator basalt --no-open out dir/img/Case-basalt.png"
        );
    }

    #[test]
    fn test_output_success() {
        let ok = CommandOutput { status: Some(0), ..Default::default() };
        assert!(ok.succeeded());

        let noisy = CommandOutput {
            status: Some(0),
            stderr: "warning: stale build".to_string(),
            ..Default::default()
        };
        assert!(!noisy.succeeded());
    }

    #[tokio::test]
    async fn test_system_runner_captures_streams() {
        let cmd = CommandLine::new("sh").arg("-c").arg("echo out; echo err >&2");
        let output = SystemRunner.run(&cmd).await.unwrap();

        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.status, Some(0));
    }

    #[tokio::test]
    async fn test_system_runner_missing_binary() {
        let cmd = CommandLine::new("watchshot-no-such-binary");
        let err = SystemRunner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, E2eError::Process { .. }));
    }
}
