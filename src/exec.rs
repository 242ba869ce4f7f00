// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command execution.
//!
//! Phase commands are plain shell strings taken from configuration. They are
//! run to completion one at a time, with the child's output streamed straight
//! to our own standard streams. Failure of any kind surfaces as a
//! [`CommandStatus::Failure`], never as an error, so callers can keep going
//! and report every failure at the end.

use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Instant,
};
use tracing::{error, info, instrument};

/// Outcome of a single executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure,
}

impl CommandStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Layer of indirection for running commands.
pub trait CommandExecutor {
    /// Run command to completion inside target working directory.
    fn execute(&mut self, command: &str, working_directory: &Path) -> CommandStatus;
}

/// Run commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    root: PathBuf,
}

impl ShellExecutor {
    /// Construct new shell executor.
    ///
    /// Working directories are resolved relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CommandExecutor for ShellExecutor {
    #[instrument(skip(self), level = "debug")]
    fn execute(&mut self, command: &str, working_directory: &Path) -> CommandStatus {
        let start = Instant::now();
        info!(
            "[exec] running {command:?} in \"/{}\"",
            working_directory.display()
        );

        let result = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.root.join(working_directory))
            .spawn()
            .and_then(|mut child| child.wait());
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(status) if status.success() => {
                info!("[exec] finished {command:?} in {elapsed:.2}s");
                CommandStatus::Success
            }
            Ok(status) => {
                error!("[exec] {command:?} failed with {status} after {elapsed:.2}s");
                CommandStatus::Failure
            }
            Err(err) => {
                error!("[exec] {command:?} could not be spawned after {elapsed:.2}s: {err}");
                CommandStatus::Failure
            }
        }
    }
}
