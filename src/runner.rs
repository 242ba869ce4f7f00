// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Phase execution.
//!
//! Run the configured commands of a phase for each selected project, strictly
//! in selection order and one command at a time. Failures are collected into
//! a [`RunReport`] rather than stopping the run, so CI feedback covers every
//! project. Install is the exception: it stops at the first failure.

use crate::{
    config::{CommandGroup, ConfigError, ProjectDescriptor},
    exec::{CommandExecutor, CommandStatus},
    junit::JunitError,
    phase::{Environment, Phase},
    registry::{ProjectRegistry, ProjectSet},
    select::FileAssignment,
};

use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{error, info, instrument, warn};

/// Settings shared by every phase of a run.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Environment variant of each command group.
    pub environment: Environment,

    /// Execute bulk test runners during the test phase.
    pub run_test_runners: bool,

    /// Files handed to file-level test runners.
    pub files: FileAssignment,
}

/// Run phase commands for selected projects.
#[derive(Debug)]
pub struct PhaseRunner<'r, E>
where
    E: CommandExecutor,
{
    registry: &'r ProjectRegistry,
    executor: E,
    options: RunOptions,
}

impl<'r, E> PhaseRunner<'r, E>
where
    E: CommandExecutor,
{
    /// Construct new phase runner.
    pub fn new(registry: &'r ProjectRegistry, executor: E, options: RunOptions) -> Self {
        Self {
            registry,
            executor,
            options,
        }
    }

    /// Give back the executor, e.g., to inspect what it ran.
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Run target phase for each selected project in order.
    #[instrument(skip(self, selected), level = "debug")]
    pub fn run(&mut self, selected: &ProjectSet, phase: Phase) -> RunReport {
        info!("running {phase} for: {selected}");
        let mut report = RunReport::default();

        for name in selected.iter() {
            let Some(project) = self.registry.get(name) else {
                warn!("[{name}] not in registry, skipping");
                continue;
            };

            let outcome = match phase {
                Phase::Install => {
                    self.run_group(project, phase, &project.install_commands, &mut report)
                }
                Phase::Setup => {
                    self.run_group(project, phase, &project.setup_commands, &mut report)
                }
                Phase::Clean => {
                    self.run_group(project, phase, &project.clean_commands, &mut report)
                }
                Phase::Distribute => {
                    self.run_group(project, phase, &project.distribute_commands, &mut report)
                }
                Phase::Test => self.run_tests(project, &mut report),
            };

            if outcome.is_err() {
                warn!("{phase} halted after failure in {name:?}");
                report.halted = true;
                break;
            }
        }

        report
    }

    fn run_group(
        &mut self,
        project: &ProjectDescriptor,
        phase: Phase,
        group: &CommandGroup,
        report: &mut RunReport,
    ) -> Result<(), Halt> {
        let commands = group.resolve(self.options.environment);
        for (index, command) in commands.into_iter().enumerate() {
            info!("[{}] running {phase} command {index}", project.name);
            let status = self.execute(project, command, report);
            if phase.is_fail_fast() && !status.is_success() {
                return Err(Halt);
            }
        }

        Ok(())
    }

    fn run_tests(
        &mut self,
        project: &ProjectDescriptor,
        report: &mut RunReport,
    ) -> Result<(), Halt> {
        let runners = (&project.test_runners, &project.file_test_runner);
        let (test_runners, file_test_runner) = match runners {
            (Some(_), Some(_)) => {
                let error = ConfigError::ConflictingTestRunners {
                    project: project.name.clone(),
                };
                error!("[{}] {error}", project.name);
                report.failures.push(Failure::Config(error));
                return Ok(());
            }
            pair => pair,
        };

        if let Some(group) = test_runners {
            if self.options.run_test_runners {
                let commands = group.resolve(self.options.environment);
                for (index, command) in commands.into_iter().enumerate() {
                    info!("[{}] running test runner {index}", project.name);
                    self.execute(project, command, report);
                }
            } else {
                info!("[{}] skipping test runners", project.name);
            }
        }

        if let Some(group) = file_test_runner {
            let files = self.options.files.files_for(&project.name).join(" ");
            if files.is_empty() {
                info!("[{}] no files assigned to file test runner", project.name);
                return Ok(());
            }

            for command in group.resolve(self.options.environment) {
                info!("[{}] running file test runner", project.name);
                self.execute(project, &format!("{command} {files}"), report);
            }
        }

        Ok(())
    }

    fn execute(
        &mut self,
        project: &ProjectDescriptor,
        command: &str,
        report: &mut RunReport,
    ) -> CommandStatus {
        let status = self.executor.execute(command, &project.sub_directory);
        if !status.is_success() {
            error!("[{}] command failed: {command:?}", project.name);
            report.failures.push(Failure::Command {
                project: project.name.clone(),
                command: command.to_string(),
            });
        }

        status
    }
}

/// Marker that a fail-fast phase must stop.
struct Halt;

/// Everything that went wrong while running a phase.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Failures in the order they happened.
    pub failures: Vec<Failure>,

    /// Run stopped early because the phase is fail-fast.
    pub halted: bool,
}

impl RunReport {
    /// Record failure that happened outside of phase commands.
    pub fn record(&mut self, failure: impl Into<Failure>) {
        self.failures.push(failure.into());
    }

    /// Every executed command succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Single recorded failure.
#[derive(Debug)]
pub enum Failure {
    /// Command exited unsuccessfully.
    Command { project: String, command: String },

    /// Project configuration prevented its commands from running.
    Config(ConfigError),

    /// Test results could not be merged.
    Report(JunitError),
}

impl From<JunitError> for Failure {
    fn from(error: JunitError) -> Self {
        Self::Report(error)
    }
}

impl Display for Failure {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Command { project, command } => {
                write!(fmt, "command failed in project {project:?}: {command}")
            }
            Self::Config(error) => write!(fmt, "{error}"),
            Self::Report(error) => match error.source() {
                Some(source) => write!(fmt, "{error}: {source}"),
                None => write!(fmt, "{error}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonorepoConfig;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    /// Record every command, failing those that contain "fail".
    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<(String, PathBuf)>,
    }

    impl CommandExecutor for Recorder {
        fn execute(&mut self, command: &str, working_directory: &Path) -> CommandStatus {
            self.calls
                .push((command.to_string(), working_directory.to_path_buf()));
            if command.contains("fail") {
                CommandStatus::Failure
            } else {
                CommandStatus::Success
            }
        }
    }

    fn group(common: &[&str], ci: &[&str], local: &[&str]) -> CommandGroup {
        let owned = |commands: &[&str]| commands.iter().map(ToString::to_string).collect();
        CommandGroup {
            common: owned(common),
            ci: owned(ci),
            local: owned(local),
        }
    }

    fn registry(projects: Vec<ProjectDescriptor>) -> ProjectRegistry {
        ProjectRegistry::load(MonorepoConfig {
            projects,
            ..Default::default()
        })
        .unwrap()
    }

    fn commands(runner: PhaseRunner<'_, Recorder>) -> Vec<String> {
        runner
            .into_executor()
            .calls
            .into_iter()
            .map(|(command, _)| command)
            .collect()
    }

    #[test]
    fn run_common_before_environment_commands() {
        let registry = registry(vec![ProjectDescriptor {
            setup_commands: group(&["npm ci"], &["ci only"], &["local only"]),
            ..ProjectDescriptor::new("web", "apps/web")
        }]);
        let options = RunOptions {
            environment: Environment::Ci,
            ..Default::default()
        };

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), options);
        let report = runner.run(&registry.all(), Phase::Setup);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        let calls = runner.into_executor().calls;
        assert_eq!(
            calls,
            vec![
                ("npm ci".to_string(), PathBuf::from("apps/web")),
                ("ci only".to_string(), PathBuf::from("apps/web")),
            ]
        );
    }

    #[test]
    fn run_collects_failures_and_keeps_going() {
        let registry = registry(vec![
            ProjectDescriptor {
                clean_commands: group(&["fail first", "second"], &[], &[]),
                ..ProjectDescriptor::new("a", "a")
            },
            ProjectDescriptor {
                clean_commands: group(&["third"], &[], &["fail fourth"]),
                ..ProjectDescriptor::new("b", "b")
            },
        ]);

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), RunOptions::default());
        let report = runner.run(&registry.all(), Phase::Clean);

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.exit_code(), 1);
        assert!(!report.halted);
        assert_eq!(
            report.failures[1].to_string(),
            "command failed in project \"b\": fail fourth"
        );
        assert_eq!(
            commands(runner),
            vec!["fail first", "second", "third", "fail fourth"]
        );
    }

    #[test]
    fn run_install_halts_on_first_failure() {
        let registry = registry(vec![
            ProjectDescriptor {
                install_commands: group(&["ok", "fail", "never"], &[], &[]),
                ..ProjectDescriptor::new("a", "a")
            },
            ProjectDescriptor {
                install_commands: group(&["never either"], &[], &[]),
                ..ProjectDescriptor::new("b", "b")
            },
        ]);

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), RunOptions::default());
        let report = runner.run(&registry.all(), Phase::Install);

        assert!(report.halted);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(commands(runner), vec!["ok", "fail"]);
    }

    #[test]
    fn run_follows_selection_order() {
        let registry = registry(vec![
            ProjectDescriptor {
                distribute_commands: group(&["ship a"], &[], &[]),
                ..ProjectDescriptor::new("a", "a")
            },
            ProjectDescriptor {
                distribute_commands: group(&["ship b"], &[], &[]),
                ..ProjectDescriptor::new("b", "b")
            },
        ]);
        let selected: ProjectSet = ["b", "a"].into_iter().collect();

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), RunOptions::default());
        runner.run(&selected, Phase::Distribute);
        assert_eq!(commands(runner), vec!["ship b", "ship a"]);
    }

    #[test]
    fn run_tests_skips_bulk_runners_unless_asked() {
        let registry = registry(vec![ProjectDescriptor {
            test_runners: Some(group(&["make test"], &[], &[])),
            ..ProjectDescriptor::new("a", "a")
        }]);

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), RunOptions::default());
        runner.run(&registry.all(), Phase::Test);
        assert!(commands(runner).is_empty());

        let options = RunOptions {
            run_test_runners: true,
            ..Default::default()
        };
        let mut runner = PhaseRunner::new(&registry, Recorder::default(), options);
        runner.run(&registry.all(), Phase::Test);
        assert_eq!(commands(runner), vec!["make test"]);
    }

    #[test]
    fn run_tests_appends_assigned_files() -> anyhow::Result<()> {
        let registry = registry(vec![
            ProjectDescriptor {
                file_test_runner: Some(group(&[], &["jest --ci"], &["jest --watch=false"])),
                ..ProjectDescriptor::new("a", "a")
            },
            ProjectDescriptor {
                file_test_runner: Some(group(&["jest"], &[], &[])),
                ..ProjectDescriptor::new("b", "b")
            },
        ]);
        let options = RunOptions {
            environment: Environment::Ci,
            files: FileAssignment::from_paths(&registry, &["a/one.js", "a/two.js"])?,
            ..Default::default()
        };

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), options);
        runner.run(&registry.all(), Phase::Test);
        assert_eq!(commands(runner), vec!["jest --ci one.js two.js"]);

        Ok(())
    }

    #[test]
    fn record_report_failure_fails_successful_run() {
        let mut report = RunReport::default();
        assert_eq!(report.exit_code(), 0);

        report.record(JunitError::Write {
            source: std::io::Error::other("disk full"),
            path: PathBuf::from("reports/junit.xml"),
        });
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.failures[0].to_string(),
            "failed to write merged JUnit report to \"reports/junit.xml\": disk full"
        );
    }

    #[test]
    fn run_tests_rejects_conflicting_runners_but_continues() {
        let registry = registry(vec![
            ProjectDescriptor {
                test_runners: Some(group(&["make test"], &[], &[])),
                file_test_runner: Some(group(&["jest"], &[], &[])),
                ..ProjectDescriptor::new("both", "both")
            },
            ProjectDescriptor {
                test_runners: Some(group(&["cargo test"], &[], &[])),
                ..ProjectDescriptor::new("fine", "fine")
            },
        ]);
        let options = RunOptions {
            run_test_runners: true,
            ..Default::default()
        };

        let mut runner = PhaseRunner::new(&registry, Recorder::default(), options);
        let report = runner.run(&registry.all(), Phase::Test);

        assert_eq!(report.exit_code(), 1);
        assert!(matches!(
            report.failures.as_slice(),
            [Failure::Config(ConfigError::ConflictingTestRunners { project })] if project == "both"
        ));
        assert_eq!(commands(runner), vec!["cargo test"]);
    }
}
