// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the `.morto.toml` file that describes every project
//! of a monorepo. Reading the file from disk is left to the caller, this
//! module only deals with deserialization. Structural validation of the
//! project graph happens once the layout is handed to
//! [`ProjectRegistry`](crate::registry::ProjectRegistry).

use crate::phase::Environment;

use serde::Deserialize;
use std::{path::PathBuf, str::FromStr};

/// Default name of the configuration file at the monorepo root.
pub const CONFIG_FILE_NAME: &str = ".morto.toml";

/// Base revision used for change detection when none is configured.
pub const DEFAULT_BASE_REF: &str = "origin/main";

/// Monorepo configuration layout.
///
/// A monorepo is described by an ordered listing of __projects__. The order
/// projects appear in the file is the order they are selected, partitioned,
/// and executed in.
///
/// # General Layout
///
/// ```toml
/// base_ref = "origin/main"
///
/// [[project]]
/// name = "shared"
/// sub_directory = "shared"
///
/// [project.test_runners]
/// common = ["make test"]
///
/// [[project]]
/// name = "web"
/// sub_directory = "web"
/// triggered_by_projects = ["shared"]
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonorepoConfig {
    /// Revision that changes are measured against.
    pub base_ref: Option<String>,

    /// Ordered listing of projects.
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectDescriptor>,
}

impl MonorepoConfig {
    /// Revision to diff against during change detection.
    pub fn base_ref(&self) -> &str {
        self.base_ref.as_deref().unwrap_or(DEFAULT_BASE_REF)
    }
}

impl FromStr for MonorepoConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

/// Description of a single project.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDescriptor {
    /// Unique project name, also the top-level directory holding its files.
    pub name: String,

    /// Relative path that phase commands execute in.
    pub sub_directory: PathBuf,

    /// Keep project selected no matter what changed.
    #[serde(default)]
    pub always_run: bool,

    /// Projects that cause this project to run when they change.
    #[serde(default)]
    pub triggered_by_projects: Vec<String>,

    /// Structured test result file relative to the project directory.
    pub junit_output: Option<PathBuf>,

    #[serde(default)]
    pub install_commands: CommandGroup,

    #[serde(default)]
    pub setup_commands: CommandGroup,

    #[serde(default)]
    pub clean_commands: CommandGroup,

    #[serde(default)]
    pub distribute_commands: CommandGroup,

    /// Bulk test runners executed as-is.
    pub test_runners: Option<CommandGroup>,

    /// Test runner that receives a balanced list of files to test.
    pub file_test_runner: Option<CommandGroup>,
}

impl ProjectDescriptor {
    /// Construct new project descriptor with no commands.
    pub fn new(name: impl Into<String>, sub_directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            sub_directory: sub_directory.into(),
            ..Default::default()
        }
    }

    /// Project is layered over other projects through trigger relationships.
    pub fn is_composite(&self) -> bool {
        !self.triggered_by_projects.is_empty()
    }

    /// Project balances its tests per file outside of project sharding.
    pub fn has_file_test_runner(&self) -> bool {
        self.file_test_runner.is_some()
    }
}

/// Ordered listing of commands keyed by environment.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandGroup {
    /// Commands run in every environment.
    #[serde(default)]
    pub common: Vec<String>,

    /// Commands run only on continuous integration.
    #[serde(default)]
    pub ci: Vec<String>,

    /// Commands run only on developer machines.
    #[serde(default, alias = "osx")]
    pub local: Vec<String>,
}

impl CommandGroup {
    /// Resolve commands for target environment.
    ///
    /// Common commands always come first.
    pub fn resolve(&self, env: Environment) -> Vec<&str> {
        let specific = match env {
            Environment::Ci => &self.ci,
            Environment::Local => &self.local,
        };

        self.common
            .iter()
            .chain(specific.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Two projects share the same name.
    #[error("project {name:?} is defined more than once")]
    DuplicateProject { name: String },

    /// Trigger listing names a project that does not exist.
    #[error("project {project:?} is triggered by unknown project {trigger:?}")]
    UnknownTrigger { project: String, trigger: String },

    /// Trigger source has triggers of its own.
    #[error(
        "project {project:?} is triggered by {trigger:?}, which is itself triggered by other \
         projects; trigger chains deeper than one level are not allowed"
    )]
    ChainedTrigger { project: String, trigger: String },

    /// Two non-composite projects share a sub directory.
    #[error("projects {first:?} and {second:?} share sub directory {sub_directory:?}")]
    DuplicateSubDirectory {
        first: String,
        second: String,
        sub_directory: PathBuf,
    },

    /// Project configures both bulk and file-level test runners.
    #[error("project {project:?} cannot have both test_runners and file_test_runner")]
    ConflictingTestRunners { project: String },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
