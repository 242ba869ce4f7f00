// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lifecycle phases and execution environments.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Lifecycle operation applied to a set of projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Install,
    Setup,
    Test,
    Clean,
    Distribute,
}

impl Phase {
    /// Stop at the first failing command instead of collecting failures.
    ///
    /// Later installs may assume earlier ones succeeded.
    pub fn is_fail_fast(self) -> bool {
        matches!(self, Self::Install)
    }
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Install => "install",
            Self::Setup => "setup",
            Self::Test => "test",
            Self::Clean => "clean",
            Self::Distribute => "distribute",
        };
        fmt.write_str(name)
    }
}

/// Environment variant selecting which commands of a group run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Ci,
    #[default]
    Local,
}

impl Environment {
    /// Pick environment from the `--ci` switch.
    pub fn from_ci_flag(ci: bool) -> Self {
        if ci {
            Self::Ci
        } else {
            Self::Local
        }
    }
}

impl Display for Environment {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Ci => fmt.write_str("ci"),
            Self::Local => fmt.write_str("local"),
        }
    }
}
