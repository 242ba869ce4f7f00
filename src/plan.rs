// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Selection planning.
//!
//! Decide where directly affected projects come from, then expand them for
//! the phase being run. Sources are tried in a fixed order:
//!
//! 1. Explicit listing of project names.
//! 2. Files changed since a base revision, given directly or implied by CI
//!    advertising a pull request.
//! 3. Every registered project.

use crate::{
    changes::{pull_request_from_env, pull_request_number, ChangeDetector, ChangeError},
    expand::DependencyExpander,
    phase::Phase,
    registry::{ProjectRegistry, ProjectSet},
    select::{ChangeSelector, InputError},
};

use tracing::{info, instrument};

/// Where directly affected projects come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSource {
    /// Project names listed by the caller, kept in the order given.
    Explicit(Vec<String>),

    /// Files changed since target base revision.
    Changes { base: String },

    /// Every registered project.
    All,
}

impl SelectionSource {
    /// Resolve selection source.
    ///
    /// The configured base revision is only used when CI advertises a pull
    /// request through `CI_PULL_REQUEST`.
    pub fn resolve(explicit: &[String], base: Option<&str>, configured_base: &str) -> Self {
        if !explicit.is_empty() {
            return Self::Explicit(explicit.to_vec());
        }

        if let Some(base) = base {
            return Self::Changes { base: base.into() };
        }

        let Some(pull_request) = pull_request_from_env() else {
            return Self::All;
        };
        match pull_request_number(&pull_request) {
            Some(number) => info!("pull request detected: #{number}"),
            None => info!("pull request detected: {pull_request}"),
        }

        Self::Changes {
            base: configured_base.into(),
        }
    }
}

/// Turn a selection source into the projects a phase runs for.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPlanner<'r> {
    registry: &'r ProjectRegistry,
}

impl<'r> SelectionPlanner<'r> {
    /// Construct new selection planner over target registry.
    pub fn new(registry: &'r ProjectRegistry) -> Self {
        Self { registry }
    }

    /// Select and expand projects for target phase.
    ///
    /// Change detection is only opened through `open_detector` when the
    /// source needs it. Explicit selections keep the order given, with
    /// expansion results appended in registry order. Every other source
    /// yields registry order.
    ///
    /// # Errors
    ///
    /// - Return [`PlanError::Input`] if names or changed paths are invalid.
    /// - Return [`PlanError::Change`] if change detection fails.
    #[instrument(skip(self, open_detector), level = "debug")]
    pub fn plan<D, F>(
        &self,
        source: &SelectionSource,
        phase: Phase,
        open_detector: F,
    ) -> Result<ProjectSet>
    where
        D: ChangeDetector,
        F: FnOnce() -> Result<D, ChangeError>,
    {
        let selector = ChangeSelector::new(self.registry);
        let expander = DependencyExpander::new(self.registry);

        let planned = match source {
            SelectionSource::Explicit(names) => {
                let mut selected = selector.select_explicit(names)?;
                let expanded = expander.expand(&selected, phase);
                selected.extend(expanded.iter());
                selected
            }
            SelectionSource::Changes { base } => {
                let changed = open_detector()?.changed_files(base)?;
                let selected = selector.select_changed(&changed)?;
                expander.expand(&selected, phase)
            }
            SelectionSource::All => {
                let all = self.registry.all();
                info!("using all projects: {all}");
                expander.expand(&all, phase)
            }
        };

        info!("planned {phase} for: {planned}");
        Ok(planned)
    }
}

/// Selection planning error types.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Selection input is invalid.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Change detection is unavailable.
    #[error(transparent)]
    Change(#[from] ChangeError),
}

/// Friendly result alias :3
pub type Result<T, E = PlanError> = std::result::Result<T, E>;
