// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dependency expansion.
//!
//! Grow a set of directly affected projects through the trigger relation.
//! Expansion depends on the phase being run:
//!
//! - __Setup__ prepares an environment shared by a composite project and its
//!   trigger sources. Touching any member of a trigger group pulls in the
//!   whole group, i.e., the composite project together with every project it
//!   is triggered by.
//! - __Test__ and __distribute__ run whatever depends on what changed. A
//!   composite project is added when any of its trigger sources is selected.
//!   Selecting a composite project never pulls in its trigger sources.
//! - __Clean__ and __install__ operate per project, so nothing is added.
//!
//! Trigger depth is one (see [`ProjectRegistry`]), so a single pass is
//! enough and no fixpoint iteration is needed.
//!
//! Expanded sets follow registry order, so trigger sources always run before
//! the composite projects layered over them.

use crate::{
    phase::Phase,
    registry::{ProjectRegistry, ProjectSet},
};

use tracing::{info, instrument};

/// Expand directly affected projects through trigger relationships.
#[derive(Debug, Clone, Copy)]
pub struct DependencyExpander<'r> {
    registry: &'r ProjectRegistry,
}

impl<'r> DependencyExpander<'r> {
    /// Construct new dependency expander over target registry.
    pub fn new(registry: &'r ProjectRegistry) -> Self {
        Self { registry }
    }

    /// Expand selection according to the policy of target phase.
    ///
    /// Result is always a superset of the input, in registry order.
    #[instrument(skip(self, selected), level = "debug")]
    pub fn expand(&self, selected: &ProjectSet, phase: Phase) -> ProjectSet {
        let expanded = match phase {
            Phase::Setup => self.expand_groups(selected),
            Phase::Test | Phase::Distribute => self.expand_dependents(selected),
            Phase::Clean | Phase::Install => selected.clone(),
        };

        self.registry.in_registry_order(&expanded)
    }

    /// Add every member of each trigger group the selection touches.
    pub fn expand_groups(&self, selected: &ProjectSet) -> ProjectSet {
        let mut expanded = selected.clone();
        for composite in self.registry.composites() {
            let touched = selected.contains(&composite.name)
                || composite
                    .triggered_by_projects
                    .iter()
                    .any(|trigger| selected.contains(trigger));
            if !touched {
                continue;
            }

            let members = composite
                .triggered_by_projects
                .iter()
                .chain(Some(&composite.name));
            for member in members {
                if expanded.insert(member.as_str()) {
                    info!(
                        "using trigger group of {:?}, so also setting up {member:?}",
                        composite.name
                    );
                }
            }
        }

        expanded
    }

    /// Add composite projects triggered by anything in the selection.
    pub fn expand_dependents(&self, selected: &ProjectSet) -> ProjectSet {
        let mut expanded = selected.clone();
        for trigger in selected.iter() {
            for dependent in self.registry.dependents_of(trigger) {
                if expanded.insert(dependent.as_str()) {
                    info!("{trigger:?} changed, so also running {dependent:?}");
                }
            }
        }

        expanded
    }
}
