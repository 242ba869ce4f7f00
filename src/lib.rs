// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Monorepo CI orchestration.
//!
//! A monorepo is a listing of __projects__, each living in its own top-level
//! directory with its own commands for every lifecycle __phase__ (install,
//! setup, test, clean, distribute). Morto figures out which projects a change
//! touches, and runs a phase only for those.
//!
//! # Pipeline
//!
//! Each stage is a pure function of the previous stage's output:
//!
//! 1. [`ProjectRegistry`] validates configuration once at startup.
//! 2. [`ChangeSelector`] maps changed files, or an explicit listing, to
//!    directly affected projects.
//! 3. [`DependencyExpander`] grows that set through trigger relationships,
//!    with a policy that depends on the phase.
//! 4. [`PartitionFilter`] keeps the slice assigned to this worker.
//! 5. [`PhaseRunner`] runs the configured commands of each project.
//!
//! [`SelectionPlanner`] wires stages two and three to a [`SelectionSource`].

pub mod changes;
pub mod config;
pub mod exec;
pub mod expand;
pub mod junit;
pub mod partition;
pub mod phase;
pub mod plan;
pub mod registry;
pub mod runner;
pub mod select;

#[doc(inline)]
pub use crate::{
    changes::{ChangeDetector, Git2ChangeDetector},
    config::{CommandGroup, MonorepoConfig, ProjectDescriptor},
    exec::{CommandExecutor, CommandStatus, ShellExecutor},
    expand::DependencyExpander,
    junit::JunitMerger,
    partition::{PartitionFilter, WorkerSlot},
    phase::{Environment, Phase},
    plan::{SelectionPlanner, SelectionSource},
    registry::{ProjectRegistry, ProjectSet},
    runner::{PhaseRunner, RunOptions, RunReport},
    select::{ChangeSelector, FileAssignment},
};
