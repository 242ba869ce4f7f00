// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project registry.
//!
//! The __registry__ is the read-only, load-time view of every project in the
//! monorepo. It is built once from a [`MonorepoConfig`] and never mutated
//! afterwards. Every later stage (selection, expansion, partitioning) produces
//! a fresh [`ProjectSet`] instead of touching the registry.
//!
//! # Structural Invariants
//!
//! Validated eagerly on load:
//!
//! - Project names are unique.
//! - Every entry of `triggered_by_projects` names a known project.
//! - Trigger relation has depth one. A project listed as a trigger source
//!   must not list trigger sources of its own.
//! - No two non-composite projects share a sub directory. A __composite__
//!   project is one with a non-empty `triggered_by_projects` listing; it is
//!   layered over the projects it triggers off, so it may point at a
//!   directory another project already owns.

use crate::config::{ConfigError, MonorepoConfig, ProjectDescriptor};

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path},
};
use tracing::{debug, instrument};

/// Immutable registry of all known projects.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    projects: Vec<ProjectDescriptor>,
    positions: HashMap<String, usize>,
    dependents: HashMap<String, Vec<String>>,
    owners: HashMap<String, Vec<String>>,
}

impl ProjectRegistry {
    /// Load registry from configuration layout.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::DuplicateProject`] if a name repeats.
    /// - Return [`ConfigError::UnknownTrigger`] if a trigger source is unknown.
    /// - Return [`ConfigError::ChainedTrigger`] if trigger depth exceeds one.
    /// - Return [`ConfigError::DuplicateSubDirectory`] if two non-composite
    ///   projects share a sub directory.
    #[instrument(skip(config), level = "debug")]
    pub fn load(config: MonorepoConfig) -> Result<Self> {
        let projects = config.projects;

        let mut positions = HashMap::with_capacity(projects.len());
        for (position, project) in projects.iter().enumerate() {
            if positions.insert(project.name.clone(), position).is_some() {
                return Err(ConfigError::DuplicateProject {
                    name: project.name.clone(),
                });
            }
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for project in &projects {
            for trigger in &project.triggered_by_projects {
                let source = positions
                    .get(trigger)
                    .map(|position| &projects[*position])
                    .ok_or_else(|| ConfigError::UnknownTrigger {
                        project: project.name.clone(),
                        trigger: trigger.clone(),
                    })?;

                // INVARIANT: Trigger sources never have triggers of their own.
                if source.is_composite() {
                    return Err(ConfigError::ChainedTrigger {
                        project: project.name.clone(),
                        trigger: trigger.clone(),
                    });
                }

                let entry = dependents.entry(trigger.clone()).or_default();
                if !entry.contains(&project.name) {
                    entry.push(project.name.clone());
                }
            }
        }

        let mut owners: HashMap<String, Vec<String>> = HashMap::new();
        let mut exclusive: HashMap<String, &str> = HashMap::new();
        for project in &projects {
            let key = sub_directory_key(&project.sub_directory);
            if !project.is_composite() {
                if let Some(first) = exclusive.insert(key.clone(), project.name.as_str()) {
                    return Err(ConfigError::DuplicateSubDirectory {
                        first: first.to_string(),
                        second: project.name.clone(),
                        sub_directory: project.sub_directory.clone(),
                    });
                }
            }
            owners.entry(key).or_default().push(project.name.clone());
        }

        debug!("loaded {} project(s)", projects.len());

        Ok(Self {
            projects,
            positions,
            dependents,
            owners,
        })
    }

    /// Iterate over all projects in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectDescriptor> {
        self.projects.iter()
    }

    /// Iterate over all project names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|project| project.name.as_str())
    }

    /// Lookup project by name.
    pub fn get(&self, name: &str) -> Option<&ProjectDescriptor> {
        self.positions
            .get(name)
            .map(|position| &self.projects[*position])
    }

    /// Check if project is known.
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Registry position of project.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Projects that list target project in their `triggered_by_projects`.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Projects whose sub directory is the given top-level directory.
    pub fn owners_of(&self, directory: &str) -> &[String] {
        self.owners
            .get(directory)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterate over projects with trigger sources.
    pub fn composites(&self) -> impl Iterator<Item = &ProjectDescriptor> {
        self.projects.iter().filter(|project| project.is_composite())
    }

    /// Every project name as a [`ProjectSet`] in registry order.
    pub fn all(&self) -> ProjectSet {
        self.names().collect()
    }

    /// Reorder target set to follow registry order.
    ///
    /// Names the registry does not know are dropped.
    pub fn in_registry_order(&self, set: &ProjectSet) -> ProjectSet {
        self.names().filter(|name| set.contains(name)).collect()
    }
}

/// Normalize sub directory for lookup, e.g., "./web/" becomes "web".
fn sub_directory_key(path: &Path) -> String {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Ordered, duplicate-free listing of project names.
///
/// Selection stages hand these to each other by value, so every stage can
/// be computed and tested on its own.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectSet {
    names: Vec<String>,
}

impl ProjectSet {
    /// Construct new empty project set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append project name if it is not already present.
    ///
    /// Returns `true` if the name was newly inserted.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }

        self.names.push(name);
        true
    }

    /// Check if project name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|entry| entry == name)
    }

    /// Iterate over names in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

}

impl<S: Into<String>> FromIterator<S> for ProjectSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ProjectSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

impl Display for ProjectSet {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.names.is_empty() {
            return fmt.write_str("<none>");
        }

        fmt.write_str(&self.names.join(", "))
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
