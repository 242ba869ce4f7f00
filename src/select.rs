// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project selection.
//!
//! Decide which projects are __directly affected__ by the current change.
//! Selection comes from one of two places: an explicit override listing of
//! project names, or a listing of changed file paths relative to the monorepo
//! root.
//!
//! # Fail-Open Selection
//!
//! Each changed file is attributed to a project through its first path
//! segment, which must match a project's sub directory. A file under a
//! directory no project owns cannot be attributed, so every project is
//! selected instead. Skipping coverage on an ambiguous change is worse than
//! running too much.

use crate::registry::{ProjectRegistry, ProjectSet};

use std::collections::HashMap;
use tracing::{info, instrument};

/// Map changed files or explicit names to directly affected projects.
#[derive(Debug, Clone, Copy)]
pub struct ChangeSelector<'r> {
    registry: &'r ProjectRegistry,
}

impl<'r> ChangeSelector<'r> {
    /// Construct new change selector over target registry.
    pub fn new(registry: &'r ProjectRegistry) -> Self {
        Self { registry }
    }

    /// Select directly affected projects.
    ///
    /// A non-empty explicit listing takes precedence over changed files.
    ///
    /// # Errors
    ///
    /// - Return [`InputError::UnknownProject`] if explicit listing names an
    ///   unknown project.
    /// - Return [`InputError::TopLevelPath`] if a changed file sits directly
    ///   at the monorepo root.
    pub fn select(
        &self,
        changed_files: &[impl AsRef<str>],
        explicit: &[impl AsRef<str>],
    ) -> Result<ProjectSet> {
        if !explicit.is_empty() {
            return self.select_explicit(explicit);
        }

        self.select_changed(changed_files)
    }

    /// Select exactly the projects named, in the order given.
    ///
    /// # Errors
    ///
    /// - Return [`InputError::UnknownProject`] if a name is not registered.
    #[instrument(skip(self, explicit), level = "debug")]
    pub fn select_explicit(&self, explicit: &[impl AsRef<str>]) -> Result<ProjectSet> {
        let mut selected = ProjectSet::new();
        for name in explicit.iter().map(AsRef::as_ref) {
            if !self.registry.contains(name) {
                return Err(InputError::UnknownProject { name: name.into() });
            }
            selected.insert(name);
        }

        info!("explicit project selection: {selected}");
        Ok(selected)
    }

    /// Select projects owning changed files, plus always-run projects.
    ///
    /// Result follows registry order no matter what order files come in.
    ///
    /// # Errors
    ///
    /// - Return [`InputError::TopLevelPath`] if a changed file sits directly
    ///   at the monorepo root.
    #[instrument(skip(self, changed_files), level = "debug")]
    pub fn select_changed(&self, changed_files: &[impl AsRef<str>]) -> Result<ProjectSet> {
        let mut directories = Vec::new();
        for path in changed_files.iter().map(AsRef::as_ref) {
            if path.is_empty() {
                continue;
            }

            let (directory, _) = split_top_level(path)?;
            directories.push((directory, path));
        }

        let mut hits = ProjectSet::new();
        for (directory, path) in directories {
            let owners = self.registry.owners_of(directory);
            if owners.is_empty() {
                info!("non-project file change in {path:?}, using all projects");
                return Ok(self.registry.all());
            }
            hits.extend(owners.iter().map(String::as_str));
        }

        let selected: ProjectSet = self
            .registry
            .iter()
            .filter(|project| project.always_run || hits.contains(&project.name))
            .map(|project| project.name.as_str())
            .collect();

        info!("changed project selection: {selected}");
        Ok(selected)
    }
}

/// Files handed to file-level test runners, grouped by project.
///
/// Each path in the explicit file listing is `<project>/<path>`, where the
/// remainder is relative to the project directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileAssignment {
    files: HashMap<String, Vec<String>>,
}

impl FileAssignment {
    /// Group explicit file listing by project.
    ///
    /// # Errors
    ///
    /// - Return [`InputError::TopLevelPath`] if a path has nothing past its
    ///   project directory.
    /// - Return [`InputError::UnknownProject`] if a path's project directory
    ///   does not name a known project.
    pub fn from_paths(registry: &ProjectRegistry, paths: &[impl AsRef<str>]) -> Result<Self> {
        let mut files: HashMap<String, Vec<String>> = HashMap::new();
        for path in paths.iter().map(AsRef::as_ref) {
            let (project, internal) = split_top_level(path)?;
            if !registry.contains(project) {
                return Err(InputError::UnknownProject {
                    name: project.into(),
                });
            }

            files
                .entry(project.to_string())
                .or_default()
                .push(internal.to_string());
        }

        Ok(Self { files })
    }

    /// Files assigned to target project, relative to its directory.
    pub fn files_for(&self, project: &str) -> &[String] {
        self.files
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Split path into its top-level directory and the remainder.
fn split_top_level(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_start_matches("./");
    match trimmed.split_once('/') {
        Some((top, rest)) if !top.is_empty() && !rest.is_empty() => Ok((top, rest)),
        _ => Err(InputError::TopLevelPath { path: path.into() }),
    }
}

/// Selection input error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Path cannot be attributed to any project directory.
    #[error("top-level paths not allowed: {path:?}")]
    TopLevelPath { path: String },

    /// Name does not match a known project.
    #[error("unknown project: {name:?}")]
    UnknownProject { name: String },
}

/// Friendly result alias :3
pub type Result<T, E = InputError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonorepoConfig, ProjectDescriptor};
    use simple_test_case::test_case;

    fn registry() -> ProjectRegistry {
        ProjectRegistry::load(MonorepoConfig {
            projects: vec![
                ProjectDescriptor::new("a", "a"),
                ProjectDescriptor {
                    triggered_by_projects: vec!["a".into()],
                    ..ProjectDescriptor::new("b", "b")
                },
                ProjectDescriptor {
                    always_run: true,
                    ..ProjectDescriptor::new("lint", "lint")
                },
                ProjectDescriptor::new("d", "d"),
            ],
            ..Default::default()
        })
        .unwrap()
    }

    const NONE: &[&str] = &[];

    #[test_case(&["a/x.txt"], &["a", "lint"]; "single project")]
    #[test_case(&["d/x.txt", "a/y/z.txt", "a/x.txt"], &["a", "lint", "d"]; "registry order without duplicates")]
    #[test_case(&["b/x.txt"], &["b", "lint"]; "composite project directory")]
    #[test_case(&["", "lint/x.txt"], &["lint"]; "blank lines skipped")]
    #[test_case(&[], &["lint"]; "no changes keeps always run")]
    #[test_case(&["c/x.txt"], &["a", "b", "lint", "d"]; "unknown directory fails open")]
    #[test_case(&["a/x.txt", "c/x.txt"], &["a", "b", "lint", "d"]; "any unknown directory fails open")]
    #[test]
    fn select_changed_files(changed: &[&str], expect: &[&str]) {
        let registry = registry();
        let result = ChangeSelector::new(&registry).select(changed, NONE);
        assert_eq!(result, Ok(expect.iter().copied().collect::<ProjectSet>()));
    }

    #[test]
    fn select_rejects_root_level_changes() {
        let registry = registry();
        let result = ChangeSelector::new(&registry).select(&["a/x.txt", "README.md"], NONE);
        assert_eq!(
            result,
            Err(InputError::TopLevelPath {
                path: "README.md".into()
            })
        );
    }

    #[test]
    fn select_explicit_overrides_changes() -> anyhow::Result<()> {
        let registry = registry();
        let result = ChangeSelector::new(&registry).select(&["c/x.txt"], &["d", "a", "d"])?;
        assert_eq!(result.iter().collect::<Vec<_>>(), vec!["d", "a"]);

        Ok(())
    }

    #[test]
    fn select_explicit_rejects_unknown_project() {
        let registry = registry();
        let result = ChangeSelector::new(&registry).select(NONE, &["a", "nope"]);
        assert_eq!(
            result,
            Err(InputError::UnknownProject {
                name: "nope".into()
            })
        );
    }

    #[test]
    fn assign_files_by_project() -> anyhow::Result<()> {
        let registry = registry();
        let result = FileAssignment::from_paths(
            &registry,
            &["a/spec/one.js", "d/two.js", "a/spec/three.js"],
        )?;

        assert_eq!(result.files_for("a"), ["spec/one.js", "spec/three.js"]);
        assert_eq!(result.files_for("d"), ["two.js"]);
        assert!(result.files_for("b").is_empty());

        Ok(())
    }

    #[test_case("a", InputError::TopLevelPath { path: "a".into() }; "bare directory")]
    #[test_case("a/", InputError::TopLevelPath { path: "a/".into() }; "trailing slash")]
    #[test_case("zzz/one.js", InputError::UnknownProject { name: "zzz".into() }; "unknown project")]
    #[test]
    fn assign_files_rejects_bad_paths(path: &str, expect: InputError) {
        let registry = registry();
        let result = FileAssignment::from_paths(&registry, &[path]);
        assert_eq!(result, Err(expect));
    }
}
