// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change detection.
//!
//! Figure out which files the current proposed change touches, relative to
//! the monorepo root. Changes are measured from the merge base of a base
//! revision and `HEAD` up to the working tree, so uncommitted edits and
//! untracked files count too.
//!
//! Failing to reach the repository is fatal. Treating "no information" as
//! "no changes" would silently skip test coverage.

use git2::{DiffOptions, Repository};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Environment variable carrying the pull request URL on CI.
pub const PULL_REQUEST_ENV: &str = "CI_PULL_REQUEST";

/// Layer of indirection for change detection.
pub trait ChangeDetector {
    /// List files changed since target base revision, without duplicates.
    fn changed_files(&self, base: &str) -> Result<Vec<String>>;
}

/// Change detection through libgit2.
pub struct Git2ChangeDetector {
    repository: Repository,
}

impl Git2ChangeDetector {
    /// Construct new change detector from opened repository.
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Discover repository containing target path.
    ///
    /// # Errors
    ///
    /// - Return [`ChangeError::Open`] if no repository can be found.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::discover(path.as_ref()).map_err(|err| ChangeError::Open {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        Ok(Self::new(repository))
    }

    fn merge_base_tree(&self, base: &str) -> Result<git2::Tree<'_>> {
        let revision = |err: git2::Error| ChangeError::Revision {
            source: err,
            revision: base.to_string(),
        };

        let base_commit = self
            .repository
            .revparse_single(base)
            .and_then(|object| object.peel_to_commit())
            .map_err(revision)?;
        let head = self
            .repository
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(revision)?;
        let oid = self
            .repository
            .merge_base(base_commit.id(), head.id())
            .map_err(revision)?;
        debug!("merge base of {base:?} and HEAD is {oid}");

        let tree = self.repository.find_commit(oid)?.tree()?;
        Ok(tree)
    }
}

impl ChangeDetector for Git2ChangeDetector {
    #[instrument(skip(self), level = "debug")]
    fn changed_files(&self, base: &str) -> Result<Vec<String>> {
        let tree = self.merge_base_tree(base)?;
        let mut opts = DiffOptions::new();
        opts.include_typechange(true)
            .include_untracked(true)
            .recurse_untracked_dirs(true);
        let diff = self
            .repository
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

        let mut paths: Vec<String> = Vec::new();
        for delta in diff.deltas() {
            // INVARIANT: Renames touch both the old and the new location.
            for file in [delta.old_file(), delta.new_file()] {
                let Some(path) = file.path() else {
                    continue;
                };

                let path = path.to_string_lossy().replace('\\', "/");
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        info!("found {} changed file(s) since {base:?}", paths.len());
        Ok(paths)
    }
}

/// Pull request URL advertised by CI, if any.
///
/// Blank values count as absent.
pub fn pull_request_from_env() -> Option<String> {
    env::var(PULL_REQUEST_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Extract pull request number from the trailing segment of its URL.
pub fn pull_request_number(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Change detection error types.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    /// Repository cannot be opened.
    #[error("failed to open repository at {:?}", path.display())]
    Open {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Base revision or HEAD cannot be resolved.
    #[error("failed to resolve changes since revision {revision:?}")]
    Revision {
        #[source]
        source: git2::Error,
        revision: String,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ChangeError> = std::result::Result<T, E>;
