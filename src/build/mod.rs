//! Component builders.
//!
//! - [`gui`] - compiles the GUI sources and archives them
//! - [`overlay`] - drives the native overlay build (Windows only)
//!
//! Both return a [`StepOutcome`] on success. A step that does not apply to
//! the host platform succeeds with [`StepOutcome::Skipped`] so callers can
//! compose the same sequence everywhere.

pub mod gui;
pub mod overlay;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// An artifact was written at `path`.
    Built { path: PathBuf, size_bytes: u64 },
    /// The step did its work without producing a single artifact.
    Done,
    /// The step does not apply here.
    Skipped { reason: String },
}

impl StepOutcome {
    pub fn built(path: &Path) -> Result<Self> {
        let size_bytes = fs::metadata(path)
            .with_context(|| format!("reading size of '{}'", path.display()))?
            .len();
        Ok(Self::Built {
            path: path.to_path_buf(),
            size_bytes,
        })
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Search `root` recursively for a file called `file_name`.
///
/// Unreadable entries are skipped. Matches are returned in walk order with
/// entries sorted by name so the result is stable.
pub fn find_file_recursive(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
}

/// First existing file among `candidates`, else a recursive search of `root`.
pub fn locate_output(candidates: &[PathBuf], root: &Path, file_name: &str) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .or_else(|| find_file_recursive(root, file_name))
}

/// Total size of all files under `root`.
pub fn tree_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

pub fn kib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

pub fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Copy `src` to `dst`, replacing whatever is at `dst`.
pub fn copy_replacing(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    if dst.exists() {
        fs::remove_file(dst)
            .with_context(|| format!("removing previous '{}'", dst.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("copying '{}' -> '{}'", src.display(), dst.display()))
}
