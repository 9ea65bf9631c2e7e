//! Standalone payload extraction.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::bundle::payload::{extract_payload, read_trailer};
use crate::bundle::{BundleManifest, MANIFEST_NAME};

pub const EXTRACTION_PREFIX: &str = "desktop_calendar_";

/// Private extraction directory of a bundled launcher. Removed on drop.
#[derive(Debug)]
pub struct Extraction {
    dir: TempDir,
    manifest: BundleManifest,
}

impl Extraction {
    /// Unpack the payload carried by `exe`; `None` for a plain launcher.
    pub fn from_executable(exe: &Path) -> Result<Option<Self>> {
        let Some(trailer) = read_trailer(exe)? else {
            return Ok(None);
        };

        let dir = tempfile::Builder::new()
            .prefix(EXTRACTION_PREFIX)
            .tempdir()
            .context("creating extraction directory")?;
        extract_payload(exe, &trailer, dir.path())?;
        let manifest = BundleManifest::load(&dir.path().join(MANIFEST_NAME))?;
        println!("[launcher] extracted bundle to {}", dir.path().display());

        Ok(Some(Self { dir, manifest }))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(&self.manifest.config_document)
    }
}
