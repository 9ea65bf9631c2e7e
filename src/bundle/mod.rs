//! Standalone single-file bundle.
//!
//! The bundle is a copy of the launcher with the distribution appended as a
//! [`payload`]. At start-up the launcher finds the payload in its own
//! executable, unpacks it into a private temporary directory and runs from
//! there. [`BundleManifest`] (`bundle.json`) tells it which document inside
//! the payload is the runtime configuration. A plain distribution carries the
//! same manifest next to its launcher.

pub mod payload;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::build::{copy_replacing, find_file_recursive, locate_output, mib, StepOutcome};
use crate::config::{BuildConfiguration, LAUNCHER_BIN_NAME};
use crate::dist::{now_utc_stamp, PROJECT_DOCUMENTS, README_DIST};
use crate::error::StepError;
use crate::process::Cmd;

pub const MANIFEST_NAME: &str = "bundle.json";
/// Scratch directory under the project root, removed after a successful bundle.
pub const STAGING_DIR: &str = "standalone_build";
const MANIFEST_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format: u32,
    /// Runtime configuration document, relative to the extraction directory.
    pub config_document: String,
    pub files: Vec<String>,
    pub created_at_utc: String,
}

impl BundleManifest {
    pub fn new(config_document: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            format: MANIFEST_FORMAT,
            config_document: config_document.into(),
            files,
            created_at_utc: now_utc_stamp(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("reading bundle manifest '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing bundle manifest '{}'", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing bundle manifest")?;
        fs::write(path, json + "\n")
            .with_context(|| format!("writing bundle manifest '{}'", path.display()))
    }
}

pub struct StandaloneBundler<'a> {
    config: &'a BuildConfiguration,
}

impl<'a> StandaloneBundler<'a> {
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self { config }
    }

    fn staging_dir(&self) -> PathBuf {
        self.config.layout.root.join(STAGING_DIR)
    }

    pub fn create(&self) -> Result<StepOutcome> {
        println!("=== Creating Standalone Executable ===");
        let platform = self.config.platform;
        if !platform.supports_overlay() {
            println!(
                "[bundle] [SKIP] standalone bundle is Windows-only (host: {})",
                platform.name()
            );
            return Ok(StepOutcome::skipped(format!(
                "standalone bundle is not built on {}",
                platform.name()
            )));
        }

        let launcher = self.ensure_launcher()?;
        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("removing stale '{}'", staging.display()))?;
        }
        fs::create_dir_all(&staging)
            .with_context(|| format!("creating '{}'", staging.display()))?;

        let mut files = self.payload_files()?;
        let manifest = BundleManifest::new(
            &self.config.artifacts.config_document,
            files.iter().map(|(name, _)| name.clone()).collect(),
        );
        let manifest_path = staging.join(MANIFEST_NAME);
        manifest.save(&manifest_path)?;
        files.push((MANIFEST_NAME.to_string(), manifest_path));

        println!("[bundle] packing {} files", files.len());
        let payload = payload::pack_payload(&files)?;

        let bundle_name = &self.config.artifacts.standalone_bundle;
        payload::write_bundle(&launcher, &payload, &staging.join(bundle_name))?;

        let produced = locate_output(&[staging.join(bundle_name)], &staging, bundle_name)
            .ok_or_else(|| StepError::missing_artifact(staging.join(bundle_name)))
            .context("standalone executable not found")?;
        let target = self.config.dist_path(bundle_name);
        copy_replacing(&produced, &target)?;

        fs::remove_dir_all(&staging)
            .with_context(|| format!("removing '{}'", staging.display()))?;

        let outcome = StepOutcome::built(&target)?;
        if let StepOutcome::Built { size_bytes, .. } = &outcome {
            println!(
                "[bundle] standalone executable created: {} ({:.1} MB)",
                target.display(),
                mib(*size_bytes)
            );
        }
        Ok(outcome)
    }

    /// Distribution files embedded in the payload. The configuration
    /// document is required; everything else is included when present.
    pub fn payload_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let names = &self.config.artifacts;
        let config_path = self.config.config_document_path();
        if !config_path.is_file() {
            return Err(StepError::missing_artifact(&config_path))
                .context("runtime configuration must be written before bundling");
        }

        let mut files = vec![(names.config_document.clone(), config_path)];
        let optional = [
            names.gui_archive.as_str(),
            names.overlay_exe.as_str(),
            README_DIST,
        ]
        .into_iter()
        .chain(PROJECT_DOCUMENTS.iter().copied());
        for name in optional {
            let path = self.config.dist_path(name);
            if path.is_file() {
                files.push((name.to_string(), path));
            } else {
                println!("  [WARN] {} not in distribution, not bundled", name);
            }
        }
        Ok(files)
    }

    /// The launcher binary, building it first if it is not there.
    pub fn ensure_launcher(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.launcher_binary {
            if path.is_file() {
                return Ok(path.clone());
            }
        }
        let Some(source) = &self.config.launcher_source else {
            return Err(StepError::missing_artifact(PathBuf::from(LAUNCHER_BIN_NAME)))
                .context("no launcher binary and no source tree to build it from");
        };

        println!("[bundle] building {} in {}", LAUNCHER_BIN_NAME, source.display());
        Cmd::new(&self.config.tools.cargo)
            .args(["build", "--release", "--bin", LAUNCHER_BIN_NAME])
            .dir(source)
            .error_msg("[bundle] building the launcher failed")
            .run_interactive()?;

        let file_name = format!("{}{}", LAUNCHER_BIN_NAME, self.config.platform.exe_suffix());
        let target_dir = source.join("target");
        let primary = target_dir.join("release").join(&file_name);
        if primary.is_file() {
            return Ok(primary);
        }
        find_file_recursive(&target_dir, &file_name)
            .ok_or_else(|| StepError::missing_artifact(primary))
            .context("launcher binary not found after build")
    }
}
