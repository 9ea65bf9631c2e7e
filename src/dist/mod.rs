//! Distribution directory assembly.
//!
//! The distribution directory is rebuilt in place: every file written here
//! replaces whatever was there before.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::build::{copy_replacing, kib, tree_size, StepOutcome};
use crate::bundle::{BundleManifest, MANIFEST_NAME};
use crate::config::{BuildConfiguration, RuntimeConfiguration, LAUNCHER_BIN_NAME};
use crate::error::StepError;

pub const README_DIST: &str = "README_DIST.txt";
pub const BUILD_INFO: &str = "build-info.json";
/// Project files copied verbatim when they exist.
pub const PROJECT_DOCUMENTS: &[&str] = &["README.md", "LICENSE"];

/// `build-info.json`.
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub built_at_utc: String,
    pub platform: String,
    pub wallpaper_mode: bool,
    /// Artifact file name to size in bytes, for artifacts present.
    pub artifacts: BTreeMap<String, u64>,
    pub missing: Vec<String>,
}

pub struct DistributionAssembler<'a> {
    config: &'a BuildConfiguration,
}

impl<'a> DistributionAssembler<'a> {
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self { config }
    }

    fn dist_dir(&self) -> &Path {
        &self.config.layout.dist_dir
    }

    fn ensure_dist_dir(&self) -> Result<()> {
        fs::create_dir_all(self.dist_dir()).with_context(|| {
            format!(
                "creating distribution directory '{}'",
                self.dist_dir().display()
            )
        })
    }

    /// Write the runtime configuration and install the launcher.
    ///
    /// The configuration document and the `bundle.json` naming it are always
    /// written, even when the launcher binary is missing.
    pub fn write_entry_point(&self) -> Result<StepOutcome> {
        println!("=== Creating Launcher ===");
        self.ensure_dist_dir()?;

        let config_path = self.config.config_document_path();
        RuntimeConfiguration::for_build(self.config).save(&config_path)?;
        println!("[dist] configuration written: {}", config_path.display());
        self.write_manifest()?;

        let binary = match &self.config.launcher_binary {
            Some(path) if path.is_file() => path,
            other => {
                let expected = other
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(LAUNCHER_BIN_NAME));
                return Err(StepError::missing_artifact(expected))
                    .context("launcher binary not built");
            }
        };

        let target = self.config.dist_path(&self.config.artifacts.launcher);
        copy_replacing(binary, &target)?;
        make_executable(&target)?;
        println!("[dist] launcher installed: {}", target.display());
        StepOutcome::built(&target)
    }

    /// `bundle.json` telling the installed launcher which document to read.
    pub fn write_manifest(&self) -> Result<PathBuf> {
        let names = &self.config.artifacts;
        let manifest = BundleManifest::new(
            &names.config_document,
            vec![names.launcher.clone(), names.config_document.clone()],
        );
        let path = self.config.dist_path(MANIFEST_NAME);
        manifest.save(&path)?;
        Ok(path)
    }

    /// Copy project documents, write the quick-start readme and build info.
    pub fn assemble(&self) -> Result<StepOutcome> {
        println!("=== Creating Distribution Package ===");
        self.ensure_dist_dir()?;

        for name in PROJECT_DOCUMENTS {
            let src = self.config.layout.root.join(name);
            if src.is_file() {
                copy_replacing(&src, &self.config.dist_path(name))?;
                println!("[dist] copied {}", name);
            }
        }

        let readme = self.config.dist_path(README_DIST);
        fs::write(&readme, quick_start(self.config))
            .with_context(|| format!("writing '{}'", readme.display()))?;
        println!("[dist] quick-start written: {}", readme.display());

        self.write_build_info()?;

        let total = tree_size(self.dist_dir());
        println!(
            "[dist] distribution created in {} ({:.1} KB)",
            self.dist_dir().display(),
            kib(total)
        );
        Ok(StepOutcome::Done)
    }

    pub fn write_build_info(&self) -> Result<PathBuf> {
        let names = &self.config.artifacts;
        let mut artifacts = BTreeMap::new();
        for name in [
            &names.gui_archive,
            &names.overlay_exe,
            &names.launcher,
            &names.config_document,
            &names.standalone_bundle,
        ] {
            if let Ok(meta) = fs::metadata(self.config.dist_path(name)) {
                artifacts.insert(name.clone(), meta.len());
            }
        }
        let info = BuildInfo {
            built_at_utc: now_utc_stamp(),
            platform: self.config.platform.name().to_string(),
            wallpaper_mode: self.config.wallpaper_mode,
            artifacts,
            missing: self.missing_components(),
        };

        let path = self.config.dist_path(BUILD_INFO);
        let json = serde_json::to_string_pretty(&info).context("serializing build info")?;
        fs::write(&path, json + "\n").with_context(|| format!("writing '{}'", path.display()))?;
        Ok(path)
    }

    /// Component artifacts that should be in the distribution but are not.
    ///
    /// The overlay only counts as missing where it can be built.
    pub fn missing_components(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.config.gui_archive_path().is_file() {
            missing.push(self.config.artifacts.gui_archive.clone());
        }
        if self.config.platform.supports_overlay() && !self.config.overlay_exe_path().is_file() {
            missing.push(self.config.artifacts.overlay_exe.clone());
        }
        missing
    }
}

/// Quick-start text with the configured artifact names substituted.
pub fn quick_start(config: &BuildConfiguration) -> String {
    let names = &config.artifacts;
    format!(
        "Desktop Calendar - Distribution Package
========================================

This package contains:

1. {jar} - calendar application (requires Java 17 or later)
2. {overlay} - desktop wallpaper overlay (Windows only)
3. {launcher} - launcher that starts both components
4. {config} - configuration file read by the launcher

Quick Start:
------------
1. Make sure Java is installed and on PATH
2. Run {launcher}

Options:
--------
  {launcher} --no-overlay   start only the calendar application
  {launcher} --no-gui       start only the overlay
  {launcher} --both         start both regardless of configuration
  {launcher} --status       show what is installed and running
  {launcher} --kill         stop running calendar processes

Configuration:
--------------
Edit {config} to change:
- auto_start_java / auto_start_cpp: which components start by default
- cpp_args: overlay position and arguments
- wallpaper_mode: draw the overlay behind desktop icons

For more information, see README.md.
",
        jar = names.gui_archive,
        overlay = names.overlay_exe,
        launcher = names.launcher,
        config = names.config_document,
    )
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_utc_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("marking '{}' executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
