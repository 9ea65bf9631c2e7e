//! Native overlay builder.
//!
//! The overlay is a Windows-only executable built by the project's own
//! `scripts/build-cpp.bat`. On every other platform the step is skipped.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{copy_replacing, kib, locate_output, StepOutcome};
use crate::config::BuildConfiguration;
use crate::error::StepError;
use crate::process::Cmd;

/// Executable name the build script produces.
pub const OVERLAY_OUTPUT_NAME: &str = "CalendarOverlay.exe";
pub const BUILD_SCRIPT: &str = "build-cpp.bat";
/// Build tree created by the script inside the overlay directory.
pub const BUILD_TREE: &str = "build_nmake";
/// Environment variable carrying the wallpaper toggle into the script.
pub const WALLPAPER_ENV: &str = "CALENDAR_WALLPAPER_MODE";

pub struct OverlayBuilder<'a> {
    config: &'a BuildConfiguration,
}

impl<'a> OverlayBuilder<'a> {
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self { config }
    }

    fn build_tree(&self) -> PathBuf {
        self.config.layout.overlay_dir.join(BUILD_TREE)
    }

    fn script(&self) -> PathBuf {
        self.config.layout.scripts_dir.join(BUILD_SCRIPT)
    }

    /// Remove the script's build tree so the next build starts fresh.
    pub fn clean(&self) -> Result<()> {
        let tree = self.build_tree();
        if tree.exists() {
            println!("[overlay] cleaning {}", tree.display());
            fs::remove_dir_all(&tree)
                .with_context(|| format!("removing overlay build tree '{}'", tree.display()))?;
        }
        Ok(())
    }

    pub fn build(&self) -> Result<StepOutcome> {
        let platform = self.config.platform;
        if !platform.supports_overlay() {
            println!(
                "[overlay] [SKIP] native overlay is Windows-only (host: {})",
                platform.name()
            );
            return Ok(StepOutcome::skipped(format!(
                "overlay is not built on {}",
                platform.name()
            )));
        }

        let overlay_dir = &self.config.layout.overlay_dir;
        if !overlay_dir.is_dir() {
            return Err(StepError::missing_artifact(overlay_dir))
                .context("overlay source directory not found");
        }
        let script = self.script();
        if !script.is_file() {
            return Err(StepError::missing_artifact(&script))
                .context("overlay build script not found");
        }

        println!("[overlay] running {}", script.display());
        let result = Cmd::new("cmd")
            .arg("/C")
            .arg_path(&script)
            .dir(&self.config.layout.root)
            .env(WALLPAPER_ENV, if self.config.wallpaper_mode { "1" } else { "0" })
            .error_msg("[overlay] build script failed")
            .run()?;
        let output = result.combined();
        if !output.is_empty() {
            println!("{}", output);
        }

        self.collect_output()
    }

    /// Find the produced executable and copy it into the distribution.
    pub fn collect_output(&self) -> Result<StepOutcome> {
        let tree = self.build_tree();
        let produced = locate_output(&overlay_candidates(&tree), &tree, OVERLAY_OUTPUT_NAME)
            .ok_or_else(|| StepError::missing_artifact(tree.join(OVERLAY_OUTPUT_NAME)))
            .context("overlay executable not found after build")?;

        let target = self.config.overlay_exe_path();
        copy_replacing(&produced, &target)?;
        let outcome = StepOutcome::built(&target)?;
        if let StepOutcome::Built { size_bytes, .. } = &outcome {
            println!(
                "[overlay] copied {} -> {} ({:.2} KB)",
                produced.display(),
                target.display(),
                kib(*size_bytes)
            );
        }
        Ok(outcome)
    }
}

/// Locations checked, in order, before searching the whole build tree.
pub fn overlay_candidates(build_tree: &Path) -> Vec<PathBuf> {
    ["bin/Debug", "bin/Release", "Release", "Debug", ""]
        .iter()
        .map(|sub| {
            if sub.is_empty() {
                build_tree.join(OVERLAY_OUTPUT_NAME)
            } else {
                build_tree.join(sub).join(OVERLAY_OUTPUT_NAME)
            }
        })
        .collect()
}
