//! GUI component builder.
//!
//! Compiles the Java sources under the configured source tree with `javac`,
//! mirrors non-source resources next to the classes, and packs everything
//! into a runnable archive with `jar`.
//!
//! `quick_build` always starts from a clean build tree. `incremental_build`
//! keeps the existing tree, so class files whose sources were deleted stay
//! in the archive until the next clean build.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{kib, StepOutcome};
use crate::config::BuildConfiguration;
use crate::error::StepError;
use crate::process::{ensure_exists, Cmd};

/// Java language release passed to `javac --release`.
pub const JAVA_RELEASE: &str = "17";
/// Entry-point class recorded in the archive manifest.
pub const MAIN_CLASS: &str = "app.Main";
pub const MANIFEST_NAME: &str = "MANIFEST.MF";

const SOURCE_EXTENSION: &str = "java";

pub struct GuiBuilder<'a> {
    config: &'a BuildConfiguration,
}

impl<'a> GuiBuilder<'a> {
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self { config }
    }

    fn build_dir(&self) -> &Path {
        &self.config.layout.build_dir
    }

    fn source_dir(&self) -> &Path {
        &self.config.layout.source_dir
    }

    /// Remove the build tree and the previous archive. Safe to repeat.
    pub fn clean(&self) -> Result<()> {
        println!("[gui] cleaning build outputs");
        let build_dir = self.build_dir();
        if build_dir.exists() {
            fs::remove_dir_all(build_dir)
                .with_context(|| format!("removing build directory '{}'", build_dir.display()))?;
        }
        let archive = self.config.gui_archive_path();
        if archive.exists() {
            fs::remove_file(&archive)
                .with_context(|| format!("removing previous archive '{}'", archive.display()))?;
        }
        Ok(())
    }

    /// All `.java` files under the source tree, sorted.
    pub fn discover_sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = WalkDir::new(self.source_dir())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_source(path))
            .collect();
        sources.sort();
        sources
    }

    /// `<lib>/*` when the library directory has entries, then the source root.
    pub fn classpath(&self) -> String {
        let lib_dir = &self.config.layout.lib_dir;
        let mut entries = Vec::new();
        let has_libs = fs::read_dir(lib_dir)
            .map(|mut dir| dir.next().is_some())
            .unwrap_or(false);
        if has_libs {
            entries.push(lib_dir.join("*").display().to_string());
        }
        entries.push(self.source_dir().display().to_string());
        entries.join(self.config.platform.classpath_separator())
    }

    /// Compile every discovered source into the build tree.
    pub fn compile(&self) -> Result<StepOutcome> {
        let sources = self.discover_sources();
        if sources.is_empty() {
            return Err(StepError::NoInput {
                root: self.source_dir().to_path_buf(),
                pattern: format!("*.{}", SOURCE_EXTENSION),
            }
            .into());
        }
        println!("[gui] compiling {} source files", sources.len());

        let build_dir = self.build_dir();
        fs::create_dir_all(build_dir)
            .with_context(|| format!("creating build directory '{}'", build_dir.display()))?;

        let result = Cmd::new(&self.config.tools.javac)
            .arg("-d")
            .arg_path(build_dir)
            .arg("-cp")
            .arg(self.classpath())
            .args(["-encoding", "UTF-8", "--release", JAVA_RELEASE, "-Xlint:unchecked"])
            .args(&sources)
            .error_msg("[gui] compilation failed")
            .run()?;

        if !result.stdout.trim().is_empty() {
            println!("{}", result.stdout.trim_end());
        }
        if result.stderr.to_lowercase().contains("warning") {
            println!("  [WARN] compiler warnings:\n{}", result.stderr.trim_end());
        }
        println!("[gui] compilation successful");
        Ok(StepOutcome::Done)
    }

    /// Mirror non-source files into the build tree; returns how many were copied.
    pub fn copy_resources(&self) -> Result<usize> {
        let source_dir = self.source_dir();
        let build_dir = self.build_dir();
        let mut copied = 0;

        for entry in WalkDir::new(source_dir) {
            let entry = entry
                .with_context(|| format!("walking source tree '{}'", source_dir.display()))?;
            if !entry.file_type().is_file() || is_source(entry.path()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .with_context(|| format!("relativizing '{}'", entry.path().display()))?;
            let target = build_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating '{}'", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "copying resource '{}' -> '{}'",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }

        if copied > 0 {
            println!("[gui] copied {} resource files", copied);
        } else {
            println!("[gui] no resource files found");
        }
        Ok(copied)
    }

    /// Write the manifest and pack the build tree into `dist/<name>`.
    pub fn create_archive(&self, name: &str) -> Result<StepOutcome> {
        println!("[gui] creating archive {}", name);
        let jar = &self.config.tools.jar;
        ensure_exists(jar, "install a JDK; the JRE has no 'jar' tool")?;

        let build_dir = self.build_dir();
        fs::create_dir_all(build_dir)
            .with_context(|| format!("creating build directory '{}'", build_dir.display()))?;
        let manifest = build_dir.join(MANIFEST_NAME);
        fs::write(&manifest, manifest_contents())
            .with_context(|| format!("writing manifest '{}'", manifest.display()))?;

        let dist_dir = &self.config.layout.dist_dir;
        fs::create_dir_all(dist_dir)
            .with_context(|| format!("creating distribution directory '{}'", dist_dir.display()))?;
        let archive = dist_dir.join(name);

        Cmd::new(jar)
            .arg("cfm")
            .arg_path(&archive)
            .arg_path(&manifest)
            .arg("-C")
            .arg_path(build_dir)
            .arg(".")
            .error_msg("[gui] archiver failed")
            .run()?;

        if !archive.is_file() {
            return Err(StepError::missing_artifact(&archive).into());
        }
        let outcome = StepOutcome::built(&archive)?;
        if let StepOutcome::Built { size_bytes, .. } = &outcome {
            println!(
                "[gui] archive created: {} ({:.2} KB)",
                archive.display(),
                kib(*size_bytes)
            );
        }
        Ok(outcome)
    }

    /// clean -> compile -> resources -> archive, stopping at the first failure.
    pub fn quick_build(&self) -> Result<StepOutcome> {
        self.clean()?;
        self.compile()?;
        self.copy_resources()?;
        self.create_archive(&self.config.artifacts.gui_archive)
    }

    /// Rebuild on top of the existing tree; falls back to a clean build if
    /// there is none.
    pub fn incremental_build(&self) -> Result<StepOutcome> {
        if !self.build_dir().exists() {
            println!("[gui] build directory not found, performing full build");
            return self.quick_build();
        }
        println!("[gui] performing incremental build");
        self.compile()?;
        self.copy_resources()?;
        self.create_archive(&self.config.artifacts.gui_archive)
    }

    /// Run the application's own `--test` entry point against the build tree.
    pub fn run_self_test(&self) -> Result<()> {
        println!("[gui] running self-test");
        let status = Cmd::new(&self.config.tools.java)
            .arg("-cp")
            .arg_path(self.build_dir())
            .args([MAIN_CLASS, "--test"])
            .error_msg("[gui] self-test failed")
            .run_interactive()?;
        println!("[gui] self-test finished ({})", status);
        Ok(())
    }
}

pub fn manifest_contents() -> String {
    format!(
        "Manifest-Version: 1.0\nMain-Class: {}\nClass-Path: .\n",
        MAIN_CLASS
    )
}

fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}
