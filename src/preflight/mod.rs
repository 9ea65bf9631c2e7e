//! Toolchain probing before a build.
//!
//! Every check here is advisory: the probe reports what it finds and never
//! stops the pipeline. Builders re-check the specific tool they need right
//! before invoking it.
//!
//! # Example
//!
//! ```rust,ignore
//! use calendar_builder::preflight::probe_toolchain;
//!
//! let report = probe_toolchain(&config);
//! report.print_summary();
//! if !report.gui_toolchain_ok() {
//!     println!("JDK missing, GUI build will fail");
//! }
//! ```

use std::path::{Path, PathBuf};

use crate::config::{BuildConfiguration, HostPlatform};
use crate::process::Cmd;

/// Visual Studio installations probed on Windows, newest first.
pub const VISUAL_STUDIO_PATHS: &[&str] = &[
    r"C:\Program Files\Microsoft Visual Studio\2022\Community",
    r"C:\Program Files\Microsoft Visual Studio\2022\Professional",
    r"C:\Program Files\Microsoft Visual Studio\2022\Enterprise",
    r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community",
    r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Professional",
    r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Enterprise",
];

/// Below this much free space on the distribution volume we warn.
const MIN_FREE_SPACE_BYTES: u64 = 200 * 1024 * 1024;

/// Result of a single probe.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub name: String,
    pub found: bool,
    /// Version line or location when found, reason otherwise.
    pub message: String,
    pub suggestion: Option<String>,
}

impl ProbeResult {
    pub fn found(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            found: true,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn missing(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            found: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProbeReport {
    pub checks: Vec<ProbeResult>,
}

impl ProbeReport {
    pub fn all_found(&self) -> bool {
        self.checks.iter().all(|c| c.found)
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// The JDK pieces the GUI build needs.
    pub fn gui_toolchain_ok(&self) -> bool {
        ["javac", "jar"]
            .iter()
            .all(|tool| self.get(tool).is_some_and(|c| c.found))
    }

    pub fn print_summary(&self) {
        for check in &self.checks {
            let status = if check.found { "[OK]" } else { "[WARN]" };
            println!("{} {}: {}", status, check.name, check.message);
            if let Some(suggestion) = &check.suggestion {
                println!("     Suggestion: {}", suggestion);
            }
        }
        let found = self.checks.iter().filter(|c| c.found).count();
        if self.all_found() {
            println!("\nAll toolchain checks passed ({}/{})", found, self.checks.len());
        } else {
            println!(
                "\nSome tools are missing ({}/{} found); continuing anyway",
                found,
                self.checks.len()
            );
        }
    }
}

/// Probe every external tool the build may use.
pub fn probe_toolchain(config: &BuildConfiguration) -> ProbeReport {
    let tools = &config.tools;
    let mut report = ProbeReport::default();

    report.checks.push(probe_version(
        "java",
        &tools.java,
        "-version",
        "Install a Java runtime (JDK 17 or later)",
    ));
    report.checks.push(probe_version(
        "javac",
        &tools.javac,
        "-version",
        "Install a JDK (not just a JRE)",
    ));
    report.checks.push(probe_version(
        "jar",
        &tools.jar,
        "--version",
        "Install a JDK (not just a JRE)",
    ));
    report.checks.push(probe_version(
        "cmake",
        &tools.cmake,
        "--version",
        "Install CMake; the overlay will not be built without it",
    ));

    if config.platform == HostPlatform::Windows {
        report.checks.push(probe_visual_studio(VISUAL_STUDIO_PATHS));
    }

    report.checks.push(probe_free_space(&config.layout.root));
    report
}

/// Run `<tool> <flag>` and report the first version line.
pub fn probe_version(name: &str, tool: &str, flag: &str, suggestion: &str) -> ProbeResult {
    match Cmd::new(tool).arg(flag).allow_fail().run() {
        Ok(result) if result.success() => {
            let version = result.first_line().unwrap_or("unknown version");
            ProbeResult::found(name, version)
        }
        Ok(result) => ProbeResult::missing(
            name,
            format!("'{} {}' exited with {}", tool, flag, result.status),
            suggestion,
        ),
        Err(_) => ProbeResult::missing(name, format!("'{}' not found", tool), suggestion),
    }
}

/// First existing installation among `candidates`.
pub fn probe_visual_studio(candidates: &[&str]) -> ProbeResult {
    match find_first_existing(candidates) {
        Some(path) => ProbeResult::found("Visual Studio", path.display().to_string()),
        None => ProbeResult::missing(
            "Visual Studio",
            "no installation found",
            "Install Visual Studio 2019/2022 with C++ tools; the overlay will not be built",
        ),
    }
}

pub fn find_first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn probe_free_space(dir: &Path) -> ProbeResult {
    match fs2::available_space(dir) {
        Ok(available) if available >= MIN_FREE_SPACE_BYTES => ProbeResult::found(
            "Disk space",
            format!("{:.1} MB available", available as f64 / (1024.0 * 1024.0)),
        ),
        Ok(available) => ProbeResult::missing(
            "Disk space",
            format!(
                "only {:.1} MB available, want {} MB",
                available as f64 / (1024.0 * 1024.0),
                MIN_FREE_SPACE_BYTES / (1024 * 1024)
            ),
            "Free up disk space or use a different distribution directory",
        ),
        Err(e) => ProbeResult::missing(
            "Disk space",
            format!("could not query '{}': {}", dir.display(), e),
            "Check that the project directory exists",
        ),
    }
}
