//! Build configuration.
//!
//! [`BuildConfiguration`] is constructed once per invocation and passed by
//! reference into every builder. Values come from compiled-in defaults, an
//! optional `build.toml` at the project root, then command-line overrides,
//! in that order.
//!
//! ```toml
//! # build.toml
//! [artifacts]
//! gui_archive = "CalendarApp.jar"
//! overlay_exe = "CalendarWallpaper.exe"
//!
//! [layout]
//! dist_dir = "dist"
//!
//! [tools]
//! javac = "/opt/jdk-17/bin/javac"
//! ```

pub mod runtime;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub use runtime::RuntimeConfiguration;

/// Optional project-level overrides file.
pub const BUILD_TOML: &str = "build.toml";

pub const DEFAULT_GUI_ARCHIVE: &str = "CalendarApp.jar";
pub const DEFAULT_OVERLAY_EXE: &str = "CalendarWallpaper.exe";
pub const DEFAULT_CONFIG_DOCUMENT: &str = "desktop_calendar_config.json";
pub const DEFAULT_STANDALONE_BUNDLE: &str = "DesktopCalendar.exe";
const DEFAULT_LAUNCHER_STEM: &str = "DesktopCalendarLauncher";

/// Name of the compiled launcher binary produced by this crate.
pub const LAUNCHER_BIN_NAME: &str = "calendar-launcher";

/// Operating system the build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl HostPlatform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }

    /// The native overlay and the standalone bundle only exist on Windows.
    pub fn supports_overlay(self) -> bool {
        self == Self::Windows
    }

    pub fn classpath_separator(self) -> &'static str {
        match self {
            Self::Windows => ";",
            _ => ":",
        }
    }

    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Other => std::env::consts::OS,
        }
    }
}

/// File names of everything placed into the distribution directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub gui_archive: String,
    pub overlay_exe: String,
    pub launcher: String,
    pub config_document: String,
    pub standalone_bundle: String,
}

impl ArtifactNames {
    pub fn for_platform(platform: HostPlatform) -> Self {
        Self {
            gui_archive: DEFAULT_GUI_ARCHIVE.to_string(),
            overlay_exe: DEFAULT_OVERLAY_EXE.to_string(),
            launcher: format!("{}{}", DEFAULT_LAUNCHER_STEM, platform.exe_suffix()),
            config_document: DEFAULT_CONFIG_DOCUMENT.to_string(),
            standalone_bundle: DEFAULT_STANDALONE_BUNDLE.to_string(),
        }
    }
}

/// Directory layout of the calendar project being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    /// GUI source tree (`control-app/src`).
    pub source_dir: PathBuf,
    /// Optional jar dependencies (`control-app/lib`).
    pub lib_dir: PathBuf,
    /// Compiled GUI classes (`build`).
    pub build_dir: PathBuf,
    /// Distribution directory (`dist`).
    pub dist_dir: PathBuf,
    /// Native overlay sources (`overlay-windows`).
    pub overlay_dir: PathBuf,
    /// Helper scripts, including `build-cpp.bat` (`scripts`).
    pub scripts_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source_dir: root.join("control-app/src"),
            lib_dir: root.join("control-app/lib"),
            build_dir: root.join("build"),
            dist_dir: root.join("dist"),
            overlay_dir: root.join("overlay-windows"),
            scripts_dir: root.join("scripts"),
            root,
        }
    }
}

/// External executables invoked by the builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolNames {
    pub java: String,
    pub javac: String,
    pub jar: String,
    pub cmake: String,
    pub cargo: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            javac: "javac".to_string(),
            jar: "jar".to_string(),
            cmake: "cmake".to_string(),
            cargo: "cargo".to_string(),
        }
    }
}

/// Immutable per-invocation build settings.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub artifacts: ArtifactNames,
    pub layout: ProjectLayout,
    pub tools: ToolNames,
    pub platform: HostPlatform,
    /// Passed to the overlay build and written into the runtime config.
    pub wallpaper_mode: bool,
    /// Compiled `calendar-launcher` copied into the distribution.
    pub launcher_binary: Option<PathBuf>,
    /// Source tree used to build the launcher on demand.
    pub launcher_source: Option<PathBuf>,
}

impl BuildConfiguration {
    /// Defaults for a project rooted at `root`, targeting the current host.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let platform = HostPlatform::current();
        Self {
            artifacts: ArtifactNames::for_platform(platform),
            layout: ProjectLayout::new(root),
            tools: ToolNames::default(),
            platform,
            wallpaper_mode: true,
            launcher_binary: None,
            launcher_source: None,
        }
    }

    /// Defaults plus `<root>/build.toml` when present.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let config = Self::new(root);
        let path = config.layout.root.join(BUILD_TOML);
        if !path.is_file() {
            return Ok(config);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading build config '{}'", path.display()))?;
        let parsed: BuildToml = toml::from_str(&raw)
            .with_context(|| format!("parsing build config '{}'", path.display()))?;
        Ok(config.apply_toml(parsed))
    }

    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        if self.artifacts.launcher == ArtifactNames::for_platform(self.platform).launcher {
            self.artifacts.launcher = ArtifactNames::for_platform(platform).launcher;
        }
        self.platform = platform;
        self
    }

    pub fn with_launcher_binary(mut self, path: Option<PathBuf>) -> Self {
        self.launcher_binary = path;
        self
    }

    pub fn with_launcher_source(mut self, path: Option<PathBuf>) -> Self {
        self.launcher_source = path;
        self
    }

    pub fn with_overrides(mut self, overrides: BuildOverrides) -> Self {
        if let Some(dist) = overrides.dist_dir {
            self.layout.dist_dir = self.resolve(dist);
        }
        if let Some(name) = overrides.gui_archive {
            self.artifacts.gui_archive = name;
        }
        if let Some(name) = overrides.overlay_exe {
            self.artifacts.overlay_exe = name;
        }
        if let Some(name) = overrides.launcher {
            self.artifacts.launcher = name;
        }
        if let Some(name) = overrides.config_document {
            self.artifacts.config_document = name;
        }
        if let Some(wallpaper) = overrides.wallpaper_mode {
            self.wallpaper_mode = wallpaper;
        }
        self
    }

    pub fn dist_path(&self, name: &str) -> PathBuf {
        self.layout.dist_dir.join(name)
    }

    pub fn gui_archive_path(&self) -> PathBuf {
        self.dist_path(&self.artifacts.gui_archive)
    }

    pub fn overlay_exe_path(&self) -> PathBuf {
        self.dist_path(&self.artifacts.overlay_exe)
    }

    pub fn config_document_path(&self) -> PathBuf {
        self.dist_path(&self.artifacts.config_document)
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.layout.root.join(path)
        }
    }

    fn apply_toml(mut self, parsed: BuildToml) -> Self {
        if let Some(a) = parsed.artifacts {
            let names = &mut self.artifacts;
            set_if(&mut names.gui_archive, a.gui_archive);
            set_if(&mut names.overlay_exe, a.overlay_exe);
            set_if(&mut names.launcher, a.launcher);
            set_if(&mut names.config_document, a.config_document);
            set_if(&mut names.standalone_bundle, a.standalone_bundle);
        }
        if let Some(l) = parsed.layout {
            if let Some(p) = l.source_dir {
                self.layout.source_dir = self.resolve(p);
            }
            if let Some(p) = l.lib_dir {
                self.layout.lib_dir = self.resolve(p);
            }
            if let Some(p) = l.build_dir {
                self.layout.build_dir = self.resolve(p);
            }
            if let Some(p) = l.dist_dir {
                self.layout.dist_dir = self.resolve(p);
            }
            if let Some(p) = l.overlay_dir {
                self.layout.overlay_dir = self.resolve(p);
            }
            if let Some(p) = l.scripts_dir {
                self.layout.scripts_dir = self.resolve(p);
            }
        }
        if let Some(t) = parsed.tools {
            set_if(&mut self.tools.java, t.java);
            set_if(&mut self.tools.javac, t.javac);
            set_if(&mut self.tools.jar, t.jar);
            set_if(&mut self.tools.cmake, t.cmake);
            set_if(&mut self.tools.cargo, t.cargo);
        }
        if let Some(wallpaper) = parsed.wallpaper_mode {
            self.wallpaper_mode = wallpaper;
        }
        self
    }
}

fn set_if(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Command-line level overrides; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub dist_dir: Option<PathBuf>,
    pub gui_archive: Option<String>,
    pub overlay_exe: Option<String>,
    pub launcher: Option<String>,
    pub config_document: Option<String>,
    pub wallpaper_mode: Option<bool>,
}

/// Locate the `calendar-launcher` binary next to the running executable.
pub fn sibling_launcher_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe.parent()?.join(format!(
        "{}{}",
        LAUNCHER_BIN_NAME,
        std::env::consts::EXE_SUFFIX
    ));
    candidate.is_file().then_some(candidate)
}

/// Walk up from `start` to the first directory containing `control-app/`.
pub fn locate_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("control-app").is_dir())
        .map(Path::to_path_buf)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildToml {
    artifacts: Option<ArtifactsToml>,
    layout: Option<LayoutToml>,
    tools: Option<ToolsToml>,
    wallpaper_mode: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactsToml {
    gui_archive: Option<String>,
    overlay_exe: Option<String>,
    launcher: Option<String>,
    config_document: Option<String>,
    standalone_bundle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutToml {
    source_dir: Option<PathBuf>,
    lib_dir: Option<PathBuf>,
    build_dir: Option<PathBuf>,
    dist_dir: Option<PathBuf>,
    overlay_dir: Option<PathBuf>,
    scripts_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolsToml {
    java: Option<String>,
    javac: Option<String>,
    jar: Option<String>,
    cmake: Option<String>,
    cargo: Option<String>,
}
