//! Runtime configuration document read by the launcher.
//!
//! The document is human-editable JSON living next to the launcher. Every
//! recognized key is optional; absent keys are filled from defaults with
//! [`RuntimeConfiguration::with_defaults`], and keys the launcher does not
//! know are carried through untouched so older or newer documents survive a
//! load/save cycle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::{BuildConfiguration, HostPlatform, DEFAULT_GUI_ARCHIVE, DEFAULT_OVERLAY_EXE};

/// Fixed overlay arguments when wallpaper mode is on.
pub const DEFAULT_OVERLAY_ARGS: &[&str] = &["--wallpaper", "--position", "top-right", "--fullscreen"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfiguration {
    /// GUI archive file name, relative to the application directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_jar: Option<String>,
    /// Overlay executable file name, relative to the application directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpp_exe: Option<String>,
    /// Arguments appended to the overlay invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpp_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start_java: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start_cpp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallpaper_mode: Option<bool>,
    /// Java runtime used to run the GUI archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_command: Option<String>,
    /// Keys this launcher does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeConfiguration {
    /// Fixed defaults with every recognized key present.
    pub fn defaults() -> Self {
        Self {
            java_jar: Some(DEFAULT_GUI_ARCHIVE.to_string()),
            cpp_exe: Some(DEFAULT_OVERLAY_EXE.to_string()),
            cpp_args: Some(overlay_args(true)),
            auto_start_java: Some(false),
            auto_start_cpp: Some(true),
            wallpaper_mode: Some(true),
            java_command: Some(default_java_command(HostPlatform::current()).to_string()),
            extra: Map::new(),
        }
    }

    /// Defaults with the build's artifact names and wallpaper mode substituted.
    pub fn for_build(config: &BuildConfiguration) -> Self {
        Self {
            java_jar: Some(config.artifacts.gui_archive.clone()),
            cpp_exe: Some(config.artifacts.overlay_exe.clone()),
            cpp_args: Some(overlay_args(config.wallpaper_mode)),
            wallpaper_mode: Some(config.wallpaper_mode),
            java_command: Some(default_java_command(config.platform).to_string()),
            ..Self::defaults()
        }
    }

    /// Fill every absent field from `defaults`; present fields always win.
    pub fn with_defaults(self, defaults: &RuntimeConfiguration) -> Self {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra);
        Self {
            java_jar: self.java_jar.or_else(|| defaults.java_jar.clone()),
            cpp_exe: self.cpp_exe.or_else(|| defaults.cpp_exe.clone()),
            cpp_args: self.cpp_args.or_else(|| defaults.cpp_args.clone()),
            auto_start_java: self.auto_start_java.or(defaults.auto_start_java),
            auto_start_cpp: self.auto_start_cpp.or(defaults.auto_start_cpp),
            wallpaper_mode: self.wallpaper_mode.or(defaults.wallpaper_mode),
            java_command: self.java_command.or_else(|| defaults.java_command.clone()),
            extra,
        }
    }

    /// Parse a document without applying defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("reading runtime config '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing runtime config '{}'", path.display()))
    }

    /// Load `path` merged with `defaults`, creating it from `defaults` if absent.
    ///
    /// A document that cannot be parsed is left on disk and `defaults` are
    /// used for this run.
    pub fn load_or_create(path: &Path, defaults: &RuntimeConfiguration) -> Result<Self> {
        if !path.exists() {
            defaults.save(path)?;
            return Ok(defaults.clone());
        }
        match Self::load(path) {
            Ok(loaded) => Ok(loaded.with_defaults(defaults)),
            Err(e) => {
                eprintln!("  [WARN] {:#}; using defaults", e);
                Ok(defaults.clone())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory '{}'", parent.display()))?;
        }
        let mut json = serde_json::to_string_pretty(self).context("serializing runtime config")?;
        json.push('\n');
        fs::write(path, json)
            .with_context(|| format!("writing runtime config '{}'", path.display()))
    }

    pub fn gui_archive(&self) -> &str {
        self.java_jar.as_deref().unwrap_or(DEFAULT_GUI_ARCHIVE)
    }

    pub fn overlay_exe(&self) -> &str {
        self.cpp_exe.as_deref().unwrap_or(DEFAULT_OVERLAY_EXE)
    }

    pub fn overlay_arguments(&self) -> Vec<String> {
        self.cpp_args.clone().unwrap_or_else(|| overlay_args(true))
    }

    pub fn java_runtime(&self) -> &str {
        self.java_command
            .as_deref()
            .unwrap_or_else(|| default_java_command(HostPlatform::current()))
    }

    pub fn gui_enabled(&self) -> bool {
        self.auto_start_java.unwrap_or(false)
    }

    pub fn overlay_enabled(&self) -> bool {
        self.auto_start_cpp.unwrap_or(true)
    }
}

fn overlay_args(wallpaper_mode: bool) -> Vec<String> {
    DEFAULT_OVERLAY_ARGS
        .iter()
        .filter(|arg| wallpaper_mode || **arg != "--wallpaper")
        .map(|arg| arg.to_string())
        .collect()
}

/// `javaw` runs without a console window on Windows.
fn default_java_command(platform: HostPlatform) -> &'static str {
    match platform {
        HostPlatform::Windows => "javaw",
        _ => "java",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const KEYS: &[&str] = &[
        "java_jar",
        "cpp_exe",
        "cpp_args",
        "auto_start_java",
        "auto_start_cpp",
        "wallpaper_mode",
        "java_command",
    ];

    fn custom_values() -> Value {
        json!({
            "java_jar": "Other.jar",
            "cpp_exe": "Other.exe",
            "cpp_args": ["--position", "bottom-left"],
            "auto_start_java": true,
            "auto_start_cpp": false,
            "wallpaper_mode": false,
            "java_command": "/opt/jre/bin/java",
        })
    }

    #[test]
    fn test_defaults_never_override_present_keys() {
        let defaults = RuntimeConfiguration::defaults();
        let defaults_json = serde_json::to_value(&defaults).unwrap();
        let custom = custom_values();

        for mask in 0u32..(1 << KEYS.len()) {
            let mut doc = Map::new();
            for (i, key) in KEYS.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    doc.insert(key.to_string(), custom[key].clone());
                }
            }
            let loaded: RuntimeConfiguration =
                serde_json::from_value(Value::Object(doc)).unwrap();
            let merged = serde_json::to_value(loaded.with_defaults(&defaults)).unwrap();

            for (i, key) in KEYS.iter().enumerate() {
                let expected = if mask & (1 << i) != 0 {
                    &custom[key]
                } else {
                    &defaults_json[key]
                };
                assert_eq!(&merged[key], expected, "mask {:#b}, key {}", mask, key);
            }
        }
    }

    #[test]
    fn test_unknown_keys_survive_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"java_jar": "Cal.jar", "theme": {"accent": "teal"}, "future_flag": 3}"#,
        )
        .unwrap();

        let loaded = RuntimeConfiguration::load_or_create(&path, &RuntimeConfiguration::defaults())
            .unwrap();
        assert_eq!(loaded.gui_archive(), "Cal.jar");
        assert_eq!(loaded.extra["theme"], json!({"accent": "teal"}));

        loaded.save(&path).unwrap();
        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["future_flag"], json!(3));
        assert_eq!(raw["auto_start_cpp"], json!(true));
    }

    #[test]
    fn test_save_then_load_is_structurally_equal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let mut config = RuntimeConfiguration::defaults();
        config.extra.insert("note".into(), json!("kept"));

        config.save(&path).unwrap();
        let reread = RuntimeConfiguration::load(&path).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn test_load_or_create_writes_defaults_when_absent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.json");
        let defaults = RuntimeConfiguration::defaults();

        let loaded = RuntimeConfiguration::load_or_create(&path, &defaults).unwrap();
        assert_eq!(loaded, defaults);
        assert!(path.is_file());
    }

    #[test]
    fn test_load_or_create_tolerates_corrupt_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let defaults = RuntimeConfiguration::defaults();

        let loaded = RuntimeConfiguration::load_or_create(&path, &defaults).unwrap();
        assert_eq!(loaded, defaults);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_for_build_substitutes_names() {
        let config = BuildConfiguration::new("/proj")
            .with_platform(HostPlatform::Windows)
            .with_overrides(crate::config::BuildOverrides {
                gui_archive: Some("Cal.jar".into()),
                wallpaper_mode: Some(false),
                ..Default::default()
            });
        let runtime = RuntimeConfiguration::for_build(&config);
        assert_eq!(runtime.gui_archive(), "Cal.jar");
        assert_eq!(runtime.java_runtime(), "javaw");
        assert_eq!(runtime.wallpaper_mode, Some(false));
        assert!(!runtime.overlay_arguments().contains(&"--wallpaper".to_string()));
        assert!(runtime.overlay_enabled());
        assert!(!runtime.gui_enabled());
    }
}
