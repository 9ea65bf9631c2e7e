//! Drives the compiled `calendar-launcher` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calendar_builder::bundle::payload::{pack_payload, write_bundle};
use calendar_builder::bundle::{BundleManifest, MANIFEST_NAME};
use calendar_builder::config::{BuildConfiguration, BuildOverrides, HostPlatform, RuntimeConfiguration};
use calendar_builder::dist::DistributionAssembler;
use tempfile::TempDir;

const LAUNCHER: &str = env!("CARGO_BIN_EXE_calendar-launcher");

fn run(program: &Path, args: &[&str]) -> Output {
    Command::new(program).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_reports_artifacts_and_creates_config() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("CalendarApp.jar"), "PK").unwrap();
    let dir = temp.path().to_str().unwrap();

    let output = run(Path::new(LAUNCHER), &["--status", "--dir", dir]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("[OK] GUI archive"), "{}", text);
    assert!(text.contains("[MISSING] Overlay"), "{}", text);
    assert!(text.contains("Platform:"));
    assert!(temp.path().join("desktop_calendar_config.json").is_file());
}

#[test]
fn exits_nonzero_when_no_enabled_component_starts() {
    let temp = TempDir::new().unwrap();
    let config = RuntimeConfiguration {
        auto_start_java: Some(true),
        ..RuntimeConfiguration::defaults()
    };
    config
        .save(&temp.path().join("desktop_calendar_config.json"))
        .unwrap();

    let output = run(
        Path::new(LAUNCHER),
        &["--dir", temp.path().to_str().unwrap(), "--no-overlay"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("[FAIL]"));
}

#[cfg(unix)]
#[test]
fn installed_launcher_reads_configured_document() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfiguration::new(temp.path())
        .with_platform(HostPlatform::Linux)
        .with_launcher_binary(Some(PathBuf::from(LAUNCHER)))
        .with_overrides(BuildOverrides {
            config_document: Some("custom.json".into()),
            gui_archive: Some("Renamed.jar".into()),
            ..Default::default()
        });
    DistributionAssembler::new(&config).write_entry_point().unwrap();

    let launcher = config.dist_path("DesktopCalendarLauncher");
    let output = run(&launcher, &["--status"]);
    assert!(output.status.success(), "{:?}", output);
    let text = stdout(&output);
    assert!(text.contains("custom.json"), "{}", text);
    assert!(text.contains("Renamed.jar"), "{}", text);
    assert!(!config.dist_path("desktop_calendar_config.json").exists());
}

#[test]
fn conflicting_flags_are_rejected() {
    let output = run(Path::new(LAUNCHER), &["--both", "--no-gui"]);
    assert!(!output.status.success());
}

#[cfg(unix)]
#[test]
fn bundled_launcher_runs_from_private_extraction() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();

    let jar = staging.join("CalendarApp.jar");
    fs::write(&jar, "PK").unwrap();
    let config = staging.join("desktop_calendar_config.json");
    RuntimeConfiguration::defaults().save(&config).unwrap();
    let manifest = staging.join(MANIFEST_NAME);
    BundleManifest {
        format: 1,
        config_document: "desktop_calendar_config.json".into(),
        files: vec!["CalendarApp.jar".into(), "desktop_calendar_config.json".into()],
        created_at_utc: "2026-01-01T00:00:00Z".into(),
    }
    .save(&manifest)
    .unwrap();

    let payload = pack_payload(&[
        ("CalendarApp.jar".to_string(), jar),
        ("desktop_calendar_config.json".to_string(), config),
        (MANIFEST_NAME.to_string(), manifest),
    ])
    .unwrap();
    let bundle = temp.path().join("DesktopCalendar");
    write_bundle(Path::new(LAUNCHER), &payload, &bundle).unwrap();

    let output = run(&bundle, &["--status"]);
    assert!(output.status.success(), "{:?}", output);
    let text = stdout(&output);
    assert!(text.contains("[OK] GUI archive"), "{}", text);

    let app_dir: PathBuf = text
        .lines()
        .find_map(|line| line.strip_prefix("Application directory: "))
        .map(PathBuf::from)
        .unwrap();
    assert!(app_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("desktop_calendar_"));
    assert!(!app_dir.exists(), "extraction directory left behind");
}
