//! Component process orchestration.
//!
//! The [`Orchestrator`] starts the overlay and GUI, relays their output and
//! stops both on shutdown. Its lifecycle is published on a watch channel:
//!
//! ```text
//! Idle -> Starting -> Running -> Stopping -> Stopped
//!             \_______________________/
//!              (every enabled component failed)
//! ```
//!
//! Standalone bundles extract themselves first (see [`extract`]); the
//! orchestrator itself only sees an application directory and a runtime
//! configuration.

pub mod extract;
pub mod handle;
pub mod status;

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

use crate::bundle::{BundleManifest, MANIFEST_NAME};
use crate::config::{RuntimeConfiguration, DEFAULT_CONFIG_DOCUMENT};
use crate::error::StepError;
pub use handle::ProcessHandle;

/// Time a component gets to exit after a graceful stop request.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Gui,
    Overlay,
}

impl Component {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gui => "GUI",
            Self::Overlay => "overlay",
        }
    }

    /// Prefix applied to relayed output lines.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Gui => "[GUI]",
            Self::Overlay => "[Overlay]",
        }
    }
}

pub struct Orchestrator {
    app_dir: PathBuf,
    config: RuntimeConfiguration,
    headless: bool,
    grace: Duration,
    state: watch::Sender<LauncherState>,
    gui: Option<ProcessHandle>,
    overlay: Option<ProcessHandle>,
}

impl Orchestrator {
    pub fn new(app_dir: impl Into<PathBuf>, config: RuntimeConfiguration) -> Self {
        let (state, _) = watch::channel(LauncherState::Idle);
        Self {
            app_dir: app_dir.into(),
            config,
            headless: false,
            grace: STOP_GRACE,
            state,
            gui: None,
            overlay: None,
        }
    }

    /// Start the GUI with `-Djava.awt.headless=true`.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> LauncherState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LauncherState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LauncherState) {
        self.state.send_replace(state);
    }

    pub fn is_started(&self, component: Component) -> bool {
        match component {
            Component::Gui => self.gui.is_some(),
            Component::Overlay => self.overlay.is_some(),
        }
    }

    /// `<java> [-Djava.awt.headless=true] -jar <app_dir>/<archive>`.
    pub fn gui_command(&self) -> (PathBuf, Vec<OsString>) {
        let mut args = Vec::new();
        if self.headless {
            args.push(OsString::from("-Djava.awt.headless=true"));
        }
        args.push(OsString::from("-jar"));
        args.push(self.app_dir.join(self.config.gui_archive()).into_os_string());
        (PathBuf::from(self.config.java_runtime()), args)
    }

    /// `<app_dir>/<overlay exe> <cpp_args...>`.
    pub fn overlay_command(&self) -> (PathBuf, Vec<OsString>) {
        let args = self
            .config
            .overlay_arguments()
            .into_iter()
            .map(OsString::from)
            .collect();
        (self.app_dir.join(self.config.overlay_exe()), args)
    }

    pub fn start_gui(&mut self) -> Result<()> {
        let archive = self.app_dir.join(self.config.gui_archive());
        if !archive.is_file() {
            return Err(StepError::missing_artifact(&archive)).context("starting GUI");
        }
        let (program, args) = self.gui_command();
        println!("[launcher] starting GUI: {}", archive.display());
        let handle = ProcessHandle::spawn(Component::Gui, &program, &args, &self.app_dir)?;
        self.gui = Some(handle);
        Ok(())
    }

    pub fn start_overlay(&mut self) -> Result<()> {
        let (program, args) = self.overlay_command();
        if !program.is_file() {
            return Err(StepError::missing_artifact(&program)).context("starting overlay");
        }
        println!("[launcher] starting overlay: {}", program.display());
        let handle = ProcessHandle::spawn(Component::Overlay, &program, &args, &self.app_dir)?;
        self.overlay = Some(handle);
        Ok(())
    }

    /// Stop every running component; a no-op when none were started.
    ///
    /// Returns the total number of relayed output lines.
    pub async fn stop_all(&mut self) -> usize {
        let mut relayed = 0;
        for handle in [self.overlay.take(), self.gui.take()].into_iter().flatten() {
            relayed += handle.stop(self.grace).await;
        }
        relayed
    }

    /// Start enabled components, run until `shutdown` resolves, then stop.
    ///
    /// Fails without entering `Running` when components were enabled and
    /// none of them could be started.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.set_state(LauncherState::Starting);
        println!("=== Desktop Calendar Launcher ===");

        let mut enabled = 0;
        let mut started = 0;
        if self.config.overlay_enabled() {
            enabled += 1;
            match self.start_overlay() {
                Ok(()) => started += 1,
                Err(e) => println!("[FAIL] {:#}", e),
            }
        }
        if self.config.gui_enabled() {
            enabled += 1;
            match self.start_gui() {
                Ok(()) => started += 1,
                Err(e) => println!("[FAIL] {:#}", e),
            }
        }

        if enabled > 0 && started == 0 {
            self.set_state(LauncherState::Stopping);
            self.stop_all().await;
            self.set_state(LauncherState::Stopped);
            bail!("none of the enabled components could be started");
        }

        self.set_state(LauncherState::Running);
        if enabled == 0 {
            println!("[launcher] no components enabled");
        }
        println!("Applications started. Press Ctrl+C to stop.");
        shutdown.await;

        self.set_state(LauncherState::Stopping);
        println!("\n[launcher] stopping applications...");
        self.stop_all().await;
        self.set_state(LauncherState::Stopped);
        Ok(())
    }
}

/// Resolve the application directory: explicit, else the executable's own.
pub fn default_app_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let exe = std::env::current_exe().context("locating launcher executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("launcher '{}' has no parent directory", exe.display()))
}

/// Runtime configuration of an installed launcher: the document named by
/// `bundle.json` in `app_dir`, else [`DEFAULT_CONFIG_DOCUMENT`].
pub fn installed_config_path(app_dir: &Path) -> PathBuf {
    let manifest = app_dir.join(MANIFEST_NAME);
    if manifest.is_file() {
        match BundleManifest::load(&manifest) {
            Ok(manifest) => return app_dir.join(manifest.config_document),
            Err(e) => println!("  [WARN] {:#}, using {}", e, DEFAULT_CONFIG_DOCUMENT),
        }
    }
    app_dir.join(DEFAULT_CONFIG_DOCUMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use tempfile::TempDir;

    fn config(gui: bool, overlay: bool) -> RuntimeConfiguration {
        RuntimeConfiguration {
            auto_start_java: Some(gui),
            auto_start_cpp: Some(overlay),
            ..RuntimeConfiguration::defaults()
        }
    }

    #[tokio::test]
    async fn test_stop_all_without_handles_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(temp.path(), config(false, false));
        assert_eq!(orchestrator.stop_all().await, 0);
        assert_eq!(orchestrator.stop_all().await, 0);
    }

    #[tokio::test]
    async fn test_nothing_enabled_runs_until_shutdown() {
        let temp = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(temp.path(), config(false, false));
        let states = orchestrator.subscribe();
        assert_eq!(*states.borrow(), LauncherState::Idle);

        let at_shutdown = std::cell::Cell::new(None);
        orchestrator
            .run_until(async { at_shutdown.set(Some(*states.borrow())) })
            .await
            .unwrap();
        assert_eq!(at_shutdown.get(), Some(LauncherState::Running));
        assert_eq!(orchestrator.state(), LauncherState::Stopped);
    }

    #[test]
    fn test_installed_config_path_follows_manifest() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            installed_config_path(temp.path()),
            temp.path().join(DEFAULT_CONFIG_DOCUMENT)
        );

        BundleManifest::new("custom.json", vec!["custom.json".into()])
            .save(&temp.path().join(MANIFEST_NAME))
            .unwrap();
        assert_eq!(
            installed_config_path(temp.path()),
            temp.path().join("custom.json")
        );
    }

    #[test]
    fn test_unreadable_manifest_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(MANIFEST_NAME), "not json").unwrap();
        assert_eq!(
            installed_config_path(temp.path()),
            temp.path().join(DEFAULT_CONFIG_DOCUMENT)
        );
    }

    #[tokio::test]
    async fn test_all_enabled_failing_skips_running() {
        let temp = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(temp.path(), config(true, true));
        let mut states = orchestrator.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while states.changed().await.is_ok() {
                seen.push(*states.borrow_and_update());
            }
            seen
        });

        let result = orchestrator
            .run_until(async { panic!("shutdown must not be awaited") })
            .await;
        assert!(result.is_err());
        assert_eq!(orchestrator.state(), LauncherState::Stopped);
        drop(orchestrator);

        let seen = watcher.await.unwrap();
        assert!(!seen.contains(&LauncherState::Running));
        assert_eq!(seen.last(), Some(&LauncherState::Stopped));
    }

    #[test]
    fn test_start_gui_requires_archive() {
        let temp = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(temp.path(), config(true, false));
        let err = orchestrator.start_gui().unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(StepError::MissingArtifact { .. })
        ));
        assert!(!orchestrator.is_started(Component::Gui));
    }

    #[test]
    fn test_commands() {
        let mut runtime = config(true, true);
        runtime.java_command = Some("java".into());
        runtime.cpp_args = Some(vec!["--position".into(), "top-right".into()]);
        let orchestrator = Orchestrator::new("/opt/cal", runtime).headless(true);

        let (java, args) = orchestrator.gui_command();
        assert_eq!(java, PathBuf::from("java"));
        assert_eq!(
            args,
            vec![
                OsString::from("-Djava.awt.headless=true"),
                OsString::from("-jar"),
                OsString::from("/opt/cal/CalendarApp.jar"),
            ]
        );

        let (overlay, args) = orchestrator.overlay_command();
        assert_eq!(overlay, PathBuf::from("/opt/cal/CalendarWallpaper.exe"));
        assert_eq!(args.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_until_stops_started_gui() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("CalendarApp.jar"), "PK").unwrap();
        let java = temp.path().join("fake-java");
        std::fs::write(&java, "#!/bin/sh\necho started\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut runtime = config(true, false);
        runtime.java_command = Some(java.display().to_string());
        let mut orchestrator = Orchestrator::new(temp.path(), runtime);
        let mut states = orchestrator.subscribe();

        let shutdown = async move {
            while *states.borrow_and_update() != LauncherState::Running {
                if states.changed().await.is_err() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        let started = std::time::Instant::now();
        orchestrator.run_until(shutdown).await.unwrap();
        assert_eq!(orchestrator.state(), LauncherState::Stopped);
        assert!(!orchestrator.is_started(Component::Gui));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
