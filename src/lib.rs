//! Build orchestration and launcher for the Desktop Calendar.
//!
//! The calendar ships as two independent programs: a Java GUI packed into a
//! runnable archive and a native Windows wallpaper overlay. This crate builds
//! both, assembles them into a distribution directory together with a
//! launcher, and optionally folds the whole distribution into a single
//! self-extracting executable.
//!
//! - **Configuration** - build settings and the launcher's runtime document
//! - **Preflight** - advisory toolchain probing
//! - **Builders** - GUI compile/archive and overlay build
//! - **Distribution** - launcher install, quick-start docs, build info
//! - **Bundle** - standalone payload format
//! - **Launcher** - starts, relays and stops the two components
//!
//! # Architecture
//!
//! ```text
//! calendar-build
//!     │
//!     ├── preflight::probe_toolchain
//!     ├── build::gui::GuiBuilder ─────────► dist/CalendarApp.jar
//!     ├── build::overlay::OverlayBuilder ─► dist/CalendarWallpaper.exe
//!     ├── dist::DistributionAssembler ────► dist/DesktopCalendarLauncher
//!     │                                     dist/desktop_calendar_config.json
//!     └── bundle::StandaloneBundler ──────► dist/DesktopCalendar.exe
//!
//! calendar-launcher
//!     │
//!     ├── launcher::extract (bundled only)
//!     └── launcher::Orchestrator ──► overlay + GUI child processes
//! ```

pub mod build;
pub mod bundle;
pub mod config;
pub mod dist;
pub mod error;
pub mod launcher;
pub mod pipeline;
pub mod preflight;
pub mod process;

pub use config::{BuildConfiguration, HostPlatform, RuntimeConfiguration};
pub use error::StepError;
