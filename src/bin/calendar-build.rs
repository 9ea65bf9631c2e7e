//! Desktop Calendar build CLI.
//!
//! # Usage
//!
//! ```bash
//! # Full build: GUI, overlay (Windows), launcher, distribution
//! calendar-build
//!
//! # Only the GUI archive, reusing the previous build tree
//! calendar-build --gui-only --no-clean
//!
//! # A single GUI step: clean, compile, resources or jar
//! calendar-build --gui-step compile
//!
//! # Probe the toolchain and exit
//! calendar-build --check-deps
//!
//! # Full build plus single-file executable (Windows)
//! calendar-build --standalone
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use calendar_builder::config::{
    locate_project_root, sibling_launcher_binary, BuildConfiguration, BuildOverrides,
};
use calendar_builder::error::StepError;
use calendar_builder::pipeline::{self, BuildOptions, BuildStatus, GuiStep};
use calendar_builder::preflight::probe_toolchain;

#[derive(Parser)]
#[command(name = "calendar-build")]
#[command(author, version, about = "Build the Desktop Calendar distribution", long_about = None)]
struct Cli {
    /// Build only the GUI archive
    #[arg(long, conflicts_with = "overlay_only")]
    gui_only: bool,

    /// Build only the native overlay
    #[arg(long)]
    overlay_only: bool,

    /// Run one GUI build step and nothing else
    #[arg(long, value_enum, conflicts_with_all = ["gui_only", "overlay_only", "create_dist"])]
    gui_step: Option<GuiStep>,

    /// Probe the toolchain and exit
    #[arg(long)]
    check_deps: bool,

    /// Only rewrite the launcher and distribution documents
    #[arg(long)]
    create_dist: bool,

    /// Also produce the single-file executable (Windows only)
    #[arg(long)]
    standalone: bool,

    /// Build on top of the existing build tree
    #[arg(long)]
    no_clean: bool,

    /// Build the overlay as a normal window instead of a wallpaper
    #[arg(long)]
    no_wallpaper: bool,

    /// Run the GUI self-test after building it
    #[arg(long)]
    test: bool,

    /// Project root (default: nearest ancestor containing control-app/)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Distribution directory, relative to the project root
    #[arg(long)]
    dist_dir: Option<PathBuf>,

    #[arg(long)]
    jar_name: Option<String>,

    #[arg(long)]
    overlay_name: Option<String>,

    #[arg(long)]
    launcher_name: Option<String>,

    #[arg(long)]
    config_name: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let root = match cli.project_root.clone() {
        Some(root) => root,
        None => {
            let cwd = std::env::current_dir()?;
            locate_project_root(&cwd).unwrap_or(cwd)
        }
    };

    let source_tree = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let config = BuildConfiguration::load(&root)?
        .with_overrides(BuildOverrides {
            dist_dir: cli.dist_dir.clone(),
            gui_archive: cli.jar_name.clone(),
            overlay_exe: cli.overlay_name.clone(),
            launcher: cli.launcher_name.clone(),
            config_document: cli.config_name.clone(),
            wallpaper_mode: cli.no_wallpaper.then_some(false),
        })
        .with_launcher_binary(sibling_launcher_binary())
        .with_launcher_source(source_tree.join("Cargo.toml").is_file().then_some(source_tree));

    if cli.standalone && !config.platform.supports_overlay() {
        let err = StepError::PlatformMismatch {
            operation: "--standalone".to_string(),
            supported: "Windows".to_string(),
        };
        eprintln!("[FAIL] {} (host: {})", err, config.platform.name());
        return Ok(false);
    }

    println!("Project root: {}", config.layout.root.display());
    println!("Platform: {}", config.platform.name());

    if cli.check_deps {
        println!("=== Checking Dependencies ===");
        let report = probe_toolchain(&config);
        report.print_summary();
        return Ok(report.all_found());
    }

    let options = BuildOptions {
        clean: !cli.no_clean,
        standalone: cli.standalone,
        run_tests: cli.test,
    };
    let report = if let Some(step) = cli.gui_step {
        pipeline::run_gui_step(&config, step)
    } else if cli.gui_only {
        pipeline::build_gui_only(&config, options)
    } else if cli.overlay_only {
        pipeline::build_overlay_only(&config, options)
    } else if cli.create_dist {
        pipeline::create_distribution_only(&config)
    } else {
        pipeline::build_all(&config, options)
    };

    report.print_summary();
    Ok(report.status() == BuildStatus::Full)
}
