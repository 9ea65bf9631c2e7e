//! Desktop Calendar launcher.
//!
//! Starts the wallpaper overlay and the calendar GUI from the directory the
//! launcher lives in, relays their output, and stops both on Ctrl+C. When the
//! executable carries a bundled payload it runs from a private extraction
//! directory instead.
//!
//! # Usage
//!
//! ```bash
//! DesktopCalendarLauncher              # components enabled in the config
//! DesktopCalendarLauncher --both       # GUI and overlay
//! DesktopCalendarLauncher --no-overlay # GUI only
//! DesktopCalendarLauncher --status
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use calendar_builder::config::RuntimeConfiguration;
use calendar_builder::launcher::extract::Extraction;
use calendar_builder::launcher::{default_app_dir, installed_config_path, status, Orchestrator};

#[derive(Parser)]
#[command(name = "calendar-launcher")]
#[command(author, version, about = "Launch the Desktop Calendar", long_about = None)]
struct Cli {
    /// Do not start the GUI
    #[arg(long, conflicts_with_all = ["both", "headless"])]
    no_gui: bool,

    /// Do not start the overlay
    #[arg(long, conflicts_with = "both")]
    no_overlay: bool,

    /// Start both components regardless of the configuration
    #[arg(long)]
    both: bool,

    /// Start only the GUI, with the AWT headless flag
    #[arg(long)]
    headless: bool,

    /// Runtime configuration document
    #[arg(long)]
    config: Option<PathBuf>,

    /// Application directory (default: the launcher's own directory)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Print installation and process status, then exit
    #[arg(long, conflicts_with = "kill")]
    status: bool,

    /// Terminate running calendar processes, then exit
    #[arg(long)]
    kill: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let exe = std::env::current_exe().context("locating launcher executable")?;
    // Held until exit; dropping it removes the extracted files.
    let extraction = if cli.dir.is_none() {
        Extraction::from_executable(&exe)?
    } else {
        None
    };

    let app_dir = match &extraction {
        Some(extraction) => extraction.path().to_path_buf(),
        None => default_app_dir(cli.dir.as_deref())?,
    };
    let config_path = match (&cli.config, &extraction) {
        (Some(path), _) => path.clone(),
        (None, Some(extraction)) => extraction.config_path(),
        (None, None) => installed_config_path(&app_dir),
    };

    let mut config =
        RuntimeConfiguration::load_or_create(&config_path, &RuntimeConfiguration::defaults())?;

    if cli.status {
        status::print_status(&app_dir, &config_path, &config);
        return Ok(());
    }
    if cli.kill {
        status::kill_components(&config);
        return Ok(());
    }

    if cli.both {
        config.auto_start_java = Some(true);
        config.auto_start_cpp = Some(true);
    }
    if cli.headless {
        config.auto_start_java = Some(true);
        config.auto_start_cpp = Some(false);
    }
    if cli.no_gui {
        config.auto_start_java = Some(false);
    }
    if cli.no_overlay {
        config.auto_start_cpp = Some(false);
    }

    let mut orchestrator = Orchestrator::new(&app_dir, config).headless(cli.headless);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("  [WARN] cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = orchestrator.run_until(shutdown).await;
    drop(extraction);
    result
}
