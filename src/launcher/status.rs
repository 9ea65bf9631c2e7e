//! `--status` and `--kill`.

use std::path::{Path, PathBuf};
use sysinfo::System;

use crate::config::RuntimeConfiguration;
use crate::preflight::probe_version;

/// Per-user data directory of the calendar application.
pub const DATA_DIR_NAME: &str = ".calendarapp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentProcess {
    pub pid: u32,
    pub name: String,
}

pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

pub fn print_status(app_dir: &Path, config_path: &Path, config: &RuntimeConfiguration) {
    println!("=== Desktop Calendar Status ===");
    println!("Application directory: {}", app_dir.display());
    println!(
        "Configuration: {}{}",
        config_path.display(),
        if config_path.is_file() { "" } else { " (missing)" }
    );

    for (label, name) in [("GUI archive", config.gui_archive()), ("Overlay", config.overlay_exe())] {
        let path = app_dir.join(name);
        let state = if path.is_file() { "[OK]" } else { "[MISSING]" };
        println!("{} {}: {}", state, label, path.display());
    }

    println!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);

    let java = config.java_runtime();
    let probe = probe_version("java", java, "-version", "install a Java runtime");
    if probe.found {
        println!("Java: {}", probe.message);
    } else {
        println!("Java: not found ({})", java);
    }

    match data_dir() {
        Some(dir) if dir.is_dir() => println!("Calendar data: {}", dir.display()),
        Some(dir) => println!("Calendar data: {} (not created yet)", dir.display()),
        None => println!("Calendar data: home directory unknown"),
    }

    let running = find_component_processes(config);
    if running.is_empty() {
        println!("Running components: none");
    } else {
        println!("Running components:");
        for process in running {
            println!("  {} {}", process.pid, process.name);
        }
    }
}

/// Processes other than this one that run the configured components.
pub fn find_component_processes(config: &RuntimeConfiguration) -> Vec<ComponentProcess> {
    let targets = [config.gui_archive(), config.overlay_exe()];
    let own_pid = std::process::id();
    let sys = System::new_all();

    let mut found: Vec<ComponentProcess> = sys
        .processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter_map(|(pid, process)| {
            let name = process.name().to_string_lossy().into_owned();
            let cmd: Vec<String> = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            matches_component(&name, &cmd, &targets).then_some(ComponentProcess {
                pid: pid.as_u32(),
                name,
            })
        })
        .collect();
    found.sort_by_key(|p| p.pid);
    found
}

/// Kill running component processes; returns how many were signalled.
pub fn kill_components(config: &RuntimeConfiguration) -> usize {
    let targets = find_component_processes(config);
    if targets.is_empty() {
        println!("No running components found");
        return 0;
    }
    let sys = System::new_all();
    let mut killed = 0;
    for target in &targets {
        if let Some(process) = sys.process(sysinfo::Pid::from_u32(target.pid)) {
            if process.kill() {
                println!("[launcher] terminated {} ({})", target.name, target.pid);
                killed += 1;
            } else {
                println!("  [WARN] could not terminate {} ({})", target.name, target.pid);
            }
        }
    }
    killed
}

/// A process belongs to a component when its executable name is one of the
/// targets or any argument names one (`java -jar .../CalendarApp.jar`).
pub fn matches_component(name: &str, cmd: &[String], targets: &[&str]) -> bool {
    targets.iter().any(|target| {
        name.eq_ignore_ascii_case(target)
            || cmd.iter().any(|arg| {
                Path::new(arg)
                    .file_name()
                    .is_some_and(|file| file.to_string_lossy().eq_ignore_ascii_case(target))
            })
    })
}
