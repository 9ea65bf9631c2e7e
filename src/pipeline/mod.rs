//! Full build composition.
//!
//! [`build_all`] runs every stage in order and records each result. A failed
//! stage never stops the stages after it; the report decides whether the
//! build as a whole was a full or partial success.

use crate::build::gui::GuiBuilder;
use crate::build::overlay::OverlayBuilder;
use crate::build::StepOutcome;
use crate::bundle::StandaloneBundler;
use crate::config::BuildConfiguration;
use crate::dist::DistributionAssembler;
use crate::preflight::probe_toolchain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Start the GUI and overlay from clean build trees.
    pub clean: bool,
    pub standalone: bool,
    /// Run the GUI self-test after a successful GUI build.
    pub run_tests: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clean: true,
            standalone: false,
            run_tests: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Full,
    Partial,
}

#[derive(Debug)]
pub struct StageResult {
    pub stage: &'static str,
    /// Error text carries the full context chain.
    pub result: Result<StepOutcome, String>,
}

impl StageResult {
    fn record(stage: &'static str, result: anyhow::Result<StepOutcome>) -> Self {
        let result = result.map_err(|e| {
            println!("[FAIL] {}: {:#}", stage, e);
            format!("{:#}", e)
        });
        Self { stage, result }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub stages: Vec<StageResult>,
    /// Components absent from the distribution; only set by [`build_all`].
    pub missing: Vec<String>,
    pub dist_dir: std::path::PathBuf,
}

impl BuildReport {
    pub fn status(&self) -> BuildStatus {
        if self.stages.iter().all(StageResult::succeeded) && self.missing.is_empty() {
            BuildStatus::Full
        } else {
            BuildStatus::Partial
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn print_summary(&self) {
        match self.status() {
            BuildStatus::Full => println!("\n=== BUILD SUCCESSFUL ==="),
            BuildStatus::Partial => println!("\n=== BUILD PARTIALLY SUCCESSFUL ==="),
        }
        for stage in &self.stages {
            match &stage.result {
                Ok(StepOutcome::Skipped { reason }) => {
                    println!("  [SKIP] {}: {}", stage.stage, reason)
                }
                Ok(_) => println!("  [OK] {}", stage.stage),
                Err(e) => println!("  [FAIL] {}: {}", stage.stage, e),
            }
        }
        println!("Distribution: {}", self.dist_dir.display());
        if !self.missing.is_empty() {
            println!("Missing components: {}", self.missing.join(", "));
        }
    }
}

pub const STAGE_GUI: &str = "gui";
pub const STAGE_SELF_TEST: &str = "gui self-test";
pub const STAGE_OVERLAY: &str = "overlay";
pub const STAGE_LAUNCHER: &str = "launcher";
pub const STAGE_DIST: &str = "distribution";
pub const STAGE_STANDALONE: &str = "standalone";

/// One GUI build step, run on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GuiStep {
    Clean,
    Compile,
    Resources,
    Jar,
}

impl GuiStep {
    pub fn stage(self) -> &'static str {
        match self {
            Self::Clean => "gui clean",
            Self::Compile => "gui compile",
            Self::Resources => "gui resources",
            Self::Jar => "gui archive",
        }
    }
}

/// probe -> GUI -> overlay -> launcher -> distribution -> standalone.
pub fn build_all(config: &BuildConfiguration, options: BuildOptions) -> BuildReport {
    println!("=== Building Desktop Calendar ===");
    println!("=== Checking Dependencies ===");
    let probe = probe_toolchain(config);
    probe.print_summary();
    if !probe.gui_toolchain_ok() {
        println!("  [WARN] javac or jar not found, the GUI build will fail");
    } else if !probe.all_found() {
        println!("  [WARN] some dependencies are missing, attempting build anyway");
    }

    let mut stages = Vec::new();
    stages.extend(gui_stages(config, options));
    stages.push(overlay_stage(config, options));
    stages.extend(distribution_stages(config));
    if options.standalone {
        stages.push(StageResult::record(
            STAGE_STANDALONE,
            StandaloneBundler::new(config).create(),
        ));
    }

    let missing = DistributionAssembler::new(config).missing_components();
    finish(config, stages, missing)
}

pub fn build_gui_only(config: &BuildConfiguration, options: BuildOptions) -> BuildReport {
    let stages = gui_stages(config, options);
    finish(config, stages, Vec::new())
}

pub fn build_overlay_only(config: &BuildConfiguration, options: BuildOptions) -> BuildReport {
    let stages = vec![overlay_stage(config, options)];
    finish(config, stages, Vec::new())
}

/// Run `step` against the current build tree; nothing before or after it.
pub fn run_gui_step(config: &BuildConfiguration, step: GuiStep) -> BuildReport {
    println!("=== GUI step: {} ===", step.stage());
    let gui = GuiBuilder::new(config);
    let result = match step {
        GuiStep::Clean => gui.clean().map(|()| StepOutcome::Done),
        GuiStep::Compile => gui.compile(),
        GuiStep::Resources => gui.copy_resources().map(|copied| {
            println!("[gui] {} resource files copied", copied);
            StepOutcome::Done
        }),
        GuiStep::Jar => gui.create_archive(&config.artifacts.gui_archive),
    };
    finish(config, vec![StageResult::record(step.stage(), result)], Vec::new())
}

/// Launcher and distribution documents over whatever is already built.
pub fn create_distribution_only(config: &BuildConfiguration) -> BuildReport {
    let stages = distribution_stages(config);
    finish(config, stages, Vec::new())
}

fn gui_stages(config: &BuildConfiguration, options: BuildOptions) -> Vec<StageResult> {
    println!("=== Building GUI ===");
    let gui = GuiBuilder::new(config);
    let built = if options.clean {
        gui.quick_build()
    } else {
        gui.incremental_build()
    };
    let ok = built.is_ok();
    let mut stages = vec![StageResult::record(STAGE_GUI, built)];
    if ok && options.run_tests {
        stages.push(StageResult::record(
            STAGE_SELF_TEST,
            gui.run_self_test().map(|()| StepOutcome::Done),
        ));
    }
    stages
}

fn overlay_stage(config: &BuildConfiguration, options: BuildOptions) -> StageResult {
    println!("=== Building Overlay ===");
    let overlay = OverlayBuilder::new(config);
    let result = if options.clean && config.platform.supports_overlay() {
        overlay.clean().and_then(|()| overlay.build())
    } else {
        overlay.build()
    };
    StageResult::record(STAGE_OVERLAY, result)
}

fn distribution_stages(config: &BuildConfiguration) -> Vec<StageResult> {
    let assembler = DistributionAssembler::new(config);
    vec![
        StageResult::record(STAGE_LAUNCHER, assembler.write_entry_point()),
        StageResult::record(STAGE_DIST, assembler.assemble()),
    ]
}

fn finish(config: &BuildConfiguration, stages: Vec<StageResult>, missing: Vec<String>) -> BuildReport {
    BuildReport {
        stages,
        missing,
        dist_dir: config.layout.dist_dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostPlatform;
    use tempfile::TempDir;

    #[test]
    fn test_failures_do_not_stop_later_stages() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new(temp.path()).with_platform(HostPlatform::Linux);

        let report = build_all(&config, BuildOptions::default());
        assert!(!report.stage(STAGE_GUI).unwrap().succeeded());
        assert!(report.stage(STAGE_OVERLAY).unwrap().succeeded());
        assert!(!report.stage(STAGE_LAUNCHER).unwrap().succeeded());
        assert!(report.stage(STAGE_DIST).unwrap().succeeded());
        assert!(report.stage(STAGE_STANDALONE).is_none());
        assert_eq!(report.status(), BuildStatus::Partial);
        assert_eq!(report.missing, vec!["CalendarApp.jar".to_string()]);
        assert!(config.config_document_path().is_file());
    }

    #[test]
    fn test_distribution_only_with_launcher_is_full() {
        let temp = TempDir::new().unwrap();
        let launcher = temp.path().join("calendar-launcher");
        std::fs::write(&launcher, "bin").unwrap();
        let config = BuildConfiguration::new(temp.path())
            .with_platform(HostPlatform::Linux)
            .with_launcher_binary(Some(launcher));
        std::fs::create_dir_all(&config.layout.dist_dir).unwrap();
        std::fs::write(config.gui_archive_path(), "jar").unwrap();

        let report = create_distribution_only(&config);
        assert_eq!(report.status(), BuildStatus::Full);
        assert_eq!(report.stages.len(), 2);
    }

    #[test]
    fn test_clean_step_runs_alone() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new(temp.path()).with_platform(HostPlatform::Linux);
        std::fs::create_dir_all(&config.layout.build_dir).unwrap();
        std::fs::write(config.layout.build_dir.join("Main.class"), "old").unwrap();

        let report = run_gui_step(&config, GuiStep::Clean);
        assert_eq!(report.status(), BuildStatus::Full);
        assert_eq!(report.stages.len(), 1);
        assert!(report.stage("gui clean").is_some());
        assert!(!config.layout.build_dir.exists());
        assert!(!config.layout.dist_dir.exists());
    }

    #[test]
    fn test_compile_step_without_sources_fails() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new(temp.path()).with_platform(HostPlatform::Linux);
        let report = run_gui_step(&config, GuiStep::Compile);
        assert_eq!(report.status(), BuildStatus::Partial);
        assert!(!report.stage("gui compile").unwrap().succeeded());
    }

    #[test]
    fn test_self_test_only_after_gui_success() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfiguration::new(temp.path()).with_platform(HostPlatform::Linux);
        let report = build_gui_only(
            &config,
            BuildOptions {
                run_tests: true,
                ..Default::default()
            },
        );
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.status(), BuildStatus::Partial);
    }
}
