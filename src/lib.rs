pub mod bootconfig;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod guest;
pub mod installer;
pub mod media;

use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::bootconfig::BootConfig;
use crate::executor::CommandExecutor;

pub use crate::error::VirtstageError;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Stages install media for the profile and prints the resulting plan.
///
/// Runs the reachability check before the potentially slow `prepare()`.
/// Staged media are cleaned up after the plan is printed unless `--keep`
/// was given; a staging failure cleans up before the error propagates
/// (the installer guarantees that itself).
pub fn run_stage(opts: &cli::StageArgs, executor: &dyn CommandExecutor) -> Result<()> {
    let profile = config::load_profile(opts.file.as_path())
        .with_context(|| format!("failed to load profile from {}", opts.file))?;
    profile.validate().context("profile validation failed")?;

    let mut installer = profile.install.to_installer()?;
    installer
        .check_location()
        .context("install location check failed")?;

    if let (Some(family), version) = installer.detect_distro() {
        info!(
            "detected install source: {} {}",
            family,
            version.as_deref().unwrap_or("(unknown version)")
        );
    }

    // Dry run skips external tools only; staging copies still need the
    // scratch directory.
    if !profile.scratch_dir.exists() {
        fs::create_dir_all(&profile.scratch_dir)
            .with_context(|| format!("failed to create directory: {}", profile.scratch_dir))?;
    }

    installer
        .prepare(executor, &profile.scratch_dir)
        .context("failed to stage install media")?;

    let phase = installer.has_install_phase();
    let mut boot = BootConfig::default();
    bootconfig::alter_boot_config(&installer, &profile.guest, phase, &mut boot);

    print_plan(&installer, &boot)?;

    if opts.keep {
        for path in installer.tmp_files() {
            info!("keeping staged file: {}", path);
        }
    } else if let Err(e) = installer.cleanup() {
        warn!("cleanup after staging failed: {}", e);
    }

    Ok(())
}

/// Prints the boot configuration the installer would write, without
/// staging anything.
pub fn run_plan(opts: &cli::PlanArgs) -> Result<()> {
    let profile = config::load_profile(opts.file.as_path())
        .with_context(|| format!("failed to load profile from {}", opts.file))?;
    profile.validate().context("profile validation failed")?;

    let installer = profile.install.to_installer()?;
    let mut boot = BootConfig::default();
    bootconfig::alter_boot_config(&installer, &profile.guest, opts.install_phase, &mut boot);

    let yaml = serde_yaml::to_string(&boot).context("failed to render boot configuration")?;
    println!("{}", yaml.trim_end());
    Ok(())
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let profile = config::load_profile(opts.file.as_path())?;
    profile.validate().context("profile validation failed")?;
    info!("validation successful:\n{:#?}", profile);
    Ok(())
}

fn print_plan(installer: &installer::Installer, boot: &BootConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(boot).context("failed to render boot configuration")?;
    println!("{}", yaml.trim_end());
    for device in installer.install_devices() {
        println!("install device: {} {}", device.role, device.path);
    }
    Ok(())
}
