//! patchscan - decide which game files need to be patched
//!
//! Compares the authoritative patch manifest against the local installation
//! and the metadata cache from the previous run, and lists every file that
//! must be downloaded again.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use patchscan_compare::UpdateChecker;
use patchscan_config::{Config, ConfigLoader, LoggingConfig};
use patchscan_types::WorkerCount;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod display;
mod json_output;
mod progress;
mod sources;

use json_output::{CheckResultJson, OperationMetadata};
use progress::ProgressDisplay;
use sources::{JsonCacheStore, JsonManifestSource, PeLaaDetector};

/// Exit code for a run interrupted with Ctrl-C
const EXIT_CANCELLED: u8 = 130;

/// patchscan - patch update checker
#[derive(Parser)]
#[command(
    name = "patchscan",
    version = env!("CARGO_PKG_VERSION"),
    about = "Decide which game files need to be patched",
    long_about = "patchscan compares the patch manifest against the local installation\n\
                  and the metadata cache from the previous run, and lists every file\n\
                  that must be downloaded again. File contents are never hashed."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check which files need an update
    Check {
        /// Game installation root
        #[arg(long)]
        install_dir: Option<PathBuf>,
        /// Manifest file (JSON array of {name, hash, size})
        #[arg(long)]
        manifest: Option<String>,
        /// Metadata cache file (JSON object keyed by manifest name)
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Let files in the mods directory override data files
        #[arg(long)]
        mods: bool,
        /// Keep a large-address-aware patched executable
        #[arg(long)]
        laa: bool,
        /// Number of scan workers
        #[arg(short, long)]
        threads: Option<usize>,
        /// Skip the directory pre-scan
        #[arg(long)]
        no_prescan: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Write the default configuration to a file
        #[arg(long, value_name = "PATH")]
        generate: Option<PathBuf>,
    },
}

struct CheckArgs {
    install_dir: Option<PathBuf>,
    manifest: Option<String>,
    cache: Option<PathBuf>,
    mods: bool,
    laa: bool,
    threads: Option<usize>,
    no_prescan: bool,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    init_logging(cli.debug, cli.quiet, cli.verbose, &config.logging)?;

    info!("patchscan v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Check {
            install_dir,
            manifest,
            cache,
            mods,
            laa,
            threads,
            no_prescan,
            json,
        } => {
            let args = CheckArgs {
                install_dir,
                manifest,
                cache,
                mods,
                laa,
                threads,
                no_prescan,
                json,
            };
            check_command(config, args, cli.quiet, cli.verbose).await
        }
        Commands::Config { default, generate } => {
            config_command(&config, default, generate)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(debug: bool, quiet: bool, verbose: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("Invalid log filter '{}': {}", level, e))?;

    // Logs go to stderr so that JSON output on stdout stays parseable
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let result = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn apply_check_args(config: &mut Config, args: &CheckArgs) -> Result<()> {
    if let Some(install_dir) = &args.install_dir {
        config.install.install_dir.clone_from(install_dir);
    }
    if let Some(manifest) = &args.manifest {
        config.download.manifest_location.clone_from(manifest);
    }
    if let Some(cache) = &args.cache {
        config.download.cache_location.clone_from(cache);
    }
    if args.mods {
        config.install.mod_files_enabled = true;
    }
    if args.laa {
        config.install.large_address_aware = true;
    }
    if let Some(threads) = args.threads {
        config.scan.worker_count = WorkerCount::new(threads).map_err(|e| anyhow!(e))?;
    }
    if args.no_prescan {
        config.scan.prescan_enabled = false;
    }
    Ok(())
}

async fn check_command(
    mut config: Config,
    args: CheckArgs,
    quiet: bool,
    verbose: bool,
) -> Result<ExitCode> {
    apply_check_args(&mut config, &args)?;

    info!("Install dir: {}", config.install.install_dir.display());
    info!("Manifest: {}", config.download.manifest_location);
    info!("Cache: {}", config.download.cache_location.display());
    info!("Workers: {}", config.scan.worker_count.get());

    if !quiet && !args.json {
        println!(
            "{} Checking {} against {}",
            style("→").green().bold(),
            style(config.install.install_dir.display()).cyan(),
            style(&config.download.manifest_location).cyan()
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling check");
                cancel.cancel();
            }
        })
    };

    let checker = UpdateChecker::new(&config);
    let display = ProgressDisplay::start(
        checker.progress(),
        quiet || args.json,
        Duration::from_millis(100),
    );

    let cache = JsonCacheStore::new(&config.download.cache_location);
    let result = checker
        .check(
            &JsonManifestSource,
            &cache,
            Arc::new(PeLaaDetector),
            &cancel,
        )
        .await;

    display.finish().await;
    ctrl_c.abort();

    let metadata = OperationMetadata::now(
        &config.install.install_dir,
        &config.download.manifest_location,
    );

    match result {
        Ok(report) => {
            if args.json {
                println!(
                    "{}",
                    CheckResultJson::from_report(metadata, &report).to_json_string()?
                );
            } else if !quiet {
                display::print_report(&report, verbose);
            } else {
                for entry in &report.to_update {
                    println!("{}", entry.name);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() => {
            if args.json {
                println!(
                    "{}",
                    CheckResultJson::from_error(metadata, &e).to_json_string()?
                );
            } else {
                eprintln!("{} Check cancelled", style("✗").yellow().bold());
            }
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e) => {
            if args.json {
                println!(
                    "{}",
                    CheckResultJson::from_error(metadata, &e).to_json_string()?
                );
                Ok(ExitCode::FAILURE)
            } else {
                Err(anyhow::Error::new(e).context("Update check failed"))
            }
        }
    }
}

fn config_command(config: &Config, default: bool, generate: Option<PathBuf>) -> Result<()> {
    if let Some(path) = generate {
        ConfigLoader::generate_default_config(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Default configuration written to {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        return Ok(());
    }

    let (label, shown) = if default {
        ("Default configuration:", Config::default())
    } else {
        ("Current configuration:", config.clone())
    };

    println!("{} {}", style("⚙").blue().bold(), label);
    print!("{}", serde_yaml::to_string(&shown)?);
    println!(
        "# {} logical CPUs available",
        style(num_cpus::get()).dim()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CheckArgs {
        CheckArgs {
            install_dir: Some(PathBuf::from("/games/pso2")),
            manifest: Some("manifest.json".to_string()),
            cache: Some(PathBuf::from("cache.json")),
            mods: true,
            laa: false,
            threads: Some(3),
            no_prescan: true,
            json: false,
        }
    }

    #[test]
    fn test_check_args_override_config() {
        let mut config = Config::default();
        apply_check_args(&mut config, &args()).unwrap();

        assert_eq!(config.install.install_dir, PathBuf::from("/games/pso2"));
        assert_eq!(config.download.manifest_location, "manifest.json");
        assert!(config.install.mod_files_enabled);
        assert!(!config.install.large_address_aware);
        assert_eq!(config.scan.worker_count.get(), 3);
        assert!(!config.scan.prescan_enabled);
    }

    #[test]
    fn test_invalid_thread_count_is_rejected() {
        let mut config = Config::default();
        let mut args = args();
        args.threads = Some(0);
        assert!(apply_check_args(&mut config, &args).is_err());
    }

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from([
            "patchscan",
            "check",
            "--install-dir",
            "/games/pso2",
            "--manifest",
            "m.json",
            "--cache",
            "c.json",
            "--laa",
            "--threads",
            "4",
            "--json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check {
                laa: true,
                json: true,
                threads: Some(4),
                ..
            }
        ));
    }
}
