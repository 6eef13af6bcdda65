#![deny(unsafe_code)]

//! ngctl CLI: command-line control plane for a syslog-ng style daemon.
//!
//! Exit codes: 0 on success, 1 for usage or configuration errors, 2 when the
//! daemon or the control socket could not satisfy the request (including any
//! stats row that failed to parse).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use ngctl_config::AppConfig;
use ngctl_core::{Context, Controller, Stat, StatsErrors, UnixSocketControlChannel, metrics};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: u8 = 1;
const DEFAULT_CONFIG_FILE: &str = "ngctl.toml";
const EXIT_FAILURE: u8 = 2;

/// Query and control a running syslog-ng daemon over its control socket.
#[derive(Parser)]
#[command(name = "ngctl", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file [default: ngctl.toml, skipped if absent].
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control socket path (overrides CONTROL_SOCKET and the config file).
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Per-command timeout in seconds, 0 to wait indefinitely.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon is answering.
    Ping,

    /// Reload the daemon's configuration.
    Reload,

    /// Print the daemon's license information.
    ShowLicenseInfo,

    /// Print per-source counters.
    #[command(args_conflicts_with_subcommands = true)]
    Stats {
        /// Print stats as a JSON array.
        #[arg(long)]
        json: bool,

        #[command(subcommand)]
        format: Option<StatsFormat>,
    },
}

#[derive(Subcommand)]
enum StatsFormat {
    /// Print stats in the Prometheus text exposition format.
    Prometheus,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    init_tracing(cli.verbose, &config.logging.level);
    debug!(
        socket = %config.control.socket_path,
        timeout_secs = config.control.timeout_secs,
        "resolved configuration"
    );

    let controller = Controller::new(Arc::new(
        UnixSocketControlChannel::new(&config.control.socket_path)
            .with_max_response_bytes(config.control.max_response_bytes),
    ));
    let ctx = match config.control.timeout() {
        Some(timeout) => Context::background().with_timeout(timeout),
        None => Context::background(),
    };

    let outcome = match cli.command {
        Commands::Ping => cmd_ping(&controller, &ctx).await,
        Commands::Reload => cmd_reload(&controller, &ctx).await,
        Commands::ShowLicenseInfo => cmd_license(&controller, &ctx).await,
        Commands::Stats {
            format: Some(StatsFormat::Prometheus),
            ..
        } => cmd_stats_prometheus(&controller, &ctx).await,
        Commands::Stats { json, format: None } => cmd_stats(&controller, &ctx, json).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// File (if present), then `CONTROL_SOCKET`, then command-line flags.
async fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).await?,
        None => load_default_config_file().await?,
    };
    config.apply_env()?;
    if let Some(socket) = &cli.socket {
        config.control.socket_path = socket.display().to_string();
    }
    if let Some(timeout) = cli.timeout {
        config.control.timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}

async fn load_config_file(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))
}

/// The implicit `ngctl.toml` is optional; an explicit `--config` is not.
async fn load_default_config_file() -> Result<AppConfig> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        load_config_file(path).await
    } else {
        Ok(AppConfig::default())
    }
}

async fn cmd_ping(controller: &Controller, ctx: &Context) -> Result<()> {
    controller
        .ping(ctx)
        .await
        .context("An error occurred while pinging syslog-ng")
}

async fn cmd_reload(controller: &Controller, ctx: &Context) -> Result<()> {
    info!("Reloading daemon configuration");
    controller
        .reload(ctx)
        .await
        .context("An error occurred while reloading syslog-ng config")
}

async fn cmd_license(controller: &Controller, ctx: &Context) -> Result<()> {
    let info = controller
        .license_info(ctx)
        .await
        .context("An error occurred while getting license info")?;
    println!("{info}");
    Ok(())
}

async fn cmd_stats(controller: &Controller, ctx: &Context, json: bool) -> Result<()> {
    let rsp = controller
        .stats(ctx)
        .await
        .context("An error occurred while querying stats")?;

    let mut out = std::io::stdout().lock();
    if json {
        write_stats_json(&rsp.stats, &mut out)?;
    } else {
        write_stats_text(&rsp.stats, &mut out)?;
    }
    out.flush()?;

    check_parse_errors(rsp.errors, "An error occurred while querying stats")
}

async fn cmd_stats_prometheus(controller: &Controller, ctx: &Context) -> Result<()> {
    let prom = controller
        .stats_prometheus(ctx)
        .await
        .context("An error occurred while querying prometheus stats")?;

    let mut out = std::io::stdout().lock();
    metrics::write_text(&prom.families, &mut out)
        .context("An error occurred while encoding prometheus stats")?;
    out.flush()?;

    check_parse_errors(prom.errors, "An error occurred while querying prometheus stats")
}

/// Partial output has already been written; surface the rejected rows.
fn check_parse_errors(errors: StatsErrors, what: &'static str) -> Result<()> {
    let count = errors.len();
    errors
        .into_result()
        .with_context(|| format!("{what}: {count} stat line(s) could not be parsed"))
}

fn write_stats_text<W: Write>(stats: &[Stat], out: &mut W) -> std::io::Result<()> {
    for stat in stats {
        writeln!(out, "{stat}")?;
    }
    Ok(())
}

fn write_stats_json<W: Write>(stats: &[Stat], out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, stats)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ngctl_core::stats::parse_stats;
    use pretty_assertions::assert_eq;

    const RAW: &str = "SourceName;SourceId;SourceInstance;State;Type;Number\n\
        src.internal;s_local#0;;a;processed;42\n\
        dst.file;d_messages#0;/var/log/messages;o;dropped;7\n";

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["ngctl", "ping"]).unwrap();
        assert!(matches!(cli.command, Commands::Ping));

        let cli = Cli::try_parse_from(["ngctl", "show-license-info"]).unwrap();
        assert!(matches!(cli.command, Commands::ShowLicenseInfo));

        let cli = Cli::try_parse_from(["ngctl", "stats", "prometheus"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Stats {
                format: Some(StatsFormat::Prometheus),
                ..
            }
        ));

        let cli = Cli::try_parse_from(["ngctl", "-s", "/tmp/x.ctl", "-t", "0", "stats", "--json"])
            .unwrap();
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/x.ctl")));
        assert_eq!(cli.timeout, Some(0));
        assert!(matches!(
            cli.command,
            Commands::Stats {
                json: true,
                format: None
            }
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        let err = Cli::try_parse_from(["ngctl", "restart"]).err().unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_cli_rejects_json_with_prometheus() {
        let err = Cli::try_parse_from(["ngctl", "stats", "--json", "prometheus"])
            .err()
            .unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_write_stats_text_uses_row_format() {
        let stats = parse_stats(RAW).stats;
        let mut out = Vec::new();
        write_stats_text(&stats, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "src.internal;s_local#0;;a;processed;42\n\
             dst.file;d_messages#0;/var/log/messages;o;dropped;7\n"
        );
    }

    #[test]
    fn test_write_stats_json() {
        let stats = parse_stats(RAW).stats;
        let mut out = Vec::new();
        write_stats_json(&stats, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["source_name"], "src.internal");
        assert_eq!(value[0]["source_state"], "a");
        assert_eq!(value[1]["type"], "dropped");
        assert_eq!(value[1]["number"], 7);
    }

    #[test]
    fn test_check_parse_errors() {
        assert!(check_parse_errors(StatsErrors::new(), "stats").is_ok());

        let errors = parse_stats("h\nbroken\n").errors;
        let err = check_parse_errors(errors, "stats").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("stats: 1 stat line(s) could not be parsed"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
    }

    #[tokio::test]
    async fn test_load_config_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = ngctl_test_utils::TestConfigBuilder::new()
            .socket_path("/from/file.ctl")
            .timeout_secs(30)
            .max_response_bytes(4096)
            .log_level("debug")
            .write_to(dir.path());

        let cli = Cli::try_parse_from([
            "ngctl",
            "--config",
            path.to_str().unwrap(),
            "--socket",
            "/from/flag.ctl",
            "--timeout",
            "2",
            "ping",
        ])
        .unwrap();

        let config = load_config(&cli).await.unwrap();
        assert_eq!(config.control.socket_path, "/from/flag.ctl");
        assert_eq!(config.control.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.control.max_response_bytes, 4096);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_load_config_absent_default_file_uses_defaults() {
        let cli = Cli::try_parse_from(["ngctl", "--socket", "/tmp/s.ctl", "ping"]).unwrap();
        assert_eq!(cli.config, None);

        let config = load_config(&cli).await.unwrap();
        assert_eq!(config.control.timeout_secs, 10);
        assert_eq!(config.logging.level, "warn");
    }

    #[tokio::test]
    async fn test_load_config_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.toml");
        let cli = Cli::try_parse_from(["ngctl", "--config", path.to_str().unwrap(), "ping"])
            .unwrap();

        let err = load_config(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("typo.toml"), "{err:#}");
    }

    #[test]
    fn test_built_config_is_validated() {
        let config = ngctl_test_utils::TestConfigBuilder::new()
            .log_level("loud")
            .build();
        assert!(config.validate().is_err());

        let config = ngctl_test_utils::TestConfigBuilder::new()
            .max_response_bytes(0)
            .build();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ngctl.toml");
        std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();

        let cli = Cli::try_parse_from(["ngctl", "--config", path.to_str().unwrap(), "ping"])
            .unwrap();
        assert!(load_config(&cli).await.is_err());
    }
}
