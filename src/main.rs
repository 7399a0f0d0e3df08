use std::sync::Arc;
use std::time::Duration;

use q3scan_rs::ports::ScanMode;
use q3scan_rs::reporter::Reporter;
use q3scan_rs::scanner::Scanner;
use q3scan_rs::transport::UdpTransport;
use q3scan_rs::types::ScanConfig;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

/// q3scan-rs — Quake III server and QWFWD proxy port scanner.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "q3scan-rs",
    version,
    about = "Quake III server and QWFWD proxy port scanner.",
    after_help = "examples:
  q3scan-rs --pool 512 --timeout 4 full aim.pm   full scan with 512 workers and a 4.0s timeout
  q3scan-rs fast aim.pm                          fast scan with default parameters
  q3scan-rs -t 5 range 27960 27970 aim.pm        scan ports 27960-27970 with a 5.0s timeout"
)]
struct Cli {
    /// Max concurrent probes in the worker pool.
    #[arg(short, long, value_name = "threads", global = true, default_value_t = ScanConfig::DEFAULT_POOL)]
    pool: usize,

    /// Per-port query timeout in seconds (fractions allowed).
    #[arg(short, long, value_name = "seconds", global = true, default_value_t = ScanConfig::DEFAULT_TIMEOUT_SECS, value_parser = parse_timeout)]
    timeout: f64,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fast scan using the most frequent ports.
    Fast(HostArg),
    /// Full scan over the whole port range 1-65535.
    Full(HostArg),
    /// Scan a specific inclusive port range.
    Range {
        #[arg(value_name = "start")]
        start: u16,
        #[arg(value_name = "end")]
        end: u16,
        /// Also probe the range for QWFWD proxies.
        #[arg(short = 'w', long = "with-proxy")]
        with_proxy: bool,
        #[command(flatten)]
        host: HostArg,
    },
}

#[derive(Debug, Clone, Args)]
struct HostArg {
    /// Host to be scanned.
    host: String,
}

impl Mode {
    fn into_parts(self) -> Result<(String, ScanMode)> {
        Ok(match self {
            Mode::Fast(h) => (h.host, ScanMode::Fast),
            Mode::Full(h) => (h.host, ScanMode::Full),
            Mode::Range {
                start,
                end,
                with_proxy,
                host,
            } => (host.host, ScanMode::range(start, end, with_proxy)?),
        })
    }
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {s}"));
    }
    Ok(secs)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = ScanConfig::new(cli.pool, Duration::from_secs_f64(cli.timeout));
    let (host, mode) = cli.mode.into_parts()?;

    let reporter = Arc::new(Reporter::stdout());
    let scanner = Scanner::new(host, config, Arc::new(UdpTransport), reporter.clone());
    let summary = scanner.run(mode).await?;
    reporter.finish().context("failed to finalize console output")?;

    log::info!(
        "{} probes, {} servers, {} proxies",
        summary.total_probes(),
        summary.servers,
        summary.proxies
    );
    Ok(())
}
