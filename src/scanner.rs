use crate::dispatcher::Dispatcher;
use crate::ports::{self, ProbeKind, ScanMode, Stage};
use crate::probe;
use crate::reporter::Reporter;
use crate::transport::ProbeTransport;
use crate::types::{ProbeOutcome, ScanConfig, ScanSummary, Target, Userinfo};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transient line written after each hit while the stage keeps running.
pub const PROGRESS_PING: &str = "Scanning ...";

/// Runs the stages of a scan mode one after another against a single host.
///
/// - Each stage is parallelised through one shared `Dispatcher`.
/// - Hits are written as permanent lines in completion order.
/// - Probe failures never abort the scan; the elapsed time is always reported.
pub struct Scanner<W: Write + Send + 'static = std::io::Stdout> {
    host: String,
    config: ScanConfig,
    dispatcher: Dispatcher,
    transport: Arc<dyn ProbeTransport>,
    reporter: Arc<Reporter<W>>,
}

impl<W: Write + Send + 'static> Scanner<W> {
    pub fn new(
        host: impl Into<String>,
        config: ScanConfig,
        transport: Arc<dyn ProbeTransport>,
        reporter: Arc<Reporter<W>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.pool);
        Self {
            host: host.into(),
            config,
            dispatcher,
            transport,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Arc<Reporter<W>> {
        &self.reporter
    }

    /// Scan the host in `mode` and report a summary.
    pub async fn run(&self, mode: ScanMode) -> Result<ScanSummary> {
        let started = Instant::now();
        let mut summary = ScanSummary::default();

        log::info!(
            "scanning {} in {:?} mode (pool={}, timeout={:?})",
            self.host,
            mode,
            self.config.pool,
            self.config.timeout
        );

        for stage in ports::plan(mode) {
            if let Some(banner) = &stage.banner {
                self.permanent(banner)?;
            }
            let (probes, hits) = self.run_stage(stage).await?;
            summary.probes_by_stage.push(probes);
            match hits {
                StageHits::Servers(n) => summary.servers += n,
                StageHits::Proxies(n) => summary.proxies += n,
            }
        }

        summary.elapsed = started.elapsed();
        self.permanent(&format!("Completed in {}", format_elapsed(summary.elapsed)))?;
        log::debug!("scan summary: {summary:?}");
        Ok(summary)
    }

    async fn run_stage(&self, stage: Stage) -> Result<(usize, StageHits)> {
        let kind = stage.kind;
        let targets: Vec<Target> = stage
            .ports
            .into_iter()
            .map(|port| Target::new(self.host.clone(), port))
            .collect();
        log::debug!("{kind:?} stage: {} targets", targets.len());

        let transport = self.transport.clone();
        let reporter = self.reporter.clone();
        let timeout = self.config.timeout;
        let mut completions = self.dispatcher.dispatch(targets, move |target| {
            probe_task(kind, target, transport.clone(), reporter.clone(), timeout)
        });

        let mut hits = 0;
        while let Some(done) = completions.next().await {
            let line = match (&done.outcome, kind) {
                (ProbeOutcome::ServerInfo(info), ProbeKind::Server) => {
                    server_line(&done.target, info)
                }
                (ProbeOutcome::ProxyAlive, ProbeKind::Proxy) => proxy_line(&done.target),
                _ => continue,
            };
            hits += 1;
            self.permanent(&line)?;
            self.reporter
                .write_transient(PROGRESS_PING)
                .context("failed to write progress line")?;
        }

        let probes = completions.total();
        let hits = match kind {
            ProbeKind::Server => StageHits::Servers(hits),
            ProbeKind::Proxy => StageHits::Proxies(hits),
        };
        Ok((probes, hits))
    }

    fn permanent(&self, line: &str) -> Result<()> {
        self.reporter
            .write_permanent(line)
            .context("failed to write to console")
    }
}

enum StageHits {
    Servers(usize),
    Proxies(usize),
}

/// One pooled unit of work: announce the port, then probe it.
async fn probe_task<W: Write + Send + 'static>(
    kind: ProbeKind,
    target: Target,
    transport: Arc<dyn ProbeTransport>,
    reporter: Arc<Reporter<W>>,
    timeout: Duration,
) -> ProbeOutcome {
    let status = match kind {
        ProbeKind::Server => format!("Scanning port {target}"),
        ProbeKind::Proxy => format!("Scanning proxy {target}"),
    };
    if let Err(e) = reporter.write_transient(&status) {
        log::debug!("progress write failed: {e}");
    }
    match kind {
        ProbeKind::Server => probe::probe_server(transport.as_ref(), &target, timeout).await,
        ProbeKind::Proxy => probe::probe_proxy(transport.as_ref(), &target, timeout).await,
    }
}

/// Permanent line for a discovered game server.
pub fn server_line(target: &Target, info: &Userinfo) -> String {
    format!(
        " server: {}:{}, game: {}, protocol: {}, hostname: {}",
        target.host,
        target.port,
        info.field("game").to_uppercase(),
        info.field("protocol"),
        info.field("hostname")
    )
}

/// Permanent line for a discovered proxy.
pub fn proxy_line(target: &Target) -> String {
    format!(" proxy: {}:{}", target.host, target.port)
}

/// Format as `H:MM:SS[.ffffff]`, with the fraction left out when it is zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    let micros = elapsed.subsec_micros();
    if micros == 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}.{micros:06}")
    }
}
