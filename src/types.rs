use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Value reported for a userinfo key the server did not send.
pub const MISSING_FIELD: &str = "N\\A";

/// One probe destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Key/value configuration a game server sends back to an info query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Userinfo(pub BTreeMap<String, String>);

impl Userinfo {
    /// Field value, or `N\A` when the server did not send the key.
    pub fn field(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or(MISSING_FIELD)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Userinfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Classified result of one probe. Timeouts, transport errors and malformed
/// replies all end up as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    ServerInfo(Userinfo),
    ProxyAlive,
    None,
}

/// A finished probe as delivered by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub target: Target,
    pub outcome: ProbeOutcome,
}

/// Engine settings shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Maximum number of probes in flight.
    pub pool: usize,
    /// Per-probe budget covering session setup and the wait for a reply.
    pub timeout: Duration,
}

impl ScanConfig {
    pub const DEFAULT_POOL: usize = 128;
    pub const DEFAULT_TIMEOUT_SECS: f64 = 3.0;

    pub fn new(pool: usize, timeout: Duration) -> Self {
        Self {
            pool: pool.max(1),
            timeout,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_POOL,
            Duration::from_secs_f64(Self::DEFAULT_TIMEOUT_SECS),
        )
    }
}

/// Aggregate counters for a finished scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Probes issued per stage, in stage order.
    pub probes_by_stage: Vec<usize>,
    pub servers: usize,
    pub proxies: usize,
    pub elapsed: Duration,
}

impl ScanSummary {
    pub fn total_probes(&self) -> usize {
        self.probes_by_stage.iter().sum()
    }
}
