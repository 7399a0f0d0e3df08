use anyhow::{bail, Result};

/// Ports Quake III servers are most often found on.
pub const SERVER_PORTS: &[u16] = &[
    1582, 1838, 4399, 4654, 4910, 4921, 5422, 5934, 6190, 6702, 6989, 7700, 7726, 9000, 9262,
    10542, 10798, 11777, 11791, 11801, 11807, 11810, 11815, 11822, 11837, 11853, 11878, 11900,
    15150, 18235, 18737, 19296, 20850, 21294, 21775, 22062, 24077, 24096, 24444, 24878, 26414,
    26926, 27000, 27666, 27694, 27905, 27950, 27960, 27961, 27962, 27963, 27964, 27965, 27966,
    27967, 27968, 27969, 27970, 27971, 27972, 27973, 27974, 27975, 27976, 27977, 27980, 27985,
    27986, 27990, 27992, 27999, 28000, 28010, 28015, 28020, 28030, 28200, 28206, 28240, 28258,
    28452, 28462, 28491, 28492, 28543, 28700, 28718, 28799, 28960, 28969, 28971, 28972, 28973,
    28974, 29000, 29005, 29010, 29030, 29040, 29230, 29711, 29734, 29742, 29777, 29961, 29965,
    29966, 29968, 29970, 29979, 29980, 29992, 29996, 29998, 30001, 30010, 30530, 32296,
];

/// Ports QWFWD proxies are most often found on.
pub const PROXY_PORTS: &[u16] = &[12345, 29999, 30000, 30001, 30002, 30003, 30004, 30005];

/// Which scan the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Fast,
    Full,
    Range { start: u16, end: u16, with_proxy: bool },
}

impl ScanMode {
    /// Build a range mode, rejecting `start > end`.
    pub fn range(start: u16, end: u16, with_proxy: bool) -> Result<Self> {
        if start > end {
            bail!("invalid range {start}-{end} (start > end)");
        }
        Ok(ScanMode::Range {
            start,
            end,
            with_proxy,
        })
    }
}

/// Which probe a stage runs against its ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Server,
    Proxy,
}

/// One sequential step of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Permanent line written before the stage starts, if any.
    pub banner: Option<String>,
    pub kind: ProbeKind,
    pub ports: Vec<u16>,
}

impl Stage {
    fn new(banner: Option<String>, kind: ProbeKind, ports: Vec<u16>) -> Self {
        Self {
            banner,
            kind,
            ports,
        }
    }
}

/// Ordered stages for a mode. Stages run one after another.
pub fn plan(mode: ScanMode) -> Vec<Stage> {
    let mut stages = Vec::new();
    match mode {
        ScanMode::Fast | ScanMode::Full => {
            stages.push(Stage::new(
                Some("Fast scanning has been started".into()),
                ProbeKind::Server,
                SERVER_PORTS.to_vec(),
            ));
            stages.push(Stage::new(None, ProbeKind::Proxy, PROXY_PORTS.to_vec()));
            if mode == ScanMode::Full {
                // Ports from the curated stages are probed again on purpose.
                stages.push(Stage::new(
                    Some("Full scanning has been started".into()),
                    ProbeKind::Server,
                    inclusive_range(1, u16::MAX),
                ));
                stages.push(Stage::new(
                    None,
                    ProbeKind::Proxy,
                    inclusive_range(1, u16::MAX),
                ));
            }
        }
        ScanMode::Range {
            start,
            end,
            with_proxy,
        } => {
            stages.push(Stage::new(
                Some(format!("Range scanning ({start} - {end}) has been started")),
                ProbeKind::Server,
                inclusive_range(start, end),
            ));
            if with_proxy {
                stages.push(Stage::new(
                    None,
                    ProbeKind::Proxy,
                    inclusive_range(start, end),
                ));
            }
        }
    }
    stages
}

fn inclusive_range(start: u16, end: u16) -> Vec<u16> {
    (start..=end).collect()
}
