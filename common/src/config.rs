use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PROBE_COUNT: u32 = 111;
pub const DEFAULT_BURST_COUNT: usize = 2;
pub const DEFAULT_CONCURRENCY: usize = 16;

/// The challenge ACK limiter refills about once per second.
pub const BURST_SPACING: Duration = Duration::from_secs(1);
pub const DEFAULT_BURST_BUDGET: Duration = Duration::from_millis(900);
pub const DEFAULT_LISTEN_GRACE: Duration = Duration::from_secs(1);

/// Parameters of a single exploit probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Forged segments sent back-to-back in one burst.
    pub probe_count: u32,
    pub burst_count: usize,
    /// Period of the timer the bursts are aligned to.
    pub burst_spacing: Duration,
    /// Sending one burst slower than this invalidates the measurement.
    pub burst_budget: Duration,
    /// How long the receive listener outlives the last burst period.
    pub listen_grace: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            probe_count: DEFAULT_PROBE_COUNT,
            burst_count: DEFAULT_BURST_COUNT,
            burst_spacing: BURST_SPACING,
            burst_budget: DEFAULT_BURST_BUDGET,
            listen_grace: DEFAULT_LISTEN_GRACE,
        }
    }
}

impl ProbeSettings {
    /// Absolute time bound of the receive listener, measured from its start.
    pub fn listen_window(&self) -> Duration {
        self.burst_spacing * self.burst_count as u32 + self.listen_grace
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Number of probes allowed to run at the same time.
    pub concurrency: usize,
    pub probe: ProbeSettings,
    /// Seeds the scheduler's random source, random when absent.
    pub seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            probe: ProbeSettings::default(),
            seed: None,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero("concurrency"));
        }
        if self.probe.burst_count == 0 {
            return Err(ConfigError::Zero("burst count"));
        }
        if self.probe.probe_count == 0 {
            return Err(ConfigError::Zero("probe count"));
        }
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
