use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use grill_common::config::DEFAULT_PROBE_COUNT;
use grill_core::verdict::{self, DEFAULT_FULL_SLACK, DEFAULT_NEAR_MARGIN, DEFAULT_RATE_LIMIT, Thresholds};
use tracing::debug;

#[derive(clap::Args)]
pub struct VerdictArgs {
    /// Scan output to label, stdin when absent
    pub file: Option<PathBuf>,
    /// Challenge ACKs per second allowed by a vulnerable kernel
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
    pub rate_limit: u32,
    /// Forged segments per burst used by the scan
    #[arg(long, default_value_t = DEFAULT_PROBE_COUNT)]
    pub probes: u32,
    /// Missing answers still counted as a full response
    #[arg(long, default_value_t = DEFAULT_FULL_SLACK)]
    pub full_slack: u32,
    /// Distance from the rate limit still counted as near it
    #[arg(long, default_value_t = DEFAULT_NEAR_MARGIN)]
    pub near_margin: u32,
}

impl VerdictArgs {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            rate_limit: self.rate_limit,
            probe_count: self.probes,
            full_slack: self.full_slack,
            near_margin: self.near_margin,
        }
    }
}

pub fn verdict(args: VerdictArgs) -> anyhow::Result<()> {
    let input: Box<dyn BufRead> = match &args.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let labelled: usize = verdict::annotate(input, io::stdout().lock(), &args.thresholds())?;
    debug!("Labelled {labelled} records");
    Ok(())
}
