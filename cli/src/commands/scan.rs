use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use grill_common::config::{
    DEFAULT_BURST_BUDGET, DEFAULT_BURST_COUNT, DEFAULT_CONCURRENCY, DEFAULT_PROBE_COUNT,
    ProbeSettings, ScanConfig,
};
use grill_common::network::routing::{RoutingArgs, RoutingContext};
use grill_core::network::raw::RawSessionOpener;
use grill_core::scanner::{ScanSummary, Scanner};
use pnet::datalink::{self, NetworkInterface};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::warn;

use crate::terminal::print;

#[derive(clap::Args)]
pub struct ScanArgs {
    /// Device the frames are injected on
    #[arg(short, long)]
    pub interface: Option<String>,
    /// Source MAC address (defaults to the interface's)
    #[arg(long)]
    pub sll: Option<String>,
    /// Destination MAC address, usually the gateway's
    #[arg(long)]
    pub dll: Option<String>,
    /// Source IPv4 address (defaults to the interface's first)
    #[arg(long)]
    pub sip: Option<String>,
    /// Probes allowed to run at the same time
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Forged segments per burst
    #[arg(long, default_value_t = DEFAULT_PROBE_COUNT)]
    pub probes: u32,
    /// Bursts per target, one second apart
    #[arg(long, default_value_t = DEFAULT_BURST_COUNT)]
    pub bursts: usize,
    /// Longest a single burst may take to send
    #[arg(long, default_value_t = DEFAULT_BURST_BUDGET.as_millis() as u64)]
    pub burst_budget_ms: u64,
    /// Seed for local ports and backoff
    #[arg(long)]
    pub seed: Option<u64>,
    /// Read targets from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl ScanArgs {
    fn routing_args(&self) -> RoutingArgs {
        RoutingArgs {
            device: self.interface.clone(),
            src_mac: self.sll.clone(),
            dst_mac: self.dll.clone(),
            src_addr: self.sip.clone(),
        }
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency,
            probe: ProbeSettings {
                probe_count: self.probes,
                burst_count: self.bursts,
                burst_budget: Duration::from_millis(self.burst_budget_ms),
                ..Default::default()
            },
            seed: self.seed,
        }
    }
}

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let config: ScanConfig = args.scan_config();
    config.validate().context("invalid scan settings")?;

    let interfaces: Vec<NetworkInterface> = datalink::interfaces();
    let routing: RoutingContext = RoutingContext::resolve(&args.routing_args(), &interfaces)
        .context("could not resolve the injection path")?;

    if !is_root::is_root() {
        warn!("Not running as root, opening raw channels will probably fail");
    }

    print::aligned_line("Interface", &routing.device);
    print::aligned_line("Source", format!("{} ({})", routing.src_addr, routing.src_mac));
    print::aligned_line("Gateway MAC", routing.dst_mac);
    print::aligned_line("Concurrency", config.concurrency);

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let scanner = Scanner::new(RawSessionOpener::new(interfaces), routing, config);
    let summary: ScanSummary = scanner.run(input, tokio::io::stdout()).await?;

    print::aligned_line("Reported", summary.reported);
    print::aligned_line("No handshake", summary.handshake_failures);
    print::end_of_program();
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
