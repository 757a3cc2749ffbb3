pub mod scan;
pub mod verdict;

use clap::{Parser, Subcommand};

use scan::ScanArgs;
use verdict::VerdictArgs;

#[derive(Parser)]
#[command(name = "grill")]
#[command(about = "Probes TCP stacks for the challenge ACK side channel (CVE-2016-5696).")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every "<address> <port>" line read from the input
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// Label the records of a scan's output
    #[command(alias = "v")]
    Verdict(VerdictArgs),
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
