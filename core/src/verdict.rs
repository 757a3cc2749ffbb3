//! # Verdict Classifier
//!
//! Appends a verdict label to each record of a scan's output. Classification
//! is a pure function of the record's numbers, so running it again over its
//! own output (minus the label column) yields the same labels.

use std::fmt;
use std::io::{BufRead, Write};
use std::time::Duration;

use grill_common::config::DEFAULT_PROBE_COUNT;
use grill_common::utils::duration::{DurationParseError, parse_elapsed};
use thiserror::Error;

use crate::probe::Burst;

/// Per-second challenge ACK limit of the kernels affected by CVE-2016-5696.
pub const DEFAULT_RATE_LIMIT: u32 = 100;
pub const DEFAULT_FULL_SLACK: u32 = 2;
pub const DEFAULT_NEAR_MARGIN: u32 = 10;

/// Cut-offs used by [`classify`]. They depend on the kernel's rate limit and
/// on how the scan was run, hence configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub rate_limit: u32,
    /// Forged segments per burst used by the scan.
    pub probe_count: u32,
    /// Missing answers still counted as a full response.
    pub full_slack: u32,
    /// Distance from the rate limit still counted as "near" it.
    pub near_margin: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            probe_count: DEFAULT_PROBE_COUNT,
            full_slack: DEFAULT_FULL_SLACK,
            near_margin: DEFAULT_NEAR_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Offline,
    /// Every forged segment was answered.
    NotVulnerable,
    Vulnerable,
    LikelyVulnerable,
    LotsOfChallengeAcks,
    ZeroChallengeAcks,
    OneChallengeAck,
    TwoChallengeAcks,
    MultipleChallengeAcks,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Offline => "offline",
            Verdict::NotVulnerable => "not vulnerable",
            Verdict::Vulnerable => "vulnerable",
            Verdict::LikelyVulnerable => "likely vulnerable",
            Verdict::LotsOfChallengeAcks => "lots of challenge ACKs",
            Verdict::ZeroChallengeAcks => "zero challenge ACKs",
            Verdict::OneChallengeAck => "one challenge ACK",
            Verdict::TwoChallengeAcks => "two challenge ACKs",
            Verdict::MultipleChallengeAcks => "multiple challenge ACKs",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("record {line} is malformed: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("record {line}: {source}")]
    Duration {
        line: usize,
        #[source]
        source: DurationParseError,
    },
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// Maps the bursts of one record to a verdict.
pub fn classify(bursts: &[Burst], thresholds: &Thresholds) -> Verdict {
    if bursts.is_empty() || bursts.iter().any(|b| b.elapsed == Duration::ZERO) {
        return Verdict::Offline;
    }

    let limit: u32 = thresholds.rate_limit;
    let total: u64 = bursts.iter().map(|b| u64::from(b.challenge_acks)).sum();
    let full: u64 = u64::from(thresholds.probe_count) * bursts.len() as u64;
    let deviation: u64 = bursts
        .iter()
        .map(|b| u64::from(b.challenge_acks.abs_diff(limit)))
        .sum();

    match total {
        0 => return Verdict::ZeroChallengeAcks,
        1 => return Verdict::OneChallengeAck,
        2 => return Verdict::TwoChallengeAcks,
        _ => {}
    }

    if total >= full.saturating_sub(u64::from(thresholds.full_slack)) {
        Verdict::NotVulnerable
    } else if deviation == 0 {
        Verdict::Vulnerable
    } else if deviation == 1 {
        Verdict::LikelyVulnerable
    } else if bursts
        .iter()
        .all(|b| b.challenge_acks.abs_diff(limit) <= thresholds.near_margin)
    {
        Verdict::LotsOfChallengeAcks
    } else {
        Verdict::MultipleChallengeAcks
    }
}

/// Splits a scan record into its bursts: `addr:port,acks,elapsed[,acks,elapsed...]`.
pub fn parse_record(record: &str, line: usize) -> Result<Vec<Burst>, VerdictError> {
    let malformed = |reason: &str| VerdictError::Malformed {
        line,
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    let (endpoint, numbers) = fields.split_first().ok_or_else(|| malformed("empty record"))?;

    if endpoint.is_empty() {
        return Err(malformed("missing endpoint"));
    }
    if numbers.is_empty() || numbers.len() % 2 != 0 {
        return Err(malformed("expected pairs of challenge ACK count and elapsed time"));
    }

    numbers
        .chunks(2)
        .map(|pair| -> Result<Burst, VerdictError> {
            let challenge_acks: u32 = pair[0]
                .parse()
                .map_err(|_| malformed("challenge ACK count is not a number"))?;
            let elapsed: Duration =
                parse_elapsed(pair[1]).map_err(|source| VerdictError::Duration { line, source })?;
            Ok(Burst { challenge_acks, elapsed })
        })
        .collect()
}

/// Copies every record from `input` to `output` with its verdict appended.
///
/// Blank lines are skipped. Returns the number of records labelled.
pub fn annotate<R, W>(input: R, mut output: W, thresholds: &Thresholds) -> Result<usize, VerdictError>
where
    R: BufRead,
    W: Write,
{
    let mut labelled: usize = 0;

    for (idx, line) in input.lines().enumerate() {
        let line: String = line?;
        let record: &str = line.trim_end();
        if record.is_empty() {
            continue;
        }

        let bursts: Vec<Burst> = parse_record(record, idx + 1)?;
        writeln!(output, "{record},{}", classify(&bursts, thresholds))?;
        labelled += 1;
    }

    output.flush()?;
    Ok(labelled)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
