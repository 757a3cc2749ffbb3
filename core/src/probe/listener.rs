use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tokio::time::{self, Instant};

use crate::network::session::SegmentInfo;

/// What the sending side of a probe is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Burst(usize),
    Stopped,
}

/// Counts ACK-flagged inbound segments per burst.
///
/// Segments are attributed to the burst published last through `phase`. The
/// listener returns once the phase becomes [`Phase::Stopped`], the stream
/// ends or `deadline` passes, whichever comes first. Segments already queued
/// are counted before a stop is honoured, but never past the deadline.
pub(crate) async fn count_challenge_acks(
    mut inbound: UnboundedReceiver<SegmentInfo>,
    mut phase: watch::Receiver<Phase>,
    bursts: usize,
    deadline: Instant,
) -> Vec<u32> {
    let mut counts: Vec<u32> = vec![0; bursts.max(1)];
    let last: usize = counts.len() - 1;
    let mut current: usize = 0;

    let expiry = time::sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;

            _ = &mut expiry => break,

            segment = inbound.recv() => match segment {
                Some(segment) if segment.is_ack() => counts[current] += 1,
                Some(_) => {}
                None => break,
            },

            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                let next: Phase = *phase.borrow_and_update();
                match next {
                    Phase::Burst(index) => current = index.min(last),
                    Phase::Stopped => break,
                }
            }
        }
    }

    counts
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
