use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Semaphore, mpsc::Receiver};
use tracing::{error, warn};

use crate::error::ScanError;
use crate::probe::ScanResult;

/// Counters of a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Results received, one per dispatched task.
    pub completed: usize,
    /// Results written to the output.
    pub reported: usize,
    pub handshake_failures: usize,
}

/// Drains `results` until every sender is gone, writing one record per
/// measured result in arrival order and handing a slot back for each.
///
/// A failing writer does not stop the draining, otherwise the reader would
/// wait for slots forever. The first write error is returned at the end.
pub(super) async fn collect<W>(
    mut results: Receiver<ScanResult>,
    slots: Arc<Semaphore>,
    mut output: W,
) -> Result<ScanSummary, ScanError>
where
    W: AsyncWrite + Unpin,
{
    let mut summary = ScanSummary::default();
    let mut write_error: Option<std::io::Error> = None;

    while let Some(result) = results.recv().await {
        summary.completed += 1;

        match result.to_record() {
            Some(record) if write_error.is_none() => {
                if let Err(e) = write_record(&mut output, &record).await {
                    error!("Unable to write results: {e}");
                    write_error = Some(e);
                } else {
                    summary.reported += 1;
                }
            }
            Some(_) => {}
            None => {
                summary.handshake_failures += 1;
                warn!("Handshake with {} has failed", result.target);
            }
        }

        slots.add_permits(1);
    }

    match write_error {
        Some(e) => Err(ScanError::Output(e)),
        None => Ok(summary),
    }
}

async fn write_record<W: AsyncWrite + Unpin>(output: &mut W, record: &str) -> std::io::Result<()> {
    output.write_all(record.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
