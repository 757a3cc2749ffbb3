//! The **scan orchestrator**.
//!
//! Reads `<address> <port>` lines, runs one exploit probe per line with at
//! most `concurrency` probes in flight, and writes one record per measured
//! result in completion order.
//!
//! **Flow control:**
//! A slot must be free before the next line is even read, so a slow scan
//! backpressures its input. The reader takes slots and the collector gives
//! them back once a result has been handled.
//!
//! **Shutdown:**
//! After the input is exhausted every task is joined, the last result sender
//! is dropped and the collector drains the channel before [`Scanner::run`]
//! returns. No result is lost and nothing keeps running afterwards.

mod collector;

use std::sync::Arc;
use std::time::Duration;

use grill_common::config::ScanConfig;
use grill_common::network::{routing::RoutingContext, target::Target};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::info;

use crate::error::ScanError;
use crate::network::session::SessionOpener;
use crate::probe::{self, ScanResult, ScanTask};

pub use collector::ScanSummary;

/// Backoff granted per probe already holding a slot.
pub const BACKOFF_UNIT: Duration = Duration::from_millis(60);

type ProbeTasks = JoinSet<Result<(), ScanError>>;

pub struct Scanner<O> {
    opener: Arc<O>,
    routing: Arc<RoutingContext>,
    config: ScanConfig,
    rng: StdRng,
}

impl<O: SessionOpener + 'static> Scanner<O> {
    pub fn new(opener: O, routing: RoutingContext, config: ScanConfig) -> Self {
        let rng: StdRng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            opener: Arc::new(opener),
            routing: Arc::new(routing),
            config,
            rng,
        }
    }

    /// Scans every target read from `input` and writes the records to `output`.
    ///
    /// Fatal conditions (malformed input, a saturated injection path, a
    /// broken transport) stop the scan: probes still in flight are aborted,
    /// results already received are written out, then the error is returned.
    pub async fn run<R, W>(mut self, input: R, output: W) -> Result<ScanSummary, ScanError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let slots = Arc::new(Semaphore::new(self.config.concurrency));
        let (result_tx, result_rx) = mpsc::channel::<ScanResult>(self.config.concurrency);
        let collector = tokio::spawn(collector::collect(result_rx, slots.clone(), output));

        let mut tasks: ProbeTasks = JoinSet::new();
        let dispatched = self.dispatch(input, &slots, &result_tx, &mut tasks).await;
        drop(result_tx);

        let settled: Result<usize, ScanError> = match dispatched {
            Ok(count) => settle_all(&mut tasks).await.map(|()| count),
            Err(e) => Err(e),
        };
        if settled.is_err() {
            tasks.shutdown().await;
        }

        let collected = collector.await;
        let dispatched: usize = settled?;
        let summary: ScanSummary = collected??;

        info!(
            "Done scanning: {dispatched} targets, {} reported, {} handshake failures",
            summary.reported, summary.handshake_failures
        );
        Ok(summary)
    }

    async fn dispatch<R>(
        &mut self,
        input: R,
        slots: &Arc<Semaphore>,
        results: &mpsc::Sender<ScanResult>,
        tasks: &mut ProbeTasks,
    ) -> Result<usize, ScanError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut line_no: usize = 0;

        loop {
            // Probe failures must stop the scan even while the input stays open,
            // so they race both the slot and the next line.
            let next = async {
                let permit = slots.acquire().await.map_err(|_| ScanError::CollectorGone)?;
                let line: Option<String> = lines.next_line().await.map_err(ScanError::Input)?;
                Ok::<_, ScanError>((permit, line))
            };

            let (permit, line) = tokio::select! {
                biased;

                Some(joined) = tasks.join_next() => {
                    joined??;
                    continue;
                }
                next = next => next?,
            };

            let Some(line) = line else {
                break;
            };
            line_no += 1;

            let target: Target = line
                .parse()
                .map_err(|source| ScanError::MalformedInput { line: line_no, source })?;

            let backoff: Duration = self.draw_backoff(slots.available_permits());
            permit.forget();

            let task = ScanTask {
                target,
                routing: self.routing.clone(),
                settings: self.config.probe,
                local_port: self.rng.random(),
                backoff,
            };

            info!("[{line_no}] Initiating scan for {target}");
            tasks.spawn(run_task(self.opener.clone(), task, results.clone()));
        }

        Ok(line_no)
    }

    fn draw_backoff(&mut self, available: usize) -> Duration {
        let ceiling: Duration = backoff_ceiling(self.config.concurrency, available);
        let millis: u64 = self.rng.random_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Upper bound of the start delay for a probe that just took a slot while
/// `available` slots remain free.
fn backoff_ceiling(concurrency: usize, available: usize) -> Duration {
    let held_by_others: usize = concurrency.saturating_sub(available + 1);
    BACKOFF_UNIT * held_by_others as u32
}

async fn run_task<O: SessionOpener>(
    opener: Arc<O>,
    task: ScanTask,
    results: mpsc::Sender<ScanResult>,
) -> Result<(), ScanError> {
    tokio::time::sleep(task.backoff).await;
    let result: ScanResult = probe::probe(opener.as_ref(), task).await?;
    results.send(result).await.map_err(|_| ScanError::CollectorGone)
}

async fn settle_all(tasks: &mut ProbeTasks) -> Result<(), ScanError> {
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
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
