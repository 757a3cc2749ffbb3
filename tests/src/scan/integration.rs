use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use grill_common::config::ScanConfig;
use grill_core::error::ScanError;
use grill_core::scanner::{ScanSummary, Scanner};
use grill_core::verdict::{self, Thresholds};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::time::{self, Instant};

use crate::mock::{MockNetwork, Peer, SharedNetwork, SharedOutput, routing};

fn target_lines(count: u8) -> String {
    (1..=count).map(|i| format!("10.0.0.{i} 80\n")).collect()
}

fn config(concurrency: usize, seed: u64) -> ScanConfig {
    ScanConfig {
        concurrency,
        seed: Some(seed),
        ..Default::default()
    }
}

async fn scan(
    network: &Arc<MockNetwork>,
    config: ScanConfig,
    input: &str,
) -> (Result<ScanSummary, ScanError>, SharedOutput) {
    let output = SharedOutput::default();
    let scanner = Scanner::new(SharedNetwork(network.clone()), routing(), config);
    let result = scanner.run(input.as_bytes(), output.clone()).await;
    (result, output)
}

/*************************************************************
                      Orchestrator bounds
**************************************************************/

#[tokio::test(start_paused = true)]
async fn twenty_targets_never_exceed_four_sessions() {
    let network = Arc::new(MockNetwork::new(Peer::Patched));

    let (result, output) = scan(&network, config(4, 1), &target_lines(20)).await;
    let summary = result.unwrap();

    assert_eq!(summary.completed, 20);
    assert_eq!(summary.reported, 20);
    assert_eq!(output.lines().len(), 20);
    assert_eq!(network.gauge.opened(), 20);
    assert!(network.gauge.peak() <= 4, "peak was {}", network.gauge.peak());
    assert!(network.gauge.peak() > 1, "probes never overlapped");
    assert_eq!(network.gauge.open(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrency_of_one_runs_probes_one_by_one() {
    let network = Arc::new(MockNetwork::new(Peer::Silent));

    let (result, output) = scan(&network, config(1, 2), &target_lines(3)).await;

    assert_eq!(result.unwrap().completed, 3);
    assert_eq!(network.gauge.peak(), 1);
    assert_eq!(
        output.lines(),
        vec!["10.0.0.1:80,0,111ms,0,111ms", "10.0.0.2:80,0,111ms,0,111ms", "10.0.0.3:80,0,111ms,0,111ms"]
    );
}

#[tokio::test(start_paused = true)]
async fn empty_input_finishes_immediately() {
    let network = Arc::new(MockNetwork::new(Peer::Patched));

    let (result, output) = scan(&network, config(4, 3), "").await;

    assert_eq!(result.unwrap(), ScanSummary::default());
    assert!(output.contents().is_empty());
    assert_eq!(network.gauge.opened(), 0);
}

/*************************************************************
                   Per-target and fatal failures
**************************************************************/

#[tokio::test(start_paused = true)]
async fn unreachable_targets_are_skipped_not_fatal() {
    let network = Arc::new(
        MockNetwork::new(Peer::Patched)
            .with_peer(Ipv4Addr::new(10, 0, 0, 2), Peer::Unreachable)
            .with_peer(Ipv4Addr::new(10, 0, 0, 4), Peer::Unreachable),
    );

    let (result, output) = scan(&network, config(2, 4), &target_lines(5)).await;
    let summary = result.unwrap();

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.reported, 3);
    assert_eq!(summary.handshake_failures, 2);

    let mut reported: Vec<String> = output
        .lines()
        .into_iter()
        .map(|l| l.split(',').next().unwrap().to_string())
        .collect();
    reported.sort();
    assert_eq!(reported, vec!["10.0.0.1:80", "10.0.0.3:80", "10.0.0.5:80"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_line_stops_the_scan() {
    let network = Arc::new(MockNetwork::new(Peer::Patched));
    let input = "10.0.0.1 80\n10.0.0.2 80\n10.0.0.3\n10.0.0.4 80\n";

    let (result, _) = scan(&network, config(4, 5), input).await;

    match result {
        Err(ScanError::MalformedInput { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected malformed input, got {other:?}"),
    }
    assert!(network.gauge.opened() <= 2);
    assert_eq!(network.gauge.open(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_stops_the_scan() {
    let network = Arc::new(
        MockNetwork::new(Peer::Silent).with_peer(Ipv4Addr::new(10, 0, 0, 1), Peer::Broken),
    );

    let (result, _) = scan(&network, config(2, 6), &target_lines(6)).await;

    assert!(matches!(result, Err(ScanError::Transport { target, .. }) if target.addr == Ipv4Addr::new(10, 0, 0, 1)));
    assert!(network.gauge.opened() < 6);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_stops_the_scan_while_input_is_open() {
    let network = Arc::new(
        MockNetwork::new(Peer::Silent).with_peer(Ipv4Addr::new(10, 0, 0, 1), Peer::Broken),
    );
    let (mut writer, reader) = tokio::io::duplex(256);
    writer.write_all(b"10.0.0.1 80\n").await.unwrap();

    let scanner = Scanner::new(SharedNetwork(network.clone()), routing(), config(4, 8));
    let result = time::timeout(
        Duration::from_secs(600),
        scanner.run(BufReader::new(reader), SharedOutput::default()),
    )
    .await
    .expect("scan kept running after a fatal error");

    assert!(matches!(result, Err(ScanError::Transport { .. })));
    assert_eq!(network.gauge.opened(), 1);
    assert_eq!(network.gauge.open(), 0);
    drop(writer);
}

#[tokio::test(start_paused = true)]
async fn records_before_a_malformed_line_are_written() {
    let network = Arc::new(MockNetwork::new(Peer::Patched));
    let input = "10.0.0.1 80\n10.0.0.2 80\nbroken line\n10.0.0.4 80\n";

    let (result, output) = scan(&network, config(1, 9), input).await;

    assert!(matches!(result, Err(ScanError::MalformedInput { line: 3, .. })));
    assert_eq!(
        output.lines(),
        vec!["10.0.0.1:80,111,111ms,111,111ms", "10.0.0.2:80,111,111ms,111,111ms"]
    );
}

#[tokio::test(start_paused = true)]
async fn records_before_a_transport_failure_are_written() {
    let network = Arc::new(
        MockNetwork::new(Peer::Silent).with_peer(Ipv4Addr::new(10, 0, 0, 3), Peer::Broken),
    );

    let (result, output) = scan(&network, config(1, 10), &target_lines(4)).await;

    assert!(matches!(result, Err(ScanError::Transport { target, .. }) if target.addr == Ipv4Addr::new(10, 0, 0, 3)));
    assert_eq!(
        output.lines(),
        vec!["10.0.0.1:80,0,111ms,0,111ms", "10.0.0.2:80,0,111ms,0,111ms"]
    );
    assert_eq!(network.gauge.opened(), 3);
}

/*************************************************************
                    Scheduling and output
**************************************************************/

#[tokio::test(start_paused = true)]
async fn sessions_open_after_a_bounded_backoff() {
    let mut delayed: usize = 0;

    for seed in 1..=8 {
        let network = Arc::new(MockNetwork::new(Peer::Silent));
        let start = Instant::now();

        scan(&network, config(4, seed), &target_lines(4)).await.0.unwrap();

        let opens = network.open_times();
        assert_eq!(opens.len(), 4);
        for (held, (target, opened_at)) in opens.into_iter().enumerate() {
            let waited = opened_at - start;
            let ceiling = Duration::from_millis(60 * held as u64);
            assert!(waited <= ceiling, "{target} waited {waited:?}, ceiling {ceiling:?}");
            if waited > Duration::ZERO {
                delayed += 1;
            }
        }
    }

    assert!(delayed > 0, "no session was ever delayed");
}

#[tokio::test(start_paused = true)]
async fn same_seed_picks_the_same_local_ports() {
    let first = Arc::new(MockNetwork::new(Peer::Silent));
    let second = Arc::new(MockNetwork::new(Peer::Silent));

    scan(&first, config(3, 42), &target_lines(6)).await.0.unwrap();
    scan(&second, config(3, 42), &target_lines(6)).await.0.unwrap();

    assert_eq!(first.local_ports().len(), 6);
    assert_eq!(first.local_ports(), second.local_ports());
}

#[tokio::test(start_paused = true)]
async fn scan_output_feeds_the_classifier() {
    let network = Arc::new(
        MockNetwork::new(Peer::Patched)
            .with_peer(Ipv4Addr::new(10, 0, 0, 2), Peer::RateLimited(100))
            .with_peer(Ipv4Addr::new(10, 0, 0, 3), Peer::Silent)
            .with_peer(Ipv4Addr::new(10, 0, 0, 4), Peer::Unreachable),
    );

    let (result, output) = scan(&network, config(4, 7), &target_lines(4)).await;
    result.unwrap();

    let mut labelled: Vec<u8> = Vec::new();
    let count = verdict::annotate(output.contents().as_bytes(), &mut labelled, &Thresholds::default()).unwrap();
    assert_eq!(count, 3);

    let mut lines: Vec<String> = String::from_utf8(labelled).unwrap().lines().map(str::to_string).collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            "10.0.0.1:80,111,111ms,111,111ms,not vulnerable",
            "10.0.0.2:80,100,111ms,100,111ms,vulnerable",
            "10.0.0.3:80,0,111ms,0,111ms,zero challenge ACKs",
        ]
    );
}
