use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use grill_common::network::{routing::RoutingContext, target::Target};
use grill_core::network::session::{
    SegmentInfo, SegmentState, SessionOpener, TransportError, TransportSession,
};
use grill_protocols::tcp::ACK;
use pnet::util::MacAddr;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

/// Time a mock peer takes to accept one segment.
pub const SEND_LATENCY: Duration = Duration::from_millis(1);
const LIMITER_PERIOD: Duration = Duration::from_secs(1);

/// How a simulated host reacts to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// Never completes the handshake.
    Unreachable,
    /// Answers every out-of-window segment.
    Patched,
    /// Answers at most this many segments per second, like a vulnerable kernel.
    RateLimited(u32),
    /// Completes the handshake, then ignores everything.
    Silent,
    /// Completes the handshake, then every send fails.
    Broken,
}

/// Tracks how many sessions are open at once.
#[derive(Debug, Default)]
pub struct Gauge {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now: usize = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// A network of simulated hosts. Addresses without an entry behave as `fallback`.
pub struct MockNetwork {
    peers: HashMap<Ipv4Addr, Peer>,
    fallback: Peer,
    pub gauge: Arc<Gauge>,
    ports: Mutex<Vec<(Target, u16)>>,
    opens: Mutex<Vec<(Target, Instant)>>,
}

impl MockNetwork {
    pub fn new(fallback: Peer) -> Self {
        Self {
            peers: HashMap::new(),
            fallback,
            gauge: Arc::new(Gauge::default()),
            ports: Mutex::new(Vec::new()),
            opens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_peer(mut self, addr: Ipv4Addr, peer: Peer) -> Self {
        self.peers.insert(addr, peer);
        self
    }

    /// Local ports used so far, sorted by target.
    pub fn local_ports(&self) -> Vec<(Target, u16)> {
        let mut ports = self.ports.lock().unwrap().clone();
        ports.sort();
        ports
    }

    /// When each target's session was opened, sorted by target.
    pub fn open_times(&self) -> Vec<(Target, Instant)> {
        let mut opens = self.opens.lock().unwrap().clone();
        opens.sort_by_key(|(target, _)| *target);
        opens
    }
}

/// Lets a test keep a handle on the network it hands to the scanner.
pub struct SharedNetwork(pub Arc<MockNetwork>);

impl SessionOpener for SharedNetwork {
    type Session = MockSession;

    fn open(&self, _: &RoutingContext, target: Target, local_port: u16) -> Result<MockSession, TransportError> {
        let network: &MockNetwork = &self.0;
        let peer: Peer = network.peers.get(&target.addr).copied().unwrap_or(network.fallback);
        network.ports.lock().unwrap().push((target, local_port));
        network.opens.lock().unwrap().push((target, Instant::now()));
        network.gauge.enter();

        let (answers, inbound) = mpsc::unbounded_channel();
        Ok(MockSession {
            peer,
            header: SegmentState::default(),
            answers,
            inbound: Some(inbound),
            limiter: None,
            gauge: Some(network.gauge.clone()),
        })
    }
}

pub struct MockSession {
    peer: Peer,
    header: SegmentState,
    answers: UnboundedSender<SegmentInfo>,
    inbound: Option<UnboundedReceiver<SegmentInfo>>,
    /// Start of the current limiter period and the answers given in it.
    limiter: Option<(Instant, u32)>,
    gauge: Option<Arc<Gauge>>,
}

impl MockSession {
    fn may_answer(&mut self, limit: u32) -> bool {
        let now: Instant = Instant::now();
        let (start, used) = match self.limiter {
            Some((start, used)) if now.duration_since(start) < LIMITER_PERIOD => (start, used),
            _ => (now, 0),
        };
        if used >= limit {
            self.limiter = Some((start, used));
            return false;
        }
        self.limiter = Some((start, used + 1));
        true
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn handshake(&mut self) -> bool {
        self.header = SegmentState { seq: 1_000, ack: 5_000, window: 29_200, rst: false };
        self.peer != Peer::Unreachable
    }

    fn header_mut(&mut self) -> &mut SegmentState {
        &mut self.header
    }

    async fn send_and_confirm(&mut self) -> Result<(), TransportError> {
        tokio::time::sleep(SEND_LATENCY).await;

        let answer: bool = match self.peer {
            Peer::Broken => return Err(TransportError::Send(io::Error::other("link down"))),
            Peer::Patched => true,
            Peer::RateLimited(limit) => self.may_answer(limit),
            Peer::Silent | Peer::Unreachable => false,
        };
        if answer && self.header.window == 2048 {
            let _ = self.answers.send(SegmentInfo { seq: 5_000, ack: 1_000, window: 29_200, flags: ACK });
        }
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<UnboundedReceiver<SegmentInfo>> {
        self.inbound.take()
    }

    fn close(&mut self) {
        if let Some(gauge) = self.gauge.take() {
            gauge.leave();
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.close();
    }
}

pub fn routing() -> RoutingContext {
    RoutingContext {
        device: "eth0".into(),
        src_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0x01),
        dst_mac: MacAddr::new(0x02, 0, 0, 0, 0, 0xfe),
        src_addr: Ipv4Addr::new(192, 0, 2, 1),
    }
}

/// An output stream whose contents stay readable after the scanner is done with it.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl AsyncWrite for SharedOutput {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
