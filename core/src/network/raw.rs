//! A [`TransportSession`] speaking TCP through a raw ethernet channel.
//!
//! The local kernel knows nothing about these connections and answers the
//! peer's SYN-ACK with a reset of its own unless outgoing resets from the
//! probe ports are filtered (e.g. `iptables -A OUTPUT -p tcp --tcp-flags RST RST -j DROP`).

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use grill_common::network::{routing::RoutingContext, target::Target};
use grill_common::utils::interface;
use grill_protocols::tcp::{self, Flow, SegmentInfo, SegmentSpec};
use pnet::datalink::{self, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::channel;
use super::session::{SegmentState, SessionOpener, TransportError, TransportSession};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);
const LOCAL_WINDOW: u16 = 29_200;

pub struct RawSessionOpener {
    interfaces: Vec<NetworkInterface>,
}

impl RawSessionOpener {
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self { interfaces }
    }
}

impl SessionOpener for RawSessionOpener {
    type Session = RawTcpSession;

    fn open(
        &self,
        routing: &RoutingContext,
        target: Target,
        local_port: u16,
    ) -> Result<RawTcpSession, TransportError> {
        let intf = interface::find_by_name(&self.interfaces, &routing.device).ok_or_else(|| {
            TransportError::Open {
                device: routing.device.clone(),
                source: io::Error::new(ErrorKind::NotFound, "no such interface"),
            }
        })?;
        let (tx, rx) = channel::open_eth_channel(intf, &channel::get_config(), datalink::channel)?;

        Ok(RawTcpSession::start(flow_for(routing, target, local_port), tx, rx))
    }
}

fn flow_for(routing: &RoutingContext, target: Target, local_port: u16) -> Flow {
    Flow {
        src_mac: routing.src_mac,
        dst_mac: routing.dst_mac,
        src_addr: routing.src_addr,
        dst_addr: target.addr,
        src_port: local_port,
        dst_port: target.port,
    }
}

pub struct RawTcpSession {
    flow: Flow,
    header: SegmentState,
    tx: Arc<Mutex<Box<dyn DataLinkSender>>>,
    inbound: Option<UnboundedReceiver<SegmentInfo>>,
    running: Arc<AtomicBool>,
}

impl RawTcpSession {
    fn start(flow: Flow, tx: Box<dyn DataLinkSender>, rx: Box<dyn DataLinkReceiver>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        spawn_capture(rx, flow, queue_tx, running.clone());

        Self {
            flow,
            header: SegmentState { window: LOCAL_WINDOW, ..Default::default() },
            tx: Arc::new(Mutex::new(tx)),
            inbound: Some(queue_rx),
            running,
        }
    }

    async fn transmit(&mut self, flags: u8) -> Result<(), TransportError> {
        let frame: Vec<u8> = tcp::create_frame(&self.flow, &segment_spec(&self.header, flags))?;
        let tx = Arc::clone(&self.tx);

        tokio::task::spawn_blocking(move || {
            let mut sender = tx
                .lock()
                .map_err(|_| io::Error::other("sender lock poisoned"))?;
            sender
                .send_to(&frame, None)
                .unwrap_or_else(|| Err(io::Error::other("frame was not queued")))
        })
        .await
        .map_err(|e| TransportError::Send(io::Error::other(e)))?
        .map_err(TransportError::Send)
    }

    async fn await_syn_ack(&mut self, isn: u32) -> Option<SegmentInfo> {
        let inbound = self.inbound.as_mut()?;
        let expected_ack: u32 = isn.wrapping_add(1);

        let reply = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(segment) = inbound.recv().await {
                if segment.has(tcp::RST) {
                    return None;
                }
                if segment.is_syn_ack() && segment.ack == expected_ack {
                    return Some(segment);
                }
            }
            None
        })
        .await;

        reply.ok().flatten()
    }
}

#[async_trait]
impl TransportSession for RawTcpSession {
    async fn handshake(&mut self) -> bool {
        let isn: u32 = rand::random();
        self.header.seq = isn;
        self.header.ack = 0;

        if let Err(e) = self.transmit(tcp::SYN).await {
            debug!("SYN to {}:{} failed: {e}", self.flow.dst_addr, self.flow.dst_port);
            return false;
        }

        let Some(syn_ack) = self.await_syn_ack(isn).await else {
            return false;
        };

        self.header.seq = isn.wrapping_add(1);
        self.header.ack = syn_ack.seq.wrapping_add(1);
        trace!(
            "{}:{} advertised a window of {}",
            self.flow.dst_addr, self.flow.dst_port, syn_ack.window
        );

        self.transmit(tcp::ACK).await.is_ok()
    }

    fn header_mut(&mut self) -> &mut SegmentState {
        &mut self.header
    }

    async fn send_and_confirm(&mut self) -> Result<(), TransportError> {
        let flags: u8 = if self.header.rst { tcp::RST | tcp::ACK } else { tcp::ACK };
        self.transmit(flags).await
    }

    fn take_inbound(&mut self) -> Option<UnboundedReceiver<SegmentInfo>> {
        self.inbound.take()
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for RawTcpSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn segment_spec(header: &SegmentState, flags: u8) -> SegmentSpec {
    SegmentSpec {
        seq: header.seq,
        ack: header.ack,
        window: header.window,
        flags,
    }
}

/// Forwards the segments of `flow` into `queue` until the session closes.
fn spawn_capture(
    mut rx: Box<dyn DataLinkReceiver>,
    flow: Flow,
    queue: UnboundedSender<SegmentInfo>,
    running: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match rx.next() {
                Ok(frame) => {
                    if let Some(segment) = tcp::parse_frame(frame, &flow)
                        && queue.send(segment).is_err()
                    {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                Err(e) => {
                    debug!("capture for {}:{} stopped: {e}", flow.dst_addr, flow.dst_port);
                    break;
                }
            }
        }
    });
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
