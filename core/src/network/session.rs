//! The **transport session** seam.
//!
//! A session owns one raw TCP connection towards a single target: the mutable
//! header state of the next outgoing segment, a blocking "send and confirm"
//! primitive and the stream of inbound segments. The exploit probe only talks
//! to this trait, which keeps the measurement logic independent of how frames
//! reach the wire.

use std::io;

use async_trait::async_trait;
use grill_common::network::{routing::RoutingContext, target::Target};
use grill_protocols::PacketError;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub use grill_protocols::tcp::SegmentInfo;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("opening a capture on {device}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not an ethernet device")]
    NotEthernet(String),
    #[error("sending a segment")]
    Send(#[source] io::Error),
    #[error("building a segment")]
    Packet(#[from] PacketError),
    #[error("the inbound segment stream was already taken")]
    InboundTaken,
}

/// Header fields applied to every segment the session sends next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentState {
    pub seq: u32,
    pub ack: u32,
    pub window: u16,
    pub rst: bool,
}

#[async_trait]
pub trait TransportSession: Send {
    /// Runs the three-way handshake, reporting whether the peer completed it.
    async fn handshake(&mut self) -> bool;

    fn header_mut(&mut self) -> &mut SegmentState;

    /// Sends one segment built from the current header state and returns only
    /// once it has been handed to the wire.
    async fn send_and_confirm(&mut self) -> Result<(), TransportError>;

    /// Hands out the inbound segment stream. Only the first call succeeds.
    fn take_inbound(&mut self) -> Option<UnboundedReceiver<SegmentInfo>>;

    /// Releases the underlying capture. Calling it twice is harmless.
    fn close(&mut self);
}

/// Creates sessions bound to a routing context and a remote endpoint.
pub trait SessionOpener: Send + Sync {
    type Session: TransportSession + 'static;

    fn open(
        &self,
        routing: &RoutingContext,
        target: Target,
        local_port: u16,
    ) -> Result<Self::Session, TransportError>;
}
