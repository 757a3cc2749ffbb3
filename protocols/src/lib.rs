//! Frame construction and parsing for the raw TCP sessions.
//!
//! Only the handful of layers a forged segment needs: Ethernet II, IPv4
//! without options and a bare TCP header.

pub mod ethernet;
pub mod ipv4;
pub mod tcp;

use thiserror::Error;

pub const ETH_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const TCP_HDR_LEN: usize = 20;
pub const FRAME_LEN: usize = ETH_HDR_LEN + IPV4_HDR_LEN + TCP_HDR_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too small for an ethernet header")]
    EthernetBuffer,
    #[error("buffer too small for an ipv4 header")]
    Ipv4Buffer,
    #[error("buffer too small for a tcp header")]
    TcpBuffer,
}
