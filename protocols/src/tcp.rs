use std::net::Ipv4Addr;

use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::{MutableTcpPacket, TcpFlags, TcpPacket, ipv4_checksum};
use pnet::util::MacAddr;

use crate::{ETH_HDR_LEN, FRAME_LEN, IPV4_HDR_LEN, PacketError, ethernet, ipv4};

pub const SYN: u8 = TcpFlags::SYN as u8;
pub const RST: u8 = TcpFlags::RST as u8;
pub const ACK: u8 = TcpFlags::ACK as u8;

/// Addresses of both ends of a connection, seen from the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Header fields of one outgoing segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    pub seq: u32,
    pub ack: u32,
    pub window: u16,
    pub flags: u8,
}

/// The parts of an inbound segment the sessions care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub seq: u32,
    pub ack: u32,
    pub window: u16,
    pub flags: u8,
}

impl SegmentInfo {
    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag == flag
    }

    pub fn is_ack(&self) -> bool {
        self.has(ACK)
    }

    pub fn is_syn_ack(&self) -> bool {
        self.has(SYN | ACK)
    }
}

/// Builds a complete Ethernet + IPv4 + TCP frame for `flow`.
pub fn create_frame(flow: &Flow, segment: &SegmentSpec) -> Result<Vec<u8>, PacketError> {
    let mut buffer: Vec<u8> = vec![0u8; FRAME_LEN];

    ethernet::make_header(&mut buffer, flow.src_mac, flow.dst_mac, EtherTypes::Ipv4)?;
    ipv4::make_header(
        &mut buffer[ETH_HDR_LEN..],
        (FRAME_LEN - ETH_HDR_LEN) as u16,
        IpNextHeaderProtocols::Tcp,
        flow.src_addr,
        flow.dst_addr,
    )?;
    make_header(&mut buffer[ETH_HDR_LEN + IPV4_HDR_LEN..], flow, segment)?;

    Ok(buffer)
}

fn make_header(buf: &mut [u8], flow: &Flow, segment: &SegmentSpec) -> Result<(), PacketError> {
    let mut tcp = MutableTcpPacket::new(buf).ok_or(PacketError::TcpBuffer)?;
    tcp.set_source(flow.src_port);
    tcp.set_destination(flow.dst_port);
    tcp.set_sequence(segment.seq);
    tcp.set_acknowledgement(segment.ack);
    tcp.set_data_offset(5);
    tcp.set_flags(segment.flags.into());
    tcp.set_window(segment.window);
    tcp.set_urgent_ptr(0);

    let checksum = ipv4_checksum(&tcp.to_immutable(), &flow.src_addr, &flow.dst_addr);
    tcp.set_checksum(checksum);
    Ok(())
}

/// Extracts the TCP header of `frame` if it travels from the remote end of
/// `flow` to its local end. Everything else on the wire yields `None`.
pub fn parse_frame(frame: &[u8], flow: &Flow) -> Option<SegmentInfo> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }

    let ip = Ipv4Packet::new(eth.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp
        || ip.get_source() != flow.dst_addr
        || ip.get_destination() != flow.src_addr
    {
        return None;
    }

    let tcp = TcpPacket::new(ip.payload())?;
    if tcp.get_source() != flow.dst_port || tcp.get_destination() != flow.src_port {
        return None;
    }

    Some(SegmentInfo {
        seq: tcp.get_sequence(),
        ack: tcp.get_acknowledgement(),
        window: tcp.get_window(),
        flags: tcp.get_flags() as u8,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
