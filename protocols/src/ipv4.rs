use std::net::Ipv4Addr;

use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{checksum, MutableIpv4Packet};

use crate::{IPV4_HDR_LEN, PacketError};

pub fn make_header(buf: &mut [u8],
                   total_length: u16,
                   nxt_ptc: IpNextHeaderProtocol,
                   src_addr: Ipv4Addr,
                   dst_addr: Ipv4Addr
) -> Result<(), PacketError> {
    let header = buf.get_mut(..IPV4_HDR_LEN).ok_or(PacketError::Ipv4Buffer)?;
    let mut ipv4 = MutableIpv4Packet::new(header).ok_or(PacketError::Ipv4Buffer)?;
    ipv4.set_version(4);
    ipv4.set_header_length(5); // 5 × 32 bits, no options
    ipv4.set_dscp(0);
    ipv4.set_ecn(0);
    ipv4.set_total_length(total_length);
    ipv4.set_identification(rand::random());
    ipv4.set_flags(2); // Do not fragment (010)
    ipv4.set_fragment_offset(0);
    ipv4.set_ttl(64);
    ipv4.set_next_level_protocol(nxt_ptc);
    ipv4.set_source(src_addr);
    ipv4.set_destination(dst_addr);

    ipv4.set_checksum(0);
    let csm = checksum(&ipv4.to_immutable());
    ipv4.set_checksum(csm);
    Ok(())
}
