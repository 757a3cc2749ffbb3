//! # Routing Context
//!
//! Everything needed to originate raw frames towards the targets: the
//! injection device, both link-layer addresses and the source IPv4 address.
//! It is resolved once at startup and shared read-only by every probe.

use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::datalink::NetworkInterface;
use pnet::util::MacAddr;
use tracing::debug;

use crate::error::ConfigError;
use crate::utils::interface::{self, NetworkInterfaceExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingContext {
    pub device: String,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_addr: Ipv4Addr,
}

/// Raw, unvalidated network parameters as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RoutingArgs {
    pub device: Option<String>,
    pub src_mac: Option<String>,
    pub dst_mac: Option<String>,
    pub src_addr: Option<String>,
}

impl RoutingContext {
    /// Resolves the routing parameters against the host's interfaces.
    ///
    /// The source MAC and source address fall back to the interface's own
    /// hardware address and first IPv4 address. The destination MAC (usually
    /// the gateway's) cannot be guessed and must be given.
    pub fn resolve(args: &RoutingArgs, interfaces: &[NetworkInterface]) -> Result<Self, ConfigError> {
        let device: &str = args
            .device
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::MissingInterface)?;

        let intf: &NetworkInterface = interface::find_by_name(interfaces, device)
            .ok_or_else(|| ConfigError::UnknownInterface(device.to_string()))?;

        let src_mac: MacAddr = match args.src_mac.as_deref() {
            Some(value) => parse_mac("source", value)?,
            None => intf
                .mac
                .ok_or_else(|| ConfigError::NoSourceMac(device.to_string()))?,
        };

        let dst_mac: MacAddr = match args.dst_mac.as_deref() {
            Some(value) => parse_mac("destination", value)?,
            None => return Err(ConfigError::MissingDestinationMac),
        };

        let src_addr: Ipv4Addr = match args.src_addr.as_deref() {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidSourceAddr(value.to_string()))?,
            None => intf
                .get_source_ipv4()
                .ok_or_else(|| ConfigError::NoIpv4Address(device.to_string()))?,
        };

        debug!("Injecting on {device} as {src_addr} ({src_mac}) towards {dst_mac}");

        Ok(Self {
            device: device.to_string(),
            src_mac,
            dst_mac,
            src_addr,
        })
    }
}

fn parse_mac(field: &'static str, value: &str) -> Result<MacAddr, ConfigError> {
    MacAddr::from_str(value).map_err(|_| ConfigError::InvalidMac {
        field,
        value: value.to_string(),
    })
}
