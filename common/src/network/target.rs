//! # Scan Target Model
//!
//! A target is a single IPv4 endpoint to be probed. Targets are read one per
//! line in the form `<address> <port>`, e.g. `192.0.2.10 443`.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::TargetParseError;

/// Represents a distinct endpoint to be probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Target {
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl FromStr for Target {
    type Err = TargetParseError;

    /// Parses a `"<ipv4-address> <port>"` record.
    ///
    /// Exactly two whitespace separated fields are accepted. Port `0` is
    /// rejected since nothing can be connected to it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [addr_str, port_str] = fields[..] else {
            return Err(TargetParseError::FieldCount(fields.len()));
        };

        let addr = addr_str
            .parse::<Ipv4Addr>()
            .map_err(|_| TargetParseError::Address(addr_str.to_string()))?;

        let port = parse_port(port_str)?;

        Ok(Self { addr, port })
    }
}

fn parse_port(s: &str) -> Result<u16, TargetParseError> {
    match s.parse::<u16>() {
        Ok(0) | Err(_) => Err(TargetParseError::Port(s.to_string())),
        Ok(port) => Ok(port),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
