use thiserror::Error;

/// Problems with the startup configuration. All of them abort the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("please specify an interface for packet injection")]
    MissingInterface,
    #[error("interface '{0}' does not exist")]
    UnknownInterface(String),
    #[error("interface '{0}' has no hardware address, pass --sll")]
    NoSourceMac(String),
    #[error("invalid {field} MAC address '{value}'")]
    InvalidMac { field: &'static str, value: String },
    #[error("a destination link-layer address is required (--dll)")]
    MissingDestinationMac,
    #[error("unable to get an IPv4 address of interface '{0}', pass --sip")]
    NoIpv4Address(String),
    #[error("invalid source IPv4 address '{0}'")]
    InvalidSourceAddr(String),
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// A target line that could not be turned into a [`Target`](crate::network::target::Target).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetParseError {
    #[error("expected \"<address> <port>\", found {0} field(s)")]
    FieldCount(usize),
    #[error("invalid IPv4 address '{0}'")]
    Address(String),
    #[error("invalid port '{0}'")]
    Port(String),
}
