use std::time::Duration;

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};

use super::session::TransportError;

const READ_TIMEOUT: Duration = Duration::from_millis(50);

pub type EthernetPair = (Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>);

/// Opens an ethernet channel on `intf` through `channel_opener`.
///
/// The opener is injected so tests can hand in pnet's dummy channel.
pub fn open_eth_channel<F>(intf: &NetworkInterface, cfg: &Config, channel_opener: F)
    -> Result<EthernetPair, TransportError>
where F: FnOnce(&NetworkInterface, Config) -> std::io::Result<datalink::Channel>
{
    let ch: Channel = channel_opener(intf, *cfg).map_err(|source| TransportError::Open {
        device: intf.name.clone(),
        source,
    })?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => Err(TransportError::NotEthernet(intf.name.clone())),
    }
}

/// Channel settings for a session capture.
///
/// The read timeout lets the capture thread notice a closed session.
pub fn get_config() -> Config {
    Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
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
