use std::io;
use std::time::Duration;

use grill_common::error::TargetParseError;
use grill_common::network::target::Target;
use thiserror::Error;
use tokio::task::JoinError;

use crate::network::session::TransportError;

/// Conditions that abort a whole scan.
///
/// A failed handshake is not among them, it is an ordinary outcome of a probe.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("broken input on line {line}: {source}")]
    MalformedInput {
        line: usize,
        #[source]
        source: TargetParseError,
    },
    #[error(
        "sending a burst to {target} took {elapsed:?} (budget {budget:?}), get better connectivity"
    )]
    Saturated {
        target: Target,
        elapsed: Duration,
        budget: Duration,
    },
    #[error("transport failure while probing {target}")]
    Transport {
        target: Target,
        #[source]
        source: TransportError,
    },
    #[error("reading targets")]
    Input(#[source] io::Error),
    #[error("writing results")]
    Output(#[source] io::Error),
    #[error("the result collector went away")]
    CollectorGone,
    #[error("scan task failed")]
    Task(#[from] JoinError),
}
