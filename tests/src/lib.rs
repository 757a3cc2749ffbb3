//! Workspace-level tests for grill. [`mock`] stands in for the network so
//! whole scans can run on tokio's paused clock.

pub mod mock;

#[cfg(test)]
mod net;
#[cfg(test)]
mod scan;
