//! Challenge ACK prober for CVE-2016-5696.
//!
//! [`probe`] measures a single target, [`scanner`] runs many of them under a
//! concurrency limit and [`verdict`] labels the resulting records.

pub mod error;
pub mod network;
pub mod probe;
pub mod scanner;
pub mod verdict;
