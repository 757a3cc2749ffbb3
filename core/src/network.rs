pub mod channel;
pub mod raw;
pub mod session;
