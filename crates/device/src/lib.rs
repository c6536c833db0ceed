//! Bell device simulator library.

pub mod cli;
pub mod client;
