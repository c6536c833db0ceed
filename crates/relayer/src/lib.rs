//! Bell relayer: button event fan-out over WebSocket and firmware updates.

pub mod api;
pub mod config;
pub mod firmware;
pub mod relay;
