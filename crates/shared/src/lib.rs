//! Shared types for the bell relayer and device simulator.

mod models;

pub use models::headers;
pub use models::{ButtonEvent, ButtonEventKind, CountResponse};
