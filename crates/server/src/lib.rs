//! HTTP and WebSocket surface over the campaign engine.

pub mod api;
pub mod metrics;
pub mod state;
