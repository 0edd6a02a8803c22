//! HTTP and WebSocket transport for the bingo round engine.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
