//! ws-relay library
//!
//! A small service that keeps one outbound WebSocket session open to a relay
//! server, answering every inbound JSON message with a fixed reply, and
//! exposes a placeholder HTTP endpoint alongside it.

pub mod config;
pub mod http;
pub mod relay;
