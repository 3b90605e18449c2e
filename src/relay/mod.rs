//! Outbound relay module
//!
//! Maintains the single outbound WebSocket session to the relay server and
//! answers every inbound message with the fixed reply.

mod protocol;
mod supervisor;

pub use protocol::*;
pub use supervisor::*;
