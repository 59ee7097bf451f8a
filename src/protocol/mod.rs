//! Wire protocol between the agent and the host
//!
//! - message: message ids, frames and async frame I/O
//! - payload: per-id fixed-field payload records

pub mod message;
pub mod payload;

pub use message::{read_frame, write_message, write_raw, MessageId, RawFrame, WireMessage};
