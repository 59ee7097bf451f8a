//! Agent process between an embedded Neovim and a separate GUI host
//!
//! The host talks to the agent over two Unix sockets: synchronous calls
//! inbound (input, resize, scroll, ...) and fire-and-forget drawing and
//! status notifications outbound. All engine-side state lives on a single
//! engine loop thread; the listener thread only schedules calls onto it.

pub mod agent;
pub mod bridge;
pub mod composition;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod screen;
pub mod state;
pub mod transport;

pub use agent::Agent;
pub use config::AgentConfig;
pub use engine::{Engine, NeovimEngine};

/// Version string generated at build time
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");
