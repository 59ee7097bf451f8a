use super::autocmd::{AutocmdEvent, NOTIFICATION};
use super::events::RedrawEvent;
use super::EngineEvents;
use nvim_rs::Handler;
use rmpv::Value;

pub(super) type Writer = nvim_rs::compat::tokio::Compat<tokio::process::ChildStdin>;

/// Handler for Neovim RPC notifications and requests
///
/// Runs on the Neovim I/O task. It only parses and forwards; all state lives
/// on the engine loop.
#[derive(Clone)]
pub struct AgentHandler {
    events: EngineEvents,
}

impl AgentHandler {
    pub fn new(events: EngineEvents) -> Self {
        Self { events }
    }

    /// Parse one `redraw` notification into events, skipping malformed batches
    pub fn parse_redraw(args: &[Value]) -> Vec<RedrawEvent> {
        let mut parsed = Vec::new();
        for arg in args {
            let Value::Array(event_data) = arg else {
                continue;
            };
            match RedrawEvent::parse(event_data) {
                Ok(events) => parsed.extend(events),
                Err(e) => tracing::warn!(error = %e, "skipping malformed redraw event"),
            }
        }
        parsed
    }
}

#[async_trait::async_trait]
impl Handler for AgentHandler {
    type Writer = Writer;

    async fn handle_notify(
        &self,
        name: String,
        args: Vec<Value>,
        _neovim: nvim_rs::Neovim<Self::Writer>,
    ) {
        match name.as_str() {
            "redraw" => {
                let events = Self::parse_redraw(&args);
                if !events.is_empty() {
                    self.events.redraw(events);
                }
            }
            NOTIFICATION => match AutocmdEvent::parse(&args) {
                Ok(event) => self.events.autocommand(event),
                Err(e) => tracing::warn!(error = %e, "malformed autocommand notification"),
            },
            other => tracing::debug!(notification = other, "unhandled notification"),
        }
    }

    async fn handle_request(
        &self,
        name: String,
        _args: Vec<Value>,
        _neovim: nvim_rs::Neovim<Self::Writer>,
    ) -> Result<Value, Value> {
        tracing::debug!(request = %name, "unhandled request");
        Err(Value::from("not supported by neovim-agent"))
    }
}
