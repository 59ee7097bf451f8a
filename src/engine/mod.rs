//! Editing engine integration
//!
//! - events: typed redraw events parsed from msgpack
//! - translate: redraw events to [`crate::screen::ScreenSink`] callbacks
//! - autocmd: autocommand notifications and the Lua that emits them
//! - handler: rpc notification handler feeding the engine loop
//! - neovim: child `nvim --embed` process implementing [`Engine`]

mod autocmd;
mod events;
mod handler;
mod neovim;
mod translate;

pub use autocmd::AutocmdEvent;
pub use events::{GridCell, HlAttrs, ParseError, RedrawEvent};
pub use handler::AgentHandler;
pub use neovim::NeovimEngine;
pub use translate::RedrawTranslator;

use crate::bridge::EngineJob;
use crate::error::EngineError;
use crate::screen::CellPos;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

/// Diagnostics collected while the engine started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub diagnostics: Vec<String>,
}

impl StartupReport {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Channel through which the engine reports back to the engine loop
///
/// Everything sent here is queued behind already scheduled calls, so engine
/// callbacks and call work share one FIFO order.
#[derive(Debug, Clone)]
pub struct EngineEvents {
    jobs: UnboundedSender<EngineJob>,
}

impl EngineEvents {
    pub fn new(jobs: UnboundedSender<EngineJob>) -> Self {
        Self { jobs }
    }

    pub fn redraw(&self, events: Vec<RedrawEvent>) {
        if self.jobs.send(EngineJob::Redraw(events)).is_err() {
            tracing::debug!("engine loop gone, dropping redraw batch");
        }
    }

    pub fn autocommand(&self, event: AutocmdEvent) {
        if self.jobs.send(EngineJob::Autocommand(event)).is_err() {
            tracing::debug!("engine loop gone, dropping autocommand");
        }
    }

    pub fn exited(&self) {
        let _ = self.jobs.send(EngineJob::EngineExited);
    }
}

/// Entry points of the editing engine the bridge is allowed to use
///
/// Apart from `start` and `stop`, none of these change engine state except by
/// injecting input the way a user would.
#[async_trait]
pub trait Engine: Send {
    async fn start(
        &mut self,
        width: u32,
        height: u32,
        args: &[String],
        events: EngineEvents,
    ) -> Result<StartupReport, EngineError>;

    /// Send keys in engine key notation
    async fn input(&mut self, keys: &str) -> Result<(), EngineError>;

    async fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    /// Wheel scroll at a grid cell; positive deltas scroll down / right
    async fn scroll(
        &mut self,
        horizontal: i32,
        vertical: i32,
        row: u32,
        col: u32,
    ) -> Result<(), EngineError>;

    /// Ask the engine to redraw the screen
    async fn refresh(&mut self) -> Result<(), EngineError>;

    async fn focus(&mut self, gained: bool) -> Result<(), EngineError>;

    /// Cursor of the current window (0-indexed row and byte column)
    async fn cursor(&mut self) -> Result<CellPos, EngineError>;

    async fn stop(&mut self);
}

/// Escape literal text for engine key notation
pub fn escape_keys(text: &str) -> String {
    text.replace('<', "<lt>")
}

/// Key notation for `count` backspaces
pub fn backspaces(count: usize) -> String {
    "<BS>".repeat(count)
}
