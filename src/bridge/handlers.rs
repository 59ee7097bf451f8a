//! Per-message call handlers run on the engine loop

use crate::engine::{backspaces, escape_keys, Engine, EngineEvents};
use crate::error::HandlerError;
use crate::protocol::payload::{
    decode_bool, decode_text, encode_bool, require, AgentReady, CellPosition, DeleteRequest,
    GridSize, ScrollRequest,
};
use crate::protocol::{MessageId, WireMessage};
use crate::screen::ScreenSink;
use crate::state::EngineBridgeState;
use bytes::Bytes;

/// Everything a handler may touch, borrowed from the engine loop
pub struct CallContext<'a> {
    pub state: &'a mut EngineBridgeState,
    pub engine: &'a mut dyn Engine,
    pub events: &'a EngineEvents,
}

/// Run the handler for `id`
pub async fn dispatch(
    ctx: &mut CallContext<'_>,
    id: MessageId,
    payload: Option<&Bytes>,
) -> Result<Option<Bytes>, HandlerError> {
    match id {
        MessageId::AgentReady => {
            let ready = AgentReady::decode(require(id, payload)?)?;
            agent_ready(ctx, ready).await?;
            Ok(None)
        }
        MessageId::ScrollInput => {
            let request = ScrollRequest::decode(require(id, payload)?)?;
            let size = ctx.state.size();
            let horizontal = clamp_steps(request.horizontal, size.width);
            let vertical = clamp_steps(request.vertical, size.height);
            ctx.engine
                .scroll(horizontal, vertical, request.row, request.col)
                .await?;
            ctx.engine.refresh().await?;
            Ok(None)
        }
        MessageId::ResizeInput => {
            let size = GridSize::decode(require(id, payload)?)?;
            ctx.state.set_logical_size(size.width, size.height);
            ctx.engine.resize(size.width, size.height).await?;
            Ok(None)
        }
        MessageId::Input => {
            let text = decode_text(require(id, payload)?)?;
            let plan = ctx.state.resolve_input(&text);
            let keys = format!("{}{}", backspaces(plan.backspaces), text);
            ctx.engine.input(&keys).await?;
            Ok(None)
        }
        MessageId::MarkedInput => {
            let text = decode_text(require(id, payload)?)?;
            let plan = ctx.state.mark(&text);
            let mut keys = backspaces(plan.backspaces);
            if let Some(insert) = plan.insert {
                keys.push_str(&escape_keys(&insert));
            }
            ctx.engine.input(&keys).await?;
            Ok(None)
        }
        MessageId::Delete => {
            let request = DeleteRequest::decode(require(id, payload)?)?;
            // Bounded by the grid cell count
            let count = (request.count as usize).min(ctx.state.size().cells());
            if count < request.count as usize {
                tracing::debug!(requested = request.count, count, "delete count clamped");
            }
            ctx.state.record_delete(count);
            ctx.engine.input(&backspaces(count)).await?;
            Ok(None)
        }
        MessageId::FocusGained => {
            let gained = decode_bool(require(id, payload)?)?;
            ctx.engine.focus(gained).await?;
            Ok(None)
        }
        MessageId::CursorPosition => {
            let cursor = ctx.engine.cursor().await?;
            let position = CellPosition {
                row: cursor.row,
                col: cursor.col,
            };
            Ok(Some(position.encode()))
        }
        other => Err(HandlerError::Unsupported(other)),
    }
}

/// Limit a wheel delta to one screen's worth of steps along its axis
fn clamp_steps(delta: i32, extent: u32) -> i32 {
    let limit = i64::from(extent.max(1));
    i64::from(delta).clamp(-limit, limit) as i32
}

async fn agent_ready(ctx: &mut CallContext<'_>, ready: AgentReady) -> Result<(), HandlerError> {
    ctx.state.set_logical_size(ready.width, ready.height);
    let started = ctx
        .engine
        .start(ready.width, ready.height, &ready.args, ctx.events.clone())
        .await;

    let has_errors = match &started {
        Ok(report) => {
            for diagnostic in &report.diagnostics {
                tracing::warn!(%diagnostic, "engine startup diagnostic");
            }
            report.has_errors()
        }
        Err(e) => {
            tracing::error!(error = %e, "engine failed to start");
            true
        }
    };

    ctx.state.flush();
    ctx.state
        .send(WireMessage::new(MessageId::NvimReady, Some(encode_bool(has_errors))));
    started?;
    Ok(())
}
