//! State owned by the engine loop
//!
//! Every drawing callback and every scheduled call works on one
//! [`EngineBridgeState`] by exclusive reference. Messages for the host are
//! queued in an outbox that the loop drains after each job, so everything a
//! job produced reaches the host in the order it happened.

use crate::composition::{Composition, InputPlan, MarkPlan};
use crate::engine::AutocmdEvent;
use crate::protocol::payload::{
    encode_bool, encode_text, AutocommandNotice, CellPosition, DefaultColors, GridSize,
    ModeChange, ScrollEvent, ScrollRegion,
};
use crate::protocol::{MessageId, WireMessage};
use crate::render::{HighlightAttributes, RenderAccumulator, RenderOp};
use crate::screen::{CellPos, ScreenGrid, ScreenSink};

/// Bridge-side state for one engine session
#[derive(Debug, Default)]
pub struct EngineBridgeState {
    batch: RenderAccumulator,
    composition: Composition,
    grid: ScreenGrid,
    put_pos: CellPos,
    cursor: CellPos,
    scroll_region: ScrollRegion,
    colors: DefaultColors,
    mode: String,
    dirty: Option<bool>,
    busy: bool,
    mouse_enabled: bool,
    outbox: Vec<WireMessage>,
}

impl EngineBridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> GridSize {
        GridSize {
            width: self.grid.width(),
            height: self.grid.height(),
        }
    }

    pub fn grid(&self) -> &ScreenGrid {
        &self.grid
    }

    pub fn cursor(&self) -> CellPos {
        self.cursor
    }

    pub fn put_position(&self) -> CellPos {
        self.put_pos
    }

    pub fn colors(&self) -> DefaultColors {
        self.colors
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Number of ops waiting for the next flush
    pub fn pending_ops(&self) -> usize {
        self.batch.len()
    }

    /// Queue a message for the host
    pub fn send(&mut self, message: WireMessage) {
        self.outbox.push(message);
    }

    /// Take everything queued for the host, oldest first
    pub fn take_outbox(&mut self) -> Vec<WireMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Record the logical screen size without touching the host
    ///
    /// The engine confirms a resize with its own resize callback, which is
    /// what flushes and notifies the host.
    pub fn set_logical_size(&mut self, width: u32, height: u32) {
        if self.grid.width() != width || self.grid.height() != height {
            self.grid.resize(width, height);
            let size = self.size();
            self.scroll_region = full_region(size.width, size.height);
        }
    }

    /// Begin or update a composition at the live cursor
    pub fn mark(&mut self, text: &str) -> MarkPlan {
        self.composition.mark(text, self.cursor)
    }

    /// Resolve an open composition before finalized input is forwarded
    ///
    /// Pending drawing is flushed first so the unmark events land after the
    /// marked puts they correct.
    pub fn resolve_input(&mut self, text: &str) -> InputPlan {
        let plan = self.composition.resolve_input(text, self.cursor);
        if !plan.unmark.is_empty() {
            self.flush();
            for cell in &plan.unmark {
                let payload = CellPosition {
                    row: cell.row,
                    col: cell.col,
                }
                .encode();
                self.send(WireMessage::new(MessageId::Unmark, Some(payload)));
            }
        }
        plan
    }

    pub fn record_delete(&mut self, count: usize) {
        self.composition.record_delete(count, &self.grid, self.cursor);
    }

    /// Apply an autocommand notification from the engine
    pub fn autocommand(&mut self, event: AutocmdEvent) {
        match event {
            AutocmdEvent::DirChanged { cwd } => {
                self.send(WireMessage::new(
                    MessageId::CwdChanged,
                    Some(encode_text(&cwd)),
                ));
            }
            AutocmdEvent::ColorScheme { name } => {
                self.send(WireMessage::new(
                    MessageId::ColorschemeChanged,
                    Some(encode_text(&name)),
                ));
            }
            AutocmdEvent::Buffer {
                event,
                buffer,
                modified,
            } => {
                if let Some(modified) = modified {
                    if self.dirty != Some(modified) {
                        self.dirty = Some(modified);
                        self.send(WireMessage::new(
                            MessageId::DirtyStatusChanged,
                            Some(encode_bool(modified)),
                        ));
                    }
                }
                let notice = AutocommandNotice { event, buffer };
                self.send(WireMessage::new(
                    MessageId::AutocommandEvent,
                    Some(notice.encode()),
                ));
            }
        }
    }
}

fn full_region(width: u32, height: u32) -> ScrollRegion {
    ScrollRegion {
        top: 0,
        bottom: height.saturating_sub(1),
        left: 0,
        right: width.saturating_sub(1),
    }
}

impl ScreenSink for EngineBridgeState {
    fn resize(&mut self, width: u32, height: u32) {
        self.flush();
        self.grid.resize(width, height);
        let size = self.size();
        self.scroll_region = full_region(size.width, size.height);
        self.put_pos = CellPos::default();
        self.send(WireMessage::new(MessageId::Resize, Some(size.encode())));
    }

    fn clear(&mut self) {
        self.flush();
        self.grid.clear();
        self.send(WireMessage::bare(MessageId::Clear));
    }

    fn eol_clear(&mut self) {
        self.flush();
        self.grid.clear_to_eol(self.put_pos.row, self.put_pos.col);
        self.send(WireMessage::bare(MessageId::EolClear));
    }

    fn goto(&mut self, row: u32, col: u32) {
        self.put_pos = CellPos::new(row, col);
        self.batch.push(RenderOp::Goto {
            row,
            col,
            cursor_row: self.cursor.row,
            cursor_col: self.cursor.col,
        });
    }

    fn cursor_goto(&mut self, row: u32, col: u32) {
        self.cursor = CellPos::new(row, col);
        self.goto(row, col);
    }

    fn highlight_set(&mut self, attrs: HighlightAttributes) {
        self.batch.push(RenderOp::Highlight(attrs));
    }

    fn put(&mut self, text: &str) {
        let pos = self.put_pos;
        self.grid.set(pos.row, pos.col, text);
        let op = if self.composition.covers(pos, text) {
            RenderOp::PutMarked(text.to_string())
        } else {
            RenderOp::Put(text.to_string())
        };
        self.batch.push(op);
        self.put_pos.col += 1;
    }

    fn set_scroll_region(&mut self, top: u32, bottom: u32, left: u32, right: u32) {
        self.flush();
        self.scroll_region = ScrollRegion {
            top,
            bottom,
            left,
            right,
        };
        self.send(WireMessage::new(
            MessageId::SetScrollRegion,
            Some(self.scroll_region.encode()),
        ));
    }

    fn scroll(&mut self, count: i32) {
        self.flush();
        let region = self.scroll_region;
        self.grid
            .scroll(region.top, region.bottom, region.left, region.right, count);
        self.send(WireMessage::new(
            MessageId::Scroll,
            Some(ScrollEvent { count }.encode()),
        ));
    }

    fn set_colors(&mut self, colors: DefaultColors) {
        self.colors = colors;
        self.send(WireMessage::new(MessageId::SetColors, Some(colors.encode())));
    }

    fn mode_change(&mut self, mode: &str, index: u32) {
        self.mode = mode.to_string();
        let change = ModeChange {
            mode: mode.to_string(),
            index,
        };
        self.send(WireMessage::new(MessageId::ModeChange, Some(change.encode())));
    }

    fn set_title(&mut self, title: &str) {
        self.send(WireMessage::new(MessageId::SetTitle, Some(encode_text(title))));
    }

    fn set_icon(&mut self, icon: &str) {
        self.send(WireMessage::new(MessageId::SetIcon, Some(encode_text(icon))));
    }

    fn bell(&mut self) {
        self.send(WireMessage::bare(MessageId::Bell));
    }

    fn visual_bell(&mut self) {
        self.send(WireMessage::bare(MessageId::VisualBell));
    }

    fn busy_start(&mut self) {
        self.busy = true;
    }

    fn busy_stop(&mut self) {
        self.busy = false;
    }

    fn mouse_on(&mut self) {
        self.mouse_enabled = true;
    }

    fn mouse_off(&mut self) {
        self.mouse_enabled = false;
    }

    fn flush(&mut self) {
        if let Some(batch) = self.batch.take() {
            tracing::trace!(ops = batch.len(), "flushing render batch");
            self.send(WireMessage::new(MessageId::Flush, Some(batch.encode())));
        }
    }
}
