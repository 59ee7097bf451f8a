//! Render batch accumulation
//!
//! Drawing callbacks append [`RenderOp`]s in the order they happen. A flush
//! hands the whole batch to the transport as one `Flush` message and starts a
//! fresh one. Ops are never reordered or merged, inside a batch or across
//! batches.

use crate::error::CodecError;
use crate::protocol::payload::{get_string, get_u32, get_u8, put_string, need};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const BOLD: u16 = 1 << 0;
pub const ITALIC: u16 = 1 << 1;
pub const UNDERLINE: u16 = 1 << 2;
pub const UNDERCURL: u16 = 1 << 3;
pub const REVERSE: u16 = 1 << 4;
pub const STRIKETHROUGH: u16 = 1 << 5;

/// Color value meaning "use the engine default"
pub const DEFAULT_COLOR: i32 = -1;

/// Highlight attributes for the cells that follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightAttributes {
    pub foreground: i32,
    pub background: i32,
    pub special: i32,
    pub flags: u16,
}

impl Default for HighlightAttributes {
    fn default() -> Self {
        Self {
            foreground: DEFAULT_COLOR,
            background: DEFAULT_COLOR,
            special: DEFAULT_COLOR,
            flags: 0,
        }
    }
}

impl HighlightAttributes {
    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

/// One drawing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    /// Move the put position; carries the live cursor so the host can place it
    Goto {
        row: u32,
        col: u32,
        cursor_row: u32,
        cursor_col: u32,
    },
    Highlight(HighlightAttributes),
    /// Text for one cell at the put position
    Put(String),
    /// Like `Put`, but the cell belongs to the active composition
    PutMarked(String),
}

const TAG_GOTO: u8 = 0;
const TAG_HIGHLIGHT: u8 = 1;
const TAG_PUT: u8 = 2;
const TAG_PUT_MARKED: u8 = 3;

/// Ordered ops flushed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBatch {
    ops: Vec<RenderOp>,
}

impl RenderBatch {
    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<RenderOp> {
        self.ops
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.ops.len() as u32);
        for op in &self.ops {
            match op {
                RenderOp::Goto {
                    row,
                    col,
                    cursor_row,
                    cursor_col,
                } => {
                    buf.put_u8(TAG_GOTO);
                    buf.put_u32_le(*row);
                    buf.put_u32_le(*col);
                    buf.put_u32_le(*cursor_row);
                    buf.put_u32_le(*cursor_col);
                }
                RenderOp::Highlight(attrs) => {
                    buf.put_u8(TAG_HIGHLIGHT);
                    buf.put_i32_le(attrs.foreground);
                    buf.put_i32_le(attrs.background);
                    buf.put_i32_le(attrs.special);
                    buf.put_u16_le(attrs.flags);
                }
                RenderOp::Put(text) => {
                    buf.put_u8(TAG_PUT);
                    put_string(&mut buf, text);
                }
                RenderOp::PutMarked(text) => {
                    buf.put_u8(TAG_PUT_MARKED);
                    put_string(&mut buf, text);
                }
            }
        }
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        let count = get_u32(&mut buf)? as usize;
        let mut ops = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let op = match get_u8(&mut buf)? {
                TAG_GOTO => {
                    need(buf, 16)?;
                    RenderOp::Goto {
                        row: buf.get_u32_le(),
                        col: buf.get_u32_le(),
                        cursor_row: buf.get_u32_le(),
                        cursor_col: buf.get_u32_le(),
                    }
                }
                TAG_HIGHLIGHT => {
                    need(buf, 14)?;
                    RenderOp::Highlight(HighlightAttributes {
                        foreground: buf.get_i32_le(),
                        background: buf.get_i32_le(),
                        special: buf.get_i32_le(),
                        flags: buf.get_u16_le(),
                    })
                }
                TAG_PUT => RenderOp::Put(get_string(&mut buf)?),
                TAG_PUT_MARKED => RenderOp::PutMarked(get_string(&mut buf)?),
                tag => return Err(CodecError::UnknownRenderOp(tag)),
            };
            ops.push(op);
        }
        Ok(Self { ops })
    }
}

impl From<Vec<RenderOp>> for RenderBatch {
    fn from(ops: Vec<RenderOp>) -> Self {
        Self { ops }
    }
}

/// Batch currently being filled by the engine thread
#[derive(Debug, Default)]
pub struct RenderAccumulator {
    current: RenderBatch,
}

impl RenderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: RenderOp) {
        tracing::trace!(?op, "render op");
        self.current.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Hand off the current batch and start an empty one
    ///
    /// Returns `None` when nothing was drawn since the last hand-off.
    pub fn take(&mut self) -> Option<RenderBatch> {
        if self.current.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.current))
    }
}
