//! Fixed-field payload records, one per message id
//!
//! Integers are little-endian and fixed width. Strings inside records are a
//! `u32` byte length followed by UTF-8. Messages that carry a single piece of
//! text (input, titles, directories) use the whole payload as UTF-8.

use crate::error::CodecError;
use crate::protocol::MessageId;
use crate::screen::grid_fits;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub(crate) fn need(buf: &[u8], len: usize) -> Result<(), CodecError> {
    if buf.len() < len {
        return Err(CodecError::Truncated {
            expected: len,
            actual: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut &[u8]) -> Result<u8, CodecError> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u32(buf: &mut &[u8]) -> Result<u32, CodecError> {
    need(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub(crate) fn get_i32(buf: &mut &[u8]) -> Result<i32, CodecError> {
    need(buf, 4)?;
    Ok(buf.get_i32_le())
}

pub(crate) fn get_string(buf: &mut &[u8]) -> Result<String, CodecError> {
    let len = get_u32(buf)? as usize;
    need(buf, len)?;
    let text = String::from_utf8(buf[..len].to_vec())?;
    buf.advance(len);
    Ok(text)
}

pub(crate) fn put_string(buf: &mut BytesMut, text: &str) {
    buf.put_u32_le(text.len() as u32);
    buf.put_slice(text.as_bytes());
}

/// Payload that must be present for `id`
pub fn require(id: MessageId, payload: Option<&Bytes>) -> Result<&Bytes, CodecError> {
    payload.ok_or(CodecError::MissingPayload(id))
}

/// Whole payload as UTF-8 text
pub fn decode_text(payload: &[u8]) -> Result<String, CodecError> {
    Ok(String::from_utf8(payload.to_vec())?)
}

pub fn encode_text(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

fn check_grid(width: u32, height: u32) -> Result<(), CodecError> {
    if !grid_fits(width, height) {
        return Err(CodecError::GridTooLarge { width, height });
    }
    Ok(())
}

pub fn decode_bool(payload: &[u8]) -> Result<bool, CodecError> {
    let mut buf = payload;
    Ok(get_u8(&mut buf)? != 0)
}

pub fn encode_bool(value: bool) -> Bytes {
    Bytes::copy_from_slice(&[u8::from(value)])
}

/// `agent-ready`: initial grid size and engine arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReady {
    pub width: u32,
    pub height: u32,
    pub args: Vec<String>,
}

impl AgentReady {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.args.len() as u32);
        for arg in &self.args {
            put_string(&mut buf, arg);
        }
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        let width = get_u32(&mut buf)?;
        let height = get_u32(&mut buf)?;
        check_grid(width, height)?;
        let count = get_u32(&mut buf)? as usize;
        let mut args = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            args.push(get_string(&mut buf)?);
        }
        Ok(Self {
            width,
            height,
            args,
        })
    }
}

/// Inbound `scroll`: wheel deltas at a grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub horizontal: i32,
    pub vertical: i32,
    pub row: u32,
    pub col: u32,
}

impl ScrollRequest {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_i32_le(self.horizontal);
        buf.put_i32_le(self.vertical);
        buf.put_u32_le(self.row);
        buf.put_u32_le(self.col);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            horizontal: get_i32(&mut buf)?,
            vertical: get_i32(&mut buf)?,
            row: get_u32(&mut buf)?,
            col: get_u32(&mut buf)?,
        })
    }
}

/// Grid size, used by the inbound resize call and the outbound resize event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.freeze()
    }

    /// Sizes past the grid limits are rejected
    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        let width = get_u32(&mut buf)?;
        let height = get_u32(&mut buf)?;
        check_grid(width, height)?;
        Ok(Self { width, height })
    }

    /// Number of cells covered by this size
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Inbound `delete`: number of backspaces to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRequest {
    pub count: u32,
}

impl DeleteRequest {
    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(&self.count.to_le_bytes())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            count: get_u32(&mut buf)?,
        })
    }
}

/// A grid cell position; the `cursor-position` response and `unmark` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

impl CellPosition {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32_le(self.row);
        buf.put_u32_le(self.col);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            row: get_u32(&mut buf)?,
            col: get_u32(&mut buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: String,
    pub index: u32,
}

impl ModeChange {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_string(&mut buf, &self.mode);
        buf.put_u32_le(self.index);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            mode: get_string(&mut buf)?,
            index: get_u32(&mut buf)?,
        })
    }
}

/// Inclusive scroll region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollRegion {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl ScrollRegion {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u32_le(self.top);
        buf.put_u32_le(self.bottom);
        buf.put_u32_le(self.left);
        buf.put_u32_le(self.right);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            top: get_u32(&mut buf)?,
            bottom: get_u32(&mut buf)?,
            left: get_u32(&mut buf)?,
            right: get_u32(&mut buf)?,
        })
    }
}

/// Outbound `scroll`: rows to scroll the current region by (positive = up)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollEvent {
    pub count: i32,
}

impl ScrollEvent {
    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(&self.count.to_le_bytes())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            count: get_i32(&mut buf)?,
        })
    }
}

/// Default colors; `-1` keeps the engine default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultColors {
    pub foreground: i32,
    pub background: i32,
    pub special: i32,
}

impl Default for DefaultColors {
    fn default() -> Self {
        Self {
            foreground: -1,
            background: -1,
            special: -1,
        }
    }
}

impl DefaultColors {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_i32_le(self.foreground);
        buf.put_i32_le(self.background);
        buf.put_i32_le(self.special);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            foreground: get_i32(&mut buf)?,
            background: get_i32(&mut buf)?,
            special: get_i32(&mut buf)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocommandNotice {
    pub event: String,
    pub buffer: i32,
}

impl AutocommandNotice {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_string(&mut buf, &self.event);
        buf.put_i32_le(self.buffer);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            event: get_string(&mut buf)?,
            buffer: get_i32(&mut buf)?,
        })
    }
}
