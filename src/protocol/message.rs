//! Message ids and frame layout shared by both channels
//!
//! A frame on either socket is:
//!
//! ```text
//! [id: u32 BE][has_payload: u8][len: u32 BE][payload...]
//! ```
//!
//! `len` is 0 and no payload bytes follow when `has_payload` is 0. The set of
//! message ids is the whole schema; payload layout is fixed per id
//! (see [`crate::protocol::payload`]).

use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Header size: id(4) + has_payload(1) + len(4)
pub const FRAME_HEADER_LEN: usize = 9;

/// Largest payload accepted on either channel (16 MiB)
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Every message the agent and the host exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    // Inbound calls (host -> agent)
    AgentReady,
    ScrollInput,
    ResizeInput,
    Input,
    MarkedInput,
    Delete,
    FocusGained,
    CursorPosition,

    // Outbound events (agent -> host)
    Flush,
    Resize,
    Clear,
    EolClear,
    ModeChange,
    SetScrollRegion,
    Scroll,
    SetColors,
    Bell,
    VisualBell,
    SetTitle,
    SetIcon,
    DirtyStatusChanged,
    CwdChanged,
    ColorschemeChanged,
    AutocommandEvent,
    NvimReady,
    Stop,
    ServerReady,
    Unmark,
}

impl MessageId {
    /// Wire value of this id
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::AgentReady => 0,
            Self::ScrollInput => 1,
            Self::ResizeInput => 2,
            Self::Input => 3,
            Self::MarkedInput => 4,
            Self::Delete => 5,
            Self::FocusGained => 6,
            Self::CursorPosition => 7,

            Self::Flush => 100,
            Self::Resize => 101,
            Self::Clear => 102,
            Self::EolClear => 103,
            Self::ModeChange => 104,
            Self::SetScrollRegion => 105,
            Self::Scroll => 106,
            Self::SetColors => 107,
            Self::Bell => 108,
            Self::VisualBell => 109,
            Self::SetTitle => 110,
            Self::SetIcon => 111,
            Self::DirtyStatusChanged => 112,
            Self::CwdChanged => 113,
            Self::ColorschemeChanged => 114,
            Self::AutocommandEvent => 115,
            Self::NvimReady => 116,
            Self::Stop => 117,
            Self::ServerReady => 118,
            Self::Unmark => 119,
        }
    }

    /// Parse a wire value; `None` for ids outside the protocol
    pub const fn from_u32(value: u32) -> Option<Self> {
        let id = match value {
            0 => Self::AgentReady,
            1 => Self::ScrollInput,
            2 => Self::ResizeInput,
            3 => Self::Input,
            4 => Self::MarkedInput,
            5 => Self::Delete,
            6 => Self::FocusGained,
            7 => Self::CursorPosition,

            100 => Self::Flush,
            101 => Self::Resize,
            102 => Self::Clear,
            103 => Self::EolClear,
            104 => Self::ModeChange,
            105 => Self::SetScrollRegion,
            106 => Self::Scroll,
            107 => Self::SetColors,
            108 => Self::Bell,
            109 => Self::VisualBell,
            110 => Self::SetTitle,
            111 => Self::SetIcon,
            112 => Self::DirtyStatusChanged,
            113 => Self::CwdChanged,
            114 => Self::ColorschemeChanged,
            115 => Self::AutocommandEvent,
            116 => Self::NvimReady,
            117 => Self::Stop,
            118 => Self::ServerReady,
            119 => Self::Unmark,
            _ => return None,
        };
        Some(id)
    }

    /// Whether the host issues this id as a call into the agent
    pub const fn is_inbound(self) -> bool {
        self.to_u32() < 100
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AgentReady => "agent-ready",
            Self::ScrollInput => "scroll",
            Self::ResizeInput => "resize",
            Self::Input => "input",
            Self::MarkedInput => "marked-input",
            Self::Delete => "delete",
            Self::FocusGained => "focus-gained",
            Self::CursorPosition => "cursor-position",
            Self::Flush => "flush",
            Self::Resize => "resize-event",
            Self::Clear => "clear",
            Self::EolClear => "eol-clear",
            Self::ModeChange => "mode-change",
            Self::SetScrollRegion => "set-scroll-region",
            Self::Scroll => "scroll-event",
            Self::SetColors => "set-colors",
            Self::Bell => "bell",
            Self::VisualBell => "visual-bell",
            Self::SetTitle => "set-title",
            Self::SetIcon => "set-icon",
            Self::DirtyStatusChanged => "dirty-status-changed",
            Self::CwdChanged => "cwd-changed",
            Self::ColorschemeChanged => "colorscheme-changed",
            Self::AutocommandEvent => "autocommand-event",
            Self::NvimReady => "nvim-ready",
            Self::Stop => "stop",
            Self::ServerReady => "server-ready",
            Self::Unmark => "unmark",
        };
        f.write_str(label)
    }
}

/// One message on either channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub id: MessageId,
    pub payload: Option<Bytes>,
}

impl WireMessage {
    pub fn new(id: MessageId, payload: Option<Bytes>) -> Self {
        Self { id, payload }
    }

    /// Message without payload
    pub fn bare(id: MessageId) -> Self {
        Self { id, payload: None }
    }

    /// Encode this message as one frame
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        encode_frame(self.id.to_u32(), self.payload.as_ref())
    }

    /// Decode one complete frame
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let (raw_id, payload) = decode_frame(frame)?;
        let id = MessageId::from_u32(raw_id).ok_or(CodecError::UnknownMessageId(raw_id))?;
        Ok(Self { id, payload })
    }
}

fn encode_frame(raw_id: u32, payload: Option<&Bytes>) -> Result<Bytes, CodecError> {
    let len = payload.map_or(0, Bytes::len);
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + len);
    buf.put_u32(raw_id);
    buf.put_u8(u8::from(payload.is_some()));
    buf.put_u32(len as u32);
    if let Some(payload) = payload {
        buf.put_slice(payload);
    }
    Ok(buf.freeze())
}

fn decode_frame(mut frame: &[u8]) -> Result<(u32, Option<Bytes>), CodecError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(CodecError::Truncated {
            expected: FRAME_HEADER_LEN,
            actual: frame.len(),
        });
    }

    let raw_id = frame.get_u32();
    let has_payload = frame.get_u8() != 0;
    let len = frame.get_u32() as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }
    if frame.len() < len {
        return Err(CodecError::Truncated {
            expected: len,
            actual: frame.len(),
        });
    }

    let payload = has_payload.then(|| Bytes::copy_from_slice(&frame[..len]));
    Ok((raw_id, payload))
}

/// A frame read off a socket whose id may not be part of the protocol
///
/// The listener answers unknown ids instead of dropping the connection, so the
/// raw id has to survive decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub id: u32,
    pub payload: Option<Bytes>,
}

impl RawFrame {
    pub fn message_id(&self) -> Option<MessageId> {
        MessageId::from_u32(self.id)
    }
}

/// Read one frame; `Ok(None)` on a clean end of stream before a header
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<RawFrame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut cursor = &header[..];
    let id = cursor.get_u32();
    let has_payload = cursor.get_u8() != 0;
    let len = cursor.get_u32() as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(RawFrame {
        id,
        payload: has_payload.then(|| Bytes::from(payload)),
    }))
}

/// Write one frame for a known message
pub async fn write_message<W>(writer: &mut W, message: &WireMessage) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    write_raw(writer, message.id.to_u32(), message.payload.as_ref()).await
}

/// Write one frame for an arbitrary id (responses echo the request id verbatim)
pub async fn write_raw<W>(
    writer: &mut W,
    raw_id: u32,
    payload: Option<&Bytes>,
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(raw_id, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
