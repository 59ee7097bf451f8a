//! Error types shared across the agent

use crate::protocol::MessageId;
use thiserror::Error;

/// Failure to encode or decode a frame or payload record
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated input: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),
    #[error("unknown message id {0}")]
    UnknownMessageId(u32),
    #[error("missing payload for {0}")]
    MissingPayload(MessageId),
    #[error("invalid utf-8 in payload")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("grid of {width}x{height} cells exceeds the size limit")]
    GridTooLarge { width: u32, height: u32 },
    #[error("unknown render op tag {0}")]
    UnknownRenderOp(u8),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound notification could not be delivered
#[derive(Debug, Error)]
pub enum SendFailure {
    #[error("host endpoint is not reachable")]
    Unreachable,
    #[error("send timed out")]
    Timeout,
    #[error("send failed: {0}")]
    Io(#[from] CodecError),
}

/// Inbound synchronous call produced no result
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("call deadline elapsed before a result was produced")]
    Timeout,
    #[error("engine loop is no longer running")]
    EngineStopped,
    #[error("unknown message id {0}")]
    UnknownMessage(u32),
    #[error("{0} is not an inbound call")]
    NotInbound(MessageId),
}

/// Failure reported by the editing engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has not been started")]
    NotStarted,
    #[error("engine is already running")]
    AlreadyStarted,
    #[error("failed to spawn engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine rpc failed: {0}")]
    Rpc(String),
}

/// Configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Agent could not be started
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind inbound socket {path}: {source}")]
    Bind {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to build runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to spawn thread: {0}")]
    Thread(std::io::Error),
    #[error("engine thread exited before the loop was ready")]
    EngineThreadExited,
}

/// A call handler could not complete; the caller gets "no result"
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0} has no call handler")]
    Unsupported(MessageId),
}
