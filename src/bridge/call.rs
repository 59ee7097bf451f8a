//! Synchronous calls from the listener thread into the engine loop

use super::EngineJob;
use crate::error::CallError;
use crate::protocol::{MessageId, WireMessage};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// One inbound request waiting for the engine loop
#[derive(Debug)]
pub struct PendingCall {
    pub id: MessageId,
    pub payload: Option<Bytes>,
    reply: oneshot::Sender<Option<Bytes>>,
}

impl PendingCall {
    pub fn new(
        id: MessageId,
        payload: Option<Bytes>,
    ) -> (Self, oneshot::Receiver<Option<Bytes>>) {
        let (reply, rx) = oneshot::channel();
        (Self { id, payload, reply }, rx)
    }

    /// Hand the result back; consumes the call so it can only happen once
    pub fn complete(self, result: Option<Bytes>) {
        if self.reply.send(result).is_err() {
            tracing::debug!(id = ?self.id, "caller gone, discarding late result");
        }
    }
}

/// Listener-side handle for scheduling work on the engine loop
#[derive(Debug, Clone)]
pub struct CallBridge {
    pub(super) jobs: UnboundedSender<EngineJob>,
}

impl CallBridge {
    pub(crate) fn new(jobs: UnboundedSender<EngineJob>) -> Self {
        Self { jobs }
    }

    /// Schedule a call and wait up to `timeout` for its result
    ///
    /// `Ok(None)` means the handler ran and produced no payload.
    pub async fn call(
        &self,
        raw_id: u32,
        payload: Option<Bytes>,
        timeout: Duration,
    ) -> Result<Option<Bytes>, CallError> {
        let id = MessageId::from_u32(raw_id).ok_or(CallError::UnknownMessage(raw_id))?;
        if !id.is_inbound() {
            return Err(CallError::NotInbound(id));
        }

        let (call, rx) = PendingCall::new(id, payload);
        self.jobs
            .send(EngineJob::Call(call))
            .map_err(|_| CallError::EngineStopped)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(CallError::EngineStopped),
            Err(_) => {
                tracing::warn!(?id, ?timeout, "call timed out");
                Err(CallError::Timeout)
            }
        }
    }

    /// Queue an outbound message behind everything already scheduled
    pub fn notify(&self, message: WireMessage) {
        if self.jobs.send(EngineJob::Notify(message)).is_err() {
            tracing::debug!("engine loop gone, dropping notification");
        }
    }

    /// Ask the engine loop to stop after the jobs already queued
    pub fn shutdown(&self) {
        let _ = self.jobs.send(EngineJob::Shutdown);
    }
}
