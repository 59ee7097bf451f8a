//! Fire-and-forget notifications to the host

use crate::error::SendFailure;
use crate::protocol::{write_message, WireMessage};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::UnixStream;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outbound endpoint; at most one writer, released on the first failure
pub struct Outbound {
    writer: Option<BoxedWriter>,
    send_timeout: Duration,
    /// Whether a remote was ever established
    connected: bool,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbound")
            .field("reachable", &self.is_reachable())
            .field("connected", &self.connected)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

impl Outbound {
    /// Endpoint without a remote; every send short-circuits
    pub fn detached(send_timeout: Duration) -> Self {
        Self {
            writer: None,
            send_timeout,
            connected: false,
        }
    }

    pub fn from_writer<W>(writer: W, send_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Some(Box::new(writer)),
            send_timeout,
            connected: true,
        }
    }

    /// Dial the host's socket; failure leaves a detached endpoint
    pub async fn connect(path: &Path, send_timeout: Duration) -> Self {
        match tokio::time::timeout(send_timeout, UnixStream::connect(path)).await {
            Ok(Ok(stream)) => {
                tracing::info!(path = %path.display(), "connected to host");
                Self::from_writer(stream, send_timeout)
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "host not reachable");
                Self::detached(send_timeout)
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "timed out connecting to host");
                Self::detached(send_timeout)
            }
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.writer.is_some()
    }

    /// Write one message within the send timeout
    pub async fn send(&mut self, message: &WireMessage) -> Result<(), SendFailure> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SendFailure::Unreachable);
        };

        match tokio::time::timeout(self.send_timeout, write_message(writer, message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.writer = None;
                Err(SendFailure::Io(e))
            }
            Err(_) => {
                self.writer = None;
                Err(SendFailure::Timeout)
            }
        }
    }

    /// Send messages in order, logging and swallowing failures
    pub async fn deliver(&mut self, messages: Vec<WireMessage>) {
        for message in messages {
            match self.send(&message).await {
                Ok(()) => tracing::trace!(id = ?message.id, "sent"),
                Err(SendFailure::Unreachable) if !self.connected => {
                    tracing::debug!(id = ?message.id, "no host, dropping message");
                }
                Err(e) => tracing::warn!(id = ?message.id, error = %e, "failed to notify host"),
            }
        }
    }

    /// Release the writer
    pub fn close(&mut self) {
        self.writer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_frame, MessageId};
    use bytes::Bytes;

    #[tokio::test]
    async fn test_detached_short_circuits() {
        let mut outbound = Outbound::detached(Duration::from_secs(1));
        assert!(!outbound.is_reachable());
        let result = outbound.send(&WireMessage::bare(MessageId::Bell)).await;
        assert!(matches!(result, Err(SendFailure::Unreachable)));
        // Delivery never fails
        outbound
            .deliver(vec![WireMessage::bare(MessageId::Stop)])
            .await;
    }

    #[tokio::test]
    async fn test_send_writes_frames_in_order() {
        let (writer, mut reader) = tokio::io::duplex(1024);
        let mut outbound = Outbound::from_writer(writer, Duration::from_secs(1));
        outbound
            .deliver(vec![
                WireMessage::bare(MessageId::Clear),
                WireMessage::new(MessageId::SetTitle, Some(Bytes::from_static(b"t"))),
            ])
            .await;

        let first = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(first.message_id(), Some(MessageId::Clear));
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(second.message_id(), Some(MessageId::SetTitle));
        assert_eq!(second.payload.as_deref(), Some(&b"t"[..]));
    }

    #[tokio::test]
    async fn test_stalled_host_times_out_and_releases_writer() {
        // Nobody reads, so the second frame cannot fit
        let (writer, _reader) = tokio::io::duplex(16);
        let mut outbound = Outbound::from_writer(writer, Duration::from_millis(20));
        let message = WireMessage::new(MessageId::SetTitle, Some(Bytes::from(vec![b'x'; 64])));

        let result = outbound.send(&message).await;
        assert!(matches!(result, Err(SendFailure::Timeout)));
        assert!(!outbound.is_reachable());
        assert!(matches!(
            outbound.send(&message).await,
            Err(SendFailure::Unreachable)
        ));
    }

    #[tokio::test]
    async fn test_closed_host_is_an_io_failure() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let mut outbound = Outbound::from_writer(writer, Duration::from_secs(1));
        let result = outbound.send(&WireMessage::bare(MessageId::Bell)).await;
        assert!(matches!(result, Err(SendFailure::Io(_))));
        assert!(!outbound.is_reachable());
    }

    #[tokio::test]
    async fn test_connect_without_host_is_detached() {
        let dir = tempfile::tempdir().unwrap();
        let outbound = Outbound::connect(&dir.path().join("missing.sock"), Duration::from_secs(1)).await;
        assert!(!outbound.is_reachable());
    }
}
