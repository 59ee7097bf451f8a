//! Message transport between the agent and the host
//!
//! - listener: inbound request/response socket
//! - outbound: fire-and-forget notifications

pub mod listener;
mod outbound;

pub use outbound::Outbound;

use crate::error::AgentError;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};

/// Inbound endpoint owned by the agent for its whole lifetime
///
/// The outbound half travels with the engine loop as an [`Outbound`].
#[derive(Debug)]
pub struct Connection {
    inbound_path: PathBuf,
    listener: Option<StdUnixListener>,
    bound: bool,
}

impl Connection {
    /// Bind the inbound socket, replacing a stale socket file
    pub fn bind(path: &Path) -> Result<Self, AgentError> {
        if path.exists() {
            tracing::debug!(path = %path.display(), "removing stale socket");
            let _ = std::fs::remove_file(path);
        }
        let bind_error = |source| AgentError::Bind {
            path: path.display().to_string(),
            source,
        };
        let listener = StdUnixListener::bind(path).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        tracing::info!(path = %path.display(), "inbound socket bound");
        Ok(Self {
            inbound_path: path.to_path_buf(),
            listener: Some(listener),
            bound: true,
        })
    }

    pub fn inbound_path(&self) -> &Path {
        &self.inbound_path
    }

    /// Hand the listener to the thread that serves it
    pub fn take_listener(&mut self) -> Option<StdUnixListener> {
        self.listener.take()
    }

    /// Release the socket; safe to call more than once
    pub fn close(&mut self) {
        self.listener = None;
        if std::mem::take(&mut self.bound) {
            if let Err(e) = std::fs::remove_file(&self.inbound_path) {
                tracing::debug!(error = %e, "socket file already gone");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_close_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.sock");
        std::fs::write(&path, b"stale").unwrap();

        let mut connection = Connection::bind(&path).unwrap();
        assert!(path.exists());
        assert!(connection.take_listener().is_some());
        assert!(connection.take_listener().is_none());

        connection.close();
        connection.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_failure_names_the_path() {
        let err = Connection::bind(Path::new("/nonexistent-dir/agent.sock")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent-dir/agent.sock"));
    }
}
