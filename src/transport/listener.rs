//! Inbound request/response socket served on the listener thread

use crate::bridge::CallBridge;
use crate::protocol::{read_frame, write_raw};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

/// Accept host connections until `shutdown` flips or its sender is dropped
pub async fn serve(
    listener: UnixListener,
    bridge: CallBridge,
    call_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("listening for host calls");
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tracing::debug!("host connected");
                    tokio::spawn(serve_connection(stream, bridge.clone(), call_timeout));
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
            _ = shutdown.changed() => break,
        }
    }
    tracing::info!("listener stopped");
}

/// One outstanding call at a time: read, call, answer with the same id
async fn serve_connection(mut stream: UnixStream, bridge: CallBridge, call_timeout: Duration) {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame, closing connection");
                break;
            }
        };

        let result = match bridge.call(frame.id, frame.payload, call_timeout).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(id = frame.id, error = %e, "call produced no result");
                None
            }
        };

        if let Err(e) = write_raw(&mut stream, frame.id, result.as_ref()).await {
            tracing::warn!(id = frame.id, error = %e, "failed to answer host");
            break;
        }
    }
    tracing::debug!("host disconnected");
}
