//! Agent lifecycle: socket setup, engine and listener threads, teardown
//!
//! Start-up order is fixed. The inbound socket is bound first, then the
//! engine thread is spawned and the caller blocks until it reports that its
//! runtime and loop are up. Only then does the listener thread start taking
//! host calls, and `ServerReady` is queued.

use crate::bridge::{CallBridge, EngineLoop};
use crate::config::AgentConfig;
use crate::engine::Engine;
use crate::error::AgentError;
use crate::protocol::{MessageId, WireMessage};
use crate::transport::{listener, Connection, Outbound};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Launch {
    Pending,
    Launched,
    Failed,
}

/// "UI launched" signal from the engine thread
#[derive(Debug)]
struct LaunchSignal {
    state: Mutex<Launch>,
    changed: Condvar,
}

impl LaunchSignal {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Launch::Pending),
            changed: Condvar::new(),
        })
    }

    fn set(&self, launch: Launch) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = launch;
        self.changed.notify_all();
    }

    fn wait(&self) -> Launch {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *state == Launch::Pending {
            state = match self.changed.wait(state) {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *state
    }
}

/// Marks the launch failed if the engine thread ends before launching
struct LaunchGuard(Arc<LaunchSignal>);

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        let mut state = match self.0.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == Launch::Pending {
            *state = Launch::Failed;
            self.0.changed.notify_all();
        }
    }
}

fn current_thread_runtime() -> Result<Runtime, AgentError> {
    // Current-thread runtime so the engine I/O task and the loop share one thread
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AgentError::Runtime)
}

/// Running agent; dropping it shuts everything down
#[derive(Debug)]
pub struct Agent {
    connection: Connection,
    bridge: CallBridge,
    engine_thread: Option<JoinHandle<()>>,
    listener_thread: Option<JoinHandle<()>>,
    listener_stop: Option<watch::Sender<bool>>,
    stopped: bool,
}

impl Agent {
    /// Bring the agent up; returns once host calls are being accepted
    pub fn start(config: &AgentConfig, engine: Box<dyn Engine>) -> Result<Self, AgentError> {
        let mut connection = Connection::bind(&config.inbound_socket)?;
        let std_listener = connection.take_listener().ok_or_else(|| AgentError::Bind {
            path: config.inbound_socket.display().to_string(),
            source: std::io::ErrorKind::AddrInUse.into(),
        })?;
        let (engine_loop, bridge) = EngineLoop::new(engine);

        let launched = LaunchSignal::new();
        let guard = LaunchGuard(launched.clone());
        let outbound_path = config.outbound_socket.clone();
        let send_timeout = config.send_timeout();
        let engine_thread = thread::Builder::new()
            .name("neovim-agent-engine".into())
            .spawn(move || {
                let guard = guard;
                let runtime = match current_thread_runtime() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!(error = %e, "engine thread failed");
                        return;
                    }
                };
                runtime.block_on(async move {
                    let outbound = match outbound_path {
                        Some(path) => Outbound::connect(&path, send_timeout).await,
                        None => {
                            tracing::info!("no host socket configured, running standalone");
                            Outbound::detached(send_timeout)
                        }
                    };
                    guard.0.set(Launch::Launched);
                    engine_loop.run(outbound).await;
                });
            })
            .map_err(AgentError::Thread)?;

        if launched.wait() != Launch::Launched {
            let _ = engine_thread.join();
            return Err(AgentError::EngineThreadExited);
        }
        tracing::debug!("engine thread launched");

        // From here on dropping `agent` tears the engine thread down again
        let mut agent = Self {
            connection,
            bridge: bridge.clone(),
            engine_thread: Some(engine_thread),
            listener_thread: None,
            listener_stop: None,
            stopped: false,
        };

        let (listener_stop, shutdown) = watch::channel(false);
        let call_timeout = config.call_timeout();
        let listener_bridge = bridge.clone();
        let listener_thread = thread::Builder::new()
            .name("neovim-agent-listener".into())
            .spawn(move || {
                let runtime = match current_thread_runtime() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!(error = %e, "listener thread failed");
                        return;
                    }
                };
                runtime.block_on(async move {
                    match tokio::net::UnixListener::from_std(std_listener) {
                        Ok(listener) => {
                            listener::serve(listener, listener_bridge, call_timeout, shutdown)
                                .await
                        }
                        Err(e) => tracing::error!(error = %e, "failed to register listener"),
                    }
                });
            })
            .map_err(AgentError::Thread)?;
        agent.listener_thread = Some(listener_thread);
        agent.listener_stop = Some(listener_stop);

        bridge.notify(WireMessage::bare(MessageId::ServerReady));
        tracing::info!(socket = %agent.inbound_path().display(), "agent started");
        Ok(agent)
    }

    pub fn inbound_path(&self) -> &Path {
        self.connection.inbound_path()
    }

    /// Listener-side handle, for callers embedding the agent in-process
    pub fn bridge(&self) -> &CallBridge {
        &self.bridge
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop accepting calls, stop the engine and release the sockets
    pub fn shutdown(&mut self) {
        if std::mem::replace(&mut self.stopped, true) {
            return;
        }
        tracing::info!("shutting down agent");

        if let Some(stop) = self.listener_stop.take() {
            let _ = stop.send(true);
        }
        if let Some(handle) = self.listener_thread.take() {
            if handle.join().is_err() {
                tracing::error!("listener thread panicked");
            }
        }

        self.bridge.shutdown();
        if let Some(handle) = self.engine_thread.take() {
            if handle.join().is_err() {
                tracing::error!("engine thread panicked");
            }
        }

        self.connection.close();
        tracing::info!("agent stopped");
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.shutdown();
    }
}
