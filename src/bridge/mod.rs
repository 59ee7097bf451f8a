//! Engine loop and the call bridge feeding it
//!
//! - call: listener-side `CallBridge` and the one-shot `PendingCall`
//! - handlers: per-message call handlers

mod call;
mod handlers;

pub use call::{CallBridge, PendingCall};
pub use handlers::{dispatch, CallContext};

use crate::engine::{AutocmdEvent, Engine, EngineEvents, RedrawEvent, RedrawTranslator};
use crate::protocol::{MessageId, WireMessage};
use crate::screen::ScreenSink;
use crate::state::EngineBridgeState;
use crate::transport::Outbound;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Work item for the engine loop, processed strictly in arrival order
#[derive(Debug)]
pub enum EngineJob {
    Call(PendingCall),
    Redraw(Vec<RedrawEvent>),
    Autocommand(AutocmdEvent),
    /// Outbound message queued from outside the loop
    Notify(WireMessage),
    EngineExited,
    Shutdown,
}

/// Single consumer of [`EngineJob`]s; owns all bridge-side state
pub struct EngineLoop {
    state: EngineBridgeState,
    engine: Box<dyn Engine>,
    translator: RedrawTranslator,
    events: EngineEvents,
    jobs: UnboundedReceiver<EngineJob>,
}

impl EngineLoop {
    pub fn new(engine: Box<dyn Engine>) -> (Self, CallBridge) {
        let (tx, rx) = unbounded_channel();
        let engine_loop = Self {
            state: EngineBridgeState::new(),
            engine,
            translator: RedrawTranslator::new(),
            events: EngineEvents::new(tx.clone()),
            jobs: rx,
        };
        (engine_loop, CallBridge::new(tx))
    }

    /// Process jobs until [`EngineJob::Shutdown`]
    pub async fn run(mut self, mut outbound: Outbound) {
        tracing::info!(reachable = outbound.is_reachable(), "engine loop started");

        while let Some(job) = self.jobs.recv().await {
            match job {
                EngineJob::Call(call) => {
                    let result = self.handle_call(&call).await;
                    // Side-effect messages reach the host before the response
                    outbound.deliver(self.state.take_outbox()).await;
                    call.complete(result);
                    continue;
                }
                EngineJob::Redraw(events) => {
                    for event in events {
                        self.translator.apply(event, &mut self.state);
                    }
                }
                EngineJob::Autocommand(event) => self.state.autocommand(event),
                EngineJob::Notify(message) => self.state.send(message),
                EngineJob::EngineExited => {
                    tracing::info!("engine exited");
                    self.state.flush();
                    self.state.send(WireMessage::bare(MessageId::Stop));
                }
                EngineJob::Shutdown => break,
            }
            outbound.deliver(self.state.take_outbox()).await;
        }

        self.engine.stop().await;
        self.state.flush();
        outbound.deliver(self.state.take_outbox()).await;
        outbound.close();
        tracing::info!("engine loop stopped");
    }

    async fn handle_call(&mut self, call: &PendingCall) -> Option<bytes::Bytes> {
        let mut ctx = CallContext {
            state: &mut self.state,
            engine: self.engine.as_mut(),
            events: &self.events,
        };
        match dispatch(&mut ctx, call.id, call.payload.as_ref()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(id = ?call.id, error = %e, "call failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GridCell, StartupReport};
    use crate::error::{CallError, EngineError};
    use crate::protocol::payload::{
        decode_bool, encode_text, AgentReady, CellPosition, DeleteRequest, GridSize,
        ScrollRequest,
    };
    use crate::protocol::read_frame;
    use crate::render::{RenderBatch, RenderOp};
    use crate::screen::CellPos;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::DuplexStream;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Engine double that records what it was asked to do
    #[derive(Default)]
    struct FakeEngine {
        log: Arc<Mutex<Vec<String>>>,
        events: Option<EngineEvents>,
        cursor: CellPos,
        cursor_calls: u32,
        diagnostics: Vec<String>,
    }

    impl FakeEngine {
        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn start(
            &mut self,
            width: u32,
            height: u32,
            args: &[String],
            events: EngineEvents,
        ) -> Result<StartupReport, EngineError> {
            if self.events.is_some() {
                return Err(EngineError::AlreadyStarted);
            }
            self.record(format!("start {width}x{height} {args:?}"));
            self.events = Some(events);
            Ok(StartupReport {
                diagnostics: self.diagnostics.clone(),
            })
        }

        async fn input(&mut self, keys: &str) -> Result<(), EngineError> {
            self.events.as_ref().ok_or(EngineError::NotStarted)?;
            self.record(format!("input {keys}"));
            Ok(())
        }

        async fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
            let events = self.events.as_ref().ok_or(EngineError::NotStarted)?;
            self.record(format!("resize {width}x{height}"));
            events.redraw(vec![
                RedrawEvent::GridResize {
                    grid: 1,
                    width: u64::from(width),
                    height: u64::from(height),
                },
                RedrawEvent::Flush,
            ]);
            Ok(())
        }

        async fn scroll(
            &mut self,
            horizontal: i32,
            vertical: i32,
            row: u32,
            col: u32,
        ) -> Result<(), EngineError> {
            self.record(format!("scroll {horizontal},{vertical} at {row},{col}"));
            Ok(())
        }

        async fn refresh(&mut self) -> Result<(), EngineError> {
            self.record("refresh".into());
            Ok(())
        }

        async fn focus(&mut self, gained: bool) -> Result<(), EngineError> {
            self.record(format!("focus {gained}"));
            Ok(())
        }

        async fn cursor(&mut self) -> Result<CellPos, EngineError> {
            let pos = CellPos::new(self.cursor.row, self.cursor.col + self.cursor_calls);
            self.cursor_calls += 1;
            Ok(pos)
        }

        async fn stop(&mut self) {
            self.record("stop".into());
            self.events = None;
        }
    }

    struct Harness {
        bridge: CallBridge,
        host: DuplexStream,
        log: Arc<Mutex<Vec<String>>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn new(engine: FakeEngine) -> Self {
            let log = engine.log.clone();
            let (engine_loop, bridge) = EngineLoop::new(Box::new(engine));
            let (agent_side, host) = tokio::io::duplex(1 << 20);
            let outbound = Outbound::from_writer(agent_side, TIMEOUT);
            let handle = tokio::spawn(engine_loop.run(outbound));
            Self {
                bridge,
                host,
                log,
                handle,
            }
        }

        async fn call(&self, id: MessageId, payload: Option<Bytes>) -> Option<Bytes> {
            self.bridge
                .call(id.to_u32(), payload, TIMEOUT)
                .await
                .unwrap()
        }

        async fn ready(&self, width: u32, height: u32) {
            let ready = AgentReady {
                width,
                height,
                args: vec![],
            };
            self.call(MessageId::AgentReady, Some(ready.encode())).await;
        }

        async fn next(&mut self) -> WireMessage {
            let frame = read_frame(&mut self.host).await.unwrap().unwrap();
            WireMessage {
                id: frame.message_id().unwrap(),
                payload: frame.payload,
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        async fn shutdown(self) {
            self.bridge.shutdown();
            self.handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_agent_ready_starts_engine_and_reports() {
        let mut h = Harness::new(FakeEngine {
            diagnostics: vec!["E5113: lua error".into()],
            ..Default::default()
        });
        h.ready(80, 24).await;

        let ready = h.next().await;
        assert_eq!(ready.id, MessageId::NvimReady);
        assert!(decode_bool(ready.payload.as_ref().unwrap()).unwrap());
        assert_eq!(h.log(), vec!["start 80x24 []"]);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_calls_before_start_yield_no_result() {
        let h = Harness::new(FakeEngine::default());
        let result = h
            .call(MessageId::Input, Some(encode_text("ihello")))
            .await;
        assert_eq!(result, None);
        assert!(h.log().is_empty());
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_resize_flushes_pending_ops_then_resizes() {
        let mut h = Harness::new(FakeEngine::default());
        h.ready(80, 24).await;
        assert_eq!(h.next().await.id, MessageId::NvimReady);

        // Drawing without a flush stays pending on the loop
        h.bridge.notify(WireMessage::bare(MessageId::Bell));
        let events = EngineEvents::new(h.bridge_jobs());
        events.redraw(vec![RedrawEvent::GridLine {
            grid: 1,
            row: 0,
            col_start: 0,
            cells: vec![GridCell {
                text: "x".into(),
                hl_id: None,
                repeat: 1,
            }],
        }]);

        let size = GridSize {
            width: 120,
            height: 40,
        };
        h.call(MessageId::ResizeInput, Some(size.encode())).await;

        assert_eq!(h.next().await.id, MessageId::Bell);
        let flush = h.next().await;
        assert_eq!(flush.id, MessageId::Flush);
        let batch = RenderBatch::decode(flush.payload.as_ref().unwrap()).unwrap();
        assert_eq!(batch.ops()[1], RenderOp::Put("x".into()));

        let resize = h.next().await;
        assert_eq!(resize.id, MessageId::Resize);
        assert_eq!(
            GridSize::decode(resize.payload.as_ref().unwrap()).unwrap(),
            size
        );
        assert!(h.log().contains(&"resize 120x40".to_string()));

        // The engine's own flush has nothing left to send
        h.bridge.notify(WireMessage::bare(MessageId::VisualBell));
        assert_eq!(h.next().await.id, MessageId::VisualBell);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_marked_text_replacement_and_commit() {
        let mut h = Harness::new(FakeEngine {
            cursor: CellPos::new(2, 5),
            ..Default::default()
        });
        h.ready(80, 24).await;
        h.next().await;

        // Cursor reported by the engine before composing
        let events = EngineEvents::new(h.bridge_jobs());
        events.redraw(vec![RedrawEvent::GridCursorGoto {
            grid: 1,
            row: 2,
            col: 5,
        }]);

        h.call(MessageId::MarkedInput, Some(encode_text("ab"))).await;
        h.call(MessageId::MarkedInput, Some(encode_text("c<"))).await;

        events.redraw(vec![RedrawEvent::GridCursorGoto {
            grid: 1,
            row: 2,
            col: 7,
        }]);
        h.call(MessageId::Input, Some(encode_text("c<"))).await;

        // Pending cursor moves are flushed ahead of the corrections
        assert_eq!(h.next().await.id, MessageId::Flush);
        for col in [6, 5] {
            let unmark = h.next().await;
            assert_eq!(unmark.id, MessageId::Unmark);
            assert_eq!(
                CellPosition::decode(unmark.payload.as_ref().unwrap()).unwrap(),
                CellPosition { row: 2, col }
            );
        }

        assert_eq!(
            h.log()[1..],
            [
                "input ab".to_string(),
                "input <BS><BS>c<lt>".to_string(),
                "input <BS><BS>c<".to_string(),
            ]
        );
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_and_focus_forwarding() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;

        let delete = DeleteRequest { count: 3 };
        h.call(MessageId::Delete, Some(delete.encode())).await;
        h.call(MessageId::FocusGained, Some(Bytes::from_static(&[0])))
            .await;

        assert_eq!(h.log()[1..], ["input <BS><BS><BS>", "focus false"]);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_resize_is_rejected_and_loop_keeps_running() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;

        let huge = GridSize {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert_eq!(h.call(MessageId::ResizeInput, Some(huge.encode())).await, None);
        assert!(h.call(MessageId::CursorPosition, None).await.is_some());

        let size = GridSize {
            width: 12,
            height: 3,
        };
        h.call(MessageId::ResizeInput, Some(size.encode())).await;
        assert_eq!(h.log()[1..], ["resize 12x3"]);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_count_is_clamped_to_grid_cells() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;

        let delete = DeleteRequest { count: u32::MAX };
        h.call(MessageId::Delete, Some(delete.encode())).await;

        assert_eq!(h.log()[1..], [format!("input {}", "<BS>".repeat(20))]);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_scroll_steps_are_clamped_to_grid_size() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;

        let scroll = ScrollRequest {
            horizontal: i32::MIN,
            vertical: i32::MAX,
            row: 1,
            col: 3,
        };
        h.call(MessageId::ScrollInput, Some(scroll.encode())).await;
        let small = ScrollRequest {
            horizontal: 0,
            vertical: -1,
            row: 0,
            col: 0,
        };
        h.call(MessageId::ScrollInput, Some(small.encode())).await;

        assert_eq!(
            h.log()[1..],
            ["scroll -10,2 at 1,3", "refresh", "scroll 0,-1 at 0,0", "refresh"]
        );
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_engine_exit_sends_stop() {
        let mut h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;
        assert_eq!(h.next().await.id, MessageId::NvimReady);

        EngineEvents::new(h.bridge_jobs()).exited();
        assert_eq!(h.next().await.id, MessageId::Stop);
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_calls_complete_in_fifo_order() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;

        let calls = (0..100).map(|_| h.call(MessageId::CursorPosition, None));
        let results = futures::future::join_all(calls).await;

        for (i, result) in results.into_iter().enumerate() {
            let position = CellPosition::decode(&result.unwrap()).unwrap();
            assert_eq!(position, CellPosition { row: 0, col: i as u32 });
        }
        h.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_engine_and_rejects_calls() {
        let h = Harness::new(FakeEngine::default());
        h.ready(10, 2).await;
        let bridge = h.bridge.clone();
        let log = h.log.clone();
        h.shutdown().await;

        assert_eq!(log.lock().unwrap().last().unwrap(), "stop");
        assert_eq!(
            bridge
                .call(MessageId::Input.to_u32(), None, TIMEOUT)
                .await,
            Err(CallError::EngineStopped)
        );
    }

    impl Harness {
        /// Sender the engine would use to report redraws
        fn bridge_jobs(&self) -> tokio::sync::mpsc::UnboundedSender<EngineJob> {
            self.bridge.jobs.clone()
        }
    }
}
