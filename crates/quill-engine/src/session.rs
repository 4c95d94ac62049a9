//! Worksheet session actor.
//!
//! A [`WorksheetSession`] owns one worksheet, its evaluation controller and
//! the engine process. All mutation happens on the session task: requests
//! arrive through a [`SessionHandle`], engine events through the process
//! channel, and everything the host should display is published as
//! [`SessionMessage`]s on a broadcast channel.

use std::sync::Arc;

use quill_core::{
    Activity, CellId, ControllerConfig, EngineEvent, EvaluationController, EvaluationOutcome,
    StatusChange, StatusObserver, Worksheet,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::process::EngineProcess;

/// Capacity for the broadcast channel.
/// Subscribers that fall further behind lose the oldest messages.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Capacity for pending requests.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Something the host asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// Evaluate a cell, or every input cell a folded heading hides.
    EvaluateCell(CellId),
    /// Evaluate the whole worksheet.
    EvaluateAll,
    /// Evaluate everything before the given cell.
    EvaluateAbove(CellId),
    /// Answer the engine's question.
    Answer(String),
    /// Abort the cell in flight.
    Interrupt,
    /// Continue with cells kept after an interrupt or disconnect.
    Resume,
    /// Drop every pending cell.
    ClearQueue,
    Fold(CellId),
    Unfold(CellId),
    /// Restart the engine process.
    Reconnect,
    BeginActivity(Activity),
    FinishActivity { success: bool },
    /// Stop the session and hand the worksheet back.
    Shutdown,
}

/// Notification published by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    StatusChanged { change: StatusChange },
    StatusText { text: String },
    QueueLength { len: usize, text: String },
    CellStarted { cell_id: CellId },
    CellFinished {
        cell_id: CellId,
        outcome: EvaluationOutcome,
        output: Option<String>,
    },
    Question { cell_id: CellId, prompt: String },
    /// The queue ran dry.
    Drained,
    /// A request could not be carried out.
    RequestFailed { message: String },
}

/// Forwards controller notifications to the broadcast channel.
pub struct BroadcastObserver {
    tx: broadcast::Sender<SessionMessage>,
}

impl BroadcastObserver {
    pub fn new(tx: broadcast::Sender<SessionMessage>) -> Self {
        Self { tx }
    }

    /// Broadcast a message, ignoring send failures.
    fn broadcast(&self, msg: SessionMessage) {
        let _ = self.tx.send(msg);
    }
}

impl StatusObserver for BroadcastObserver {
    fn on_status_changed(&self, change: &StatusChange) {
        self.broadcast(SessionMessage::StatusChanged { change: *change });
    }

    fn on_status_text(&self, text: &str) {
        self.broadcast(SessionMessage::StatusText {
            text: text.to_string(),
        });
    }

    fn on_queue_length(&self, len: usize, text: &str) {
        self.broadcast(SessionMessage::QueueLength {
            len,
            text: text.to_string(),
        });
    }

    fn on_cell_started(&self, cell: CellId) {
        self.broadcast(SessionMessage::CellStarted { cell_id: cell });
    }

    fn on_cell_finished(&self, cell: CellId, outcome: EvaluationOutcome, output: Option<&str>) {
        self.broadcast(SessionMessage::CellFinished {
            cell_id: cell,
            outcome,
            output: output.map(str::to_string),
        });
    }

    fn on_question(&self, cell: CellId, prompt: &str) {
        self.broadcast(SessionMessage::Question {
            cell_id: cell,
            prompt: prompt.to_string(),
        });
    }

    fn on_drained(&self) {
        self.broadcast(SessionMessage::Drained);
    }
}

/// Cloneable request side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<SessionRequest>,
    tx: broadcast::Sender<SessionMessage>,
}

impl SessionHandle {
    /// Queue a request for the session task.
    pub async fn send(&self, request: SessionRequest) -> EngineResult<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| EngineError::SessionClosed)
    }

    /// Subscribe to session messages.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionMessage> {
        self.tx.subscribe()
    }
}

/// One worksheet bound to one engine.
pub struct WorksheetSession {
    worksheet: Worksheet,
    controller: EvaluationController<EngineProcess>,
    engine_config: EngineConfig,
    /// Events of the current engine process.
    events: mpsc::UnboundedReceiver<EngineEvent>,
    requests: mpsc::Receiver<SessionRequest>,
    tx: broadcast::Sender<SessionMessage>,
}

impl WorksheetSession {
    /// Start the engine and build a session around `worksheet`.
    ///
    /// Must be called from within a tokio runtime. The session runs until
    /// [`SessionRequest::Shutdown`] or until every handle is dropped; subscribe
    /// before calling [`run`](Self::run) to see the first status.
    pub fn new(
        worksheet: Worksheet,
        engine_config: EngineConfig,
        controller_config: ControllerConfig,
    ) -> EngineResult<(Self, SessionHandle)> {
        let (process, events) = EngineProcess::spawn(&engine_config)?;

        let (tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (requests_tx, requests) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);

        let mut controller = EvaluationController::new(process, controller_config);
        controller.add_observer(Arc::new(BroadcastObserver::new(tx.clone())));

        let handle = SessionHandle {
            requests: requests_tx,
            tx: tx.clone(),
        };
        let session = Self {
            worksheet,
            controller,
            engine_config,
            events,
            requests,
            tx,
        };
        Ok((session, handle))
    }

    pub fn worksheet(&self) -> &Worksheet {
        &self.worksheet
    }

    /// Drive the session until shutdown is requested or every handle is gone.
    ///
    /// Returns the worksheet with all evaluation results written back.
    pub async fn run(mut self) -> EngineResult<Worksheet> {
        self.controller.start();

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    debug!("Engine event: {:?}", event);
                    self.controller.handle_event(&mut self.worksheet, event);
                }
                request = self.requests.recv() => match request {
                    Some(SessionRequest::Shutdown) | None => break,
                    Some(request) => self.apply(request).await,
                },
            }
        }

        info!("Shutting down worksheet session");
        self.controller.shutdown(&mut self.worksheet);
        self.controller.into_transport().shutdown().await?;
        Ok(self.worksheet)
    }

    async fn apply(&mut self, request: SessionRequest) {
        debug!("Session request: {:?}", request);
        let result = match request {
            SessionRequest::Reconnect => self.reconnect().await,
            other => self.apply_local(other).map_err(EngineError::from),
        };

        if let Err(e) = result {
            warn!("Request failed: {}", e);
            let _ = self.tx.send(SessionMessage::RequestFailed {
                message: e.to_string(),
            });
        }
    }

    fn apply_local(&mut self, request: SessionRequest) -> quill_core::Result<()> {
        let doc = &mut self.worksheet;
        match request {
            SessionRequest::EvaluateCell(cell) => {
                self.controller.evaluate_cell(doc, cell)?;
            }
            SessionRequest::EvaluateAll => {
                self.controller.evaluate_all(doc);
            }
            SessionRequest::EvaluateAbove(anchor) => {
                self.controller.evaluate_above(doc, anchor)?;
            }
            SessionRequest::Answer(answer) => self.controller.answer(doc, &answer)?,
            SessionRequest::Interrupt => {
                self.controller.interrupt(doc);
            }
            SessionRequest::Resume => self.controller.resume(doc),
            SessionRequest::ClearQueue => self.controller.clear_queue(),
            SessionRequest::Fold(cell) => {
                doc.fold(cell)?;
            }
            SessionRequest::Unfold(cell) => {
                doc.unfold(cell)?;
            }
            SessionRequest::BeginActivity(activity) => self.controller.begin_activity(activity),
            SessionRequest::FinishActivity { success } => self.controller.finish_activity(success),
            SessionRequest::Reconnect | SessionRequest::Shutdown => {}
        }
        Ok(())
    }

    /// Replace the engine with a fresh process.
    ///
    /// Events of the old process are dropped with its channel, so a late
    /// disconnect from it cannot reach the controller.
    async fn reconnect(&mut self) -> EngineResult<()> {
        let (process, events) = EngineProcess::spawn(&self.engine_config)?;
        self.events = events;
        let old = self.controller.reconnect(&mut self.worksheet, process);
        old.shutdown().await
    }
}
