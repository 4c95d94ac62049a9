//! Evaluation controller.
//!
//! Pulls the head of the evaluation queue, hands it to the engine, interprets
//! the engine's events and writes results back into the worksheet. At most one
//! cell is ever outstanding at the engine.
//!
//! # Flow
//!
//! ```text
//! evaluate_* ──► EvaluationQueue ──► pump ──► EngineTransport::send_command
//!                                     ▲                 │
//!                                     │                 ▼
//!                        remove_first ◄── handle_event(EngineEvent)
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ControllerConfig, QueuePolicy};
use crate::document::{CellId, EvaluationOutcome, Worksheet};
use crate::engine::{EngineEvent, EngineReply, EngineTransport};
use crate::error::{Error, Result};
use crate::queue::EvaluationQueue;
use crate::status::{
    Activity, ActivityResult, Affordances, EngineStatus, QueueIndicator, StatusChange,
    StatusMachine,
};

/// Receives the controller's notifications for the host UI.
pub trait StatusObserver: Send + Sync {
    /// The rendered engine status changed.
    fn on_status_changed(&self, change: &StatusChange);

    /// A plain status bar message should be shown.
    fn on_status_text(&self, _text: &str) {}

    /// The number of queued cells changed.
    fn on_queue_length(&self, _len: usize, _text: &str) {}

    /// A cell was handed to the engine.
    fn on_cell_started(&self, _cell: CellId) {}

    /// A cell left the engine with the given outcome and output.
    fn on_cell_finished(
        &self,
        _cell: CellId,
        _outcome: EvaluationOutcome,
        _output: Option<&str>,
    ) {
    }

    /// The engine asked a question while evaluating `cell`.
    fn on_question(&self, _cell: CellId, _prompt: &str) {}

    /// The queue ran empty and nothing is in flight.
    fn on_drained(&self) {}
}

/// Per-session evaluation state: the queue and the status it drives.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    queue: EvaluationQueue,
    status: StatusMachine,
    indicator: QueueIndicator,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &EvaluationQueue {
        &self.queue
    }

    pub fn status(&self) -> &StatusMachine {
        &self.status
    }
}

/// Drives evaluation of queued cells through an engine transport.
pub struct EvaluationController<T: EngineTransport> {
    context: EvaluationContext,
    transport: T,
    config: ControllerConfig,
    observers: Vec<Arc<dyn StatusObserver>>,
    /// Cell dispatched to the engine and not yet completed.
    in_flight: Option<CellId>,
    /// Question the engine is blocked on.
    pending_question: Option<String>,
    /// Output collected for the cell in flight.
    output: String,
    /// The queue head is the entry that was dispatched.
    head_dispatched: bool,
    /// An interrupted evaluation has not yet been acknowledged by the engine.
    interrupt_pending: bool,
    connected: bool,
}

impl<T: EngineTransport> EvaluationController<T> {
    /// Create a controller with a fresh evaluation context.
    pub fn new(transport: T, config: ControllerConfig) -> Self {
        let connected = transport.is_connected();
        Self {
            context: EvaluationContext::new(),
            transport,
            config,
            observers: Vec::new(),
            in_flight: None,
            pending_question: None,
            output: String::new(),
            head_dispatched: false,
            interrupt_pending: false,
            connected,
        }
    }

    /// Register an observer for status notifications.
    pub fn add_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observers.push(observer);
    }

    /// Render the initial status.
    pub fn start(&mut self) {
        let status = if self.is_connected() {
            EngineStatus::Waiting
        } else {
            EngineStatus::Disconnected
        };
        self.set_status(status);
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn queue(&self) -> &EvaluationQueue {
        &self.context.queue
    }

    pub fn status(&self) -> EngineStatus {
        self.context.status.current()
    }

    pub fn affordances(&self) -> Affordances {
        self.context.status.affordances()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Cell currently outstanding at the engine.
    pub fn in_flight(&self) -> Option<CellId> {
        self.in_flight
    }

    /// Question the engine is waiting on, if any.
    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the controller, returning the engine connection.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn is_connected(&self) -> bool {
        self.connected && self.transport.is_connected()
    }

    /// Queue a cell (and, for a folded heading, its whole hidden subtree).
    ///
    /// Returns the number of cells added. Cells already queued keep their
    /// position.
    pub fn evaluate_cell(&mut self, doc: &mut Worksheet, cell: CellId) -> Result<usize> {
        if !doc.contains(cell) {
            return Err(Error::CellNotFound(cell));
        }
        let queue = &mut self.context.queue;
        let mut added = usize::from(queue.add_to_queue(&*doc, cell));
        added += queue.add_hidden_tree_to_queue(&*doc, cell);

        debug!("Evaluate {}: {} cells queued", cell, added);
        self.after_enqueue(doc);
        Ok(added)
    }

    /// Queue every input cell of the worksheet, hidden ones included.
    pub fn evaluate_all(&mut self, doc: &mut Worksheet) -> usize {
        let order = doc.document_order();
        let added = self.enqueue_all(doc, &order);

        debug!("Evaluate all: {} cells queued", added);
        self.after_enqueue(doc);
        added
    }

    /// Queue every input cell that precedes `anchor` in document order.
    pub fn evaluate_above(&mut self, doc: &mut Worksheet, anchor: CellId) -> Result<usize> {
        if !doc.contains(anchor) {
            return Err(Error::CellNotFound(anchor));
        }
        let order: Vec<CellId> = doc
            .document_order()
            .into_iter()
            .take_while(|&cell| cell != anchor)
            .collect();
        let added = self.enqueue_all(doc, &order);

        debug!("Evaluate above {}: {} cells queued", anchor, added);
        self.after_enqueue(doc);
        Ok(added)
    }

    fn enqueue_all(&mut self, doc: &Worksheet, cells: &[CellId]) -> usize {
        cells
            .iter()
            .filter(|&&cell| self.context.queue.add_to_queue(doc, cell))
            .count()
    }

    fn after_enqueue(&mut self, doc: &mut Worksheet) {
        self.publish_queue_length();
        self.pump(doc);
    }

    /// Dispatch the queue head if the engine is free.
    ///
    /// Does nothing while a cell is in flight, a question is pending, an
    /// interrupt is unacknowledged or the engine is disconnected. Heads that
    /// no longer resolve are dropped.
    pub fn pump(&mut self, doc: &mut Worksheet) {
        if self.in_flight.is_some()
            || self.pending_question.is_some()
            || self.interrupt_pending
            || !self.is_connected()
        {
            return;
        }

        loop {
            let Some(head) = self.context.queue.first() else {
                self.set_status(EngineStatus::Waiting);
                self.publish_queue_length();
                for observer in &self.observers {
                    observer.on_drained();
                }
                return;
            };

            let command = match doc.get_mut(head) {
                Some(cell) if cell.is_input_cell() => {
                    cell.begin_evaluation();
                    cell.input().to_string()
                }
                _ => {
                    debug!("Dropping stale queue entry {}", head);
                    self.context.queue.remove_first();
                    self.publish_queue_length();
                    continue;
                }
            };

            self.in_flight = Some(head);
            self.head_dispatched = true;
            self.output.clear();
            self.set_status(EngineStatus::Calculating);
            for observer in &self.observers {
                observer.on_cell_started(head);
            }

            info!("Dispatching {} to engine", head);
            if let Err(e) = self.transport.send_command(&command) {
                warn!("Failed to send {} to engine: {}", head, e);
                self.drop_connection(doc);
            }
            return;
        }
    }

    /// Apply one event from the engine.
    pub fn handle_event(&mut self, doc: &mut Worksheet, event: EngineEvent) {
        match event {
            EngineEvent::PartialOutput { text } => {
                if self.in_flight.is_none() {
                    debug!("Ignoring engine output with no cell in flight");
                    return;
                }
                self.output.push_str(&text);
                self.set_status(EngineStatus::Transferring);
            }
            EngineEvent::CompleteOutput { reply } => self.complete(doc, reply),
            EngineEvent::Question { prompt } => {
                let Some(cell) = self.in_flight else {
                    warn!("Engine asked a question with no cell in flight: {}", prompt);
                    return;
                };
                self.set_status(EngineStatus::UserInput);
                for observer in &self.observers {
                    observer.on_question(cell, &prompt);
                }
                self.pending_question = Some(prompt);
            }
            EngineEvent::Disconnect => self.drop_connection(doc),
        }
    }

    fn complete(&mut self, doc: &mut Worksheet, reply: EngineReply) {
        let Some(cell) = self.in_flight.take() else {
            if self.interrupt_pending {
                debug!("Discarding reply of interrupted cell");
                self.interrupt_pending = false;
                self.pump(doc);
            } else {
                debug!("Ignoring completion with no cell in flight");
            }
            return;
        };
        self.pending_question = None;
        self.set_status(EngineStatus::Parsing);

        let mut output = std::mem::take(&mut self.output);
        output.push_str(&reply.text);
        let outcome = if reply.failed {
            EvaluationOutcome::Failed
        } else {
            EvaluationOutcome::Succeeded
        };
        self.finish_cell(doc, cell, outcome, Some(output));

        self.pump(doc);
    }

    /// Write the outcome, take the cell off the queue head and notify.
    fn finish_cell(
        &mut self,
        doc: &mut Worksheet,
        cell: CellId,
        outcome: EvaluationOutcome,
        output: Option<String>,
    ) {
        match doc.get_mut(cell) {
            Some(group) => group.finish_evaluation(outcome, output.filter(|o| !o.is_empty())),
            None => debug!("{} was removed while in flight", cell),
        }
        // The queue may have been cleared, and the cell queued again, while
        // it was in flight
        if self.head_dispatched && self.context.queue.first() == Some(cell) {
            self.context.queue.remove_first();
        }
        self.head_dispatched = false;

        info!("{} {}", cell, outcome);
        let written = doc.get(cell).and_then(|group| group.output());
        for observer in &self.observers {
            observer.on_cell_finished(cell, outcome, written);
        }
        self.publish_queue_length();
    }

    /// Answer the engine's pending question and resume the same cell.
    pub fn answer(&mut self, doc: &mut Worksheet, answer: &str) -> Result<()> {
        if self.pending_question.is_none() || self.in_flight.is_none() {
            return Err(Error::InvalidOperation(
                "the engine has not asked a question".to_string(),
            ));
        }
        self.pending_question = None;

        if let Err(e) = self.transport.send_answer(answer) {
            warn!("Failed to send answer to engine: {}", e);
            self.drop_connection(doc);
            return Ok(());
        }
        self.set_status(EngineStatus::Calculating);
        Ok(())
    }

    /// Abort the cell in flight.
    ///
    /// Takes precedence over a pending question. Returns `true` if a cell was
    /// being evaluated.
    pub fn interrupt(&mut self, doc: &mut Worksheet) -> bool {
        let Some(cell) = self.in_flight.take() else {
            debug!("Interrupt requested with nothing in flight");
            return false;
        };
        self.pending_question = None;
        self.output.clear();

        let sent = self.transport.interrupt();
        self.finish_cell(doc, cell, EvaluationOutcome::Interrupted, None);

        if self.config.on_interrupt == QueuePolicy::Clear {
            self.context.queue.clear();
            self.publish_queue_length();
        }

        match sent {
            Ok(()) if self.is_connected() => {
                // The engine still answers the interrupted command
                self.interrupt_pending = true;
                self.set_status(EngineStatus::Waiting);
            }
            Ok(()) => self.drop_connection(doc),
            Err(e) => {
                warn!("Failed to interrupt engine: {}", e);
                self.drop_connection(doc);
            }
        }
        true
    }

    /// Continue with cells left in the queue after an interrupt.
    pub fn resume(&mut self, doc: &mut Worksheet) {
        self.pump(doc);
    }

    /// Drop every pending cell. The cell in flight, if any, still completes.
    pub fn clear_queue(&mut self) {
        self.context.queue.clear();
        self.head_dispatched = false;
        self.publish_queue_length();
    }

    /// Install a new engine connection.
    ///
    /// Returns the previous transport. A cell still in flight on the old
    /// connection is finished as interrupted. The status is re-rendered;
    /// dispatch resumes if cells were kept across the disconnect.
    pub fn reconnect(&mut self, doc: &mut Worksheet, transport: T) -> T {
        if let Some(cell) = self.in_flight.take() {
            let partial = std::mem::take(&mut self.output);
            self.finish_cell(doc, cell, EvaluationOutcome::Interrupted, Some(partial));
        }
        let old = std::mem::replace(&mut self.transport, transport);
        self.connected = true;
        self.pending_question = None;
        self.interrupt_pending = false;
        self.context.status.force_refresh();

        info!(
            "Reconnected to engine ({} cells pending)",
            self.context.queue.len()
        );
        if self.context.queue.is_empty() {
            self.set_status(EngineStatus::Waiting);
        } else {
            self.pump(doc);
        }
        old
    }

    /// Tear the session down: drop pending cells and disconnect.
    pub fn shutdown(&mut self, doc: &mut Worksheet) {
        self.context.queue.clear();
        self.drop_connection(doc);
    }

    fn drop_connection(&mut self, doc: &mut Worksheet) {
        warn!("Engine connection lost");
        self.connected = false;
        self.pending_question = None;
        self.interrupt_pending = false;

        if let Some(cell) = self.in_flight.take() {
            let partial = std::mem::take(&mut self.output);
            self.finish_cell(doc, cell, EvaluationOutcome::Interrupted, Some(partial));
        }
        if self.config.on_disconnect == QueuePolicy::Clear {
            self.context.queue.clear();
            self.head_dispatched = false;
        }
        self.publish_queue_length();
        self.set_status(EngineStatus::Disconnected);
    }

    /// Tell the controller whether the view left the evaluating cell.
    pub fn set_scrolled_away(&mut self, scrolled_away: bool) {
        self.context.status.set_scrolled_away(scrolled_away);
        if self.status().is_busy() {
            self.context.status.force_refresh();
            self.set_status(self.status());
        }
    }

    /// A save or export started; status updates are held back meanwhile.
    pub fn begin_activity(&mut self, activity: Activity) {
        let text = self.context.status.begin_activity(activity);
        for observer in &self.observers {
            observer.on_status_text(text);
        }
    }

    /// The save or export finished.
    pub fn finish_activity(&mut self, success: bool) {
        match self.context.status.finish_activity(success) {
            ActivityResult::Status(change) => {
                for observer in &self.observers {
                    observer.on_status_changed(&change);
                }
            }
            ActivityResult::Message(text) => {
                for observer in &self.observers {
                    observer.on_status_text(text);
                }
            }
        }
    }

    fn set_status(&mut self, status: EngineStatus) {
        if let Some(change) = self.context.status.set(status) {
            debug!("Engine status: {:?} -> {:?}", change.old, change.new);
            for observer in &self.observers {
                observer.on_status_changed(&change);
            }
        }
    }

    fn publish_queue_length(&mut self) {
        let len = self.context.queue.len();
        if let Some(text) = self.context.indicator.update(len) {
            for observer in &self.observers {
                observer.on_queue_length(len, &text);
            }
        }
    }
}
