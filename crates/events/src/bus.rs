//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`RunEvent`]s. The
//! orchestrator publishes run and stage lifecycle events as they
//! happen; observers (progress UIs, log tailers) subscribe without
//! polling the audit file. Designed to be shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use reelforge_core::{RunId, Stage};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Well-known event type names published by the orchestrator.
pub mod event_types {
    pub const RUN_CREATED: &str = "run.created";
    pub const STAGE_STARTED: &str = "stage.started";
    pub const STAGE_COMPLETED: &str = "stage.completed";
    pub const STAGE_FAILED: &str = "stage.failed";
    pub const RUN_AWAITING_APPROVAL: &str = "run.awaiting_approval";
    pub const RUN_FINALIZED: &str = "run.finalized";
}

// ---------------------------------------------------------------------------
// RunEvent
// ---------------------------------------------------------------------------

/// A lifecycle event for one run.
///
/// Constructed via [`RunEvent::new`] and enriched with
/// [`with_stage`](RunEvent::with_stage) and
/// [`with_payload`](RunEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Dot-separated event name, e.g. `"stage.completed"`.
    pub event_type: String,

    /// The run this event belongs to.
    pub run_id: RunId,

    /// The stage involved, for stage-scoped events.
    pub stage: Option<Stage>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    /// Create a new event with only the required fields.
    pub fn new(event_type: impl Into<String>, run_id: RunId) -> Self {
        Self {
            event_type: event_type.into(),
            run_id,
            stage: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the stage involved in the event.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published [`RunEvent`].
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero active subscribers the event is silently dropped; the
    /// audit log is the durable record, the bus is best-effort fan-out.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
