//! Fleet event stream.
//!
//! Every significant fleet action (a move, a load, a depletion, a task
//! outcome) is recorded as an [`Event`] through an [`EventSink`]. Sinks are
//! collaborators: the dashboard, a log writer, a test probe. The contract is
//! deliberately narrow: `record` is infallible and must not block, so the
//! coordinator never stalls on a slow consumer.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Category of a fleet event. Doubles as the log folder name for
/// file-backed sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// AGV movement, loading, unloading, battery.
    Agv,
    /// Charging station reservation and charge progress.
    Charging,
    /// Storage area accept/reject.
    Storage,
    /// Task submission and outcome.
    Task,
    /// Fleet lifecycle: startup, shutdown.
    System,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agv => write!(f, "agv"),
            Self::Charging => write!(f, "charging"),
            Self::Storage => write!(f, "storage"),
            Self::Task => write!(f, "task"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A single recorded fleet event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// What part of the fleet the event concerns.
    pub category: EventCategory,
    /// The entity the event is about, e.g. `AGV-1` or `Station-2`.
    pub subject: String,
    /// Human-readable description.
    pub message: String,
    /// When the event occurred.
    pub at: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(
        category: EventCategory,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            subject: subject.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Consumer of fleet events.
///
/// Implementations must return quickly: `record` is called while the fleet
/// state lock is held.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: Event);
}

/// A sink that keeps all events in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    /// Create a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events in the given category, in order.
    #[must_use]
    pub fn by_category(&self, category: EventCategory) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}
