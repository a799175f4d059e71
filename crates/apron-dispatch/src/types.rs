//! Task handles, outcomes, and coordinator configuration.

use std::time::Duration;

use apron_core::{AgvId, TaskId};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::TaskError;

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Deliver one baggage item to the primary storage area.
    Delivery,
    /// Charge an AGV to full at a reserved station.
    Charge,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery => write!(f, "delivery"),
            Self::Charge => write!(f, "charge"),
        }
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The task ran all phases to completion.
    Completed,
    /// A fleet rule stopped the task mid-flight.
    Failed(TaskError),
    /// The task stopped before reaching an end state: shutdown, or an
    /// internal abort.
    Cancelled,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(err) => write!(f, "failed: {err}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final report of one task, delivered through its [`TaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// The task this outcome belongs to.
    pub task_id: TaskId,
    /// What the task was doing.
    pub kind: TaskKind,
    /// The AGV the task drove.
    pub agv_id: AgvId,
    /// How the task ended.
    pub disposition: Disposition,
    /// Wall-clock task duration in milliseconds.
    pub duration_ms: u64,
}

/// Handle returned by a successful submission.
///
/// The task runs on its own; await [`TaskHandle::outcome`] for the final
/// report, or drop the handle to ignore it (the task keeps running).
#[derive(Debug)]
pub struct TaskHandle {
    /// The submitted task's id.
    pub task_id: TaskId,
    /// What the task does.
    pub kind: TaskKind,
    /// The AGV the task drives.
    pub agv_id: AgvId,
    outcome_rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub(crate) fn new(
        task_id: TaskId,
        kind: TaskKind,
        agv_id: AgvId,
    ) -> (Self, oneshot::Sender<TaskOutcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (
            Self {
                task_id,
                kind,
                agv_id,
                outcome_rx,
            },
            outcome_tx,
        )
    }

    /// Await the task's final outcome.
    ///
    /// Returns `None` only if the coordinator was torn down without the task
    /// reporting, which does not happen through [`shutdown`].
    ///
    /// [`shutdown`]: crate::service::Dispatcher::shutdown
    pub async fn outcome(self) -> Option<TaskOutcome> {
        self.outcome_rx.await.ok()
    }
}

/// Timing and cost parameters for task execution.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Wall-clock length of one simulated tick.
    pub tick: Duration,
    /// Ticks spent in the loading phase, one battery unit each.
    pub load_ticks: u32,
    /// Ticks spent settling after the trip, one battery unit each.
    pub transit_ticks: u32,
    /// Battery units drained per tick.
    pub drain_per_tick: f64,
    /// Battery units drained by the trip itself.
    pub trip_cost: f64,
    /// Battery units restored per charge tick.
    pub charge_per_tick: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(300),
            load_ticks: 5,
            transit_ticks: 5,
            drain_per_tick: 1.0,
            trip_cost: 20.0,
            charge_per_tick: 1.0,
        }
    }
}

impl DispatchConfig {
    /// Configuration with a 1 ms tick, for tests and fast simulations.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            tick: Duration::from_millis(1),
            ..Self::default()
        }
    }
}
