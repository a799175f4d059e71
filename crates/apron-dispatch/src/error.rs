//! Error types for the task coordinator.
//!
//! Submission errors come back synchronously as [`DispatchError`]; failures
//! of an already-running task are reported asynchronously as a [`TaskError`]
//! inside the task's outcome.

use apron_core::{AgvId, StorageId};
use apron_fleet::{FleetError, SlotState};
use thiserror::Error;

/// A result type using `DispatchError`.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Failure of a running task, reported through its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The AGV's battery hit zero before the delivery finished. The AGV is
    /// parked in the `Depleted` slot with its cargo still aboard.
    #[error("battery depleted mid-task")]
    BatteryDepleted,

    /// The storage area was full at hand-over. The item stays aboard.
    #[error("storage area full: {0}")]
    StorageFull(StorageId),
}

/// Errors that can occur when submitting work to the coordinator.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The fleet state rejected the operation.
    #[error("fleet error: {0}")]
    Fleet(#[from] FleetError),

    /// The coordinator is shutting down and accepts no new tasks.
    #[error("dispatcher is shutting down")]
    ShuttingDown,

    /// No storage area is configured, so deliveries have no target.
    #[error("no storage area configured")]
    NoStorageConfigured,

    /// A slot transition violated the phase machine. Coordinator bug guard.
    #[error("invalid phase transition for agv {agv_id}: cannot move from {from:?} to {to:?}")]
    InvalidPhase {
        /// The AGV being transitioned.
        agv_id: AgvId,
        /// The current slot.
        from: SlotState,
        /// The requested target slot.
        to: SlotState,
    },
}
