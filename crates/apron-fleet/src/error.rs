//! Error types for fleet state operations.

use apron_core::{AgvId, BaggageId, StationId, StorageId};
use thiserror::Error;

/// A result type using `FleetError`.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors that can occur when mutating or querying the fleet state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    /// The AGV exists but cannot take a task right now (reserved, carrying,
    /// or out of battery).
    #[error("agv unavailable: {0}")]
    AgvUnavailable(AgvId),

    /// The baggage item is not in the registry (already taken, delivered,
    /// or never registered).
    #[error("baggage item not found: {0}")]
    ItemNotFound(BaggageId),

    /// The charging station is occupied by another AGV.
    #[error("charging station busy: {0}")]
    StationBusy(StationId),

    /// The storage area is at capacity.
    #[error("storage area full: {0}")]
    StorageFull(StorageId),

    /// No AGV with this id was ever part of the fleet.
    #[error("unknown agv: {0}")]
    UnknownAgv(AgvId),

    /// No charging station with this id was ever part of the fleet.
    #[error("unknown charging station: {0}")]
    UnknownStation(StationId),

    /// No storage area with this id was ever part of the fleet.
    #[error("unknown storage area: {0}")]
    UnknownStorage(StorageId),
}

impl FleetError {
    /// Returns true if this error reflects transient contention that can
    /// succeed on a later attempt once the fleet frees up.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::AgvUnavailable(_) | Self::StationBusy(_) | Self::StorageFull(_)
        )
    }
}
