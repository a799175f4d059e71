//! Fleet domain types.
//!
//! These types represent the AGVs, baggage items, charging stations, and
//! storage areas managed by the coordinator. They are plain data: all
//! mutation goes through the [`FleetState`](crate::state::FleetState)
//! container so invariants hold under concurrent access.

use apron_core::{AgvId, BaggageId, StationId, StorageId};
use serde::{Deserialize, Serialize};

use crate::battery::Battery;

/// Coordinator slot for an AGV.
///
/// Exactly one task may hold an AGV's reservation at a time; the slot tracks
/// which phase that task is in. `Depleted` marks an AGV whose battery hit
/// zero mid-task: it keeps any carried item and can only be recovered by an
/// explicit charge task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Unreserved and eligible for new tasks (if battery and cargo allow).
    Idle,
    /// Reserved by a task that has not started its first phase.
    Reserved,
    /// Delivery: picking up the baggage item.
    Loading,
    /// Delivery: driving to the storage area.
    Transit,
    /// Delivery: handing the item over to storage.
    Unloading,
    /// Charge: holding a station, waiting to draw power.
    ChargingWait,
    /// Charge: drawing power at a station.
    Charging,
    /// Battery hit zero mid-task; stuck until recharged.
    Depleted,
}

/// Dashboard status of an AGV, derived from battery and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgvStatus {
    /// Available for a new task.
    Free,
    /// Reserved, carrying, or mid-phase.
    Busy,
    /// Battery at zero.
    NeedsCharging,
}

impl std::fmt::Display for AgvStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Busy => write!(f, "Busy"),
            Self::NeedsCharging => write!(f, "Needs Charging"),
        }
    }
}

/// A baggage item. The value lives in exactly one place at a time: the
/// registry, one AGV's cargo slot, or one storage area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baggage {
    /// Unique identifier for the item.
    pub baggage_id: BaggageId,
    /// Destination label, e.g. `Gate B`.
    pub destination: String,
}

/// An autonomous ground vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agv {
    /// Unique identifier for the AGV.
    pub agv_id: AgvId,
    /// Human-readable name, e.g. `AGV-1`.
    pub name: String,
    /// Battery charge level.
    pub battery: Battery,
    /// The item currently aboard, if any.
    pub carrying: Option<Baggage>,
    /// Coordinator slot.
    pub slot: SlotState,
}

impl Agv {
    /// Create a new idle AGV at full charge.
    #[must_use]
    pub fn new(agv_id: AgvId, name: impl Into<String>) -> Self {
        Self {
            agv_id,
            name: name.into(),
            battery: Battery::full(),
            carrying: None,
            slot: SlotState::Idle,
        }
    }

    /// True if the AGV can take a new delivery: unreserved, charged, and
    /// not carrying anything.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.slot == SlotState::Idle && !self.battery.is_depleted() && self.carrying.is_none()
    }

    /// Dashboard status: `NeedsCharging` beats `Busy` beats `Free`.
    #[must_use]
    pub fn status(&self) -> AgvStatus {
        if self.battery.is_depleted() {
            AgvStatus::NeedsCharging
        } else if self.is_available() {
            AgvStatus::Free
        } else {
            AgvStatus::Busy
        }
    }
}

/// A charging station with room for one AGV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargingStation {
    /// Unique identifier for the station.
    pub station_id: StationId,
    /// Human-readable name, e.g. `Station-1`.
    pub name: String,
    /// The AGV currently holding the station, if any.
    pub occupant: Option<AgvId>,
}

impl ChargingStation {
    /// Create a new free station.
    #[must_use]
    pub fn new(station_id: StationId, name: impl Into<String>) -> Self {
        Self {
            station_id,
            name: name.into(),
            occupant: None,
        }
    }

    /// True if no AGV holds the station.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// A storage area with fixed capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageArea {
    /// Unique identifier for the area.
    pub storage_id: StorageId,
    /// Human-readable name, e.g. `Main Storage`.
    pub name: String,
    /// Maximum number of items the area can hold.
    pub capacity: usize,
    /// Items currently stored, in arrival order.
    pub stored: Vec<Baggage>,
}

impl StorageArea {
    /// Create a new empty storage area.
    #[must_use]
    pub fn new(storage_id: StorageId, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            storage_id,
            name: name.into(),
            capacity,
            stored: Vec::new(),
        }
    }

    /// True if another item fits.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.stored.len() < self.capacity
    }
}

// =============================================================================
// Fleet configuration
// =============================================================================

/// Specification for one storage area at fleet initialisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Human-readable name.
    pub name: String,
    /// Maximum number of items.
    pub capacity: usize,
}

/// Configuration for seeding a fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Number of AGVs, named `AGV-1`..
    pub agvs: u32,
    /// Number of charging stations, named `Station-1`..
    pub stations: u32,
    /// Storage areas; the first is the primary delivery target.
    pub storages: Vec<StorageSpec>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            agvs: 5,
            stations: 5,
            storages: vec![StorageSpec {
                name: "Main Storage".to_string(),
                capacity: 50,
            }],
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Point-in-time view of one AGV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgvSnapshot {
    /// AGV identifier.
    pub agv_id: AgvId,
    /// Human-readable name.
    pub name: String,
    /// Battery percentage.
    pub battery_pct: f64,
    /// Dashboard status.
    pub status: AgvStatus,
    /// Item aboard, if any.
    pub carrying: Option<BaggageId>,
}

/// Point-in-time view of one charging station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSnapshot {
    /// Station identifier.
    pub station_id: StationId,
    /// Human-readable name.
    pub name: String,
    /// True if no AGV holds the station.
    pub free: bool,
}

/// Point-in-time view of one storage area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSnapshot {
    /// Storage identifier.
    pub storage_id: StorageId,
    /// Human-readable name.
    pub name: String,
    /// Maximum number of items.
    pub capacity: usize,
    /// Identifiers of stored items, in arrival order.
    pub stored: Vec<BaggageId>,
}

/// Consistent point-in-time view of the whole fleet, taken under a single
/// read lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    /// When the snapshot was taken.
    pub taken_at: chrono::DateTime<chrono::Utc>,
    /// All AGVs.
    pub agvs: Vec<AgvSnapshot>,
    /// Items still waiting in the registry.
    pub pending_baggage: Vec<Baggage>,
    /// All charging stations.
    pub stations: Vec<StationSnapshot>,
    /// All storage areas.
    pub storages: Vec<StorageSnapshot>,
}
