//! Fleet domain model and shared state container for apron.
//!
//! This crate owns the entities of the baggage-handling fleet: AGVs with
//! clamped batteries, the baggage registry, exclusive charging stations, and
//! capacity-limited storage areas. All of them live behind the single
//! [`FleetState`] container so that every mutation is one critical section
//! and every snapshot is consistent at a point in time.
//!
//! Task sequencing (which phase an AGV runs next, timing, cancellation)
//! lives in `apron-dispatch`; collaborators consume the [`EventSink`]
//! stream and the snapshot queries.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use apron_fleet::{FleetConfig, FleetState, NullSink};
//!
//! let state = FleetState::new(&FleetConfig::default(), Arc::new(NullSink));
//! let item = state.register_baggage("Gate B");
//!
//! let agv_id = state.agv_ids()[0];
//! state.reserve_for_delivery(&agv_id, &item.baggage_id).unwrap();
//!
//! let snapshot = state.snapshot();
//! assert!(snapshot.pending_baggage.is_empty());
//! assert_eq!(snapshot.agvs[0].carrying, Some(item.baggage_id));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod battery;
pub mod error;
pub mod events;
pub mod state;
pub mod types;

pub use battery::{Battery, BatteryEdge, EMPTY_LEVEL, FULL_LEVEL};
pub use error::{FleetError, Result};
pub use events::{Event, EventCategory, EventSink, MemorySink, NullSink};
pub use state::FleetState;
pub use types::{
    Agv, AgvSnapshot, AgvStatus, Baggage, ChargingStation, FleetConfig, FleetSnapshot, SlotState,
    StationSnapshot, StorageArea, StorageSnapshot, StorageSpec,
};
