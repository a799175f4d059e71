//! Task coordination for the apron baggage-handling fleet.
//!
//! This crate provides the dispatcher that assigns delivery and charge
//! tasks to AGVs under contention. Every task runs as its own future over
//! the shared fleet state; scarce resources (the AGV pool, exclusive
//! charging stations, capacity-limited storage) are claimed atomically at
//! submission and rejections come back as named errors instead of queues.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     apronsim (CLI)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DispatcherService                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │  Delivery   │ │   Charge    │ │    Slot Phase       │   │
//! │  │   Runners   │ │  Runners    │ │    Machine          │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Fleet   │   │ Permits  │   │ Shutdown │
//!        │  State   │   │ (pool)   │   │ (watch)  │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use apron_dispatch::{Dispatcher, DispatcherService};
//! use apron_fleet::{FleetConfig, FleetState, MemorySink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Build the fleet and the coordinator over it
//! let sink = Arc::new(MemorySink::new());
//! let state = Arc::new(FleetState::new(&FleetConfig::default(), sink.clone()));
//! let dispatcher = DispatcherService::with_defaults(state.clone(), sink);
//!
//! // Register an item and send an AGV after it
//! let item = state.register_baggage("Gate B");
//! let agv_id = state.agv_ids()[0];
//! let handle = dispatcher.submit_delivery(&agv_id, &item.baggage_id).await?;
//!
//! if let Some(outcome) = handle.outcome().await {
//!     println!("{}: {}", outcome.task_id, outcome.disposition);
//! }
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Slot States
//!
//! AGVs follow a strict phase machine with valid transitions:
//!
//! - `Idle` or `Depleted` → `Reserved` (task submission)
//! - `Reserved` → `Loading` → `Transit` → `Unloading` → `Idle` (delivery)
//! - `Reserved` → `ChargingWait` → `Charging` → `Idle` (charge)
//! - `Loading`, `Transit`, `Unloading` → `Reserved` (mid-task cancel)
//! - `Loading`, `Transit` → `Depleted` (battery ran out)
//!
//! See the [`phase`] module for transition validation helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod phase;
pub mod service;
mod task;
pub mod types;

pub use error::{DispatchError, Result, TaskError};
pub use service::{Dispatcher, DispatcherService};
pub use types::{DispatchConfig, Disposition, TaskHandle, TaskKind, TaskOutcome};

// Re-export commonly used types from dependencies for convenience
pub use apron_core::{AgvId, BaggageId, StationId, StorageId, TaskId};
pub use apron_fleet::{FleetConfig, FleetError, FleetSnapshot, FleetState, SlotState};
