//! Core types for the apron baggage-handling simulator.
//!
//! This crate provides the strongly-typed identifiers used throughout the
//! apron workspace:
//!
//! - **Fleet resource ids**: numbered identifiers for AGVs, baggage items,
//!   charging stations, and storage areas
//! - **Task ids**: random UUIDs minted per accepted coordinator task
//!
//! # Example
//!
//! ```
//! use apron_core::{AgvId, BaggageId, TaskId};
//!
//! // Resource ids parse from their display form
//! let agv: AgvId = "agv-3".parse().unwrap();
//! assert_eq!(agv, AgvId::new(3));
//!
//! // Bare numbers are accepted too (CLI convenience)
//! let bag: BaggageId = "14".parse().unwrap();
//! assert_eq!(bag.to_string(), "bag-14");
//!
//! // Task ids are random
//! let task_id = TaskId::generate();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{AgvId, BaggageId, IdError, StationId, StorageId, TaskId};
