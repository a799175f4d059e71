//! AGV slot-state machine.
//!
//! This module defines the valid slot transitions an AGV moves through while
//! the coordinator drives it, and provides validation logic so state machine
//! invariants are maintained.
//!
//! # State Machine
//!
//! ```text
//!                  ┌───────────┐
//!        ┌────────▶│   Idle    │◀───────────────────────┐
//!        │         └─────┬─────┘                        │
//!        │               │ (reserve)                    │
//!        │               ▼                              │
//!        │         ┌───────────┐   (recover)   ┌────────┴───┐
//!   (delivered,    │ Reserved  │◀──────────────│  Depleted  │
//!    charged,      └─────┬─────┘               └────────────┘
//!    rolled back)        │                            ▲
//!        │      ┌────────┴──────────┐                 │
//!        │      ▼                   ▼                 │ (battery
//!        │ ┌─────────┐       ┌──────────────┐         │  hit zero)
//!        │ │ Loading │       │ ChargingWait │         │
//!        │ └────┬────┘       └──────┬───────┘         │
//!        │      ▼                   ▼                 │
//!        │ ┌─────────┐       ┌──────────────┐         │
//!        │ │ Transit │       │   Charging   │─────────┤
//!        │ └────┬────┘       └──────┬───────┘         │
//!        │      ▼                   │                 │
//!        │ ┌───────────┐            │                 │
//!        │ │ Unloading │────────────┼─────────────────┘
//!        │ └─────┬─────┘            │
//!        └───────┴──────────────────┘
//! ```
//!
//! Failure and cancel edges: a delivery phase drops to `Depleted` when the
//! battery hits zero and back to `Reserved` on cancellation or a full
//! storage area; a charge phase drops back to `Idle` (or `Depleted` at zero
//! battery) on cancellation.

use apron_core::AgvId;
use apron_fleet::SlotState;

use crate::error::{DispatchError, Result};

/// Validates a slot transition and returns the target slot if valid.
///
/// # Errors
///
/// Returns `DispatchError::InvalidPhase` if the transition is not allowed.
pub fn validate_transition(agv_id: &AgvId, from: SlotState, to: SlotState) -> Result<SlotState> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(DispatchError::InvalidPhase {
            agv_id: *agv_id,
            from,
            to,
        })
    }
}

/// Check if a slot transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: SlotState, to: SlotState) -> bool {
    use SlotState::{
        Charging, ChargingWait, Depleted, Idle, Loading, Reserved, Transit, Unloading,
    };

    matches!(
        (from, to),
        // Reservation takes an unreserved AGV; Depleted recovers via charge
        (Idle | Depleted, Reserved)
            // Reserved starts a delivery or a charge, or rolls back
            | (Reserved, Loading | ChargingWait | Idle | Depleted)
            // Delivery phases advance in order; Unloading finishes to Idle
            | (Loading, Transit)
            | (Transit, Unloading)
            | (Unloading, Idle)
            // A delivery phase drops to Depleted at zero battery, or back to
            // Reserved on cancellation / full storage
            | (Loading | Transit | Unloading, Reserved)
            | (Loading | Transit, Depleted)
            // Charge phases advance; completion or cancel frees the AGV
            | (ChargingWait, Charging)
            | (ChargingWait | Charging, Idle | Depleted)
    )
}

/// Returns the list of valid target slots from the given slot.
#[must_use]
pub fn valid_transitions_from(slot: SlotState) -> Vec<SlotState> {
    use SlotState::{
        Charging, ChargingWait, Depleted, Idle, Loading, Reserved, Transit, Unloading,
    };

    match slot {
        Idle | Depleted => vec![Reserved],
        Reserved => vec![Loading, ChargingWait, Idle, Depleted],
        Loading => vec![Transit, Reserved, Depleted],
        Transit => vec![Unloading, Reserved, Depleted],
        Unloading => vec![Idle, Reserved],
        ChargingWait => vec![Charging, Idle, Depleted],
        Charging => vec![Idle, Depleted],
    }
}

/// Returns true if the slot allows a charge reservation.
#[must_use]
pub const fn can_reserve_for_charge(slot: SlotState) -> bool {
    matches!(slot, SlotState::Idle | SlotState::Depleted)
}

/// Returns true if a task currently owns the AGV.
#[must_use]
pub const fn is_mid_task(slot: SlotState) -> bool {
    matches!(
        slot,
        SlotState::Reserved
            | SlotState::Loading
            | SlotState::Transit
            | SlotState::Unloading
            | SlotState::ChargingWait
            | SlotState::Charging
    )
}

/// Returns true if the AGV is stranded and needs an explicit charge task.
#[must_use]
pub const fn is_stranded(slot: SlotState) -> bool {
    matches!(slot, SlotState::Depleted)
}
