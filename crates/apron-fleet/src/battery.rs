//! Battery charge model for AGVs.
//!
//! A battery is a clamped level in `[0, 100]`. Mutations report the edge
//! they crossed (depleted, fully charged) so the owning layer can update
//! derived availability and emit exactly one event per crossing. This module
//! is pure state transition: no I/O, no locking, no async.

use serde::{Deserialize, Serialize};

/// The level of a full battery.
pub const FULL_LEVEL: f64 = 100.0;

/// The level of an empty battery.
pub const EMPTY_LEVEL: f64 = 0.0;

/// An edge crossed by a battery mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryEdge {
    /// The level crossed down to zero. The AGV can no longer move.
    Depleted,
    /// The level reached exactly 100 from below.
    FullyCharged,
}

/// A battery charge level, clamped to `[0, 100]` on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    level: f64,
}

impl Battery {
    /// A battery at full charge.
    #[must_use]
    pub fn full() -> Self {
        Self { level: FULL_LEVEL }
    }

    /// A battery at the given level, clamped to `[0, 100]`.
    #[must_use]
    pub fn at(level: f64) -> Self {
        Self {
            level: level.clamp(EMPTY_LEVEL, FULL_LEVEL),
        }
    }

    /// The current charge level.
    #[must_use]
    pub fn level(&self) -> f64 {
        self.level
    }

    /// True if the battery is at zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.level <= EMPTY_LEVEL
    }

    /// True if the battery is at full charge.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.level >= FULL_LEVEL
    }

    /// Drain the battery by `amount` units, clamping at zero.
    ///
    /// Returns `Some(BatteryEdge::Depleted)` if this drain crossed to zero.
    /// `amount` must be non-negative; draining never charges.
    pub fn drain(&mut self, amount: f64) -> Option<BatteryEdge> {
        debug_assert!(amount >= 0.0, "drain amount must be non-negative");
        self.set(self.level - amount)
    }

    /// Charge the battery by `amount` units, clamping at full.
    ///
    /// Returns `Some(BatteryEdge::FullyCharged)` if this charge reached 100.
    /// `amount` must be non-negative.
    pub fn charge(&mut self, amount: f64) -> Option<BatteryEdge> {
        debug_assert!(amount >= 0.0, "charge amount must be non-negative");
        self.set(self.level + amount)
    }

    /// Set the level directly, clamped to `[0, 100]`.
    ///
    /// Returns the edge crossed, if any: `Depleted` when the level hits zero
    /// from above, `FullyCharged` when it reaches 100 from below.
    pub fn set(&mut self, level: f64) -> Option<BatteryEdge> {
        let before = self.level;
        self.level = level.clamp(EMPTY_LEVEL, FULL_LEVEL);

        if before > EMPTY_LEVEL && self.level <= EMPTY_LEVEL {
            Some(BatteryEdge::Depleted)
        } else if before < FULL_LEVEL && self.level >= FULL_LEVEL {
            Some(BatteryEdge::FullyCharged)
        } else {
            None
        }
    }
}

impl Default for Battery {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full() {
        let battery = Battery::full();
        assert_eq!(battery.level(), 100.0);
        assert!(battery.is_full());
        assert!(!battery.is_depleted());
    }

    #[test]
    fn drain_subtracts() {
        let mut battery = Battery::full();
        assert_eq!(battery.drain(20.0), None);
        assert_eq!(battery.level(), 80.0);
    }

    #[test]
    fn five_trips_deplete_exactly() {
        let mut battery = Battery::full();
        for _ in 0..4 {
            assert_eq!(battery.drain(20.0), None);
        }
        assert_eq!(battery.drain(20.0), Some(BatteryEdge::Depleted));
        assert_eq!(battery.level(), 0.0);
        assert!(battery.is_depleted());
    }

    #[test]
    fn drain_clamps_at_zero() {
        let mut battery = Battery::at(5.0);
        assert_eq!(battery.drain(20.0), Some(BatteryEdge::Depleted));
        assert_eq!(battery.level(), 0.0);
    }

    #[test]
    fn drain_on_empty_reports_no_edge() {
        let mut battery = Battery::at(0.0);
        assert_eq!(battery.drain(20.0), None);
        assert_eq!(battery.level(), 0.0);
    }

    #[test]
    fn charge_reaches_full_once() {
        let mut battery = Battery::at(99.0);
        assert_eq!(battery.charge(1.0), Some(BatteryEdge::FullyCharged));
        assert!(battery.is_full());
        assert_eq!(battery.charge(1.0), None);
        assert_eq!(battery.level(), 100.0);
    }

    #[test]
    fn set_clamps_both_ends() {
        let mut battery = Battery::at(50.0);
        battery.set(250.0);
        assert_eq!(battery.level(), 100.0);
        battery.set(-10.0);
        assert_eq!(battery.level(), 0.0);
    }

    #[test]
    fn set_reports_crossings() {
        let mut battery = Battery::full();
        assert_eq!(battery.set(0.0), Some(BatteryEdge::Depleted));
        assert_eq!(battery.set(100.0), Some(BatteryEdge::FullyCharged));
        assert_eq!(battery.set(50.0), None);
    }

    #[test]
    fn constructor_clamps() {
        assert_eq!(Battery::at(150.0).level(), 100.0);
        assert_eq!(Battery::at(-5.0).level(), 0.0);
    }
}
