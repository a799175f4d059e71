//! The coordinator-owned fleet state container.
//!
//! All fleet mutation happens inside this container's single write lock:
//! taking a baggage item and reserving an AGV is one critical section, as is
//! handing an item over to storage. No reader ever observes a half-applied
//! step, and a baggage item is always in exactly one place: the registry,
//! one AGV's cargo slot, or one storage area.
//!
//! The container does not validate slot transitions; the coordinator does
//! that before calling [`FleetState::set_slot`]. Exactly one task drives a
//! reserved AGV at a time, so slot writes never race.

use std::collections::BTreeMap;
use std::sync::Arc;

use apron_core::{AgvId, BaggageId, StationId, StorageId};
use chrono::Utc;
use parking_lot::RwLock;

use crate::battery::BatteryEdge;
use crate::error::{FleetError, Result};
use crate::events::{Event, EventCategory, EventSink};
use crate::types::{
    Agv, AgvSnapshot, Baggage, ChargingStation, FleetConfig, FleetSnapshot, SlotState,
    StationSnapshot, StorageArea, StorageSnapshot,
};

struct Inner {
    agvs: BTreeMap<AgvId, Agv>,
    registry: BTreeMap<BaggageId, Baggage>,
    stations: BTreeMap<StationId, ChargingStation>,
    storages: BTreeMap<StorageId, StorageArea>,
    next_baggage: u32,
}

/// Shared fleet state: AGVs, the baggage registry, charging stations, and
/// storage areas, behind one lock.
pub struct FleetState {
    inner: RwLock<Inner>,
    sink: Arc<dyn EventSink>,
}

impl FleetState {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Seed a fleet from the given configuration.
    ///
    /// AGVs are named `AGV-1`.. and start idle at full charge; stations are
    /// named `Station-1`..; storage areas keep their configured names, in
    /// order, with the first acting as the primary delivery target.
    #[must_use]
    pub fn new(config: &FleetConfig, sink: Arc<dyn EventSink>) -> Self {
        let mut agvs = BTreeMap::new();
        for n in 1..=config.agvs {
            let id = AgvId::new(n);
            agvs.insert(id, Agv::new(id, format!("AGV-{n}")));
        }

        let mut stations = BTreeMap::new();
        for n in 1..=config.stations {
            let id = StationId::new(n);
            stations.insert(id, ChargingStation::new(id, format!("Station-{n}")));
        }

        let mut storages = BTreeMap::new();
        let mut next_storage = 1u32;
        for spec in &config.storages {
            let id = StorageId::new(next_storage);
            next_storage += 1;
            storages.insert(id, StorageArea::new(id, spec.name.clone(), spec.capacity));
        }

        sink.record(Event::new(
            EventCategory::System,
            "fleet",
            format!(
                "Fleet initialised: {} AGVs, {} charging stations, {} storage areas",
                agvs.len(),
                stations.len(),
                storages.len()
            ),
        ));

        Self {
            inner: RwLock::new(Inner {
                agvs,
                registry: BTreeMap::new(),
                stations,
                storages,
                next_baggage: 1,
            }),
            sink,
        }
    }

    /// Register a new baggage item bound for `destination`.
    ///
    /// Ids are assigned sequentially starting at `bag-1`.
    pub fn register_baggage(&self, destination: impl Into<String>) -> Baggage {
        let mut inner = self.inner.write();
        let baggage_id = BaggageId::new(inner.next_baggage);
        inner.next_baggage += 1;

        let item = Baggage {
            baggage_id,
            destination: destination.into(),
        };
        inner.registry.insert(baggage_id, item.clone());
        item
    }

    // =========================================================================
    // Reservation
    // =========================================================================

    /// Atomically take a baggage item and reserve an AGV for its delivery.
    ///
    /// The item moves from the registry into the AGV's cargo slot and the
    /// slot becomes `Reserved`, all in one critical section. On any error
    /// nothing is mutated: an unavailable AGV leaves the registry untouched,
    /// and a missing item leaves the AGV untouched.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`, `AgvUnavailable`, or `ItemNotFound`.
    pub fn reserve_for_delivery(&self, agv_id: &AgvId, baggage_id: &BaggageId) -> Result<Baggage> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;
        if !agv.is_available() {
            return Err(FleetError::AgvUnavailable(*agv_id));
        }

        let item = inner
            .registry
            .remove(baggage_id)
            .ok_or(FleetError::ItemNotFound(*baggage_id))?;

        agv.slot = SlotState::Reserved;
        agv.carrying = Some(item.clone());

        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Loaded {} for {}", item.baggage_id, item.destination),
        ));

        Ok(item)
    }

    /// Atomically reserve an AGV and a charging station for a charge task.
    ///
    /// The AGV must be unreserved (`Idle` or `Depleted` slot) and the
    /// station free. On any error nothing is mutated.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`, `UnknownStation`, `AgvUnavailable`, or `StationBusy`.
    pub fn reserve_for_charge(&self, agv_id: &AgvId, station_id: &StationId) -> Result<()> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;
        if !matches!(agv.slot, SlotState::Idle | SlotState::Depleted) {
            return Err(FleetError::AgvUnavailable(*agv_id));
        }

        let station = inner
            .stations
            .get_mut(station_id)
            .ok_or(FleetError::UnknownStation(*station_id))?;
        if !station.is_free() {
            return Err(FleetError::StationBusy(*station_id));
        }

        agv.slot = SlotState::Reserved;
        station.occupant = Some(*agv_id);

        self.sink.record(Event::new(
            EventCategory::Charging,
            station.name.clone(),
            format!("Reserved by {}", agv.name),
        ));

        Ok(())
    }

    /// Roll back a delivery reservation that never started a phase: the
    /// carried item returns to the registry and the AGV goes back to `Idle`.
    ///
    /// Returns the id of the returned item, if one was aboard.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn cancel_reservation(&self, agv_id: &AgvId) -> Result<Option<BaggageId>> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;
        debug_assert_eq!(agv.slot, SlotState::Reserved, "cancel of an unreserved agv");

        agv.slot = SlotState::Idle;
        let Some(item) = agv.carrying.take() else {
            return Ok(None);
        };

        let baggage_id = item.baggage_id;
        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Delivery cancelled, {baggage_id} returned to registry"),
        ));
        inner.registry.insert(baggage_id, item);

        Ok(Some(baggage_id))
    }

    /// Set an AGV's coordinator slot.
    ///
    /// Transition validity is the coordinator's responsibility; the task
    /// holding the reservation is the only writer for a reserved AGV.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn set_slot(&self, agv_id: &AgvId, slot: SlotState) -> Result<()> {
        let mut inner = self.inner.write();
        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;

        tracing::debug!(agv_id = %agv_id, from = ?agv.slot, to = ?slot, "Slot transition");
        agv.slot = slot;
        Ok(())
    }

    // =========================================================================
    // Delivery phases
    // =========================================================================

    /// Drain one tick's worth of battery from an AGV.
    ///
    /// Emits a depletion event if this tick crossed to zero. Returns the
    /// level after the drain.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn tick_drain(&self, agv_id: &AgvId, amount: f64) -> Result<f64> {
        let mut inner = self.inner.write();
        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;

        let edge = agv.battery.drain(amount);
        let level = agv.battery.level();
        tracing::debug!(agv_id = %agv_id, level, "Battery tick drain");

        if edge == Some(BatteryEdge::Depleted) {
            self.sink.record(Event::new(
                EventCategory::Agv,
                agv.name.clone(),
                "Battery depleted".to_string(),
            ));
        }
        Ok(level)
    }

    /// Drive an AGV to `destination`, draining the trip cost.
    ///
    /// Emits a moving/reached event pair, plus a depletion event if the
    /// trip drained the battery to zero. Returns the level after the trip.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn move_agv(&self, agv_id: &AgvId, destination: &str, trip_cost: f64) -> Result<f64> {
        let mut inner = self.inner.write();
        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;

        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Moving to {destination}"),
        ));

        let edge = agv.battery.drain(trip_cost);
        let level = agv.battery.level();

        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Reached {destination} (battery {level:.0}%)"),
        ));
        if edge == Some(BatteryEdge::Depleted) {
            self.sink.record(Event::new(
                EventCategory::Agv,
                agv.name.clone(),
                "Battery depleted".to_string(),
            ));
        }

        Ok(level)
    }

    /// Hand the carried item over to a storage area.
    ///
    /// The take-from-cargo and push-to-storage happen in the same critical
    /// section. On `StorageFull` the item stays aboard and the AGV remains
    /// unavailable.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`, `UnknownStorage`, or `StorageFull`.
    pub fn unload_into(&self, agv_id: &AgvId, storage_id: &StorageId) -> Result<BaggageId> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;
        let storage = inner
            .storages
            .get_mut(storage_id)
            .ok_or(FleetError::UnknownStorage(*storage_id))?;

        let Some(item) = agv.carrying.take() else {
            debug_assert!(false, "unload on an agv with no cargo");
            return Err(FleetError::AgvUnavailable(*agv_id));
        };

        if !storage.has_room() {
            let baggage_id = item.baggage_id;
            agv.carrying = Some(item);
            self.sink.record(Event::new(
                EventCategory::Storage,
                storage.name.clone(),
                format!(
                    "Rejected {baggage_id}: at capacity ({}/{})",
                    storage.stored.len(),
                    storage.capacity
                ),
            ));
            return Err(FleetError::StorageFull(*storage_id));
        }

        let baggage_id = item.baggage_id;
        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Delivered {baggage_id} to {}", storage.name),
        ));
        storage.stored.push(item);
        self.sink.record(Event::new(
            EventCategory::Storage,
            storage.name.clone(),
            format!(
                "Stored {baggage_id} ({}/{})",
                storage.stored.len(),
                storage.capacity
            ),
        ));

        Ok(baggage_id)
    }

    // =========================================================================
    // Charging
    // =========================================================================

    /// Apply one charge tick to an AGV at the station it holds.
    ///
    /// Emits a fully-charged event if this tick reached 100. Returns the
    /// level after the tick.
    ///
    /// # Errors
    ///
    /// `UnknownAgv` or `UnknownStation`.
    pub fn charge_tick(&self, agv_id: &AgvId, station_id: &StationId, amount: f64) -> Result<f64> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let station = inner
            .stations
            .get(station_id)
            .ok_or(FleetError::UnknownStation(*station_id))?;
        debug_assert_eq!(
            station.occupant,
            Some(*agv_id),
            "charge tick on a station not held by this agv"
        );
        let station_name = station.name.clone();

        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;

        let edge = agv.battery.charge(amount);
        let level = agv.battery.level();
        tracing::debug!(agv_id = %agv_id, level, "Charge tick");

        if edge == Some(BatteryEdge::FullyCharged) {
            self.sink.record(Event::new(
                EventCategory::Charging,
                station_name,
                format!("{} fully charged", agv.name),
            ));
        }
        Ok(level)
    }

    /// Release a charging station held by an AGV.
    ///
    /// # Errors
    ///
    /// `UnknownAgv` or `UnknownStation`.
    pub fn release_station(&self, station_id: &StationId, agv_id: &AgvId) -> Result<()> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;

        let agv_name = inner
            .agvs
            .get(agv_id)
            .map(|a| a.name.clone())
            .ok_or(FleetError::UnknownAgv(*agv_id))?;
        let station = inner
            .stations
            .get_mut(station_id)
            .ok_or(FleetError::UnknownStation(*station_id))?;
        debug_assert_eq!(
            station.occupant,
            Some(*agv_id),
            "release of a station not held by this agv"
        );

        station.occupant = None;
        self.sink.record(Event::new(
            EventCategory::Charging,
            station.name.clone(),
            format!("Released by {agv_name}"),
        ));
        Ok(())
    }

    // =========================================================================
    // Operator controls
    // =========================================================================

    /// Set an AGV's battery level directly, clamped to `[0, 100]`.
    ///
    /// Emits edge events on crossings. Setting a `Depleted`-slot AGV to
    /// full releases the slot back to `Idle`, matching a completed charge.
    /// Returns the applied (clamped) level.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn set_battery_level(&self, agv_id: &AgvId, level: f64) -> Result<f64> {
        let mut inner = self.inner.write();
        let agv = inner
            .agvs
            .get_mut(agv_id)
            .ok_or(FleetError::UnknownAgv(*agv_id))?;

        let edge = agv.battery.set(level);
        let applied = agv.battery.level();

        self.sink.record(Event::new(
            EventCategory::Agv,
            agv.name.clone(),
            format!("Battery level set to {applied:.0}%"),
        ));
        match edge {
            Some(BatteryEdge::Depleted) => {
                self.sink.record(Event::new(
                    EventCategory::Agv,
                    agv.name.clone(),
                    "Battery depleted".to_string(),
                ));
            }
            Some(BatteryEdge::FullyCharged) => {
                self.sink.record(Event::new(
                    EventCategory::Agv,
                    agv.name.clone(),
                    "Fully charged".to_string(),
                ));
                if agv.slot == SlotState::Depleted {
                    agv.slot = SlotState::Idle;
                }
            }
            None => {}
        }

        Ok(applied)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up one AGV.
    ///
    /// # Errors
    ///
    /// `UnknownAgv`.
    pub fn agv(&self, agv_id: &AgvId) -> Result<Agv> {
        self.inner
            .read()
            .agvs
            .get(agv_id)
            .cloned()
            .ok_or(FleetError::UnknownAgv(*agv_id))
    }

    /// Look up one charging station.
    ///
    /// # Errors
    ///
    /// `UnknownStation`.
    pub fn station(&self, station_id: &StationId) -> Result<ChargingStation> {
        self.inner
            .read()
            .stations
            .get(station_id)
            .cloned()
            .ok_or(FleetError::UnknownStation(*station_id))
    }

    /// Look up one storage area.
    ///
    /// # Errors
    ///
    /// `UnknownStorage`.
    pub fn storage(&self, storage_id: &StorageId) -> Result<StorageArea> {
        self.inner
            .read()
            .storages
            .get(storage_id)
            .cloned()
            .ok_or(FleetError::UnknownStorage(*storage_id))
    }

    /// The primary delivery target: the first configured storage area.
    #[must_use]
    pub fn primary_storage(&self) -> Option<StorageId> {
        self.inner.read().storages.keys().next().copied()
    }

    /// Number of AGVs in the fleet.
    #[must_use]
    pub fn agv_count(&self) -> usize {
        self.inner.read().agvs.len()
    }

    /// All AGV ids, in id order.
    #[must_use]
    pub fn agv_ids(&self) -> Vec<AgvId> {
        self.inner.read().agvs.keys().copied().collect()
    }

    /// All station ids, in id order.
    #[must_use]
    pub fn station_ids(&self) -> Vec<StationId> {
        self.inner.read().stations.keys().copied().collect()
    }

    /// Dashboard view of every AGV.
    #[must_use]
    pub fn list_agvs(&self) -> Vec<AgvSnapshot> {
        self.inner.read().agvs.values().map(agv_snapshot).collect()
    }

    /// Items waiting in the registry, in id order.
    #[must_use]
    pub fn list_baggage(&self) -> Vec<Baggage> {
        self.inner.read().registry.values().cloned().collect()
    }

    /// View of every charging station.
    #[must_use]
    pub fn list_stations(&self) -> Vec<StationSnapshot> {
        self.inner
            .read()
            .stations
            .values()
            .map(station_snapshot)
            .collect()
    }

    /// View of every storage area.
    #[must_use]
    pub fn list_storages(&self) -> Vec<StorageSnapshot> {
        self.inner
            .read()
            .storages
            .values()
            .map(storage_snapshot)
            .collect()
    }

    /// Consistent snapshot of the whole fleet under a single read lock.
    #[must_use]
    pub fn snapshot(&self) -> FleetSnapshot {
        let inner = self.inner.read();
        FleetSnapshot {
            taken_at: Utc::now(),
            agvs: inner.agvs.values().map(agv_snapshot).collect(),
            pending_baggage: inner.registry.values().cloned().collect(),
            stations: inner.stations.values().map(station_snapshot).collect(),
            storages: inner.storages.values().map(storage_snapshot).collect(),
        }
    }
}

fn agv_snapshot(agv: &Agv) -> AgvSnapshot {
    AgvSnapshot {
        agv_id: agv.agv_id,
        name: agv.name.clone(),
        battery_pct: agv.battery.level(),
        status: agv.status(),
        carrying: agv.carrying.as_ref().map(|item| item.baggage_id),
    }
}

fn station_snapshot(station: &ChargingStation) -> StationSnapshot {
    StationSnapshot {
        station_id: station.station_id,
        name: station.name.clone(),
        free: station.is_free(),
    }
}

fn storage_snapshot(storage: &StorageArea) -> StorageSnapshot {
    StorageSnapshot {
        storage_id: storage.storage_id,
        name: storage.name.clone(),
        capacity: storage.capacity,
        stored: storage.stored.iter().map(|item| item.baggage_id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::types::{AgvStatus, StorageSpec};

    fn setup() -> (FleetState, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let state = FleetState::new(&FleetConfig::default(), sink.clone());
        (state, sink)
    }

    fn tiny_fleet(capacity: usize) -> (FleetState, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let config = FleetConfig {
            agvs: 1,
            stations: 1,
            storages: vec![StorageSpec {
                name: "Main Storage".to_string(),
                capacity,
            }],
        };
        let state = FleetState::new(&config, sink.clone());
        (state, sink)
    }

    #[test]
    fn seeds_default_fleet() {
        let (state, _sink) = setup();

        let agvs = state.list_agvs();
        assert_eq!(agvs.len(), 5);
        assert_eq!(agvs[0].name, "AGV-1");
        assert_eq!(agvs[4].name, "AGV-5");
        assert!(agvs.iter().all(|a| a.status == AgvStatus::Free));
        assert!(agvs.iter().all(|a| (a.battery_pct - 100.0).abs() < f64::EPSILON));

        let stations = state.list_stations();
        assert_eq!(stations.len(), 5);
        assert!(stations.iter().all(|s| s.free));

        let storages = state.list_storages();
        assert_eq!(storages.len(), 1);
        assert_eq!(storages[0].name, "Main Storage");
        assert_eq!(storages[0].capacity, 50);
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let (state, _sink) = setup();
        let first = state.register_baggage("Gate B");
        let second = state.register_baggage("Gate C");

        assert_eq!(first.baggage_id, BaggageId::new(1));
        assert_eq!(second.baggage_id, BaggageId::new(2));

        let pending = state.list_baggage();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].destination, "Gate B");
    }

    #[test]
    fn reserve_moves_item_aboard() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);

        let reserved = state.reserve_for_delivery(&agv_id, &item.baggage_id).unwrap();
        assert_eq!(reserved.destination, "Gate B");

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Reserved);
        assert_eq!(agv.carrying.unwrap().baggage_id, item.baggage_id);
        assert!(state.list_baggage().is_empty());
    }

    #[test]
    fn reserve_unavailable_leaves_registry_untouched() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 0.0).unwrap();

        let result = state.reserve_for_delivery(&agv_id, &item.baggage_id);
        assert!(matches!(result, Err(FleetError::AgvUnavailable(_))));

        // The take never happened.
        assert_eq!(state.list_baggage().len(), 1);
        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Idle);
        assert!(agv.carrying.is_none());
    }

    #[test]
    fn reserve_missing_item_leaves_agv_untouched() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);

        let result = state.reserve_for_delivery(&agv_id, &BaggageId::new(42));
        assert!(matches!(result, Err(FleetError::ItemNotFound(_))));

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Idle);
        assert!(agv.is_available());
    }

    #[test]
    fn same_item_cannot_be_reserved_twice() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");

        state
            .reserve_for_delivery(&AgvId::new(1), &item.baggage_id)
            .unwrap();
        let second = state.reserve_for_delivery(&AgvId::new(2), &item.baggage_id);
        assert!(matches!(second, Err(FleetError::ItemNotFound(_))));
    }

    #[test]
    fn unknown_agv_is_its_own_error() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");

        let result = state.reserve_for_delivery(&AgvId::new(99), &item.baggage_id);
        assert!(matches!(result, Err(FleetError::UnknownAgv(_))));
        assert_eq!(state.list_baggage().len(), 1);
    }

    #[test]
    fn cancel_reservation_returns_item() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);
        state.reserve_for_delivery(&agv_id, &item.baggage_id).unwrap();

        let returned = state.cancel_reservation(&agv_id).unwrap();
        assert_eq!(returned, Some(item.baggage_id));

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Idle);
        assert!(agv.is_available());
        assert_eq!(state.list_baggage().len(), 1);
    }

    #[test]
    fn move_drains_trip_cost() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);

        let level = state.move_agv(&agv_id, "Gate B", 20.0).unwrap();
        assert_eq!(level, 80.0);
    }

    #[test]
    fn five_trips_deplete_and_strand() {
        let (state, sink) = setup();
        let agv_id = AgvId::new(1);

        for _ in 0..5 {
            state.move_agv(&agv_id, "Gate B", 20.0).unwrap();
        }

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.battery.level(), 0.0);
        assert!(!agv.is_available());
        assert_eq!(agv.status(), AgvStatus::NeedsCharging);

        let depleted = sink
            .by_category(EventCategory::Agv)
            .iter()
            .filter(|e| e.message == "Battery depleted")
            .count();
        assert_eq!(depleted, 1);
    }

    #[test]
    fn low_battery_move_clamps_at_zero() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 5.0).unwrap();

        let level = state.move_agv(&agv_id, "Gate B", 20.0).unwrap();
        assert_eq!(level, 0.0);
    }

    #[test]
    fn unload_stores_in_one_section() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);
        let storage_id = state.primary_storage().unwrap();
        state.reserve_for_delivery(&agv_id, &item.baggage_id).unwrap();

        let stored = state.unload_into(&agv_id, &storage_id).unwrap();
        assert_eq!(stored, item.baggage_id);

        let agv = state.agv(&agv_id).unwrap();
        assert!(agv.carrying.is_none());
        let storage = state.storage(&storage_id).unwrap();
        assert_eq!(storage.stored.len(), 1);
        assert_eq!(storage.stored[0].baggage_id, item.baggage_id);
    }

    #[test]
    fn full_storage_keeps_item_aboard() {
        let (state, _sink) = tiny_fleet(1);
        let agv_id = AgvId::new(1);
        let storage_id = state.primary_storage().unwrap();

        let first = state.register_baggage("Gate B");
        state.reserve_for_delivery(&agv_id, &first.baggage_id).unwrap();
        state.unload_into(&agv_id, &storage_id).unwrap();
        state.set_slot(&agv_id, SlotState::Idle).unwrap();

        let second = state.register_baggage("Gate C");
        state
            .reserve_for_delivery(&agv_id, &second.baggage_id)
            .unwrap();
        let result = state.unload_into(&agv_id, &storage_id);
        assert!(matches!(result, Err(FleetError::StorageFull(_))));

        // Item stays aboard; the stored count is unchanged.
        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.carrying.as_ref().unwrap().baggage_id, second.baggage_id);
        assert!(!agv.is_available());
        assert_eq!(state.storage(&storage_id).unwrap().stored.len(), 1);
    }

    #[test]
    fn station_reservation_is_exclusive() {
        let (state, _sink) = setup();
        let station_id = StationId::new(1);

        state
            .reserve_for_charge(&AgvId::new(1), &station_id)
            .unwrap();
        let second = state.reserve_for_charge(&AgvId::new(2), &station_id);
        assert!(matches!(second, Err(FleetError::StationBusy(_))));

        // The loser is untouched.
        let loser = state.agv(&AgvId::new(2)).unwrap();
        assert_eq!(loser.slot, SlotState::Idle);
    }

    #[test]
    fn reserved_agv_cannot_take_a_charge() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);
        state.reserve_for_delivery(&agv_id, &item.baggage_id).unwrap();

        let result = state.reserve_for_charge(&agv_id, &StationId::new(1));
        assert!(matches!(result, Err(FleetError::AgvUnavailable(_))));
        assert!(state.station(&StationId::new(1)).unwrap().is_free());
    }

    #[test]
    fn depleted_agv_can_reserve_a_charge() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 0.0).unwrap();
        state.set_slot(&agv_id, SlotState::Depleted).unwrap();

        state
            .reserve_for_charge(&agv_id, &StationId::new(1))
            .unwrap();
        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Reserved);
    }

    #[test]
    fn charge_ticks_reach_full_once() {
        let (state, sink) = setup();
        let agv_id = AgvId::new(1);
        let station_id = StationId::new(1);
        state.set_battery_level(&agv_id, 98.0).unwrap();
        state.reserve_for_charge(&agv_id, &station_id).unwrap();

        assert_eq!(state.charge_tick(&agv_id, &station_id, 1.0).unwrap(), 99.0);
        assert_eq!(state.charge_tick(&agv_id, &station_id, 1.0).unwrap(), 100.0);

        let charged = sink
            .by_category(EventCategory::Charging)
            .iter()
            .filter(|e| e.message.contains("fully charged"))
            .count();
        assert_eq!(charged, 1);

        state.release_station(&station_id, &agv_id).unwrap();
        assert!(state.station(&station_id).unwrap().is_free());
    }

    #[test]
    fn full_charge_frees_a_depleted_slot() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 0.0).unwrap();
        state.set_slot(&agv_id, SlotState::Depleted).unwrap();

        state.set_battery_level(&agv_id, 100.0).unwrap();
        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Idle);
        assert!(agv.is_available());
    }

    #[test]
    fn partial_charge_leaves_depleted_slot() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 0.0).unwrap();
        state.set_slot(&agv_id, SlotState::Depleted).unwrap();

        state.set_battery_level(&agv_id, 50.0).unwrap();
        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Depleted);
        assert!(!agv.is_available());
    }

    #[test]
    fn set_battery_clamps() {
        let (state, _sink) = setup();
        let agv_id = AgvId::new(1);

        assert_eq!(state.set_battery_level(&agv_id, 250.0).unwrap(), 100.0);
        assert_eq!(state.set_battery_level(&agv_id, -10.0).unwrap(), 0.0);
    }

    #[test]
    fn snapshot_is_consistent() {
        let (state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        state.register_baggage("Gate C");
        state
            .reserve_for_delivery(&AgvId::new(1), &item.baggage_id)
            .unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.agvs.len(), 5);
        assert_eq!(snapshot.pending_baggage.len(), 1);
        assert_eq!(snapshot.stations.len(), 5);
        assert_eq!(snapshot.agvs[0].carrying, Some(item.baggage_id));
        assert_eq!(snapshot.agvs[0].status, AgvStatus::Busy);
    }

    #[test]
    fn every_item_lives_in_exactly_one_place() {
        let (state, _sink) = setup();
        let storage_id = state.primary_storage().unwrap();
        for n in 0..4 {
            state.register_baggage(format!("Gate {n}"));
        }

        let placements = |state: &FleetState| {
            let snapshot = state.snapshot();
            let pending = snapshot.pending_baggage.len();
            let carried: usize = snapshot
                .agvs
                .iter()
                .filter(|a| a.carrying.is_some())
                .count();
            let stored: usize = snapshot.storages.iter().map(|s| s.stored.len()).sum();
            pending + carried + stored
        };

        assert_eq!(placements(&state), 4);

        state
            .reserve_for_delivery(&AgvId::new(1), &BaggageId::new(1))
            .unwrap();
        assert_eq!(placements(&state), 4);

        state.unload_into(&AgvId::new(1), &storage_id).unwrap();
        assert_eq!(placements(&state), 4);

        state
            .reserve_for_delivery(&AgvId::new(2), &BaggageId::new(2))
            .unwrap();
        state.cancel_reservation(&AgvId::new(2)).unwrap();
        assert_eq!(placements(&state), 4);
    }
}
