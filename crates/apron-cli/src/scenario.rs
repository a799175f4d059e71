//! Scripted delivery scenario.
//!
//! Seeds a batch of baggage items bound for the departure gates, dispatches
//! them across the fleet in waves, then sends every depleted AGV that can
//! reach a free station off to recharge.

use apron_core::{AgvId, StationId};
use apron_dispatch::{DispatchError, Dispatcher, Disposition, TaskHandle};
use apron_fleet::{AgvStatus, Baggage, FleetState};
use futures::future::join_all;

/// Departure gates the scenario cycles through.
const GATES: [char; 6] = ['B', 'C', 'D', 'E', 'F', 'G'];

/// Tally of one scenario run.
#[derive(Debug, Default)]
pub struct ScenarioReport {
    /// Items that reached storage.
    pub delivered: usize,
    /// Tasks that ended in a failure or cancellation.
    pub failed: usize,
    /// Items never dispatched because no AGV would take them.
    pub skipped: usize,
    /// AGVs charged back to full at the end of the run.
    pub recharged: usize,
}

/// Seed `baggage` items, deliver them in fleet-sized waves, then recharge
/// the depleted AGVs.
///
/// Waves are sized to the fleet so every item in a wave can hold its own
/// AGV; the next wave starts once the previous one has reported.
pub async fn run<D: Dispatcher>(
    dispatcher: &D,
    state: &FleetState,
    baggage: usize,
) -> ScenarioReport {
    let mut report = ScenarioReport::default();
    let agv_ids = state.agv_ids();

    let items: Vec<Baggage> = (0..baggage)
        .map(|i| state.register_baggage(format!("Gate {}", GATES[i % GATES.len()])))
        .collect();
    tracing::info!(items = items.len(), agvs = agv_ids.len(), "Scenario start");

    for wave in items.chunks(agv_ids.len().max(1)) {
        let mut handles = Vec::new();
        for (offset, item) in wave.iter().enumerate() {
            match submit_with_rotation(dispatcher, &agv_ids, offset, item).await {
                Some(handle) => handles.push(handle),
                None => {
                    report.skipped += 1;
                    tracing::warn!(
                        baggage_id = %item.baggage_id,
                        "No AGV available, item stays pending"
                    );
                }
            }
        }

        for outcome in join_all(handles.into_iter().map(TaskHandle::outcome)).await {
            match outcome.map(|o| o.disposition) {
                Some(Disposition::Completed) => report.delivered += 1,
                Some(disposition) => {
                    report.failed += 1;
                    tracing::warn!(%disposition, "Delivery did not complete");
                }
                None => report.failed += 1,
            }
        }
    }

    report.recharged = recharge_depleted(dispatcher, state).await;
    report
}

/// Try each AGV in turn, starting at `start`, until one accepts the item.
///
/// Contention rejections move on to the next AGV; any other rejection is
/// final for this item.
async fn submit_with_rotation<D: Dispatcher>(
    dispatcher: &D,
    agv_ids: &[AgvId],
    start: usize,
    item: &Baggage,
) -> Option<TaskHandle> {
    for step in 0..agv_ids.len() {
        let agv_id = agv_ids[(start + step) % agv_ids.len()];
        match dispatcher.submit_delivery(&agv_id, &item.baggage_id).await {
            Ok(handle) => {
                tracing::info!(
                    agv_id = %agv_id,
                    baggage_id = %item.baggage_id,
                    destination = %item.destination,
                    "Delivery dispatched"
                );
                return Some(handle);
            }
            Err(DispatchError::Fleet(error)) if error.is_contention() => {
                tracing::debug!(agv_id = %agv_id, error = %error, "AGV busy, trying the next");
            }
            Err(error) => {
                tracing::error!(
                    baggage_id = %item.baggage_id,
                    error = %error,
                    "Delivery rejected"
                );
                return None;
            }
        }
    }
    None
}

/// Pair each depleted AGV with a free station and charge it to full.
async fn recharge_depleted<D: Dispatcher>(dispatcher: &D, state: &FleetState) -> usize {
    let depleted: Vec<AgvId> = state
        .list_agvs()
        .into_iter()
        .filter(|agv| agv.status == AgvStatus::NeedsCharging)
        .map(|agv| agv.agv_id)
        .collect();
    if depleted.is_empty() {
        return 0;
    }

    let free_stations: Vec<StationId> = state
        .list_stations()
        .into_iter()
        .filter(|station| station.free)
        .map(|station| station.station_id)
        .collect();
    if depleted.len() > free_stations.len() {
        tracing::warn!(
            stranded = depleted.len() - free_stations.len(),
            "Not enough free stations for every depleted AGV"
        );
    }

    let mut handles = Vec::new();
    for (agv_id, station_id) in depleted.iter().zip(free_stations.iter()) {
        match dispatcher.submit_charge(agv_id, station_id).await {
            Ok(handle) => handles.push(handle),
            Err(error) => {
                tracing::warn!(agv_id = %agv_id, error = %error, "Charge rejected");
            }
        }
    }

    join_all(handles.into_iter().map(TaskHandle::outcome))
        .await
        .into_iter()
        .filter(|outcome| {
            matches!(
                outcome.as_ref().map(|o| o.disposition),
                Some(Disposition::Completed)
            )
        })
        .count()
}
