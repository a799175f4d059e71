//! Dispatcher service implementation.
//!
//! This module provides the `Dispatcher` trait and `DispatcherService`
//! implementation that assigns delivery and charge tasks to AGVs under
//! contention: limited AGVs, exclusive stations, bounded storage, and
//! depleting batteries.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use apron_core::{AgvId, BaggageId, StationId, TaskId};
use apron_fleet::{
    Event, EventCategory, EventSink, FleetError, FleetSnapshot, FleetState,
};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{DispatchError, Result};
use crate::task::{self, TaskCtx};
use crate::types::{DispatchConfig, Disposition, TaskHandle, TaskKind, TaskOutcome};

/// Trait defining the task coordinator operations.
///
/// Submissions return immediately with a [`TaskHandle`] or a named error;
/// completion is reported asynchronously through the handle and the event
/// sink.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Submit a delivery: the AGV takes the item to the primary storage
    /// area.
    ///
    /// # Errors
    ///
    /// `AgvUnavailable` if the AGV cannot take the task (or the worker pool
    /// is exhausted), `ItemNotFound` if the item is not in the registry,
    /// `ShuttingDown` after shutdown. Rejections mutate nothing.
    async fn submit_delivery(
        &self,
        agv_id: &AgvId,
        baggage_id: &BaggageId,
    ) -> Result<TaskHandle>;

    /// Submit a charge: the AGV holds the station until its battery is
    /// full.
    ///
    /// The AGV must be unreserved; a `Depleted` AGV is accepted so it can
    /// recover.
    ///
    /// # Errors
    ///
    /// `AgvUnavailable`, `StationBusy`, or `ShuttingDown`. Rejections
    /// mutate nothing.
    async fn submit_charge(&self, agv_id: &AgvId, station_id: &StationId) -> Result<TaskHandle>;

    /// Consistent point-in-time view of the fleet.
    fn snapshot(&self) -> FleetSnapshot;

    /// Stop accepting submissions, signal every in-flight task to cancel,
    /// and join them.
    ///
    /// After shutdown every AGV is in a well-defined terminal slot and all
    /// stations are released by their charge tasks.
    async fn shutdown(&self);
}

/// The task coordinator: a bounded worker pool over the shared fleet state.
///
/// One semaphore permit is held per in-flight task; the pool is sized to
/// the fleet, and exhaustion rejects instead of queuing.
pub struct DispatcherService {
    state: Arc<FleetState>,
    sink: Arc<dyn EventSink>,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatcherService {
    /// Create a new dispatcher over the given fleet state.
    #[must_use]
    pub fn new(state: Arc<FleetState>, sink: Arc<dyn EventSink>, config: DispatchConfig) -> Self {
        let permits = Arc::new(Semaphore::new(state.agv_count()));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state,
            sink,
            config,
            permits,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Create with default timing configuration.
    #[must_use]
    pub fn with_defaults(state: Arc<FleetState>, sink: Arc<dyn EventSink>) -> Self {
        Self::new(state, sink, DispatchConfig::default())
    }

    /// Get a reference to the fleet state.
    #[must_use]
    pub fn state(&self) -> &FleetState {
        &self.state
    }

    /// Get the timing configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Take one worker-pool permit, or reject with `AgvUnavailable`.
    ///
    /// Pool exhaustion means at least one task per AGV is in flight, so
    /// every AGV is reserved and the rejection is accurate.
    fn acquire_permit(
        &self,
        agv_id: &AgvId,
    ) -> Result<tokio::sync::OwnedSemaphorePermit> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| DispatchError::Fleet(FleetError::AgvUnavailable(*agv_id)))
    }

    fn task_ctx(&self) -> TaskCtx {
        TaskCtx {
            state: Arc::clone(&self.state),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl Dispatcher for DispatcherService {
    async fn submit_delivery(
        &self,
        agv_id: &AgvId,
        baggage_id: &BaggageId,
    ) -> Result<TaskHandle> {
        // The task list lock orders submissions against shutdown: a
        // submission either lands its handle before the drain or observes
        // the shutdown flag.
        let mut tasks = self.tasks.lock().await;
        if *self.shutdown_tx.borrow() {
            return Err(DispatchError::ShuttingDown);
        }

        let storage_id = self
            .state
            .primary_storage()
            .ok_or(DispatchError::NoStorageConfigured)?;
        let permit = self.acquire_permit(agv_id)?;

        // Atomic take-and-reserve: on error nothing was mutated.
        let item = self.state.reserve_for_delivery(agv_id, baggage_id)?;

        let task_id = TaskId::generate();
        let (handle, outcome_tx) = TaskHandle::new(task_id, TaskKind::Delivery, *agv_id);
        self.sink.record(Event::new(
            EventCategory::Task,
            task_id.to_string(),
            format!("Delivery of {} by {agv_id} submitted", item.baggage_id),
        ));
        tracing::info!(
            task_id = %task_id,
            agv_id = %agv_id,
            baggage_id = %item.baggage_id,
            "Submitted delivery task"
        );

        let ctx = self.task_ctx();
        let sink = Arc::clone(&self.sink);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let agv_id = *agv_id;

        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();

            let result = task::run_delivery(&ctx, &mut shutdown_rx, agv_id, &item, storage_id).await;
            let disposition = match result {
                Ok(disposition) => disposition,
                Err(error) => {
                    tracing::error!(task_id = %task_id, %error, "Delivery task aborted internally");
                    Disposition::Cancelled
                }
            };

            sink.record(Event::new(
                EventCategory::Task,
                task_id.to_string(),
                format!("Delivery of {} by {agv_id} {disposition}", item.baggage_id),
            ));
            tracing::info!(task_id = %task_id, agv_id = %agv_id, %disposition, "Delivery task finished");

            let _ = outcome_tx.send(TaskOutcome {
                task_id,
                kind: TaskKind::Delivery,
                agv_id,
                disposition,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }));

        Ok(handle)
    }

    async fn submit_charge(&self, agv_id: &AgvId, station_id: &StationId) -> Result<TaskHandle> {
        let mut tasks = self.tasks.lock().await;
        if *self.shutdown_tx.borrow() {
            return Err(DispatchError::ShuttingDown);
        }

        let permit = self.acquire_permit(agv_id)?;

        // Atomic pair reservation: AGV and station, or neither.
        self.state.reserve_for_charge(agv_id, station_id)?;

        let task_id = TaskId::generate();
        let (handle, outcome_tx) = TaskHandle::new(task_id, TaskKind::Charge, *agv_id);
        self.sink.record(Event::new(
            EventCategory::Task,
            task_id.to_string(),
            format!("Charge of {agv_id} at {station_id} submitted"),
        ));
        tracing::info!(
            task_id = %task_id,
            agv_id = %agv_id,
            station_id = %station_id,
            "Submitted charge task"
        );

        let ctx = self.task_ctx();
        let sink = Arc::clone(&self.sink);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let agv_id = *agv_id;
        let station_id = *station_id;

        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();

            let result = task::run_charge(&ctx, &mut shutdown_rx, agv_id, station_id).await;
            let disposition = match result {
                Ok(disposition) => disposition,
                Err(error) => {
                    tracing::error!(task_id = %task_id, %error, "Charge task aborted internally");
                    Disposition::Cancelled
                }
            };

            sink.record(Event::new(
                EventCategory::Task,
                task_id.to_string(),
                format!("Charge of {agv_id} at {station_id} {disposition}"),
            ));
            tracing::info!(task_id = %task_id, agv_id = %agv_id, %disposition, "Charge task finished");

            let _ = outcome_tx.send(TaskOutcome {
                task_id,
                kind: TaskKind::Charge,
                agv_id,
                disposition,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }));

        Ok(handle)
    }

    fn snapshot(&self) -> FleetSnapshot {
        self.state.snapshot()
    }

    async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        let _ = self.shutdown_tx.send(true);
        let in_flight: Vec<JoinHandle<()>> = tasks.drain(..).collect();
        drop(tasks);

        tracing::info!(in_flight = in_flight.len(), "Shutting down dispatcher");
        for task in in_flight {
            let _ = task.await;
        }

        self.sink.record(Event::new(
            EventCategory::System,
            "fleet",
            "Dispatcher shut down",
        ));
        tracing::info!("Dispatcher shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apron_fleet::{AgvStatus, FleetConfig, MemorySink, SlotState, StorageSpec};

    fn setup() -> (DispatcherService, Arc<FleetState>, Arc<MemorySink>) {
        setup_with(FleetConfig::default(), DispatchConfig::fast())
    }

    fn setup_with(
        fleet: FleetConfig,
        config: DispatchConfig,
    ) -> (DispatcherService, Arc<FleetState>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let state = Arc::new(FleetState::new(&fleet, sink.clone()));
        let service = DispatcherService::new(state.clone(), sink.clone(), config);
        (service, state, sink)
    }

    #[tokio::test]
    async fn delivery_completes_through_the_service() {
        let (service, state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);

        let handle = service
            .submit_delivery(&agv_id, &item.baggage_id)
            .await
            .unwrap();
        assert_eq!(handle.kind, TaskKind::Delivery);

        let outcome = handle.outcome().await.unwrap();
        assert_eq!(outcome.disposition, Disposition::Completed);
        assert_eq!(outcome.agv_id, agv_id);

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.battery.level(), 70.0);
        assert!(agv.is_available());
    }

    #[tokio::test]
    async fn unavailable_agv_is_rejected_without_mutation() {
        let (service, state, _sink) = setup();
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);
        state.set_battery_level(&agv_id, 0.0).unwrap();

        let result = service.submit_delivery(&agv_id, &item.baggage_id).await;
        assert!(matches!(
            result,
            Err(DispatchError::Fleet(FleetError::AgvUnavailable(_)))
        ));
        assert_eq!(state.list_baggage().len(), 1);
    }

    #[tokio::test]
    async fn missing_item_is_rejected() {
        let (service, state, _sink) = setup();
        let agv_id = AgvId::new(1);

        let result = service.submit_delivery(&agv_id, &BaggageId::new(9)).await;
        assert!(matches!(
            result,
            Err(DispatchError::Fleet(FleetError::ItemNotFound(_)))
        ));
        assert!(state.agv(&agv_id).unwrap().is_available());
    }

    #[tokio::test]
    async fn unknown_agv_is_rejected() {
        let (service, state, _sink) = setup();
        let item = state.register_baggage("Gate B");

        let result = service.submit_delivery(&AgvId::new(99), &item.baggage_id).await;
        assert!(matches!(
            result,
            Err(DispatchError::Fleet(FleetError::UnknownAgv(_)))
        ));
        assert_eq!(state.list_baggage().len(), 1);
    }

    #[tokio::test]
    async fn busy_station_is_rejected() {
        let (service, _state, _sink) = setup();
        let station_id = StationId::new(1);

        let first = service
            .submit_charge(&AgvId::new(1), &station_id)
            .await
            .unwrap();
        let second = service.submit_charge(&AgvId::new(2), &station_id).await;
        assert!(matches!(
            second,
            Err(DispatchError::Fleet(FleetError::StationBusy(_)))
        ));

        first.outcome().await.unwrap();
    }

    #[tokio::test]
    async fn pool_exhaustion_rejects_like_a_busy_fleet() {
        let fleet = FleetConfig {
            agvs: 1,
            stations: 1,
            storages: vec![StorageSpec {
                name: "Main Storage".to_string(),
                capacity: 10,
            }],
        };
        let (service, state, _sink) = setup_with(fleet, DispatchConfig::fast());
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);

        let handle = service
            .submit_delivery(&agv_id, &item.baggage_id)
            .await
            .unwrap();

        // Single permit is held by the in-flight delivery.
        let result = service.submit_charge(&agv_id, &StationId::new(1)).await;
        assert!(matches!(
            result,
            Err(DispatchError::Fleet(FleetError::AgvUnavailable(_)))
        ));

        handle.outcome().await.unwrap();
    }

    #[tokio::test]
    async fn permit_is_released_after_completion() {
        let fleet = FleetConfig {
            agvs: 1,
            stations: 1,
            storages: vec![StorageSpec {
                name: "Main Storage".to_string(),
                capacity: 10,
            }],
        };
        let (service, state, _sink) = setup_with(fleet, DispatchConfig::fast());
        let item = state.register_baggage("Gate B");
        let agv_id = AgvId::new(1);

        let first = service
            .submit_delivery(&agv_id, &item.baggage_id)
            .await
            .unwrap();
        first.outcome().await.unwrap();

        let second = service
            .submit_charge(&agv_id, &StationId::new(1))
            .await
            .unwrap();
        let outcome = second.outcome().await.unwrap();
        assert_eq!(outcome.disposition, Disposition::Completed);
        assert!(state.agv(&agv_id).unwrap().battery.is_full());
    }

    #[tokio::test]
    async fn depleted_agv_recovers_through_a_charge() {
        let (service, state, _sink) = setup();
        let agv_id = AgvId::new(1);
        let item = state.register_baggage("Gate B");
        state.set_battery_level(&agv_id, 3.0).unwrap();

        let handle = service
            .submit_delivery(&agv_id, &item.baggage_id)
            .await
            .unwrap();
        let outcome = handle.outcome().await.unwrap();
        assert_eq!(
            outcome.disposition,
            Disposition::Failed(crate::error::TaskError::BatteryDepleted)
        );
        assert_eq!(state.agv(&agv_id).unwrap().slot, SlotState::Depleted);

        // Jump-start most of the way so the test charge is short.
        state.set_battery_level(&agv_id, 95.0).unwrap();
        assert_eq!(state.agv(&agv_id).unwrap().slot, SlotState::Depleted);

        let charge = service
            .submit_charge(&agv_id, &StationId::new(1))
            .await
            .unwrap();
        let outcome = charge.outcome().await.unwrap();
        assert_eq!(outcome.disposition, Disposition::Completed);

        let agv = state.agv(&agv_id).unwrap();
        assert!(agv.battery.is_full());
        assert_eq!(agv.slot, SlotState::Idle);
        // The stranded delivery's item is still aboard, so the AGV stays
        // busy rather than available.
        assert_eq!(agv.status(), AgvStatus::Busy);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_submissions() {
        let (service, state, _sink) = setup();
        let item = state.register_baggage("Gate B");

        service.shutdown().await;

        let result = service.submit_delivery(&AgvId::new(1), &item.baggage_id).await;
        assert!(matches!(result, Err(DispatchError::ShuttingDown)));
        let result = service.submit_charge(&AgvId::new(1), &StationId::new(1)).await;
        assert!(matches!(result, Err(DispatchError::ShuttingDown)));
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_charges_and_frees_stations() {
        let config = DispatchConfig {
            tick: std::time::Duration::from_millis(50),
            ..DispatchConfig::default()
        };
        let (service, state, _sink) = setup_with(FleetConfig::default(), config);
        let agv_id = AgvId::new(1);
        let station_id = StationId::new(1);
        state.set_battery_level(&agv_id, 10.0).unwrap();

        let handle = service.submit_charge(&agv_id, &station_id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        service.shutdown().await;

        let outcome = handle.outcome().await.unwrap();
        assert_eq!(outcome.disposition, Disposition::Cancelled);

        let agv = state.agv(&agv_id).unwrap();
        assert_eq!(agv.slot, SlotState::Idle);
        assert!(state.station(&station_id).unwrap().is_free());
    }

    #[tokio::test]
    async fn task_events_reach_the_sink() {
        let (service, state, sink) = setup();
        let item = state.register_baggage("Gate B");

        let handle = service
            .submit_delivery(&AgvId::new(1), &item.baggage_id)
            .await
            .unwrap();
        handle.outcome().await.unwrap();

        let task_events = sink.by_category(EventCategory::Task);
        assert_eq!(task_events.len(), 2);
        assert!(task_events[0].message.contains("submitted"));
        assert!(task_events[1].message.contains("completed"));
    }
}
