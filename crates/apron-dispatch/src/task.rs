//! Task phase runners.
//!
//! Each submitted task runs as one spawned future that drives its AGV
//! through the slot-state machine: timed phases suspend only the task
//! itself, every tick applies one whole battery unit inside one state-lock
//! acquisition, and a shutdown signal is checked against every sleep.
//!
//! Cancellation semantics: fully-applied ticks stay applied. A delivery
//! cancelled before its first phase rolls all the way back (item to the
//! registry, AGV to `Idle`); cancelled mid-phase it parks in `Reserved`
//! with the item aboard. A cancelled charge always releases its station
//! and parks in `Idle`, or `Depleted` if the battery is still at zero.
//! If the coordinator is dropped without a shutdown, tasks observe the
//! closed channel and cancel the same way.

use std::sync::Arc;

use apron_core::{AgvId, StationId, StorageId};
use apron_fleet::{Baggage, FleetError, FleetState, SlotState};
use tokio::sync::watch;

use crate::error::{Result, TaskError};
use crate::phase;
use crate::types::{DispatchConfig, Disposition};

/// Shared context handed to every task runner.
pub(crate) struct TaskCtx {
    pub state: Arc<FleetState>,
    pub config: DispatchConfig,
}

/// How a timed drain phase ended.
enum PhaseEnd {
    Finished,
    Depleted,
    Cancelled,
}

/// Perform a validated slot transition.
fn advance(ctx: &TaskCtx, agv_id: AgvId, from: SlotState, to: SlotState) -> Result<()> {
    phase::validate_transition(&agv_id, from, to)?;
    ctx.state.set_slot(&agv_id, to)?;
    Ok(())
}

/// Run `ticks` cancellable drain ticks against an AGV.
async fn drain_phase(
    ctx: &TaskCtx,
    shutdown: &mut watch::Receiver<bool>,
    agv_id: AgvId,
    ticks: u32,
) -> Result<PhaseEnd> {
    for _ in 0..ticks {
        tokio::select! {
            () = tokio::time::sleep(ctx.config.tick) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(PhaseEnd::Cancelled);
                }
            }
        }
        let level = ctx.state.tick_drain(&agv_id, ctx.config.drain_per_tick)?;
        if level <= 0.0 {
            return Ok(PhaseEnd::Depleted);
        }
    }
    Ok(PhaseEnd::Finished)
}

/// Drive one delivery: load, transit to the destination, unload into the
/// primary storage area.
pub(crate) async fn run_delivery(
    ctx: &TaskCtx,
    shutdown: &mut watch::Receiver<bool>,
    agv_id: AgvId,
    item: &Baggage,
    storage_id: StorageId,
) -> Result<Disposition> {
    // Cancelled before any phase applied: full rollback.
    if *shutdown.borrow() {
        ctx.state.cancel_reservation(&agv_id)?;
        return Ok(Disposition::Cancelled);
    }

    advance(ctx, agv_id, SlotState::Reserved, SlotState::Loading)?;
    match drain_phase(ctx, shutdown, agv_id, ctx.config.load_ticks).await? {
        PhaseEnd::Finished => {}
        PhaseEnd::Depleted => {
            advance(ctx, agv_id, SlotState::Loading, SlotState::Depleted)?;
            return Ok(Disposition::Failed(TaskError::BatteryDepleted));
        }
        PhaseEnd::Cancelled => {
            advance(ctx, agv_id, SlotState::Loading, SlotState::Reserved)?;
            return Ok(Disposition::Cancelled);
        }
    }

    advance(ctx, agv_id, SlotState::Loading, SlotState::Transit)?;
    let level = ctx
        .state
        .move_agv(&agv_id, &item.destination, ctx.config.trip_cost)?;
    if level <= 0.0 {
        advance(ctx, agv_id, SlotState::Transit, SlotState::Depleted)?;
        return Ok(Disposition::Failed(TaskError::BatteryDepleted));
    }
    match drain_phase(ctx, shutdown, agv_id, ctx.config.transit_ticks).await? {
        PhaseEnd::Finished => {}
        PhaseEnd::Depleted => {
            advance(ctx, agv_id, SlotState::Transit, SlotState::Depleted)?;
            return Ok(Disposition::Failed(TaskError::BatteryDepleted));
        }
        PhaseEnd::Cancelled => {
            advance(ctx, agv_id, SlotState::Transit, SlotState::Reserved)?;
            return Ok(Disposition::Cancelled);
        }
    }

    advance(ctx, agv_id, SlotState::Transit, SlotState::Unloading)?;
    match ctx.state.unload_into(&agv_id, &storage_id) {
        Ok(_) => {
            advance(ctx, agv_id, SlotState::Unloading, SlotState::Idle)?;
            Ok(Disposition::Completed)
        }
        Err(FleetError::StorageFull(full_id)) => {
            advance(ctx, agv_id, SlotState::Unloading, SlotState::Reserved)?;
            Ok(Disposition::Failed(TaskError::StorageFull(full_id)))
        }
        Err(err) => Err(err.into()),
    }
}

/// Drive one charge: plug in at the reserved station, then charge to full
/// one tick at a time.
pub(crate) async fn run_charge(
    ctx: &TaskCtx,
    shutdown: &mut watch::Receiver<bool>,
    agv_id: AgvId,
    station_id: StationId,
) -> Result<Disposition> {
    if *shutdown.borrow() {
        cancel_charge(ctx, agv_id, station_id, SlotState::Reserved)?;
        return Ok(Disposition::Cancelled);
    }

    // One tick to plug in.
    advance(ctx, agv_id, SlotState::Reserved, SlotState::ChargingWait)?;
    tokio::select! {
        () = tokio::time::sleep(ctx.config.tick) => {}
        changed = shutdown.changed() => {
            if changed.is_err() || *shutdown.borrow() {
                cancel_charge(ctx, agv_id, station_id, SlotState::ChargingWait)?;
                return Ok(Disposition::Cancelled);
            }
        }
    }

    advance(ctx, agv_id, SlotState::ChargingWait, SlotState::Charging)?;
    while !ctx.state.agv(&agv_id)?.battery.is_full() {
        tokio::select! {
            () = tokio::time::sleep(ctx.config.tick) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    cancel_charge(ctx, agv_id, station_id, SlotState::Charging)?;
                    return Ok(Disposition::Cancelled);
                }
            }
        }
        ctx.state
            .charge_tick(&agv_id, &station_id, ctx.config.charge_per_tick)?;
    }

    ctx.state.release_station(&station_id, &agv_id)?;
    advance(ctx, agv_id, SlotState::Charging, SlotState::Idle)?;
    Ok(Disposition::Completed)
}

/// Abort a charge: release the station and park the AGV by battery level.
fn cancel_charge(ctx: &TaskCtx, agv_id: AgvId, station_id: StationId, from: SlotState) -> Result<()> {
    ctx.state.release_station(&station_id, &agv_id)?;
    let to = if ctx.state.agv(&agv_id)?.battery.is_depleted() {
        SlotState::Depleted
    } else {
        SlotState::Idle
    };
    advance(ctx, agv_id, from, to)?;
    Ok(())
}
