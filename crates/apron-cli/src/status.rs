//! Plain-text fleet status board.
//!
//! Renders a [`FleetSnapshot`] the way an apron supervisor reads it: one
//! line per AGV, pending item, charging station and storage area.

use apron_fleet::FleetSnapshot;

/// Render a snapshot as a multi-line status board.
#[must_use]
pub fn render(snapshot: &FleetSnapshot) -> String {
    let mut lines = Vec::new();

    lines.push("AGVs:".to_string());
    for agv in &snapshot.agvs {
        let mut line = format!(
            "  {} | Battery: {:.0}% | Status: {}",
            agv.name, agv.battery_pct, agv.status
        );
        if let Some(baggage_id) = &agv.carrying {
            line.push_str(&format!(" | Carrying: {baggage_id}"));
        }
        lines.push(line);
    }

    lines.push("Pending baggage:".to_string());
    if snapshot.pending_baggage.is_empty() {
        lines.push("  (none)".to_string());
    }
    for item in &snapshot.pending_baggage {
        lines.push(format!("  {} -> {}", item.baggage_id, item.destination));
    }

    lines.push("Charging stations:".to_string());
    for station in &snapshot.stations {
        let availability = if station.free { "Available" } else { "Busy" };
        lines.push(format!("  {} | {}", station.name, availability));
    }

    lines.push("Storage:".to_string());
    for storage in &snapshot.storages {
        lines.push(format!(
            "  {} | {}/{} stored",
            storage.name,
            storage.stored.len(),
            storage.capacity
        ));
    }

    lines.join("\n")
}
