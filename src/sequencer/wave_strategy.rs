//! Wave-around strategies: which lapped or out-of-position cars get waved
//! past the pace car, and in what order.

use crate::telemetry::{Driver, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveStrategy {
    LappedCars,
    AheadOfClassLead,
    Combined,
}

/// The lap-fraction distance `driver` would have to travel forward to catch
/// the pace car from behind, the order key for every wave-around/class-split
/// command. A driver just behind the pace car has a small distance; a
/// driver just ahead of it wraps to just under a full lap.
pub fn distance_behind_pace_car(pace_progress: f64, driver: &Driver) -> f64 {
    let raw = pace_progress - driver.composite_progress();
    raw.rem_euclid(1.0)
}

fn class_leader<'a>(drivers: &'a [Driver], class_id: u32) -> Option<&'a Driver> {
    drivers
        .iter()
        .filter(|d| d.class_id == class_id)
        .max_by(|a, b| {
            a.composite_progress()
                .partial_cmp(&b.composite_progress())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn lapped_cars_selection(snapshot: &Snapshot) -> Vec<usize> {
    let max_laps = snapshot.max_laps_completed();
    snapshot
        .drivers
        .iter()
        .filter(|d| {
            let laps_behind = max_laps - d.laps_completed;
            if laps_behind >= 2 {
                return true;
            }
            if laps_behind == 1 {
                if let Some(leader) = class_leader(&snapshot.drivers, d.class_id) {
                    return d.composite_progress() > leader.composite_progress()
                        || position_rank(snapshot, d) > position_rank(snapshot, leader);
                }
            }
            false
        })
        .map(|d| d.slot_index)
        .collect()
}

fn position_rank(snapshot: &Snapshot, driver: &Driver) -> usize {
    let mut ordered: Vec<&Driver> = snapshot.drivers.iter().collect();
    ordered.sort_by(|a, b| {
        b.composite_progress()
            .partial_cmp(&a.composite_progress())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ordered
        .iter()
        .position(|d| d.slot_index == driver.slot_index)
        .unwrap_or(usize::MAX)
}

fn ahead_of_class_lead_selection(snapshot: &Snapshot, pace_progress: f64) -> Vec<usize> {
    let overall_leader_distance = snapshot
        .drivers
        .iter()
        .map(|d| distance_behind_pace_car(pace_progress, d))
        .fold(f64::MAX, f64::min);

    snapshot
        .drivers
        .iter()
        .filter(|d| {
            let leader = match class_leader(&snapshot.drivers, d.class_id) {
                Some(l) => l,
                None => return false,
            };
            if leader.slot_index == d.slot_index {
                return false;
            }
            let d_dist = distance_behind_pace_car(pace_progress, d);
            let leader_dist = distance_behind_pace_car(pace_progress, leader);
            d_dist < leader_dist && d_dist > overall_leader_distance
        })
        .map(|d| d.slot_index)
        .collect()
}

/// Compute the slots to wave, already ordered by distance behind the pace
/// car (closest first), per the configured strategy.
pub fn compute_wave_order(
    snapshot: &Snapshot,
    pace_progress: f64,
    strategy: WaveStrategy,
) -> Vec<Driver> {
    let selected_slots: std::collections::HashSet<usize> = match strategy {
        WaveStrategy::LappedCars => lapped_cars_selection(snapshot).into_iter().collect(),
        WaveStrategy::AheadOfClassLead => {
            ahead_of_class_lead_selection(snapshot, pace_progress).into_iter().collect()
        }
        WaveStrategy::Combined => {
            let mut set: std::collections::HashSet<usize> =
                lapped_cars_selection(snapshot).into_iter().collect();
            set.extend(ahead_of_class_lead_selection(snapshot, pace_progress));
            set
        }
    };

    let mut selected: Vec<Driver> = snapshot
        .drivers
        .iter()
        .filter(|d| selected_slots.contains(&d.slot_index))
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        distance_behind_pace_car(pace_progress, a)
            .partial_cmp(&distance_behind_pace_car(pace_progress, b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    selected
}
