//! Proximity clustering over the deduplicated "latest" event set.

use crate::detectors::{DetectionEvent, EventType};

/// An ephemeral grouping of events whose driver positions lie within a
/// proximity distance on track. Random events (no driver) are cluster-
/// neutral and are attached to every cluster by the caller, not here.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub events: Vec<DetectionEvent>,
}

/// Cluster the given (already deduplicated) events by proximity in lap
/// progress, wrapping at the start/finish line. `distance` is the maximum
/// gap between consecutive sorted events (after unwrapping) that still
/// counts as "near".
///
/// Events with no driver (random trips) are not spatial and must be
/// excluded from the input; the caller folds them into every resulting
/// cluster separately.
pub fn cluster_by_proximity(mut events: Vec<DetectionEvent>, distance: f64) -> Vec<Cluster> {
    if events.is_empty() {
        return Vec::new();
    }

    events.sort_by(|a, b| {
        let pa = a.driver.as_ref().map(|d| d.lap_progress).unwrap_or(0.0);
        let pb = b.driver.as_ref().map(|d| d.lap_progress).unwrap_or(0.0);
        pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
    });

    // Duplicate each event at progress + 1.0 so a cluster can wrap across
    // the start/finish line; track identity (slot + type) to evaluate a
    // wrapped cluster only once.
    let mut augmented: Vec<(f64, DetectionEvent)> = Vec::with_capacity(events.len() * 2);
    for event in &events {
        let progress = event.driver.as_ref().map(|d| d.lap_progress).unwrap_or(0.0);
        augmented.push((progress, event.clone()));
        augmented.push((progress + 1.0, event.clone()));
    }
    augmented.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut current: Vec<(f64, DetectionEvent)> = Vec::new();
    let mut seen_keys: std::collections::HashSet<(Option<usize>, EventType)> =
        std::collections::HashSet::new();

    for item in augmented {
        if let Some((last_progress, _)) = current.last() {
            if item.0 - last_progress > distance {
                push_cluster(&mut clusters, &mut current, &mut seen_keys);
            }
        }
        current.push(item);
    }
    push_cluster(&mut clusters, &mut current, &mut seen_keys);

    clusters
}

fn push_cluster(
    clusters: &mut Vec<Cluster>,
    current: &mut Vec<(f64, DetectionEvent)>,
    seen_keys: &mut std::collections::HashSet<(Option<usize>, EventType)>,
) {
    if current.is_empty() {
        return;
    }
    let mut events = Vec::new();
    for (_, event) in current.drain(..) {
        if seen_keys.insert(event.key()) {
            events.push(event);
        }
    }
    if !events.is_empty() {
        clusters.push(Cluster { events });
    }
}
