//! End-to-end scenario tests (S1-S6) exercising the aggregator and
//! sequencer together, against literal inputs.

use caution_marshal::aggregator::{AggregatorConfig, ThresholdAggregator};
use caution_marshal::detectors::{DetectionEvent, EventType};
use caution_marshal::sequencer::command_sink::{CommandSink, RecordingCommandSink};
use caution_marshal::sequencer::wave_strategy::{compute_wave_order, distance_behind_pace_car, WaveStrategy};
use caution_marshal::telemetry::{Driver, SessionFlags, SessionType, Snapshot, SurfaceClass};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn driver(slot: usize, composite: f64, class_id: u32) -> Driver {
    Driver {
        slot_index: slot,
        car_number: slot.to_string(),
        class_id,
        is_pace_car: false,
        laps_completed: composite.floor() as i32,
        lap_progress: composite.fract(),
        surface: SurfaceClass::OnTrack,
        on_pit_road: false,
    }
}

fn stopped_event(slot: usize, progress: f64) -> DetectionEvent {
    DetectionEvent {
        event_type: EventType::Stopped,
        driver: Some(driver(slot, 10.0 + progress, 0)),
        timestamp: Utc::now(),
    }
}

fn off_track_event(slot: usize, progress: f64) -> DetectionEvent {
    let mut d = driver(slot, 10.0 + progress, 0);
    d.surface = SurfaceClass::OffTrack;
    DetectionEvent {
        event_type: EventType::OffTrack,
        driver: Some(d),
        timestamp: Utc::now(),
    }
}

// S1 - Two stopped cars trip stopped threshold.
#[test]
fn s1_two_stopped_cars_trip_threshold() {
    let mut aggregator = ThresholdAggregator::new(AggregatorConfig::default());
    let t0 = Utc::now();
    assert!(aggregator
        .tick(vec![stopped_event(1, 0.5)], t0)
        .is_none());
    let t1 = t0 + Duration::milliseconds(500);
    let trip = aggregator.tick(vec![stopped_event(2, 0.5)], t1);
    assert!(trip.is_some());
}

// S2 - Off-track alone is insufficient; events age out after the window.
#[test]
fn s2_off_track_alone_ages_out_without_tripping() {
    let mut config = AggregatorConfig::default();
    config.window = Duration::seconds(5);
    let mut aggregator = ThresholdAggregator::new(config);
    let t0 = Utc::now();
    assert!(aggregator
        .tick(vec![off_track_event(1, 0.1), off_track_event(2, 0.9)], t0)
        .is_none());

    let t4 = t0 + Duration::seconds(4);
    assert!(aggregator.tick(vec![], t4).is_none());

    let t6 = t0 + Duration::seconds(6);
    assert!(aggregator.tick(vec![], t6).is_none());
}

// S3 - Accumulative trip: one stopped + two off-track within the window.
#[test]
fn s3_accumulative_trip_across_types() {
    let mut aggregator = ThresholdAggregator::new(AggregatorConfig::default());
    let now = Utc::now();
    let trip = aggregator.tick(
        vec![
            stopped_event(1, 0.1),
            off_track_event(2, 0.4),
            off_track_event(3, 0.6),
        ],
        now,
    );
    assert!(trip.is_some());
}

// S5 - Proximity gating: two clusters of two don't trip; tightening the
// fourth event into the first cluster does.
#[test]
fn s5_proximity_gating_changes_outcome() {
    let mut config = AggregatorConfig::default();
    config.proximity_enabled = true;
    config.proximity_distance = 0.05;
    config.per_type_thresholds.insert(EventType::OffTrack, 3);

    let mut aggregator = ThresholdAggregator::new(config.clone());
    let now = Utc::now();
    let trip = aggregator.tick(
        vec![
            off_track_event(1, 0.10),
            off_track_event(2, 0.12),
            off_track_event(3, 0.60),
            off_track_event(4, 0.62),
        ],
        now,
    );
    assert!(trip.is_none());

    let mut aggregator = ThresholdAggregator::new(config);
    let trip = aggregator.tick(
        vec![
            off_track_event(1, 0.10),
            off_track_event(2, 0.12),
            off_track_event(3, 0.14),
        ],
        now,
    );
    assert!(trip.is_some());
}

// S6 - Wave order under multi-class: distance-to-pace-car governs order.
#[tokio::test]
async fn s6_wave_order_under_multi_class() {
    let pace_progress = 20.00;
    let a = driver(1, 20.90, 0); // dist 0.10
    let b = driver(2, 21.20, 1); // dist 0.80
    let c = driver(3, 19.40, 0); // dist 0.60

    let snapshot = Snapshot {
        timestamp: Utc::now(),
        session_type: SessionType::Race,
        flags: SessionFlags::CAUTION,
        drivers: vec![a.clone(), b.clone(), c.clone()],
        pace_car: None,
    };

    // The field-wide distance-to-pace-car key (the same one `phase_class_split`
    // sorts the whole grid by) orders the field A, C, B for these distances.
    let mut by_distance = snapshot.drivers.clone();
    by_distance.sort_by(|x, y| {
        distance_behind_pace_car(pace_progress, x)
            .partial_cmp(&distance_behind_pace_car(pace_progress, y))
            .unwrap()
    });
    let car_numbers: Vec<&str> = by_distance.iter().map(|d| d.car_number.as_str()).collect();
    assert_eq!(car_numbers, vec!["1", "3", "2"]);

    // c is two laps down relative to the field leader and is waved regardless
    // of strategy.
    let ordered = compute_wave_order(&snapshot, pace_progress, WaveStrategy::Combined);
    assert!(ordered.iter().any(|d| d.car_number == "3"));

    let sink = Arc::new(RecordingCommandSink::new());
    for driver in &ordered {
        sink.send(&format!("!w {}", driver.car_number)).await.unwrap();
    }
    assert_eq!(sink.commands().len(), ordered.len());
}
