//! Driver records and session vocabulary shared across the tick pipeline.

use bitflags::bitflags;

/// Track-surface classification for a single car, as reported by the
/// telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    /// Car has not yet loaded into the world (pre-session, disconnected).
    NotInWorld,
    OffTrack,
    InPitStall,
    ApproachingPits,
    OnTrack,
}

impl SurfaceClass {
    pub fn is_on_pit_road(self) -> bool {
        matches!(self, SurfaceClass::InPitStall | SurfaceClass::ApproachingPits)
    }
}

/// Session type as reported by the telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    Practice,
    Qualify,
    Warmup,
    Race,
    Other,
}

bitflags! {
    /// Session flags bitset, mirroring the sim's own flag bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionFlags: u32 {
        const GREEN     = 1 << 0;
        const YELLOW    = 1 << 1;
        const RED       = 1 << 2;
        const WHITE     = 1 << 3;
        const CHECKERED = 1 << 4;
        const CAUTION   = 1 << 5;
        const CAUTION_WAVING = 1 << 6;
        const ONE_TO_GREEN = 1 << 7;
        const GREEN_HELD = 1 << 8;
    }
}

impl SessionFlags {
    pub fn is_green(self) -> bool {
        self.contains(SessionFlags::GREEN) || self.contains(SessionFlags::GREEN_HELD)
    }

    pub fn is_caution(self) -> bool {
        self.intersects(
            SessionFlags::YELLOW | SessionFlags::CAUTION | SessionFlags::CAUTION_WAVING,
        )
    }
}

/// A single driver's state for one tick, as consumed by the detection
/// pipeline. Value-typed and cheap to clone: a fresh set of these is built
/// every tick rather than mutating long-lived driver objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub slot_index: usize,
    pub car_number: String,
    pub class_id: u32,
    pub is_pace_car: bool,
    pub laps_completed: i32,
    pub lap_progress: f64,
    pub surface: SurfaceClass,
    pub on_pit_road: bool,
}

impl Driver {
    /// `laps_completed + lap_progress`, the canonical running-order key.
    pub fn composite_progress(&self) -> f64 {
        self.laps_completed as f64 + self.lap_progress
    }

    /// A driver is eligible for detection/ordering when it has loaded into
    /// the world, reports a non-negative lap progress, and is not the pace
    /// car.
    pub fn is_eligible(&self) -> bool {
        !self.is_pace_car
            && self.surface != SurfaceClass::NotInWorld
            && self.lap_progress >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_progress_adds_lap_and_fraction() {
        let d = Driver {
            slot_index: 1,
            car_number: "12".into(),
            class_id: 0,
            is_pace_car: false,
            laps_completed: 10,
            lap_progress: 0.5,
            surface: SurfaceClass::OnTrack,
            on_pit_road: false,
        };
        assert_eq!(d.composite_progress(), 10.5);
    }

    #[test]
    fn pace_car_is_never_eligible() {
        let d = Driver {
            slot_index: 0,
            car_number: "00".into(),
            class_id: 0,
            is_pace_car: true,
            laps_completed: 0,
            lap_progress: 0.0,
            surface: SurfaceClass::OnTrack,
            on_pit_road: false,
        };
        assert!(!d.is_eligible());
    }

    #[test]
    fn negative_lap_progress_is_not_eligible() {
        let d = Driver {
            slot_index: 3,
            car_number: "3".into(),
            class_id: 0,
            is_pace_car: false,
            laps_completed: 2,
            lap_progress: -1.0,
            surface: SurfaceClass::OnTrack,
            on_pit_road: false,
        };
        assert!(!d.is_eligible());
    }

    #[test]
    fn not_in_world_is_not_eligible() {
        let d = Driver {
            slot_index: 3,
            car_number: "3".into(),
            class_id: 0,
            is_pace_car: false,
            laps_completed: 2,
            lap_progress: 0.2,
            surface: SurfaceClass::NotInWorld,
            on_pit_road: false,
        };
        assert!(!d.is_eligible());
    }

    #[test]
    fn session_flags_recognize_green_held() {
        let f = SessionFlags::GREEN_HELD;
        assert!(f.is_green());
        assert!(!f.is_caution());
    }

    #[test]
    fn session_flags_recognize_caution_variants() {
        assert!(SessionFlags::YELLOW.is_caution());
        assert!(SessionFlags::CAUTION_WAVING.is_caution());
        assert!(!SessionFlags::GREEN.is_caution());
    }
}
