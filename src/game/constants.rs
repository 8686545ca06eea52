//! Default tuning values. Every value here can be overridden through
//! `crate::config`; these are only the out-of-the-box numbers.

/// Tick timing
pub mod physics {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 60.0;
}

/// Hole movement constants
pub mod movement {
    /// Top speed in world units per second
    pub const MAX_SPEED: f32 = 5.0;
    /// Velocity change per second while steering
    pub const ACCELERATION: f32 = 20.0;
    /// Velocity change per second while coasting to a stop
    pub const DECELERATION: f32 = 25.0;
    /// Facing slerp rate (fraction per second, clamped to 1 per tick)
    pub const ROTATION_SPEED: f32 = 10.0;
    /// Squared input magnitude below which input counts as "no input"
    pub const INPUT_DEADZONE_SQ: f32 = 0.0001;
    /// Squared speed below which facing is left alone
    pub const ROTATION_MIN_SPEED_SQ: f32 = 0.0001;
}

/// Hole size constants
pub mod hole {
    /// Radius every player spawns with
    pub const INITIAL_RADIUS: f32 = 1.0;
    /// Radius cap; area is clamped to PI * MAX_RADIUS^2
    pub const MAX_RADIUS: f32 = 10.0;
}

/// Game/match constants
pub mod game {
    /// Playing phase length in seconds
    pub const MATCH_DURATION: f32 = 120.0;
    /// Countdown time before match starts
    pub const COUNTDOWN: f32 = 3.0;
    /// Maximum participants per session
    pub const MAX_PLAYERS: usize = 8;
    /// Longest display name kept, in characters
    pub const MAX_NAME_LEN: usize = 16;
}

/// Consumable spawning constants
pub mod spawning {
    /// Maximum number of live consumables spawned by the scheduler
    pub const MAX_POPULATION: usize = 50;
    /// Seconds between spawn attempts
    pub const INTERVAL: f32 = 2.0;
    /// Half-size of the rectangular spawn area (x, z)
    pub const AREA_HALF_X: f32 = 20.0;
    pub const AREA_HALF_Z: f32 = 20.0;
    /// Height objects are dropped from
    pub const HEIGHT: f32 = 10.0;
    /// Entities the in-process runtime will hold before refusing spawns
    pub const RUNTIME_CAPACITY: usize = 256;
}

/// Arena bounds
pub mod arena {
    /// Half-size of the playable ground plane
    pub const HALF_X: f32 = 40.0;
    pub const HALF_Z: f32 = 40.0;
}

/// Networking constants
pub mod net {
    /// Input channel capacity between connections and the tick loop
    pub const INPUT_BUFFER_SIZE: usize = 1024;
    /// Snapshot send rate (can be lower than tick rate)
    pub const SNAPSHOT_RATE: u32 = 20;
    /// Join code length
    pub const JOIN_CODE_LEN: usize = 6;
    /// Join code alphabet: uppercase alphanumerics without I, O, 0, 1
    pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    /// Broadcast channel depth for snapshots/effects
    pub const BROADCAST_CAPACITY: usize = 1024;
}

/// Convert hole area to radius: r = sqrt(area / PI)
#[inline]
pub fn area_to_radius(area: f32) -> f32 {
    (area.max(0.0) / std::f32::consts::PI).sqrt()
}

/// Convert radius to hole area: area = PI * r^2
#[inline]
pub fn radius_to_area(radius: f32) -> f32 {
    std::f32::consts::PI * radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_radius_inverse() {
        for r in [0.5_f32, 1.0, 2.0, 4.0, 10.0] {
            assert!((area_to_radius(radius_to_area(r)) - r).abs() < 1e-5);
        }
    }

    #[test]
    fn test_negative_area_is_zero_radius() {
        assert_eq!(area_to_radius(-3.0), 0.0);
    }

    #[test]
    fn test_join_alphabet_has_no_ambiguous_chars() {
        for c in [b'I', b'O', b'0', b'1'] {
            assert!(!net::JOIN_CODE_ALPHABET.contains(&c));
        }
        assert_eq!(net::JOIN_CODE_ALPHABET.len(), 32);
    }
}
