// w_defs.rs — Weapon definition table
//
// All per-weapon tuning lives here as data; fire-control code reads it
// and never hardcodes a number for a specific weapon.

use ironsight_common::fire::{AccuracySpec, KickSpec, SpreadSpec, WeaponSpec};

pub const WEAPON_ASSAULT_RIFLE: usize = 0;
pub const WEAPON_PISTOL: usize = 1;
pub const WEAPON_BURST_PISTOL: usize = 2;
pub const WEAPON_SMG: usize = 3;
pub const WEAPON_SNIPER: usize = 4;

static WEAPONS: [WeaponSpec; 5] = [
    WeaponSpec {
        name: "assault rifle",
        cycle_time: 0.0955,
        clip_size: 30,
        range: 8192.0,
        damage: 33,
        burst_rounds: 0,
        burst_interval: 0.0,
        burst_cycle_time: 0.0,
        accuracy: AccuracySpec {
            base: 0.22,
            max: 1.25,
            divisor: 200.0,
            exponent: 2.0,
            decay_per_shot: 0.07,
            recover_rate: 0.45,
        },
        kick: KickSpec {
            up: 1.0,
            lateral: 0.45,
            direction_change: 3,
            air_scale: 2.0,
            duck_scale: 0.55,
        },
        spread: SpreadSpec {
            ground: 1.0,
            air: 2.6,
            ducked: 0.82,
            moving: 1.7,
        },
        has_silencer: false,
        silencer_time: 0.0,
    },
    WeaponSpec {
        name: "pistol",
        cycle_time: 0.15,
        clip_size: 13,
        range: 4096.0,
        damage: 26,
        burst_rounds: 0,
        burst_interval: 0.0,
        burst_cycle_time: 0.0,
        accuracy: AccuracySpec {
            base: 0.1,
            max: 0.92,
            divisor: 70.0,
            exponent: 2.0,
            decay_per_shot: 0.12,
            recover_rate: 0.55,
        },
        kick: KickSpec {
            up: 0.8,
            lateral: 0.25,
            direction_change: 1,
            air_scale: 1.8,
            duck_scale: 0.6,
        },
        spread: SpreadSpec {
            ground: 1.0,
            air: 2.2,
            ducked: 0.85,
            moving: 1.4,
        },
        has_silencer: true,
        silencer_time: 3.0,
    },
    WeaponSpec {
        name: "burst pistol",
        cycle_time: 0.175,
        clip_size: 20,
        range: 4096.0,
        damage: 24,
        burst_rounds: 3,
        burst_interval: 0.065,
        burst_cycle_time: 0.5,
        accuracy: AccuracySpec {
            base: 0.12,
            max: 1.0,
            divisor: 90.0,
            exponent: 2.0,
            decay_per_shot: 0.1,
            recover_rate: 0.5,
        },
        kick: KickSpec {
            up: 0.7,
            lateral: 0.3,
            direction_change: 1,
            air_scale: 1.8,
            duck_scale: 0.6,
        },
        spread: SpreadSpec {
            ground: 1.0,
            air: 2.3,
            ducked: 0.85,
            moving: 1.45,
        },
        has_silencer: false,
        silencer_time: 0.0,
    },
    WeaponSpec {
        name: "smg",
        cycle_time: 0.07,
        clip_size: 25,
        range: 4096.0,
        damage: 26,
        burst_rounds: 0,
        burst_interval: 0.0,
        burst_cycle_time: 0.0,
        accuracy: AccuracySpec {
            base: 0.3,
            max: 1.4,
            divisor: 120.0,
            exponent: 1.7,
            decay_per_shot: 0.06,
            recover_rate: 0.6,
        },
        kick: KickSpec {
            up: 0.7,
            lateral: 0.35,
            direction_change: 2,
            air_scale: 1.9,
            duck_scale: 0.7,
        },
        spread: SpreadSpec {
            ground: 1.0,
            air: 2.0,
            ducked: 0.9,
            moving: 1.25,
        },
        has_silencer: true,
        silencer_time: 2.5,
    },
    WeaponSpec {
        name: "sniper rifle",
        cycle_time: 1.25,
        clip_size: 10,
        range: 16384.0,
        damage: 115,
        burst_rounds: 0,
        burst_interval: 0.0,
        burst_cycle_time: 0.0,
        accuracy: AccuracySpec {
            base: 0.025,
            max: 2.0,
            divisor: 12.0,
            exponent: 2.2,
            decay_per_shot: 0.5,
            recover_rate: 0.8,
        },
        kick: KickSpec {
            up: 4.5,
            lateral: 1.1,
            direction_change: 1,
            air_scale: 2.5,
            duck_scale: 0.5,
        },
        spread: SpreadSpec {
            ground: 1.0,
            air: 8.0,
            ducked: 0.5,
            moving: 5.0,
        },
        has_silencer: false,
        silencer_time: 0.0,
    },
];

pub fn weapon_spec(id: usize) -> Option<&'static WeaponSpec> {
    WEAPONS.get(id)
}

pub fn weapon_count() -> usize {
    WEAPONS.len()
}
