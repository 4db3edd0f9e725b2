// fire.rs — Deterministic weapon fire control
//
// Pure functions over (weapon spec, weapon state, stance, time, seed).
// The client predicts muzzle response with the same calls the server
// applies, seeded by the replicated per-command seed, so spread and
// view punch agree on both hosts without replicating every draw.

use crate::shared::{SharedRng, Vec3};

/// Dry-fire click cooldown; a held trigger on an empty clip re-clicks
/// at this rate.
pub const EMPTY_FIRE_COOLDOWN: f32 = 0.1;

// ============================================================
// Weapon specification (static data)
// ============================================================

/// Which inaccuracy bookkeeping a weapon runs under. Selected per
/// server, never mixed within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyModel {
    /// Inaccuracy grows as a power curve of shots fired and resets when
    /// the burst ends.
    #[default]
    Legacy,
    /// Inaccuracy degrades a fixed step per shot and recovers
    /// continuously over time.
    Alternate,
}

#[derive(Debug, Clone, Copy)]
pub struct AccuracySpec {
    /// Resting inaccuracy (spread scale at full accuracy).
    pub base: f32,
    /// Worst-case inaccuracy; both models clamp here.
    pub max: f32,
    // legacy power curve: shots^exponent / divisor + base
    pub divisor: f32,
    pub exponent: f32,
    // alternate model
    /// Added per shot fired.
    pub decay_per_shot: f32,
    /// Recovered per second of not shooting.
    pub recover_rate: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct KickSpec {
    /// Upward view punch per shot (degrees).
    pub up: f32,
    /// Lateral view punch per shot; sign alternates.
    pub lateral: f32,
    /// Shots fired before the lateral direction flips.
    pub direction_change: u32,
    /// Punch multipliers by stance.
    pub air_scale: f32,
    pub duck_scale: f32,
}

/// Spread multipliers by stance, applied on top of the accuracy value.
#[derive(Debug, Clone, Copy)]
pub struct SpreadSpec {
    pub ground: f32,
    pub air: f32,
    pub ducked: f32,
    /// Applied while moving faster than a walk.
    pub moving: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponSpec {
    pub name: &'static str,
    /// Seconds between primary shots.
    pub cycle_time: f32,
    pub clip_size: i32,
    pub range: f32,
    pub damage: i32,
    /// Rounds per burst; 0 = weapon has no burst mode.
    pub burst_rounds: u32,
    /// Seconds between burst follow-up rounds.
    pub burst_interval: f32,
    /// Cooldown after a full burst before the next trigger pull.
    pub burst_cycle_time: f32,
    pub accuracy: AccuracySpec,
    pub kick: KickSpec,
    pub spread: SpreadSpec,
    pub has_silencer: bool,
    /// Seconds the weapon is busy while the silencer is screwed
    /// on or off.
    pub silencer_time: f32,
}

impl WeaponSpec {
    pub fn has_burst_mode(&self) -> bool {
        self.burst_rounds > 0
    }
}

// ============================================================
// Weapon state (per instance, replicated)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeaponState {
    pub clip: i32,
    pub reserve: i32,
    /// Current inaccuracy value; meaning depends on the model.
    pub accuracy: f32,
    /// Consecutive shots in the current trigger burst (legacy model
    /// resets this when the trigger rests).
    pub shots_fired: u32,
    /// Alternating-kick counter, monotonically increasing.
    pub kick_counter: u32,
    pub burst_mode: bool,
    /// Follow-up rounds still owed from the last burst trigger pull.
    pub burst_left: u32,
    pub next_burst_time: f32,
    /// Absolute time the next trigger pull is accepted.
    pub next_primary: f32,
    pub last_shot_time: f32,
    pub silencer_on: bool,
}

impl WeaponState {
    pub fn for_spec(spec: &WeaponSpec) -> Self {
        Self {
            clip: spec.clip_size,
            accuracy: spec.accuracy.base,
            ..Self::default()
        }
    }
}

/// Player stance inputs to spread and kick.
#[derive(Debug, Clone, Copy, Default)]
pub struct FireStance {
    pub on_ground: bool,
    pub ducked: bool,
    pub moving: bool,
}

// ============================================================
// Fire outcome
// ============================================================

/// One discharged round, fully determined by the inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotEvent {
    /// Horizontal/vertical spread offsets to fold into the aim
    /// direction (triangular distribution, two draws per axis).
    pub spread: [f32; 2],
    /// View punch to add to the player's punch angles.
    pub punch: Vec3,
    pub silenced: bool,
    pub range: f32,
    pub damage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireResult {
    /// Round discharged.
    Shot(ShotEvent),
    /// Clip empty; the dry click was scheduled.
    Empty,
    /// Still cycling from the previous shot.
    Cooling,
}

// ============================================================
// Core fire control
// ============================================================

fn stance_spread_scale(spec: &WeaponSpec, stance: &FireStance) -> f32 {
    let mut scale = if !stance.on_ground {
        spec.spread.air
    } else if stance.ducked {
        spec.spread.ducked
    } else {
        spec.spread.ground
    };
    if stance.moving && stance.on_ground {
        scale *= spec.spread.moving;
    }
    scale
}

/// Per-shot inaccuracy update. The returned value is already clamped
/// into [base, max].
fn update_accuracy(spec: &WeaponSpec, state: &WeaponState, model: AccuracyModel) -> f32 {
    let acc = &spec.accuracy;
    match model {
        AccuracyModel::Legacy => {
            let shots = state.shots_fired as f32;
            (shots.powf(acc.exponent) / acc.divisor + acc.base).clamp(acc.base, acc.max)
        }
        AccuracyModel::Alternate => {
            (state.accuracy + acc.decay_per_shot).clamp(acc.base, acc.max)
        }
    }
}

fn kick_for_shot(spec: &WeaponSpec, state: &WeaponState, stance: &FireStance) -> Vec3 {
    let k = &spec.kick;
    let flips = if k.direction_change > 0 {
        state.kick_counter / k.direction_change
    } else {
        state.kick_counter
    };
    let side = if flips % 2 == 0 { 1.0 } else { -1.0 };

    let mut scale = 1.0;
    if !stance.on_ground {
        scale *= k.air_scale;
    }
    if stance.ducked {
        scale *= k.duck_scale;
    }
    // pitch kicks up (negative), yaw alternates
    [-k.up * scale, k.lateral * side * scale, 0.0]
}

/// Attempt a primary discharge at `time` with the replicated `seed`.
/// Mutates the weapon state exactly when a round leaves the barrel or
/// the dry click is scheduled; a cooling weapon is left untouched.
pub fn fire_weapon(
    spec: &WeaponSpec,
    state: &mut WeaponState,
    stance: &FireStance,
    model: AccuracyModel,
    time: f32,
    seed: u32,
) -> FireResult {
    if time < state.next_primary {
        return FireResult::Cooling;
    }

    if state.clip <= 0 {
        // dry click; the clip is untouched and the trigger re-arms fast
        state.next_primary = time + EMPTY_FIRE_COOLDOWN;
        state.burst_left = 0;
        return FireResult::Empty;
    }

    let event = discharge(spec, state, stance, model, time, seed);

    if state.burst_mode && spec.has_burst_mode() {
        state.burst_left = spec.burst_rounds.saturating_sub(1);
        state.next_burst_time = time + spec.burst_interval;
        state.next_primary = time + spec.burst_cycle_time;
    } else {
        state.next_primary = time + spec.cycle_time;
    }

    FireResult::Shot(event)
}

/// Burst follow-up pump, called every weapon think. Fires owed rounds
/// when their interval elapses; an emptied clip forfeits the remainder
/// of the burst.
pub fn burst_think(
    spec: &WeaponSpec,
    state: &mut WeaponState,
    stance: &FireStance,
    model: AccuracyModel,
    time: f32,
    seed: u32,
) -> Option<ShotEvent> {
    if state.burst_left == 0 || time < state.next_burst_time {
        return None;
    }
    if state.clip <= 0 {
        state.burst_left = 0;
        return None;
    }
    state.burst_left -= 1;
    state.next_burst_time = time + spec.burst_interval;
    Some(discharge(spec, state, stance, model, time, seed))
}

/// The actual round: decrement clip, update accuracy, draw spread and
/// kick. Every mutation here is shared by primary and burst rounds.
fn discharge(
    spec: &WeaponSpec,
    state: &mut WeaponState,
    stance: &FireStance,
    model: AccuracyModel,
    time: f32,
    seed: u32,
) -> ShotEvent {
    state.clip -= 1;
    state.shots_fired += 1;
    state.accuracy = update_accuracy(spec, state, model);
    state.last_shot_time = time;

    let spread_mag = state.accuracy * stance_spread_scale(spec, stance);

    // two draws per axis give the triangular falloff
    let mut rng = SharedRng::new(seed);
    let x = rng.float(-0.5, 0.5) + rng.float(-0.5, 0.5);
    let y = rng.float(-0.5, 0.5) + rng.float(-0.5, 0.5);

    let punch = kick_for_shot(spec, state, stance);
    state.kick_counter = state.kick_counter.wrapping_add(1);

    ShotEvent {
        spread: [x * spread_mag, y * spread_mag],
        punch,
        silenced: state.silencer_on,
        range: spec.range,
        damage: spec.damage,
    }
}

/// Per-tick recovery pass. Under the alternate model accuracy creeps
/// back toward base; under the legacy model a rested trigger resets
/// the shot counter.
pub fn accuracy_think(
    spec: &WeaponSpec,
    state: &mut WeaponState,
    model: AccuracyModel,
    time: f32,
    frametime: f32,
) {
    match model {
        AccuracyModel::Legacy => {
            // the burst is considered over after two idle cycles
            if state.shots_fired > 0 && time - state.last_shot_time > spec.cycle_time * 2.0 {
                state.shots_fired = 0;
                state.accuracy = spec.accuracy.base;
            }
        }
        AccuracyModel::Alternate => {
            if state.accuracy > spec.accuracy.base {
                state.accuracy = (state.accuracy - spec.accuracy.recover_rate * frametime)
                    .max(spec.accuracy.base);
            }
        }
    }
}

// ============================================================
// View punch decay
// ============================================================

/// Exponential-ish punch return: larger punches come back faster.
pub fn decay_punch_angle(punch: &mut Vec3, frametime: f32) {
    let len = crate::shared::vector_length(punch);
    if len == 0.0 {
        return;
    }
    let drop = (10.0 + len * 0.5) * frametime;
    let scale = ((len - drop).max(0.0)) / len;
    for p in punch.iter_mut() {
        *p *= scale;
    }
}

// ============================================================
// Unit tests
// ============================================================
