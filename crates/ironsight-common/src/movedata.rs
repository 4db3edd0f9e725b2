// movedata.rs — Per-tick movement data record and its replication image

use serde::{Deserialize, Serialize};

use crate::shared::{angle2short, short2angle, PlayerClass, Vec3};

// ============================================================
// Movement type / flags
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoveType {
    Walk = 0,
    Ladder = 1,
    NoClip = 2,
    /// Commando sprint: direction locked, timer-bound.
    BullRush = 3,
    Dead = 4,
    Frozen = 5,
}

impl Default for MoveType {
    fn default() -> Self {
        MoveType::Walk
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MoveFlags: u16 {
        const ON_GROUND  = 1 << 0;
        /// Hull is fully swapped to the duck hull.
        const DUCKED     = 1 << 1;
        /// Mid-transition (duck or unduck ease running).
        const DUCKING    = 1 << 2;
        /// Jump button held since the last jump; debounces pogo-sticking.
        const JUMP_HELD  = 1 << 3;
        /// Anti-bunny-hop clamp disabled for this player.
        const NO_BHOP_CAP = 1 << 4;
    }
}

// ============================================================
// Speed-constraint ring
// ============================================================

/// Circular boundary the player is pushed back from. Past the inner
/// radius the speed factor ramps in proportionally to penetration depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedConstraint {
    pub center: Vec3,
    pub radius: f32,
    pub width: f32,
    pub speed_factor: f32,
}

impl SpeedConstraint {
    /// 1.0 inside the inner radius, `speed_factor` at/past the outer
    /// edge, linear in between.
    pub fn factor_at(&self, origin: &Vec3) -> f32 {
        let dx = origin[0] - self.center[0];
        let dy = origin[1] - self.center[1];
        let dist = (dx * dx + dy * dy).sqrt();
        let inner = self.radius - self.width;
        if dist <= inner {
            1.0
        } else if dist >= self.radius {
            self.speed_factor
        } else {
            let t = (dist - inner) / self.width;
            1.0 + t * (self.speed_factor - 1.0)
        }
    }
}

// ============================================================
// Per-class movement payloads (tagged union, fixed variants)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconMoveData {
    /// Spent by a wall jump; re-arms only once the player has landed.
    pub wall_jump_armed: bool,
    /// Seconds during which another wall jump is rejected outright.
    pub suppress_time: f32,
    /// Plane of the last wall jumped off; the same plane is rejected
    /// until the player lands again.
    pub last_wall_normal: Vec3,
    pub last_wall_dist: f32,
    pub has_wall_plane: bool,
    /// One extra mid-air jump per airborne stretch.
    pub double_jumped: bool,
}

impl Default for ReconMoveData {
    fn default() -> Self {
        Self {
            wall_jump_armed: true,
            suppress_time: 0.0,
            last_wall_normal: [0.0; 3],
            last_wall_dist: 0.0,
            has_wall_plane: false,
            double_jumped: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandoMoveData {
    /// Remaining rush duration; zero when not rushing.
    pub rush_time: f32,
    /// Locked movement direction while rushing.
    pub rush_dir: Vec3,
    /// Double-tap detector: window remaining since the last fresh
    /// forward press.
    pub tap_time: f32,
    pub forward_was_down: bool,
}

/// Class-specific movement state packed into the move record. Selected
/// by the `PlayerClass` discriminator; never reinterpreted by cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClassMoveData {
    None,
    Recon(ReconMoveData),
    Commando(CommandoMoveData),
}

impl Default for ClassMoveData {
    fn default() -> Self {
        ClassMoveData::None
    }
}

impl ClassMoveData {
    pub fn for_class(class: PlayerClass) -> Self {
        match class {
            PlayerClass::Recon => ClassMoveData::Recon(ReconMoveData::default()),
            PlayerClass::Commando => ClassMoveData::Commando(CommandoMoveData::default()),
            _ => ClassMoveData::None,
        }
    }
}

// ============================================================
// MoveData — the mutable per-tick record
// ============================================================

/// Everything the movement engine reads and writes for one player tick.
/// Owned exclusively by whichever host is simulating the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveData {
    pub player_class: PlayerClass,
    pub movetype: MoveType,
    pub flags: MoveFlags,

    pub origin: Vec3,
    pub velocity: Vec3,
    pub view_angles: Vec3,
    /// Written by the engine: eye position relative to origin.
    pub view_offset: Vec3,

    /// Server-enforced cap; the requested move is clamped to it.
    pub max_speed: f32,
    /// Client-requested cap (lesser of the two wins).
    pub client_max_speed: f32,
    pub gravity: f32,

    /// From the ground surface under the player this tick.
    pub surface_friction: f32,
    pub surface_jump_factor: f32,

    /// Ground entity index, -1 = airborne. Weak reference by index.
    pub ground_ent: i32,
    pub ground_normal: Vec3,

    /// 0 = dry, 1 = feet, 2 = waist, 3 = chest.
    pub water_level: i32,
    pub water_type: i32,

    pub stamina: f32,
    /// Remaining duck/unduck ease time in seconds; 0 when settled.
    pub duck_time: f32,

    pub constraint: Option<SpeedConstraint>,
    pub class_data: ClassMoveData,

    // ---- per-tick outputs ----
    /// Net upward displacement from step resolution, for camera
    /// smoothing by the presentation layer.
    pub out_step_height: f32,
    pub out_jumped: bool,
    pub out_landed: bool,
    /// Fully enclosed in solid this tick; velocity was zeroed.
    pub out_blocked: bool,
    /// Speed the wish direction was clamped to (HUD/debug).
    pub out_wish_speed: f32,
}

impl Default for MoveData {
    fn default() -> Self {
        Self {
            player_class: PlayerClass::Undecided,
            movetype: MoveType::Walk,
            flags: MoveFlags::empty(),
            origin: [0.0; 3],
            velocity: [0.0; 3],
            view_angles: [0.0; 3],
            view_offset: [0.0; 3],
            max_speed: 320.0,
            client_max_speed: 0.0,
            gravity: 800.0,
            surface_friction: 1.0,
            surface_jump_factor: 1.0,
            ground_ent: -1,
            ground_normal: [0.0, 0.0, 1.0],
            water_level: 0,
            water_type: 0,
            stamina: 0.0,
            duck_time: 0.0,
            constraint: None,
            class_data: ClassMoveData::None,
            out_step_height: 0.0,
            out_jumped: false,
            out_landed: false,
            out_blocked: false,
            out_wish_speed: 0.0,
        }
    }
}

impl MoveData {
    pub fn for_class(class: PlayerClass) -> Self {
        Self {
            player_class: class,
            class_data: ClassMoveData::for_class(class),
            ..Self::default()
        }
    }

    /// Clear the per-tick output fields at the start of a movement pass.
    pub fn clear_outputs(&mut self) {
        self.out_step_height = 0.0;
        self.out_jumped = false;
        self.out_landed = false;
        self.out_blocked = false;
        self.out_wish_speed = 0.0;
    }

    pub fn on_ground(&self) -> bool {
        self.ground_ent >= 0
    }

    pub fn ducked(&self) -> bool {
        self.flags.contains(MoveFlags::DUCKED)
    }
}

// ============================================================
// Replication image
// ============================================================

/// Origin replicates at full precision; velocity at 1/8 unit.
pub const NET_VELOCITY_EPSILON: f32 = 0.125;
/// Stamina and duck-time replicate as hundredths.
pub const NET_TIMER_EPSILON: f32 = 0.01;

/// Network-visible movement fields. Angles go as 16-bit fixed point,
/// velocity as 1/8-unit fixed point; the documented epsilons above
/// bound the round-trip error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetMoveState {
    pub player_class: PlayerClass,
    pub movetype: MoveType,
    pub flags: u16,
    pub origin: Vec3,
    pub velocity: [i32; 3],
    pub view_angles: [i16; 3],
    pub ground_ent: i32,
    pub water_level: i8,
    pub stamina: i16,
    pub duck_time: i16,
}

impl NetMoveState {
    pub fn encode(data: &MoveData) -> Self {
        Self {
            player_class: data.player_class,
            movetype: data.movetype,
            flags: data.flags.bits(),
            origin: data.origin,
            velocity: [
                (data.velocity[0] * 8.0) as i32,
                (data.velocity[1] * 8.0) as i32,
                (data.velocity[2] * 8.0) as i32,
            ],
            view_angles: [
                angle2short(data.view_angles[0]),
                angle2short(data.view_angles[1]),
                angle2short(data.view_angles[2]),
            ],
            ground_ent: data.ground_ent,
            water_level: data.water_level as i8,
            stamina: (data.stamina * 100.0) as i16,
            duck_time: (data.duck_time * 100.0) as i16,
        }
    }

    pub fn decode(&self, data: &mut MoveData) {
        data.player_class = self.player_class;
        data.movetype = self.movetype;
        data.flags = MoveFlags::from_bits_truncate(self.flags);
        data.origin = self.origin;
        for i in 0..3 {
            data.velocity[i] = self.velocity[i] as f32 * 0.125;
            data.view_angles[i] = short2angle(self.view_angles[i]);
        }
        data.ground_ent = self.ground_ent;
        data.water_level = self.water_level as i32;
        data.stamina = self.stamina as f32 * 0.01;
        data.duck_time = self.duck_time as f32 * 0.01;
    }
}

// ============================================================
// Unit tests
// ============================================================
