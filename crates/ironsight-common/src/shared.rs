// shared.rs — Types and math shared bit-identically by client and server

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0; 3];

// Angle indices
pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

// ============================================================
// Vector math
// ============================================================

pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross_product(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn vector_scale(v: &Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// v + s * dir, the VectorMA idiom.
pub fn vector_ma(v: &Vec3, s: f32, dir: &Vec3) -> Vec3 {
    [v[0] + s * dir[0], v[1] + s * dir[1], v[2] + s * dir[2]]
}

pub fn vector_length(v: &Vec3) -> f32 {
    dot_product(v, v).sqrt()
}

/// Horizontal (xy-plane) speed.
pub fn vector_length_2d(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

/// Normalizes in place, returns the original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length > 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

/// Euler angles (degrees) to forward/right/up basis vectors.
pub fn angle_vectors(
    angles: &Vec3,
    forward: Option<&mut Vec3>,
    right: Option<&mut Vec3>,
    up: Option<&mut Vec3>,
) {
    let deg2rad = std::f32::consts::PI / 180.0;

    let angle = angles[YAW] * deg2rad;
    let sy = angle.sin();
    let cy = angle.cos();
    let angle = angles[PITCH] * deg2rad;
    let sp = angle.sin();
    let cp = angle.cos();
    let angle = angles[ROLL] * deg2rad;
    let sr = angle.sin();
    let cr = angle.cos();

    if let Some(forward) = forward {
        forward[0] = cp * cy;
        forward[1] = cp * sy;
        forward[2] = -sp;
    }
    if let Some(right) = right {
        right[0] = -sr * sp * cy + cr * sy;
        right[1] = -sr * sp * sy - cr * cy;
        right[2] = -sr * cp;
    }
    if let Some(up) = up {
        up[0] = cr * sp * cy + sr * sy;
        up[1] = cr * sp * sy - sr * cy;
        up[2] = cr * cp;
    }
}

pub fn angle_vectors_tuple(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let mut forward = [0.0; 3];
    let mut right = [0.0; 3];
    let mut up = [0.0; 3];
    angle_vectors(angles, Some(&mut forward), Some(&mut right), Some(&mut up));
    (forward, right, up)
}

/// Direction vector to Euler angles (degrees), the vectoangles idiom.
pub fn vectoangles(value: &Vec3) -> Vec3 {
    let rad2deg = 180.0 / std::f32::consts::PI;
    let mut angles = [0.0f32; 3];

    if value[0] == 0.0 && value[1] == 0.0 {
        angles[YAW] = 0.0;
        angles[PITCH] = if value[2] > 0.0 { -90.0 } else { 90.0 };
    } else {
        let mut yaw = value[1].atan2(value[0]) * rad2deg;
        if yaw < 0.0 {
            yaw += 360.0;
        }
        let forward = (value[0] * value[0] + value[1] * value[1]).sqrt();
        let mut pitch = (-value[2]).atan2(forward) * rad2deg;
        if pitch < 0.0 {
            pitch += 360.0;
        }
        angles[PITCH] = pitch;
        angles[YAW] = yaw;
    }
    angles[ROLL] = 0.0;
    angles
}

/// Normalize an angle delta into (-180, 180].
pub fn angle_diff(a: f32, b: f32) -> f32 {
    let mut d = a - b;
    while d > 180.0 {
        d -= 360.0;
    }
    while d < -180.0 {
        d += 360.0;
    }
    d
}

/// Hermite ease used for the duck/unduck view transition: 3t² − 2t³.
pub fn simple_spline(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let sq = t * t;
    3.0 * sq - 2.0 * sq * t
}

// ============================================================
// Reduced-precision network angles
// ============================================================

/// Angles replicate as 16-bit fixed point; the round trip is lossy by
/// at most `NET_ANGLE_EPSILON` degrees.
pub const NET_ANGLE_EPSILON: f32 = 360.0 / 65536.0;

pub fn angle2short(x: f32) -> i16 {
    ((x * 65536.0 / 360.0) as i32 & 65535) as i16
}

pub fn short2angle(x: i16) -> f32 {
    (x as f32) * (360.0 / 65536.0)
}

// ============================================================
// Contents / surface
// ============================================================

pub const CONTENTS_SOLID: i32 = 1;
pub const CONTENTS_WATER: i32 = 32;
pub const CONTENTS_SLIME: i32 = 16;
pub const CONTENTS_LAVA: i32 = 8;
pub const CONTENTS_LADDER: i32 = 0x8000;
pub const CONTENTS_PLAYERCLIP: i32 = 0x10000;

pub const MASK_WATER: i32 = CONTENTS_WATER | CONTENTS_SLIME | CONTENTS_LAVA;
pub const MASK_PLAYERSOLID: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP;

/// Frictionless surface; ground friction is skipped on it.
pub const SURF_SLICK: u32 = 0x0002;
/// Walkable regardless of slope (displacement surfaces).
pub const SURF_WALKABLE: u32 = 0x0004;

/// Material-derived movement properties carried on a trace result.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceProps {
    pub flags: u32,
    /// Multiplies ground friction and acceleration.
    pub friction: f32,
    /// Multiplies jump launch velocity.
    pub jump_factor: f32,
}

impl Default for SurfaceProps {
    fn default() -> Self {
        Self {
            flags: 0,
            friction: 1.0,
            jump_factor: 1.0,
        }
    }
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TracePlane {
    pub normal: Vec3,
    pub dist: f32,
}

#[derive(Debug, Clone)]
pub struct TraceResult {
    pub allsolid: bool,
    pub startsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: TracePlane,
    pub surface: SurfaceProps,
    pub contents: i32,
    /// Entity index hit, -1 = none.
    pub ent: i32,
}

impl Default for TraceResult {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: TracePlane::default(),
            surface: SurfaceProps::default(),
            contents: 0,
            ent: -1,
        }
    }
}

/// Collision query seam supplied by the engine host. Must be side-effect
/// free: movement code calls it many times per tick and replays it
/// during client-side prediction.
pub trait TraceService {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3, mask: i32) -> TraceResult;
    fn point_contents(&self, point: &Vec3) -> i32;
}

// ============================================================
// Buttons / input command
// ============================================================

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u16 {
        const ATTACK  = 1 << 0;
        const JUMP    = 1 << 1;
        const DUCK    = 1 << 2;
        const ATTACK2 = 1 << 3;
        const USE     = 1 << 4;
        const SPEED   = 1 << 5; // walk modifier
        const RELOAD  = 1 << 6;
    }
}

/// One tick's worth of player input. Movement code never mutates the
/// command it is handed; it adjusts a private copy (e.g. zeroing moves
/// while frozen).
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveCommand {
    /// Simulation slice in milliseconds.
    pub msec: u8,
    pub buttons: Buttons,
    pub viewangles: Vec3,
    pub forwardmove: f32,
    pub sidemove: f32,
    pub upmove: f32,
    /// Per-shot shared seed, replicated so both hosts draw identical
    /// weapon spread.
    pub random_seed: u32,
}

impl MoveCommand {
    pub fn frametime(&self) -> f32 {
        self.msec as f32 * 0.001
    }
}

// ============================================================
// Player class discriminator
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum PlayerClass {
    /// Safe default for an out-of-range discriminator off the wire.
    Undecided = 0,
    Rifleman = 1,
    Recon = 2,
    Commando = 3,
}

impl PlayerClass {
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => PlayerClass::Rifleman,
            2 => PlayerClass::Recon,
            3 => PlayerClass::Commando,
            _ => {
                debug_assert!(id == 0, "unknown player class id {id}");
                PlayerClass::Undecided
            }
        }
    }
}

impl Default for PlayerClass {
    fn default() -> Self {
        PlayerClass::Undecided
    }
}

// ============================================================
// Shared predicted random stream
// ============================================================

/// Deterministic random stream seeded from the replicated per-shot
/// seed. Client and server construct it from the same integer and draw
/// in the same order, so spread and kick agree without a synchronized
/// RNG stream.
pub struct SharedRng(ChaCha8Rng);

impl SharedRng {
    pub fn new(seed: u32) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed as u64))
    }

    pub fn float(&mut self, lo: f32, hi: f32) -> f32 {
        debug_assert!(lo <= hi);
        lo + (hi - lo) * self.0.gen::<f32>()
    }

    pub fn int(&mut self, lo: i32, hi: i32) -> i32 {
        debug_assert!(lo <= hi);
        self.0.gen_range(lo..=hi)
    }
}

// ============================================================
// Unit tests
// ============================================================
