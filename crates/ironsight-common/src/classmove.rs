// classmove.rs — Per-class movement variants
//
// Each player class supplies its hull dimensions, eye offsets, and two
// hooks into the movement pipeline: a timer decay pass that runs every
// tick and a special-move pass for class abilities (recon wall/double
// jump, commando bull rush). Classes are selected by discriminator;
// the payload carrying their state is a tagged union, never a cast.

use crate::gamemove::{JUMP_HEIGHT, MoveLocal};
use crate::movedata::{ClassMoveData, CommandoMoveData, MoveData, MoveFlags, MoveType, ReconMoveData};
use crate::shared::{
    dot_product, vector_ma, vector_normalize, Buttons, MoveCommand, TraceService, Vec3,
};

// ============================================================
// Tuning
// ============================================================

// Recon wall jump
const WALL_JUMP_PUSH: f32 = 220.0;
const WALL_JUMP_HEIGHT: f32 = 45.0;
/// Cooldown between consecutive wall jumps.
const WALL_JUMP_SUPPRESS: f32 = 0.4;
/// A wall plane this close in orientation and offset to the previous
/// one counts as the same plane and is rejected until landing.
const SAME_PLANE_NORMAL_EPS: f32 = 0.99;
const SAME_PLANE_DIST_EPS: f32 = 1.0;
/// Forward probe reach beyond the hull.
const WALL_PROBE_DIST: f32 = 6.0;

// Recon double jump
const DOUBLE_JUMP_SCALE: f32 = 0.8;

// Commando bull rush
pub const BULL_RUSH_SPEED_SCALE: f32 = 2.0;
const BULL_RUSH_DURATION: f32 = 1.0;
/// Second forward tap must land within this window.
const RUSH_TAP_WINDOW: f32 = 0.3;
/// forwardmove magnitude that counts as a deliberate press.
const RUSH_TAP_THRESHOLD: f32 = 10.0;

/// A wall for wall-jump purposes: too steep to stand on.
const WALL_NORMAL_MAX_Z: f32 = 0.7;

// ============================================================
// Class trait
// ============================================================

pub trait ClassMovement: Sync {
    fn hull_mins(&self, ducked: bool) -> Vec3;
    fn hull_maxs(&self, ducked: bool) -> Vec3;
    fn view_offset(&self, ducked: bool) -> Vec3;

    /// Runs every tick before position categorize, even when idle, so
    /// ability timers keep draining.
    fn decay_timers(&self, _data: &mut MoveData, _frametime: f32) {}

    /// Class ability hook; runs after the generic jump check and before
    /// the ground/air move.
    fn special_move(
        &self,
        _data: &mut MoveData,
        _cmd: &MoveCommand,
        _local: &MoveLocal,
        _tr: &dyn TraceService,
    ) {
    }
}

/// Resolve the movement variant for a class discriminator.
pub fn class_movement(class: crate::shared::PlayerClass) -> &'static dyn ClassMovement {
    use crate::shared::PlayerClass;
    match class {
        PlayerClass::Recon => &RECON,
        PlayerClass::Commando => &COMMANDO,
        PlayerClass::Rifleman | PlayerClass::Undecided => &RIFLEMAN,
    }
}

// ============================================================
// Baseline (rifleman and undecided players)
// ============================================================

pub struct RiflemanMovement;

static RIFLEMAN: RiflemanMovement = RiflemanMovement;

impl ClassMovement for RiflemanMovement {
    fn hull_mins(&self, _ducked: bool) -> Vec3 {
        [-16.0, -16.0, 0.0]
    }

    fn hull_maxs(&self, ducked: bool) -> Vec3 {
        if ducked {
            [16.0, 16.0, 36.0]
        } else {
            [16.0, 16.0, 72.0]
        }
    }

    fn view_offset(&self, ducked: bool) -> Vec3 {
        if ducked {
            [0.0, 0.0, 28.0]
        } else {
            [0.0, 0.0, 64.0]
        }
    }
}

// ============================================================
// Recon — wall jump and double jump
// ============================================================

pub struct ReconMovement;

static RECON: ReconMovement = ReconMovement;

impl ReconMovement {
    fn recon_data(data: &mut MoveData) -> Option<&mut ReconMoveData> {
        match &mut data.class_data {
            ClassMoveData::Recon(rd) => Some(rd),
            _ => None,
        }
    }
}

impl ClassMovement for ReconMovement {
    // slimmer and lower than the baseline hull
    fn hull_mins(&self, _ducked: bool) -> Vec3 {
        [-14.0, -14.0, 0.0]
    }

    fn hull_maxs(&self, ducked: bool) -> Vec3 {
        if ducked {
            [14.0, 14.0, 34.0]
        } else {
            [14.0, 14.0, 68.0]
        }
    }

    fn view_offset(&self, ducked: bool) -> Vec3 {
        if ducked {
            [0.0, 0.0, 26.0]
        } else {
            [0.0, 0.0, 60.0]
        }
    }

    fn decay_timers(&self, data: &mut MoveData, frametime: f32) {
        let on_ground = data.flags.contains(MoveFlags::ON_GROUND);
        if let Some(rd) = Self::recon_data(data) {
            rd.suppress_time = (rd.suppress_time - frametime).max(0.0);
            if on_ground {
                // abilities re-arm only on ground contact
                rd.wall_jump_armed = true;
                rd.double_jumped = false;
                rd.has_wall_plane = false;
            }
        }
    }

    fn special_move(
        &self,
        data: &mut MoveData,
        cmd: &MoveCommand,
        local: &MoveLocal,
        tr: &dyn TraceService,
    ) {
        if !cmd.buttons.contains(Buttons::JUMP)
            || data.flags.contains(MoveFlags::JUMP_HELD)
            || data.on_ground()
            || data.water_level >= 2
            || data.movetype != MoveType::Walk
        {
            return;
        }

        let gravity = data.gravity;
        let ducked = data.ducked();
        let origin = data.origin;
        let mut velocity = data.velocity;

        let mut flat = [local.forward[0], local.forward[1], 0.0];
        if vector_normalize(&mut flat) == 0.0 {
            return;
        }

        // probe for a wall along the view direction
        let spot = vector_ma(&origin, WALL_PROBE_DIST, &flat);
        let trace = tr.trace(
            &origin,
            &self.hull_mins(ducked),
            &self.hull_maxs(ducked),
            &spot,
            crate::shared::MASK_PLAYERSOLID,
        );

        let hit_wall = trace.fraction < 1.0
            && !trace.allsolid
            && trace.plane.normal[2] < WALL_NORMAL_MAX_Z;

        let rd = match Self::recon_data(data) {
            Some(rd) => rd,
            None => return,
        };

        if hit_wall {
            if rd.suppress_time > 0.0 {
                return;
            }
            // the plane just jumped from stays rejected until landing
            if rd.has_wall_plane
                && dot_product(&trace.plane.normal, &rd.last_wall_normal) > SAME_PLANE_NORMAL_EPS
                && (trace.plane.dist - rd.last_wall_dist).abs() < SAME_PLANE_DIST_EPS
            {
                return;
            }

            // kick away from the wall and up
            velocity = vector_ma(&velocity, WALL_JUMP_PUSH, &trace.plane.normal);
            velocity[2] = (2.0 * gravity * WALL_JUMP_HEIGHT).sqrt();

            rd.suppress_time = WALL_JUMP_SUPPRESS;
            rd.last_wall_normal = trace.plane.normal;
            rd.last_wall_dist = trace.plane.dist;
            rd.has_wall_plane = true;
            // the wall jump also spends the mid-air jump
            rd.wall_jump_armed = false;
        } else {
            // no wall in reach: spend the one mid-air jump
            if rd.double_jumped || !rd.wall_jump_armed {
                return;
            }
            rd.double_jumped = true;
            velocity[2] = (2.0 * gravity * JUMP_HEIGHT).sqrt() * DOUBLE_JUMP_SCALE;
        }

        data.velocity = velocity;
        data.flags.insert(MoveFlags::JUMP_HELD);
        data.out_jumped = true;
    }
}

// ============================================================
// Commando — bull rush
// ============================================================

pub struct CommandoMovement;

static COMMANDO: CommandoMovement = CommandoMovement;

impl CommandoMovement {
    fn commando_data(data: &mut MoveData) -> Option<&mut CommandoMoveData> {
        match &mut data.class_data {
            ClassMoveData::Commando(cd) => Some(cd),
            _ => None,
        }
    }
}

impl ClassMovement for CommandoMovement {
    // broader hull than the baseline
    fn hull_mins(&self, _ducked: bool) -> Vec3 {
        [-18.0, -18.0, 0.0]
    }

    fn hull_maxs(&self, ducked: bool) -> Vec3 {
        if ducked {
            [18.0, 18.0, 38.0]
        } else {
            [18.0, 18.0, 76.0]
        }
    }

    fn view_offset(&self, ducked: bool) -> Vec3 {
        if ducked {
            [0.0, 0.0, 30.0]
        } else {
            [0.0, 0.0, 68.0]
        }
    }

    fn decay_timers(&self, data: &mut MoveData, frametime: f32) {
        let mut rush_expired = false;
        if let Some(cd) = Self::commando_data(data) {
            cd.tap_time = (cd.tap_time - frametime).max(0.0);
            if cd.rush_time > 0.0 {
                cd.rush_time -= frametime;
                if cd.rush_time <= 0.0 {
                    cd.rush_time = 0.0;
                    rush_expired = true;
                }
            }
        }
        if rush_expired && data.movetype == MoveType::BullRush {
            data.movetype = MoveType::Walk;
        }
    }

    fn special_move(
        &self,
        data: &mut MoveData,
        cmd: &MoveCommand,
        local: &MoveLocal,
        _tr: &dyn TraceService,
    ) {
        let on_ground = data.on_ground();
        let ducked = data.ducked();
        let movetype = data.movetype;

        let mut flat = [local.forward[0], local.forward[1], 0.0];
        let flat_ok = vector_normalize(&mut flat) > 0.0;

        let cd = match Self::commando_data(data) {
            Some(cd) => cd,
            None => return,
        };

        let forward_down = cmd.forwardmove > RUSH_TAP_THRESHOLD;
        let fresh_press = forward_down && !cd.forward_was_down;
        cd.forward_was_down = forward_down;

        if !fresh_press {
            return;
        }

        // second tap inside the window starts the rush
        if cd.tap_time > 0.0
            && on_ground
            && !ducked
            && movetype == MoveType::Walk
            && flat_ok
        {
            cd.tap_time = 0.0;
            cd.rush_time = BULL_RUSH_DURATION;
            cd.rush_dir = flat;
            data.movetype = MoveType::BullRush;
        } else {
            cd.tap_time = RUSH_TAP_WINDOW;
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
