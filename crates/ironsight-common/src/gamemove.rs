// gamemove.rs — Player movement engine
//
// Runs on both hosts: the client predicts with it, the server applies
// it authoritatively. Identical (MoveData, MoveCommand, trace service)
// inputs must produce bit-identical results, so nothing in here may
// consult wall-clock time or unseeded randomness.

use crate::classmove::{self, ClassMovement};
use crate::movedata::{ClassMoveData, MoveData, MoveFlags, MoveType};
use crate::shared::{
    angle_vectors, cross_product, dot_product, simple_spline, vector_length, vector_length_2d,
    vector_ma, vector_normalize, vector_scale, Buttons, MoveCommand, SurfaceProps,
    TraceResult, TraceService, Vec3, CONTENTS_LADDER, CONTENTS_SLIME, CONTENTS_WATER,
    MASK_PLAYERSOLID, MASK_WATER, PITCH, SURF_SLICK, SURF_WALKABLE, VEC3_ORIGIN,
};

// ============================================================
// Constants
// ============================================================

pub const STEPSIZE: f32 = 18.0;
pub const STOP_EPSILON: f32 = 0.1;
/// Minimum plane-normal z for a surface to count as floor.
pub const MIN_STEP_NORMAL: f32 = 0.7;
pub const MAX_CLIP_PLANES: usize = 5;
const NUM_BUMPS: usize = 4;

// Movement parameters
pub const MV_STOPSPEED: f32 = 100.0;
pub const MV_ACCELERATE: f32 = 10.0;
pub const MV_AIRACCELERATE: f32 = 10.0;
pub const MV_WATERACCELERATE: f32 = 10.0;
pub const MV_FRICTION: f32 = 4.0;
pub const MV_WATERFRICTION: f32 = 1.0;

// Speed crops (fractions of max speed)
pub const SPEED_CROP_WALK: f32 = 0.52;
pub const SPEED_CROP_DUCK: f32 = 0.333;
pub const SPEED_CROP_USE: f32 = 0.3;
/// Floor of the cosine backward-movement penalty.
pub const SPEED_CROP_BACK: f32 = 0.6;

// Jumping
/// Fall-equivalent height the jump launch velocity is derived from:
/// v = sqrt(2 * gravity * JUMP_HEIGHT).
pub const JUMP_HEIGHT: f32 = 57.0;
/// Ducked jumps get a flat launch velocity instead of an additive one.
pub const JUMP_HEIGHT_DUCKED: f32 = 57.0;
/// Horizontal speed after a jump is rescaled down to this multiple of
/// max speed unless the cap is disabled.
pub const BHOP_MAX_SPEED_FACTOR: f32 = 1.1;

// Stamina
pub const STAMINA_MAX: f32 = 100.0;
pub const STAMINA_JUMP_COST: f32 = 25.0;
pub const STAMINA_RECOVER_RATE: f32 = 19.0;

// Ducking
pub const TIME_TO_DUCK: f32 = 0.4;
pub const TIME_TO_UNDUCK: f32 = 0.2;

// Ladders
const LADDER_SPEED: f32 = 200.0;
const LADDER_LATERAL_LIMIT: f32 = 25.0;

// Water
const WATER_SINK_SPEED: f32 = 60.0;
const WATER_JUMP_WATER: f32 = 100.0;
const WATER_JUMP_SLIME: f32 = 80.0;
const WATER_JUMP_OTHER: f32 = 50.0;

/// Falling faster than this can't be grounded (matches the categorize
/// shortcut in the original engine).
const GROUND_DETACH_SPEED: f32 = 180.0;

// ============================================================
// Per-move local state — zeroed before each pass
// ============================================================

/// Scratch state for one movement pass. Exposed so the per-class hooks
/// can see the view basis and frametime without re-deriving them.
#[derive(Clone)]
pub struct MoveLocal {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub frametime: f32,
    pub ground_surface: SurfaceProps,
    pub on_ladder: bool,
}

impl Default for MoveLocal {
    fn default() -> Self {
        Self {
            forward: [0.0; 3],
            right: [0.0; 3],
            up: [0.0; 3],
            frametime: 0.0,
            ground_surface: SurfaceProps::default(),
            on_ladder: false,
        }
    }
}

// ============================================================
// Velocity clipping
// ============================================================

/// Slide off of an impacting surface.
pub fn clip_velocity(inv: &Vec3, normal: &Vec3, out: &mut Vec3, overbounce: f32) {
    let backoff = dot_product(inv, normal) * overbounce;
    for i in 0..3 {
        let change = normal[i] * backoff;
        out[i] = inv[i] - change;
        if out[i] > -STOP_EPSILON && out[i] < STOP_EPSILON {
            out[i] = 0.0;
        }
    }
}

// ============================================================
// Movement context — holds all state for one player_move() call
// ============================================================

struct GameMovement<'a, T: TraceService> {
    data: &'a mut MoveData,
    /// Private copy; the caller's command is never mutated.
    cmd: MoveCommand,
    local: MoveLocal,
    class: &'static dyn ClassMovement,
    tr: &'a T,
}

impl<'a, T: TraceService> GameMovement<'a, T> {
    fn hull_mins(&self) -> Vec3 {
        self.class.hull_mins(self.data.ducked())
    }

    fn hull_maxs(&self) -> Vec3 {
        self.class.hull_maxs(self.data.ducked())
    }

    fn trace_hull(&self, start: &Vec3, end: &Vec3) -> TraceResult {
        self.tr
            .trace(start, &self.hull_mins(), &self.hull_maxs(), end, MASK_PLAYERSOLID)
    }

    // --------------------------------------------------------
    // Position categorize
    // --------------------------------------------------------
    fn categorize_position(&mut self) {
        let mut point = self.data.origin;
        point[2] -= 2.0;

        let was_on_ground = self.data.flags.contains(MoveFlags::ON_GROUND);

        if self.data.velocity[2] > GROUND_DETACH_SPEED {
            self.data.ground_ent = -1;
            self.data.flags.remove(MoveFlags::ON_GROUND);
        } else {
            let trace = self.trace_hull(&self.data.origin, &point);
            let walkable = trace.plane.normal[2] >= MIN_STEP_NORMAL
                || (trace.surface.flags & SURF_WALKABLE) != 0;

            if trace.ent < 0 || (!walkable && !trace.startsolid) {
                self.data.ground_ent = -1;
                self.data.flags.remove(MoveFlags::ON_GROUND);
            } else {
                self.data.ground_ent = trace.ent;
                self.data.ground_normal = trace.plane.normal;
                self.data.surface_friction = trace.surface.friction;
                self.data.surface_jump_factor = trace.surface.jump_factor;
                self.local.ground_surface = trace.surface;

                if !was_on_ground {
                    self.data.flags.insert(MoveFlags::ON_GROUND);
                    self.data.out_landed = true;
                }
            }
        }

        // water level at feet / waist / chest
        self.data.water_level = 0;
        self.data.water_type = 0;

        let mins = self.hull_mins();
        let maxs = self.hull_maxs();
        let waist = (maxs[2] - mins[2]) * 0.5;
        let chest = self.data.view_offset[2].max(waist + 1.0);

        let mut point = [
            self.data.origin[0],
            self.data.origin[1],
            self.data.origin[2] + mins[2] + 1.0,
        ];
        let cont = self.tr.point_contents(&point);
        if (cont & MASK_WATER) != 0 {
            self.data.water_type = cont;
            self.data.water_level = 1;
            point[2] = self.data.origin[2] + waist;
            if (self.tr.point_contents(&point) & MASK_WATER) != 0 {
                self.data.water_level = 2;
                point[2] = self.data.origin[2] + chest;
                if (self.tr.point_contents(&point) & MASK_WATER) != 0 {
                    self.data.water_level = 3;
                }
            }
        }
    }

    // --------------------------------------------------------
    // Speed setup
    // --------------------------------------------------------

    /// Effective max speed after server clamp, crops, and the
    /// constraint ring.
    fn compute_max_speed(&self) -> f32 {
        let mut max = self.data.max_speed;
        if self.data.client_max_speed > 0.0 {
            max = max.min(self.data.client_max_speed);
        }

        if self.cmd.buttons.contains(Buttons::SPEED) {
            max *= SPEED_CROP_WALK;
        }
        if self.cmd.buttons.contains(Buttons::USE) {
            max *= SPEED_CROP_USE;
        }
        if self.data.ducked() {
            max *= SPEED_CROP_DUCK;
        }

        if let Some(c) = &self.data.constraint {
            max *= c.factor_at(&self.data.origin);
        }

        max
    }

    /// Cosine penalty for moving backward relative to view: full
    /// backward movement is cropped to SPEED_CROP_BACK of max speed,
    /// scaling smoothly with the angle.
    fn backward_speed_factor(&self, wishdir: &Vec3) -> f32 {
        let mut flat = [self.local.forward[0], self.local.forward[1], 0.0];
        if vector_normalize(&mut flat) == 0.0 {
            return 1.0;
        }
        let cos = wishdir[0] * flat[0] + wishdir[1] * flat[1];
        if cos >= 0.0 {
            1.0
        } else {
            1.0 + cos * (1.0 - SPEED_CROP_BACK)
        }
    }

    // --------------------------------------------------------
    // Ducking
    // --------------------------------------------------------
    fn duck(&mut self) {
        let duck_down = self.cmd.buttons.contains(Buttons::DUCK);
        let ducked = self.data.flags.contains(MoveFlags::DUCKED);
        let ducking = self.data.flags.contains(MoveFlags::DUCKING);

        if duck_down {
            if !ducked && !ducking {
                // edge: start the duck ease
                self.data.flags.insert(MoveFlags::DUCKING);
                self.data.duck_time = TIME_TO_DUCK;
            }
            if self.data.flags.contains(MoveFlags::DUCKING) && !ducked {
                self.data.duck_time -= self.local.frametime;
                if self.data.duck_time <= 0.0 {
                    self.finish_duck();
                }
            }
        } else if ducked || ducking {
            self.try_unduck();
        }

        self.update_view_offset();
    }

    fn finish_duck(&mut self) {
        self.data.duck_time = 0.0;
        self.data.flags.remove(MoveFlags::DUCKING);
        self.data.flags.insert(MoveFlags::DUCKED);

        // hull swap: verify the duck hull fits, else roll back
        let trace = self.trace_hull(&self.data.origin, &self.data.origin);
        if trace.allsolid {
            self.data.flags.remove(MoveFlags::DUCKED);
        }
    }

    fn try_unduck(&mut self) {
        if self.data.flags.contains(MoveFlags::DUCKED) {
            // stuck check against the standing hull
            let mins = self.class.hull_mins(false);
            let maxs = self.class.hull_maxs(false);
            let trace =
                self.tr
                    .trace(&self.data.origin, &mins, &maxs, &self.data.origin, MASK_PLAYERSOLID);
            if trace.allsolid {
                // blocked: stay ducked with the previous hull
                self.data.flags.remove(MoveFlags::DUCKING);
                self.data.duck_time = 0.0;
                return;
            }
            self.data.flags.remove(MoveFlags::DUCKED);
            self.data.flags.insert(MoveFlags::DUCKING);
            self.data.duck_time = TIME_TO_UNDUCK;
        }

        if self.data.flags.contains(MoveFlags::DUCKING) {
            self.data.duck_time -= self.local.frametime;
            if self.data.duck_time <= 0.0 {
                self.data.duck_time = 0.0;
                self.data.flags.remove(MoveFlags::DUCKING);
            }
        }
    }

    /// Eye offset, spline-eased during duck/unduck transitions.
    fn update_view_offset(&mut self) {
        let stand = self.class.view_offset(false);
        let duck = self.class.view_offset(true);
        let ducked = self.data.flags.contains(MoveFlags::DUCKED);
        let ducking = self.data.flags.contains(MoveFlags::DUCKING);

        self.data.view_offset = if ducking {
            let (from, to, total) = if ducked {
                // mid-transition after a completed hull swap: easing down
                (stand, duck, TIME_TO_DUCK)
            } else if self.data.duck_time > 0.0 && self.cmd.buttons.contains(Buttons::DUCK) {
                (stand, duck, TIME_TO_DUCK)
            } else {
                (duck, stand, TIME_TO_UNDUCK)
            };
            let t = simple_spline(1.0 - (self.data.duck_time / total).clamp(0.0, 1.0));
            [
                from[0] + (to[0] - from[0]) * t,
                from[1] + (to[1] - from[1]) * t,
                from[2] + (to[2] - from[2]) * t,
            ]
        } else if ducked {
            duck
        } else {
            stand
        };
    }

    // --------------------------------------------------------
    // Ladders
    // --------------------------------------------------------

    /// Forward probe for a climbable surface. Floor-like planes never
    /// qualify.
    fn check_ladder(&mut self) {
        self.local.on_ladder = false;
        if self.data.movetype == MoveType::Dead {
            return;
        }

        let mut flat = [self.local.forward[0], self.local.forward[1], 0.0];
        vector_normalize(&mut flat);
        let spot = vector_ma(&self.data.origin, 2.0, &flat);
        let trace = self.trace_hull(&self.data.origin, &spot);

        if trace.fraction < 1.0
            && (trace.contents & CONTENTS_LADDER) != 0
            && trace.plane.normal[2] < MIN_STEP_NORMAL
        {
            self.local.on_ladder = true;
            if self.data.movetype == MoveType::Walk {
                self.data.movetype = MoveType::Ladder;
            }
        } else if self.data.movetype == MoveType::Ladder {
            // grip trace failed this tick: back to walking
            self.data.movetype = MoveType::Walk;
        }
    }

    fn ladder_move(&mut self) {
        let fm = self.cmd.forwardmove;
        let sm = self.cmd.sidemove;

        let mut wishvel = [0.0f32; 3];
        for i in 0..3 {
            wishvel[i] = self.local.forward[i] * fm + self.local.right[i] * sm;
        }

        // climb along the ladder: looking up/down steers vertically
        if self.cmd.viewangles[PITCH] <= -15.0 && fm > 0.0 {
            wishvel[2] = LADDER_SPEED;
        } else if self.cmd.viewangles[PITCH] >= 15.0 && fm > 0.0 {
            wishvel[2] = -LADDER_SPEED;
        } else if self.cmd.upmove > 0.0 {
            wishvel[2] = LADDER_SPEED;
        } else if self.cmd.upmove < 0.0 {
            wishvel[2] = -LADDER_SPEED;
        } else {
            wishvel[2] = 0.0;
        }
        wishvel[0] = wishvel[0].clamp(-LADDER_LATERAL_LIMIT, LADDER_LATERAL_LIMIT);
        wishvel[1] = wishvel[1].clamp(-LADDER_LATERAL_LIMIT, LADDER_LATERAL_LIMIT);

        let mut wishdir = wishvel;
        let wishspeed = vector_normalize(&mut wishdir).min(self.compute_max_speed());

        self.friction();
        self.accelerate(&wishdir, wishspeed, MV_ACCELERATE);
        self.try_player_move();
    }

    // --------------------------------------------------------
    // Friction / acceleration
    // --------------------------------------------------------
    fn friction(&mut self) {
        let vel = self.data.velocity;
        let speed = vector_length(&vel);
        if speed < 0.1 {
            return;
        }

        let mut drop = 0.0f32;

        let slick = (self.local.ground_surface.flags & SURF_SLICK) != 0;
        if (self.data.on_ground() && !slick) || self.local.on_ladder {
            let control = if speed < MV_STOPSPEED { MV_STOPSPEED } else { speed };
            drop += control * MV_FRICTION * self.data.surface_friction * self.local.frametime;
        }

        if self.data.water_level != 0 && !self.local.on_ladder {
            drop += speed
                * MV_WATERFRICTION
                * self.data.water_level as f32
                * self.local.frametime;
        }

        let mut newspeed = speed - drop;
        if newspeed < 0.0 {
            newspeed = 0.0;
        }
        newspeed /= speed;

        self.data.velocity = vector_scale(&self.data.velocity, newspeed);
    }

    /// Clamped-impulse ground acceleration toward the wish direction.
    fn accelerate(&mut self, wishdir: &Vec3, wishspeed: f32, accel: f32) {
        let currentspeed = dot_product(&self.data.velocity, wishdir);
        let addspeed = wishspeed - currentspeed;
        if addspeed <= 0.0 {
            return;
        }
        let mut accelspeed =
            accel * self.local.frametime * wishspeed * self.data.surface_friction;
        if accelspeed > addspeed {
            accelspeed = addspeed;
        }
        for i in 0..3 {
            self.data.velocity[i] += accelspeed * wishdir[i];
        }
    }

    /// Weaker airborne variant: the projected wish speed is capped low
    /// so air control stays limited.
    fn air_accelerate(&mut self, wishdir: &Vec3, wishspeed: f32, accel: f32) {
        let wishspd = if wishspeed > 30.0 { 30.0 } else { wishspeed };
        let currentspeed = dot_product(&self.data.velocity, wishdir);
        let addspeed = wishspd - currentspeed;
        if addspeed <= 0.0 {
            return;
        }
        let mut accelspeed = accel * wishspeed * self.local.frametime;
        if accelspeed > addspeed {
            accelspeed = addspeed;
        }
        for i in 0..3 {
            self.data.velocity[i] += accelspeed * wishdir[i];
        }
    }

    // --------------------------------------------------------
    // Collision-swept move
    // --------------------------------------------------------

    /// Sweep the remaining displacement up to NUM_BUMPS times, clipping
    /// velocity against every touched plane; slide along a single
    /// plane, along the crease of two, and stop dead otherwise.
    fn try_player_move(&mut self) {
        let primal_velocity = self.data.velocity;
        let mut planes = [[0.0f32; 3]; MAX_CLIP_PLANES];
        let mut numplanes: usize = 0;
        let mut time_left = self.local.frametime;

        for _bump in 0..NUM_BUMPS {
            if self.data.velocity == VEC3_ORIGIN {
                break;
            }

            let end = vector_ma(&self.data.origin, time_left, &self.data.velocity);
            let trace = self.trace_hull(&self.data.origin, &end);

            if trace.allsolid {
                // fully enclosed in solid: zero velocity, report blocked
                self.data.velocity[2] = 0.0;
                self.data.out_blocked = true;
                return;
            }

            if trace.fraction > 0.0 {
                self.data.origin = trace.endpos;
                numplanes = 0;
            }

            if trace.fraction == 1.0 {
                break;
            }

            time_left -= time_left * trace.fraction;

            if numplanes >= MAX_CLIP_PLANES {
                self.data.velocity = VEC3_ORIGIN;
                break;
            }
            planes[numplanes] = trace.plane.normal;
            numplanes += 1;

            // clip velocity to parallel all touched planes
            let mut found = false;
            for i in 0..numplanes {
                let inv = self.data.velocity;
                clip_velocity(&inv, &planes[i], &mut self.data.velocity, 1.01);
                let mut ok = true;
                for j in 0..numplanes {
                    if j != i && dot_product(&self.data.velocity, &planes[j]) < 0.0 {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    found = true;
                    break;
                }
            }

            if !found {
                // two conflicting planes: slide along their crease
                if numplanes != 2 {
                    self.data.velocity = VEC3_ORIGIN;
                    break;
                }
                let dir = cross_product(&planes[0], &planes[1]);
                let d = dot_product(&dir, &self.data.velocity);
                self.data.velocity = vector_scale(&dir, d);
            }

            // corner jitter guard: stop dead when the clipped velocity
            // turns against the original
            if dot_product(&self.data.velocity, &primal_velocity) <= 0.0 {
                self.data.velocity = VEC3_ORIGIN;
                break;
            }
        }
    }

    /// Bounded "movement stack": try the direct slide and the
    /// step-up/slide/step-down variant, keep whichever travels farther.
    fn step_move(&mut self) {
        let start_o = self.data.origin;
        let start_v = self.data.velocity;

        self.try_player_move();

        let down_o = self.data.origin;
        let down_v = self.data.velocity;

        let mut up = start_o;
        up[2] += STEPSIZE;

        let trace = self.trace_hull(&start_o, &up);
        if trace.allsolid {
            return; // can't step up
        }

        self.data.origin = trace.endpos;
        self.data.velocity = start_v;

        self.try_player_move();

        // push back down the step
        let mut down = self.data.origin;
        down[2] -= STEPSIZE;
        let trace = self.trace_hull(&self.data.origin, &down);
        if !trace.allsolid {
            self.data.origin = trace.endpos;
        }

        let up_o = self.data.origin;

        // squared planar distance decides the winner
        let down_dist = (down_o[0] - start_o[0]) * (down_o[0] - start_o[0])
            + (down_o[1] - start_o[1]) * (down_o[1] - start_o[1]);
        let up_dist = (up_o[0] - start_o[0]) * (up_o[0] - start_o[0])
            + (up_o[1] - start_o[1]) * (up_o[1] - start_o[1]);

        if down_dist > up_dist || trace.plane.normal[2] < MIN_STEP_NORMAL {
            self.data.origin = down_o;
            self.data.velocity = down_v;
            return;
        }
        // stepping kept: preserve the slide-path z velocity and record
        // the rise for camera smoothing
        self.data.velocity[2] = down_v[2];
        let rise = self.data.origin[2] - start_o[2];
        if rise > 0.0 {
            self.data.out_step_height = rise;
        }
    }

    // --------------------------------------------------------
    // Jumping
    // --------------------------------------------------------
    fn check_jump(&mut self) {
        if !self.cmd.buttons.contains(Buttons::JUMP) {
            self.data.flags.remove(MoveFlags::JUMP_HELD);
            return;
        }

        // one jump per press: wait for release
        if self.data.flags.contains(MoveFlags::JUMP_HELD) {
            return;
        }

        if self.data.movetype == MoveType::Dead {
            return;
        }

        if self.data.water_level >= 2 {
            // swimming: buoyant kick instead of a jump
            self.data.ground_ent = -1;
            self.data.flags.remove(MoveFlags::ON_GROUND);
            self.data.velocity[2] = if self.data.water_type == CONTENTS_WATER {
                WATER_JUMP_WATER
            } else if self.data.water_type == CONTENTS_SLIME {
                WATER_JUMP_SLIME
            } else {
                WATER_JUMP_OTHER
            };
            return;
        }

        if !self.data.on_ground() {
            return;
        }

        self.data.flags.insert(MoveFlags::JUMP_HELD);
        self.data.ground_ent = -1;
        self.data.flags.remove(MoveFlags::ON_GROUND);

        // launch velocity from the fall-equivalent height, scaled by
        // the surface jump factor and the stamina ratio
        let stamina_ratio =
            ((STAMINA_MAX - self.data.stamina) / STAMINA_MAX).clamp(0.0, 1.0);

        if self.data.ducked() {
            let v = (2.0 * self.data.gravity * JUMP_HEIGHT_DUCKED).sqrt();
            self.data.velocity[2] = v * self.data.surface_jump_factor * stamina_ratio;
        } else {
            let v = (2.0 * self.data.gravity * JUMP_HEIGHT).sqrt();
            self.data.velocity[2] += v * self.data.surface_jump_factor * stamina_ratio;
        }

        self.data.stamina = (self.data.stamina + STAMINA_JUMP_COST).min(STAMINA_MAX);
        self.prevent_mega_bunny_jumping();
        self.data.out_jumped = true;
    }

    /// Server-authoritative anti-bunny-hop: rescale horizontal speed
    /// down to BHOP_MAX_SPEED_FACTOR × max speed, preserving direction.
    fn prevent_mega_bunny_jumping(&mut self) {
        if self.data.flags.contains(MoveFlags::NO_BHOP_CAP) {
            return;
        }
        let maxscaled = BHOP_MAX_SPEED_FACTOR * self.data.max_speed;
        if maxscaled <= 0.0 {
            return;
        }
        let spd = vector_length_2d(&self.data.velocity);
        if spd > maxscaled {
            let fraction = maxscaled / spd;
            self.data.velocity[0] *= fraction;
            self.data.velocity[1] *= fraction;
        }
    }

    // --------------------------------------------------------
    // Water movement
    // --------------------------------------------------------
    fn water_move(&mut self) {
        let fm = self.cmd.forwardmove;
        let sm = self.cmd.sidemove;

        let mut wishvel = [0.0f32; 3];
        for i in 0..3 {
            wishvel[i] = self.local.forward[i] * fm + self.local.right[i] * sm;
        }

        if fm == 0.0 && sm == 0.0 && self.cmd.upmove == 0.0 {
            wishvel[2] -= WATER_SINK_SPEED; // drift towards the bottom
        } else {
            wishvel[2] += self.cmd.upmove;
        }

        let max = self.compute_max_speed();
        let mut wishdir = wishvel;
        let mut wishspeed = vector_normalize(&mut wishdir);
        if wishspeed > max {
            wishspeed = max;
        }
        wishspeed *= 0.5;
        self.data.out_wish_speed = wishspeed;

        self.friction();
        self.accelerate(&wishdir, wishspeed, MV_WATERACCELERATE);
        self.try_player_move();
    }

    // --------------------------------------------------------
    // Ground / air movement
    // --------------------------------------------------------
    fn walk_move(&mut self) {
        let (fm, sm) = if self.data.movetype == MoveType::BullRush {
            // direction is locked; the class hook owns steering
            (0.0, 0.0)
        } else {
            (self.cmd.forwardmove, self.cmd.sidemove)
        };

        let mut wishvel = [0.0f32; 3];
        for i in 0..2 {
            wishvel[i] = self.local.forward[i] * fm + self.local.right[i] * sm;
        }
        wishvel[2] = 0.0;

        if self.data.movetype == MoveType::BullRush {
            if let ClassMoveData::Commando(cd) = &self.data.class_data {
                wishvel = vector_scale(&cd.rush_dir, self.data.max_speed);
            }
        }

        let mut wishdir = wishvel;
        let mut wishspeed = vector_normalize(&mut wishdir);

        let mut max = self.compute_max_speed();
        if self.data.movetype == MoveType::BullRush {
            // the rush drives at full scaled speed regardless of the
            // requested move magnitude
            max *= classmove::BULL_RUSH_SPEED_SCALE;
            wishspeed = max;
        } else {
            max *= self.backward_speed_factor(&wishdir);
        }

        if wishspeed > max {
            wishspeed = max;
        }
        self.data.out_wish_speed = wishspeed;

        if self.data.on_ground() {
            // ground: kill vertical velocity, apply friction, accelerate
            self.data.velocity[2] = 0.0;
            self.friction();
            self.accelerate(&wishdir, wishspeed, MV_ACCELERATE);
            self.data.velocity[2] = 0.0;

            if self.data.velocity[0] == 0.0 && self.data.velocity[1] == 0.0 {
                return;
            }
            self.step_move();
        } else {
            // air: weaker control, gravity, no ground friction
            self.air_accelerate(&wishdir, wishspeed, MV_AIRACCELERATE);
            self.data.velocity[2] -= self.data.gravity * self.local.frametime;
            self.try_player_move();
        }
    }

    // --------------------------------------------------------
    // NoClip
    // --------------------------------------------------------
    fn noclip_move(&mut self) {
        // extra friction, no collision
        let speed = vector_length(&self.data.velocity);
        if speed < 1.0 {
            self.data.velocity = VEC3_ORIGIN;
        } else {
            let control = if speed < MV_STOPSPEED { MV_STOPSPEED } else { speed };
            let drop = control * MV_FRICTION * 1.5 * self.local.frametime;
            let newspeed = ((speed - drop).max(0.0)) / speed;
            self.data.velocity = vector_scale(&self.data.velocity, newspeed);
        }

        let fm = self.cmd.forwardmove;
        let sm = self.cmd.sidemove;
        let mut wishvel = [0.0f32; 3];
        for i in 0..3 {
            wishvel[i] = self.local.forward[i] * fm + self.local.right[i] * sm;
        }
        wishvel[2] += self.cmd.upmove;

        let mut wishdir = wishvel;
        let wishspeed = vector_normalize(&mut wishdir).min(self.compute_max_speed());

        self.accelerate(&wishdir, wishspeed, MV_ACCELERATE);
        self.data.origin =
            vector_ma(&self.data.origin, self.local.frametime, &self.data.velocity);
    }

    // --------------------------------------------------------
    // Stuck check
    // --------------------------------------------------------

    /// Fully enclosed in solid: zero velocity and report the tick
    /// blocked. Unsticking is a separate routine run before movement by
    /// the host; no recovery is attempted here.
    fn check_stuck(&mut self) -> bool {
        let trace = self.trace_hull(&self.data.origin, &self.data.origin);
        if trace.allsolid {
            log::debug!("player stuck in solid at {:?}", self.data.origin);
            self.data.velocity = VEC3_ORIGIN;
            self.data.out_blocked = true;
            return true;
        }
        false
    }

    // --------------------------------------------------------
    // Main execution
    // --------------------------------------------------------
    fn execute(&mut self) {
        self.data.clear_outputs();
        self.local.frametime = self.cmd.frametime();

        if self.local.frametime <= 0.0 {
            return;
        }

        // frozen/dead players get no say in where they go
        if self.data.movetype == MoveType::Frozen {
            return;
        }
        if self.data.movetype == MoveType::Dead {
            self.cmd.forwardmove = 0.0;
            self.cmd.sidemove = 0.0;
            self.cmd.upmove = 0.0;
        }

        self.data.view_angles = self.cmd.viewangles;
        angle_vectors(
            &self.cmd.viewangles,
            Some(&mut self.local.forward),
            Some(&mut self.local.right),
            Some(&mut self.local.up),
        );

        if self.data.movetype == MoveType::NoClip {
            self.duck();
            self.noclip_move();
            return;
        }

        if self.check_stuck() {
            return;
        }

        self.categorize_position();

        // class timers tick against the fresh ground state, so the
        // landing tick itself re-arms abilities
        self.class
            .decay_timers(self.data, self.local.frametime);
        self.duck();
        self.check_ladder();

        // stamina recovers every tick
        self.data.stamina =
            (self.data.stamina - STAMINA_RECOVER_RATE * self.local.frametime).max(0.0);

        match self.data.movetype {
            MoveType::Ladder => {
                self.check_jump();
                self.ladder_move();
            }
            _ => {
                self.check_jump();

                // class-specific hook: wall jump, bull rush trigger
                self.class
                    .special_move(self.data, &self.cmd, &self.local, self.tr);

                if self.data.water_level >= 2 {
                    self.water_move();
                } else {
                    self.walk_move();
                }
            }
        }

        self.categorize_position();
    }
}

// ============================================================
// Public API
// ============================================================

/// Run one tick of player movement. Called by the server applying a
/// command authoritatively and by the client predicting the same
/// command; both must observe identical results.
pub fn player_move(data: &mut MoveData, cmd: &MoveCommand, tr: &impl TraceService) {
    let class = classmove::class_movement(data.player_class);
    let mut ctx = GameMovement {
        data,
        cmd: *cmd,
        local: MoveLocal::default(),
        class,
        tr,
    };
    ctx.execute();
}

// ============================================================
// Test trace stubs (shared with classmove/fire tests)
// ============================================================

#[cfg(test)]
pub(crate) mod test_traces {
    use super::*;
    use crate::shared::TracePlane;

    /// Open air, no collisions anywhere.
    pub struct OpenAir;

    impl TraceService for OpenAir {
        fn trace(&self, _s: &Vec3, _mins: &Vec3, _maxs: &Vec3, end: &Vec3, _mask: i32) -> TraceResult {
            TraceResult {
                endpos: *end,
                ..TraceResult::default()
            }
        }

        fn point_contents(&self, _point: &Vec3) -> i32 {
            0
        }
    }

    /// Solid floor at z = 0 (hulls have mins[2] = 0, so the origin
    /// rests exactly on the floor).
    pub struct Floor;

    impl Floor {
        pub fn floor_trace(start: &Vec3, end: &Vec3) -> TraceResult {
            if end[2] < 0.0 && start[2] >= 0.0 {
                let frac = if (start[2] - end[2]).abs() > f32::EPSILON {
                    (start[2] / (start[2] - end[2])).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                TraceResult {
                    fraction: frac,
                    endpos: [
                        start[0] + frac * (end[0] - start[0]),
                        start[1] + frac * (end[1] - start[1]),
                        0.0,
                    ],
                    plane: TracePlane {
                        normal: [0.0, 0.0, 1.0],
                        dist: 0.0,
                    },
                    contents: crate::shared::CONTENTS_SOLID,
                    ent: 0, // world
                    ..TraceResult::default()
                }
            } else if start[2] < 0.0 {
                TraceResult {
                    allsolid: true,
                    startsolid: true,
                    fraction: 0.0,
                    endpos: *start,
                    ent: 0,
                    ..TraceResult::default()
                }
            } else {
                TraceResult {
                    endpos: *end,
                    ..TraceResult::default()
                }
            }
        }
    }

    impl TraceService for Floor {
        fn trace(&self, start: &Vec3, _mins: &Vec3, _maxs: &Vec3, end: &Vec3, _mask: i32) -> TraceResult {
            Self::floor_trace(start, end)
        }

        fn point_contents(&self, point: &Vec3) -> i32 {
            if point[2] < 0.0 {
                crate::shared::CONTENTS_SOLID
            } else {
                0
            }
        }
    }

    /// Floor at z = 0 plus a solid wall filling x >= WALL_X.
    pub struct FloorAndWall;

    pub const WALL_X: f32 = 64.0;

    impl TraceService for FloorAndWall {
        fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3, mask: i32) -> TraceResult {
            let face = WALL_X - maxs[0];
            if end[0] > face && start[0] <= face {
                let frac = if (end[0] - start[0]).abs() > f32::EPSILON {
                    ((face - start[0]) / (end[0] - start[0])).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                return TraceResult {
                    fraction: frac,
                    endpos: [
                        face,
                        start[1] + frac * (end[1] - start[1]),
                        start[2] + frac * (end[2] - start[2]),
                    ],
                    plane: TracePlane {
                        normal: [-1.0, 0.0, 0.0],
                        dist: -WALL_X,
                    },
                    contents: crate::shared::CONTENTS_SOLID,
                    ent: 0,
                    ..TraceResult::default()
                };
            }
            Floor.trace(start, mins, maxs, end, mask)
        }

        fn point_contents(&self, point: &Vec3) -> i32 {
            if point[2] < 0.0 || point[0] > WALL_X {
                crate::shared::CONTENTS_SOLID
            } else {
                0
            }
        }
    }

    /// Everything is solid: the player is fully stuck.
    pub struct AllSolid;

    impl TraceService for AllSolid {
        fn trace(&self, start: &Vec3, _mins: &Vec3, _maxs: &Vec3, _end: &Vec3, _mask: i32) -> TraceResult {
            TraceResult {
                allsolid: true,
                startsolid: true,
                fraction: 0.0,
                endpos: *start,
                ent: 0,
                ..TraceResult::default()
            }
        }

        fn point_contents(&self, _point: &Vec3) -> i32 {
            crate::shared::CONTENTS_SOLID
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
