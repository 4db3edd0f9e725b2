// g_vehicle.rs — Manned vehicles and the mounted gun
//
// A vehicle carries up to four seated players at fixed attachment
// offsets. Seat occupancy is the single source of truth: the player's
// seat ref and the vehicle's seat slot always agree, and a seat holds
// at most one player. The mounted gun tracks its operator's view at a
// bounded turn rate.

use ironsight_common::gamemove::player_move;
use ironsight_common::movedata::MoveData;
use ironsight_common::shared::{
    angle_diff, angle_vectors, vectoangles, vector_ma, vector_subtract, Buttons, MoveCommand,
    PlayerClass, TraceService, Vec3, MASK_PLAYERSOLID, PITCH, YAW,
};

use crate::g_local::{GameContext, GameError, GameResult, SeatRef};

pub const VEHICLE_SEATS: usize = 4;
pub const SEAT_DRIVER: usize = 0;
pub const SEAT_GUNNER: usize = 1;

/// Ground speed cap while driven.
pub const DRIVE_MAX_SPEED: f32 = 480.0;

// hull used to probe exit spots for room
const EXIT_HULL_MINS: Vec3 = [-16.0, -16.0, 0.0];
const EXIT_HULL_MAXS: Vec3 = [16.0, 16.0, 72.0];

// ============================================================
// Mounted gun
// ============================================================

/// Pintle gun on the vehicle. The operator's view steers it; the mount
/// turns toward the target at its own rate and never leaves its arc.
#[derive(Debug, Clone, Copy)]
pub struct MountedGun {
    /// Pivot position relative to the vehicle origin (local axes).
    pub pivot_offset: Vec3,
    /// Current world aim angles.
    pub angles: Vec3,
    /// Degrees per second the mount can traverse.
    pub turn_rate: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
    /// Max yaw deviation from the vehicle's facing; 180 = full circle.
    pub yaw_arc: f32,
}

impl Default for MountedGun {
    fn default() -> Self {
        Self {
            pivot_offset: [0.0, 0.0, 48.0],
            angles: [0.0; 3],
            turn_rate: 120.0,
            pitch_min: -35.0,
            pitch_max: 15.0,
            yaw_arc: 180.0,
        }
    }
}

impl MountedGun {
    /// Advance one component toward its target at the bounded rate,
    /// snapping when within one step.
    fn track_component(current: f32, target: f32, max_step: f32) -> f32 {
        let diff = angle_diff(target, current);
        if diff.abs() <= max_step {
            target
        } else if diff > 0.0 {
            current + max_step
        } else {
            current - max_step
        }
    }

    /// One tick of traverse toward `target` world angles, then arc
    /// clamping against the vehicle's facing.
    pub fn track(&mut self, target: &Vec3, vehicle_yaw: f32, frametime: f32) {
        let step = self.turn_rate * frametime;
        self.angles[PITCH] = Self::track_component(self.angles[PITCH], target[PITCH], step);
        self.angles[YAW] = Self::track_component(self.angles[YAW], target[YAW], step);

        self.angles[PITCH] = self.angles[PITCH].clamp(self.pitch_min, self.pitch_max);

        let deviation = angle_diff(self.angles[YAW], vehicle_yaw);
        if deviation > self.yaw_arc {
            self.angles[YAW] = vehicle_yaw + self.yaw_arc;
        } else if deviation < -self.yaw_arc {
            self.angles[YAW] = vehicle_yaw - self.yaw_arc;
        }
    }
}

// ============================================================
// Vehicle entity
// ============================================================

pub struct Vehicle {
    pub in_use: bool,
    pub origin: Vec3,
    pub angles: Vec3,
    /// Player arena index per seat.
    pub seats: [Option<usize>; VEHICLE_SEATS],
    /// Attachment offsets in vehicle-local axes (forward, left, up);
    /// negative y is the right-hand side.
    pub seat_offsets: [Vec3; VEHICLE_SEATS],
    /// Dismount offsets, same axes.
    pub exit_offsets: [Vec3; VEHICLE_SEATS],
    /// Player who may evict the driver.
    pub owner: Option<usize>,
    pub gun: Option<MountedGun>,
    /// Movement record the driver steers; base physics run through the
    /// shared engine like any player hull.
    pub mv: MoveData,
}

impl Vehicle {
    pub fn at(origin: Vec3, yaw: f32) -> Self {
        let mut mv = MoveData::for_class(PlayerClass::Rifleman);
        mv.origin = origin;
        mv.view_angles = [0.0, yaw, 0.0];
        mv.max_speed = DRIVE_MAX_SPEED;
        Self {
            in_use: true,
            origin,
            angles: [0.0, yaw, 0.0],
            seats: [None; VEHICLE_SEATS],
            seat_offsets: [
                [12.0, -14.0, 24.0], // driver, right side
                [-20.0, 0.0, 40.0],  // gunner, up on the bed
                [12.0, 14.0, 24.0],  // passenger
                [-8.0, 14.0, 24.0],  // passenger
            ],
            exit_offsets: [
                [12.0, -48.0, 0.0],
                [-64.0, 0.0, 0.0],
                [12.0, 48.0, 0.0],
                [-8.0, 48.0, 0.0],
            ],
            owner: None,
            gun: Some(MountedGun::default()),
            mv,
        }
    }

    fn local_to_world(&self, local: &Vec3) -> Vec3 {
        let mut forward = [0.0; 3];
        let mut right = [0.0; 3];
        angle_vectors(
            &[0.0, self.angles[YAW], 0.0],
            Some(&mut forward),
            Some(&mut right),
            None,
        );
        // right from angle_vectors points to -y of the local frame
        let mut pos = vector_ma(&self.origin, local[0], &forward);
        pos = vector_ma(&pos, -local[1], &right);
        pos[2] += local[2];
        pos
    }

    pub fn seat_world_pos(&self, seat: usize) -> Vec3 {
        self.local_to_world(&self.seat_offsets[seat])
    }

    pub fn exit_world_pos(&self, seat: usize) -> Vec3 {
        self.local_to_world(&self.exit_offsets[seat])
    }

    pub fn gun_pivot(&self) -> Option<Vec3> {
        self.gun.as_ref().map(|g| self.local_to_world(&g.pivot_offset))
    }

    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }
}

// ============================================================
// Entry
// ============================================================

/// Seat a player in the nearest free seat. The vehicle owner evicts a
/// non-owner driver instead of being turned away from a full cab.
pub fn enter_vehicle(
    ctx: &mut GameContext,
    tr: &dyn TraceService,
    player_id: usize,
    vehicle_id: usize,
) -> GameResult<usize> {
    let use_radius = ctx.config.vehicle_use_radius;
    let player_origin = {
        let p = ctx.player(player_id)?;
        if p.seat.is_some() {
            return Err(GameError::AlreadySeated(player_id));
        }
        p.mv.origin
    };

    let (seat, is_eviction) = {
        let v = ctx.vehicle(vehicle_id)?;
        let d = vector_subtract(&v.origin, &player_origin);
        if (d[0] * d[0] + d[1] * d[1]).sqrt() > use_radius {
            return Err(GameError::NoSuchVehicle(vehicle_id));
        }

        // nearest unoccupied seat by world distance
        let mut best: Option<(usize, f32)> = None;
        for seat in 0..VEHICLE_SEATS {
            if v.seats[seat].is_some() {
                continue;
            }
            let pos = v.seat_world_pos(seat);
            let d = vector_subtract(&pos, &player_origin);
            let dist2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
            if best.map(|(_, bd)| dist2 < bd).unwrap_or(true) {
                best = Some((seat, dist2));
            }
        }

        match best {
            Some((seat, _)) => (seat, false),
            None => {
                // full: the owner may reclaim the driver seat
                if v.owner == Some(player_id) && v.seats[SEAT_DRIVER] != Some(player_id) {
                    (SEAT_DRIVER, true)
                } else {
                    return Err(GameError::VehicleFull);
                }
            }
        }
    };

    if is_eviction {
        let evicted = ctx.vehicle(vehicle_id)?.seats[SEAT_DRIVER]
            .ok_or(GameError::VehicleFull)?;
        exit_vehicle(ctx, tr, evicted)?;
        log::info!(
            "owner {} evicted driver {} from vehicle {}",
            player_id,
            evicted,
            vehicle_id
        );
    }

    let v = ctx.vehicle_mut(vehicle_id)?;
    v.seats[seat] = Some(player_id);
    let seat_pos = v.seat_world_pos(seat);

    let p = ctx.player_mut(player_id)?;
    p.seat = Some(SeatRef {
        vehicle: vehicle_id,
        seat,
    });
    p.mv.origin = seat_pos;
    p.mv.velocity = [0.0; 3];
    log::debug!("player {} took seat {} of vehicle {}", player_id, seat, vehicle_id);
    Ok(seat)
}

// ============================================================
// Driving
// ============================================================

/// One driver tick: run the driver's command through the shared engine
/// against the vehicle's own movement record, then sync the entity to
/// the hull. Riders are re-pinned to their seats on their own ticks.
pub fn drive_vehicle(
    ctx: &mut GameContext,
    tr: &impl TraceService,
    vehicle_id: usize,
    cmd: &MoveCommand,
) -> GameResult<()> {
    let v = ctx.vehicle_mut(vehicle_id)?;

    // the hull drives flat: no jumping, ducking, or pitch diving
    let mut drive = *cmd;
    drive.buttons &= !(Buttons::JUMP | Buttons::DUCK | Buttons::USE);
    drive.upmove = 0.0;
    drive.viewangles = [0.0, cmd.viewangles[YAW], 0.0];

    player_move(&mut v.mv, &drive, tr);

    v.origin = v.mv.origin;
    v.angles[YAW] = cmd.viewangles[YAW];
    Ok(())
}

// ============================================================
// Exit
// ============================================================

fn spot_is_clear(tr: &dyn TraceService, spot: &Vec3) -> bool {
    !tr.trace(spot, &EXIT_HULL_MINS, &EXIT_HULL_MAXS, spot, MASK_PLAYERSOLID)
        .allsolid
}

/// Unseat a player. Tries the seat's own dismount spot, then every
/// other seat's, then directly behind the vehicle; the first spot with
/// room wins.
pub fn exit_vehicle(
    ctx: &mut GameContext,
    tr: &dyn TraceService,
    player_id: usize,
) -> GameResult<Vec3> {
    let seat_ref = ctx
        .player(player_id)?
        .seat
        .ok_or(GameError::NotSeated(player_id))?;

    let spot = {
        let v = ctx.vehicle(seat_ref.vehicle)?;
        let mut candidates = Vec::with_capacity(VEHICLE_SEATS + 1);
        candidates.push(v.exit_world_pos(seat_ref.seat));
        for seat in 0..VEHICLE_SEATS {
            if seat != seat_ref.seat {
                candidates.push(v.exit_world_pos(seat));
            }
        }
        // last resort: straight behind the hull
        candidates.push(v.local_to_world(&[-96.0, 0.0, 0.0]));

        candidates
            .into_iter()
            .find(|spot| spot_is_clear(tr, spot))
            .ok_or(GameError::NoExitRoom)?
    };

    let v = ctx.vehicle_mut(seat_ref.vehicle)?;
    v.seats[seat_ref.seat] = None;

    let p = ctx.player_mut(player_id)?;
    p.seat = None;
    p.mv.origin = spot;
    p.mv.velocity = [0.0; 3];
    log::debug!("player {} dismounted vehicle {}", player_id, seat_ref.vehicle);
    Ok(spot)
}

// ============================================================
// Mounted gun tracking
// ============================================================

/// One tick of gun traverse. The gunner seat operates the gun when
/// occupied; otherwise the driver's view steers it. The operator's aim
/// point is resolved by raycast and converted to mount-relative angles
/// so the gun converges on what they look at, not on their eye angles.
pub fn gun_think(
    ctx: &mut GameContext,
    tr: &dyn TraceService,
    vehicle_id: usize,
    frametime: f32,
) -> GameResult<()> {
    let (operator, pivot, vehicle_yaw) = {
        let v = ctx.vehicle(vehicle_id)?;
        let pivot = match v.gun_pivot() {
            Some(p) => p,
            None => return Ok(()),
        };
        let operator = v.seats[SEAT_GUNNER].or(v.seats[SEAT_DRIVER]);
        (operator, pivot, v.angles[YAW])
    };

    let operator = match operator {
        Some(id) => id,
        None => return Ok(()),
    };

    // where is the operator looking?
    let (eye, view_angles) = {
        let p = ctx.player(operator)?;
        let mut eye = p.mv.origin;
        for i in 0..3 {
            eye[i] += p.mv.view_offset[i];
        }
        (eye, p.mv.view_angles)
    };

    let mut forward = [0.0; 3];
    angle_vectors(&view_angles, Some(&mut forward), None, None);
    let far = vector_ma(&eye, 8192.0, &forward);
    let trace = tr.trace(&eye, &[0.0; 3], &[0.0; 3], &far, MASK_PLAYERSOLID);

    // target angles from the gun pivot to the aim point
    let to_target = vector_subtract(&trace.endpos, &pivot);
    let mut target = vectoangles(&to_target);
    // vectoangles yields [0,360) pitch; tracking wants signed
    if target[PITCH] > 180.0 {
        target[PITCH] -= 360.0;
    }

    let v = ctx.vehicle_mut(vehicle_id)?;
    if let Some(gun) = v.gun.as_mut() {
        gun.track(&target, vehicle_yaw, frametime);
    }
    Ok(())
}

// ============================================================
// Unit tests
// ============================================================
