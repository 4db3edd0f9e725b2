// p_client.rs — Per-player server tick
//
// Glues the shared movement engine to the game layer: runs the move,
// raises footstep/landing events, rides vehicles, and hands off to the
// weapon think. The same ordering runs on the predicting client, which
// is what keeps prediction honest.

use ironsight_common::gamemove::{player_move, SPEED_CROP_WALK};
use ironsight_common::movedata::MoveData;
use ironsight_common::shared::{
    vector_length_2d, Buttons, MoveCommand, PlayerClass, TraceService,
};

use crate::g_local::{GameContext, GameEvents, GameResult};
use crate::g_vehicle;
use crate::p_view::view_think;
use crate::p_weapon;

/// Ground distance between footstep events at a run.
const FOOTSTEP_DISTANCE: f32 = 170.0;
/// Falls slower than this land silently.
const LAND_THUMP_SPEED: f32 = -300.0;

/// Nearest enterable vehicle within the use radius, if any.
fn nearest_vehicle(ctx: &GameContext, player_id: usize) -> Option<usize> {
    let origin = ctx.player(player_id).ok()?.mv.origin;
    let radius = ctx.config.vehicle_use_radius;
    let mut best: Option<(usize, f32)> = None;
    for (vid, v) in ctx.vehicles.iter().enumerate() {
        if !v.in_use {
            continue;
        }
        let dx = v.origin[0] - origin[0];
        let dy = v.origin[1] - origin[1];
        let dist = (dx * dx + dy * dy).sqrt();
        if dist <= radius && best.map(|(_, bd)| dist < bd).unwrap_or(true) {
            best = Some((vid, dist));
        }
    }
    best.map(|(vid, _)| vid)
}

/// Run one command for one player: vehicle ride or full movement, view
/// bookkeeping, then weapons.
pub fn player_tick(
    ctx: &mut GameContext,
    events: &mut dyn GameEvents,
    tr: &impl TraceService,
    id: usize,
    cmd: &MoveCommand,
) -> GameResult<()> {
    let frametime = cmd.frametime();

    let use_pressed = {
        let p = ctx.player(id)?;
        cmd.buttons.contains(Buttons::USE) && !p.old_buttons.contains(Buttons::USE)
    };

    if let Some(seat_ref) = ctx.player(id)?.seat {
        // the driver's input moves the whole vehicle through the shared
        // engine; every other seat just rides
        if seat_ref.seat == g_vehicle::SEAT_DRIVER {
            g_vehicle::drive_vehicle(ctx, tr, seat_ref.vehicle, cmd)?;
        }
        let seat_pos = ctx.vehicle(seat_ref.vehicle)?.seat_world_pos(seat_ref.seat);
        {
            let p = ctx.player_mut(id)?;
            p.mv.origin = seat_pos;
            p.mv.velocity = [0.0; 3];
            p.mv.view_angles = cmd.viewangles;
            p.old_buttons = cmd.buttons;
            view_think(p, frametime);
        }
        if use_pressed {
            g_vehicle::exit_vehicle(ctx, tr, id)?;
        }
        return Ok(());
    }

    if use_pressed {
        if let Some(vid) = nearest_vehicle(ctx, id) {
            if g_vehicle::enter_vehicle(ctx, tr, id, vid).is_ok() {
                ctx.player_mut(id)?.old_buttons = cmd.buttons;
                return Ok(());
            }
        }
    }

    {
        let p = ctx.player_mut(id)?;
        let fall_speed = p.mv.velocity[2];
        player_move(&mut p.mv, cmd, tr);

        if p.mv.out_landed && fall_speed < LAND_THUMP_SPEED {
            events.play_sound(id, "player/land");
        }

        // faster than a walk leaves an audible trail
        let speed = vector_length_2d(&p.mv.velocity);
        let walk_speed = p.mv.max_speed * SPEED_CROP_WALK;
        if p.mv.on_ground() && speed > walk_speed + 1.0 {
            p.footstep_dist += speed * frametime;
            if p.footstep_dist > FOOTSTEP_DISTANCE {
                p.footstep_dist = 0.0;
                events.footstep(id);
            }
        } else {
            p.footstep_dist = 0.0;
        }

        view_think(p, frametime);
    }

    p_weapon::weapon_think(ctx, events, id, cmd)
}

/// Switch class. The movement record is rebuilt for the new class in
/// place; position and server caps carry over.
pub fn set_player_class(ctx: &mut GameContext, id: usize, class: PlayerClass) -> GameResult<()> {
    let p = ctx.player_mut(id)?;
    let old = &p.mv;
    let mut mv = MoveData::for_class(class);
    mv.origin = old.origin;
    mv.velocity = old.velocity;
    mv.view_angles = old.view_angles;
    mv.max_speed = old.max_speed;
    mv.client_max_speed = old.client_max_speed;
    mv.gravity = old.gravity;
    mv.flags = old.flags;
    p.class = class;
    p.mv = mv;
    log::info!("player {} switched class to {:?}", id, class);
    Ok(())
}

/// Per-frame world pass: advances game time and traverses every
/// mounted gun.
pub fn run_frame(ctx: &mut GameContext, tr: &impl TraceService, frametime: f32) {
    ctx.time += frametime;
    for vid in 0..ctx.vehicles.len() {
        if ctx.vehicles[vid].in_use {
            // a missing operator is fine; real errors mean a stale seat
            if let Err(err) = g_vehicle::gun_think(ctx, tr, vid, frametime) {
                log::warn!("vehicle {vid} gun think: {err}");
            }
        }
    }
}

// ============================================================
// Unit tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_local::{GameConfig, NullEvents, SeatRef};
    use crate::g_vehicle::Vehicle;
    use crate::w_defs;
    use ironsight_common::shared::{TracePlane, TraceResult, Vec3, CONTENTS_SOLID};

    /// Solid floor at z = 0, open everywhere above.
    struct Floor;

    impl TraceService for Floor {
        fn trace(&self, start: &Vec3, _mins: &Vec3, _maxs: &Vec3, end: &Vec3, _m: i32) -> TraceResult {
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
                    contents: CONTENTS_SOLID,
                    ent: 0,
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

        fn point_contents(&self, point: &Vec3) -> i32 {
            if point[2] < 0.0 {
                CONTENTS_SOLID
            } else {
                0
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        footsteps: usize,
        sounds: Vec<String>,
        bullets: usize,
    }

    impl GameEvents for Recorder {
        fn play_sound(&mut self, _player: usize, sound: &str) {
            self.sounds.push(sound.to_owned());
        }
        fn muzzle_flash(&mut self, _player: usize, _silenced: bool) {}
        fn fire_bullet(&mut self, _player: usize, _spread: [f32; 2], _range: f32, _damage: i32) {
            self.bullets += 1;
        }
        fn ammo_update(&mut self, _player: usize, _clip: i32, _reserve: i32) {}
        fn footstep(&mut self, _player: usize) {
            self.footsteps += 1;
        }
    }

    fn fresh_ctx() -> (GameContext, usize) {
        let mut ctx = GameContext::new(GameConfig::default(), 4);
        let id = ctx.connect_player("subject", PlayerClass::Rifleman).unwrap();
        (ctx, id)
    }

    fn run_cmd(ctx: &mut GameContext, ev: &mut dyn GameEvents, id: usize, cmd: &MoveCommand) {
        player_tick(ctx, ev, &Floor, id, cmd).unwrap();
        ctx.time += cmd.frametime();
    }

    #[test]
    fn test_running_emits_footsteps() {
        let (mut ctx, id) = fresh_ctx();
        let mut rec = Recorder::default();
        let cmd = MoveCommand {
            msec: 16,
            forwardmove: 320.0,
            ..MoveCommand::default()
        };
        // two seconds of running
        for _ in 0..125 {
            run_cmd(&mut ctx, &mut rec, id, &cmd);
        }
        assert!(rec.footsteps >= 2, "got {} footsteps", rec.footsteps);
    }

    #[test]
    fn test_walking_is_silent() {
        let (mut ctx, id) = fresh_ctx();
        let mut rec = Recorder::default();
        let cmd = MoveCommand {
            msec: 16,
            forwardmove: 320.0,
            buttons: Buttons::SPEED,
            ..MoveCommand::default()
        };
        for _ in 0..125 {
            run_cmd(&mut ctx, &mut rec, id, &cmd);
        }
        assert_eq!(rec.footsteps, 0, "walk modifier keeps steps silent");
    }

    #[test]
    fn test_hard_landing_thumps() {
        let (mut ctx, id) = fresh_ctx();
        ctx.players[id].mv.origin[2] = 400.0;
        let mut rec = Recorder::default();
        let cmd = MoveCommand {
            msec: 16,
            ..MoveCommand::default()
        };
        for _ in 0..200 {
            run_cmd(&mut ctx, &mut rec, id, &cmd);
        }
        assert!(ctx.players[id].mv.on_ground());
        assert!(rec.sounds.iter().any(|s| s == "player/land"));
    }

    #[test]
    fn test_move_and_shoot_in_one_tick() {
        let (mut ctx, id) = fresh_ctx();
        ctx.players[id].weapon =
            Some(crate::g_local::CarriedWeapon::new(w_defs::WEAPON_ASSAULT_RIFLE).unwrap());
        let mut rec = Recorder::default();
        let cmd = MoveCommand {
            msec: 16,
            forwardmove: 320.0,
            buttons: Buttons::ATTACK,
            random_seed: 31,
            ..MoveCommand::default()
        };
        run_cmd(&mut ctx, &mut rec, id, &cmd);
        assert_eq!(rec.bullets, 1);
        assert!(ctx.players[id].mv.origin[0] > 0.0, "moved while firing");
    }

    #[test]
    fn test_use_enters_and_exits_vehicle() {
        let (mut ctx, id) = fresh_ctx();
        let vid = ctx.spawn_vehicle(Vehicle::at([60.0, 0.0, 0.0], 0.0));
        let mut rec = NullEvents;

        let press_use = MoveCommand {
            msec: 16,
            buttons: Buttons::USE,
            ..MoveCommand::default()
        };
        run_cmd(&mut ctx, &mut rec, id, &press_use);
        assert!(ctx.players[id].seat.is_some(), "USE press boards the vehicle");
        let seat = ctx.players[id].seat.unwrap();
        assert_eq!(seat.vehicle, vid);

        // held USE is not a second press
        run_cmd(&mut ctx, &mut rec, id, &press_use);
        assert!(ctx.players[id].seat.is_some());

        // riding pins the player to the seat
        let seat_pos = ctx.vehicle(vid).unwrap().seat_world_pos(seat.seat);
        assert_eq!(ctx.players[id].mv.origin, seat_pos);

        // release, press again: dismount
        let idle = MoveCommand {
            msec: 16,
            ..MoveCommand::default()
        };
        run_cmd(&mut ctx, &mut rec, id, &idle);
        run_cmd(&mut ctx, &mut rec, id, &press_use);
        assert!(ctx.players[id].seat.is_none());
        assert_eq!(ctx.vehicle(vid).unwrap().occupied_seats(), 0);
    }

    #[test]
    fn test_driver_input_drives_the_vehicle() {
        let (mut ctx, id) = fresh_ctx();
        let vid = ctx.spawn_vehicle(Vehicle::at([60.0, 0.0, 0.0], 0.0));
        let mut rec = NullEvents;
        run_cmd(
            &mut ctx,
            &mut rec,
            id,
            &MoveCommand {
                msec: 16,
                buttons: Buttons::USE,
                ..MoveCommand::default()
            },
        );
        // take the wheel regardless of which seat was nearest
        {
            let v = ctx.vehicle_mut(vid).unwrap();
            v.seats = [None; g_vehicle::VEHICLE_SEATS];
            v.seats[g_vehicle::SEAT_DRIVER] = Some(id);
        }
        ctx.players[id].seat = Some(SeatRef {
            vehicle: vid,
            seat: g_vehicle::SEAT_DRIVER,
        });
        let start = ctx.vehicle(vid).unwrap().origin;

        let throttle = MoveCommand {
            msec: 16,
            forwardmove: 480.0,
            ..MoveCommand::default()
        };
        for _ in 0..60 {
            run_cmd(&mut ctx, &mut rec, id, &throttle);
        }

        let v = ctx.vehicle(vid).unwrap();
        assert!(
            v.origin[0] > start[0] + 50.0,
            "driver throttle moves the vehicle, got {:?}",
            v.origin
        );
        // the driver rides the moving cab
        assert_eq!(
            ctx.players[id].mv.origin,
            v.seat_world_pos(g_vehicle::SEAT_DRIVER)
        );
    }

    #[test]
    fn test_passenger_input_does_not_drive() {
        let (mut ctx, id) = fresh_ctx();
        let vid = ctx.spawn_vehicle(Vehicle::at([60.0, 0.0, 0.0], 0.0));
        let mut rec = NullEvents;
        run_cmd(
            &mut ctx,
            &mut rec,
            id,
            &MoveCommand {
                msec: 16,
                buttons: Buttons::USE,
                ..MoveCommand::default()
            },
        );
        {
            let v = ctx.vehicle_mut(vid).unwrap();
            v.seats = [None; g_vehicle::VEHICLE_SEATS];
            v.seats[g_vehicle::SEAT_GUNNER] = Some(id);
        }
        ctx.players[id].seat = Some(SeatRef {
            vehicle: vid,
            seat: g_vehicle::SEAT_GUNNER,
        });
        let start = ctx.vehicle(vid).unwrap().origin;

        let throttle = MoveCommand {
            msec: 16,
            forwardmove: 480.0,
            ..MoveCommand::default()
        };
        for _ in 0..60 {
            run_cmd(&mut ctx, &mut rec, id, &throttle);
        }
        assert_eq!(
            ctx.vehicle(vid).unwrap().origin,
            start,
            "only the driver seat steers the hull"
        );
    }

    #[test]
    fn test_seated_player_ignores_movement_input() {
        let (mut ctx, id) = fresh_ctx();
        ctx.spawn_vehicle(Vehicle::at([40.0, 0.0, 0.0], 0.0));
        let mut rec = NullEvents;
        run_cmd(
            &mut ctx,
            &mut rec,
            id,
            &MoveCommand {
                msec: 16,
                buttons: Buttons::USE,
                ..MoveCommand::default()
            },
        );
        let origin = ctx.players[id].mv.origin;

        let sprint = MoveCommand {
            msec: 16,
            forwardmove: 320.0,
            ..MoveCommand::default()
        };
        for _ in 0..30 {
            run_cmd(&mut ctx, &mut rec, id, &sprint);
        }
        assert_eq!(ctx.players[id].mv.origin, origin, "seat holds the rider");
    }

    #[test]
    fn test_class_switch_keeps_position() {
        let (mut ctx, id) = fresh_ctx();
        ctx.players[id].mv.origin = [50.0, -20.0, 0.0];
        set_player_class(&mut ctx, id, PlayerClass::Commando).unwrap();
        let p = ctx.player(id).unwrap();
        assert_eq!(p.class, PlayerClass::Commando);
        assert_eq!(p.mv.origin, [50.0, -20.0, 0.0]);
        assert!(matches!(
            p.mv.class_data,
            ironsight_common::movedata::ClassMoveData::Commando(_)
        ));
    }

    #[test]
    fn test_run_frame_advances_time() {
        let (mut ctx, _) = fresh_ctx();
        run_frame(&mut ctx, &Floor, 0.016);
        run_frame(&mut ctx, &Floor, 0.016);
        assert!((ctx.time - 0.032).abs() < 1e-6);
    }

    #[test]
    fn test_full_pipeline_is_deterministic() {
        let build = || {
            let mut ctx = GameContext::new(GameConfig::default(), 2);
            let id = ctx.connect_player("sim", PlayerClass::Recon).unwrap();
            ctx.players[id].weapon =
                Some(crate::g_local::CarriedWeapon::new(w_defs::WEAPON_SMG).unwrap());
            (ctx, id)
        };
        let (mut a, ida) = build();
        let (mut b, idb) = build();
        let mut ev = NullEvents;

        for i in 0u32..240 {
            let cmd = MoveCommand {
                msec: 16,
                forwardmove: if i % 3 == 0 { 320.0 } else { 0.0 },
                sidemove: if i % 7 == 0 { -180.0 } else { 0.0 },
                viewangles: [0.0, (i % 90) as f32 * 4.0, 0.0],
                buttons: if i % 5 == 0 {
                    Buttons::ATTACK | Buttons::JUMP
                } else {
                    Buttons::empty()
                },
                random_seed: i.wrapping_mul(0x0019_660D),
                ..MoveCommand::default()
            };
            run_cmd(&mut a, &mut ev, ida, &cmd);
            run_cmd(&mut b, &mut ev, idb, &cmd);
        }

        assert_eq!(a.players[ida].mv, b.players[idb].mv);
        assert_eq!(
            a.players[ida].weapon.unwrap().state,
            b.players[idb].weapon.unwrap().state
        );
        for i in 0..3 {
            assert_eq!(
                a.players[ida].mv.origin[i].to_bits(),
                b.players[idb].mv.origin[i].to_bits()
            );
        }
    }
}
