// p_weapon.rs — Per-player weapon handling
//
// Drives the shared fire-control math from player input: attack
// dispatch, burst follow-ups, reload, burst-mode toggle, and the
// silencer toggle with its interrupt semantics. All randomness comes
// from the replicated command seed.

use ironsight_common::fire::{self, FireResult, FireStance, ShotEvent};
use ironsight_common::gamemove::SPEED_CROP_WALK;
use ironsight_common::shared::{vector_length_2d, Buttons, MoveCommand};

use crate::g_local::{CarriedWeapon, GameContext, GameError, GameEvents, GameResult, Player};
use crate::w_defs;

pub const RELOAD_TIME: f32 = 2.5;

/// Derive the seed for the nth round of a command so burst follow-ups
/// don't repeat the primary round's draw. Same derivation on both
/// hosts.
fn round_seed(base: u32, round: u32) -> u32 {
    base.wrapping_add(round.wrapping_mul(0x9E37_79B9))
}

fn stance_of(player: &Player) -> FireStance {
    FireStance {
        on_ground: player.mv.on_ground(),
        ducked: player.mv.ducked(),
        moving: vector_length_2d(&player.mv.velocity) > player.mv.max_speed * SPEED_CROP_WALK,
    }
}

fn emit_shot(events: &mut dyn GameEvents, id: usize, player: &mut Player, ev: &ShotEvent) {
    for i in 0..3 {
        player.punch_angle[i] += ev.punch[i];
    }
    events.muzzle_flash(id, ev.silenced);
    events.fire_bullet(id, ev.spread, ev.range, ev.damage);
    if let Some(w) = &player.weapon {
        events.ammo_update(id, w.state.clip, w.state.reserve);
    }
}

/// One weapon tick for a player. Completes pending work, pumps burst
/// follow-ups, then dispatches attack/reload input.
pub fn weapon_think(
    ctx: &mut GameContext,
    events: &mut dyn GameEvents,
    id: usize,
    cmd: &MoveCommand,
) -> GameResult<()> {
    let time = ctx.time;
    let model = ctx.config.accuracy_model();
    let player = ctx.player_mut(id)?;
    let old_buttons = player.old_buttons;
    player.old_buttons = cmd.buttons;

    if player.weapon.is_none() {
        return Ok(());
    }

    // pending-work completion
    let mut finished_sound: Option<&'static str> = None;
    {
        let w = player.weapon.as_mut().ok_or(GameError::NoWeapon(id))?;
        if time >= w.busy_until {
            if let Some(target) = w.silencer_pending.take() {
                w.state.silencer_on = target;
                finished_sound = Some(if target {
                    "weapons/silencer_on"
                } else {
                    "weapons/silencer_off"
                });
            }
            if w.reload_pending {
                w.reload_pending = false;
                let spec = w_defs::weapon_spec(w.spec_id)
                    .ok_or(GameError::UnknownWeapon(w.spec_id))?;
                let need = spec.clip_size - w.state.clip;
                let take = need.min(w.state.reserve).max(0);
                w.state.clip += take;
                w.state.reserve -= take;
            }
        }

        let spec = w_defs::weapon_spec(w.spec_id).ok_or(GameError::UnknownWeapon(w.spec_id))?;
        fire::accuracy_think(spec, &mut w.state, model, time, cmd.frametime());
    }
    if let Some(sound) = finished_sound {
        events.play_sound(id, sound);
        let w = player.weapon.as_ref().ok_or(GameError::NoWeapon(id))?;
        events.ammo_update(id, w.state.clip, w.state.reserve);
    }

    // burst follow-ups owed from an earlier trigger pull
    let stance = stance_of(player);
    let pending_shot: Option<ShotEvent> = {
        let w = player.weapon.as_mut().ok_or(GameError::NoWeapon(id))?;
        let spec = w_defs::weapon_spec(w.spec_id).ok_or(GameError::UnknownWeapon(w.spec_id))?;
        let round = spec.burst_rounds.saturating_sub(w.state.burst_left);
        let seed = round_seed(cmd.random_seed, round);
        fire::burst_think(spec, &mut w.state, &stance, model, time, seed)
    };
    if let Some(ev) = pending_shot {
        events.play_sound(id, if ev.silenced { "weapons/fire_sil" } else { "weapons/fire" });
        emit_shot(events, id, player, &ev);
    }

    // the weapon accepts no new input while busy
    let busy = player
        .weapon
        .as_ref()
        .map(|w| time < w.busy_until)
        .unwrap_or(true);
    if busy {
        return Ok(());
    }

    let pressed = cmd.buttons & !old_buttons;

    if cmd.buttons.contains(Buttons::ATTACK) {
        primary_attack(ctx, events, id, cmd)?;
    }
    if pressed.contains(Buttons::ATTACK2) {
        secondary_attack(ctx, events, id)?;
    }
    if pressed.contains(Buttons::RELOAD) {
        start_reload(ctx, events, id)?;
    }
    Ok(())
}

fn primary_attack(
    ctx: &mut GameContext,
    events: &mut dyn GameEvents,
    id: usize,
    cmd: &MoveCommand,
) -> GameResult<()> {
    let time = ctx.time;
    let model = ctx.config.accuracy_model();
    let player = ctx.player_mut(id)?;
    let stance = stance_of(player);

    let result = {
        let w = player.weapon.as_mut().ok_or(GameError::NoWeapon(id))?;
        let spec = w_defs::weapon_spec(w.spec_id).ok_or(GameError::UnknownWeapon(w.spec_id))?;
        fire::fire_weapon(spec, &mut w.state, &stance, model, time, cmd.random_seed)
    };

    match result {
        FireResult::Shot(ev) => {
            events.play_sound(id, if ev.silenced { "weapons/fire_sil" } else { "weapons/fire" });
            emit_shot(events, id, player, &ev);
        }
        FireResult::Empty => {
            events.play_sound(id, "weapons/dryfire");
        }
        FireResult::Cooling => {}
    }
    Ok(())
}

/// Secondary input: weapons with a silencer toggle it, burst-capable
/// weapons switch fire mode.
fn secondary_attack(ctx: &mut GameContext, events: &mut dyn GameEvents, id: usize) -> GameResult<()> {
    let time = ctx.time;
    let player = ctx.player_mut(id)?;
    let w = player.weapon.as_mut().ok_or(GameError::NoWeapon(id))?;
    let spec = w_defs::weapon_spec(w.spec_id).ok_or(GameError::UnknownWeapon(w.spec_id))?;

    if spec.has_silencer {
        // long busy window; completion lands in a later think
        w.silencer_pending = Some(!w.state.silencer_on);
        w.busy_until = time + spec.silencer_time;
        events.play_sound(id, "weapons/silencer_work");
    } else if spec.has_burst_mode() {
        w.state.burst_mode = !w.state.burst_mode;
        events.play_sound(id, "weapons/mode_switch");
    }
    Ok(())
}

fn start_reload(ctx: &mut GameContext, events: &mut dyn GameEvents, id: usize) -> GameResult<()> {
    let time = ctx.time;
    let player = ctx.player_mut(id)?;
    let w = player.weapon.as_mut().ok_or(GameError::NoWeapon(id))?;
    let spec = w_defs::weapon_spec(w.spec_id).ok_or(GameError::UnknownWeapon(w.spec_id))?;

    if w.state.clip >= spec.clip_size || w.state.reserve <= 0 {
        return Ok(());
    }
    w.reload_pending = true;
    w.busy_until = time + RELOAD_TIME;
    w.state.burst_left = 0; // a reload abandons any owed burst rounds
    events.play_sound(id, "weapons/reload");
    Ok(())
}

/// Abort in-flight weapon work (holster, drop, death). A pending
/// silencer toggle reverts wholesale: the state never reflects a
/// half-finished screw.
pub fn interrupt_weapon(weapon: &mut CarriedWeapon) {
    weapon.silencer_pending = None;
    weapon.reload_pending = false;
    weapon.busy_until = 0.0;
    weapon.state.burst_left = 0;
}

/// Remove the carried weapon, interrupting whatever it was doing.
pub fn drop_weapon(ctx: &mut GameContext, id: usize) -> GameResult<CarriedWeapon> {
    let player = ctx.player_mut(id)?;
    let mut w = player.weapon.take().ok_or(GameError::NoWeapon(id))?;
    interrupt_weapon(&mut w);
    log::debug!("player {} dropped weapon {}", id, w.spec_id);
    Ok(w)
}

/// Hand a weapon instance to a player; returns the previously carried
/// weapon so the caller can place it in the world.
pub fn give_weapon(
    ctx: &mut GameContext,
    id: usize,
    weapon: CarriedWeapon,
) -> GameResult<Option<CarriedWeapon>> {
    let player = ctx.player_mut(id)?;
    let old = player.weapon.replace(weapon);
    Ok(old.map(|mut w| {
        interrupt_weapon(&mut w);
        w
    }))
}

// ============================================================
// Unit tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_local::{GameConfig, NullEvents};
    use ironsight_common::shared::PlayerClass;

    /// Records event calls for assertions.
    #[derive(Default)]
    struct Recorder {
        sounds: Vec<String>,
        bullets: usize,
        flashes_silenced: Vec<bool>,
    }

    impl GameEvents for Recorder {
        fn play_sound(&mut self, _player: usize, sound: &str) {
            self.sounds.push(sound.to_owned());
        }
        fn muzzle_flash(&mut self, _player: usize, silenced: bool) {
            self.flashes_silenced.push(silenced);
        }
        fn fire_bullet(&mut self, _player: usize, _spread: [f32; 2], _range: f32, _damage: i32) {
            self.bullets += 1;
        }
        fn ammo_update(&mut self, _player: usize, _clip: i32, _reserve: i32) {}
        fn footstep(&mut self, _player: usize) {}
    }

    fn armed_ctx(spec_id: usize) -> (GameContext, usize) {
        let mut ctx = GameContext::new(GameConfig::default(), 2);
        let id = ctx.connect_player("shooter", PlayerClass::Rifleman).unwrap();
        let mut w = CarriedWeapon::new(spec_id).unwrap();
        w.state.reserve = 90;
        ctx.players[id].weapon = Some(w);
        // grounded so the stance is the baseline
        ctx.players[id].mv.ground_ent = 0;
        (ctx, id)
    }

    fn attack_cmd(seed: u32) -> MoveCommand {
        MoveCommand {
            msec: 16,
            buttons: Buttons::ATTACK,
            random_seed: seed,
            ..MoveCommand::default()
        }
    }

    fn tick(ctx: &mut GameContext, ev: &mut dyn GameEvents, id: usize, cmd: &MoveCommand) {
        weapon_think(ctx, ev, id, cmd).unwrap();
        ctx.time += cmd.frametime();
    }

    #[test]
    fn test_held_trigger_respects_cycle_time() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_ASSAULT_RIFLE);
        let mut rec = Recorder::default();
        let cmd = attack_cmd(7);
        // one second of held trigger at 16 ms ticks
        for _ in 0..63 {
            tick(&mut ctx, &mut rec, id, &cmd);
        }
        let cycle = w_defs::weapon_spec(w_defs::WEAPON_ASSAULT_RIFLE).unwrap().cycle_time;
        let expected = (1.0 / cycle) as usize;
        assert!(
            (rec.bullets as i32 - expected as i32).abs() <= 1,
            "fired {} rounds, expected about {}",
            rec.bullets,
            expected
        );
    }

    // ---- empty fire ----
    #[test]
    fn test_empty_clip_clicks_and_preserves_clip() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_ASSAULT_RIFLE);
        if let Some(w) = &mut ctx.players[id].weapon {
            w.state.clip = 0;
        }
        let mut rec = Recorder::default();
        let cmd = attack_cmd(3);
        for _ in 0..30 {
            tick(&mut ctx, &mut rec, id, &cmd);
        }
        assert_eq!(rec.bullets, 0);
        assert!(rec.sounds.iter().all(|s| s == "weapons/dryfire"));
        // clicks re-arm on the dry-fire cooldown, not the cycle time
        assert!(rec.sounds.len() >= 4, "got {} clicks", rec.sounds.len());
        assert_eq!(ctx.players[id].weapon.unwrap().state.clip, 0);
    }

    // ---- burst fire: 1 immediate + 2 follow-up rounds ----
    #[test]
    fn test_burst_mode_fires_three_per_pull() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_BURST_PISTOL);
        if let Some(w) = &mut ctx.players[id].weapon {
            w.state.burst_mode = true;
        }
        let mut rec = Recorder::default();
        // single pull, then release
        let cmd = attack_cmd(11);
        tick(&mut ctx, &mut rec, id, &cmd);
        let idle = MoveCommand {
            msec: 16,
            random_seed: 11,
            ..MoveCommand::default()
        };
        for _ in 0..30 {
            tick(&mut ctx, &mut rec, id, &idle);
        }
        assert_eq!(rec.bullets, 3, "one pull discharges the full burst");
        assert_eq!(ctx.players[id].weapon.unwrap().state.clip, 20 - 3);
    }

    #[test]
    fn test_burst_toggle_via_secondary() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_BURST_PISTOL);
        let mut rec = Recorder::default();
        let cmd = MoveCommand {
            msec: 16,
            buttons: Buttons::ATTACK2,
            ..MoveCommand::default()
        };
        tick(&mut ctx, &mut rec, id, &cmd);
        assert!(ctx.players[id].weapon.unwrap().state.burst_mode);
        // held button is not a second press
        tick(&mut ctx, &mut rec, id, &cmd);
        assert!(ctx.players[id].weapon.unwrap().state.burst_mode);
        // release then press again toggles back
        let idle = MoveCommand {
            msec: 16,
            ..MoveCommand::default()
        };
        tick(&mut ctx, &mut rec, id, &idle);
        tick(&mut ctx, &mut rec, id, &cmd);
        assert!(!ctx.players[id].weapon.unwrap().state.burst_mode);
    }

    // ---- silencer toggle and interrupt ----
    #[test]
    fn test_silencer_completes_after_busy_window() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_PISTOL);
        let mut rec = Recorder::default();
        let press = MoveCommand {
            msec: 16,
            buttons: Buttons::ATTACK2,
            ..MoveCommand::default()
        };
        tick(&mut ctx, &mut rec, id, &press);
        assert!(!ctx.players[id].weapon.unwrap().state.silencer_on, "not on yet");
        assert!(ctx.players[id].weapon.unwrap().silencer_pending.is_some());

        // fire attempts during the busy window do nothing
        let shoot = attack_cmd(5);
        for _ in 0..10 {
            tick(&mut ctx, &mut rec, id, &shoot);
        }
        assert_eq!(rec.bullets, 0, "weapon is busy while screwing");

        let idle = MoveCommand {
            msec: 16,
            ..MoveCommand::default()
        };
        // 3 s silencer time at 16 ms ticks
        for _ in 0..200 {
            tick(&mut ctx, &mut rec, id, &idle);
        }
        let w = ctx.players[id].weapon.unwrap();
        assert!(w.state.silencer_on);
        assert!(w.silencer_pending.is_none());
        assert!(rec.sounds.iter().any(|s| s == "weapons/silencer_on"));
    }

    #[test]
    fn test_silencer_interrupt_reverts_atomically() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_PISTOL);
        let mut rec = Recorder::default();
        let press = MoveCommand {
            msec: 16,
            buttons: Buttons::ATTACK2,
            ..MoveCommand::default()
        };
        tick(&mut ctx, &mut rec, id, &press);

        // drop mid-screw
        let dropped = drop_weapon(&mut ctx, id).unwrap();
        assert!(dropped.silencer_pending.is_none());
        assert!(!dropped.state.silencer_on, "toggle never half-applies");
        assert_eq!(dropped.busy_until, 0.0);
    }

    #[test]
    fn test_silenced_shots_report_silenced() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_PISTOL);
        if let Some(w) = &mut ctx.players[id].weapon {
            w.state.silencer_on = true;
        }
        let mut rec = Recorder::default();
        tick(&mut ctx, &mut rec, id, &attack_cmd(9));
        assert_eq!(rec.flashes_silenced, vec![true]);
        assert!(rec.sounds.iter().any(|s| s == "weapons/fire_sil"));
    }

    #[test]
    fn test_reload_transfers_from_reserve_after_delay() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_ASSAULT_RIFLE);
        if let Some(w) = &mut ctx.players[id].weapon {
            w.state.clip = 4;
        }
        let mut rec = Recorder::default();
        let press = MoveCommand {
            msec: 16,
            buttons: Buttons::RELOAD,
            ..MoveCommand::default()
        };
        tick(&mut ctx, &mut rec, id, &press);
        // still the old clip during the reload
        assert_eq!(ctx.players[id].weapon.unwrap().state.clip, 4);

        let idle = MoveCommand {
            msec: 16,
            ..MoveCommand::default()
        };
        for _ in 0..170 {
            tick(&mut ctx, &mut rec, id, &idle);
        }
        let w = ctx.players[id].weapon.unwrap();
        assert_eq!(w.state.clip, 30);
        assert_eq!(w.state.reserve, 90 - 26);
    }

    #[test]
    fn test_weapon_swap_interrupts_old_weapon() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_PISTOL);
        let mut rec = NullEvents;
        let press = MoveCommand {
            msec: 16,
            buttons: Buttons::ATTACK2,
            ..MoveCommand::default()
        };
        weapon_think(&mut ctx, &mut rec, id, &press).unwrap();
        assert!(ctx.players[id].weapon.unwrap().silencer_pending.is_some());

        let rifle = CarriedWeapon::new(w_defs::WEAPON_ASSAULT_RIFLE).unwrap();
        let old = give_weapon(&mut ctx, id, rifle).unwrap().unwrap();
        assert!(old.silencer_pending.is_none());
        assert_eq!(
            ctx.players[id].weapon.unwrap().spec_id,
            w_defs::WEAPON_ASSAULT_RIFLE
        );
    }

    #[test]
    fn test_no_weapon_is_not_an_error_for_think() {
        let mut ctx = GameContext::new(GameConfig::default(), 1);
        let id = ctx.connect_player("bare", PlayerClass::Recon).unwrap();
        let mut rec = NullEvents;
        assert!(weapon_think(&mut ctx, &mut rec, id, &attack_cmd(1)).is_ok());
    }

    #[test]
    fn test_shots_add_view_punch() {
        let (mut ctx, id) = armed_ctx(w_defs::WEAPON_ASSAULT_RIFLE);
        let mut rec = NullEvents;
        tick(&mut ctx, &mut rec, id, &attack_cmd(21));
        assert!(ctx.players[id].punch_angle[0] < 0.0, "recoil pitches the view up");
    }
}
