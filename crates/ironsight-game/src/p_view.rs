// p_view.rs — View bookkeeping: punch decay and step smoothing

use ironsight_common::fire::decay_punch_angle;
use ironsight_common::shared::Vec3;

use crate::g_local::{Player, STEP_RING_SIZE};

/// Per-tick view pass: return accumulated weapon punch toward rest and
/// fold this tick's step rise into the smoothing ring.
pub fn view_think(player: &mut Player, frametime: f32) {
    decay_punch_angle(&mut player.punch_angle, frametime);

    // the ring decays toward zero; a step this tick overwrites the
    // oldest sample
    let sample = player.mv.out_step_height;
    player.step_ring[player.step_ring_pos] = sample;
    player.step_ring_pos = (player.step_ring_pos + 1) % STEP_RING_SIZE;
}

/// Averaged recent step height; the presentation layer subtracts this
/// from the camera z so stairs read as a glide instead of a pop.
pub fn smoothed_step(player: &Player) -> f32 {
    let sum: f32 = player.step_ring.iter().sum();
    sum / STEP_RING_SIZE as f32
}

/// World eye position: origin plus class view offset plus smoothing.
pub fn eye_position(player: &Player) -> Vec3 {
    let mut eye = player.mv.origin;
    for i in 0..3 {
        eye[i] += player.mv.view_offset[i];
    }
    eye[2] -= smoothed_step(player);
    eye
}

/// Final render angles: commanded view plus the weapon punch.
pub fn render_angles(player: &Player) -> Vec3 {
    [
        player.mv.view_angles[0] + player.punch_angle[0],
        player.mv.view_angles[1] + player.punch_angle[1],
        player.mv.view_angles[2] + player.punch_angle[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_local::{GameConfig, GameContext};
    use ironsight_common::shared::PlayerClass;

    fn player() -> Player {
        let mut ctx = GameContext::new(GameConfig::default(), 1);
        let id = ctx.connect_player("view", PlayerClass::Rifleman).unwrap();
        ctx.players.swap_remove(id)
    }

    #[test]
    fn test_punch_decays_through_view_think() {
        let mut p = player();
        p.punch_angle = [-3.0, 1.0, 0.0];
        for _ in 0..300 {
            view_think(&mut p, 0.016);
        }
        assert_eq!(p.punch_angle, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_step_ring_averages_recent_steps() {
        let mut p = player();
        assert_eq!(smoothed_step(&p), 0.0);

        // one 16-unit step, then quiet ticks
        p.mv.out_step_height = 16.0;
        view_think(&mut p, 0.016);
        p.mv.out_step_height = 0.0;
        let just_stepped = smoothed_step(&p);
        assert!(just_stepped > 0.0);
        assert!(just_stepped < 16.0, "the ring spreads the step out");

        // the sample ages out of the ring entirely
        for _ in 0..STEP_RING_SIZE {
            view_think(&mut p, 0.016);
        }
        assert_eq!(smoothed_step(&p), 0.0);
    }

    #[test]
    fn test_render_angles_include_punch() {
        let mut p = player();
        p.mv.view_angles = [10.0, 90.0, 0.0];
        p.punch_angle = [-2.0, 0.5, 0.0];
        assert_eq!(render_angles(&p), [8.0, 90.5, 0.0]);
    }
}
