// g_local.rs — Game state, entity arenas, and host seams

use ironsight_common::fire::{AccuracyModel, WeaponState};
use ironsight_common::movedata::MoveData;
use ironsight_common::shared::{Buttons, PlayerClass, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::g_vehicle::Vehicle;
use crate::w_defs;

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("player slot {0} is not in use")]
    NoSuchPlayer(usize),
    #[error("vehicle slot {0} is not in use")]
    NoSuchVehicle(usize),
    #[error("player {0} holds no weapon")]
    NoWeapon(usize),
    #[error("unknown weapon id {0}")]
    UnknownWeapon(usize),
    #[error("every seat is occupied")]
    VehicleFull,
    #[error("player {0} is not seated in a vehicle")]
    NotSeated(usize),
    #[error("player {0} is already seated in a vehicle")]
    AlreadySeated(usize),
    #[error("no clear space to exit the vehicle")]
    NoExitRoom,
}

pub type GameResult<T> = Result<T, GameError>;

// ============================================================
// Server configuration
// ============================================================

/// Match rules read from server configuration; fixed for the lifetime
/// of a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameConfig {
    /// Which inaccuracy model weapons run under.
    pub alt_accuracy: bool,
    /// Disables the post-jump horizontal speed clamp.
    pub allow_bunnyhop: bool,
    pub gravity: f32,
    pub max_speed: f32,
    /// Entry/exit search radius around vehicles.
    pub vehicle_use_radius: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            alt_accuracy: false,
            allow_bunnyhop: false,
            gravity: 800.0,
            max_speed: 320.0,
            vehicle_use_radius: 128.0,
        }
    }
}

impl GameConfig {
    pub fn accuracy_model(&self) -> AccuracyModel {
        if self.alt_accuracy {
            AccuracyModel::Alternate
        } else {
            AccuracyModel::Legacy
        }
    }
}

// ============================================================
// Outbound event seam
// ============================================================

/// Side effects the game logic raises toward the engine host: sounds,
/// effects, hitscan resolution, HUD updates. The host decides how to
/// replicate them; game code only reports that they happened.
pub trait GameEvents {
    fn play_sound(&mut self, player: usize, sound: &str);
    fn muzzle_flash(&mut self, player: usize, silenced: bool);
    /// Resolve one hitscan round from the player's eye along their aim,
    /// offset by the spread pair.
    fn fire_bullet(&mut self, player: usize, spread: [f32; 2], range: f32, damage: i32);
    fn ammo_update(&mut self, player: usize, clip: i32, reserve: i32);
    fn footstep(&mut self, player: usize);
}

/// Discards everything; for tests and dedicated tooling.
#[derive(Default)]
pub struct NullEvents;

impl GameEvents for NullEvents {
    fn play_sound(&mut self, _player: usize, _sound: &str) {}
    fn muzzle_flash(&mut self, _player: usize, _silenced: bool) {}
    fn fire_bullet(&mut self, _player: usize, _spread: [f32; 2], _range: f32, _damage: i32) {}
    fn ammo_update(&mut self, _player: usize, _clip: i32, _reserve: i32) {}
    fn footstep(&mut self, _player: usize) {}
}

// ============================================================
// Entities
// ============================================================

/// Where a seated player sits: vehicle arena index plus seat number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatRef {
    pub vehicle: usize,
    pub seat: usize,
}

/// Carried weapon instance. The fire-control state lives in the shared
/// crate; the busy/pending bookkeeping is server-side only.
#[derive(Debug, Clone, Copy)]
pub struct CarriedWeapon {
    /// Index into the weapon definition table.
    pub spec_id: usize,
    pub state: WeaponState,
    /// Weapon accepts no input until this time (silencer work, reload).
    pub busy_until: f32,
    /// In-flight silencer toggle; reverted wholesale if interrupted.
    pub silencer_pending: Option<bool>,
    /// Rounds transfer when the busy window ends, not before.
    pub reload_pending: bool,
}

impl CarriedWeapon {
    pub fn new(spec_id: usize) -> GameResult<Self> {
        let spec = w_defs::weapon_spec(spec_id).ok_or(GameError::UnknownWeapon(spec_id))?;
        Ok(Self {
            spec_id,
            state: WeaponState::for_spec(spec),
            busy_until: 0.0,
            silencer_pending: None,
            reload_pending: false,
        })
    }
}

/// Number of landing impacts averaged for camera smoothing.
pub const STEP_RING_SIZE: usize = 8;

#[derive(Debug)]
pub struct Player {
    pub in_use: bool,
    pub name: String,
    pub class: PlayerClass,
    /// Movement record; the shared engine reads and writes it in place.
    pub mv: MoveData,
    /// Accumulated view punch, decayed every tick.
    pub punch_angle: Vec3,
    pub weapon: Option<CarriedWeapon>,
    pub seat: Option<SeatRef>,
    /// Buttons from the previous command, for press-edge detection.
    pub old_buttons: Buttons,
    /// Recent step heights, averaged to smooth the camera over stairs.
    pub step_ring: [f32; STEP_RING_SIZE],
    pub step_ring_pos: usize,
    /// Distance accumulator for footstep events.
    pub footstep_dist: f32,
    pub health: i32,
}

impl Player {
    fn empty() -> Self {
        Self {
            in_use: false,
            name: String::new(),
            class: PlayerClass::Undecided,
            mv: MoveData::default(),
            punch_angle: [0.0; 3],
            weapon: None,
            seat: None,
            old_buttons: Buttons::empty(),
            step_ring: [0.0; STEP_RING_SIZE],
            step_ring_pos: 0,
            footstep_dist: 0.0,
            health: 0,
        }
    }
}

// ============================================================
// Game context — owns every arena, passed explicitly everywhere
// ============================================================

pub struct GameContext {
    pub config: GameConfig,
    /// Absolute game time in seconds.
    pub time: f32,
    pub players: Vec<Player>,
    pub vehicles: Vec<Vehicle>,
    /// Seed source for per-command shot seeds; the drawn seed is
    /// replicated with the command, not this generator.
    seed_rng: SmallRng,
}

impl GameContext {
    pub fn new(config: GameConfig, max_players: usize) -> Self {
        let players = (0..max_players).map(|_| Player::empty()).collect();
        Self {
            config,
            time: 0.0,
            players,
            vehicles: Vec::new(),
            seed_rng: SmallRng::seed_from_u64(0x1505_F00D),
        }
    }

    /// Fresh per-command shot seed. Drawn server-side, replicated to
    /// the client inside the acknowledged command.
    pub fn next_shot_seed(&mut self) -> u32 {
        self.seed_rng.gen()
    }

    pub fn player(&self, id: usize) -> GameResult<&Player> {
        self.players
            .get(id)
            .filter(|p| p.in_use)
            .ok_or(GameError::NoSuchPlayer(id))
    }

    pub fn player_mut(&mut self, id: usize) -> GameResult<&mut Player> {
        self.players
            .get_mut(id)
            .filter(|p| p.in_use)
            .ok_or(GameError::NoSuchPlayer(id))
    }

    pub fn vehicle(&self, id: usize) -> GameResult<&Vehicle> {
        self.vehicles
            .get(id)
            .filter(|v| v.in_use)
            .ok_or(GameError::NoSuchVehicle(id))
    }

    pub fn vehicle_mut(&mut self, id: usize) -> GameResult<&mut Vehicle> {
        self.vehicles
            .get_mut(id)
            .filter(|v| v.in_use)
            .ok_or(GameError::NoSuchVehicle(id))
    }

    /// Claim a free player slot. Returns the slot index.
    pub fn connect_player(&mut self, name: &str, class: PlayerClass) -> Option<usize> {
        let slot = self.players.iter().position(|p| !p.in_use)?;
        let p = &mut self.players[slot];
        *p = Player::empty();
        p.in_use = true;
        p.name = name.to_owned();
        p.class = class;
        p.health = 100;
        p.mv = MoveData::for_class(class);
        p.mv.gravity = self.config.gravity;
        p.mv.max_speed = self.config.max_speed;
        if self.config.allow_bunnyhop {
            p.mv
                .flags
                .insert(ironsight_common::movedata::MoveFlags::NO_BHOP_CAP);
        }
        log::info!("player {} connected to slot {} as {:?}", name, slot, class);
        Some(slot)
    }

    pub fn disconnect_player(&mut self, id: usize) -> GameResult<()> {
        // vacate any seat first so the vehicle doesn't keep a stale ref
        if let Some(seat) = self.player(id)?.seat {
            if let Ok(v) = self.vehicle_mut(seat.vehicle) {
                v.seats[seat.seat] = None;
            }
        }
        let name = std::mem::take(&mut self.players[id].name);
        self.players[id] = Player::empty();
        log::info!("player {} disconnected from slot {}", name, id);
        Ok(())
    }

    pub fn spawn_vehicle(&mut self, vehicle: Vehicle) -> usize {
        if let Some(slot) = self.vehicles.iter().position(|v| !v.in_use) {
            self.vehicles[slot] = vehicle;
            slot
        } else {
            self.vehicles.push(vehicle);
            self.vehicles.len() - 1
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
