// Server-side game layer: entity arenas, weapons, vehicles, and the
// per-player tick that drives the shared movement core.

pub mod g_local;
pub mod g_vehicle;
pub mod p_client;
pub mod p_view;
pub mod p_weapon;
pub mod w_defs;
