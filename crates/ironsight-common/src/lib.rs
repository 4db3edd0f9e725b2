// Shared client/server game-logic core.
//
// Everything in this crate must be a pure function of
// (state, command, shared seed, trace service) — the same code runs on
// the predicting client and the authoritative server and must produce
// bit-identical results on both.

pub mod classmove;
pub mod fire;
pub mod gamemove;
pub mod movedata;
pub mod shared;
