// cl_pred.rs — Client-side movement prediction
//
// The client runs the shared movement core locally for every command it
// has sent but the server has not yet acknowledged. When an
// authoritative frame arrives, the state snaps to it and the unacked
// command tail is replayed on top, so a correct prediction produces
// bit-identical origins and corrections are invisible.

use serde::{Deserialize, Serialize};

use ironsight_common::gamemove::player_move;
use ironsight_common::movedata::{MoveData, NetMoveState};
use ironsight_common::shared::{
    vector_length, vector_subtract, MoveCommand, PlayerClass, TraceService, Vec3,
};

/// Ring size for sent-but-unacked commands; must be a power of two.
pub const CMD_BACKUP: usize = 64;
const CMD_MASK: u32 = (CMD_BACKUP - 1) as u32;

/// Corrections larger than this are treated as teleports (respawn,
/// vehicle entry) and applied without smoothing.
pub const MAX_PREDICTION_ERROR: f32 = 80.0;

/// Per-tick decay factor applied to the displayed prediction error.
const ERROR_DECAY: f32 = 0.25;

/// Authoritative per-player snapshot from the server, tagged with the
/// last command sequence it accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub ack_sequence: u32,
    pub state: NetMoveState,
}

pub struct Prediction {
    /// Sent commands, indexed by sequence & CMD_MASK.
    commands: [MoveCommand; CMD_BACKUP],
    /// Origin we predicted after applying each command.
    predicted_origins: [Vec3; CMD_BACKUP],
    /// Sequence of the next command to send.
    pub outgoing_sequence: u32,
    /// Residual correction the view layer bleeds off over a few frames.
    pub prediction_error: Vec3,
    /// Predicted state after the latest replay.
    state: MoveData,
}

impl Prediction {
    pub fn new(class: PlayerClass) -> Self {
        Self {
            commands: [MoveCommand::default(); CMD_BACKUP],
            predicted_origins: [[0.0; 3]; CMD_BACKUP],
            outgoing_sequence: 0,
            prediction_error: [0.0; 3],
            state: MoveData::for_class(class),
        }
    }

    pub fn predicted_state(&self) -> &MoveData {
        &self.state
    }

    /// Store an outgoing command and return its sequence number.
    pub fn record_command(&mut self, cmd: MoveCommand) -> u32 {
        let seq = self.outgoing_sequence;
        self.commands[(seq & CMD_MASK) as usize] = cmd;
        self.outgoing_sequence = seq.wrapping_add(1);
        seq
    }

    /// Compare the server's authoritative origin against what we
    /// predicted when the acked command was applied. Small errors are
    /// kept for smoothing; teleport-sized ones are swallowed whole.
    pub fn check_prediction_error(&mut self, frame: &ServerFrame) {
        let predicted = self.predicted_origins[(frame.ack_sequence & CMD_MASK) as usize];
        let delta = vector_subtract(&frame.state.origin, &predicted);
        let len = vector_length(&delta);

        if len > MAX_PREDICTION_ERROR {
            // teleport: snap, nothing to smooth
            log::debug!("prediction teleport, {len:.1} units");
            self.prediction_error = [0.0; 3];
        } else if len > 0.0 {
            log::trace!("prediction miss, {len:.2} units");
            self.prediction_error = delta;
        } else {
            self.prediction_error = [0.0; 3];
        }
    }

    /// Snap to the server frame and replay every command after the
    /// acked one. Commands older than the ring are gone; the server
    /// acking that far behind means the connection is beyond saving
    /// anyway.
    pub fn replay(&mut self, frame: &ServerFrame, tr: &impl TraceService) {
        frame.state.decode(&mut self.state);

        let first = frame.ack_sequence.wrapping_add(1);
        let count = self.outgoing_sequence.wrapping_sub(first).min(CMD_BACKUP as u32);

        for i in 0..count {
            let seq = first.wrapping_add(i);
            let cmd = self.commands[(seq & CMD_MASK) as usize];
            player_move(&mut self.state, &cmd, tr);
            self.predicted_origins[(seq & CMD_MASK) as usize] = self.state.origin;
        }
    }

    /// Bleed the correction off exponentially; called once per render
    /// frame.
    pub fn decay_error(&mut self) {
        for e in self.prediction_error.iter_mut() {
            *e *= 1.0 - ERROR_DECAY;
            if e.abs() < 0.01 {
                *e = 0.0;
            }
        }
    }

    /// Render origin: predicted origin plus the decaying correction.
    pub fn render_origin(&self) -> Vec3 {
        [
            self.state.origin[0] + self.prediction_error[0],
            self.state.origin[1] + self.prediction_error[1],
            self.state.origin[2] + self.prediction_error[2],
        ]
    }
}

// ============================================================
// Unit tests
// ============================================================
