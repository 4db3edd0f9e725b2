// Client-side prediction over the shared game-logic core.

pub mod cl_pred;

pub use cl_pred::{Prediction, ServerFrame, CMD_BACKUP, MAX_PREDICTION_ERROR};
