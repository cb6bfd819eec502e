//! Error kinds shared by the session, controller and pool layers.

use std::path::PathBuf;

/// Result alias used throughout this crate.
pub type ArenaResult<T> = Result<T, ArenaError>;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("engine binary not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to spawn engine process at {path}: {source}")]
    ConnectError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("illegal state transition: tried to {action} while in {state}")]
    IllegalState { action: String, state: String },

    #[error("unrecognized time control token: {0}")]
    BadTimeSpec(String),

    #[error("failed to parse engine response: {0}")]
    Parse(String),

    #[error("clock underflow for side {side}: {overrun_ms}ms past the limit")]
    Timeup { side: String, overrun_ms: i64 },

    #[error("game stopped externally before completion")]
    StopGame,

    #[error("engine process at {path} exited unexpectedly")]
    ChildDied { path: PathBuf },

    #[error("session is disconnected")]
    Disconnected,
}
