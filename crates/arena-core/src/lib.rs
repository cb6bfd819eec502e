//! Engine-vs-engine match orchestration over the USI protocol.
//!
//! This crate wraps one or more USI child-process engines in a session
//! object with a well-defined state machine (`session`), drives a single
//! game between two sessions (`controller`), and multiplexes many such
//! games in parallel while tracking results and an Elo estimate (`pool`).
//!
//! The crate never validates shogi moves or rules; `position` strings are
//! opaque to everything here except the `moves` suffix they accumulate.

pub mod elo;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod side;
pub mod think;
pub mod time_control;

pub mod controller;
pub mod pool;

pub use error::{ArenaError, ArenaResult};
pub use side::Side;
