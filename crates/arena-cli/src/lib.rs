//! CLI-boundary ambient modules shared by the `arena-match` and
//! `arena-pool` binaries: engine-definition files and opening books. The
//! core library never opens either of these itself.

pub mod book;
pub mod engine_def;
