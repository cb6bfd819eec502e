//! Single 1-vs-1 engine match driver.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;

use arena_cli::book;
use arena_core::controller::MatchController;
use arena_core::logging::Logger;
use arena_core::session::{EngineSession, EngineState};

#[derive(Parser, Debug)]
#[command(name = "arena-match", about = "Play one USI-vs-USI game and print the result")]
struct Cli {
    /// Path to the first engine's binary
    #[arg(long)]
    engine1: PathBuf,
    /// Path to the second engine's binary
    #[arg(long)]
    engine2: PathBuf,
    /// Time-control token string, e.g. "time 900000 byoyomi 5000"
    #[arg(long)]
    time: String,
    /// Opening-book file; defaults to a single "startpos" line
    #[arg(long)]
    book: Option<PathBuf>,
    /// Number of book plies to keep when sampling the opening
    #[arg(long, default_value_t = 0)]
    book_ply: u32,
    /// Plies before the game is declared a draw
    #[arg(long, default_value_t = arena_core::controller::DEFAULT_MAX_PLIES)]
    max_plies: u32,
    /// Swap which engine plays which color
    #[arg(long)]
    flip_turn: bool,
    /// Log file for the game transcript
    #[arg(long, default_value = "arena-match.log")]
    log: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let logger = Logger::new(&cli.log, true).context("failed to open match log")?;
    logger.log(&format!("starting match: {:?} vs {:?}", cli.engine1, cli.engine2));

    let book_lines = match &cli.book {
        Some(path) => book::load_book(path)?,
        None => book::default_book(),
    };
    let opening = &book_lines[rand::rng().random_range(0..book_lines.len())];

    let mut session1 = EngineSession::new();
    session1
        .connect(&cli.engine1)
        .with_context(|| format!("connecting to engine1 at {}", cli.engine1.display()))?;
    session1.wait_for_state(EngineState::WaitCommand)?;

    let mut session2 = EngineSession::new();
    session2
        .connect(&cli.engine2)
        .with_context(|| format!("connecting to engine2 at {}", cli.engine2.display()))?;
    session2.wait_for_state(EngineState::WaitCommand)?;

    let controller = MatchController::new(Arc::new(session1), Arc::new(session2));
    controller.set_time_setting(&cli.time)?;
    controller.set_max_plies(cli.max_plies);
    controller.set_flip_turn(cli.flip_turn);

    controller.game_start(opening, cli.book_ply)?;
    controller.join();

    let result = controller.result();
    let sfen = controller.sfen();
    logger.log(&format!("result={result:?} sfen={sfen}"));

    println!("{sfen}");
    println!("{result:?}");

    Ok(())
}
