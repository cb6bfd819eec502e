//! Parallel pool driver: runs many concurrent games between two engines
//! and reports win/draw counts plus an Elo estimate.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use arena_cli::book;
use arena_cli::engine_def::{load_engine_def, write_engine_def, EngineDef};
use arena_core::pool::MatchPool;

#[derive(Parser, Debug)]
#[command(name = "arena-pool", about = "Run a parallel pool of USI-vs-USI games")]
struct Cli {
    /// Directory containing exactly two engine_define.txt-shaped files
    #[arg(long)]
    engines_folder: PathBuf,
    /// Time-control token string, e.g. "byoyomi 100"
    #[arg(long)]
    time: String,
    /// Total games to play before stopping
    #[arg(long, visible_alias = "loops", default_value_t = 100)]
    games: u64,
    /// Number of concurrent controllers (cores)
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
    /// Alternate which engine plays which color every other game
    #[arg(long)]
    flip_turn: bool,
    /// Opening-book file; defaults to a single "startpos" line
    #[arg(long)]
    book: Option<PathBuf>,
    /// Number of book plies to keep when sampling an opening
    #[arg(long, default_value_t = 0)]
    book_ply: u32,
    /// Output directory for the log file and the final Elo summary
    #[arg(long, default_value = "runs/arena_pool")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    fs::create_dir_all(&cli.out)
        .with_context(|| format!("failed to create output directory {}", cli.out.display()))?;

    let mut def_paths: Vec<PathBuf> = fs::read_dir(&cli.engines_folder)
        .with_context(|| format!("failed to read engines folder {}", cli.engines_folder.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    def_paths.sort();
    if def_paths.len() != 2 {
        bail!(
            "engines folder {} must contain exactly two engine definitions, found {}",
            cli.engines_folder.display(),
            def_paths.len()
        );
    }
    let def0 = load_engine_def(&def_paths[0])?;
    let def1 = load_engine_def(&def_paths[1])?;

    let book_lines = match &cli.book {
        Some(path) => book::load_book(path)?,
        None => book::default_book(),
    };

    let pool = MatchPool::init_server(cli.concurrency.max(1), book_lines, cli.flip_turn);
    pool.init_engine(0, &def0.exe, options_for(&def0));
    pool.init_engine(1, &def1.exe, options_for(&def1));
    pool.set_time_setting(&cli.time);
    pool.set_book_ply(cli.book_ply);
    pool.game_start()?;

    while pool.total_games() < cli.games {
        std::thread::sleep(Duration::from_secs(1));
        log::info!(
            "progress: {}/{} games ({})",
            pool.total_games(),
            cli.games,
            pool.game_info()
        );
    }
    pool.game_stop();

    let stats = pool.game_rating();
    let summary = format!(
        "games={} p1win={} p2win={} draws={} black_win={} white_win={}\n{}\n",
        pool.total_games(),
        pool.player1_win(),
        pool.player2_win(),
        pool.draw_games(),
        pool.black_win(),
        pool.white_win(),
        stats.pretty()
    );
    fs::write(cli.out.join("summary.txt"), &summary)
        .with_context(|| format!("failed to write summary to {}", cli.out.display()))?;
    print!("{summary}");

    persist_rating(&def_paths[0], def0, stats.rating)?;
    persist_rating(&def_paths[1], def1, -stats.rating)?;

    Ok(())
}

fn options_for(def: &EngineDef) -> std::collections::HashMap<String, String> {
    let mut options = std::collections::HashMap::new();
    options.insert("Threads".to_string(), def.threads.to_string());
    options
}

/// Writes `rating` back verbatim, unless the definition is anchored
/// (`rating_fix: true`).
fn persist_rating(path: &PathBuf, mut def: EngineDef, rating: f64) -> Result<()> {
    if def.rating_fix {
        return Ok(());
    }
    def.rating = Some(rating);
    write_engine_def(path, &def)
}
