//! Drives one game between two connected [`EngineSession`]s: time
//! accounting, move-by-move sfen accumulation, and termination rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::error::ArenaResult;
use crate::session::EngineSession;
use crate::side::Side;
use crate::time_control::{parse_time_setting, TimeTable};

/// Plies played before a non-terminating game is declared a draw.
pub const DEFAULT_MAX_PLIES: u32 = 320;

/// A clock that drops this far below zero ends the game as a time loss.
const TIMEUP_GRACE_MS: i64 = 2000;

/// Absorbs think/response round-trip overhead before converting elapsed
/// wall time to whole-second clock quanta.
const ELAPSED_DEDUCTION_SECONDS: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    BlackWin,
    WhiteWin,
    Draw,
    MaxMoves,
    IllegalMove,
    Init,
    Playing,
    StopGame,
}

impl GameResult {
    pub fn is_gameover(&self) -> bool {
        !matches!(self, GameResult::Init | GameResult::Playing)
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, GameResult::Draw | GameResult::MaxMoves)
    }

    /// `(BlackWin && !flip) || (WhiteWin && flip)`.
    pub fn is_player1_win(&self, flip_turn: bool) -> bool {
        matches!(
            (self, flip_turn),
            (GameResult::BlackWin, false) | (GameResult::WhiteWin, true)
        )
    }
}

/// One completed game, recorded by the pool when its controller finishes.
#[derive(Debug, Clone)]
pub struct GameKifu {
    pub sfen: String,
    pub flip_turn: bool,
    pub result: GameResult,
}

struct Inner {
    sfen: String,
    ply: u32,
    side_to_move: Side,
    /// Indexed by player slot (0 = engine 0 / "1p", 1 = engine 1 / "2p"),
    /// not by color.
    remaining: [i64; 2],
    time_table: TimeTable,
    flip_turn: bool,
    result: GameResult,
    max_plies: u32,
}

pub struct MatchController {
    engines: [Arc<EngineSession>; 2],
    inner: Mutex<Inner>,
    stop: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MatchController {
    pub fn new(engine0: Arc<EngineSession>, engine1: Arc<EngineSession>) -> Arc<MatchController> {
        Arc::new(MatchController {
            engines: [engine0, engine1],
            inner: Mutex::new(Inner {
                sfen: String::from("startpos moves"),
                ply: 0,
                side_to_move: Side::Black,
                remaining: [0, 0],
                time_table: TimeTable::default(),
                flip_turn: false,
                result: GameResult::Init,
                max_plies: DEFAULT_MAX_PLIES,
            }),
            stop: AtomicBool::new(false),
            driver: Mutex::new(None),
        })
    }

    pub fn set_time_setting(&self, spec: &str) -> ArenaResult<()> {
        let table = parse_time_setting(spec)?;
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.time_table = table;
        Ok(())
    }

    pub fn set_flip_turn(&self, flip: bool) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.flip_turn = flip;
    }

    pub fn set_max_plies(&self, max_plies: u32) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.max_plies = max_plies;
    }

    pub fn sfen(&self) -> String {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sfen.clone()
    }

    pub fn ply(&self) -> u32 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).ply
    }

    pub fn side_to_move(&self) -> Side {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).side_to_move
    }

    pub fn flip_turn(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).flip_turn
    }

    pub fn result(&self) -> GameResult {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).result
    }

    /// Runs the setup steps synchronously, then spawns the driver thread
    /// that plays out the game.
    pub fn game_start(self: &Arc<Self>, start_sfen: &str, start_ply: u32) -> ArenaResult<()> {
        let sfen = prepare_start_sfen(start_sfen, start_ply);
        self.engines[0].usi_position(&sfen)?;
        let side_line = self.engines[0].get_side_to_move()?;
        let side_to_move = if side_line.trim() == "white" {
            Side::White
        } else {
            Side::Black
        };
        self.engines[0].send_command("usinewgame")?;
        self.engines[1].send_command("usinewgame")?;

        {
            let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            g.sfen = sfen;
            g.ply = 0;
            g.side_to_move = side_to_move;
            g.remaining = [g.time_table.time1p as i64, g.time_table.time2p as i64];
            g.result = GameResult::Playing;
        }

        self.stop.store(false, Ordering::SeqCst);

        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("match-driver".to_string())
            .spawn(move || this.run_loop())
            .expect("failed to spawn match-driver thread");
        *self.driver.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    pub fn terminate(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = h.join();
        }
    }

    /// Blocks the calling thread until the game reaches a terminal result.
    pub fn join(&self) {
        if let Some(h) = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = h.join();
        }
    }

    fn run_loop(self: Arc<Self>) {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                self.finalize(GameResult::StopGame);
                return;
            }

            let (ply, max_plies, side, flip, sfen, remaining, table) = {
                let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                (
                    g.ply,
                    g.max_plies,
                    g.side_to_move,
                    g.flip_turn,
                    g.sfen.clone(),
                    g.remaining,
                    g.time_table,
                )
            };

            if ply >= max_plies {
                self.finalize(GameResult::MaxMoves);
                return;
            }

            let mover_idx = player_number(side, flip);
            let black_idx = player_number(Side::Black, flip);
            let white_idx = player_number(Side::White, flip);

            let byoyomi_mover = if mover_idx == 0 { table.byoyomi1p } else { table.byoyomi2p };
            let inc_mover = if mover_idx == 0 { table.inc1p } else { table.inc2p };
            let inc_black = if black_idx == 0 { table.inc1p } else { table.inc2p };
            let inc_white = if white_idx == 0 { table.inc1p } else { table.inc2p };

            let go_args = if inc_mover == 0 {
                format!(
                    "btime {} wtime {} byoyomi {}",
                    remaining[black_idx], remaining[white_idx], byoyomi_mover
                )
            } else {
                format!(
                    "btime {} wtime {} binc {} winc {}",
                    remaining[black_idx], remaining[white_idx], inc_black, inc_white
                )
            };

            let engine = Arc::clone(&self.engines[mover_idx]);
            if let Err(e) = engine.usi_position(&sfen) {
                log::warn!("position failed mid-game: {e}");
                self.finalize(GameResult::IllegalMove);
                return;
            }

            let started = Instant::now();
            let think = match engine.usi_go_and_wait_bestmove(&go_args) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("engine died mid-game: {e}");
                    self.finalize(GameResult::IllegalMove);
                    return;
                }
            };
            let elapsed = started.elapsed();

            let raw_secs = elapsed.as_secs_f64() - ELAPSED_DEDUCTION_SECONDS;
            let elapsed_ms = (raw_secs.max(0.0).ceil() * 1000.0) as i64;

            let new_remaining = remaining[mover_idx] - elapsed_ms;
            if new_remaining < -TIMEUP_GRACE_MS {
                log::warn!(
                    "side {side:?} (player {mover_idx}) timed out by {}ms",
                    -new_remaining - TIMEUP_GRACE_MS
                );
                let winner = if side == Side::Black { GameResult::WhiteWin } else { GameResult::BlackWin };
                self.finalize(winner);
                return;
            }
            let clamped = new_remaining.max(0) + inc_mover as i64;

            let best_move = think.best_move.as_deref().unwrap_or("none").to_string();
            match best_move.as_str() {
                "resign" => {
                    let winner = if side == Side::Black { GameResult::WhiteWin } else { GameResult::BlackWin };
                    self.finalize(winner);
                    return;
                }
                "win" => {
                    let winner = if side == Side::Black { GameResult::BlackWin } else { GameResult::WhiteWin };
                    self.finalize(winner);
                    return;
                }
                mv => {
                    let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                    g.sfen.push(' ');
                    g.sfen.push_str(mv);
                    g.side_to_move = side.flip();
                    g.ply += 1;
                    g.remaining[mover_idx] = clamped;
                }
            }
        }
    }

    fn finalize(&self, result: GameResult) {
        {
            let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            g.result = result;
        }
        let flip = self.flip_turn();
        match result {
            GameResult::Draw | GameResult::MaxMoves => {
                let _ = self.engines[0].send_command("gameover draw");
                let _ = self.engines[1].send_command("gameover draw");
            }
            GameResult::BlackWin | GameResult::WhiteWin => {
                let winning_side = if result == GameResult::BlackWin { Side::Black } else { Side::White };
                let winner_idx = player_number(winning_side, flip);
                let loser_idx = 1 - winner_idx;
                let _ = self.engines[winner_idx].send_command("gameover win");
                let _ = self.engines[loser_idx].send_command("gameover lose");
            }
            _ => {}
        }
    }
}

/// Player slot (0 or 1) that controls `side`, inverted when `flip_turn`.
fn player_number(side: Side, flip_turn: bool) -> usize {
    match (side, flip_turn) {
        (Side::Black, false) => 0,
        (Side::White, false) => 1,
        (Side::Black, true) => 1,
        (Side::White, true) => 0,
    }
}

/// Appends " moves" if missing, and truncates the move list to
/// `start_ply - 1` tokens when `start_ply > 0`.
fn prepare_start_sfen(start_sfen: &str, start_ply: u32) -> String {
    let mut sfen = if start_sfen.contains("moves") {
        start_sfen.to_string()
    } else {
        format!("{start_sfen} moves")
    };

    if start_ply > 0 {
        if let Some(idx) = sfen.find("moves") {
            let (prefix, rest) = sfen.split_at(idx + "moves".len());
            let moves: Vec<&str> = rest.split_whitespace().collect();
            let keep = (start_ply as usize - 1).min(moves.len());
            let truncated = moves[..keep].join(" ");
            sfen = if truncated.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix} {truncated}")
            };
        }
    }
    sfen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_number_without_flip() {
        assert_eq!(player_number(Side::Black, false), 0);
        assert_eq!(player_number(Side::White, false), 1);
    }

    #[test]
    fn player_number_with_flip_is_inverted() {
        assert_eq!(player_number(Side::Black, true), 1);
        assert_eq!(player_number(Side::White, true), 0);
    }

    #[test]
    fn is_player1_win_matches_color_and_flip() {
        assert!(GameResult::BlackWin.is_player1_win(false));
        assert!(!GameResult::BlackWin.is_player1_win(true));
        assert!(GameResult::WhiteWin.is_player1_win(true));
        assert!(!GameResult::WhiteWin.is_player1_win(false));
    }

    #[test]
    fn is_gameover_excludes_init_and_playing() {
        assert!(!GameResult::Init.is_gameover());
        assert!(!GameResult::Playing.is_gameover());
        assert!(GameResult::Draw.is_gameover());
        assert!(GameResult::StopGame.is_gameover());
    }

    #[test]
    fn is_draw_covers_draw_and_max_moves() {
        assert!(GameResult::Draw.is_draw());
        assert!(GameResult::MaxMoves.is_draw());
        assert!(!GameResult::BlackWin.is_draw());
    }

    #[test]
    fn prepare_start_sfen_appends_moves_token() {
        assert_eq!(prepare_start_sfen("startpos", 0), "startpos moves");
    }

    #[test]
    fn prepare_start_sfen_truncates_to_book_ply() {
        let sfen = "startpos moves 7g7f 3c3d 2g2f 8c8d";
        assert_eq!(prepare_start_sfen(sfen, 3), "startpos moves 7g7f 3c3d");
    }

    #[test]
    fn prepare_start_sfen_truncation_shorter_than_book_keeps_all() {
        let sfen = "startpos moves 7g7f";
        assert_eq!(prepare_start_sfen(sfen, 10), "startpos moves 7g7f");
    }
}
