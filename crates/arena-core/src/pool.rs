//! Runs many [`MatchController`]s concurrently, recycling each as soon as
//! it finishes, and aggregates results into an Elo estimate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rand::Rng;

use crate::controller::{GameKifu, GameResult, MatchController};
use crate::elo::{EloCounters, EloStats};
use crate::error::ArenaResult;
use crate::session::{EngineSession, EngineState};

/// How often the supervisor polls controllers for a terminal result.
const SUPERVISOR_TICK: Duration = Duration::from_secs(1);

struct EngineSlotConfig {
    path: PathBuf,
    options: HashMap<String, String>,
}

#[derive(Default)]
struct Counters {
    p1win: AtomicU64,
    p2win: AtomicU64,
    blackwin: AtomicU64,
    whitewin: AtomicU64,
    draws: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EloCounters {
        EloCounters {
            p1win: self.p1win.load(Ordering::Relaxed),
            p2win: self.p2win.load(Ordering::Relaxed),
            blackwin: self.blackwin.load(Ordering::Relaxed),
            whitewin: self.whitewin.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
        }
    }
}

/// A pool of `N` match controllers, built up with `init_engine`/
/// `set_time_setting` before `game_start`.
pub struct MatchPool {
    n: usize,
    engine_slots: [Mutex<Option<EngineSlotConfig>>; 2],
    time_setting: Mutex<String>,
    book: Vec<String>,
    flip_turn_every_game: bool,
    book_ply: AtomicU32,
    max_plies: AtomicU32,
    controllers: Mutex<Vec<Arc<MatchController>>>,
    counters: Counters,
    kifus: Mutex<Vec<GameKifu>>,
    stop: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl MatchPool {
    pub fn init_server(n: usize, book: Vec<String>, flip_turn_every_game: bool) -> Arc<MatchPool> {
        Arc::new(MatchPool {
            n,
            engine_slots: [Mutex::new(None), Mutex::new(None)],
            time_setting: Mutex::new(String::new()),
            book: if book.is_empty() { vec!["startpos".to_string()] } else { book },
            flip_turn_every_game,
            book_ply: AtomicU32::new(0),
            max_plies: AtomicU32::new(crate::controller::DEFAULT_MAX_PLIES),
            controllers: Mutex::new(Vec::with_capacity(n)),
            counters: Counters::default(),
            kifus: Mutex::new(Vec::with_capacity(n)),
            stop: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        })
    }

    pub fn init_engine(&self, player_slot: usize, path: impl AsRef<Path>, options: HashMap<String, String>) {
        assert!(player_slot < 2, "player_slot must be 0 or 1");
        *self.engine_slots[player_slot].lock().unwrap_or_else(|e| e.into_inner()) =
            Some(EngineSlotConfig { path: path.as_ref().to_path_buf(), options });
    }

    pub fn set_time_setting(&self, spec: &str) {
        *self.time_setting.lock().unwrap_or_else(|e| e.into_inner()) = spec.to_string();
    }

    pub fn set_book_ply(&self, book_ply: u32) {
        self.book_ply.store(book_ply, Ordering::Relaxed);
    }

    pub fn set_max_plies(&self, max_plies: u32) {
        self.max_plies.store(max_plies, Ordering::Relaxed);
    }

    /// Spawns every controller's pair of engines, starts each game, and
    /// launches the 1 Hz supervisor thread that recycles finished games.
    pub fn game_start(self: &Arc<Self>) -> ArenaResult<()> {
        let time_setting = self.time_setting.lock().unwrap_or_else(|e| e.into_inner()).clone();

        for i in 0..self.n {
            let engine0 = self.spawn_slot(0)?;
            let engine1 = self.spawn_slot(1)?;
            let controller = MatchController::new(engine0, engine1);
            controller.set_time_setting(&time_setting)?;
            controller.set_max_plies(self.max_plies.load(Ordering::Relaxed));
            let flip = self.flip_turn_every_game && i % 2 == 1;
            controller.set_flip_turn(flip);
            let opening = self.sample_opening();
            controller.game_start(&opening, self.book_ply.load(Ordering::Relaxed))?;
            self.controllers.lock().unwrap_or_else(|e| e.into_inner()).push(controller);
        }

        let pool = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("pool-supervisor".to_string())
            .spawn(move || pool.supervise())
            .expect("failed to spawn pool-supervisor thread");
        *self.supervisor.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    fn spawn_slot(&self, slot: usize) -> ArenaResult<Arc<EngineSession>> {
        let cfg = self.engine_slots[slot].lock().unwrap_or_else(|e| e.into_inner());
        let cfg = cfg.as_ref().expect("engine slot not configured");
        let mut session = EngineSession::new();
        session.set_options(cfg.options.clone());
        session.connect(&cfg.path)?;
        session.wait_for_state(EngineState::WaitCommand)?;
        Ok(Arc::new(session))
    }

    fn sample_opening(&self) -> String {
        let idx = rand::rng().random_range(0..self.book.len());
        self.book[idx].clone()
    }

    fn supervise(self: Arc<Self>) {
        while !self.stop.load(Ordering::SeqCst) {
            std::thread::sleep(SUPERVISOR_TICK);
            let controllers = self.controllers.lock().unwrap_or_else(|e| e.into_inner()).clone();
            let mut dead = Vec::new();
            for controller in &controllers {
                if self.stop.load(Ordering::SeqCst) {
                    break;
                }
                let result = controller.result();
                if !result.is_gameover() {
                    continue;
                }
                self.fold_result(result, controller.flip_turn());
                self.kifus.lock().unwrap_or_else(|e| e.into_inner()).push(GameKifu {
                    sfen: controller.sfen(),
                    flip_turn: controller.flip_turn(),
                    result,
                });

                let next_flip = if self.flip_turn_every_game {
                    !controller.flip_turn()
                } else {
                    controller.flip_turn()
                };
                controller.set_flip_turn(next_flip);
                let opening = self.sample_opening();
                // `game_start` only reaches `result = Playing` on success; on
                // failure `result` is left at the terminal value just folded
                // above. Drop the controller instead of leaving it in the
                // active list, or the next tick would re-fold the same
                // gameover result every second.
                if let Err(e) = controller.game_start(&opening, self.book_ply.load(Ordering::Relaxed)) {
                    log::warn!("failed to restart controller, dropping it from the pool: {e}");
                    dead.push(Arc::as_ptr(controller));
                }
            }
            if !dead.is_empty() {
                self.controllers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|c| !dead.contains(&Arc::as_ptr(c)));
            }
        }
    }

    fn fold_result(&self, result: GameResult, flip: bool) {
        match result {
            GameResult::Draw | GameResult::MaxMoves => {
                self.counters.draws.fetch_add(1, Ordering::Relaxed);
            }
            GameResult::BlackWin => {
                self.counters.blackwin.fetch_add(1, Ordering::Relaxed);
                if flip {
                    self.counters.p2win.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.p1win.fetch_add(1, Ordering::Relaxed);
                }
            }
            GameResult::WhiteWin => {
                self.counters.whitewin.fetch_add(1, Ordering::Relaxed);
                if flip {
                    self.counters.p1win.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.p2win.fetch_add(1, Ordering::Relaxed);
                }
            }
            _ => {}
        }
    }

    pub fn game_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.supervisor.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = h.join();
        }
        for controller in self.controllers.lock().unwrap_or_else(|e| e.into_inner()).iter() {
            controller.terminate();
        }
    }

    pub fn total_games(&self) -> u64 {
        let c = self.counters.snapshot();
        c.p1win + c.p2win + c.draws
    }

    pub fn player1_win(&self) -> u64 {
        self.counters.p1win.load(Ordering::Relaxed)
    }

    pub fn player2_win(&self) -> u64 {
        self.counters.p2win.load(Ordering::Relaxed)
    }

    pub fn black_win(&self) -> u64 {
        self.counters.blackwin.load(Ordering::Relaxed)
    }

    pub fn white_win(&self) -> u64 {
        self.counters.whitewin.load(Ordering::Relaxed)
    }

    pub fn draw_games(&self) -> u64 {
        self.counters.draws.load(Ordering::Relaxed)
    }

    pub fn game_kifus(&self) -> Vec<GameKifu> {
        self.kifus.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn game_rating(&self) -> EloStats {
        self.counters.snapshot().stats()
    }

    pub fn game_info(&self) -> String {
        self.game_rating().pretty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_result_without_flip_credits_color_to_matching_player() {
        let pool = MatchPool::init_server(1, vec!["startpos".to_string()], false);
        pool.fold_result(GameResult::BlackWin, false);
        assert_eq!(pool.black_win(), 1);
        assert_eq!(pool.player1_win(), 1);
        assert_eq!(pool.player2_win(), 0);
    }

    #[test]
    fn fold_result_with_flip_credits_color_to_inverted_player() {
        let pool = MatchPool::init_server(1, vec!["startpos".to_string()], true);
        pool.fold_result(GameResult::BlackWin, true);
        assert_eq!(pool.black_win(), 1);
        assert_eq!(pool.player1_win(), 0);
        assert_eq!(pool.player2_win(), 1);
    }

    #[test]
    fn fold_result_draw_does_not_touch_win_counters() {
        let pool = MatchPool::init_server(1, vec!["startpos".to_string()], false);
        pool.fold_result(GameResult::MaxMoves, false);
        assert_eq!(pool.draw_games(), 1);
        assert_eq!(pool.player1_win(), 0);
        assert_eq!(pool.player2_win(), 0);
    }

    #[test]
    fn total_games_sums_decisive_and_drawn() {
        let pool = MatchPool::init_server(1, vec!["startpos".to_string()], false);
        pool.fold_result(GameResult::BlackWin, false);
        pool.fold_result(GameResult::WhiteWin, false);
        pool.fold_result(GameResult::Draw, false);
        assert_eq!(pool.total_games(), 3);
    }
}
