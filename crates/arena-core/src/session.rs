//! An asynchronous, state-machine-driven wrapper around one USI engine
//! child process: a read-worker thread parses its stdout, a write-worker
//! thread drains a bounded send queue onto its stdin, and the public API
//! blocks on a shared `Mutex`/`Condvar` pair the workers notify.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{ArenaError, ArenaResult};
use crate::think::ThinkResult;

/// Bound on the write queue; `send_command` fails loudly on overflow
/// instead of growing unboundedly, per the design notes.
const SEND_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    WaitConnecting,
    Connected,
    WaitReadyOk,
    WaitCommand,
    WaitBestmove,
    WaitOneLine,
    Disconnected,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

struct SharedState {
    state: EngineState,
    /// Bumped on every mutation. Lets a caller that issued a request
    /// distinguish "the state already happened to be X" from "the state
    /// became X in response to my request" (used by the single-line
    /// query methods, where the state cycles through `WaitOneLine` and
    /// back to `WaitCommand`).
    generation: u64,
    last_line: Option<String>,
    think_result: ThinkResult,
}

struct Shared {
    state: Mutex<SharedState>,
    cond: Condvar,
}

impl Shared {
    fn set_state(&self, new_state: EngineState) {
        let mut g = self.state.lock().unwrap_or_else(|e| e.into_inner());
        g.state = new_state;
        g.generation += 1;
        self.cond.notify_all();
    }
}

/// Owns one child engine process and its two worker threads.
pub struct EngineSession {
    shared: Arc<Shared>,
    child: Mutex<Option<Child>>,
    path: Option<PathBuf>,
    options: HashMap<String, String>,
    tx: Mutex<Option<SyncSender<String>>>,
    read_handle: Mutex<Option<JoinHandle<()>>>,
    write_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSession {
    pub fn new() -> Self {
        EngineSession {
            shared: Arc::new(Shared {
                state: Mutex::new(SharedState {
                    state: EngineState::WaitConnecting,
                    generation: 0,
                    last_line: None,
                    think_result: ThinkResult::default(),
                }),
                cond: Condvar::new(),
            }),
            child: Mutex::new(None),
            path: None,
            options: HashMap::new(),
            tx: Mutex::new(None),
            read_handle: Mutex::new(None),
            write_handle: Mutex::new(None),
        }
    }

    /// Records options applied during the next `connect`. Pure; no I/O.
    pub fn set_options(&mut self, options: HashMap<String, String>) {
        self.options = options;
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// Spawn the child process and start the worker threads. The child's
    /// working directory is set to the parent of `path`, matching how
    /// shogi engines locate their book/eval files relative to the binary.
    pub fn connect(&mut self, path: impl AsRef<Path>) -> ArenaResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArenaError::NotFound(path.to_path_buf()));
        }
        let cwd = path.parent().filter(|p| !p.as_os_str().is_empty());

        let mut cmd = Command::new(path);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ArenaError::ConnectError {
                path: path.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let (tx, rx) = mpsc::sync_channel::<String>(SEND_QUEUE_CAPACITY);

        let write_shared = self.shared.clone();
        let write_handle = thread::Builder::new()
            .name("usi-write".to_string())
            .spawn(move || write_worker(write_shared, stdin, rx))
            .expect("failed to spawn write-worker thread");

        let read_shared = self.shared.clone();
        let read_handle = thread::Builder::new()
            .name("usi-read".to_string())
            .spawn(move || read_worker(read_shared, stdout))
            .expect("failed to spawn read-worker thread");

        *self.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        *self.read_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(read_handle);
        *self.write_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(write_handle);
        self.path = Some(path.to_path_buf());

        self.shared.set_state(EngineState::Connected);

        for (name, value) in &self.options {
            self.send_command(&format!("setoption name {name} value {value}"))?;
        }
        self.send_command("isready")?;

        Ok(())
    }

    /// Non-blocking enqueue onto the write path.
    pub fn send_command(&self, line: &str) -> ArenaResult<()> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(ArenaError::Disconnected);
        };
        match tx.try_send(line.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ArenaError::IllegalState {
                action: format!("enqueue '{line}'"),
                state: "send queue full".to_string(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(ArenaError::Disconnected),
        }
    }

    pub fn usi_position(&self, sfen: &str) -> ArenaResult<()> {
        self.send_command(&format!("position {sfen}"))
    }

    /// `go` is only accepted from `WaitCommand`; any other state fails
    /// synchronously with `IllegalState` rather than being queued.
    ///
    /// `think_result` is reset here, under the state lock, before the
    /// command is even enqueued. Otherwise a caller that wins the lock
    /// between enqueueing and the write-worker's own reset of
    /// `think_result` (see the `"go"` arm of `write_worker`) could observe
    /// the *previous* move's best move through `wait_bestmove`.
    pub fn usi_go(&self, args: &str) -> ArenaResult<()> {
        {
            let mut g = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if g.state != EngineState::WaitCommand {
                return Err(ArenaError::IllegalState {
                    action: "go".to_string(),
                    state: g.state.to_string(),
                });
            }
            g.think_result = ThinkResult::default();
        }
        self.send_command(&format!("go {args}"))
    }

    pub fn usi_stop(&self) -> ArenaResult<()> {
        self.send_command("stop")
    }

    /// Blocks until `state == target`, or fails with `Disconnected` if the
    /// session dies first.
    pub fn wait_for_state(&self, target: EngineState) -> ArenaResult<()> {
        let g = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        let g = self
            .shared
            .cond
            .wait_while(g, |s| s.state != target && s.state != EngineState::Disconnected)
            .unwrap_or_else(|e| e.into_inner());
        if g.state == target {
            Ok(())
        } else {
            Err(ArenaError::Disconnected)
        }
    }

    /// Blocks until the current think-result has a best move.
    pub fn wait_bestmove(&self) -> ArenaResult<ThinkResult> {
        let g = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        let g = self
            .shared
            .cond
            .wait_while(g, |s| {
                s.think_result.best_move.is_none() && s.state != EngineState::Disconnected
            })
            .unwrap_or_else(|e| e.into_inner());
        match &g.think_result.best_move {
            Some(_) => Ok(g.think_result.clone()),
            None => Err(ArenaError::Disconnected),
        }
    }

    pub fn usi_go_and_wait_bestmove(&self, args: &str) -> ArenaResult<ThinkResult> {
        self.usi_go(args)?;
        self.wait_bestmove()
    }

    /// Send a single-line query (`moves` or `side`) and return its one
    /// response line, using the `WaitOneLine` round trip.
    fn query_one_line(&self, query: &str) -> ArenaResult<String> {
        let since_generation = {
            let g = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if g.state != EngineState::WaitCommand {
                return Err(ArenaError::IllegalState {
                    action: query.to_string(),
                    state: g.state.to_string(),
                });
            }
            g.generation
        };
        self.send_command(query)?;

        let g = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        let g = self
            .shared
            .cond
            .wait_while(g, |s| {
                !(s.generation > since_generation && s.state == EngineState::WaitCommand)
                    && s.state != EngineState::Disconnected
            })
            .unwrap_or_else(|e| e.into_inner());

        if g.state == EngineState::Disconnected {
            return Err(ArenaError::Disconnected);
        }
        Ok(g.last_line.clone().unwrap_or_default())
    }

    pub fn get_moves(&self) -> ArenaResult<String> {
        self.query_one_line("moves")
    }

    pub fn get_side_to_move(&self) -> ArenaResult<String> {
        self.query_one_line("side")
    }

    /// Enqueue "quit", wait for both workers to stop, then close pipes
    /// and force-terminate the child if it has not exited on its own.
    /// Idempotent: a session that never connected, or was already
    /// disconnected, is a silent no-op.
    pub fn disconnect(&self) {
        let _ = self.send_command("quit");

        if let Some(h) = self.write_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = h.join();
        }
        if let Some(h) = self.read_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = h.join();
        }

        self.shared.set_state(EngineState::Disconnected);

        if let Some(mut child) = self.child.lock().unwrap_or_else(|e| e.into_inner()).take() {
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn write_worker(shared: Arc<Shared>, stdin: ChildStdin, rx: Receiver<String>) {
    let mut writer = BufWriter::new(stdin);
    for msg in rx.iter() {
        let first = msg.split_whitespace().next().unwrap_or("");
        match first {
            "go" => {
                if !wait_for_gate(&shared, EngineState::WaitCommand) {
                    break;
                }
                {
                    let mut g = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                    g.think_result = ThinkResult::default();
                    g.state = EngineState::WaitBestmove;
                    g.generation += 1;
                    shared.cond.notify_all();
                }
                write_line(&mut writer, &msg);
            }
            "position" | "usinewgame" | "gameover" => {
                if !wait_for_gate(&shared, EngineState::WaitCommand) {
                    break;
                }
                write_line(&mut writer, &msg);
            }
            "moves" | "side" => {
                if !wait_for_gate(&shared, EngineState::WaitCommand) {
                    break;
                }
                shared.set_state(EngineState::WaitOneLine);
                write_line(&mut writer, &msg);
            }
            "stop" => {
                let in_bestmove = {
                    let g = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                    g.state == EngineState::WaitBestmove
                };
                if in_bestmove {
                    write_line(&mut writer, &msg);
                }
            }
            "isready" => {
                shared.set_state(EngineState::WaitReadyOk);
                write_line(&mut writer, &msg);
            }
            "quit" => {
                write_line(&mut writer, &msg);
                let _ = writer.flush();
                shared.set_state(EngineState::Disconnected);
                break;
            }
            _ => {
                // setoption and any other ungated command.
                write_line(&mut writer, &msg);
            }
        }
    }
}

/// Block until `target` is reached; returns `false` if the session died
/// first (caller should stop processing).
fn wait_for_gate(shared: &Shared, target: EngineState) -> bool {
    let g = shared.state.lock().unwrap_or_else(|e| e.into_inner());
    let g = shared
        .cond
        .wait_while(g, |s| s.state != target && s.state != EngineState::Disconnected)
        .unwrap_or_else(|e| e.into_inner());
    g.state == target
}

fn write_line(writer: &mut BufWriter<ChildStdin>, line: &str) {
    if writeln!(writer, "{line}").is_err() || writer.flush().is_err() {
        log::warn!("failed writing '{line}' to engine stdin");
    }
}

fn read_worker(shared: Arc<Shared>, stdout: std::process::ChildStdout) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.contains("Error") {
            log::warn!("engine stderr-like line: {line}");
        }

        let mut g = shared.state.lock().unwrap_or_else(|e| e.into_inner());
        g.last_line = Some(line.clone());
        g.generation += 1;

        if g.state == EngineState::WaitOneLine {
            g.state = EngineState::WaitCommand;
            shared.cond.notify_all();
            continue;
        }

        let first = line.split_whitespace().next().unwrap_or("");
        match first {
            "readyok" => {
                g.state = EngineState::WaitCommand;
            }
            "bestmove" => {
                g.think_result.fold_bestmove_line(&line);
                g.state = EngineState::WaitCommand;
            }
            "info" => {
                g.think_result.fold_info_line(&line);
            }
            _ => {}
        }
        shared.cond.notify_all();
    }

    let mut g = shared.state.lock().unwrap_or_else(|e| e.into_inner());
    if g.state != EngineState::Disconnected {
        g.state = EngineState::Disconnected;
        g.generation += 1;
        shared.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_wait_connecting() {
        let s = EngineSession::new();
        assert_eq!(s.state(), EngineState::WaitConnecting);
    }

    #[test]
    fn connect_to_missing_binary_is_not_found() {
        let mut s = EngineSession::new();
        let err = s.connect("/no/such/engine/binary-xyz").unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));
    }

    #[test]
    fn go_before_connect_is_illegal_state() {
        let s = EngineSession::new();
        let err = s.usi_go("btime 0 wtime 0 byoyomi 100").unwrap_err();
        assert!(matches!(err, ArenaError::IllegalState { .. }));
    }
}
