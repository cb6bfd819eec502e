//! Thread-safe append-only log writer, one real file per constructed
//! handle, shared cheaply across worker threads via `Arc`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_DISAMBIGUATOR: AtomicU64 = AtomicU64::new(0);

struct Inner {
    writer: Mutex<BufWriter<File>>,
    with_timestamps: bool,
    path: PathBuf,
}

/// A cloneable handle to a single append-only log file.
#[derive(Clone)]
pub struct Logger(Arc<Inner>);

impl Logger {
    /// Open (or create) a uniquely-disambiguated log file derived from
    /// `base_path`, e.g. `runs/pool.log` -> `runs/pool.3.log`. Two
    /// `Logger::new` calls in the same process never collide, so several
    /// pools can log into the same output directory.
    pub fn new(base_path: impl AsRef<Path>, with_timestamps: bool) -> std::io::Result<Logger> {
        let base_path = base_path.as_ref();
        if let Some(parent) = base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let n = NEXT_DISAMBIGUATOR.fetch_add(1, Ordering::Relaxed);
        let path = disambiguated_path(base_path, n);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Logger(Arc::new(Inner {
            writer: Mutex::new(BufWriter::new(file)),
            with_timestamps,
            path,
        })))
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Append one line, flushing immediately so a crash does not lose it.
    pub fn log(&self, msg: &str) {
        let mut w = self.0.writer.lock().unwrap_or_else(|e| e.into_inner());
        let line = if self.0.with_timestamps {
            format!("[{}] {}\n", chrono::Utc::now().to_rfc3339(), msg)
        } else {
            format!("{}\n", msg)
        };
        // Best-effort: a failed log write should never take down a match.
        let _ = w.write_all(line.as_bytes());
        let _ = w.flush();
    }
}

fn disambiguated_path(base: &Path, n: u64) -> PathBuf {
    let stem = base.file_stem().unwrap_or_default().to_string_lossy();
    let ext = base.extension().map(|e| e.to_string_lossy().to_string());
    let pid = std::process::id();
    let name = match ext {
        Some(ext) => format!("{stem}.{pid}.{n}.{ext}"),
        None => format!("{stem}.{pid}.{n}"),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn logs_append_and_are_readable() {
        let dir = std::env::temp_dir().join(format!("arena-core-test-{}", std::process::id()));
        let base = dir.join("run.log");
        let logger = Logger::new(&base, false).unwrap();
        logger.log("hello");
        logger.log("world");

        let mut contents = String::new();
        File::open(logger.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello\nworld\n");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn two_loggers_from_same_base_path_do_not_collide() {
        let dir = std::env::temp_dir().join(format!("arena-core-test2-{}", std::process::id()));
        let base = dir.join("run.log");
        let a = Logger::new(&base, false).unwrap();
        let b = Logger::new(&base, false).unwrap();
        assert_ne!(a.path(), b.path());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cloned_handle_shares_the_same_file() {
        let dir = std::env::temp_dir().join(format!("arena-core-test3-{}", std::process::id()));
        let base = dir.join("run.log");
        let a = Logger::new(&base, false).unwrap();
        let b = a.clone();
        a.log("first");
        b.log("second");

        let mut contents = String::new();
        File::open(a.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "first\nsecond\n");
        let _ = fs::remove_dir_all(&dir);
    }
}
