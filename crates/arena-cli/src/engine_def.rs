//! Reads and writes the `key:value` engine-definition files the pool
//! driver uses to locate an engine binary and persist its rating.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineDef {
    pub exe: PathBuf,
    pub threads: u32,
    pub rating_fix: bool,
    pub rating: Option<f64>,
    pub displayname: Option<String>,
}

/// Parse a `key:value`-per-line file. Blank and `#`-prefixed lines are
/// skipped; unrecognized keys are logged at `warn` and ignored.
pub fn load_engine_def(path: impl AsRef<Path>) -> Result<EngineDef> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read engine definition at {}", path.display()))?;

    let mut exe = None;
    let mut threads = None;
    let mut rating_fix = false;
    let mut rating = None;
    let mut displayname = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            log::warn!("ignoring malformed engine-definition line: {line}");
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "exe" => exe = Some(PathBuf::from(value)),
            "threads" => {
                threads = Some(value.parse::<u32>().with_context(|| {
                    format!("engine definition {}: unparsable threads value '{value}'", path.display())
                })?);
            }
            "rating_fix" => rating_fix = value == "true" || value == "1",
            "rating" => {
                rating = Some(value.parse::<f64>().with_context(|| {
                    format!("engine definition {}: unparsable rating value '{value}'", path.display())
                })?);
            }
            "displayname" => displayname = Some(value.to_string()),
            other => log::warn!("unrecognized engine-definition key '{other}' in {}", path.display()),
        }
    }

    let Some(exe) = exe else {
        bail!("engine definition {} is missing required key 'exe'", path.display());
    };
    let Some(threads) = threads else {
        bail!("engine definition {} is missing required key 'threads'", path.display());
    };

    Ok(EngineDef { exe, threads, rating_fix, rating, displayname })
}

/// Re-serialize to the identical `key:value` shape, used by the pool
/// driver to persist an updated `rating` after a pairing completes.
pub fn write_engine_def(path: impl AsRef<Path>, def: &EngineDef) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!("exe:{}\n", def.exe.display()));
    out.push_str(&format!("threads:{}\n", def.threads));
    out.push_str(&format!("rating_fix:{}\n", def.rating_fix));
    if let Some(rating) = def.rating {
        out.push_str(&format!("rating:{rating}\n"));
    }
    if let Some(name) = &def.displayname {
        out.push_str(&format!("displayname:{name}\n"));
    }
    let path = path.as_ref();
    fs::write(path, out).with_context(|| format!("failed to write engine definition to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "arena-cli-enginedef-test-{}-{}.txt",
            std::process::id(),
            contents.len()
        ));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_minimal_definition() {
        let path = write_temp("exe:/bin/engine\nthreads:4\n");
        let def = load_engine_def(&path).unwrap();
        assert_eq!(def.exe, PathBuf::from("/bin/engine"));
        assert_eq!(def.threads, 4);
        assert!(!def.rating_fix);
        assert_eq!(def.rating, None);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn parses_all_fields_and_skips_comments() {
        let path = write_temp(
            "# comment\nexe:/bin/engine\nthreads:8\nrating_fix:true\nrating:1500.5\ndisplayname:MyEngine\n",
        );
        let def = load_engine_def(&path).unwrap();
        assert_eq!(def.threads, 8);
        assert!(def.rating_fix);
        assert_eq!(def.rating, Some(1500.5));
        assert_eq!(def.displayname.as_deref(), Some("MyEngine"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_exe_is_an_error() {
        let path = write_temp("threads:4\n");
        assert!(load_engine_def(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_threads_is_an_error() {
        let path = write_temp("exe:/bin/engine\n");
        assert!(load_engine_def(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn write_then_read_round_trips() {
        let def = EngineDef {
            exe: PathBuf::from("/bin/engine"),
            threads: 2,
            rating_fix: false,
            rating: Some(1700.25),
            displayname: Some("Candidate".to_string()),
        };
        let path = std::env::temp_dir()
            .join(format!("arena-cli-enginedef-roundtrip-{}.txt", std::process::id()));
        write_engine_def(&path, &def).unwrap();
        let reloaded = load_engine_def(&path).unwrap();
        assert_eq!(reloaded, def);
        let _ = fs::remove_file(&path);
    }
}
