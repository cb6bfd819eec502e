//! Reads an opening-book file into an ordered list of starting lines.
//! Sampling from the book is the Match Pool's job; this module only loads.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Read `path`, skipping blank and `#`-prefixed lines, returning the rest
/// verbatim (`startpos [moves …]` or `sfen … [moves …]`).
pub fn load_book(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read opening book at {}", path.display()))?;

    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();

    Ok(lines)
}

/// The default book when no `--book` file is given.
pub fn default_book() -> Vec<String> {
    vec!["startpos".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_blank_and_comment_lines() {
        let path = std::env::temp_dir().join(format!("arena-cli-book-test-{}.txt", std::process::id()));
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "# a comment").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "startpos").unwrap();
        writeln!(f, "sfen lnsgkgsnl/9/ppppppppp/9/9/9/PPPPPPPPP/9/LNSGKGSNL b - 1 moves 7g7f").unwrap();
        let lines = load_book(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "startpos");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn default_book_is_bare_startpos() {
        assert_eq!(default_book(), vec!["startpos".to_string()]);
    }
}
