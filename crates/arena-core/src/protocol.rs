//! Token scanner over a single whitespace-split USI line.
//!
//! The `info`/`bestmove`/time-control parsers all walk a line the same
//! way: peek a token, optionally consume it, optionally parse it as an
//! integer, or swallow everything left on the line. `Scanner` is the
//! shared plumbing for that.

/// A cursor over the whitespace-split tokens of one line.
pub struct Scanner<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(line: &'a str) -> Self {
        Scanner {
            tokens: line.split_whitespace().collect(),
            pos: 0,
        }
    }

    /// The current token without advancing, or `None` at end of input.
    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    /// The current token, advancing past it, or `None` at end of input.
    pub fn get(&mut self) -> Option<&'a str> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Advance past one token and parse it as an integer; `None` if there
    /// is no token left or it does not parse.
    pub fn get_int<T: std::str::FromStr>(&mut self) -> Option<T> {
        self.get().and_then(|t| t.parse().ok())
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Join every remaining token (single space separated) and advance to
    /// the end. Used for `pv <rest-of-line>` and `string <rest-of-line>`.
    pub fn rest_string(&mut self) -> String {
        let rest = self.tokens[self.pos..].join(" ");
        self.pos = self.tokens.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_advance() {
        let mut s = Scanner::new("depth 5 nodes 100");
        assert_eq!(s.peek(), Some("depth"));
        assert_eq!(s.peek(), Some("depth"));
        assert_eq!(s.get(), Some("depth"));
        assert_eq!(s.peek(), Some("5"));
    }

    #[test]
    fn get_int_parses_and_advances() {
        let mut s = Scanner::new("depth 5 nodes 100");
        s.get();
        assert_eq!(s.get_int::<u32>(), Some(5));
        assert_eq!(s.peek(), Some("nodes"));
    }

    #[test]
    fn get_int_on_non_numeric_token_is_none() {
        let mut s = Scanner::new("depth abc");
        s.get();
        assert_eq!(s.get_int::<u32>(), None);
    }

    #[test]
    fn rest_string_joins_and_consumes_to_eof() {
        let mut s = Scanner::new("info pv 7g7f 3c3d 2g2f");
        s.get(); // "info"
        s.get(); // "pv"
        assert_eq!(s.rest_string(), "7g7f 3c3d 2g2f");
        assert!(s.is_eof());
    }

    #[test]
    fn eof_on_empty_line() {
        let s = Scanner::new("");
        assert!(s.is_eof());
        assert_eq!(s.peek(), None);
    }
}
