//! The think-result model: one `Score`/`ThinkPv` per `multipv` line, folded
//! from a stream of `info` records, plus the terminal `bestmove`.

use crate::protocol::Scanner;

/// Mate-distance encoding offset. Mate in `k` plies is `MATE_CONST - k`;
/// being mated in `k` plies is `-MATE_CONST + k`.
pub const MATE_CONST: i32 = 100_000;

/// A centipawn or mate score, plus whether it is exact or a search bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub value: i32,
    pub bound: Bound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bound {
    #[default]
    Exact,
    LowerBound,
    UpperBound,
}

impl Score {
    pub fn cp(value: i32) -> Score {
        Score {
            value,
            bound: Bound::Exact,
        }
    }

    /// Encode "mate in `plies`" (`plies > 0`) or "mated in `-plies`"
    /// (`plies < 0`), matching the USI `score mate <signed-int>` token
    /// where a leading `-` (including `-0`) means "being mated".
    pub fn mate(plies: i32) -> Score {
        Score::mate_signed(plies < 0, plies.abs())
    }

    /// Same encoding as [`Score::mate`] but takes the "being mated" sign
    /// explicitly, so a wire value of `-0` (indistinguishable from `0` as
    /// a bare integer) can still select the mated branch.
    fn mate_signed(being_mated: bool, plies: i32) -> Score {
        let value = if being_mated {
            -MATE_CONST + plies
        } else {
            MATE_CONST - plies
        };
        Score {
            value,
            bound: Bound::Exact,
        }
    }

    pub fn is_mate_score(&self) -> bool {
        (MATE_CONST - 256..=MATE_CONST).contains(&self.value)
    }

    pub fn is_mated_score(&self) -> bool {
        (-MATE_CONST..=-MATE_CONST + 256).contains(&self.value)
    }

    /// Plies to deliver mate, if this is a mate or mated score.
    pub fn mate_plies(&self) -> Option<i32> {
        if self.is_mate_score() {
            Some(MATE_CONST - self.value)
        } else if self.is_mated_score() {
            Some(-(self.value + MATE_CONST))
        } else {
            None
        }
    }
}

/// One `multipv` line accumulated from `info` records.
#[derive(Debug, Clone, Default)]
pub struct ThinkPv {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    pub hashfull: Option<u32>,
    pub multipv: usize,
    pub pv: String,
}

/// The accumulated result of the most recent `go`.
#[derive(Debug, Clone, Default)]
pub struct ThinkResult {
    pub best_move: Option<String>,
    pub ponder_move: Option<String>,
    /// Indexed by `multipv - 1`; gaps are filled with default (empty) PVs.
    pub pvs: Vec<ThinkPv>,
}

impl ThinkResult {
    /// Parse one `info ...` line (the leading `info` token already
    /// stripped is also accepted) and fold it into `self`.
    ///
    /// A malformed record is logged and silently dropped; it never fails
    /// the session.
    pub fn fold_info_line(&mut self, line: &str) {
        let mut s = Scanner::new(line);
        match s.peek() {
            Some("info") => {
                s.get();
            }
            _ => {}
        }

        let mut pv_slot = ThinkPv {
            multipv: 1,
            ..Default::default()
        };
        let mut saw_pv = false;

        while let Some(tok) = s.get() {
            match tok {
                "depth" => pv_slot.depth = s.get_int(),
                "seldepth" => pv_slot.seldepth = s.get_int(),
                "nodes" => pv_slot.nodes = s.get_int(),
                "nps" => pv_slot.nps = s.get_int(),
                "time" => pv_slot.time_ms = s.get_int(),
                "hashfull" => pv_slot.hashfull = s.get_int(),
                "multipv" => {
                    pv_slot.multipv = match s.get_int::<usize>() {
                        Some(n) if n >= 1 => n,
                        _ => {
                            log::warn!("dropping info record: bad multipv in '{line}'");
                            return;
                        }
                    };
                }
                "score" => match s.get() {
                    Some("cp") => {
                        let Some(v) = s.get_int::<i32>() else {
                            log::warn!("dropping info record: bad score cp in '{line}'");
                            return;
                        };
                        let bound = peek_bound(&mut s);
                        pv_slot.score = Some(Score { value: v, bound });
                    }
                    Some("mate") => {
                        // Parse the raw token ourselves: "-0" must be read as
                        // "being mated in 0 plies", which `i32::from_str`
                        // alone cannot distinguish from a plain "0".
                        let Some(raw) = s.get() else {
                            log::warn!("dropping info record: bad score mate in '{line}'");
                            return;
                        };
                        let being_mated = raw.starts_with('-');
                        let digits = raw.trim_start_matches('-');
                        let Ok(n) = digits.parse::<i32>() else {
                            log::warn!("dropping info record: bad score mate in '{line}'");
                            return;
                        };
                        let mate_value = Score::mate_signed(being_mated, n).value;
                        let bound = peek_bound(&mut s);
                        pv_slot.score = Some(Score {
                            value: mate_value,
                            bound,
                        });
                    }
                    _ => {
                        log::warn!("dropping info record: bad score kind in '{line}'");
                        return;
                    }
                },
                "pv" => {
                    pv_slot.pv = s.rest_string();
                    saw_pv = true;
                    break;
                }
                "string" => {
                    // comment: remainder of the line is not protocol data
                    s.rest_string();
                    break;
                }
                _ => {
                    // unrecognized key: ignore this token and keep scanning
                }
            }
        }

        if !saw_pv && pv_slot.pv.is_empty() {
            // Still record whatever numeric fields we saw; a bare `info
            // depth 5 nodes ...` without `pv` is common mid-search chatter.
        }

        let idx = pv_slot.multipv - 1;
        if self.pvs.len() <= idx {
            self.pvs.resize_with(idx + 1, || ThinkPv {
                multipv: 0,
                ..Default::default()
            });
        }
        self.pvs[idx] = pv_slot;
    }

    /// Parse a `bestmove ...` line and fold it into `self`, completing
    /// this think-result.
    pub fn fold_bestmove_line(&mut self, line: &str) {
        let mut s = Scanner::new(line);
        if s.peek() == Some("bestmove") {
            s.get();
        }
        self.best_move = Some(s.get().unwrap_or("none").to_string());
        if s.get() == Some("ponder") {
            self.ponder_move = s.get().map(|m| m.to_string());
        }
    }

    pub fn to_string_pretty(&self) -> String {
        let mut out = String::new();
        for (i, pv) in self.pvs.iter().enumerate() {
            out.push_str(&format!("pv[{}]: {}\n", i + 1, pv.pv));
        }
        out.push_str(&format!(
            "bestmove: {}\n",
            self.best_move.as_deref().unwrap_or("none")
        ));
        out
    }
}

fn peek_bound(s: &mut Scanner) -> Bound {
    match s.peek() {
        Some("lowerbound") => {
            s.get();
            Bound::LowerBound
        }
        Some("upperbound") => {
            s.get();
            Bound::UpperBound
        }
        _ => Bound::Exact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_score_roundtrip() {
        for k in 0..=256 {
            let s = Score::mate(k);
            assert_eq!(s.value, MATE_CONST - k);
            assert!(s.is_mate_score());
            assert_eq!(s.mate_plies(), Some(k));

            // `-0` and `0` are the same `i32`, so the "being mated in 0
            // plies" case can only be reached through the signed
            // constructor used by the wire parser, not through negating a
            // plain integer.
            let mated = Score::mate_signed(true, k);
            assert_eq!(mated.value, -MATE_CONST + k);
            assert!(mated.is_mated_score());
            assert_eq!(mated.mate_plies(), Some(-k));
        }
    }

    #[test]
    fn centipawn_score_is_neither_mate_nor_mated() {
        let s = Score::cp(350);
        assert!(!s.is_mate_score());
        assert!(!s.is_mated_score());
    }

    #[test]
    fn fold_info_basic_fields() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info depth 12 seldepth 20 nodes 1234 nps 50000 time 300 hashfull 10 score cp 87 pv 7g7f 3c3d");
        let pv = &t.pvs[0];
        assert_eq!(pv.depth, Some(12));
        assert_eq!(pv.nodes, Some(1234));
        assert_eq!(pv.score, Some(Score::cp(87)));
        assert_eq!(pv.pv, "7g7f 3c3d");
    }

    #[test]
    fn fold_info_with_multipv_fills_gaps() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info multipv 3 depth 5 score cp 10 pv 2g2f");
        assert_eq!(t.pvs.len(), 3);
        assert_eq!(t.pvs[2].pv, "2g2f");
        assert_eq!(t.pvs[0].pv, "");
    }

    #[test]
    fn fold_info_replaces_same_multipv_index() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info multipv 1 depth 1 score cp 10 pv 7g7f");
        t.fold_info_line("info multipv 1 depth 5 score cp 20 pv 7g7f 3c3d");
        assert_eq!(t.pvs.len(), 1);
        assert_eq!(t.pvs[0].depth, Some(5));
        assert_eq!(t.pvs[0].pv, "7g7f 3c3d");
    }

    #[test]
    fn fold_info_score_bound() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info depth 1 score cp 50 lowerbound pv 7g7f");
        assert_eq!(t.pvs[0].score.unwrap().bound, Bound::LowerBound);
    }

    #[test]
    fn fold_info_mate_score() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info depth 1 score mate 3 pv 7g7f");
        assert_eq!(t.pvs[0].score.unwrap().value, MATE_CONST - 3);
    }

    #[test]
    fn malformed_record_is_dropped_without_panicking() {
        let mut t = ThinkResult::default();
        t.fold_info_line("info score cp notanumber pv 7g7f");
        assert!(t.pvs.is_empty());
    }

    #[test]
    fn fold_bestmove_simple() {
        let mut t = ThinkResult::default();
        t.fold_bestmove_line("bestmove 7g7f");
        assert_eq!(t.best_move.as_deref(), Some("7g7f"));
        assert_eq!(t.ponder_move, None);
    }

    #[test]
    fn fold_bestmove_with_ponder() {
        let mut t = ThinkResult::default();
        t.fold_bestmove_line("bestmove 7g7f ponder 3c3d");
        assert_eq!(t.best_move.as_deref(), Some("7g7f"));
        assert_eq!(t.ponder_move.as_deref(), Some("3c3d"));
    }

    #[test]
    fn fold_bestmove_resign_and_win_are_opaque_tokens() {
        let mut t = ThinkResult::default();
        t.fold_bestmove_line("bestmove resign");
        assert_eq!(t.best_move.as_deref(), Some("resign"));

        let mut t2 = ThinkResult::default();
        t2.fold_bestmove_line("bestmove win");
        assert_eq!(t2.best_move.as_deref(), Some("win"));
    }

    #[test]
    fn fold_bestmove_missing_move_is_none() {
        let mut t = ThinkResult::default();
        t.fold_bestmove_line("bestmove");
        assert_eq!(t.best_move.as_deref(), Some("none"));
    }
}
