//! Elo rating-difference estimate with a one-sided 95% confidence bound,
//! computed from raw win/draw counters.

/// One-sided z-score for alpha = 0.05.
const Z_95_ONE_SIDED: f64 = 1.644854;

/// Raw tallies fed into the Elo estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EloCounters {
    pub p1win: u64,
    pub p2win: u64,
    pub blackwin: u64,
    pub whitewin: u64,
    pub draws: u64,
}

/// Derived statistics reported to the operator.
#[derive(Debug, Clone, Copy)]
pub struct EloStats {
    pub win_rate: f64,
    pub black_win_rate: f64,
    pub white_win_rate: f64,
    pub rating: f64,
    pub rating_lower: f64,
    pub rating_upper: f64,
}

impl EloCounters {
    /// Compute the point estimate and one-sided 95% bounds for 1P's
    /// rating difference against 2P, over non-draw games only.
    pub fn stats(&self) -> EloStats {
        let n = self.p1win + self.p2win;
        let r = if n == 0 {
            0.5
        } else {
            self.p1win as f64 / n as f64
        };

        let total_color_games = self.blackwin + self.whitewin;
        let black_win_rate = if total_color_games == 0 {
            0.0
        } else {
            self.blackwin as f64 / total_color_games as f64
        };
        let white_win_rate = if total_color_games == 0 {
            0.0
        } else {
            self.whitewin as f64 / total_color_games as f64
        };

        EloStats {
            win_rate: r,
            black_win_rate,
            white_win_rate,
            rating: rating_from_rate(r),
            rating_lower: rating_from_rate(wilson_p0(r, n as f64)),
            rating_upper: -rating_from_rate(wilson_p0(1.0 - r, n as f64)),
        }
    }
}

impl EloStats {
    pub fn pretty(&self) -> String {
        format!(
            "win_rate={:.3} rating={:+.1} [{:+.1}, {:+.1}] (black={:.3} white={:.3})",
            self.win_rate,
            self.rating,
            self.rating_lower,
            self.rating_upper,
            self.black_win_rate,
            self.white_win_rate
        )
    }
}

/// `R(r) = -400 * log10(1/r - 1)`, clamped at the extremes since the log
/// diverges as `r` approaches 0 or 1.
fn rating_from_rate(r: f64) -> f64 {
    if r <= 0.0 {
        -9999.0
    } else if r >= 1.0 {
        9999.0
    } else {
        -400.0 * ((1.0 / r - 1.0).log10())
    }
}

/// Solve the normal-approximation hypothesis-test inequality for `p0`,
/// the boundary win rate whose observed count would just reach the
/// one-sided 95% significance threshold.
fn wilson_p0(r: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return r;
    }
    let a = Z_95_ONE_SIDED;
    let a2 = a * a;
    let discriminant = a2 * a2 - 4.0 * a2 * n * r * r + 4.0 * a2 * n * r;
    let discriminant = discriminant.max(0.0);
    (a2 - discriminant.sqrt() + 2.0 * n * r) / (2.0 * (a2 + n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_symmetry() {
        assert!((rating_from_rate(0.5)).abs() < 1e-9);
        for r in [0.1, 0.3, 0.7, 0.9] {
            assert!((rating_from_rate(r) + rating_from_rate(1.0 - r)).abs() < 1e-9);
        }
    }

    #[test]
    fn even_match_has_zero_rating_and_straddling_bounds() {
        let c = EloCounters {
            p1win: 50,
            p2win: 50,
            blackwin: 50,
            whitewin: 50,
            draws: 0,
        };
        let s = c.stats();
        assert!((s.win_rate - 0.5).abs() < 1e-9);
        assert!(s.rating.abs() < 1e-9);
        assert!(s.rating_lower < 0.0);
        assert!(s.rating_upper > 0.0);
    }

    #[test]
    fn lopsided_match_has_significant_positive_lower_bound() {
        let c = EloCounters {
            p1win: 99,
            p2win: 1,
            blackwin: 50,
            whitewin: 50,
            draws: 0,
        };
        let s = c.stats();
        assert!(s.rating > 0.0);
        assert!(s.rating_lower > 0.0);
    }

    #[test]
    fn no_decisive_games_yields_neutral_rate() {
        let c = EloCounters::default();
        let s = c.stats();
        assert!((s.win_rate - 0.5).abs() < 1e-9);
    }
}
