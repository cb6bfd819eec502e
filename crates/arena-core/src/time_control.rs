//! Parses a Fischer/byoyomi time-control token string into a normalized
//! per-side table.

use crate::error::{ArenaError, ArenaResult};

/// Normalized per-side time control, all fields in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeTable {
    pub time1p: u64,
    pub time2p: u64,
    pub byoyomi1p: u64,
    pub byoyomi2p: u64,
    pub inc1p: u64,
    pub inc2p: u64,
}

/// Parse a token string such as `"time 900000 byoyomi 5000"` or
/// `"time1p 900000 time2p 900000 byoyomi 5000"`.
///
/// Unsuffixed keys (`time`, `byoyomi`, `inc`) broadcast to both `1p`/`2p`
/// forms, but only where the `1p`/`2p` form was not explicitly given.
/// Any other token is `BadTimeSpec`.
pub fn parse_time_setting(spec: &str) -> ArenaResult<TimeTable> {
    let tokens: Vec<&str> = spec.split_whitespace().collect();

    let mut time1p = None;
    let mut time2p = None;
    let mut byoyomi1p = None;
    let mut byoyomi2p = None;
    let mut inc1p = None;
    let mut inc2p = None;
    let mut time_bcast = None;
    let mut byoyomi_bcast = None;
    let mut inc_bcast = None;

    let mut i = 0;
    while i < tokens.len() {
        let key = tokens[i];
        let Some(raw) = tokens.get(i + 1) else {
            return Err(ArenaError::BadTimeSpec(spec.to_string()));
        };
        let Ok(value) = raw.parse::<u64>() else {
            return Err(ArenaError::BadTimeSpec(spec.to_string()));
        };
        match key {
            "time" => time_bcast = Some(value),
            "time1p" => time1p = Some(value),
            "time2p" => time2p = Some(value),
            "byoyomi" => byoyomi_bcast = Some(value),
            "byoyomi1p" => byoyomi1p = Some(value),
            "byoyomi2p" => byoyomi2p = Some(value),
            "inc" => inc_bcast = Some(value),
            "inc1p" => inc1p = Some(value),
            "inc2p" => inc2p = Some(value),
            _ => return Err(ArenaError::BadTimeSpec(spec.to_string())),
        }
        i += 2;
    }

    Ok(TimeTable {
        time1p: time1p.or(time_bcast).unwrap_or(0),
        time2p: time2p.or(time_bcast).unwrap_or(0),
        byoyomi1p: byoyomi1p.or(byoyomi_bcast).unwrap_or(0),
        byoyomi2p: byoyomi2p.or(byoyomi_bcast).unwrap_or(0),
        inc1p: inc1p.or(inc_bcast).unwrap_or(0),
        inc2p: inc2p.or(inc_bcast).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_to_both_sides() {
        let t = parse_time_setting("time 1000 byoyomi 500 inc 200").unwrap();
        assert_eq!(
            t,
            TimeTable {
                time1p: 1000,
                time2p: 1000,
                byoyomi1p: 500,
                byoyomi2p: 500,
                inc1p: 200,
                inc2p: 200,
            }
        );
    }

    #[test]
    fn explicit_1p_2p_not_overwritten_by_broadcast() {
        let t =
            parse_time_setting("time1p 900000 time2p 900000 byoyomi 5000").unwrap();
        assert_eq!(
            t,
            TimeTable {
                time1p: 900000,
                time2p: 900000,
                byoyomi1p: 5000,
                byoyomi2p: 5000,
                inc1p: 0,
                inc2p: 0,
            }
        );
    }

    #[test]
    fn asymmetric_byoyomi_with_no_broadcast() {
        let t = parse_time_setting("byoyomi1p 400 byoyomi2p 200").unwrap();
        assert_eq!(
            t,
            TimeTable {
                byoyomi1p: 400,
                byoyomi2p: 200,
                ..Default::default()
            }
        );
    }

    #[test]
    fn unknown_key_is_bad_time_spec() {
        assert!(matches!(
            parse_time_setting("foo 1"),
            Err(ArenaError::BadTimeSpec(_))
        ));
    }

    #[test]
    fn missing_value_is_bad_time_spec() {
        assert!(matches!(
            parse_time_setting("time"),
            Err(ArenaError::BadTimeSpec(_))
        ));
    }

    #[test]
    fn non_numeric_value_is_bad_time_spec() {
        assert!(matches!(
            parse_time_setting("time abc"),
            Err(ArenaError::BadTimeSpec(_))
        ));
    }
}
