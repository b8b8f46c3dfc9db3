//! Date/time/duration helpers backing the `evaluator::functions` temporal
//! catalog (`date()`, `datetime()`, `duration()`, `now()`...).
//!
//! Timestamps are stored as RFC3339 text (see [`nornicdb_api::Value::Timestamp`]);
//! all arithmetic goes through `chrono` rather than hand-rolled calendar math.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use nornicdb_api::Duration;

pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp '{text}': {e}")))
}

/// Parses an ISO-8601 duration string (`P1Y2M3DT4H5M6.5S`) into the
/// engine's four-component [`Duration`].
pub fn duration_value_for_text(text: &str) -> Result<Duration> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || bytes[0] != b'P' {
        return Err(Error::Internal(format!("invalid duration '{text}'")));
    }
    let rest = &text[1..];
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut months: i64 = 0;
    let mut days: i64 = 0;
    let mut seconds: i64 = 0;
    let mut nanos: i32 = 0;

    parse_components(date_part, &[('Y', 12), ('M', 1), ('W', 0), ('D', 0)], |unit, value| {
        match unit {
            'Y' => months += value * 12,
            'M' => months += value,
            'W' => days += value * 7,
            'D' => days += value,
            _ => {}
        }
    })?;

    if let Some(time_part) = time_part {
        let mut num = String::new();
        for ch in time_part.chars() {
            if ch.is_ascii_digit() || ch == '.' {
                num.push(ch);
                continue;
            }
            let value: f64 = num
                .parse()
                .map_err(|_| Error::Internal(format!("invalid duration component in '{text}'")))?;
            num.clear();
            match ch {
                'H' => seconds += (value * 3600.0) as i64,
                'M' => seconds += (value * 60.0) as i64,
                'S' => {
                    seconds += value.trunc() as i64;
                    nanos += (value.fract() * 1_000_000_000.0).round() as i32;
                }
                _ => return Err(Error::Internal(format!("invalid duration unit '{ch}' in '{text}'"))),
            }
        }
    }

    Ok(Duration {
        months,
        days,
        seconds,
        nanos,
    })
}

fn parse_components(
    text: &str,
    _units: &[(char, i64)],
    mut apply: impl FnMut(char, i64),
) -> Result<()> {
    let mut num = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            num.push(ch);
            continue;
        }
        let value: i64 = num
            .parse()
            .map_err(|_| Error::Internal(format!("invalid duration component in '{text}'")))?;
        num.clear();
        apply(ch, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_month_day_time() {
        let d = duration_value_for_text("P1Y2M3DT4H5M6S").unwrap();
        assert_eq!(d.months, 14);
        assert_eq!(d.days, 3);
        assert_eq!(d.seconds, 4 * 3600 + 5 * 60 + 6);
    }

    #[test]
    fn parses_date_only() {
        let d = duration_value_for_text("P10D").unwrap();
        assert_eq!(d.days, 10);
        assert_eq!(d.seconds, 0);
    }
}
