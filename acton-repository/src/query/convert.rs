//! Raw value parsing into typed scalars
//!
//! Date values accept, in order: `dd/MM/yyyy HH:mm`, `dd/MM/yyyy`, `dd/MM`
//! (current year) and `dd` (current year and month). "Current" comes from the
//! reference date passed in by the predicate builder.
//!
//! Durations accept whole days (`3`) or `[-][d.]hh:mm[:ss[.fffffff]]`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use uuid::Uuid;

use crate::query::predicate::Scalar;
use crate::schema::ScalarKind;

/// The smallest representable step of a stored timestamp
pub fn tick() -> TimeDelta {
    TimeDelta::nanoseconds(100)
}

/// Parse `raw` into a constant of `kind`
pub fn parse_scalar(kind: ScalarKind, raw: &str, today: NaiveDate) -> Option<Scalar> {
    let trimmed = raw.trim();
    match kind {
        ScalarKind::Text => Some(Scalar::Text(raw.to_string())),
        ScalarKind::Integer => trimmed.parse().ok().map(Scalar::Integer),
        ScalarKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Scalar::Float),
        ScalarKind::Boolean => parse_bool(trimmed).map(Scalar::Boolean),
        ScalarKind::Uuid => Uuid::parse_str(trimmed).ok().map(Scalar::Uuid),
        ScalarKind::DateTime => parse_date_time(trimmed, today).map(Scalar::DateTime),
        ScalarKind::Duration => parse_duration(trimmed).map(Scalar::Duration),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a day-first date, filling missing parts from `today`
pub fn parse_date_time(raw: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M") {
        return Some(parsed);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Some(date.and_time(NaiveTime::MIN));
    }

    let date = match raw.split_once('/') {
        Some((day, month)) => {
            NaiveDate::from_ymd_opt(today.year(), small_number(month)?, small_number(day)?)
        }
        None => NaiveDate::from_ymd_opt(today.year(), today.month(), small_number(raw)?),
    }?;
    Some(date.and_time(NaiveTime::MIN))
}

// one or two ASCII digits
fn small_number(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Last tick of the calendar day containing `at`
pub fn end_of_day(at: NaiveDateTime) -> Option<NaiveDateTime> {
    at.date()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(TimeDelta::days(1))?
        .checked_sub_signed(tick())
}

/// Widen an upper bound: a bare date covers its whole day, a time covers its minute
pub fn adjust_range_end(at: NaiveDateTime) -> Option<NaiveDateTime> {
    if at.time() == NaiveTime::MIN {
        end_of_day(at)
    } else {
        at.checked_add_signed(TimeDelta::seconds(59))
    }
}

/// Parse a signed duration
pub fn parse_duration(raw: &str) -> Option<TimeDelta> {
    let raw = raw.trim();
    let (negative, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    if body.is_empty() {
        return None;
    }

    let delta = if body.contains(':') {
        let (days, clock) = match body.split_once('.') {
            Some((days, clock)) if !days.contains(':') => (digits(days)?, clock),
            _ => (0, body),
        };

        let mut parts = clock.split(':');
        let hours = digits(parts.next()?)?;
        let minutes = digits(parts.next()?)?;
        let (seconds, nanos) = match parts.next() {
            Some(seconds) => parse_seconds(seconds)?,
            None => (0, 0),
        };
        if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
            return None;
        }

        let total = days
            .checked_mul(86_400)?
            .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
        TimeDelta::try_seconds(total)?.checked_add(&TimeDelta::nanoseconds(nanos))?
    } else {
        TimeDelta::try_days(digits(body)?)?
    };

    Some(if negative { -delta } else { delta })
}

fn digits(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

// "ss" or "ss.fffffff" (up to seven fractional digits)
fn parse_seconds(raw: &str) -> Option<(i64, i64)> {
    match raw.split_once('.') {
        Some((seconds, fraction)) => {
            if fraction.is_empty() || fraction.len() > 7 {
                return None;
            }
            let scale = 10_i64.pow(9 - fraction.len() as u32);
            Some((digits(seconds)?, digits(fraction)? * scale))
        }
        None => Some((digits(raw)?, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(
            parse_date_time("15/01/2024 10:30", today()),
            Some(at(2024, 1, 15, 10, 30))
        );
        assert_eq!(
            parse_date_time("15/01/2024", today()),
            Some(at(2024, 1, 15, 0, 0))
        );
        assert_eq!(parse_date_time("03/02", today()), Some(at(2024, 2, 3, 0, 0)));
        assert_eq!(parse_date_time("07", today()), Some(at(2024, 5, 7, 0, 0)));
        assert_eq!(parse_date_time(" 07 ", today()), Some(at(2024, 5, 7, 0, 0)));
    }

    #[test]
    fn test_date_rejects_garbage() {
        assert!(parse_date_time("2024-01-15", today()).is_none());
        assert!(parse_date_time("31/02", today()).is_none());
        assert!(parse_date_time("abc", today()).is_none());
        assert!(parse_date_time("123", today()).is_none());
        assert!(parse_date_time("", today()).is_none());
    }

    #[test]
    fn test_end_of_day() {
        let end = end_of_day(at(2024, 10, 1, 18, 45)).unwrap();
        assert_eq!(end, at(2024, 10, 2, 0, 0) - tick());
        assert_eq!(end.format("%H:%M:%S%.9f").to_string(), "23:59:59.999999900");
    }

    #[test]
    fn test_adjust_range_end() {
        assert_eq!(
            adjust_range_end(at(2024, 1, 1, 0, 0)),
            end_of_day(at(2024, 1, 1, 0, 0))
        );
        assert_eq!(
            adjust_range_end(at(2024, 1, 1, 9, 15)),
            Some(at(2024, 1, 1, 9, 15) + TimeDelta::seconds(59))
        );
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(parse_duration("3"), Some(TimeDelta::days(3)));
        assert_eq!(parse_duration("02:30"), Some(TimeDelta::minutes(150)));
        assert_eq!(
            parse_duration("1.12:00:00"),
            Some(TimeDelta::hours(36))
        );
        assert_eq!(
            parse_duration("00:00:01.5"),
            Some(TimeDelta::milliseconds(1500))
        );
        assert_eq!(parse_duration("-01:00"), Some(TimeDelta::hours(-1)));
    }

    #[test]
    fn test_duration_rejects_out_of_range() {
        assert!(parse_duration("24:00").is_none());
        assert!(parse_duration("00:60").is_none());
        assert!(parse_duration("1:2:3:4").is_none());
        assert!(parse_duration("soon").is_none());
        assert!(parse_duration("-").is_none());
    }

    #[test]
    fn test_parse_scalar_by_kind() {
        assert_eq!(
            parse_scalar(ScalarKind::Integer, " 42 ", today()),
            Some(Scalar::Integer(42))
        );
        assert_eq!(
            parse_scalar(ScalarKind::Float, "2.5", today()),
            Some(Scalar::Float(2.5))
        );
        assert_eq!(parse_scalar(ScalarKind::Float, "NaN", today()), None);
        assert_eq!(
            parse_scalar(ScalarKind::Boolean, "TRUE", today()),
            Some(Scalar::Boolean(true))
        );
        assert_eq!(parse_scalar(ScalarKind::Boolean, "yes", today()), None);
        assert_eq!(
            parse_scalar(
                ScalarKind::Uuid,
                "00000000-0000-0000-0000-000000000001",
                today()
            ),
            Some(Scalar::Uuid(Uuid::from_u128(1)))
        );
        assert_eq!(parse_scalar(ScalarKind::Integer, "4.5", today()), None);
    }
}
