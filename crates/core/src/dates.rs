//! Calendar-date keys and due-date urgency.
//!
//! Every date the board reasons about is a `NaiveDate` key. Clock readings
//! are reduced to their local calendar date before any comparison, so two
//! keys always compare the same way regardless of time zone offset.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, TimeZone, Weekday};

use crate::model::Urgency;

pub const KEY_FORMAT: &str = "%Y-%m-%d";

/// Canonical `YYYY-MM-DD` key for a date.
pub fn date_key(date: NaiveDate) -> String {
    date.format(KEY_FORMAT).to_string()
}

pub fn parse_date_key(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), KEY_FORMAT)
        .with_context(|| format!("Invalid date key '{}'", raw))
}

/// Calendar date of a clock reading in its own zone; time of day is dropped.
pub fn reference_date<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    now.date_naive()
}

pub fn today() -> NaiveDate {
    reference_date(&Local::now())
}

/// Whole days left until the end of the due day, counted from the start of `reference`.
pub fn days_remaining(due: NaiveDate, reference: NaiveDate) -> i64 {
    (due - reference).num_days() + 1
}

pub fn classify_urgency(due: Option<NaiveDate>, reference: NaiveDate) -> Urgency {
    let Some(due) = due else {
        return Urgency::None;
    };

    match days_remaining(due, reference) {
        days if days <= 1 => Urgency::High,
        days if days <= 3 => Urgency::Medium,
        days if days > 5 => Urgency::Low,
        _ => Urgency::Neutral,
    }
}

/// Resolve a human date spec (`today`, `tomorrow`, `+3d`, `mon`, `2024-01-10`) against `today`.
pub fn parse_date_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if lower.starts_with('+') {
        return parse_relative_spec(&lower, today);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Ok(today + Duration::days(days_ahead));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, KEY_FORMAT) {
        return Ok(date);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }

    Err(anyhow!(
        "Unrecognized date specification '{}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon",
        spec
    ))
}

fn parse_relative_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let body = spec.strip_prefix('+').unwrap_or(spec);
    let Some((split, unit)) = body.char_indices().last() else {
        return Err(anyhow!("Relative date '{}' is too short", spec));
    };
    let number_part = &body[..split];
    if number_part.is_empty() {
        return Err(anyhow!("Relative date '{}' is too short", spec));
    }
    let value: i64 = number_part.parse().context("Invalid relative offset")?;
    let shifted = match unit {
        'd' => shift_days(today, value),
        'w' => value.checked_mul(7).and_then(|days| shift_days(today, days)),
        'm' => u32::try_from(value)
            .ok()
            .and_then(|months| today.checked_add_months(Months::new(months))),
        other => {
            return Err(anyhow!(
                "Unsupported relative unit '{}'. Use d, w, or m.",
                other
            ))
        }
    };
    shifted.ok_or_else(|| anyhow!("Relative date '{}' is out of range", spec))
}

fn shift_days(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        today.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(d(2024, 1, 9), Urgency::Medium)]
    #[case(d(2024, 1, 10), Urgency::High)]
    #[case(d(2024, 1, 12), Urgency::High)]
    #[case(d(2024, 1, 8), Urgency::Medium)]
    #[case(d(2024, 1, 7), Urgency::Neutral)]
    #[case(d(2024, 1, 6), Urgency::Neutral)]
    #[case(d(2024, 1, 5), Urgency::Low)]
    #[case(d(2023, 12, 1), Urgency::Low)]
    fn classifies_due_2024_01_10(#[case] reference: NaiveDate, #[case] expected: Urgency) {
        assert_eq!(classify_urgency(Some(d(2024, 1, 10)), reference), expected);
    }

    #[test]
    fn missing_due_date_has_no_tier() {
        assert_eq!(classify_urgency(None, d(2024, 1, 1)), Urgency::None);
    }

    #[test]
    fn reference_date_ignores_offset_and_time_of_day() {
        let late_east = FixedOffset::east_opt(14 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 9, 23, 59, 0)
            .unwrap();
        let early_west = FixedOffset::west_opt(11 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 9, 0, 1, 0)
            .unwrap();
        let utc_noon = Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap();

        let due = Some(d(2024, 1, 10));
        for reference in [
            reference_date(&late_east),
            reference_date(&early_west),
            reference_date(&utc_noon),
        ] {
            assert_eq!(reference, d(2024, 1, 9));
            assert_eq!(classify_urgency(due, reference), Urgency::Medium);
        }
    }

    #[test]
    fn date_keys_roundtrip() {
        assert_eq!(date_key(d(2024, 2, 29)), "2024-02-29");
        assert_eq!(parse_date_key("2024-02-29").unwrap(), d(2024, 2, 29));
        assert!(parse_date_key("29/02/2024").is_err());
    }

    #[test]
    fn parses_relative_and_named_specs() {
        // 2024-01-10 is a Wednesday.
        let today = d(2024, 1, 10);
        assert_eq!(parse_date_spec("today", today).unwrap(), today);
        assert_eq!(parse_date_spec("tomorrow", today).unwrap(), d(2024, 1, 11));
        assert_eq!(parse_date_spec("+3d", today).unwrap(), d(2024, 1, 13));
        assert_eq!(parse_date_spec("+2w", today).unwrap(), d(2024, 1, 24));
        assert_eq!(parse_date_spec("+1m", today).unwrap(), d(2024, 2, 10));
        assert_eq!(parse_date_spec("fri", today).unwrap(), d(2024, 1, 12));
        assert_eq!(parse_date_spec("wed", today).unwrap(), d(2024, 1, 17));
        assert_eq!(parse_date_spec("2024-03-01", today).unwrap(), d(2024, 3, 1));
        assert!(parse_date_spec("+3y", today).is_err());
        assert!(parse_date_spec("", today).is_err());
    }

    #[rstest]
    #[case("+3é")]
    #[case("+é")]
    #[case("+d")]
    #[case("+")]
    #[case("+999999999d")]
    #[case("+999999999999w")]
    #[case("+99999999m")]
    #[case("+-5m")]
    fn malformed_or_huge_offsets_are_errors(#[case] spec: &str) {
        assert!(parse_date_spec(spec, d(2024, 1, 10)).is_err());
    }

    #[test]
    fn negative_day_offsets_step_back() {
        assert_eq!(parse_date_spec("+-2d", d(2024, 1, 10)).unwrap(), d(2024, 1, 8));
    }
}
