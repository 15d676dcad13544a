use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

/// This is the standard way of converting a date to a string in dailygrid. Every stat table is
/// keyed by this representation.
pub fn date_to_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Inverse of [date_to_key]. Malformed keys are a precondition error.
pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").with_context(|| format!("Invalid date key {key:?}"))
}

/// Inclusive iterator over consecutive days.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

pub fn first_day_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

pub fn last_day_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn date_keys_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(date_to_key(date), "2025-06-01");
        assert_eq!(parse_date_key("2025-06-01").unwrap(), date);
        assert!(parse_date_key("2025-6-1x").is_err());
        assert!(parse_date_key("2025-02-30").is_err());
    }

    #[test]
    fn month_ends() {
        let leap = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        assert_eq!(last_day_of_month(leap), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let december = NaiveDate::from_ymd_opt(2025, 12, 3).unwrap();
        assert_eq!(last_day_of_month(december), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn day_iteration_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(days_between(start, end).count(), 4);
        assert_eq!(days_between(end, start).count(), 0);
    }
}
