use chrono::{Datelike, Duration, NaiveDate};

use crate::utils::time::last_day_of_month;

/// Window used by calendar views. Weeks start on Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPeriod {
    Week,
    Month,
    Year,
}

impl CalendarPeriod {
    /// First and last day (inclusive) of the period containing `reference`.
    pub fn bounds(self, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            CalendarPeriod::Week => {
                let offset = reference.weekday().num_days_from_sunday();
                let start = reference - Duration::days(i64::from(offset));
                (start, start + Duration::days(6))
            }
            CalendarPeriod::Month => {
                let start = reference.with_day(1).unwrap_or(reference);
                (start, last_day_of_month(reference))
            }
            CalendarPeriod::Year => {
                let start = reference.with_ordinal(1).unwrap_or(reference);
                let end = reference
                    .with_month(12)
                    .and_then(|d| d.with_day(31))
                    .unwrap_or(reference);
                (start, end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn weeks_start_on_sunday() {
        // 2025-06-04 is a Wednesday.
        let (start, end) = CalendarPeriod::Week.bounds(day("2025-06-04"));
        assert_eq!(start, day("2025-06-01"));
        assert_eq!(start.weekday(), Weekday::Sun);
        assert_eq!(end, day("2025-06-07"));

        let (start, _) = CalendarPeriod::Week.bounds(day("2025-06-01"));
        assert_eq!(start, day("2025-06-01"));
    }

    #[test]
    fn weeks_can_cross_years() {
        let (start, end) = CalendarPeriod::Week.bounds(day("2025-01-01"));
        assert_eq!(start, day("2024-12-29"));
        assert_eq!(end, day("2025-01-04"));
    }

    #[test]
    fn months_and_years_are_calendar_aligned() {
        assert_eq!(
            CalendarPeriod::Month.bounds(day("2024-02-15")),
            (day("2024-02-01"), day("2024-02-29"))
        );
        assert_eq!(
            CalendarPeriod::Year.bounds(day("2024-07-09")),
            (day("2024-01-01"), day("2024-12-31"))
        );
    }
}
