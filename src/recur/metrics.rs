use {
    anyhow::Context,
    jiff::{
        ToSpan,
        civil::{Date, Weekday},
    },
};

use crate::recur::instant::Instant;

/// An oracle for calendar arithmetic on instants.
///
/// Rule part filters and expanders never do date arithmetic themselves.
/// Instead, they are handed one of these at construction time. This keeps
/// the pipeline independent of any one calendar system and of the week
/// numbering convention (the RFC 5545 `WKST`) in effect for a rule.
///
/// Every method that moves an instant to another date preserves the time of
/// day and the all-day flag of the instant given.
pub trait CalendarMetrics: std::fmt::Debug {
    /// The weekday on which weeks start.
    fn week_start(&self) -> Weekday;

    /// Returns the first day of the week containing `instant`.
    fn start_of_week(&self, instant: Instant) -> anyhow::Result<Instant>;

    /// Returns `instant` moved by the given number of days, which may be
    /// negative.
    fn add_days(&self, instant: Instant, days: i32) -> anyhow::Result<Instant>;

    fn weekday(&self, instant: Instant) -> Weekday;

    /// Returns the one-based day of the year of `instant`.
    fn day_of_year(&self, instant: Instant) -> i16;

    fn days_in_year(&self, year: i16) -> i16;

    fn days_in_month(&self, year: i16, month: i8) -> i8;

    /// Returns the number of weeks in the given week numbering year.
    fn weeks_in_year(&self, year: i16) -> i8;

    /// Returns `instant` moved to the given date. This fails when the date
    /// does not exist, e.g., February 30.
    fn with_date(
        &self,
        instant: Instant,
        year: i16,
        month: i8,
        day: i8,
    ) -> anyhow::Result<Instant>;

    /// Returns `instant` moved to the given one-based day of `year`.
    fn with_day_of_year(
        &self,
        instant: Instant,
        year: i16,
        day: i16,
    ) -> anyhow::Result<Instant>;

    /// Returns `instant` moved to the first day of the given one-based week
    /// of the week numbering `year`.
    fn with_week(
        &self,
        instant: Instant,
        year: i16,
        week: i8,
    ) -> anyhow::Result<Instant>;
}

/// Calendar metrics for the proleptic Gregorian calendar, backed by Jiff.
///
/// Week numbering follows RFC 5545: week one of a year is the first week
/// (starting on the configured weekday) containing at least four days of
/// that year. With weeks starting on Monday, this is ISO 8601 week
/// numbering.
#[derive(Clone, Debug)]
pub struct GregorianMetrics {
    week_start: Weekday,
}

impl GregorianMetrics {
    pub fn new(week_start: Weekday) -> GregorianMetrics {
        GregorianMetrics { week_start }
    }
}

impl Default for GregorianMetrics {
    fn default() -> GregorianMetrics {
        GregorianMetrics::new(Weekday::Monday)
    }
}

impl CalendarMetrics for GregorianMetrics {
    fn week_start(&self) -> Weekday {
        self.week_start
    }

    fn start_of_week(&self, instant: Instant) -> anyhow::Result<Instant> {
        let date = instant.date();
        if date.weekday() == self.week_start {
            return Ok(instant);
        }
        let first = date.nth_weekday(-1, self.week_start).with_context(|| {
            format!("no {:?} on or before {date}", self.week_start)
        })?;
        Ok(instant.with_date(first))
    }

    fn add_days(
        &self,
        instant: Instant,
        days: i32,
    ) -> anyhow::Result<Instant> {
        let date = instant.date();
        let moved = date.checked_add(days.days()).with_context(|| {
            format!("adding {days} days to {date} is out of range")
        })?;
        Ok(instant.with_date(moved))
    }

    fn weekday(&self, instant: Instant) -> Weekday {
        instant.date().weekday()
    }

    fn day_of_year(&self, instant: Instant) -> i16 {
        instant.date().day_of_year()
    }

    fn days_in_year(&self, year: i16) -> i16 {
        if jiff::civil::date(year, 1, 1).in_leap_year() { 366 } else { 365 }
    }

    fn days_in_month(&self, year: i16, month: i8) -> i8 {
        jiff::civil::date(year, month, 1).days_in_month()
    }

    fn weeks_in_year(&self, year: i16) -> i8 {
        if is_long_year(self.week_start, year) { 53 } else { 52 }
    }

    fn with_date(
        &self,
        instant: Instant,
        year: i16,
        month: i8,
        day: i8,
    ) -> anyhow::Result<Instant> {
        let date = Date::new(year, month, day).with_context(|| {
            format!("{year:04}-{month:02}-{day:02} is not a valid date")
        })?;
        Ok(instant.with_date(date))
    }

    fn with_day_of_year(
        &self,
        instant: Instant,
        year: i16,
        day: i16,
    ) -> anyhow::Result<Instant> {
        let date = Date::new(year, 1, 1)
            .and_then(|first| first.with().day_of_year(day).build())
            .with_context(|| {
                format!("day `{day}` does not exist in year `{year:04}`")
            })?;
        Ok(instant.with_date(date))
    }

    fn with_week(
        &self,
        instant: Instant,
        year: i16,
        week: i8,
    ) -> anyhow::Result<Instant> {
        let start = self.week_start;
        anyhow::ensure!(
            1 <= week && week <= self.weeks_in_year(year),
            "{year} has no week `{week}` when weeks start on {start:?}",
        );
        let first = week_start_of_year(start, year)?;
        let days = i32::from(week - 1) * 7;
        let date = first.checked_add(days.days()).with_context(|| {
            format!("week `{week}` of {year} is out of range")
        })?;
        Ok(instant.with_date(date))
    }
}

/// A year has 53 weeks when it starts on the fourth day of a week, or on
/// the third day in a leap year. Otherwise its last week has fewer than four
/// days in it.
fn is_long_year(start: Weekday, year: i16) -> bool {
    let jan1 = jiff::civil::date(year, 1, 1);
    match jan1.weekday().since(start) {
        3 => true,
        2 => jan1.in_leap_year(),
        _ => false,
    }
}

/// Returns the first date in week one of the given year.
fn week_start_of_year(start: Weekday, year: i16) -> anyhow::Result<Date> {
    // Week one contains at least four days of `year`, so January 4th is
    // always in it.
    let jan4 = Date::new(year, 1, 4)
        .with_context(|| format!("year `{year}` is out of range"))?;
    let back = jan4.weekday().since(start);
    jan4.checked_sub(back.days())
        .with_context(|| format!("week 1 of {year} is out of range"))
}

#[cfg(test)]
mod tests {
    use jiff::civil::{ISOWeekDate, Weekday::*, date, datetime};

    use super::*;

    fn instant(y: i16, m: i8, d: i8) -> Instant {
        Instant::from(datetime(y, m, d, 9, 0, 0, 0))
    }

    #[test]
    fn start_of_week_keeps_time() {
        let monday = GregorianMetrics::new(Monday);
        let got = monday.start_of_week(instant(2025, 1, 1)).unwrap();
        assert_eq!(got, instant(2024, 12, 30));

        let sunday = GregorianMetrics::new(Sunday);
        let got = sunday.start_of_week(instant(2025, 1, 1)).unwrap();
        assert_eq!(got, instant(2024, 12, 29));

        let got = sunday.start_of_week(instant(2024, 12, 29)).unwrap();
        assert_eq!(got, instant(2024, 12, 29));
    }

    #[test]
    fn add_days_out_of_range() {
        let m = GregorianMetrics::default();
        let last = Instant::from(date(9999, 12, 31));
        assert!(m.add_days(last, 1).is_err());
        assert_eq!(
            m.add_days(last, -365).unwrap(),
            Instant::from(date(9998, 12, 31)),
        );
    }

    #[test]
    fn with_date_rejects_invalid() {
        let m = GregorianMetrics::default();
        assert!(m.with_date(instant(2025, 1, 31), 2025, 2, 29).is_err());
        assert_eq!(
            m.with_date(instant(2025, 1, 31), 2024, 2, 29).unwrap(),
            instant(2024, 2, 29),
        );
        assert!(m.with_day_of_year(instant(2025, 1, 1), 2025, 366).is_err());
        assert_eq!(
            m.with_day_of_year(instant(2025, 1, 1), 2024, 366).unwrap(),
            instant(2024, 12, 31),
        );
    }

    #[test]
    fn lengths() {
        let m = GregorianMetrics::default();
        assert_eq!(m.days_in_year(2024), 366);
        assert_eq!(m.days_in_year(2100), 365);
        assert_eq!(m.days_in_month(2024, 2), 29);
        assert_eq!(m.days_in_month(2025, 2), 28);
        assert_eq!(m.days_in_month(2025, 12), 31);
    }

    /// Tests that for weeks starting on Monday, week numbering agrees with
    /// Jiff's ISO 8601 week dates.
    #[test]
    fn weeks_consistent_with_iso() {
        let m = GregorianMetrics::new(Monday);
        for year in (-100..=100).chain(1800..=2300) {
            let long = ISOWeekDate::new(year, 53, Monday).is_ok();
            assert_eq!(m.weeks_in_year(year), if long { 53 } else { 52 });
            for week in [1, 2, 26, 52] {
                let expected = ISOWeekDate::new(year, week, Monday)
                    .unwrap()
                    .date();
                let got = m.with_week(instant(year, 6, 1), year, week).unwrap();
                assert_eq!(
                    got.date(),
                    expected,
                    "week {week} of {year} should start on {expected}",
                );
            }
        }
    }

    #[test]
    fn weeks_other_start() {
        let m = GregorianMetrics::new(Saturday);
        // 2025-01-04 is a Saturday, so it starts week one.
        let got = m.with_week(instant(2025, 6, 1), 2025, 1).unwrap();
        assert_eq!(got, instant(2025, 1, 4));
        // ... which means the days before it belong to week 53 of 2024.
        assert_eq!(m.weeks_in_year(2024), 53);
        let got = m.with_week(instant(2025, 6, 1), 2024, 53).unwrap();
        assert_eq!(got, instant(2024, 12, 28));

        assert!(m.with_week(instant(2025, 6, 1), 2025, 53).is_err());
        assert!(m.with_week(instant(2025, 6, 1), 2025, 0).is_err());
    }
}
