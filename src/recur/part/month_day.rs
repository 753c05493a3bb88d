use std::sync::Arc;

use crate::recur::{
    expander::{Candidates, Expansion},
    filter::ByFilter,
    instant::Instant,
    metrics::CalendarMetrics,
    part::{resolve, selects},
};

/// A BYMONTHDAY expansion: moves a seed to each of the given days of its
/// month. Negative days count from the end of the month, and days that
/// don't exist in the seed's month are skipped.
#[derive(Clone, Debug)]
pub struct MonthDayExpansion {
    days: Box<[i8]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl MonthDayExpansion {
    pub fn new(
        days: &[i8],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> MonthDayExpansion {
        MonthDayExpansion { days: days.into(), metrics }
    }
}

impl Expansion for MonthDayExpansion {
    fn part(&self) -> &'static str {
        "BYMONTHDAY"
    }

    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>) {
        let (year, month) = (seed.year(), seed.month());
        let len = i16::from(self.metrics.days_in_month(year, month));
        for &day in self.days.iter() {
            let Some(day) = resolve(i16::from(day), len) else { continue };
            // OK because `resolve` guarantees `1..=len`, and no month has
            // more than 31 days.
            let day = day as i8;
            let Ok(candidate) = self.metrics.with_date(seed, year, month, day)
            else {
                continue;
            };
            if candidate.precedes_day_of(start) {
                continue;
            }
            out.accept(candidate);
        }
    }
}

/// A BYMONTHDAY limit.
#[derive(Clone, Debug)]
pub struct MonthDayFilter {
    days: Box<[i8]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl MonthDayFilter {
    /// `days` must be sorted.
    pub fn new(
        days: &[i8],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> MonthDayFilter {
        MonthDayFilter { days: days.into(), metrics }
    }
}

impl ByFilter for MonthDayFilter {
    fn accepts(&self, instant: Instant) -> bool {
        let len = self.metrics.days_in_month(instant.year(), instant.month());
        selects(&self.days, i16::from(instant.day()), i16::from(len))
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use crate::recur::{
        expander::ByExpander,
        iter::{FreqIterator, RuleIterator},
        metrics::GregorianMetrics,
    };

    use super::*;

    fn metrics() -> Arc<dyn CalendarMetrics> {
        Arc::new(GregorianMetrics::default())
    }

    fn expand_monthly(start: jiff::civil::Date, days: &[i8]) -> Vec<String> {
        let seeds = FreqIterator::new(
            start.to_datetime(jiff::civil::Time::midnight()),
            true,
            jiff::Span::new().months(1),
            false,
            9999,
        );
        let exp = MonthDayExpansion::new(days, metrics());
        let mut stage = ByExpander::new(
            Box::new(seeds),
            Box::new(exp),
            Instant::from(start),
        );
        stage.set_needs_sorting();
        (0..6).map(|_| stage.next().unwrap().to_string()).collect()
    }

    #[test]
    fn first_and_last() {
        insta::assert_snapshot!(
            expand_monthly(date(2024, 1, 1), &[-1, 1]).join("\n"),
            @r"
        2024-01-01
        2024-01-31
        2024-02-01
        2024-02-29
        2024-03-01
        2024-03-31
        ",
        );
    }

    #[test]
    fn nonexistent_days_skipped() {
        insta::assert_snapshot!(
            expand_monthly(date(2025, 1, 1), &[30]).join("\n"),
            @r"
        2025-01-30
        2025-03-30
        2025-04-30
        2025-05-30
        2025-06-30
        2025-07-30
        ",
        );
    }

    #[test]
    fn days_before_start_pruned() {
        insta::assert_snapshot!(
            expand_monthly(date(2025, 1, 20), &[1, 15, -1]).join("\n"),
            @r"
        2025-01-31
        2025-02-01
        2025-02-15
        2025-02-28
        2025-03-01
        2025-03-15
        ",
        );
    }

    #[test]
    fn filter_positive_and_negative() {
        let filter = MonthDayFilter::new(&[-2, 13], metrics());
        assert!(filter.accepts(Instant::from(date(2025, 6, 13))));
        assert!(filter.accepts(Instant::from(date(2025, 6, 29))));
        assert!(!filter.accepts(Instant::from(date(2025, 6, 30))));
        assert!(filter.accepts(Instant::from(date(2025, 2, 27))));
        assert!(filter.accepts(Instant::from(date(2024, 2, 28))));
    }
}
