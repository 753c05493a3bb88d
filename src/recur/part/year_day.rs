use std::sync::Arc;

use crate::recur::{
    expander::{Candidates, Expansion},
    filter::ByFilter,
    instant::Instant,
    metrics::CalendarMetrics,
    part::{resolve, selects},
};

/// A BYYEARDAY expansion: moves a seed to each of the given days of its
/// year, where `-1` is the last day of the year.
#[derive(Clone, Debug)]
pub struct YearDayExpansion {
    days: Box<[i16]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl YearDayExpansion {
    pub fn new(
        days: &[i16],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> YearDayExpansion {
        YearDayExpansion { days: days.into(), metrics }
    }
}

impl Expansion for YearDayExpansion {
    fn part(&self) -> &'static str {
        "BYYEARDAY"
    }

    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>) {
        let year = seed.year();
        let len = self.metrics.days_in_year(year);
        for &day in self.days.iter() {
            let Some(day) = resolve(day, len) else { continue };
            let Ok(candidate) =
                self.metrics.with_day_of_year(seed, year, day)
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

/// A BYYEARDAY limit.
#[derive(Clone, Debug)]
pub struct YearDayFilter {
    days: Box<[i16]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl YearDayFilter {
    /// `days` must be sorted.
    pub fn new(
        days: &[i16],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> YearDayFilter {
        YearDayFilter { days: days.into(), metrics }
    }
}

impl ByFilter for YearDayFilter {
    fn accepts(&self, instant: Instant) -> bool {
        let len = self.metrics.days_in_year(instant.year());
        selects(&self.days, self.metrics.day_of_year(instant), len)
    }
}
