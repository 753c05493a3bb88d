use std::sync::Arc;

use crate::recur::{
    expander::{Candidates, Expansion},
    instant::Instant,
    metrics::CalendarMetrics,
    part::resolve,
};

/// A BYWEEKNO expansion.
///
/// Each candidate is the first day of one of the given weeks in the seed's
/// year, standing in for the whole week. Weeks are numbered according to
/// the week start of the metrics in use, and `-1` is the last week of the
/// year. A later weekday expansion picks the actual days.
///
/// Note that week one may start in the previous calendar year and the last
/// week may end in the next one.
#[derive(Clone, Debug)]
pub struct WeekNoExpansion {
    weeks: Box<[i8]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl WeekNoExpansion {
    pub fn new(
        weeks: &[i8],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> WeekNoExpansion {
        WeekNoExpansion { weeks: weeks.into(), metrics }
    }
}

impl Expansion for WeekNoExpansion {
    fn part(&self) -> &'static str {
        "BYWEEKNO"
    }

    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>) {
        let year = seed.year();
        let len = i16::from(self.metrics.weeks_in_year(year));
        for &week in self.weeks.iter() {
            let Some(week) = resolve(i16::from(week), len) else { continue };
            // OK because `resolve` guarantees `1..=len` and `len <= 53`.
            let week = week as i8;
            let Ok(first) = self.metrics.with_week(seed, year, week) else {
                continue;
            };
            // Only prune when the entire week is over before the start.
            let Ok(last) = self.metrics.add_days(first, 6) else {
                continue;
            };
            if last.precedes_day_of(start) {
                continue;
            }
            out.accept(first);
        }
    }
}
