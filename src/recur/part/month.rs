use std::sync::Arc;

use crate::recur::{
    expander::{Candidates, Expansion},
    filter::ByFilter,
    instant::Instant,
    metrics::CalendarMetrics,
};

/// A BYMONTH limit: accepts instants in one of the given months.
#[derive(Clone, Debug)]
pub struct MonthFilter {
    months: Box<[i8]>,
}

impl MonthFilter {
    pub fn new(months: &[i8]) -> MonthFilter {
        MonthFilter { months: months.into() }
    }
}

impl ByFilter for MonthFilter {
    fn accepts(&self, instant: Instant) -> bool {
        self.months.contains(&instant.month())
    }
}

/// A BYMONTH limit for instants standing in for an entire week.
///
/// A week may straddle two months. Rejecting a week because the instant
/// representing it lies in a disallowed month would prevent a later
/// weekday expansion from ever producing the days of that week that do lie
/// in an allowed month. So this accepts an instant when its own month, the
/// month of the first day of its week or the month of the last day of its
/// week is allowed.
///
/// This only decides whether a week survives. Excluding individual days
/// outside the allowed months is left to a [`MonthFilter`] applied after
/// the week has been expanded into days.
#[derive(Clone, Debug)]
pub struct ByMonthFilter {
    months: Box<[i8]>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl ByMonthFilter {
    pub fn new(
        months: &[i8],
        metrics: Arc<dyn CalendarMetrics>,
    ) -> ByMonthFilter {
        ByMonthFilter { months: months.into(), metrics }
    }

    fn allows(&self, instant: Instant) -> bool {
        self.months.contains(&instant.month())
    }
}

impl ByFilter for ByMonthFilter {
    fn accepts(&self, instant: Instant) -> bool {
        if self.allows(instant) {
            return true;
        }
        // A week at the very edge of the supported range might not have a
        // first or last day. There are no days of it to produce then.
        let Ok(first) = self.metrics.start_of_week(instant) else {
            return false;
        };
        if self.allows(first) {
            return true;
        }
        let Ok(last) = self.metrics.add_days(first, 6) else {
            return false;
        };
        self.allows(last)
    }
}

/// A BYMONTH expansion: moves a seed into each of the given months of its
/// year.
///
/// When `day` is `None`, a later stage picks the day (BYMONTHDAY or BYDAY)
/// and each candidate is put on the first day of its month, since only the
/// month matters. Otherwise every candidate is put on the given day, and
/// months in which that day doesn't exist are skipped.
///
/// The day is fixed at construction instead of being taken from the seed,
/// because a seed's day may have been clamped to the end of a shorter
/// month.
#[derive(Clone, Debug)]
pub struct MonthExpansion {
    months: Box<[i8]>,
    day: Option<i8>,
    metrics: Arc<dyn CalendarMetrics>,
}

impl MonthExpansion {
    pub fn new(
        months: &[i8],
        day: Option<i8>,
        metrics: Arc<dyn CalendarMetrics>,
    ) -> MonthExpansion {
        MonthExpansion { months: months.into(), day, metrics }
    }
}

impl Expansion for MonthExpansion {
    fn part(&self) -> &'static str {
        "BYMONTH"
    }

    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>) {
        let day = self.day.unwrap_or(1);
        for &month in self.months.iter() {
            let Ok(candidate) =
                self.metrics.with_date(seed, seed.year(), month, day)
            else {
                continue;
            };
            // The first of the month is a placeholder for every day in it,
            // so it can't be compared against the start.
            if self.day.is_some() && candidate.precedes_day_of(start) {
                continue;
            }
            out.accept(candidate);
        }
    }
}
