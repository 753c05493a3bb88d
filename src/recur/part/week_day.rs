use std::{
    cmp::Ordering,
    sync::{Arc, LazyLock},
};

use {anyhow::Context, jiff::civil::Weekday, regex::Regex};

use crate::{
    args::flags,
    recur::{
        Scope,
        expander::{Candidates, Expansion},
        filter::ByFilter,
        instant::Instant,
        metrics::CalendarMetrics,
    },
};

/// A BYDAY value: a weekday, or the nth weekday of a month or year.
///
/// The order is only used to sort and deduplicate rule parts, so it ignores
/// the week start. Plain weekdays come before numbered ones.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByWeekday {
    Any(Weekday),
    /// The `nth` occurrence of a weekday within a month or a year. Negative
    /// values count from the end, so `-1` is the last one.
    Numbered { nth: i8, weekday: Weekday },
}

impl ByWeekday {
    /// Returns true when this matches a day with the given weekday, which is
    /// the zero-based `offset` day of a period containing `len` days.
    ///
    /// The period is only relevant for numbered weekdays.
    fn matches(&self, wd: Weekday, offset: i16, len: i16) -> bool {
        match *self {
            ByWeekday::Any(weekday) => weekday == wd,
            ByWeekday::Numbered { nth, weekday } => {
                if weekday != wd {
                    return false;
                }
                let nth = i16::from(nth);
                let from_start = offset / 7 + 1;
                let from_end = -((len - 1 - offset) / 7 + 1);
                nth == from_start || nth == from_end
            }
        }
    }
}

impl From<Weekday> for ByWeekday {
    fn from(weekday: Weekday) -> ByWeekday {
        ByWeekday::Any(weekday)
    }
}

impl From<(i8, Weekday)> for ByWeekday {
    fn from((nth, weekday): (i8, Weekday)) -> ByWeekday {
        ByWeekday::Numbered { nth, weekday }
    }
}

impl Ord for ByWeekday {
    fn cmp(&self, rhs: &ByWeekday) -> Ordering {
        let key = |wd: &ByWeekday| match *wd {
            ByWeekday::Any(weekday) => {
                (None, weekday.to_monday_zero_offset())
            }
            ByWeekday::Numbered { nth, weekday } => {
                (Some(nth), weekday.to_monday_zero_offset())
            }
        };
        key(self).cmp(&key(rhs))
    }
}

impl PartialOrd for ByWeekday {
    fn partial_cmp(&self, rhs: &ByWeekday) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

/// Accepts `fri`, `-1-fri` and the RFC 5545 spelling `-1FR`.
impl std::str::FromStr for ByWeekday {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ByWeekday> {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?:(?<nth>[-+]?[0-9]+)-?)?(?<weekday>[A-Za-z]+)$")
                .unwrap()
        });
        let caps = RE.captures(s).with_context(|| {
            format!("`{s}` is neither a weekday nor a numbered weekday")
        })?;
        let weekday = flags::weekday(&caps["weekday"])?;
        let Some(nth) = caps.name("nth") else {
            return Ok(ByWeekday::Any(weekday));
        };
        let nth = nth.as_str();
        let nth = nth.parse().with_context(|| {
            format!("weekday number `{nth}` is too big")
        })?;
        Ok(ByWeekday::Numbered { nth, weekday })
    }
}

impl std::fmt::Display for ByWeekday {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = |wd: Weekday| match wd {
            Weekday::Sunday => "Sun",
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
        };
        match *self {
            ByWeekday::Any(weekday) => write!(f, "{}", label(weekday)),
            ByWeekday::Numbered { nth, weekday } => {
                write!(f, "{nth}-{}", label(weekday))
            }
        }
    }
}

/// A BYDAY expansion.
///
/// In a weekly scope, this produces each of the given weekdays of the
/// seed's week. In a monthly or yearly scope, it produces every day of the
/// seed's month or year with a matching weekday, or only the nth one for
/// numbered weekdays.
#[derive(Clone, Debug)]
pub struct WeekDayExpansion {
    weekdays: Box<[ByWeekday]>,
    scope: Scope,
    metrics: Arc<dyn CalendarMetrics>,
}

impl WeekDayExpansion {
    pub fn new(
        weekdays: &[ByWeekday],
        scope: Scope,
        metrics: Arc<dyn CalendarMetrics>,
    ) -> WeekDayExpansion {
        WeekDayExpansion { weekdays: weekdays.into(), scope, metrics }
    }

    /// Returns the first day of the period containing `seed`, along with
    /// the number of days in that period.
    fn period(&self, seed: Instant) -> anyhow::Result<(Instant, i16)> {
        let m = &self.metrics;
        let (year, month) = (seed.year(), seed.month());
        match self.scope {
            Scope::Weekly | Scope::WeeklyAndMonthly => {
                Ok((m.start_of_week(seed)?, 7))
            }
            Scope::Monthly => {
                let first = m.with_date(seed, year, month, 1)?;
                Ok((first, i16::from(m.days_in_month(year, month))))
            }
            Scope::Yearly => {
                let first = m.with_date(seed, year, 1, 1)?;
                Ok((first, m.days_in_year(year)))
            }
        }
    }
}

impl Expansion for WeekDayExpansion {
    fn part(&self) -> &'static str {
        "BYDAY"
    }

    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>) {
        let Ok((first, len)) = self.period(seed) else { return };
        let first_weekday = self.metrics.weekday(first);
        for offset in 0..len {
            let weekday = first_weekday.wrapping_add(offset);
            if !self.weekdays.iter().any(|wd| wd.matches(weekday, offset, len))
            {
                continue;
            }
            let Ok(candidate) = self.metrics.add_days(first, i32::from(offset))
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

/// A BYDAY limit.
///
/// Numbered weekdays are matched relative to the instant's month or year,
/// depending on the scope.
#[derive(Clone, Debug)]
pub struct WeekDayFilter {
    weekdays: Box<[ByWeekday]>,
    scope: Scope,
    metrics: Arc<dyn CalendarMetrics>,
}

impl WeekDayFilter {
    pub fn new(
        weekdays: &[ByWeekday],
        scope: Scope,
        metrics: Arc<dyn CalendarMetrics>,
    ) -> WeekDayFilter {
        WeekDayFilter { weekdays: weekdays.into(), scope, metrics }
    }
}

impl ByFilter for WeekDayFilter {
    fn accepts(&self, instant: Instant) -> bool {
        let m = &self.metrics;
        let weekday = m.weekday(instant);
        let (offset, len) = match self.scope {
            Scope::Weekly | Scope::WeeklyAndMonthly => {
                (i16::from(weekday.since(m.week_start())), 7)
            }
            Scope::Monthly => (
                i16::from(instant.day() - 1),
                i16::from(m.days_in_month(instant.year(), instant.month())),
            ),
            Scope::Yearly => {
                (m.day_of_year(instant) - 1, m.days_in_year(instant.year()))
            }
        };
        self.weekdays.iter().any(|wd| wd.matches(weekday, offset, len))
    }
}
