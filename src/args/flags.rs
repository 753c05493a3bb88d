use {anyhow::Context, jiff::civil};

use crate::{args::Usage, recur::Instant, recur::part::ByWeekday};

/// A datetime like `2024-07-20T16:30`, or a date like `2024-07-20` for an
/// all-day sequence.
#[derive(Clone, Copy, Debug)]
pub struct CivilInstant(Instant);

impl CivilInstant {
    pub const ARG: Usage = Usage::arg(
        "<start>",
        "Where the sequence starts. Defaults to now.",
        r#"
Where the sequence starts. Defaults to now.

A datetime such as `2024-07-20T16:30:55` (or `2024-07-20 16:30:55`) gives a
sequence of datetimes. A date such as `2024-07-20` gives a sequence of dates,
and then the frequency must be daily or longer.

The start anchors the rule: any time of day, day, week or month the rule
doesn't set is copied from it. It is only printed itself when it matches.
"#,
    );

    pub fn get(&self) -> Instant {
        self.0
    }
}

impl std::str::FromStr for CivilInstant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<CivilInstant> {
        let has_time = s.contains(['T', 't', ' ']);
        let instant = if has_time {
            s.parse::<civil::DateTime>().map(Instant::from_datetime)
        } else {
            s.parse::<civil::Date>().map(Instant::from_date)
        };
        let what = if has_time { "datetime" } else { "date" };
        instant
            .map(CivilInstant)
            .with_context(|| format!("`{s}` is not a valid {what}"))
    }
}

/// Finds the entry whose name starts with `s`, ignoring case. At least
/// `min` characters must be given.
fn lookup<T: Copy>(
    table: &[(T, &str)],
    s: &str,
    min: usize,
) -> Option<T> {
    if s.len() < min {
        return None;
    }
    let s = s.to_ascii_lowercase();
    table.iter().find(|(_, name)| name.starts_with(&s)).map(|&(v, _)| v)
}

/// Parses a weekday from any abbreviation of its English name of at least
/// two letters, like `mo`, `thurs` or `Friday`.
pub fn weekday(s: &str) -> anyhow::Result<civil::Weekday> {
    use jiff::civil::Weekday::*;

    const NAMES: [(civil::Weekday, &str); 7] = [
        (Monday, "monday"),
        (Tuesday, "tuesday"),
        (Wednesday, "wednesday"),
        (Thursday, "thursday"),
        (Friday, "friday"),
        (Saturday, "saturday"),
        (Sunday, "sunday"),
    ];
    lookup(&NAMES, s, 2)
        .with_context(|| format!("unrecognized weekday `{s}`"))
}

/// A month of the year, as a number or a name like `feb` or `sept`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct Month(i8);

impl Month {
    pub fn get(&self) -> i8 {
        self.0
    }
}

impl std::str::FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Month> {
        const NAMES: [(i8, &str); 12] = [
            (1, "january"),
            (2, "february"),
            (3, "march"),
            (4, "april"),
            (5, "may"),
            (6, "june"),
            (7, "july"),
            (8, "august"),
            (9, "september"),
            (10, "october"),
            (11, "november"),
            (12, "december"),
        ];
        if let Ok(n) = s.parse::<i8>() {
            anyhow::ensure!(
                (1..=12).contains(&n),
                "month numbers must be in 1..=12",
            );
            return Ok(Month(n));
        }
        lookup(&NAMES, s, 3)
            .map(Month)
            .with_context(|| format!("unrecognized month `{s}`"))
    }
}

/// The `--week-start` flag.
#[derive(Clone, Copy, Debug)]
pub struct WeekStart(civil::Weekday);

impl WeekStart {
    pub const USAGE: Usage = Usage::flag(
        "--week-start <weekday>",
        "The first day of the week. Defaults to Monday.",
        r#"
The first day of the week. Defaults to Monday.

Week numbers given to `--week` depend on it. So does which days a weekly
sequence skips when its interval is greater than 1.

Weekdays are written as any abbreviation of their English name that is at
least two letters long, in any case. For example, `su`, `Sun` and `sunday`
are all Sunday.
"#,
    );

    pub fn get(&self) -> civil::Weekday {
        self.0
    }
}

impl Default for WeekStart {
    fn default() -> WeekStart {
        WeekStart(civil::Weekday::Monday)
    }
}

impl std::str::FromStr for WeekStart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<WeekStart> {
        weekday(s).map(WeekStart)
    }
}

/// A value that may be given as an inclusive range like `start..end`.
pub trait Ranged: Copy + std::str::FromStr {
    /// Returns every value from `start` through `end`.
    fn through(start: Self, end: Self) -> anyhow::Result<Vec<Self>>;
}

macro_rules! ranged_integers {
    ($($ty:ty),*) => {$(
        impl Ranged for $ty {
            fn through(start: $ty, end: $ty) -> anyhow::Result<Vec<$ty>> {
                anyhow::ensure!(
                    start <= end,
                    "range `{start}..{end}` ends before it starts",
                );
                Ok((start..=end).collect())
            }
        }
    )*};
}

ranged_integers!(i8, i16, i32);

impl Ranged for Month {
    fn through(start: Month, end: Month) -> anyhow::Result<Vec<Month>> {
        Ok(i8::through(start.0, end.0)?.into_iter().map(Month).collect())
    }
}

/// Weekday ranges wrap around the end of the week, so `fri..mon` is four
/// days long.
impl Ranged for ByWeekday {
    fn through(
        start: ByWeekday,
        end: ByWeekday,
    ) -> anyhow::Result<Vec<ByWeekday>> {
        let plain = |wd: ByWeekday| match wd {
            ByWeekday::Any(weekday) => Ok(weekday),
            ByWeekday::Numbered { .. } => Err(anyhow::anyhow!(
                "numbered weekday `{wd}` cannot be part of a range",
            )),
        };
        let (start, end) = (plain(start)?, plain(end)?);
        let days = usize::from(end.since(start).unsigned_abs()) + 1;
        Ok(start.cycle_forward().take(days).map(ByWeekday::Any).collect())
    }
}

/// A comma separated list of values and ranges, like `2,5..7,-1`.
#[derive(Clone, Debug)]
pub struct Values<T>(Vec<T>);

impl<T: Copy> Values<T> {
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.0.iter().copied()
    }
}

impl<T> std::str::FromStr for Values<T>
where
    T: Ranged,
    T::Err: std::fmt::Display,
{
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Values<T>> {
        let one = |v: &str| {
            v.parse::<T>().map_err(|err| {
                anyhow::anyhow!("failed to parse `{v}`: {err:#}")
            })
        };
        let mut values = vec![];
        for item in s.split(',') {
            match item.split_once("..") {
                None => values.push(one(item)?),
                Some((start, end)) => {
                    values.extend(T::through(one(start)?, one(end)?)?)
                }
            }
        }
        Ok(Values(values))
    }
}
