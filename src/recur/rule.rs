use std::sync::Arc;

use {
    anyhow::Context,
    jiff::{Span, civil::Weekday},
};

use crate::{
    args::Usage,
    recur::{
        chain, instant::Instant, iter::Exhausted, iter::RuleIterator,
        part::ByWeekday,
    },
};

// Unlike the set of instants a rule produces, a rule itself is immutable
// once built. Iterating a rule builds a fresh pipeline of stages each time,
// so a single rule can be iterated any number of times, independently.

/// An RFC 5545 recurrence rule.
///
/// Instants produced by a rule are civil: there is no time zone. A rule
/// whose start is an all-day instant (a date) produces all-day instants.
#[derive(Clone, Debug)]
pub struct RecurrenceRule {
    inner: Arc<RecurrenceRuleInner>,
}

#[derive(Debug)]
struct RecurrenceRuleInner {
    freq: Frequency,
    start: Instant,
    until: Option<Instant>,
    count: Option<usize>,
    interval: Span,
    by_month: Box<[i8]>,
    // can be negative
    by_week: Box<[i8]>,
    // can be negative
    by_year_day: Box<[i16]>,
    // can be negative
    by_month_day: Box<[i8]>,
    // can be negative
    by_week_day: Box<[ByWeekday]>,
    by_hour: Box<[i8]>,
    by_minute: Box<[i8]>,
    by_second: Box<[i8]>,
    // can be negative
    by_set_pos: Box<[i32]>,
    week_start: Weekday,
}

impl RecurrenceRule {
    /// Returns a builder for constructing a `RecurrenceRule`.
    ///
    /// The frequency and the starting point are the only two things required
    /// to create a rule. The start may be a `jiff::civil::DateTime` or, for
    /// an all-day rule, a `jiff::civil::Date`.
    pub fn builder(
        freq: Frequency,
        start: impl Into<Instant>,
    ) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(freq, start.into())
    }

    /// Returns an iterator over all instants in this recurrence rule.
    ///
    /// Without a `count` or an `until` bound, the iterator may be
    /// "infinite," in the sense that it returns instants all the way up to
    /// the maximum supported year. Callers should therefore either set a
    /// bound or call `take(N)`.
    ///
    /// The iterator yields an error at most once, after which it stops. The
    /// only error it can yield is
    /// [`TooManyEmptySets`](crate::recur::expander::TooManyEmptySets),
    /// which indicates that the rule can't be satisfied.
    pub fn iter(&self) -> RecurrenceIter {
        RecurrenceIter {
            chain: chain::build(self),
            start: self.start(),
            until: self.until(),
            remaining: self.count(),
            done: false,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.inner.freq
    }

    pub fn start(&self) -> Instant {
        self.inner.start
    }

    pub fn until(&self) -> Option<Instant> {
        self.inner.until
    }

    pub fn count(&self) -> Option<usize> {
        self.inner.count
    }

    /// The span between the starts of consecutive intervals.
    pub fn interval(&self) -> Span {
        self.inner.interval
    }

    pub fn week_start(&self) -> Weekday {
        self.inner.week_start
    }

    pub fn by_month(&self) -> &[i8] {
        &self.inner.by_month
    }

    pub fn by_week(&self) -> &[i8] {
        &self.inner.by_week
    }

    pub fn by_year_day(&self) -> &[i16] {
        &self.inner.by_year_day
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.inner.by_month_day
    }

    pub fn by_week_day(&self) -> &[ByWeekday] {
        &self.inner.by_week_day
    }

    pub fn by_hour(&self) -> &[i8] {
        &self.inner.by_hour
    }

    pub fn by_minute(&self) -> &[i8] {
        &self.inner.by_minute
    }

    pub fn by_second(&self) -> &[i8] {
        &self.inner.by_second
    }

    pub fn by_set_position(&self) -> &[i32] {
        &self.inner.by_set_pos
    }
}

impl<'r> IntoIterator for &'r RecurrenceRule {
    type IntoIter = RecurrenceIter;
    type Item = anyhow::Result<Instant>;

    fn into_iter(self) -> RecurrenceIter {
        self.iter()
    }
}

/// An iterator over the instants of a recurrence rule.
///
/// This owns the pipeline of stages for the rule and applies the bounds
/// that aren't rule parts: the start, `count` and `until`.
#[derive(Debug)]
pub struct RecurrenceIter {
    chain: Box<dyn RuleIterator>,
    /// The pipeline may produce instants before the start, e.g., the days
    /// of the first week of a weekly rule. Those are skipped.
    start: Instant,
    /// Inclusive.
    until: Option<Instant>,
    /// The number of instants left to emit when a count is set.
    remaining: Option<usize>,
    done: bool,
}

impl Iterator for RecurrenceIter {
    type Item = anyhow::Result<Instant>;

    fn next(&mut self) -> Option<anyhow::Result<Instant>> {
        if self.done {
            return None;
        }
        if self.remaining == Some(0) {
            self.done = true;
            return None;
        }
        loop {
            let instant = match self.chain.next() {
                Ok(instant) => instant,
                Err(err) => {
                    self.done = true;
                    if err.downcast_ref::<Exhausted>().is_some() {
                        log::debug!("recurrence ended: {err}");
                        return None;
                    }
                    return Some(Err(err));
                }
            };
            if instant < self.start {
                continue;
            }
            if self.until.is_some_and(|until| instant > until) {
                self.done = true;
                return None;
            }
            if let Some(ref mut remaining) = self.remaining {
                *remaining -= 1;
            }
            return Some(Ok(instant));
        }
    }
}

impl std::iter::FusedIterator for RecurrenceIter {}

/// A builder for constructing a valid recurrence rule.
#[derive(Clone, Debug)]
pub struct RecurrenceRuleBuilder {
    freq: Frequency,
    start: Instant,
    until: Option<Instant>,
    count: Option<usize>,
    interval: i32,
    by_month: Vec<i8>,
    by_week: Vec<i8>,
    by_year_day: Vec<i16>,
    by_month_day: Vec<i8>,
    by_week_day: Vec<ByWeekday>,
    by_hour: Vec<i8>,
    by_minute: Vec<i8>,
    by_second: Vec<i8>,
    by_set_pos: Vec<i32>,
    week_start: Weekday,
}

impl RecurrenceRuleBuilder {
    fn new(freq: Frequency, start: Instant) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder {
            freq,
            start,
            until: None,
            count: None,
            interval: 1,
            by_month: vec![],
            by_week: vec![],
            by_year_day: vec![],
            by_month_day: vec![],
            by_week_day: vec![],
            by_hour: vec![],
            by_minute: vec![],
            by_second: vec![],
            by_set_pos: vec![],
            week_start: Weekday::Monday,
        }
    }

    /// Validates the rule parts given so far and builds the rule.
    ///
    /// Values are sorted and deduplicated. Since every part is a set, the
    /// order they were given in doesn't matter.
    pub fn build(&self) -> anyhow::Result<RecurrenceRule> {
        anyhow::ensure!(
            self.interval >= 1,
            "interval must be at least 1, but got `{}`",
            self.interval,
        );
        self.check_ranges()?;
        self.check_numbered_week_days()?;
        self.check_frequency()?;
        self.check_all_day()?;
        if let Some(until) = self.until {
            anyhow::ensure!(
                until.is_all_day() == self.start.is_all_day(),
                "'until' value `{until}` is a {}, but the start `{start}` \
                 is a {}",
                kind(until),
                kind(self.start),
                start = self.start,
            );
            anyhow::ensure!(
                self.count.is_none(),
                "'until' and 'count' are mutually exclusive",
            );
        }

        let interval =
            self.freq.to_span(self.interval).with_context(|| {
                format!(
                    "{freq} interval of `{interval}` is too big",
                    freq = self.freq,
                    interval = self.interval,
                )
            })?;
        let inner = Arc::new(RecurrenceRuleInner {
            freq: self.freq,
            start: self.start,
            until: self.until,
            count: self.count,
            interval,
            by_month: normalize(&self.by_month),
            by_week: normalize(&self.by_week),
            by_year_day: normalize(&self.by_year_day),
            by_month_day: normalize(&self.by_month_day),
            by_week_day: normalize(&self.by_week_day),
            by_hour: normalize(&self.by_hour),
            by_minute: normalize(&self.by_minute),
            by_second: normalize(&self.by_second),
            by_set_pos: normalize(&self.by_set_pos),
            week_start: self.week_start,
        });
        Ok(RecurrenceRule { inner })
    }

    fn check_ranges(&self) -> anyhow::Result<()> {
        check_range("by month", &self.by_month, Bounds::Between(1, 12))?;
        check_range("by week", &self.by_week, Bounds::Signed(53))?;
        check_range(
            "by day of the year",
            &self.by_year_day,
            Bounds::Signed(366),
        )?;
        check_range(
            "by day of the month",
            &self.by_month_day,
            Bounds::Signed(31),
        )?;
        check_range("by hour", &self.by_hour, Bounds::Between(0, 23))?;
        check_range("by minute", &self.by_minute, Bounds::Between(0, 59))?;
        // An `Instant` has no leap seconds, so `60` is out.
        check_range("by second", &self.by_second, Bounds::Between(0, 59))?;
        check_range(
            "by set position",
            &self.by_set_pos,
            Bounds::Signed(366),
        )?;
        Ok(())
    }

    /// A numbered weekday counts within the year or, when the year is
    /// narrowed to months, within each month.
    fn check_numbered_week_days(&self) -> anyhow::Result<()> {
        for &wd in self.by_week_day.iter() {
            let ByWeekday::Numbered { nth, .. } = wd else { continue };
            let bounds = match self.freq {
                Frequency::Yearly if !self.by_week.is_empty() => {
                    anyhow::bail!(
                        "numbered weekday `{wd}` cannot be combined with \
                         'by week'",
                    )
                }
                Frequency::Yearly if self.by_month.is_empty() => {
                    Bounds::Signed(53)
                }
                Frequency::Yearly | Frequency::Monthly => Bounds::Signed(5),
                freq => anyhow::bail!(
                    "numbered weekday `{wd}` is not allowed at {freq} \
                     frequency",
                ),
            };
            anyhow::ensure!(
                bounds.contains(nth.into()),
                "numbered weekday `{wd}` is out of range (expected {bounds})",
            );
        }
        Ok(())
    }

    fn check_frequency(&self) -> anyhow::Result<()> {
        use self::Frequency::*;

        let restricted: [(&str, bool, &[Frequency]); 3] = [
            ("by week", !self.by_week.is_empty(), &[Yearly]),
            (
                "by day of the year",
                !self.by_year_day.is_empty(),
                &[Yearly, Hourly, Minutely, Secondly],
            ),
            (
                "by day of the month",
                !self.by_month_day.is_empty(),
                &[Yearly, Monthly, Daily, Hourly, Minutely, Secondly],
            ),
        ];
        for (name, used, allowed) in restricted {
            anyhow::ensure!(
                !used || allowed.contains(&self.freq),
                "'{name}' is not allowed at {freq} frequency",
                freq = self.freq,
            );
        }

        // BYSETPOS picks from what the other parts produce.
        let selects = !self.by_month.is_empty()
            || !self.by_week.is_empty()
            || !self.by_year_day.is_empty()
            || !self.by_month_day.is_empty()
            || !self.by_week_day.is_empty()
            || !self.by_hour.is_empty()
            || !self.by_minute.is_empty()
            || !self.by_second.is_empty();
        anyhow::ensure!(
            self.by_set_pos.is_empty() || selects,
            "'by set position' needs another 'by' rule to select from",
        );
        Ok(())
    }

    /// An all-day rule has no time of day to repeat on or to pick.
    fn check_all_day(&self) -> anyhow::Result<()> {
        if !self.start.is_all_day() {
            return Ok(());
        }
        anyhow::ensure!(
            self.freq <= Frequency::Daily,
            "{freq} frequency needs a start with a time of day, but \
             `{start}` is a date",
            freq = self.freq,
            start = self.start,
        );
        let time_parts = [
            ("by hour", self.by_hour.is_empty()),
            ("by minute", self.by_minute.is_empty()),
            ("by second", self.by_second.is_empty()),
        ];
        for (name, empty) in time_parts {
            anyhow::ensure!(
                empty,
                "'{name}' needs a start with a time of day, but `{start}` \
                 is a date",
                start = self.start,
            );
        }
        Ok(())
    }

    /// Sets the last instant (inclusive) this rule may produce.
    pub fn until(
        &mut self,
        until: impl Into<Instant>,
    ) -> &mut RecurrenceRuleBuilder {
        self.until = Some(until.into());
        self
    }

    /// Sets the maximum number of instants this rule produces.
    pub fn count(&mut self, count: usize) -> &mut RecurrenceRuleBuilder {
        self.count = Some(count);
        self
    }

    pub fn interval(&mut self, increment: i32) -> &mut RecurrenceRuleBuilder {
        self.interval = increment;
        self
    }

    pub fn by_month(
        &mut self,
        months: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month.extend(months);
        self
    }

    pub fn by_week(
        &mut self,
        weeks: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_week.extend(weeks);
        self
    }

    pub fn by_year_day(
        &mut self,
        days: impl IntoIterator<Item = i16>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_year_day.extend(days);
        self
    }

    pub fn by_month_day(
        &mut self,
        days: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month_day.extend(days);
        self
    }

    /// Adds weekdays, which may be given as a `Weekday`, as a numbered
    /// `(nth, Weekday)` pair or as a `ByWeekday`.
    pub fn by_week_day<W: Into<ByWeekday>>(
        &mut self,
        week_days: impl IntoIterator<Item = W>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_week_day.extend(week_days.into_iter().map(Into::into));
        self
    }

    pub fn by_hour(
        &mut self,
        hours: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_hour.extend(hours);
        self
    }

    pub fn by_minute(
        &mut self,
        minutes: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_minute.extend(minutes);
        self
    }

    pub fn by_second(
        &mut self,
        seconds: impl IntoIterator<Item = i8>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_second.extend(seconds);
        self
    }

    pub fn by_set_position(
        &mut self,
        positions: impl IntoIterator<Item = i32>,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_set_pos.extend(positions);
        self
    }

    pub fn week_start(
        &mut self,
        weekday: Weekday,
    ) -> &mut RecurrenceRuleBuilder {
        self.week_start = weekday;
        self
    }
}

/// The values a numeric rule part accepts.
#[derive(Clone, Copy, Debug)]
enum Bounds {
    /// Inclusive on both ends.
    Between(i32, i32),
    /// `1..=max`, or `-max..=-1` counting from the end.
    Signed(i32),
}

impl Bounds {
    fn contains(self, value: i32) -> bool {
        match self {
            Bounds::Between(lo, hi) => lo <= value && value <= hi,
            Bounds::Signed(max) => value != 0 && value.abs() <= max,
        }
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Bounds::Between(lo, hi) => write!(f, "{lo}..={hi}"),
            Bounds::Signed(max) => write!(f, "1..={max} or -{max}..=-1"),
        }
    }
}

fn check_range<T: Copy + Into<i32> + std::fmt::Display>(
    name: &str,
    values: &[T],
    bounds: Bounds,
) -> anyhow::Result<()> {
    for &value in values {
        anyhow::ensure!(
            bounds.contains(value.into()),
            "'{name}' value `{value}` is out of range (expected {bounds})",
        );
    }
    Ok(())
}

fn normalize<T: Clone + Ord>(values: &[T]) -> Box<[T]> {
    let mut values = values.to_vec();
    values.sort();
    values.dedup();
    values.into_boxed_slice()
}

fn kind(instant: Instant) -> &'static str {
    if instant.is_all_day() { "date" } else { "datetime" }
}

/// The frequency at which a rule repeats.
///
/// Frequencies are ordered from longest to shortest, so
/// `Frequency::Yearly < Frequency::Daily`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    const ALL: [Frequency; 7] = [
        Frequency::Yearly,
        Frequency::Monthly,
        Frequency::Weekly,
        Frequency::Daily,
        Frequency::Hourly,
        Frequency::Minutely,
        Frequency::Secondly,
    ];

    pub const USAGE: Usage = Usage::arg(
        "<frequency>",
        "How often the sequence repeats, like `daily` or `monthly`.",
        r#"
How often the sequence repeats, like `daily` or `monthly`.

One of yearly, monthly, weekly, daily, hourly, minutely or secondly. Each may
also be written as its unit of time, like `day`, or abbreviated as `yr`, `mo`,
`wk`, `d`, `hr`, `min` or `sec`. Case doesn't matter.

Hourly, minutely and secondly sequences need a start with a time of day.
"#,
    );

    /// Returns `interval` repetitions of this frequency as a span.
    fn to_span(&self, interval: i32) -> anyhow::Result<Span> {
        let span = Span::new();
        let span = match *self {
            Frequency::Yearly => span.try_years(interval),
            Frequency::Monthly => span.try_months(interval),
            Frequency::Weekly => span.try_weeks(interval),
            Frequency::Daily => span.try_days(interval),
            Frequency::Hourly => span.try_hours(interval),
            Frequency::Minutely => span.try_minutes(interval),
            Frequency::Secondly => span.try_seconds(interval),
        };
        Ok(span?)
    }

    /// The unit of time this frequency repeats in and its abbreviation.
    fn units(&self) -> (&'static str, &'static str) {
        match *self {
            Frequency::Yearly => ("year", "yr"),
            Frequency::Monthly => ("month", "mo"),
            Frequency::Weekly => ("week", "wk"),
            Frequency::Daily => ("day", "d"),
            Frequency::Hourly => ("hour", "hr"),
            Frequency::Minutely => ("minute", "min"),
            Frequency::Secondly => ("second", "sec"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Yearly => "yearly",
            Frequency::Monthly => "monthly",
            Frequency::Weekly => "weekly",
            Frequency::Daily => "daily",
            Frequency::Hourly => "hourly",
            Frequency::Minutely => "minutely",
            Frequency::Secondly => "secondly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Frequency> {
        let lower = s.to_ascii_lowercase();
        let found = Frequency::ALL.into_iter().find(|freq| {
            let (unit, abbreviation) = freq.units();
            lower == freq.as_str() || lower == unit || lower == abbreviation
        });
        found.with_context(|| {
            format!(
                "unrecognized frequency `{s}` (expected one of yearly, \
                 monthly, weekly, daily, hourly, minutely or secondly)",
            )
        })
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::{
        Weekday::{self, *},
        date, datetime,
    };

    use crate::recur::expander::TooManyEmptySets;

    use super::*;

    // Many of these tests come directly from the RFC 5545 definition of the
    // RRULE property[1]. Since instants are civil, the time zone and UTC
    // offset of each example are dropped. Examples producing an infinite
    // sequence are bounded with `take`.
    //
    // [1]: https://icalendar.org/iCalendar-RFC-5545/3-8-5-3-recurrence-rule.html

    fn snapshot<I>(it: I) -> String
    where
        I: IntoIterator<Item = anyhow::Result<Instant>>,
    {
        let got: Vec<String> =
            it.into_iter().map(|r| r.unwrap().to_string()).collect();
        got.join("\n")
    }

    fn all_week() -> [Weekday; 7] {
        [Monday, Tuesday, Wednesday, Thursday, Friday, Saturday, Sunday]
    }

    // DTSTART:19970902T090000
    // RRULE:FREQ=DAILY;COUNT=10
    #[test]
    fn daily_for_ten_occurrences() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Daily, start)
            .count(10)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-09-02T09:00:00
        1997-09-03T09:00:00
        1997-09-04T09:00:00
        1997-09-05T09:00:00
        1997-09-06T09:00:00
        1997-09-07T09:00:00
        1997-09-08T09:00:00
        1997-09-09T09:00:00
        1997-09-10T09:00:00
        1997-09-11T09:00:00
        ");
    }

    // DTSTART:19970805T090000
    // RRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=TU,SU;WKST=MO
    // and
    // RRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=TU,SU;WKST=SU
    #[test]
    fn weekly_week_start_matters() {
        let start = datetime(1997, 8, 5, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Weekly, start)
            .interval(2)
            .count(4)
            .by_week_day([Tuesday, Sunday])
            .week_start(Monday)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-08-05T09:00:00
        1997-08-10T09:00:00
        1997-08-19T09:00:00
        1997-08-24T09:00:00
        ");

        let rrule = RecurrenceRule::builder(Frequency::Weekly, start)
            .interval(2)
            .count(4)
            .by_week_day([Tuesday, Sunday])
            .week_start(Sunday)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-08-05T09:00:00
        1997-08-17T09:00:00
        1997-08-19T09:00:00
        1997-08-31T09:00:00
        ");
    }

    // DTSTART:19970905T090000
    // RRULE:FREQ=MONTHLY;COUNT=10;BYDAY=1FR
    #[test]
    fn monthly_first_friday() {
        let start = datetime(1997, 9, 5, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .count(10)
            .by_week_day([(1, Friday)])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-09-05T09:00:00
        1997-10-03T09:00:00
        1997-11-07T09:00:00
        1997-12-05T09:00:00
        1998-01-02T09:00:00
        1998-02-06T09:00:00
        1998-03-06T09:00:00
        1998-04-03T09:00:00
        1998-05-01T09:00:00
        1998-06-05T09:00:00
        ");
    }

    // DTSTART:19970930T090000
    // RRULE:FREQ=MONTHLY;COUNT=10;BYMONTHDAY=1,-1
    #[test]
    fn monthly_first_and_last_day() {
        let start = datetime(1997, 9, 30, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .count(10)
            .by_month_day([1, -1])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-09-30T09:00:00
        1997-10-01T09:00:00
        1997-10-31T09:00:00
        1997-11-01T09:00:00
        1997-11-30T09:00:00
        1997-12-01T09:00:00
        1997-12-31T09:00:00
        1998-01-01T09:00:00
        1998-01-31T09:00:00
        1998-02-01T09:00:00
        ");
    }

    // DTSTART:19970902T090000
    // RRULE:FREQ=MONTHLY;BYDAY=FR;BYMONTHDAY=13
    #[test]
    fn monthly_friday_the_13th() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .by_week_day([Friday])
            .by_month_day([13])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(5)), @r"
        1998-02-13T09:00:00
        1998-03-13T09:00:00
        1998-11-13T09:00:00
        1999-08-13T09:00:00
        2000-10-13T09:00:00
        ");
    }

    // DTSTART:19970913T090000
    // RRULE:FREQ=MONTHLY;BYDAY=SA;BYMONTHDAY=7,8,9,10,11,12,13
    #[test]
    fn monthly_first_saturday_after_first_sunday() {
        let start = datetime(1997, 9, 13, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .by_week_day([Saturday])
            .by_month_day(7..=13)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(10)), @r"
        1997-09-13T09:00:00
        1997-10-11T09:00:00
        1997-11-08T09:00:00
        1997-12-13T09:00:00
        1998-01-10T09:00:00
        1998-02-07T09:00:00
        1998-03-07T09:00:00
        1998-04-11T09:00:00
        1998-05-09T09:00:00
        1998-06-13T09:00:00
        ");
    }

    // DTSTART:19970904T090000
    // RRULE:FREQ=MONTHLY;COUNT=3;BYDAY=TU,WE,TH;BYSETPOS=3
    #[test]
    fn monthly_third_instance_of_tue_wed_thu() {
        let start = datetime(1997, 9, 4, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .count(3)
            .by_week_day([Tuesday, Wednesday, Thursday])
            .by_set_position([3])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-09-04T09:00:00
        1997-10-07T09:00:00
        1997-11-06T09:00:00
        ");
    }

    // DTSTART:19970929T090000
    // RRULE:FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1
    #[test]
    fn monthly_last_work_day() {
        let start = datetime(1997, 9, 29, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .by_week_day(Monday.cycle_forward().take(5))
            .by_set_position([-1])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(7)), @r"
        1997-09-30T09:00:00
        1997-10-31T09:00:00
        1997-11-28T09:00:00
        1997-12-31T09:00:00
        1998-01-30T09:00:00
        1998-02-27T09:00:00
        1998-03-31T09:00:00
        ");
    }

    // Positions count from the start of the year, not from the start of the
    // rule. The second Thursday of 1999 precedes the start, so it's dropped
    // rather than replaced by the second Thursday after the start.
    //
    // DTSTART:19991005T090000
    // RRULE:FREQ=YEARLY;COUNT=3;BYDAY=TH;BYSETPOS=2
    #[test]
    fn yearly_set_position_counts_from_interval_start() {
        let start = datetime(1999, 10, 5, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .count(3)
            .by_week_day([Thursday])
            .by_set_position([2])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        2000-01-13T09:00:00
        2001-01-11T09:00:00
        2002-01-10T09:00:00
        ");
    }

    // DTSTART:20240720T163055
    // RRULE:FREQ=DAILY;COUNT=3;BYHOUR=9,17;BYMINUTE=0;BYSECOND=0;BYSETPOS=1
    #[test]
    fn daily_set_position_counts_from_interval_start() {
        let start = datetime(2024, 7, 20, 16, 30, 55, 0);
        let rrule = RecurrenceRule::builder(Frequency::Daily, start)
            .count(3)
            .by_hour([9, 17])
            .by_minute([0])
            .by_second([0])
            .by_set_position([1])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        2024-07-21T09:00:00
        2024-07-22T09:00:00
        2024-07-23T09:00:00
        ");
    }

    // DTSTART:19970512T090000
    // RRULE:FREQ=YEARLY;BYWEEKNO=20;BYDAY=MO
    #[test]
    fn yearly_monday_of_week_20() {
        let start = datetime(1997, 5, 12, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_week([20])
            .by_week_day([Monday])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        1997-05-12T09:00:00
        1998-05-11T09:00:00
        1999-05-17T09:00:00
        ");
    }

    // DTSTART:19970519T090000
    // RRULE:FREQ=YEARLY;BYDAY=20MO
    #[test]
    fn yearly_20th_monday() {
        let start = datetime(1997, 5, 19, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_week_day([(20, Monday)])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        1997-05-19T09:00:00
        1998-05-18T09:00:00
        1999-05-17T09:00:00
        ");
    }

    // DTSTART:19961105T090000
    // RRULE:FREQ=YEARLY;INTERVAL=4;BYMONTH=11;BYDAY=TU;
    //  BYMONTHDAY=2,3,4,5,6,7,8
    #[test]
    fn yearly_us_presidential_election_day() {
        let start = datetime(1996, 11, 5, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .interval(4)
            .by_month([11])
            .by_week_day([Tuesday])
            .by_month_day(2..=8)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        1996-11-05T09:00:00
        2000-11-07T09:00:00
        2004-11-02T09:00:00
        ");
    }

    // DTSTART:19970101T090000
    // RRULE:FREQ=YEARLY;INTERVAL=3;COUNT=10;BYYEARDAY=1,100,200
    #[test]
    fn yearly_every_third_year_on_days() {
        let start = datetime(1997, 1, 1, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .interval(3)
            .count(10)
            .by_year_day([1, 100, 200])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-01-01T09:00:00
        1997-04-10T09:00:00
        1997-07-19T09:00:00
        2000-01-01T09:00:00
        2000-04-09T09:00:00
        2000-07-18T09:00:00
        2003-01-01T09:00:00
        2003-04-10T09:00:00
        2003-07-19T09:00:00
        2006-01-01T09:00:00
        ");
    }

    // DTSTART:19970610T090000
    // RRULE:FREQ=YEARLY;COUNT=10;BYMONTH=6,7
    #[test]
    fn yearly_in_june_and_july() {
        let start = datetime(1997, 6, 10, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .count(10)
            .by_month([6, 7])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-06-10T09:00:00
        1997-07-10T09:00:00
        1998-06-10T09:00:00
        1998-07-10T09:00:00
        1999-06-10T09:00:00
        1999-07-10T09:00:00
        2000-06-10T09:00:00
        2000-07-10T09:00:00
        2001-06-10T09:00:00
        2001-07-10T09:00:00
        ");
    }

    // DTSTART:19970313T090000
    // RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=TH
    #[test]
    fn yearly_every_thursday_in_march() {
        let start = datetime(1997, 3, 13, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_month([3])
            .by_week_day([Thursday])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(11)), @r"
        1997-03-13T09:00:00
        1997-03-20T09:00:00
        1997-03-27T09:00:00
        1998-03-05T09:00:00
        1998-03-12T09:00:00
        1998-03-19T09:00:00
        1998-03-26T09:00:00
        1999-03-04T09:00:00
        1999-03-11T09:00:00
        1999-03-18T09:00:00
        1999-03-25T09:00:00
        ");
    }

    // DTSTART:19980101T090000
    // RRULE:FREQ=YEARLY;UNTIL=19980104T090000;
    //  BYMONTH=1;BYDAY=SU,MO,TU,WE,TH,FR,SA
    #[test]
    fn yearly_every_day_in_january_until() {
        let start = datetime(1998, 1, 1, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .until(datetime(1998, 1, 4, 9, 0, 0, 0))
            .by_month([1])
            .by_week_day(all_week())
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1998-01-01T09:00:00
        1998-01-02T09:00:00
        1998-01-03T09:00:00
        1998-01-04T09:00:00
        ");
    }

    // DTSTART:19970902T090000
    // RRULE:FREQ=YEARLY;BYWEEKNO=1,-1;WKST=SU
    #[test]
    fn yearly_first_and_last_week_starting_sunday() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_week([1, -1])
            .week_start(Sunday)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(6)), @r"
        1997-12-28T09:00:00
        1997-12-29T09:00:00
        1997-12-30T09:00:00
        1997-12-31T09:00:00
        1998-01-01T09:00:00
        1998-01-02T09:00:00
        ");
    }

    #[test]
    fn yearly_week_53() {
        let start = datetime(2024, 1, 1, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_week([53])
            .by_week_day([Monday, Sunday])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(4)), @r"
        2026-12-28T09:00:00
        2027-01-03T09:00:00
        2032-12-27T09:00:00
        2033-01-02T09:00:00
        ");
    }

    #[test]
    fn yearly_days_limited_by_month_day_and_weekday() {
        let start = datetime(2024, 1, 1, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_year_day(1..60)
            .by_month_day([1, 15])
            .by_week_day(Monday.cycle_forward().take(5))
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(5)), @r"
        2024-01-01T09:00:00
        2024-01-15T09:00:00
        2024-02-01T09:00:00
        2024-02-15T09:00:00
        2025-01-01T09:00:00
        ");
    }

    /// A week that straddles a month boundary must survive the week-level
    /// month check, so that its days in the allowed month are produced.
    #[test]
    fn weekly_in_month_straddling_weeks() {
        let start = datetime(2024, 1, 29, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Weekly, start)
            .by_month([2])
            .by_week_day([Thursday])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(7)), @r"
        2024-02-01T09:00:00
        2024-02-08T09:00:00
        2024-02-15T09:00:00
        2024-02-22T09:00:00
        2024-02-29T09:00:00
        2025-02-06T09:00:00
        2025-02-13T09:00:00
        ");
    }

    #[test]
    fn all_day_leap_days() {
        let start = date(2024, 2, 29);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_month([2])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        2024-02-29
        2028-02-29
        2032-02-29
        ");

        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        2024-02-29
        2028-02-29
        2032-02-29
        ");
    }

    #[test]
    fn monthly_skips_short_months() {
        let start = datetime(2025, 1, 31, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Monthly, start)
            .count(4)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        2025-01-31T09:00:00
        2025-03-31T09:00:00
        2025-05-31T09:00:00
        2025-07-31T09:00:00
        ");
    }

    #[test]
    fn hourly_until() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Hourly, start)
            .interval(3)
            .until(datetime(1997, 9, 2, 17, 0, 0, 0))
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        1997-09-02T09:00:00
        1997-09-02T12:00:00
        1997-09-02T15:00:00
        ");
    }

    #[test]
    fn daily_by_hour_and_minute() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Daily, start)
            .by_hour([9, 10])
            .by_minute([0, 20, 40])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(5)), @r"
        1997-09-02T09:00:00
        1997-09-02T09:20:00
        1997-09-02T09:40:00
        1997-09-02T10:00:00
        1997-09-02T10:20:00
        ");
    }

    // DTSTART:19970902T090000
    // RRULE:FREQ=MINUTELY;INTERVAL=20;BYHOUR=9,10,11,12,13,14,15,16
    #[test]
    fn minutely_limited_by_hour() {
        let start = datetime(1997, 9, 2, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Minutely, start)
            .interval(20)
            .by_hour(9..=16)
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(5)), @r"
        1997-09-02T09:00:00
        1997-09-02T09:20:00
        1997-09-02T09:40:00
        1997-09-02T10:00:00
        1997-09-02T10:20:00
        ");
    }

    /// Seeds that are limited away are counted by the year, not by the
    /// interval, so a sparse secondly rule still works.
    #[test]
    fn secondly_limited_by_month() {
        let start = datetime(2025, 1, 31, 23, 59, 58, 0);
        let rrule = RecurrenceRule::builder(Frequency::Secondly, start)
            .by_month([2])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(rrule.iter().take(3)), @r"
        2025-02-01T00:00:00
        2025-02-01T00:00:01
        2025-02-01T00:00:02
        ");
    }

    #[test]
    fn contradictory_rule_fails() {
        let start = datetime(2024, 1, 1, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Yearly, start)
            .by_month([2])
            .by_month_day([30])
            .build()
            .unwrap();
        let mut it = rrule.iter();
        let err = it.next().unwrap().unwrap_err();
        assert!(err.downcast_ref::<TooManyEmptySets>().is_some());
        insta::assert_snapshot!(
            err,
            @"'BYMONTHDAY' produced nothing for 1000 consecutive intervals, the recurrence rule probably never matches",
        );
        // The error is reported once.
        assert!(it.next().is_none());
    }

    /// At every frequency, a rule that can never match fails instead of
    /// spinning or quietly running out of years.
    #[test]
    fn contradictory_rule_fails_at_every_frequency() {
        use self::Frequency::*;

        fn err(builder: &RecurrenceRuleBuilder) -> String {
            let rrule = builder.build().unwrap();
            let err = rrule.iter().next().unwrap().unwrap_err();
            assert!(err.downcast_ref::<TooManyEmptySets>().is_some());
            err.to_string()
        }
        fn rule(freq: Frequency) -> RecurrenceRuleBuilder {
            RecurrenceRule::builder(freq, datetime(2024, 7, 20, 9, 0, 0, 0))
        }

        insta::assert_snapshot!(
            err(rule(Monthly).by_month([2]).by_month_day([30])),
            @"'BYMONTHDAY' produced nothing for 1000 consecutive intervals, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Monthly).interval(12).by_month([2])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Daily).by_month([2]).by_month_day([30])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Hourly).by_month([2]).by_month_day([30])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Hourly).interval(24).by_hour([5])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Minutely).interval(2).by_minute([1])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Secondly).by_month([2]).by_month_day([30])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
        insta::assert_snapshot!(
            err(rule(Secondly).interval(2).by_second([1])),
            @"'FREQ' produced nothing for 1000 consecutive years, the recurrence rule probably never matches",
        );
    }

    // DTSTART:20240720T090000
    // RRULE:FREQ=DAILY;COUNT=2;BYMONTH=2;BYMONTHDAY=29
    #[test]
    fn daily_leap_days_are_not_contradictory() {
        let start = datetime(2024, 7, 20, 9, 0, 0, 0);
        let rrule = RecurrenceRule::builder(Frequency::Daily, start)
            .count(2)
            .by_month([2])
            .by_month_day([29])
            .build()
            .unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        2028-02-29T09:00:00
        2032-02-29T09:00:00
        ");
    }

    #[test]
    fn ends_at_maximum_year() {
        let start = datetime(9997, 6, 1, 0, 0, 0, 0);
        let rrule =
            RecurrenceRule::builder(Frequency::Yearly, start).build().unwrap();
        insta::assert_snapshot!(snapshot(&rrule), @r"
        9997-06-01T00:00:00
        9998-06-01T00:00:00
        9999-06-01T00:00:00
        ");
    }

    #[test]
    fn can_iterate_twice() {
        let start = date(2025, 1, 1);
        let rrule = RecurrenceRule::builder(Frequency::Weekly, start)
            .count(2)
            .build()
            .unwrap();
        assert_eq!(snapshot(&rrule), snapshot(&rrule));
        assert_eq!(snapshot(&rrule), "2025-01-01\n2025-01-08");
    }

    #[test]
    fn errors() {
        use self::Frequency::*;

        fn err(builder: &RecurrenceRuleBuilder) -> String {
            builder.build().unwrap_err().to_string()
        }
        fn rule(freq: Frequency) -> RecurrenceRuleBuilder {
            RecurrenceRule::builder(freq, datetime(2025, 1, 1, 0, 0, 0, 0))
        }
        fn all_day(freq: Frequency) -> RecurrenceRuleBuilder {
            RecurrenceRule::builder(freq, date(2025, 1, 1))
        }

        insta::assert_snapshot!(
            err(rule(Daily).interval(0)),
            @"interval must be at least 1, but got `0`",
        );
        insta::assert_snapshot!(
            err(rule(Daily).by_month([13])),
            @"'by month' value `13` is out of range (expected 1..=12)",
        );
        insta::assert_snapshot!(
            err(rule(Daily).by_second([60])),
            @"'by second' value `60` is out of range (expected 0..=59)",
        );
        insta::assert_snapshot!(
            err(rule(Weekly).by_week_day([(1, Monday)])),
            @"numbered weekday `1-Mon` is not allowed at weekly frequency",
        );
        insta::assert_snapshot!(
            err(rule(Yearly).by_week([1]).by_week_day([(1, Monday)])),
            @"numbered weekday `1-Mon` cannot be combined with 'by week'",
        );
        insta::assert_snapshot!(
            err(rule(Monthly).by_week_day([(6, Monday)])),
            @"numbered weekday `6-Mon` is out of range (expected 1..=5 or -5..=-1)",
        );
        insta::assert_snapshot!(
            err(rule(Monthly).by_week([1])),
            @"'by week' is not allowed at monthly frequency",
        );
        insta::assert_snapshot!(
            err(rule(Daily).by_year_day([1])),
            @"'by day of the year' is not allowed at daily frequency",
        );
        insta::assert_snapshot!(
            err(rule(Weekly).by_month_day([1])),
            @"'by day of the month' is not allowed at weekly frequency",
        );
        insta::assert_snapshot!(
            err(rule(Daily).by_set_position([1])),
            @"'by set position' needs another 'by' rule to select from",
        );
        insta::assert_snapshot!(
            err(&all_day(Hourly)),
            @"hourly frequency needs a start with a time of day, but `2025-01-01` is a date",
        );
        insta::assert_snapshot!(
            err(all_day(Daily).by_hour([9])),
            @"'by hour' needs a start with a time of day, but `2025-01-01` is a date",
        );
        insta::assert_snapshot!(
            err(rule(Daily).until(date(2025, 2, 1))),
            @"'until' value `2025-02-01` is a date, but the start `2025-01-01T00:00:00` is a datetime",
        );
        insta::assert_snapshot!(
            err(rule(Daily).until(datetime(2025, 2, 1, 0, 0, 0, 0)).count(5)),
            @"'until' and 'count' are mutually exclusive",
        );
    }

    #[test]
    fn frequency_parse() {
        assert_eq!("Yearly".parse::<Frequency>().unwrap(), Frequency::Yearly);
        assert_eq!("mo".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("MIN".parse::<Frequency>().unwrap(), Frequency::Minutely);
        assert_eq!("day".parse::<Frequency>().unwrap(), Frequency::Daily);
        // Too easy to confuse months with minutes.
        assert!("m".parse::<Frequency>().is_err());
        insta::assert_snapshot!(
            "fortnightly".parse::<Frequency>().unwrap_err(),
            @"unrecognized frequency `fortnightly` (expected one of yearly, monthly, weekly, daily, hourly, minutely or secondly)",
        );
        assert!(Frequency::Yearly < Frequency::Daily);
        assert!(Frequency::Daily < Frequency::Secondly);
    }
}
