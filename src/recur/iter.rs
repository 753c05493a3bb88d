use jiff::{
    SignedDuration, Span,
    civil::{Date, DateTime, Time},
};

use crate::recur::{
    expander::EmptyCycles,
    filter::{ByFilter, FilterList},
    instant::Instant,
    set::InstantSet,
};

/// The protocol shared by every stage in a recurrence pipeline.
///
/// Stages form a single linear chain. Each stage exclusively owns the stage
/// before it and pulls from it on demand. The first stage is always a
/// [`FreqIterator`].
pub trait RuleIterator: std::fmt::Debug {
    /// Returns the next instant produced by this stage.
    ///
    /// This draws from the set most recently returned by `next_set`, and
    /// asks for a new one when that set is used up.
    fn next(&mut self) -> anyhow::Result<Instant>;

    /// Returns the next batch of instants, all of which were derived from
    /// the same interval of the rule.
    ///
    /// A successfully returned set is never empty.
    fn next_set(&mut self) -> anyhow::Result<&mut InstantSet>;
}

/// An error indicating that a recurrence has run out of room.
///
/// This is returned by the base generator once the next interval would fall
/// outside of the supported range of datetimes, or beyond an upper bound
/// after which nothing could be emitted. It is not a failure: consumers
/// treat it as the end of the sequence. It is a distinct type so that it
/// can be detected via `anyhow::Error::downcast_ref`.
#[derive(Debug)]
pub struct Exhausted;

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "recurrence reached the end of its range")
    }
}

impl std::error::Error for Exhausted {}

/// The number of seconds in a civil day.
const SECONDS_PER_DAY: i64 = 86_400;

/// The base generator of a recurrence pipeline.
///
/// This produces one "seed" per interval of the rule's frequency, starting
/// with the rule's start. Each seed is returned as a set of one instant.
/// Seeds may be limited by filters, in which case intervals whose seed is
/// rejected are skipped entirely.
///
/// A rejected seed costs very little, and a long run of them is normal. A
/// secondly rule limited to February rejects every second of the other
/// eleven months, and a daily rule limited to February 29th rejects
/// almost four years of days at a time. So unlike `ByExpander`, this
/// counts calendar years instead of intervals, and fails with
/// [`TooManyEmptySets`](crate::recur::expander::TooManyEmptySets) once
/// [`MAX_EMPTY_SETS`](crate::recur::expander::MAX_EMPTY_SETS) years in a
/// row produced nothing. Intervals shorter than a day skip whole days
/// rejected by a date filter, and whole years when the time filters
/// reject every time of day the seeds can have.
#[derive(Debug)]
pub struct FreqIterator {
    /// The civil start of the rule. Every seed is computed by adding a
    /// multiple of `interval` to this.
    start: DateTime,
    /// Whether seeds are all-day instants.
    all_day: bool,
    /// The span corresponding to one interval at the rule's frequency.
    interval: Span,
    /// The length of one interval in seconds, but only when it's shorter
    /// than a day.
    step: Option<i64>,
    /// The number of intervals to add to `start` for the next seed.
    ///
    /// This is done instead of adding `interval` to the previous seed to
    /// avoid sequences like 2025-03-31 -> 2025-04-30 -> 2025-05-30, where
    /// we really want 2025-03-31 -> 2025-04-30 -> 2025-05-31.
    attempt: i64,
    /// When true, seeds whose day of the month differs from the start are
    /// skipped.
    skip_constrained: bool,
    /// Seeds in a year after this one are never generated.
    last_year: i16,
    /// The year of the most recently generated seed.
    year: i16,
    date_filters: FilterList,
    time_filters: FilterList,
    /// Whether the time filters reject every time of day a seed can have.
    /// Computed on first use, after all filters have been added.
    never_on_time: Option<bool>,
    result: InstantSet,
}

impl FreqIterator {
    /// Creates a new base generator.
    ///
    /// `skip_constrained` should be set for yearly and monthly rules where
    /// no rule part picks the day. In that case, adding N years or months
    /// to a day that doesn't exist in the target month (2024-02-29 plus a
    /// year, or January 31 plus a month) yields a clamped day that RFC 5545
    /// says should be ignored instead.
    pub fn new(
        start: DateTime,
        all_day: bool,
        interval: Span,
        skip_constrained: bool,
        last_year: i16,
    ) -> FreqIterator {
        let step = start
            .checked_add(interval)
            .ok()
            .map(|next| next.duration_since(start).as_secs())
            .filter(|&secs| 0 < secs && secs < SECONDS_PER_DAY);
        FreqIterator {
            start,
            all_day,
            interval,
            step,
            attempt: 0,
            skip_constrained,
            last_year,
            year: start.year(),
            date_filters: FilterList::new(),
            time_filters: FilterList::new(),
            never_on_time: None,
            result: InstantSet::new(),
        }
    }

    /// Adds a filter that every seed must pass. The filter must only look
    /// at the date of a seed.
    pub fn add_date_filter(&mut self, filter: impl ByFilter + 'static) {
        self.date_filters.push(Box::new(filter));
    }

    /// Adds a filter that every seed must pass. The filter must only look
    /// at the time of day of a seed.
    pub fn add_time_filter(&mut self, filter: impl ByFilter + 'static) {
        self.time_filters.push(Box::new(filter));
    }

    /// Returns the next seed, without regard to filters.
    fn advance(&mut self) -> anyhow::Result<Instant> {
        loop {
            let attempt = self.attempt;
            self.attempt = attempt.checked_add(1).ok_or(Exhausted)?;
            let span =
                self.interval.checked_mul(attempt).map_err(|_| Exhausted)?;
            let next = self.start.checked_add(span).map_err(|_| Exhausted)?;
            if next.year() > self.last_year {
                return Err(Exhausted.into());
            }
            if self.skip_constrained && next.day() != self.start.day() {
                continue;
            }
            return Ok(Instant::from_civil(next, self.all_day));
        }
    }

    /// Moves forward so that the next seed is the first one at or after
    /// `target`. Seeds are never revisited.
    fn skip_to(&mut self, step: i64, target: Date) {
        let target = target.to_datetime(Time::midnight());
        let elapsed = target.duration_since(self.start).as_secs();
        let attempt = elapsed.saturating_add(step - 1) / step;
        self.attempt = self.attempt.max(attempt);
    }

    fn never_on_time(&mut self) -> bool {
        if let Some(never) = self.never_on_time {
            return never;
        }
        let never = match self.step {
            Some(step) if !self.time_filters.is_empty() => {
                // Seeds visit the same times of day over and over. How many
                // distinct ones there are depends on how the step divides a
                // day.
                let (mut a, mut b) = (step, SECONDS_PER_DAY);
                while b != 0 {
                    (a, b) = (b, a % b);
                }
                let first =
                    self.start.time().duration_since(Time::midnight());
                let date = self.start.date();
                !(0..SECONDS_PER_DAY / a).any(|k| {
                    let offset = SignedDuration::from_secs(k * step);
                    let time = Time::midnight().wrapping_add(first + offset);
                    let seed = Instant::from_datetime(date.to_datetime(time));
                    self.time_filters.accepts(seed)
                })
            }
            _ => false,
        };
        if never {
            log::debug!(
                "no time of day reachable from {start} in steps of \
                 {interval} passes the time filters",
                start = self.start,
                interval = self.interval,
            );
        }
        self.never_on_time = Some(never);
        never
    }
}

impl RuleIterator for FreqIterator {
    fn next(&mut self) -> anyhow::Result<Instant> {
        loop {
            if let Some(instant) = self.result.pop() {
                return Ok(instant);
            }
            self.next_set()?;
        }
    }

    fn next_set(&mut self) -> anyhow::Result<&mut InstantSet> {
        self.result.clear();
        let never_on_time = self.never_on_time();
        let mut empty = EmptyCycles::years("FREQ");
        loop {
            let seed = self.advance()?;
            if seed.year() != self.year {
                self.year = seed.year();
                empty.tick()?;
            }
            if let (true, Some(step)) = (never_on_time, self.step) {
                let next_year = seed.year().checked_add(1).ok_or(Exhausted)?;
                let target =
                    Date::new(next_year, 1, 1).map_err(|_| Exhausted)?;
                self.skip_to(step, target);
                continue;
            }
            if !self.date_filters.accepts(seed) {
                if let Some(step) = self.step {
                    let target =
                        seed.date().tomorrow().map_err(|_| Exhausted)?;
                    self.skip_to(step, target);
                }
                continue;
            }
            if self.time_filters.accepts(seed) {
                self.result.push(seed);
                return Ok(&mut self.result);
            }
        }
    }
}
