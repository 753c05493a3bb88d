use crate::recur::{
    filter::{ByFilter, FilterList},
    instant::Instant,
    iter::RuleIterator,
    set::InstantSet,
};

/// The number of consecutive empty cycles a stage tolerates before giving
/// up on a rule.
///
/// A rule like "every February 30th" is syntactically fine, but never
/// produces anything. Without a bound, asking such a rule for its next
/// instant would never return.
pub const MAX_EMPTY_SETS: usize = 1000;

/// The error returned when a stage exceeds [`MAX_EMPTY_SETS`].
///
/// This indicates that the rule is, in all likelihood, contradictory.
/// Callers can detect it with `anyhow::Error::downcast_ref`.
#[derive(Debug)]
pub struct TooManyEmptySets {
    part: &'static str,
    cycles: usize,
    unit: &'static str,
}

impl std::fmt::Display for TooManyEmptySets {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "'{part}' produced nothing for {cycles} consecutive {unit}, \
             the recurrence rule probably never matches",
            part = self.part,
            cycles = self.cycles,
            unit = self.unit,
        )
    }
}

impl std::error::Error for TooManyEmptySets {}

/// Counts consecutive empty cycles within a single `next_set` call.
#[derive(Debug)]
pub(crate) struct EmptyCycles {
    part: &'static str,
    unit: &'static str,
    count: usize,
}

impl EmptyCycles {
    /// Counts the sets pulled from a predecessor.
    pub(crate) fn new(part: &'static str) -> EmptyCycles {
        EmptyCycles { part, unit: "intervals", count: 0 }
    }

    /// Counts calendar years. The base generator uses this, since a single
    /// interval of a rule like "every February 29th" may be a day long.
    pub(crate) fn years(part: &'static str) -> EmptyCycles {
        EmptyCycles { part, unit: "years", count: 0 }
    }

    /// Records the start of another cycle.
    ///
    /// This must be called before every pull from a predecessor. Once
    /// `MAX_EMPTY_SETS` cycles have been recorded, this returns an error
    /// instead.
    pub(crate) fn tick(&mut self) -> anyhow::Result<()> {
        if self.count >= MAX_EMPTY_SETS {
            return Err(TooManyEmptySets {
                part: self.part,
                cycles: self.count,
                unit: self.unit,
            }
            .into());
        }
        self.count += 1;
        Ok(())
    }
}

/// The rule part specific half of a [`ByExpander`].
///
/// An expansion turns one seed instant into zero or more candidates. It
/// doesn't need to care about filters, sorting or empty cycles.
pub trait Expansion: std::fmt::Debug {
    /// The name of the rule part this expands, e.g., `BYMONTHDAY`.
    fn part(&self) -> &'static str;

    /// Expands `seed` into candidates, handing each to `out`.
    ///
    /// `start` is the first instant of the rule. Implementations may use it
    /// to skip candidates on days strictly before the start, since those
    /// can never be emitted. They must not rely on it for anything else.
    fn expand(&self, seed: Instant, start: Instant, out: &mut Candidates<'_>);
}

/// The receiving end of an [`Expansion`].
///
/// Every candidate given to `accept` is checked against the filters of the
/// owning stage and kept only if none of them reject it.
#[derive(Debug)]
pub struct Candidates<'a> {
    filters: &'a FilterList,
    set: &'a mut InstantSet,
}

impl<'a> Candidates<'a> {
    pub fn accept(&mut self, instant: Instant) {
        if self.filters.accepts(instant) {
            self.set.push(instant);
        }
    }
}

/// A pipeline stage that expands every instant of its predecessor using one
/// rule part, and limits the result with the filters of other rule parts.
///
/// Each call to `next_set` corresponds to one or more sets pulled from the
/// predecessor. Sets are pulled until at least one candidate survives
/// filtering, or until too many sets in a row produced nothing.
#[derive(Debug)]
pub struct ByExpander {
    expansion: Box<dyn Expansion>,
    previous: Box<dyn RuleIterator>,
    /// The first instant of the rule. Only used for pruning.
    start: Instant,
    filters: FilterList,
    result: InstantSet,
    needs_sorting: bool,
}

impl ByExpander {
    pub fn new(
        previous: Box<dyn RuleIterator>,
        expansion: Box<dyn Expansion>,
        start: Instant,
    ) -> ByExpander {
        ByExpander {
            expansion,
            previous,
            start,
            filters: FilterList::new(),
            result: InstantSet::new(),
            needs_sorting: false,
        }
    }

    /// Attaches a filter to this stage.
    ///
    /// # Panics
    ///
    /// When more than [`MAX_FILTERS`](crate::recur::filter::MAX_FILTERS)
    /// filters are attached.
    pub fn add_filter(&mut self, filter: Box<dyn ByFilter>) {
        self.filters.push(filter);
    }

    /// Requests that every set produced by this stage is sorted in
    /// ascending order with duplicates removed.
    ///
    /// Without this, instants are returned in the order the expansion
    /// produced them.
    pub fn set_needs_sorting(&mut self) {
        self.needs_sorting = true;
    }

    pub fn part(&self) -> &'static str {
        self.expansion.part()
    }
}

impl RuleIterator for ByExpander {
    fn next(&mut self) -> anyhow::Result<Instant> {
        loop {
            if let Some(instant) = self.result.pop() {
                return Ok(instant);
            }
            self.next_set()?;
        }
    }

    fn next_set(&mut self) -> anyhow::Result<&mut InstantSet> {
        let ByExpander {
            ref expansion,
            ref mut previous,
            start,
            ref filters,
            ref mut result,
            needs_sorting,
        } = *self;

        result.clear();
        let mut empty = EmptyCycles::new(expansion.part());
        while result.is_empty() {
            empty.tick()?;
            let seeds = previous.next_set()?;
            let mut out = Candidates { filters, set: &mut *result };
            while let Some(seed) = seeds.pop() {
                expansion.expand(seed, start, &mut out);
            }
        }
        if needs_sorting {
            result.sort();
        }
        log::trace!(
            "{part} produced {len} instant(s), first is {first}",
            part = expansion.part(),
            len = result.len(),
            first = result.as_slice()[0],
        );
        Ok(result)
    }
}
