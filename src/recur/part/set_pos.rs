use crate::recur::{
    expander::EmptyCycles, instant::Instant, iter::RuleIterator,
    set::InstantSet,
};

/// The BYSETPOS stage.
///
/// This keeps only the instants at the given one-based positions of each
/// set produced by its predecessor, which must produce sorted sets. A
/// negative position counts from the end of the set.
///
/// Like `ByExpander`, this gives up once too many consecutive sets had
/// nothing at any of the given positions.
#[derive(Debug)]
pub struct SetPositionLimit {
    previous: Box<dyn RuleIterator>,
    /// Sorted.
    positions: Box<[i32]>,
    result: InstantSet,
}

impl SetPositionLimit {
    pub fn new(
        previous: Box<dyn RuleIterator>,
        positions: &[i32],
    ) -> SetPositionLimit {
        SetPositionLimit {
            previous,
            positions: positions.into(),
            result: InstantSet::new(),
        }
    }

    fn selects(positions: &[i32], position: usize, len: usize) -> bool {
        let Ok(position) = i32::try_from(position) else { return false };
        let Ok(len) = i32::try_from(len) else { return false };
        let positive = position + 1;
        // Minus 1 because -1 is the last instant of a set, and the positions
        // of a set are 1-indexed according to RFC 5545.
        let negative = positive - 1 - len;
        positions.binary_search(&positive).is_ok()
            || positions.binary_search(&negative).is_ok()
    }
}

impl RuleIterator for SetPositionLimit {
    fn next(&mut self) -> anyhow::Result<Instant> {
        loop {
            if let Some(instant) = self.result.pop() {
                return Ok(instant);
            }
            self.next_set()?;
        }
    }

    fn next_set(&mut self) -> anyhow::Result<&mut InstantSet> {
        let SetPositionLimit {
            ref mut previous,
            ref positions,
            ref mut result,
        } = *self;

        result.clear();
        let mut empty = EmptyCycles::new("BYSETPOS");
        while result.is_empty() {
            empty.tick()?;
            let set = previous.next_set()?;
            let len = set.len();
            let selected = set
                .as_slice()
                .iter()
                .enumerate()
                .filter(|&(i, _)| SetPositionLimit::selects(positions, i, len))
                .map(|(_, &instant)| instant);
            result.extend(selected);
            set.clear();
        }
        log::trace!(
            "BYSETPOS selected {len} instant(s)",
            len = result.len(),
        );
        Ok(result)
    }
}
