use crate::recur::instant::Instant;

/// An ordered batch of instants that is consumed from the front.
///
/// Each pipeline stage owns exactly one of these and refills it on every
/// cycle. Clearing keeps the allocation around, which matters because an
/// open ended rule may be iterated for a very long time.
#[derive(Clone, Debug, Default)]
pub struct InstantSet {
    instants: Vec<Instant>,
    /// The position of the next instant to hand out via `pop`.
    pos: usize,
}

impl InstantSet {
    pub fn new() -> InstantSet {
        InstantSet::default()
    }

    /// Appends an instant to the end of this set.
    pub fn push(&mut self, instant: Instant) {
        self.instants.push(instant);
    }

    /// Removes and returns the next unconsumed instant.
    pub fn pop(&mut self) -> Option<Instant> {
        let instant = *self.instants.get(self.pos)?;
        self.pos += 1;
        Some(instant)
    }

    /// Returns true when every instant in this set has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.instants.len()
    }

    /// Returns the number of instants not yet consumed.
    pub fn len(&self) -> usize {
        self.instants.len() - self.pos
    }

    /// Returns the instants not yet consumed.
    pub fn as_slice(&self) -> &[Instant] {
        &self.instants[self.pos..]
    }

    /// Empties this set without freeing its storage.
    pub fn clear(&mut self) {
        self.instants.clear();
        self.pos = 0;
    }

    /// Sorts the unconsumed instants in ascending order and removes
    /// duplicates.
    ///
    /// Anything already consumed is discarded.
    pub fn sort(&mut self) {
        self.instants.drain(..self.pos);
        self.pos = 0;
        self.instants.sort_unstable();
        self.instants.dedup();
    }
}

impl Extend<Instant> for InstantSet {
    fn extend<I: IntoIterator<Item = Instant>>(&mut self, instants: I) {
        self.instants.extend(instants);
    }
}
