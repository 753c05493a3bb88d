use crate::recur::instant::Instant;

/// The maximum number of filters a single stage may hold.
///
/// This is never configurable. It bounds the number of rule parts that can
/// limit a stage at the same time.
pub const MAX_FILTERS: usize = 8;

/// A predicate over a single instant, derived from one rule part.
///
/// Implementations are configured once at construction time and never
/// change afterwards. They must not depend on which other filters are
/// present or the order in which they run.
pub trait ByFilter: std::fmt::Debug {
    /// Returns true if and only if the given instant satisfies this
    /// filter's rule part.
    fn accepts(&self, instant: Instant) -> bool;
}

/// An ordered list of filters, all of which must accept an instant.
#[derive(Debug, Default)]
pub struct FilterList {
    filters: Vec<Box<dyn ByFilter>>,
}

impl FilterList {
    pub fn new() -> FilterList {
        FilterList { filters: Vec::with_capacity(MAX_FILTERS) }
    }

    /// Adds a filter to the end of this list.
    ///
    /// # Panics
    ///
    /// When this list already holds `MAX_FILTERS` filters. Chain
    /// construction never attaches more filters than there are rule parts,
    /// so this indicates a bug.
    pub fn push(&mut self, filter: Box<dyn ByFilter>) {
        assert!(
            self.filters.len() < MAX_FILTERS,
            "attempted to attach more than {MAX_FILTERS} filters \
             to one stage (new filter: {filter:?})",
        );
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns true when no filter rejects the given instant.
    ///
    /// Filters are run in the order they were added and evaluation stops at
    /// the first rejection.
    pub fn accepts(&self, instant: Instant) -> bool {
        self.filters.iter().all(|f| f.accepts(instant))
    }
}
