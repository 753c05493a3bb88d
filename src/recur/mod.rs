/*!
An RFC 5545 recurrence rule engine built as a pipeline of iterators.

A rule is evaluated by a linear chain of stages. The first stage produces
one seed instant per interval of the rule's frequency. Each subsequent stage
expands every instant it pulls from its predecessor using one rule part
(e.g., BYMONTHDAY) and limits the candidates it produces with filters built
from other rule parts. The last stage sorts each interval's instants, and
`RecurrenceIter` applies the start, `count` and `until` bounds on top.
*/

pub use self::{
    instant::Instant,
    rule::{Frequency, RecurrenceRule},
};

mod chain;
pub mod expander;
pub mod filter;
pub mod instant;
pub mod iter;
pub mod metrics;
pub mod part;
mod rule;
pub mod set;

/// The granularity at which a stage reasons about calendar boundaries.
///
/// This matters for rule parts whose meaning depends on an enclosing
/// period. For example, "the 2nd Monday" is different depending on whether
/// it is relative to a month or a year, and a week is "in" a month if any of
/// its days are.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    Weekly,
    Monthly,
    /// Weeks, where the month is also constrained. Weekdays are picked
    /// within a week, but a week survives as long as any of its days falls
    /// in an allowed month.
    WeeklyAndMonthly,
    Yearly,
}
