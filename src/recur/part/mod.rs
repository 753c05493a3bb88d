// Each rule part gets its own module containing its expansion, its filter
// or both. Expansions plug into `ByExpander` and filters into any stage.
// None of them do calendar arithmetic directly. They go through the
// `CalendarMetrics` given to them at construction.

pub use self::{
    month::{ByMonthFilter, MonthExpansion, MonthFilter},
    month_day::{MonthDayExpansion, MonthDayFilter},
    set_pos::SetPositionLimit,
    time::{TimeExpansion, TimeField, TimeFilter},
    week_day::{ByWeekday, WeekDayExpansion, WeekDayFilter},
    week_no::WeekNoExpansion,
    year_day::{YearDayExpansion, YearDayFilter},
};

mod month;
mod month_day;
mod set_pos;
mod time;
mod week_day;
mod week_no;
mod year_day;

/// Resolves a possibly negative one-based index into a period of `len`
/// units, where `-1` is the last unit. Returns `None` when the index falls
/// outside the period.
fn resolve(index: i16, len: i16) -> Option<i16> {
    let n = if index < 0 { len + 1 + index } else { index };
    (1 <= n && n <= len).then_some(n)
}

/// Returns true when the one-based `n` of a period of `len` units is
/// selected by `indices`, which may be negative to count from the end.
///
/// `indices` must be sorted.
fn selects<T>(indices: &[T], n: i16, len: i16) -> bool
where
    T: Copy + Ord + TryFrom<i16>,
{
    let positive = n;
    // Minus 1 because -1 is the last unit, and units are 1-indexed.
    let negative = positive - 1 - len;
    let contains = |v: i16| {
        T::try_from(v).is_ok_and(|v| indices.binary_search(&v).is_ok())
    };
    contains(positive) || contains(negative)
}
