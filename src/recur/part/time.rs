use crate::recur::{
    expander::{Candidates, Expansion},
    filter::ByFilter,
    instant::Instant,
};

/// One of the time of day fields a rule part can select.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeField {
    Hour,
    Minute,
    Second,
}

impl TimeField {
    fn get(self, instant: Instant) -> i8 {
        match self {
            TimeField::Hour => instant.hour(),
            TimeField::Minute => instant.minute(),
            TimeField::Second => instant.second(),
        }
    }

    fn set(self, instant: Instant, value: i8) -> Instant {
        match self {
            TimeField::Hour => instant.with_hour(value),
            TimeField::Minute => instant.with_minute(value),
            TimeField::Second => instant.with_second(value),
        }
    }

    fn part(self) -> &'static str {
        match self {
            TimeField::Hour => "BYHOUR",
            TimeField::Minute => "BYMINUTE",
            TimeField::Second => "BYSECOND",
        }
    }
}

/// A BYHOUR, BYMINUTE or BYSECOND expansion: replaces one field of the
/// seed with each of the given values.
///
/// Values must already be validated for the field.
#[derive(Clone, Debug)]
pub struct TimeExpansion {
    field: TimeField,
    values: Box<[i8]>,
}

impl TimeExpansion {
    pub fn new(field: TimeField, values: &[i8]) -> TimeExpansion {
        TimeExpansion { field, values: values.into() }
    }
}

impl Expansion for TimeExpansion {
    fn part(&self) -> &'static str {
        self.field.part()
    }

    fn expand(&self, seed: Instant, _: Instant, out: &mut Candidates<'_>) {
        for &value in self.values.iter() {
            out.accept(self.field.set(seed, value));
        }
    }
}

/// A BYHOUR, BYMINUTE or BYSECOND limit.
#[derive(Clone, Debug)]
pub struct TimeFilter {
    field: TimeField,
    values: Box<[i8]>,
}

impl TimeFilter {
    pub fn new(field: TimeField, values: &[i8]) -> TimeFilter {
        TimeFilter { field, values: values.into() }
    }
}

impl ByFilter for TimeFilter {
    fn accepts(&self, instant: Instant) -> bool {
        self.values.contains(&self.field.get(instant))
    }
}
