use jiff::civil::{Date, DateTime};

// Bit layout, least significant first. The year is stored in the remaining
// high bits and may be negative. Since every lower field fits below
// `YEAR_SHIFT`, comparing the raw integers compares instants
// chronologically. The all-day flag is the lowest bit, so an all-day
// instant sorts just after midnight of the same day.
const ALL_DAY_BIT: i64 = 1;
const SECOND_SHIFT: u32 = 1;
const MINUTE_SHIFT: u32 = 7;
const HOUR_SHIFT: u32 = 13;
const DAY_SHIFT: u32 = 18;
const MONTH_SHIFT: u32 = 23;
const YEAR_SHIFT: u32 = 27;

const SECOND_MASK: i64 = 0b11_1111;
const MINUTE_MASK: i64 = 0b11_1111;
const HOUR_MASK: i64 = 0b1_1111;
const DAY_MASK: i64 = 0b1_1111;
const MONTH_MASK: i64 = 0b1111;

/// A civil calendar point packed into a single integer.
///
/// An instant is either "timed" (a date plus an hour, minute and second) or
/// "all-day" (just a date). Instants are `Copy` and order chronologically.
///
/// Every instant corresponds to a valid Gregorian date. The only way to
/// move an instant to a different date is through a
/// [`CalendarMetrics`](crate::recur::metrics::CalendarMetrics)
/// implementation or through one of the `jiff` conversions, both of which
/// reject invalid dates. Time fields can be replaced directly, since every
/// hour in `0..=23` and every minute and second in `0..=59` is valid.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Instant(i64);

impl Instant {
    /// Creates a timed instant from a civil datetime.
    ///
    /// Sub-second precision is dropped.
    pub fn from_datetime(dt: DateTime) -> Instant {
        Instant::pack(
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            false,
        )
    }

    /// Creates an all-day instant from a civil date.
    pub fn from_date(date: Date) -> Instant {
        Instant::pack(date.year(), date.month(), date.day(), 0, 0, 0, true)
    }

    /// Creates an instant from a civil datetime, treating it as all-day
    /// (ignoring its time) when `all_day` is true.
    pub fn from_civil(dt: DateTime, all_day: bool) -> Instant {
        if all_day {
            Instant::from_date(dt.date())
        } else {
            Instant::from_datetime(dt)
        }
    }

    fn pack(
        year: i16,
        month: i8,
        day: i8,
        hour: i8,
        minute: i8,
        second: i8,
        all_day: bool,
    ) -> Instant {
        let mut raw = i64::from(year) << YEAR_SHIFT;
        raw |= i64::from(month) << MONTH_SHIFT;
        raw |= i64::from(day) << DAY_SHIFT;
        raw |= i64::from(hour) << HOUR_SHIFT;
        raw |= i64::from(minute) << MINUTE_SHIFT;
        raw |= i64::from(second) << SECOND_SHIFT;
        if all_day {
            raw |= ALL_DAY_BIT;
        }
        Instant(raw)
    }

    /// Returns a copy of this instant with the same time of day, but on the
    /// given date.
    ///
    /// Callers must ensure `date` came from `jiff`, which is what guarantees
    /// validity.
    pub(crate) fn with_date(self, date: Date) -> Instant {
        Instant::pack(
            date.year(),
            date.month(),
            date.day(),
            self.hour(),
            self.minute(),
            self.second(),
            self.is_all_day(),
        )
    }

    pub fn year(self) -> i16 {
        // OK because the year was packed from an `i16`.
        (self.0 >> YEAR_SHIFT) as i16
    }

    pub fn month(self) -> i8 {
        ((self.0 >> MONTH_SHIFT) & MONTH_MASK) as i8
    }

    pub fn day(self) -> i8 {
        ((self.0 >> DAY_SHIFT) & DAY_MASK) as i8
    }

    pub fn hour(self) -> i8 {
        ((self.0 >> HOUR_SHIFT) & HOUR_MASK) as i8
    }

    pub fn minute(self) -> i8 {
        ((self.0 >> MINUTE_SHIFT) & MINUTE_MASK) as i8
    }

    pub fn second(self) -> i8 {
        ((self.0 >> SECOND_SHIFT) & SECOND_MASK) as i8
    }

    pub fn is_all_day(self) -> bool {
        self.0 & ALL_DAY_BIT != 0
    }

    /// Returns this instant with its hour replaced.
    ///
    /// `hour` must be in `0..=23`.
    pub fn with_hour(self, hour: i8) -> Instant {
        debug_assert!((0..=23).contains(&hour));
        let cleared = self.0 & !(HOUR_MASK << HOUR_SHIFT);
        Instant(cleared | (i64::from(hour) << HOUR_SHIFT))
    }

    /// Returns this instant with its minute replaced.
    ///
    /// `minute` must be in `0..=59`.
    pub fn with_minute(self, minute: i8) -> Instant {
        debug_assert!((0..=59).contains(&minute));
        let cleared = self.0 & !(MINUTE_MASK << MINUTE_SHIFT);
        Instant(cleared | (i64::from(minute) << MINUTE_SHIFT))
    }

    /// Returns this instant with its second replaced.
    ///
    /// `second` must be in `0..=59`.
    pub fn with_second(self, second: i8) -> Instant {
        debug_assert!((0..=59).contains(&second));
        let cleared = self.0 & !(SECOND_MASK << SECOND_SHIFT);
        Instant(cleared | (i64::from(second) << SECOND_SHIFT))
    }

    /// Returns true when this instant falls on a calendar day before the
    /// day of `other`, without regard to the time of day.
    pub fn precedes_day_of(self, other: Instant) -> bool {
        (self.0 >> DAY_SHIFT) < (other.0 >> DAY_SHIFT)
    }

    /// Converts this instant to a civil date.
    pub fn date(self) -> Date {
        // OK because every `Instant` is built from a valid civil date.
        jiff::civil::date(self.year(), self.month(), self.day())
    }

    /// Converts this instant to a civil datetime. All-day instants are
    /// placed at midnight.
    pub fn datetime(self) -> DateTime {
        // OK because the time fields are always in range.
        let time =
            jiff::civil::time(self.hour(), self.minute(), self.second(), 0);
        DateTime::from_parts(self.date(), time)
    }
}

impl From<DateTime> for Instant {
    fn from(dt: DateTime) -> Instant {
        Instant::from_datetime(dt)
    }
}

impl From<Date> for Instant {
    fn from(date: Date) -> Instant {
        Instant::from_date(date)
    }
}

impl std::fmt::Display for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_all_day() {
            std::fmt::Display::fmt(&self.date(), f)
        } else {
            std::fmt::Display::fmt(&self.datetime(), f)
        }
    }
}

impl std::fmt::Debug for Instant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Instant({self})")
    }
}
