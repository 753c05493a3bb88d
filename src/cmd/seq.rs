use std::{ffi::OsStr, io::Write};

use anyhow::Context;

use crate::{
    args::{
        self, Doc, Example, Usage,
        flags::{CivilInstant, Month, Values, WeekStart},
    },
    recur::{Frequency, Instant, RecurrenceRule, part::ByWeekday},
};

const DOC: Doc = Doc {
    about: r#"
Print the datetimes, or dates, described by an RFC 5545 recurrence rule.

A rule repeats at a frequency, every <interval> years, months, weeks, days,
hours, minutes or seconds, counting from <start>. Flags like `-m/--month` or
`-w/--week-day` narrow down or multiply what each repetition produces. The
result is printed in chronological order, one per line.

Without `-c/--count` or `-u/--until`, printing only stops at the end of year
9999, so piping into `head` works too. A rule that can never produce
anything, like one asking for February 30th, fails with an error instead of
searching forever.
"#,
    synopsis: "recur seq <frequency> [<start>]",
    examples: &[
        Example {
            about: "Print the next 5 Friday the 13th occurrences:",
            command: "recur seq monthly -c5 -w fri -d 13 2024-07-20T16:30:55",
            output: "
2024-09-13T16:30:55
2024-12-13T16:30:55
2025-06-13T16:30:55
2026-02-13T16:30:55
2026-03-13T16:30:55
",
        },
        Example {
            about: "Every Monday, Wednesday and Friday at breakfast, for six \
                    doses:",
            command: "recur seq daily -c6 -w mon,wed,fri -H 8 -M 30 -S 0 \
                      2024-07-22T08:30",
            output: "
2024-07-22T08:30:00
2024-07-24T08:30:00
2024-07-26T08:30:00
2024-07-29T08:30:00
2024-07-31T08:30:00
2024-08-02T08:30:00
",
        },
        Example {
            about: "Find the last work-day of the next three months:",
            command: "recur seq monthly -c3 -w mon..fri --set-position -1 \
                      2024-07-20T16:30:55",
            output: "
2024-07-31T16:30:55
2024-08-30T16:30:55
2024-09-30T16:30:55
",
        },
        Example {
            about: "Find the last Saturday every other month:",
            command: "recur seq monthly -i2 -c4 -w -1SA 2024-07-20T16:30:55",
            output: "
2024-07-27T16:30:55
2024-09-28T16:30:55
2024-11-30T16:30:55
2025-01-25T16:30:55
",
        },
        Example {
            about: "Every weekend day until a date:",
            command: "recur seq weekly -w sat,sun -u 2024-08-10 2024-07-20",
            output: "
2024-07-20
2024-07-21
2024-07-27
2024-07-28
2024-08-03
2024-08-04
2024-08-10
",
        },
        Example {
            about: "Leap days:",
            command: "recur seq yearly -c3 2024-02-29",
            output: "
2024-02-29
2028-02-29
2032-02-29
",
        },
    ],
};

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut config = Config::default();
    args::configure(p, &DOC, &mut config)?;

    let rule = config.rule()?;
    let mut out = std::io::stdout().lock();
    for instant in rule.iter() {
        writeln!(out, "{}", instant?)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Config {
    freq: Option<Frequency>,
    start: Option<CivilInstant>,
    end: Option<End>,
    interval: Option<i32>,
    week_start: WeekStart,
    parts: Vec<Part>,
}

impl Config {
    fn rule(&self) -> anyhow::Result<RecurrenceRule> {
        let freq = self.freq.context(
            "a <frequency> is required, like `daily` or `monthly`",
        )?;
        let start = match self.start {
            Some(start) => start.get(),
            None => Instant::from_datetime(*crate::NOW),
        };
        let mut b = RecurrenceRule::builder(freq, start);
        b.interval(self.interval.unwrap_or(1));
        b.week_start(self.week_start.get());
        for part in self.parts.iter() {
            match *part {
                Part::Month(ref v) => b.by_month(v.iter().map(|m| m.get())),
                Part::Week(ref v) => b.by_week(v.iter()),
                Part::YearDay(ref v) => b.by_year_day(v.iter()),
                Part::MonthDay(ref v) => b.by_month_day(v.iter()),
                Part::WeekDay(ref v) => b.by_week_day(v.iter()),
                Part::Hour(ref v) => b.by_hour(v.iter()),
                Part::Minute(ref v) => b.by_minute(v.iter()),
                Part::Second(ref v) => b.by_second(v.iter()),
                Part::SetPosition(ref v) => b.by_set_position(v.iter()),
            };
        }
        match self.end {
            None => {}
            Some(End::Until(until)) => {
                b.until(until.get());
            }
            Some(End::Count(count)) => {
                b.count(count);
            }
        }
        b.build()
    }

    /// The frequency comes first, then an optional start.
    fn positional(&mut self, value: &OsStr) -> anyhow::Result<bool> {
        let value = value.to_str().with_context(|| {
            format!("positional argument {value:?} is not valid UTF-8")
        })?;
        if self.freq.is_none() {
            self.freq = Some(value.parse()?);
        } else if self.start.is_none() {
            self.start = Some(value.parse()?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// Repeating the same flag replaces its value.
    fn end(&mut self, end: End) -> anyhow::Result<bool> {
        if let Some(prev) = self.end {
            anyhow::ensure!(
                prev.flag() == end.flag(),
                "{} and {} are mutually exclusive",
                prev.flag(),
                end.flag(),
            );
        }
        self.end = Some(end);
        Ok(true)
    }
}

impl args::Configurable for Config {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        let part = match *arg {
            Value(ref v) => return self.positional(v),
            Short('u') | Long("until") => {
                return self.end(End::Until(args::parse(p, "-u/--until")?));
            }
            Short('c') | Long("count") => {
                return self.end(End::Count(args::parse(p, "-c/--count")?));
            }
            Short('i') | Long("interval") => {
                self.interval = Some(args::parse(p, "-i/--interval")?);
                return Ok(true);
            }
            Long("week-start") => {
                self.week_start = args::parse(p, "--week-start")?;
                return Ok(true);
            }
            Short('m') | Long("month") => {
                Part::Month(args::parse(p, "-m/--month")?)
            }
            Long("week") => Part::Week(args::parse(p, "--week")?),
            Long("doy") => Part::YearDay(args::parse(p, "--doy")?),
            Short('d') | Long("day") => {
                Part::MonthDay(args::parse(p, "-d/--day")?)
            }
            Short('w') | Long("week-day") => {
                Part::WeekDay(args::parse(p, "-w/--week-day")?)
            }
            Short('H') | Long("hour") => {
                Part::Hour(args::parse(p, "-H/--hour")?)
            }
            Short('M') | Long("minute") => {
                Part::Minute(args::parse(p, "-M/--minute")?)
            }
            Short('S') | Long("second") => {
                Part::Second(args::parse(p, "-S/--second")?)
            }
            Long("set-position") => {
                Part::SetPosition(args::parse(p, "--set-position")?)
            }
            _ => return Ok(false),
        };
        self.parts.push(part);
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const INTERVAL: Usage = Usage::flag(
            "-i/--interval <number>",
            "Repeat every <number> years, months, weeks, etc. Defaults to 1.",
            r#"
Repeat every <number> years, months, weeks, etc. Defaults to 1.

With `weekly -i2`, every other week is skipped. Which weeks those are is
decided by the week containing the start, and by `--week-start`.
"#,
        );

        &[
            Frequency::USAGE,
            CivilInstant::ARG,
            INTERVAL,
            End::USAGE_UNTIL,
            End::USAGE_COUNT,
            WeekStart::USAGE,
            Part::USAGE_MONTH,
            Part::USAGE_WEEK,
            Part::USAGE_YEAR_DAY,
            Part::USAGE_MONTH_DAY,
            Part::USAGE_WEEK_DAY,
            Part::USAGE_HOUR,
            Part::USAGE_MINUTE,
            Part::USAGE_SECOND,
            Part::USAGE_SET_POSITION,
        ]
    }
}

/// When a sequence stops, if ever.
#[derive(Clone, Copy, Debug)]
enum End {
    Until(CivilInstant),
    Count(usize),
}

impl End {
    const USAGE_UNTIL: Usage = Usage::flag(
        "-u/--until <datetime>",
        "Stop after this datetime or date.",
        r#"
Stop after this datetime or date.

It is inclusive, so it is printed when it matches the rule. It must be a date
exactly when the start is a date. It can't be combined with `-c/--count`.
"#,
    );

    const USAGE_COUNT: Usage = Usage::flag(
        "-c/--count <number>",
        "Stop after printing <number> datetimes.",
        r#"
Stop after printing <number> datetimes.

Zero prints nothing. It can't be combined with `-u/--until`.
"#,
    );

    fn flag(&self) -> &'static str {
        match *self {
            End::Until(_) => "-u/--until",
            End::Count(_) => "-c/--count",
        }
    }
}

/// A rule part given on the command line. The same part may be given more
/// than once, in which case the values add up.
#[derive(Clone, Debug)]
enum Part {
    Month(Values<Month>),
    Week(Values<i8>),
    YearDay(Values<i16>),
    MonthDay(Values<i8>),
    WeekDay(Values<ByWeekday>),
    Hour(Values<i8>),
    Minute(Values<i8>),
    Second(Values<i8>),
    SetPosition(Values<i32>),
}

impl Part {
    const USAGE_MONTH: Usage = Usage::flag(
        "-m/--month <months>",
        "Months of the year, like `2,5..7` or `feb,may..jul`.",
        r#"
Months of the year, like `2,5..7` or `feb,may..jul`.

Months are numbered 1 through 12, or named by at least the first three letters
of their English name.

At yearly frequency, each year yields every given month. At shorter
frequencies, only datetimes in one of the given months are kept. A week is
kept when any of its days is in one of them.
"#,
    );

    const USAGE_WEEK: Usage = Usage::flag(
        "--week <weeks>",
        "Weeks of the year, like `1,-1` for the first and last.",
        r#"
Weeks of the year, like `1,-1` for the first and last.

Weeks are numbered 1 through 53, or -53 through -1 counting back from the
last week. Week 1 is the first week with at least four days in the year, so
it may begin in December. Most years have 52 weeks. Whether a year has a 53rd
depends on the weekday it starts on, relative to `--week-start`.

Each year yields every day of each given week, unless `-w/--week-day` picks
out some of them. Only allowed at yearly frequency.
"#,
    );

    const USAGE_YEAR_DAY: Usage = Usage::flag(
        "--doy <days>",
        "Days of the year, like `1,100..102,-1`.",
        r#"
Days of the year, like `1,100..102,-1`.

Days are numbered 1 through 366, or -366 through -1 counting back from
December 31st. Day 366 only exists in leap years.

At yearly frequency, each year yields every given day. At hourly and shorter
frequencies, only datetimes on one of them are kept. Not allowed at monthly,
weekly or daily frequency.
"#,
    );

    const USAGE_MONTH_DAY: Usage = Usage::flag(
        "-d/--day <days>",
        "Days of the month, like `1,15` or `-1` for the last.",
        r#"
Days of the month, like `1,15` or `-1` for the last.

Days are numbered 1 through 31, or -31 through -1 counting back from the end
of the month. A month without the given day is skipped, so `-d 31` skips
short months instead of moving to the 30th.

At monthly and yearly frequency, each month yields every given day. At daily
and shorter frequencies, only datetimes on one of them are kept. Not allowed
at weekly frequency.
"#,
    );

    const USAGE_WEEK_DAY: Usage = Usage::flag(
        "-w/--week-day <weekdays>",
        "Days of the week, like `mon..fri`, or numbered like `-1-fri`.",
        r#"
Days of the week, like `mon..fri`, or numbered like `-1-fri`.

A range of weekdays wraps around, so `fri..mon` includes the weekend. A
numbered weekday such as `2-tue`, `2TU` or `-1-fri` is the nth (or nth from
last) such weekday of the month, or of the year when a yearly rule has no
`-m/--month`. Numbered weekdays can't be part of a range, and are only
allowed at monthly and yearly frequency without `--week`.

At weekly frequency, each week yields every given weekday. At monthly and
yearly frequency, they do the same within each month or year, unless a day
is already set by `-d/--day`, `--doy` or `--week`, in which case only the days
falling on a given weekday are kept. At daily and shorter frequencies, only
datetimes on one of the given weekdays are kept.
"#,
    );

    const USAGE_HOUR: Usage = Usage::flag(
        "-H/--hour <hours>",
        "Hours of the day, 0 through 23.",
        r#"
Hours of the day, 0 through 23.

At daily and longer frequencies, each day yields every given hour. At hourly
and shorter frequencies, only datetimes in one of them are kept. The start
must be a datetime.
"#,
    );

    const USAGE_MINUTE: Usage = Usage::flag(
        "-M/--minute <minutes>",
        "Minutes of the hour, 0 through 59.",
        r#"
Minutes of the hour, 0 through 59.

At hourly and longer frequencies, each hour yields every given minute. At
minutely and secondly frequency, only datetimes in one of them are kept. The
start must be a datetime.
"#,
    );

    const USAGE_SECOND: Usage = Usage::flag(
        "-S/--second <seconds>",
        "Seconds of the minute, 0 through 59.",
        r#"
Seconds of the minute, 0 through 59.

At minutely and longer frequencies, each minute yields every given second. At
secondly frequency, only datetimes in one of them are kept. Leap seconds are
not supported. The start must be a datetime.
"#,
    );

    const USAGE_SET_POSITION: Usage = Usage::flag(
        "--set-position <positions>",
        "Keep only the nth datetimes of each repetition, like `1` or `-1`.",
        r#"
Keep only the nth datetimes of each repetition, like `1` or `-1`.

Every repetition of the rule produces a set of datetimes, such as all the
weekdays of a month. This keeps the ones at the given positions within that
set, counting from 1, or from -1 for the last. Positions are 1 through 366 or
-366 through -1.

Requires at least one other flag that produces or narrows down the set.
"#,
    );
}
