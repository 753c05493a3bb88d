use std::sync::Arc;

use jiff::civil::Date;

use crate::recur::{
    Scope,
    expander::{ByExpander, Expansion},
    filter::ByFilter,
    instant::Instant,
    iter::{FreqIterator, RuleIterator},
    metrics::{CalendarMetrics, GregorianMetrics},
    part::{
        ByMonthFilter, ByWeekday, MonthDayExpansion, MonthDayFilter,
        MonthExpansion, MonthFilter, SetPositionLimit, TimeExpansion,
        TimeField, TimeFilter, WeekDayExpansion, WeekDayFilter,
        WeekNoExpansion, YearDayExpansion, YearDayFilter,
    },
    rule::{Frequency, RecurrenceRule},
};

/// The last year any rule may produce an instant in.
const MAX_YEAR: i16 = 9999;

/// Builds the pipeline of stages that produces the instants of the given
/// rule.
///
/// Which rule parts expand and which ones limit depends on the frequency,
/// as laid out in the table in RFC 5545 section 3.3.10. The stages are
/// ordered from the coarsest part to the finest, and BYSETPOS, when
/// present, always comes last.
pub(super) fn build(rule: &RecurrenceRule) -> Box<dyn RuleIterator> {
    let metrics: Arc<dyn CalendarMetrics> =
        Arc::new(GregorianMetrics::new(rule.week_start()));
    let start = rule.start();
    let freq = rule.frequency();

    let mut seeds = FreqIterator::new(
        start.datetime(),
        start.is_all_day(),
        rule.interval(),
        skips_constrained(rule),
        last_year(rule),
    );
    let mut stages = vec![];
    match freq {
        Frequency::Yearly => yearly(rule, &metrics, &mut stages),
        Frequency::Monthly => {
            if !rule.by_month().is_empty() {
                seeds.add_date_filter(MonthFilter::new(rule.by_month()));
            }
            monthly(rule, &metrics, &mut stages);
        }
        Frequency::Weekly => {
            if !rule.by_week_day().is_empty() {
                // A week is only dropped when none of its days are in an
                // allowed month. The days are limited after expansion.
                if !rule.by_month().is_empty() {
                    seeds.add_date_filter(ByMonthFilter::new(
                        rule.by_month(),
                        Arc::clone(&metrics),
                    ));
                }
                weekly(rule, &metrics, &mut stages);
            } else if !rule.by_month().is_empty() {
                seeds.add_date_filter(MonthFilter::new(rule.by_month()));
            }
        }
        Frequency::Daily
        | Frequency::Hourly
        | Frequency::Minutely
        | Frequency::Secondly => {
            limit_seeds(rule, &metrics, &mut seeds);
        }
    }
    time(rule, &mut stages);

    // BYSETPOS numbers every instant of an interval, including those
    // before the start, so nothing may be pruned early when it's used.
    let hint = if rule.by_set_position().is_empty() {
        start
    } else {
        Instant::from_date(Date::MIN)
    };
    let mut parts = vec![freq.as_str()];
    let mut chain: Box<dyn RuleIterator> = Box::new(seeds);
    let len = stages.len();
    for (i, stage) in stages.into_iter().enumerate() {
        let mut expander = ByExpander::new(chain, stage.expansion, hint);
        for filter in stage.filters {
            expander.add_filter(filter);
        }
        // Intermediate stages may produce candidates in any order. Only
        // the final set of each interval needs to be sorted.
        if i + 1 == len {
            expander.set_needs_sorting();
        }
        parts.push(expander.part());
        chain = Box::new(expander);
    }
    if !rule.by_set_position().is_empty() {
        parts.push("BYSETPOS");
        let positions = rule.by_set_position();
        chain = Box::new(SetPositionLimit::new(chain, positions));
    }
    log::debug!(
        "built recurrence pipeline starting at {start}: {}",
        parts.join(" -> "),
    );
    chain
}

/// A single expansion together with the filters limiting its candidates.
struct Stage {
    expansion: Box<dyn Expansion>,
    filters: Vec<Box<dyn ByFilter>>,
}

impl Stage {
    fn new(expansion: impl Expansion + 'static) -> Stage {
        Stage { expansion: Box::new(expansion), filters: vec![] }
    }

    fn filter(mut self, filter: impl ByFilter + 'static) -> Stage {
        self.filters.push(Box::new(filter));
        self
    }

    fn filter_if<F: ByFilter + 'static>(
        self,
        yes: bool,
        filter: impl FnOnce() -> F,
    ) -> Stage {
        if yes { self.filter(filter()) } else { self }
    }
}

fn yearly(
    rule: &RecurrenceRule,
    metrics: &Arc<dyn CalendarMetrics>,
    stages: &mut Vec<Stage>,
) {
    let months = rule.by_month();
    let year_days = rule.by_year_day();
    let month_days = rule.by_month_day();
    let week_days = rule.by_week_day();

    if !rule.by_week().is_empty() {
        let scope = if months.is_empty() {
            Scope::Weekly
        } else {
            Scope::WeeklyAndMonthly
        };
        stages.push(
            Stage::new(WeekNoExpansion::new(
                rule.by_week(),
                Arc::clone(metrics),
            ))
            .filter_if(!months.is_empty(), || {
                ByMonthFilter::new(months, Arc::clone(metrics))
            }),
        );
        // Without BYDAY, every day of each selected week is in the set.
        let every_day: Vec<ByWeekday>;
        let week_days = if week_days.is_empty() {
            every_day = jiff::civil::Weekday::Monday
                .cycle_forward()
                .take(7)
                .map(ByWeekday::Any)
                .collect();
            &every_day[..]
        } else {
            week_days
        };
        stages.push(
            Stage::new(WeekDayExpansion::new(
                week_days,
                scope,
                Arc::clone(metrics),
            ))
            .filter_if(!months.is_empty(), || MonthFilter::new(months))
            .filter_if(!year_days.is_empty(), || {
                YearDayFilter::new(year_days, Arc::clone(metrics))
            })
            .filter_if(!month_days.is_empty(), || {
                MonthDayFilter::new(month_days, Arc::clone(metrics))
            }),
        );
    } else if !year_days.is_empty() {
        let scope =
            if months.is_empty() { Scope::Yearly } else { Scope::Monthly };
        stages.push(
            Stage::new(YearDayExpansion::new(year_days, Arc::clone(metrics)))
                .filter_if(!months.is_empty(), || MonthFilter::new(months))
                .filter_if(!month_days.is_empty(), || {
                    MonthDayFilter::new(month_days, Arc::clone(metrics))
                })
                .filter_if(!week_days.is_empty(), || {
                    WeekDayFilter::new(week_days, scope, Arc::clone(metrics))
                }),
        );
    } else if !months.is_empty() {
        // When a later stage picks the days, each month is represented by
        // its first day. Otherwise, the day comes from the start.
        let day = if month_days.is_empty() && week_days.is_empty() {
            Some(rule.start().day())
        } else {
            None
        };
        stages.push(Stage::new(MonthExpansion::new(
            months,
            day,
            Arc::clone(metrics),
        )));
        monthly(rule, metrics, stages);
    } else if !month_days.is_empty() {
        let every_month: Vec<i8> = (1..=12).collect();
        stages.push(Stage::new(MonthExpansion::new(
            &every_month,
            None,
            Arc::clone(metrics),
        )));
        stages.push(
            Stage::new(MonthDayExpansion::new(month_days, Arc::clone(metrics)))
                .filter_if(!week_days.is_empty(), || {
                    WeekDayFilter::new(
                        week_days,
                        Scope::Yearly,
                        Arc::clone(metrics),
                    )
                }),
        );
    } else if !week_days.is_empty() {
        stages.push(Stage::new(WeekDayExpansion::new(
            week_days,
            Scope::Yearly,
            Arc::clone(metrics),
        )));
    }
}

/// Pushes the stages that pick days within a month. This is shared by
/// monthly rules and yearly rules with BYMONTH.
fn monthly(
    rule: &RecurrenceRule,
    metrics: &Arc<dyn CalendarMetrics>,
    stages: &mut Vec<Stage>,
) {
    let month_days = rule.by_month_day();
    let week_days = rule.by_week_day();

    if !month_days.is_empty() {
        stages.push(
            Stage::new(MonthDayExpansion::new(month_days, Arc::clone(metrics)))
                .filter_if(!week_days.is_empty(), || {
                    WeekDayFilter::new(
                        week_days,
                        Scope::Monthly,
                        Arc::clone(metrics),
                    )
                }),
        );
    } else if !week_days.is_empty() {
        stages.push(Stage::new(WeekDayExpansion::new(
            week_days,
            Scope::Monthly,
            Arc::clone(metrics),
        )));
    }
}

fn weekly(
    rule: &RecurrenceRule,
    metrics: &Arc<dyn CalendarMetrics>,
    stages: &mut Vec<Stage>,
) {
    let months = rule.by_month();
    let scope = if months.is_empty() {
        Scope::Weekly
    } else {
        Scope::WeeklyAndMonthly
    };
    stages.push(
        Stage::new(WeekDayExpansion::new(
            rule.by_week_day(),
            scope,
            Arc::clone(metrics),
        ))
        .filter_if(!months.is_empty(), || MonthFilter::new(months)),
    );
}

/// At daily frequency and shorter, every date part limits the seeds, as
/// does every time part at least as long as the frequency.
fn limit_seeds(
    rule: &RecurrenceRule,
    metrics: &Arc<dyn CalendarMetrics>,
    seeds: &mut FreqIterator,
) {
    let freq = rule.frequency();
    if !rule.by_month().is_empty() {
        seeds.add_date_filter(MonthFilter::new(rule.by_month()));
    }
    if !rule.by_year_day().is_empty() {
        seeds.add_date_filter(YearDayFilter::new(
            rule.by_year_day(),
            Arc::clone(metrics),
        ));
    }
    if !rule.by_month_day().is_empty() {
        seeds.add_date_filter(MonthDayFilter::new(
            rule.by_month_day(),
            Arc::clone(metrics),
        ));
    }
    if !rule.by_week_day().is_empty() {
        seeds.add_date_filter(WeekDayFilter::new(
            rule.by_week_day(),
            Scope::Weekly,
            Arc::clone(metrics),
        ));
    }
    let fields = [
        (Frequency::Hourly, TimeField::Hour, rule.by_hour()),
        (Frequency::Minutely, TimeField::Minute, rule.by_minute()),
        (Frequency::Secondly, TimeField::Second, rule.by_second()),
    ];
    for (limited_from, field, values) in fields {
        if freq >= limited_from && !values.is_empty() {
            seeds.add_time_filter(TimeFilter::new(field, values));
        }
    }
}

/// Pushes the time parts that expand at the rule's frequency. That is,
/// every time part shorter than the frequency.
fn time(rule: &RecurrenceRule, stages: &mut Vec<Stage>) {
    let freq = rule.frequency();
    let fields = [
        (Frequency::Daily, TimeField::Hour, rule.by_hour()),
        (Frequency::Hourly, TimeField::Minute, rule.by_minute()),
        (Frequency::Minutely, TimeField::Second, rule.by_second()),
    ];
    for (expanded_to, field, values) in fields {
        if freq <= expanded_to && !values.is_empty() {
            stages.push(Stage::new(TimeExpansion::new(field, values)));
        }
    }
}

/// Returns true when no rule part picks the day of a yearly or monthly
/// rule, in which case the day always comes from the start.
fn skips_constrained(rule: &RecurrenceRule) -> bool {
    match rule.frequency() {
        Frequency::Yearly => {
            rule.by_month().is_empty()
                && rule.by_week().is_empty()
                && rule.by_year_day().is_empty()
                && rule.by_month_day().is_empty()
                && rule.by_week_day().is_empty()
        }
        Frequency::Monthly => {
            rule.by_month_day().is_empty() && rule.by_week_day().is_empty()
        }
        _ => false,
    }
}

/// Seeds stop one year after `until`, since the instants of an interval
/// may spill over into the next year. An `until` bound is applied
/// precisely on top of that.
fn last_year(rule: &RecurrenceRule) -> i16 {
    rule.until().map_or(MAX_YEAR, |until| {
        until.year().saturating_add(1).min(MAX_YEAR)
    })
}
