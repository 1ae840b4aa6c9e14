//! Splits a date range into calendar-month partitions

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::types::{DateRange, Partition};

/// Plan one partition per calendar month intersecting `range`, ascending
///
/// Query bounds are clipped to the range: `effective_start` is the later of the
/// month start and the range start, `effective_end` is the day after the
/// earlier of the month end and the range end.
pub fn plan_partitions(range: &DateRange) -> Vec<Partition> {
    let mut partitions = Vec::new();
    let mut month_start = first_of_month(range.start());

    while month_start <= range.end() {
        let Some(next_month) = month_start.checked_add_months(Months::new(1)) else {
            break;
        };
        let month_end = next_month - Days::new(1);

        let effective_start = month_start.max(range.start());
        let last_day = month_end.min(range.end());
        let Some(effective_end) = last_day.checked_add_days(Days::new(1)) else {
            break;
        };

        partitions.push(Partition {
            year: month_start.year(),
            month: month_start.month(),
            effective_start,
            effective_end,
        });
        month_start = next_month;
    }

    partitions
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
