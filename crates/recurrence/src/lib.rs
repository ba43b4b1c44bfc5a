use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use models::Recurrence;

/// Returns the number of days in the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Builds a date from year/month/day, clamping the day to the month's last
/// day instead of overflowing into the next month (e.g. Feb 31 -> Feb 28/29).
pub fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).unwrap())
}

/// Adds whole months to a date, clamping the day-of-month where needed.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    clamped_date(year, month, date.day())
}

fn day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap()
}

/// Monday of the calendar week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Computes the next budget period for a template.
///
/// The returned period is the one a record generated "now" should cover:
/// - weekly: the calendar week containing `now` (Monday through Sunday),
///   advanced one week once `now` is more than 24h past the week's start;
/// - monthly: the anchor's day-of-month in the current month (clamped to the
///   month's last day), advanced one month once that day has passed;
/// - yearly: the anchor's month and day in the current year (clamped),
///   advanced one year once passed;
/// - none: falls back to the current calendar month. Templates without a
///   cadence are filtered out before generation, so this path is defensive.
pub fn next_period(
    recurrence: Recurrence,
    anchor_date: NaiveDate,
    now: NaiveDateTime,
) -> (NaiveDateTime, NaiveDateTime) {
    match recurrence {
        Recurrence::Weekly => {
            let mut start = week_start(now.date()).and_time(NaiveTime::MIN);
            if now - start > Duration::hours(24) {
                start += Duration::weeks(1);
            }
            let end = (start.date() + Duration::days(6)).and_time(day_end());
            (start, end)
        }
        Recurrence::Monthly => {
            let today = now.date();
            let mut start_date = clamped_date(today.year(), today.month(), anchor_date.day());
            if today > start_date {
                // The anchor day already passed this month: move to the next
                // month, rolling December into January.
                let (year, month) = if start_date.month() == 12 {
                    (start_date.year() + 1, 1)
                } else {
                    (start_date.year(), start_date.month() + 1)
                };
                start_date = clamped_date(year, month, anchor_date.day());
            }
            (start_date.and_time(NaiveTime::MIN), start_date.and_time(day_end()))
        }
        Recurrence::Yearly => {
            let today = now.date();
            let mut start_date =
                clamped_date(today.year(), anchor_date.month(), anchor_date.day());
            if today > start_date {
                start_date =
                    clamped_date(today.year() + 1, anchor_date.month(), anchor_date.day());
            }
            (start_date.and_time(NaiveTime::MIN), start_date.and_time(day_end()))
        }
        Recurrence::None => {
            // Fallback: the current calendar month.
            let today = now.date();
            let first = clamped_date(today.year(), today.month(), 1);
            let last = clamped_date(today.year(), today.month(), 31);
            (first.and_time(NaiveTime::MIN), last.and_time(day_end()))
        }
    }
}

/// Computes the date of occurrence number `occurrences_completed` for a
/// transaction template: `anchor + n * period`.
///
/// Unlike [`next_period`] this is independent of the current time, so
/// repeated evaluation (including after a restart) always lands on the same
/// dates.
pub fn next_due_date(
    recurrence: Recurrence,
    anchor_date: NaiveDate,
    occurrences_completed: u32,
) -> NaiveDate {
    match recurrence {
        Recurrence::Weekly => anchor_date + Duration::weeks(occurrences_completed as i64),
        Recurrence::Monthly => add_months(anchor_date, occurrences_completed),
        Recurrence::Yearly => add_months(anchor_date, occurrences_completed * 12),
        // A template without a cadence should never reach this code path;
        // treat one occurrence per day as the defensive fallback.
        Recurrence::None => anchor_date + Duration::days(occurrences_completed as i64),
    }
}

/// Whether at least one full recurrence period has elapsed since `since`.
///
/// This is the third clause of the due query: a template stamped inside the
/// current period is not due again until the period rolls over.
pub fn period_elapsed(recurrence: Recurrence, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match recurrence {
        Recurrence::Weekly => now - since >= Duration::weeks(1),
        Recurrence::Monthly => {
            let next = add_months(since.date_naive(), 1).and_time(since.time());
            now.naive_utc() >= next
        }
        Recurrence::Yearly => {
            let next = add_months(since.date_naive(), 12).and_time(since.time());
            now.naive_utc() >= next
        }
        Recurrence::None => now - since >= Duration::days(1),
    }
}
