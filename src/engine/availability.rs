use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::limits::MAX_WINDOWS_PER_DAY;
use crate::model::*;

use super::EngineError;

// ── Availability resolution ───────────────────────────────────────

/// How one calendar date's availability is decided: the weekly pattern,
/// or a date-specific exception layered over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayPlan<'a> {
    Recurring(Vec<TimeRange>),
    Override {
        recurring: Vec<TimeRange>,
        exception: &'a DateException,
    },
}

impl<'a> DayPlan<'a> {
    pub fn for_date(
        weekly: &[AvailabilityWindow],
        exceptions: &'a BTreeMap<NaiveDate, DateException>,
        date: NaiveDate,
    ) -> Self {
        let dow = day_of_week(date);
        let recurring: Vec<TimeRange> = weekly
            .iter()
            .filter(|w| w.enabled && w.day_of_week == dow)
            .map(AvailabilityWindow::range)
            .collect();
        match exceptions.get(&date) {
            Some(exception) => DayPlan::Override { recurring, exception },
            None => DayPlan::Recurring(recurring),
        }
    }

    /// Concrete windows on the day starting at `midnight`, sorted and disjoint.
    pub fn resolve(&self, midnight: Ms) -> Vec<Span> {
        let anchor = |ranges: &[TimeRange]| -> Vec<Span> {
            let mut spans: Vec<Span> = ranges
                .iter()
                .filter(|r| r.is_valid())
                .map(|r| r.anchor(midnight))
                .collect();
            spans.sort_by_key(|s| s.start);
            spans
        };
        match self {
            DayPlan::Recurring(ranges) => anchor(ranges),
            DayPlan::Override { exception, recurring } => match exception {
                DateException::Closed => Vec::new(),
                DateException::Hours(ranges) => anchor(ranges),
                DateException::Blocked(blocked) => {
                    let blocked = merge_overlapping(&anchor(blocked));
                    subtract_intervals(&anchor(recurring), &blocked)
                }
            },
        }
    }
}

/// A provider's bookable windows on `date`.
pub fn windows_on(ps: &ProviderState, date: NaiveDate) -> Vec<Span> {
    DayPlan::for_date(&ps.weekly, &ps.exceptions, date).resolve(day_start(date))
}

// ── Pattern validation ────────────────────────────────────────────

/// Check one day's ranges and return them sorted by start. Ranges may not
/// overlap; they are bookable hours.
pub fn validate_day_ranges(
    day_of_week: u8,
    ranges: &[TimeRange],
) -> Result<Vec<TimeRange>, EngineError> {
    let sorted = checked_sorted(day_of_week, ranges)?;
    for pair in sorted.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(EngineError::OverlappingWindows {
                day_of_week,
                first: pair[0],
                second: pair[1],
            });
        }
    }
    Ok(sorted)
}

/// Ranges taken out of a day. Overlaps are fine, they are merged when the
/// day is resolved.
pub fn validate_blocked_ranges(
    day_of_week: u8,
    ranges: &[TimeRange],
) -> Result<Vec<TimeRange>, EngineError> {
    checked_sorted(day_of_week, ranges)
}

fn checked_sorted(day_of_week: u8, ranges: &[TimeRange]) -> Result<Vec<TimeRange>, EngineError> {
    if ranges.len() > MAX_WINDOWS_PER_DAY {
        return Err(EngineError::LimitExceeded("too many windows in one day"));
    }
    for r in ranges {
        if r.start >= r.end {
            return Err(InvalidInterval {
                start: r.start as Ms,
                end: r.end as Ms,
            }
            .into());
        }
        if r.end > MINUTES_PER_DAY {
            return Err(EngineError::InvalidWindow {
                day_of_week,
                start: r.start,
                end: r.end,
            });
        }
    }
    let mut sorted = ranges.to_vec();
    sorted.sort();
    Ok(sorted)
}

/// Validate a full week. Disabled windows are dropped; the result is what
/// gets stored, sorted by (day, start).
pub(crate) fn validate_weekly(
    windows: &[AvailabilityWindow],
) -> Result<Vec<AvailabilityWindow>, EngineError> {
    let mut by_day: BTreeMap<u8, Vec<TimeRange>> = BTreeMap::new();
    for w in windows.iter().filter(|w| w.enabled) {
        if w.day_of_week > 6 {
            return Err(EngineError::InvalidWindow {
                day_of_week: w.day_of_week,
                start: w.start,
                end: w.end,
            });
        }
        by_day.entry(w.day_of_week).or_default().push(w.range());
    }

    let mut saved = Vec::new();
    for (day, ranges) in by_day {
        for range in validate_day_ranges(day, &ranges)? {
            saved.push(AvailabilityWindow::new(day, range));
        }
    }
    Ok(saved)
}

// ── Interval set algebra ──────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(Span::new(current_start, b.end));
        }
    }

    result
}
