//! Schedule matcher.
//!
//! Answers "which schedule item, if any, owns the output right now" from
//! the local minute-of-day, the weekday and the overlap policy.  Holds no
//! state of its own.
//!
//! ```text
//!   start < end            start > end (crosses midnight)
//!   ──────────────         ─────────────────────────────────
//!   0    [s ──── e)  1440  0 ── e)          [s ────────── 1440
//!        today's bit        yesterday's bit  today's bit
//! ```
//!
//! `start == end` never matches.

use serde::{Deserialize, Serialize};

use crate::model::{SchedulePeriod, ScheduleItem, Weekday};

/// How simultaneous matches are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Scan everything; the largest schedule number wins, ties go to the first found.
    #[default]
    HighestNumberWins,
    /// Return the first enabled match.  Only correct when the list is
    /// sorted by descending schedule number.
    FirstMatch,
}

/// Does `period` cover `minute` (0..1440) on `today`?
pub fn period_matches(period: &SchedulePeriod, today: Weekday, minute: u16) -> bool {
    let start = period.start.minutes();
    let end = period.end.minutes();

    if start == end {
        return false;
    }
    if start < end {
        return (start..end).contains(&minute) && period.days.contains(today);
    }

    // Crosses midnight: the evening half belongs to today, the early
    // morning half to the day the window started on.
    if minute >= start {
        period.days.contains(today)
    } else if minute < end {
        period.days.contains(today.previous())
    } else {
        false
    }
}

/// Index of the schedule that is active at (`today`, `minute`), if any.
pub fn find_active(
    schedules: &[ScheduleItem],
    today: Weekday,
    minute: u16,
    policy: OverlapPolicy,
) -> Option<usize> {
    let mut candidates = schedules
        .iter()
        .enumerate()
        .filter(|(_, s)| s.enabled && period_matches(&s.period, today, minute));

    match policy {
        OverlapPolicy::FirstMatch => candidates.next().map(|(i, _)| i),
        OverlapPolicy::HighestNumberWins => candidates
            .fold(None::<(usize, u16)>, |best, (i, s)| match best {
                Some((_, no)) if s.sch_no <= no => best,
                _ => Some((i, s.sch_no)),
            })
            .map(|(i, _)| i),
    }
}
