//! Operating-hours and shift-window evaluation
//!
//! Queues carry a `timings` rule string and agents a `shiftTimings` rule
//! string; both use the same small language:
//!
//! - `24/7` (case-insensitive) admits every instant.
//! - Otherwise the string is a `|`-separated list of rules, each of the form
//!   `<time-ranges>;<day-spec>`. Any rule admitting the instant admits the
//!   whole string.
//! - `<time-ranges>` is a comma-separated list of `HH:MM-HH:MM` ranges on the
//!   24-hour clock. Start minutes are inclusive, end minutes exclusive; an
//!   end of `00:00` (or `24:00`) with a nonzero start means end of day.
//! - `<day-spec>` is a comma-separated list of day names (`Mon`) or inclusive
//!   ranges (`Mon-Fri`) over `Sun,Mon,Tue,Wed,Thu,Fri,Sat`; a range with
//!   start after end wraps across the week boundary.
//!
//! A range with start after end on a single day is inactive; overnight hours
//! are expressed as two per-day rules, e.g. `22:00-24:00;Mon|00:00-02:00;Tue`.
//! Malformed pieces are skipped with a warning, and an empty string admits
//! nothing.

use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::{debug, warn};

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Current wall-clock time in the server's local timezone.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Returns true when `at` falls inside the set admitted by `rules`.
pub fn admits(rules: &str, at: NaiveDateTime) -> bool {
    let rules = rules.trim();
    if rules.is_empty() {
        return false;
    }
    if rules.eq_ignore_ascii_case("24/7") {
        return true;
    }

    let weekday = at.weekday().num_days_from_sunday() as u8;
    let minute = at.hour() * 60 + at.minute();
    rules.split('|').any(|rule| rule_admits(rule, weekday, minute))
}

fn rule_admits(rule: &str, weekday: u8, minute: u32) -> bool {
    let Some((times, days)) = rule.split_once(';') else {
        warn!("Skipping malformed timing rule (no day spec): {:?}", rule);
        return false;
    };
    if !day_spec_matches(days, weekday) {
        return false;
    }
    times.split(',').any(|range| time_range_contains(range, minute))
}

fn day_spec_matches(spec: &str, weekday: u8) -> bool {
    spec.split(',').any(|segment| {
        let segment = segment.trim();
        match segment.split_once('-') {
            None => day_index(segment) == Some(weekday),
            Some((start, end)) => match (day_index(start), day_index(end)) {
                (Some(start), Some(end)) if start <= end => (start..=end).contains(&weekday),
                // Fri-Mon wraps across the week boundary
                (Some(start), Some(end)) => weekday >= start || weekday <= end,
                _ => false,
            },
        }
    })
}

fn day_index(name: &str) -> Option<u8> {
    let name = name.trim();
    let index = DAY_NAMES
        .iter()
        .position(|day| day.eq_ignore_ascii_case(name));
    if index.is_none() {
        warn!("Skipping unknown day name in timing rule: {:?}", name);
    }
    index.map(|i| i as u8)
}

fn time_range_contains(range: &str, minute: u32) -> bool {
    let Some((start, end)) = range.split_once('-') else {
        warn!("Skipping malformed time range in timing rule: {:?}", range);
        return false;
    };
    let (Some(start), Some(end)) = (parse_minute(start), parse_minute(end)) else {
        return false;
    };
    // 00:00 as an end with a nonzero start means end of day
    let end = if end == 0 && start != 0 { MINUTES_PER_DAY } else { end };
    if start > end {
        // Overnight within one day is not representable; see module docs.
        debug!("Inactive inverted time range in timing rule: {:?}", range);
        return false;
    }
    minute >= start && minute < end
}

fn parse_minute(text: &str) -> Option<u32> {
    let text = text.trim();
    let parsed = (|| {
        let (hours, minutes) = text.split_once(':')?;
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        if minutes > 59 || hours > 24 || (hours == 24 && minutes != 0) {
            return None;
        }
        Some(hours * 60 + minutes)
    })();
    if parsed.is_none() {
        warn!("Skipping unparsable time in timing rule: {:?}", text);
    }
    parsed
}
