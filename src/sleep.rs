/// Wake-time calculator
/// Counts whole 90-minute sleep cycles forward from "now", after a fixed
/// allowance for falling asleep, and renders each candidate in the caller's offset

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::offset::UtcOffset;

pub const CYCLE_LENGTH_MINUTES: u32 = 90;
pub const ONSET_LATENCY_MINUTES: u32 = 15;

/// Cycle counts to evaluate, longest sleep first. Callers index by position.
pub const CYCLES_TO_RETURN: [u32; 5] = [7, 6, 5, 4, 3];

/// Furthest any option lands from "now" (7 cycles + onset)
pub const MAX_MINUTES_FROM_NOW: u32 = ONSET_LATENCY_MINUTES + 7 * CYCLE_LENGTH_MINUTES;

/// One candidate wake-up time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeTimeOption {
    /// Offset-qualified wall-clock time, minute precision: "2026-01-26T06:28-06:00"
    pub iso: String,
    /// 12-hour wall-clock time: "6:28 AM"
    pub local: String,
    pub minutes_from_now: u32,
    pub total_sleep_minutes: u32,
    pub cycles: u32,
    /// "6:28 AM (7h 30m, 5 cycles)"
    pub label: String,
}

/// Calculate wake times for each entry of CYCLES_TO_RETURN, preserving its order
pub fn calculate_wake_times(now: DateTime<Utc>, offset: &UtcOffset) -> [WakeTimeOption; 5] {
    CYCLES_TO_RETURN.map(|cycles| wake_time_for_cycles(now, offset, cycles))
}

fn wake_time_for_cycles(now: DateTime<Utc>, offset: &UtcOffset, cycles: u32) -> WakeTimeOption {
    let total_sleep_minutes = cycles * CYCLE_LENGTH_MINUTES;
    let minutes_from_now = ONSET_LATENCY_MINUTES + total_sleep_minutes;

    // Validated instants always have this much headroom
    let wake_time = now
        .checked_add_signed(Duration::minutes(i64::from(minutes_from_now)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let iso = format_with_offset(wake_time, offset);
    let local = format_local_time(wake_time, offset);
    let label = format_label(&local, total_sleep_minutes, cycles);

    WakeTimeOption {
        iso,
        local,
        minutes_from_now,
        total_sleep_minutes,
        cycles,
        label,
    }
}

/// Format as `YYYY-MM-DDTHH:MM±HH:MM`.
/// The fields are the wall clock in `offset`, not UTC fields with a new suffix.
pub fn format_with_offset(date: DateTime<Utc>, offset: &UtcOffset) -> String {
    let local = wall_clock(date, offset);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}{}",
        local.year(),
        local.month(),
        local.day(),
        local.hour(),
        local.minute(),
        offset
    )
}

/// Format as 12-hour time, e.g. "6:28 AM", "12:00 PM"
pub fn format_local_time(date: DateTime<Utc>, offset: &UtcOffset) -> String {
    let local = wall_clock(date, offset);
    let (hour12, period) = to_12_hour(local.hour());

    format!("{}:{:02} {}", hour12, local.minute(), period)
}

/// Compose the human label: "{local} ({h}h {m}m, {cycles} cycles)"
pub fn format_label(local: &str, total_sleep_minutes: u32, cycles: u32) -> String {
    let hours = total_sleep_minutes / 60;
    let minutes = total_sleep_minutes % 60;
    format!("{} ({}h {}m, {} cycles)", local, hours, minutes, cycles)
}

/// Convert a 24-hour clock hour to (1-12, "AM"/"PM")
pub fn to_12_hour(hour24: u32) -> (u32, &'static str) {
    let period = if hour24 >= 12 { "PM" } else { "AM" };
    let hour12 = match hour24 {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    (hour12, period)
}

fn wall_clock(date: DateTime<Utc>, offset: &UtcOffset) -> NaiveDateTime {
    date.with_timezone(&offset.fixed()).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("test timestamp must be RFC 3339")
            .with_timezone(&Utc)
    }

    fn cst() -> UtcOffset {
        UtcOffset::parse("-06:00").unwrap()
    }

    // === calculate_wake_times tests ===

    #[test]
    fn test_returns_exactly_five_options() {
        let options = calculate_wake_times(utc("2026-01-25T22:43:00Z"), &cst());
        assert_eq!(options.len(), 5);
    }

    #[test]
    fn test_options_ordered_by_cycles_descending() {
        let options = calculate_wake_times(utc("2026-01-25T22:43:00Z"), &cst());
        let cycles: Vec<u32> = options.iter().map(|o| o.cycles).collect();
        assert_eq!(cycles, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn test_middle_option_is_five_cycles() {
        let options = calculate_wake_times(utc("2026-01-25T22:43:00Z"), &cst());
        assert_eq!(options[2].cycles, 5);
    }

    #[test]
    fn test_five_cycle_option_values() {
        // 22:43 CST = 04:43 UTC the next day
        let options = calculate_wake_times(utc("2026-01-26T04:43:00Z"), &cst());
        let five = &options[2];

        // 5 cycles = 450 minutes sleep + 15 onset
        assert_eq!(five.minutes_from_now, 465);
        assert_eq!(five.total_sleep_minutes, 450);
        assert_eq!(five.local, "6:28 AM");
        assert_eq!(five.iso, "2026-01-26T06:28-06:00");
        assert_eq!(five.label, "6:28 AM (7h 30m, 5 cycles)");
    }

    #[test]
    fn test_all_options_for_known_evening() {
        let options = calculate_wake_times(utc("2026-01-26T04:43:00Z"), &cst());
        let locals: Vec<&str> = options.iter().map(|o| o.local.as_str()).collect();
        assert_eq!(locals, vec!["9:28 AM", "7:58 AM", "6:28 AM", "4:58 AM", "3:28 AM"]);

        assert_eq!(options[0].label, "9:28 AM (10h 30m, 7 cycles)");
        assert_eq!(options[4].label, "3:28 AM (4h 30m, 3 cycles)");
    }

    #[test]
    fn test_seconds_are_truncated_not_rounded() {
        let options = calculate_wake_times(utc("2026-01-26T04:43:59.999Z"), &cst());
        assert_eq!(options[2].iso, "2026-01-26T06:28-06:00");
        assert_eq!(options[2].local, "6:28 AM");
    }

    #[test]
    fn test_wake_time_crosses_month_and_year() {
        let options = calculate_wake_times(utc("2026-12-31T23:30:00Z"), &UtcOffset::utc());
        assert_eq!(options[4].iso, "2027-01-01T04:15+00:00");
    }

    #[test]
    fn test_half_hour_offset() {
        let ist = UtcOffset::parse("+05:30").unwrap();
        let options = calculate_wake_times(utc("2026-01-25T17:13:00Z"), &ist);
        // 22:43 IST + 465 minutes
        assert_eq!(options[2].iso, "2026-01-26T06:28+05:30");
    }

    #[test]
    fn test_serializes_with_camel_case_fields() {
        let options = calculate_wake_times(utc("2026-01-26T04:43:00Z"), &cst());
        let json = serde_json::to_value(&options[2]).unwrap();
        assert_eq!(json["minutesFromNow"], 465);
        assert_eq!(json["totalSleepMinutes"], 450);
        assert_eq!(json["cycles"], 5);
        assert_eq!(json["iso"], "2026-01-26T06:28-06:00");
        assert!(json.get("minutes_from_now").is_none());
    }

    // === format_with_offset tests ===

    #[test]
    fn test_format_with_offset_has_no_seconds() {
        let result = format_with_offset(utc("2026-01-26T12:28:00Z"), &cst());
        assert_eq!(result.len(), "2026-01-26T06:28-06:00".len());
        assert!(result.ends_with("-06:00"));
    }

    #[test]
    fn test_format_with_offset_converts_fields() {
        let result = format_with_offset(utc("2026-01-26T12:28:00Z"), &cst());
        assert_eq!(result, "2026-01-26T06:28-06:00");
    }

    #[test]
    fn test_format_with_offset_previous_day() {
        let result = format_with_offset(utc("2026-03-01T02:00:00Z"), &cst());
        assert_eq!(result, "2026-02-28T20:00-06:00");
    }

    // === format_local_time tests ===

    #[test]
    fn test_format_local_time_morning() {
        assert_eq!(format_local_time(utc("2026-01-26T12:28:00Z"), &cst()), "6:28 AM");
    }

    #[test]
    fn test_format_local_time_afternoon() {
        assert_eq!(format_local_time(utc("2026-01-26T20:30:00Z"), &cst()), "2:30 PM");
    }

    #[test]
    fn test_format_local_time_midnight() {
        assert_eq!(format_local_time(utc("2026-01-26T06:00:00Z"), &cst()), "12:00 AM");
    }

    #[test]
    fn test_format_local_time_noon() {
        assert_eq!(format_local_time(utc("2026-01-26T18:00:00Z"), &cst()), "12:00 PM");
    }

    #[test]
    fn test_format_local_time_pads_minutes() {
        assert_eq!(format_local_time(utc("2026-01-26T15:05:00Z"), &cst()), "9:05 AM");
    }

    // === format_label tests ===

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("6:28 AM", 450, 5), "6:28 AM (7h 30m, 5 cycles)");
    }

    #[test]
    fn test_format_label_whole_hours() {
        assert_eq!(format_label("8:58 AM", 600, 7), "8:58 AM (10h 0m, 7 cycles)");
    }

    // === to_12_hour tests ===

    #[test]
    fn test_to_12_hour_boundaries() {
        assert_eq!(to_12_hour(0), (12, "AM"));
        assert_eq!(to_12_hour(1), (1, "AM"));
        assert_eq!(to_12_hour(11), (11, "AM"));
        assert_eq!(to_12_hour(12), (12, "PM"));
        assert_eq!(to_12_hour(13), (1, "PM"));
        assert_eq!(to_12_hour(23), (11, "PM"));
    }
}


/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// Proves: every 24-hour hour maps into 1..=12
    #[kani::proof]
    fn twelve_hour_in_range() {
        let hour: u32 = kani::any();
        kani::assume(hour < 24);
        let (hour12, _) = to_12_hour(hour);
        kani::assert(hour12 >= 1 && hour12 <= 12, "12-hour clock must be 1-12");
    }

    /// Proves: AM exactly for hours before noon
    #[kani::proof]
    fn period_matches_half_of_day() {
        let hour: u32 = kani::any();
        kani::assume(hour < 24);
        let (_, period) = to_12_hour(hour);
        kani::assert((period == "AM") == (hour < 12), "AM iff before noon");
    }

    /// Proves: label hours/minutes never overflow for the cycle counts used
    #[kani::proof]
    fn cycle_minutes_fit() {
        let cycles: u32 = kani::any();
        kani::assume(cycles <= 7);
        let total = cycles * CYCLE_LENGTH_MINUTES;
        kani::assert(total + ONSET_LATENCY_MINUTES <= MAX_MINUTES_FROM_NOW, "bounded");
    }
}
