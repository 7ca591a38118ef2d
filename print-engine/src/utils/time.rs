//! Time helpers
//!
//! Everything persisted uses `i64` Unix millis; conversion to a business
//! timezone only happens when rendering.

use chrono_tz::Tz;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Format Unix millis in the given timezone, `None` when out of range
pub fn format_millis(ts: i64, tz: Tz, pattern: &str) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.with_timezone(&tz).format(pattern).to_string())
}
