use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Half-open `[start, end)` millisecond bounds of the local calendar day containing `ms`.
///
/// Falls back to the UTC day when the local midnight does not exist (DST gaps).
#[must_use]
pub fn local_day_bounds(ms: i64) -> (i64, i64) {
    let date = local_date(ms);
    let start = local_midnight(date);
    let end = date.succ_opt().map_or(start + 86_400_000, local_midnight);
    (start, end)
}

#[must_use]
pub fn local_date(ms: i64) -> NaiveDate {
    match Local.timestamp_millis_opt(ms).earliest() {
        Some(dt) => dt.date_naive(),
        None => DateTime::<Utc>::from_timestamp_millis(ms)
            .unwrap_or_default()
            .date_naive(),
    }
}

fn local_midnight(date: NaiveDate) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => naive.and_utc().timestamp_millis(),
    }
}
