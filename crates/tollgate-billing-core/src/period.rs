//! Billing period-end extraction
//!
//! The processor has moved the period-end timestamp between several payload
//! shapes across API revisions. This adapter encodes the fallback order in
//! one place so the state machine never touches raw payloads.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Extract the current billing period end from a raw processor object.
///
/// Fallback order:
/// 1. top-level `current_period_end`
/// 2. `items.data[0].current_period_end`
/// 3. `lines.data[0].period.end` (invoice shape)
/// 4. top-level `period_end`
pub fn extract_period_end(raw: &Value) -> Option<DateTime<Utc>> {
    let candidates = [
        raw.get("current_period_end"),
        raw.pointer("/items/data/0/current_period_end"),
        raw.pointer("/lines/data/0/period/end"),
        raw.get("period_end"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_i64)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}
