use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Screen time and input counts for some span of time, a day, an hour, a month, or everything.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub screen_time_seconds: f64,
    pub mouse_clicks: u64,
    pub keystrokes: u64,
}

impl Totals {
    pub fn is_active(&self) -> bool {
        self.screen_time_seconds > 0.
    }
}

/// One row of `daily_stats`. Gap-filled queries return zeroed rows for days that were never
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppStat {
    pub app_name: String,
    pub duration_seconds: f64,
}

/// Everything a single tick contributes. Sent from the sampler to the store writer.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub date: NaiveDate,
    pub hour: u32,
    pub screen_time_delta: f64,
    pub clicks: u64,
    pub keystrokes: u64,
    pub app: Option<String>,
    pub app_delta: f64,
    pub per_key: HashMap<String, u64>,
}

impl TickEvent {
    /// True when applying the tick would not change any table.
    pub fn is_noop(&self) -> bool {
        self.screen_time_delta == 0.
            && self.clicks == 0
            && self.keystrokes == 0
            && (self.app.is_none() || self.app_delta == 0.)
            && self.per_key.values().all(|count| *count == 0)
    }
}
