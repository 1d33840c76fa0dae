//! Garmin Connect payload shapes.
//!
//! Only the fields the aggregator reads are modelled. Every field is
//! optional because Garmin omits or nulls them freely.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    pub activity_name: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub start_time_local: Option<String>,
    /// Meters.
    pub distance: Option<f64>,
    /// Seconds.
    pub duration: Option<f64>,
    #[serde(rename = "averageHR")]
    pub average_hr: Option<f64>,
    #[serde(rename = "maxHR")]
    pub max_hr: Option<f64>,
    pub calories: Option<f64>,
}

impl RawActivity {
    pub fn type_key(&self) -> Option<&str> {
        self.activity_type.as_ref()?.type_key.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    pub type_key: Option<String>,
}

/// `dailySleepData` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SleepResponse {
    #[serde(rename = "dailySleepDTO")]
    pub daily_sleep: Option<DailySleep>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySleep {
    pub sleep_time_seconds: Option<i64>,
    pub deep_sleep_seconds: Option<i64>,
    pub light_sleep_seconds: Option<i64>,
    pub rem_sleep_seconds: Option<i64>,
    pub awake_sleep_seconds: Option<i64>,
    pub sleep_start_timestamp_local: Option<i64>,
    pub sleep_end_timestamp_local: Option<i64>,
}

impl DailySleep {
    /// A night counts only when some sleep time was recorded.
    pub fn has_sleep(&self) -> bool {
        self.sleep_time_seconds.is_some_and(|s| s != 0)
    }
}

/// `hrv-service` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvResponse {
    pub hrv_summary: Option<RawHrvSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHrvSummary {
    pub weekly_avg: Option<f64>,
    pub last_night_avg: Option<f64>,
    pub status: Option<String>,
    pub baseline: Option<RawHrvBaseline>,
    /// Fields we don't read still make the summary non-empty.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl RawHrvSummary {
    pub fn is_empty(&self) -> bool {
        self.weekly_avg.is_none()
            && self.last_night_avg.is_none()
            && self.status.is_none()
            && self.baseline.is_none()
            && self.other.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHrvBaseline {
    pub balanced_low: Option<f64>,
    pub balanced_upper: Option<f64>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl RawHrvBaseline {
    pub fn is_empty(&self) -> bool {
        self.balanced_low.is_none() && self.balanced_upper.is_none() && self.other.is_empty()
    }
}

/// `usersummary-service` daily summary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub resting_heart_rate: Option<i64>,
    pub body_battery_most_recent_value: Option<i64>,
}

/// One training readiness entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReadiness {
    pub score: Option<i64>,
    pub level: Option<String>,
    pub sleep_score: Option<i64>,
    pub hrv_weekly_average: Option<i64>,
    pub input_context: Option<String>,
}

/// `userprofile-service/socialProfile`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    pub display_name: Option<String>,
    pub full_name: Option<String>,
}
