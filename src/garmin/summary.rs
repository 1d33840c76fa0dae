//! Normalised records built from raw Garmin payloads, plus aggregate stats.
//!
//! Optional values stay `None` (serialised as `null`) rather than zero, so
//! "no data" is distinguishable from a real zero.

use std::fmt;

use serde::Serialize;

use super::types::{DailySleep, RawActivity, RawHrvSummary, TrainingReadiness};

pub const METERS_PER_MILE: f64 = 1609.34;

/// Round to `digits` decimals, ties to even.
fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round_ties_even() / factor
}

/// Whole-minute pace from minutes and miles, as `M:SS`.
pub fn format_pace(duration_min: f64, distance_mi: f64) -> String {
    let pace = duration_min / distance_mi;
    let minutes = pace.trunc();
    let seconds = ((pace - minutes) * 60.0).trunc();
    format!("{}:{:02}", minutes as i64, seconds as i64)
}

/// `LOW_BALANCED` → `Low Balanced`: underscores become spaces, and each
/// letter is upper-cased after a non-letter and lower-cased otherwise.
pub fn title_case_status(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub date: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub name: String,
    pub distance_mi: f64,
    pub duration_min: f64,
    pub avg_hr: Option<i64>,
    pub max_hr: Option<i64>,
    pub calories: Option<i64>,
    pub pace: Option<String>,
}

impl Activity {
    pub fn from_raw(act: &RawActivity) -> Self {
        let activity_type = act.type_key().unwrap_or("unknown").to_string();
        let date: String = act
            .start_time_local
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(10)
            .collect();
        let distance = act.distance.unwrap_or(0.0) / METERS_PER_MILE;
        let duration = act.duration.unwrap_or(0.0) / 60.0;

        let pace = (activity_type.contains("running") && distance > 0.0)
            .then(|| format!("{}/mi", format_pace(duration, distance)));

        Self {
            date,
            name: act.activity_name.clone().unwrap_or_else(|| "Unknown".into()),
            distance_mi: round_to(distance, 2),
            duration_min: round_to(duration, 1),
            avg_hr: nonzero(act.average_hr).map(|v| v as i64),
            max_hr: nonzero(act.max_hr).map(|v| v as i64),
            calories: nonzero(act.calories).map(|v| v as i64),
            pace,
            activity_type,
        }
    }
}

/// A sum that is an integer `0` until something is added to it.
///
/// Empty totals serialise and print as `0`; once a value has been added
/// they are floats (`0.0`, `5.0`), even when the sum is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Total(Option<f64>);

impl Total {
    pub fn add(&mut self, value: f64) {
        self.0 = Some(self.0.unwrap_or(0.0) + value);
    }

    pub fn value(self) -> f64 {
        self.0.unwrap_or(0.0)
    }

    pub fn is_empty(self) -> bool {
        self.0.is_none()
    }

    fn rounded(self, digits: i32) -> Self {
        Self(self.0.map(|v| round_to(v, digits)))
    }
}

impl From<f64> for Total {
    fn from(value: f64) -> Self {
        Self(Some(value))
    }
}

impl Serialize for Total {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_u64(0),
        }
    }
}

impl fmt::Display for Total {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:?}"),
            None => f.write_str("0"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub running_miles: Total,
    pub running_time_min: Total,
    pub strength_sessions: u32,
    pub yoga_sessions: u32,
    pub total_activities: usize,
    pub total_duration_min: Total,
    pub total_calories: i64,
}

impl Stats {
    /// Type matching is by substring, so `trail_running` counts as running.
    pub fn from_activities(activities: &[RawActivity]) -> Self {
        let mut running_miles = Total::default();
        let mut running_time = Total::default();
        let mut strength_sessions = 0;
        let mut yoga_sessions = 0;
        let mut total_calories = 0.0;
        let mut total_duration = Total::default();

        for act in activities {
            let act_type = act.type_key().unwrap_or("");
            let distance = act.distance.unwrap_or(0.0) / METERS_PER_MILE;
            let duration = act.duration.unwrap_or(0.0) / 60.0;

            total_duration.add(duration);
            total_calories += act.calories.unwrap_or(0.0);

            if act_type.contains("running") {
                running_miles.add(distance);
                running_time.add(duration);
            }
            if act_type.contains("strength") {
                strength_sessions += 1;
            }
            if act_type.contains("yoga") {
                yoga_sessions += 1;
            }
        }

        Self {
            running_miles: running_miles.rounded(1),
            running_time_min: running_time.rounded(0),
            strength_sessions,
            yoga_sessions,
            total_activities: activities.len(),
            total_duration_min: total_duration.rounded(0),
            total_calories: total_calories as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSummary {
    pub date: String,
    pub sleep_time_seconds: Option<i64>,
    pub deep_sleep_seconds: Option<i64>,
    pub light_sleep_seconds: Option<i64>,
    pub rem_sleep_seconds: Option<i64>,
    pub awake_sleep_seconds: Option<i64>,
    pub sleep_start_timestamp_local: Option<i64>,
    pub sleep_end_timestamp_local: Option<i64>,
}

impl SleepSummary {
    pub fn new(date: String, sleep: &DailySleep) -> Self {
        Self {
            date,
            sleep_time_seconds: sleep.sleep_time_seconds,
            deep_sleep_seconds: sleep.deep_sleep_seconds,
            light_sleep_seconds: sleep.light_sleep_seconds,
            rem_sleep_seconds: sleep.rem_sleep_seconds,
            awake_sleep_seconds: sleep.awake_sleep_seconds,
            sleep_start_timestamp_local: sleep.sleep_start_timestamp_local,
            sleep_end_timestamp_local: sleep.sleep_end_timestamp_local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvBaseline {
    pub balanced_low: Option<i64>,
    pub balanced_upper: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvSummary {
    pub date: String,
    pub weekly_avg: Option<i64>,
    pub last_night_avg: Option<i64>,
    pub status: String,
    pub baseline: Option<HrvBaseline>,
}

/// Half-to-even integer rounding; zero and missing both become `None`.
fn round_metric(value: Option<f64>) -> Option<i64> {
    nonzero(value).map(|v| v.round_ties_even() as i64)
}

impl HrvSummary {
    pub fn new(date: String, raw: &RawHrvSummary) -> Self {
        let baseline = raw
            .baseline
            .as_ref()
            .filter(|b| !b.is_empty())
            .map(|b| HrvBaseline {
                balanced_low: round_metric(b.balanced_low),
                balanced_upper: round_metric(b.balanced_upper),
            });

        Self {
            date,
            weekly_avg: round_metric(raw.weekly_avg),
            last_night_avg: round_metric(raw.last_night_avg),
            status: title_case_status(raw.status.as_deref().unwrap_or("Unknown")),
            baseline,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recovery {
    pub score: Option<i64>,
    pub level: Option<String>,
    pub body_battery: Option<i64>,
    pub sleep_score: Option<i64>,
    pub hrv_weekly_average: Option<i64>,
}

impl Recovery {
    /// Readiness fields are taken as a group from one day's entry.
    pub fn apply_readiness(&mut self, tr: &TrainingReadiness) {
        self.score = tr.score;
        self.level = tr.level.clone();
        self.sleep_score = tr.sleep_score;
        self.hrv_weekly_average = tr.hrv_weekly_average;
    }
}

/// The full document printed by `garmin-sync`. Every key is always
/// present; absent sections serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub user: Option<String>,
    pub period_days: u32,
    pub recovery: Recovery,
    #[serde(rename = "restingHR")]
    pub resting_hr: Option<i64>,
    pub hrv: Option<HrvSummary>,
    pub sleep: Option<SleepSummary>,
    pub stats: Stats,
    pub activities: Vec<Activity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garmin::types::ActivityType;
    use pretty_assertions::assert_eq;

    fn activity(type_key: &str, miles: f64, minutes: f64) -> RawActivity {
        RawActivity {
            activity_name: Some(format!("{type_key} session")),
            activity_type: Some(ActivityType {
                type_key: Some(type_key.into()),
            }),
            start_time_local: Some("2024-01-15 07:00:00".into()),
            distance: Some(miles * METERS_PER_MILE),
            duration: Some(minutes * 60.0),
            average_hr: None,
            max_hr: None,
            calories: None,
        }
    }

    #[test]
    fn pace_is_minutes_and_seconds_per_mile() {
        assert_eq!(format_pace(30.0, 5.0), "6:00");
        assert_eq!(format_pace(32.5, 4.0), "8:07");
    }

    #[test]
    fn running_activity_gets_pace() {
        let act = Activity::from_raw(&activity("running", 5.0, 30.0));
        assert_eq!(act.pace.as_deref(), Some("6:00/mi"));
        assert_eq!(act.distance_mi, 5.0);
        assert_eq!(act.duration_min, 30.0);
        assert_eq!(act.date, "2024-01-15");
    }

    #[test]
    fn no_pace_without_distance_or_for_other_types() {
        assert_eq!(Activity::from_raw(&activity("running", 0.0, 30.0)).pace, None);
        assert_eq!(Activity::from_raw(&activity("cycling", 10.0, 30.0)).pace, None);
    }

    #[test]
    fn missing_fields_default_sensibly() {
        let act = Activity::from_raw(&RawActivity::default());
        assert_eq!(act.name, "Unknown");
        assert_eq!(act.activity_type, "unknown");
        assert_eq!(act.date, "");
        assert_eq!(act.distance_mi, 0.0);
        assert_eq!(act.avg_hr, None);
        assert_eq!(act.calories, None);
    }

    #[test]
    fn heart_rate_and_calories_truncate() {
        let mut raw = activity("strength_training", 0.0, 45.0);
        raw.average_hr = Some(121.9);
        raw.max_hr = Some(160.0);
        raw.calories = Some(0.0);
        let act = Activity::from_raw(&raw);
        assert_eq!(act.avg_hr, Some(121));
        assert_eq!(act.max_hr, Some(160));
        assert_eq!(act.calories, None);
    }

    #[test]
    fn stats_match_by_substring() {
        let stats = Stats::from_activities(&[
            activity("running", 3.0, 25.0),
            activity("trail_running", 2.0, 20.0),
            activity("strength_training", 0.0, 40.0),
        ]);
        assert_eq!(stats.running_miles, Total::from(5.0));
        assert_eq!(stats.running_time_min, Total::from(45.0));
        assert_eq!(stats.strength_sessions, 1);
        assert_eq!(stats.yoga_sessions, 0);
        assert_eq!(stats.total_activities, 3);
        assert_eq!(stats.total_duration_min, Total::from(85.0));
    }

    #[test]
    fn untouched_totals_stay_integer_zero() {
        let stats = Stats::from_activities(&[activity("yoga", 0.0, 30.0)]);
        assert!(stats.running_miles.is_empty());
        assert_eq!(stats.running_miles.to_string(), "0");
        assert_eq!(stats.total_duration_min.to_string(), "30.0");

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["running_miles"], serde_json::json!(0));
        assert!(value["running_miles"].is_u64());
        assert!(value["running_time_min"].is_u64());
        assert!(value["total_duration_min"].is_f64());

        let empty = serde_json::to_value(Stats::from_activities(&[])).unwrap();
        assert!(empty["total_duration_min"].is_u64());
    }

    #[test]
    fn a_zero_mile_run_is_a_float_total() {
        let stats = Stats::from_activities(&[activity("treadmill_running", 0.0, 20.0)]);
        assert_eq!(stats.running_miles.to_string(), "0.0");
        assert!(serde_json::to_value(&stats).unwrap()["running_miles"].is_f64());
    }

    #[test]
    fn status_is_title_cased() {
        assert_eq!(title_case_status("LOW_BALANCED"), "Low Balanced");
        assert_eq!(title_case_status("BALANCED"), "Balanced");
        assert_eq!(title_case_status("Unknown"), "Unknown");
    }

    #[test]
    fn hrv_rounds_half_to_even_and_drops_zero() {
        let raw: RawHrvSummary = serde_json::from_str(
            r#"{"weeklyAvg": 42.5, "lastNightAvg": 0, "status": "UNBALANCED",
                "baseline": {"balancedLow": 38.6, "balancedUpper": 51.5}}"#,
        )
        .unwrap();
        let hrv = HrvSummary::new("2024-01-15".into(), &raw);
        assert_eq!(
            hrv,
            HrvSummary {
                date: "2024-01-15".into(),
                weekly_avg: Some(42),
                last_night_avg: None,
                status: "Unbalanced".into(),
                baseline: Some(HrvBaseline {
                    balanced_low: Some(39),
                    balanced_upper: Some(52),
                }),
            }
        );
    }

    #[test]
    fn empty_hrv_baseline_is_null() {
        let raw: RawHrvSummary = serde_json::from_str(r#"{"weeklyAvg": 50, "baseline": {}}"#).unwrap();
        assert_eq!(HrvSummary::new("d".into(), &raw).baseline, None);
    }

    #[test]
    fn report_serialises_every_key() {
        let report = SyncReport {
            user: None,
            period_days: 7,
            recovery: Recovery::default(),
            resting_hr: None,
            hrv: None,
            sleep: None,
            stats: Stats::default(),
            activities: Vec::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        let obj = value.as_object().unwrap();
        for key in ["user", "period_days", "recovery", "restingHR", "hrv", "sleep", "stats", "activities"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(obj["hrv"].is_null());
        assert!(obj["recovery"]["bodyBattery"].is_null());
    }
}
