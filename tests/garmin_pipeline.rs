use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use pai_tools::garmin::report::{render_json, render_text};
use pai_tools::garmin::summary::Total;
use pai_tools::garmin::sync::{self, fetch_recovery, RECOVERY_WINDOW_DAYS};
use pai_tools::garmin::types::{
    HrvResponse, RawActivity, SleepResponse, TrainingReadiness, UserSummary,
};
use pai_tools::garmin::{GarminApi, GarminError};
use pretty_assertions::assert_eq;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
}

fn ymd_ago(offset: i64) -> String {
    (today() - Duration::days(offset)).format("%Y-%m-%d").to_string()
}

fn parse<T: DeserializeOwned>(value: &Value) -> T {
    serde_json::from_value(value.clone()).unwrap()
}

fn server_error(what: &str) -> GarminError {
    GarminError::Status {
        status: 500,
        url: what.to_string(),
    }
}

/// In-memory Garmin keyed by day offset from `today()`.
#[derive(Default)]
struct FakeGarmin {
    full_name: Option<String>,
    activities: Vec<Value>,
    activities_fail: bool,
    sleep: HashMap<i64, Value>,
    hrv: HashMap<i64, Value>,
    hrv_fail: HashSet<i64>,
    summaries: HashMap<i64, Value>,
    readiness: HashMap<i64, Value>,
    /// Days whose sleep, summary and readiness calls all error.
    failing_days: HashSet<i64>,
    calls: Mutex<Vec<String>>,
}

impl FakeGarmin {
    fn offset(&self, date: NaiveDate, call: &str) -> i64 {
        let offset = (today() - date).num_days();
        self.calls.lock().unwrap().push(format!("{call}:{offset}"));
        offset
    }

    fn count(&self, call: &str) -> usize {
        let prefix = format!("{call}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn lookup<T: DeserializeOwned>(
        &self,
        table: &HashMap<i64, Value>,
        date: NaiveDate,
        call: &str,
    ) -> Result<Option<T>, GarminError> {
        let offset = self.offset(date, call);
        if self.failing_days.contains(&offset) {
            return Err(server_error(call));
        }
        Ok(table.get(&offset).map(parse))
    }
}

#[async_trait]
impl GarminApi for FakeGarmin {
    async fn full_name(&self) -> Result<Option<String>, GarminError> {
        Ok(self.full_name.clone())
    }

    async fn activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivity>, GarminError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("activities:{start}..{end}"));
        if self.activities_fail {
            return Err(server_error("activities"));
        }
        Ok(self.activities.iter().map(parse).collect())
    }

    async fn sleep_data(&self, date: NaiveDate) -> Result<Option<SleepResponse>, GarminError> {
        self.lookup(&self.sleep, date, "sleep")
    }

    async fn hrv_data(&self, date: NaiveDate) -> Result<Option<HrvResponse>, GarminError> {
        let offset = self.offset(date, "hrv");
        if self.hrv_fail.contains(&offset) {
            return Err(server_error("hrv"));
        }
        Ok(self.hrv.get(&offset).map(parse))
    }

    async fn user_summary(&self, date: NaiveDate) -> Result<Option<UserSummary>, GarminError> {
        self.lookup(&self.summaries, date, "summary")
    }

    async fn morning_training_readiness(
        &self,
        date: NaiveDate,
    ) -> Result<Option<TrainingReadiness>, GarminError> {
        self.lookup(&self.readiness, date, "readiness")
    }
}

fn sleep_night(seconds: i64) -> Value {
    json!({"dailySleepDTO": {
        "sleepTimeSeconds": seconds,
        "deepSleepSeconds": 3600,
        "lightSleepSeconds": 14400,
        "remSleepSeconds": 5400,
        "awakeSleepSeconds": 900,
        "sleepStartTimestampLocal": 1710021600000_i64,
        "sleepEndTimestampLocal": 1710050400000_i64
    }})
}

#[tokio::test]
async fn activities_cover_the_requested_window() {
    let api = FakeGarmin {
        activities: vec![
            json!({
                "activityName": "Morning Run",
                "activityType": {"typeKey": "running"},
                "startTimeLocal": "2024-03-09 07:00:00",
                "distance": 8046.7,
                "duration": 2400.0,
                "averageHR": 150.0,
                "maxHR": 172.0,
                "calories": 600.0
            }),
            json!({
                "activityName": "Lift",
                "activityType": {"typeKey": "strength_training"},
                "startTimeLocal": "2024-03-08 18:00:00",
                "duration": 1800.0
            }),
        ],
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 5).await.unwrap();

    assert_eq!(
        api.calls.lock().unwrap()[0],
        "activities:2024-03-05..2024-03-10"
    );
    assert_eq!(report.period_days, 5);
    assert_eq!(report.activities.len(), 2);
    assert_eq!(report.activities[0].date, "2024-03-09");
    assert_eq!(report.activities[0].distance_mi, 5.0);
    assert_eq!(report.activities[0].pace.as_deref(), Some("8:00/mi"));
    assert_eq!(report.activities[1].pace, None);
    assert_eq!(report.stats.running_miles, Total::from(5.0));
    assert_eq!(report.stats.running_time_min, Total::from(40.0));
    assert_eq!(report.stats.strength_sessions, 1);
    assert_eq!(report.stats.yoga_sessions, 0);
    assert_eq!(report.stats.total_activities, 2);
    assert_eq!(report.stats.total_duration_min, Total::from(70.0));
    assert_eq!(report.stats.total_calories, 600);
}

#[tokio::test]
async fn activity_failure_is_fatal() {
    let api = FakeGarmin {
        activities_fail: true,
        ..FakeGarmin::default()
    };
    assert!(matches!(
        sync::collect(&api, today(), 7).await,
        Err(GarminError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn sleep_is_most_recent_night_with_sleep_time() {
    let api = FakeGarmin {
        sleep: HashMap::from([
            (0, sleep_night(0)),
            (2, sleep_night(27000)),
            (3, sleep_night(25000)),
        ]),
        failing_days: HashSet::from([1]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 7).await.unwrap();
    let sleep = report.sleep.expect("a night with sleep");
    assert_eq!(sleep.date, ymd_ago(2));
    assert_eq!(sleep.sleep_time_seconds, Some(27000));
    assert_eq!(sleep.rem_sleep_seconds, Some(5400));
    assert_eq!(api.count("sleep"), 7);
}

#[tokio::test]
async fn no_sleep_anywhere_is_null() {
    let api = FakeGarmin::default();
    let report = sync::collect(&api, today(), 3).await.unwrap();
    assert_eq!(report.sleep, None);
    assert_eq!(api.count("sleep"), 3);
}

#[tokio::test]
async fn hrv_takes_first_non_empty_summary() {
    let api = FakeGarmin {
        hrv: HashMap::from([
            (1, json!({"hrvSummary": {}})),
            (4, json!({"hrvSummary": {
                "weeklyAvg": 47.5,
                "lastNightAvg": 52.5,
                "status": "UNBALANCED",
                "baseline": {"balancedLow": 41.0, "balancedUpper": 58.0}
            }})),
            (5, json!({"hrvSummary": {"weeklyAvg": 60.0, "status": "BALANCED"}})),
        ]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 7).await.unwrap();
    let hrv = report.hrv.expect("hrv found");
    assert_eq!(hrv.date, ymd_ago(4));
    assert_eq!(hrv.weekly_avg, Some(48));
    assert_eq!(hrv.last_night_avg, Some(52));
    assert_eq!(hrv.status, "Unbalanced");
    let baseline = hrv.baseline.expect("baseline");
    assert_eq!(baseline.balanced_low, Some(41));
    assert_eq!(baseline.balanced_upper, Some(58));
    assert_eq!(api.count("hrv"), 5);
}

#[tokio::test]
async fn hrv_error_abandons_the_scan() {
    let api = FakeGarmin {
        hrv: HashMap::from([(3, json!({"hrvSummary": {"weeklyAvg": 50.0}}))]),
        hrv_fail: HashSet::from([1]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 7).await.unwrap();
    assert!(report.hrv.is_none());
    assert_eq!(api.count("hrv"), 2);
}

#[tokio::test]
async fn hrv_window_follows_days() {
    let api = FakeGarmin {
        hrv: HashMap::from([(4, json!({"hrvSummary": {"weeklyAvg": 50.0}}))]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 3).await.unwrap();
    assert!(report.hrv.is_none());
    assert_eq!(api.count("hrv"), 3);

    let report = sync::collect(&api, today(), 5).await.unwrap();
    assert_eq!(report.hrv.map(|h| h.weekly_avg), Some(Some(50)));
}

#[tokio::test]
async fn recovery_stops_once_score_and_resting_hr_are_known() {
    let api = FakeGarmin {
        summaries: HashMap::from([
            (1, json!({"restingHeartRate": 0, "bodyBatteryMostRecentValue": null})),
            (2, json!({"restingHeartRate": 52, "bodyBatteryMostRecentValue": 64})),
            (3, json!({"restingHeartRate": 60, "bodyBatteryMostRecentValue": 20})),
        ]),
        readiness: HashMap::from([(
            1,
            json!({"score": 71, "level": "MODERATE", "sleepScore": 80, "hrvWeeklyAverage": 49}),
        )]),
        failing_days: HashSet::from([0]),
        ..FakeGarmin::default()
    };

    let (recovery, resting_hr) = fetch_recovery(&api, today()).await;

    assert_eq!(resting_hr, Some(52));
    assert_eq!(recovery.score, Some(71));
    assert_eq!(recovery.level.as_deref(), Some("MODERATE"));
    assert_eq!(recovery.sleep_score, Some(80));
    assert_eq!(recovery.hrv_weekly_average, Some(49));
    assert_eq!(recovery.body_battery, Some(64));

    // Days 0, 1, 2 for summaries; readiness stops being asked once scored.
    assert_eq!(api.count("summary"), 3);
    assert_eq!(api.count("readiness"), 2);
}

#[tokio::test]
async fn recovery_window_is_fixed() {
    let api = FakeGarmin {
        summaries: HashMap::from([(6, json!({"restingHeartRate": 58}))]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 2).await.unwrap();
    assert_eq!(report.resting_hr, Some(58));
    assert_eq!(report.recovery.score, None);
    assert_eq!(api.count("summary"), RECOVERY_WINDOW_DAYS as usize);
    assert_eq!(api.count("readiness"), RECOVERY_WINDOW_DAYS as usize);
}

#[tokio::test]
async fn json_keeps_every_field_when_empty() {
    let api = FakeGarmin::default();
    let report = sync::collect(&api, today(), 7).await.unwrap();
    let doc = serde_json::to_value(&report).unwrap();

    assert_eq!(
        doc,
        json!({
            "user": null,
            "period_days": 7,
            "recovery": {
                "score": null,
                "level": null,
                "bodyBattery": null,
                "sleepScore": null,
                "hrvWeeklyAverage": null
            },
            "restingHR": null,
            "hrv": null,
            "sleep": null,
            "stats": {
                "running_miles": 0,
                "running_time_min": 0,
                "strength_sessions": 0,
                "yoga_sessions": 0,
                "total_activities": 0,
                "total_duration_min": 0,
                "total_calories": 0
            },
            "activities": []
        })
    );
    assert!(render_json(&report).unwrap().contains("\"running_miles\": 0,\n"));
}

#[tokio::test]
async fn text_report_follows_available_data() {
    let api = FakeGarmin {
        full_name: Some("Pat Runner".into()),
        sleep: HashMap::from([(0, sleep_night(27000))]),
        summaries: HashMap::from([(0, json!({"restingHeartRate": 50}))]),
        ..FakeGarmin::default()
    };

    let report = sync::collect(&api, today(), 7).await.unwrap();
    let text = render_text(&report);

    assert!(text.contains("GARMIN DATA: Pat Runner (Last 7 days)"));
    assert!(text.contains("SLEEP (last night):\n  Total: 7.5 hrs\n"));
    assert!(text.contains("RECOVERY:\n  Resting HR: 50 bpm\n"));
    assert!(!text.contains("Training Readiness"));
    assert!(!text.contains("HRV STATUS"));
    assert!(text.contains("ACTIVITY SUMMARY:"));
    assert!(!text.contains("ACTIVITIES:"));
}
