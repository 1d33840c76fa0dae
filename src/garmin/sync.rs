//! The fetch pipeline: one activity query, then best-effort per-day scans
//! for sleep, HRV and recovery.
//!
//! Per-day failures are absorbed (that day simply contributes nothing).
//! Only login, the activity query and the profile lookup are fatal.

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use super::summary::{Activity, HrvSummary, Recovery, SleepSummary, Stats, SyncReport};
use super::types::{DailySleep, RawActivity};
use super::{GarminApi, GarminError};

/// Recovery data is searched over a fixed window, independent of `--days`.
pub const RECOVERY_WINDOW_DAYS: u32 = 7;

fn days_ago(today: NaiveDate, offset: u32) -> NaiveDate {
    today - Duration::days(i64::from(offset))
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A night with recorded sleep, keyed by the date Garmin files it under.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepNight {
    pub date: NaiveDate,
    pub sleep: DailySleep,
}

pub async fn fetch_activities<A: GarminApi + ?Sized>(
    api: &A,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<RawActivity>, GarminError> {
    api.activities_by_date(days_ago(today, days), today).await
}

/// Nights with non-zero sleep time, today first. Last night's sleep is
/// filed under today's date, so the scan starts at offset 0.
pub async fn fetch_sleep<A: GarminApi + ?Sized>(api: &A, today: NaiveDate, days: u32) -> Vec<SleepNight> {
    let mut nights = Vec::new();

    for offset in 0..days {
        let date = days_ago(today, offset);
        match api.sleep_data(date).await {
            Ok(Some(resp)) => {
                if let Some(sleep) = resp.daily_sleep.filter(DailySleep::has_sleep) {
                    nights.push(SleepNight { date, sleep });
                }
            }
            Ok(None) => {}
            Err(e) => debug!("No sleep data for {date}: {e}"),
        }
    }

    nights
}

/// Most recent day with a non-empty HRV summary within the `days` window.
/// Any fetch error abandons the whole scan with a warning.
pub async fn fetch_hrv<A: GarminApi + ?Sized>(api: &A, today: NaiveDate, days: u32) -> Option<HrvSummary> {
    match scan_hrv(api, today, days).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Warning: Could not fetch HRV data: {e}");
            None
        }
    }
}

async fn scan_hrv<A: GarminApi + ?Sized>(
    api: &A,
    today: NaiveDate,
    days: u32,
) -> Result<Option<HrvSummary>, GarminError> {
    for offset in 0..days {
        let date = days_ago(today, offset);
        let Some(resp) = api.hrv_data(date).await? else {
            continue;
        };
        if let Some(summary) = resp.hrv_summary.filter(|s| !s.is_empty()) {
            return Ok(Some(HrvSummary::new(ymd(date), &summary)));
        }
    }
    Ok(None)
}

/// Recovery fields plus resting heart rate.
///
/// Each field keeps the first value found scanning back from today. The
/// readiness call is only made while no score is known, and its fields are
/// taken as a group. The scan stops once both score and resting HR are
/// known; body battery does not affect the stop condition.
pub async fn fetch_recovery<A: GarminApi + ?Sized>(api: &A, today: NaiveDate) -> (Recovery, Option<i64>) {
    let mut recovery = Recovery::default();
    let mut resting_hr = None;

    for offset in 0..RECOVERY_WINDOW_DAYS {
        let date = days_ago(today, offset);

        match api.user_summary(date).await {
            Ok(Some(summary)) => {
                if resting_hr.is_none() {
                    resting_hr = summary.resting_heart_rate.filter(|hr| *hr != 0);
                }
                if recovery.body_battery.is_none() {
                    recovery.body_battery = summary.body_battery_most_recent_value;
                }
            }
            Ok(None) => {}
            Err(e) => debug!("No user summary for {date}: {e}"),
        }

        if recovery.score.is_none() {
            match api.morning_training_readiness(date).await {
                Ok(Some(tr)) => recovery.apply_readiness(&tr),
                Ok(None) => {}
                Err(e) => debug!("No training readiness for {date}: {e}"),
            }
        }

        if recovery.score.is_some() && resting_hr.is_some() {
            break;
        }
    }

    (recovery, resting_hr)
}

/// Run the whole pipeline against an authenticated client.
pub async fn collect<A: GarminApi + ?Sized>(
    api: &A,
    today: NaiveDate,
    days: u32,
) -> Result<SyncReport, GarminError> {
    let activities = fetch_activities(api, today, days).await?;
    let nights = fetch_sleep(api, today, days).await;
    let hrv = fetch_hrv(api, today, days).await;
    let (recovery, resting_hr) = fetch_recovery(api, today).await;

    let formatted: Vec<Activity> = activities.iter().map(Activity::from_raw).collect();
    let stats = Stats::from_activities(&activities);
    let sleep = nights
        .first()
        .map(|night| SleepSummary::new(ymd(night.date), &night.sleep));

    Ok(SyncReport {
        user: api.full_name().await?,
        period_days: days,
        recovery,
        resting_hr,
        hrv,
        sleep,
        stats,
        activities: formatted,
    })
}
