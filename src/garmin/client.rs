//! Authenticated Garmin Connect API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::auth::{Authenticator, TokenCache, Tokens, CONNECT_API};
use super::types::{
    HrvResponse, RawActivity, SleepResponse, SocialProfile, TrainingReadiness, UserSummary,
};
use super::{GarminApi, GarminError};
use crate::config::Credentials;

const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";
const ACTIVITY_PAGE_SIZE: usize = 20;

pub struct ConnectClient {
    http: Client,
    credentials: Credentials,
    cache: TokenCache,
    tokens: Option<Tokens>,
    profile: SocialProfile,
}

impl ConnectClient {
    pub fn new(credentials: Credentials, cache: TokenCache) -> Result<Self, GarminError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            credentials,
            cache,
            tokens: None,
            profile: SocialProfile::default(),
        })
    }

    /// Authenticate (cached tokens first), persist tokens, load the profile.
    pub async fn login(&mut self) -> Result<(), GarminError> {
        let tokens = Authenticator::new()?
            .authenticate(&self.credentials, &self.cache)
            .await?;
        self.tokens = Some(tokens);

        self.profile = self
            .get_json("/userprofile-service/socialProfile", &[])
            .await?
            .unwrap_or_default();
        debug!("Garmin profile: {:?}", self.profile.display_name);
        Ok(())
    }

    fn display_name(&self) -> Result<&str, GarminError> {
        self.profile
            .display_name
            .as_deref()
            .ok_or(GarminError::NotAuthenticated)
    }

    /// GET a Connect API path. `204 No Content` maps to `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, GarminError> {
        let tokens = self.tokens.as_ref().ok_or(GarminError::NotAuthenticated)?;
        let url = format!("{CONNECT_API}{path}");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .header(USER_AGENT, API_USER_AGENT)
            .header(AUTHORIZATION, tokens.oauth2.bearer())
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GarminError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Prefer the reading taken after waking, else the first of the day.
pub fn pick_morning_readiness(entries: Vec<TrainingReadiness>) -> Option<TrainingReadiness> {
    let morning = entries
        .iter()
        .position(|e| e.input_context.as_deref() == Some("AFTER_WAKEUP_RESET"));
    entries.into_iter().nth(morning.unwrap_or(0))
}

#[async_trait]
impl GarminApi for ConnectClient {
    async fn full_name(&self) -> Result<Option<String>, GarminError> {
        if self.tokens.is_none() {
            return Err(GarminError::NotAuthenticated);
        }
        Ok(self.profile.full_name.clone())
    }

    async fn activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivity>, GarminError> {
        let mut activities = Vec::new();
        let mut offset = 0;

        loop {
            let page: Vec<RawActivity> = self
                .get_json(
                    "/activitylist-service/activities/search/activities",
                    &[
                        ("startDate", ymd(start)),
                        ("endDate", ymd(end)),
                        ("start", offset.to_string()),
                        ("limit", ACTIVITY_PAGE_SIZE.to_string()),
                    ],
                )
                .await?
                .unwrap_or_default();

            if page.is_empty() {
                break;
            }
            offset += page.len();
            activities.extend(page);
        }

        debug!("Fetched {} activities for {start}..{end}", activities.len());
        Ok(activities)
    }

    async fn sleep_data(&self, date: NaiveDate) -> Result<Option<SleepResponse>, GarminError> {
        let path = format!("/wellness-service/wellness/dailySleepData/{}", self.display_name()?);
        self.get_json(&path, &[("date", ymd(date)), ("nonSleepBufferMinutes", "60".into())])
            .await
    }

    async fn hrv_data(&self, date: NaiveDate) -> Result<Option<HrvResponse>, GarminError> {
        self.get_json(&format!("/hrv-service/hrv/{}", ymd(date)), &[]).await
    }

    async fn user_summary(&self, date: NaiveDate) -> Result<Option<UserSummary>, GarminError> {
        let path = format!("/usersummary-service/usersummary/daily/{}", self.display_name()?);
        self.get_json(&path, &[("calendarDate", ymd(date))]).await
    }

    async fn morning_training_readiness(
        &self,
        date: NaiveDate,
    ) -> Result<Option<TrainingReadiness>, GarminError> {
        let entries: Option<Vec<TrainingReadiness>> = self
            .get_json(&format!("/metrics-service/metrics/trainingreadiness/{}", ymd(date)), &[])
            .await?;
        Ok(entries.and_then(pick_morning_readiness))
    }
}
