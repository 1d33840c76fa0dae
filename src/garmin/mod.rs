//! Garmin Connect data aggregator.
//!
//! - `client`: authenticated Connect API client (`GarminApi` impl)
//! - `auth`: SSO login, OAuth token exchange and the on-disk token cache
//! - `oauth1`: request signing for the token endpoints
//! - `types`: raw payload shapes
//! - `sync`: the per-day scan-and-skip fetch pipeline
//! - `summary`: normalised records and aggregate stats
//! - `report`: text rendering

pub mod auth;
pub mod client;
pub mod oauth1;
pub mod report;
pub mod summary;
pub mod sync;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub use client::ConnectClient;
use types::{HrvResponse, RawActivity, SleepResponse, TrainingReadiness, UserSummary};

#[derive(Debug, Error)]
pub enum GarminError {
    #[error("Missing credentials: set GARMIN_EMAIL and GARMIN_PASSWORD")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Login requires multi-factor authentication, which is not supported")]
    MfaRequired,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Read calls the aggregator makes against Garmin Connect.
///
/// Per-day lookups return `Ok(None)` when Garmin has nothing for that day.
#[async_trait]
pub trait GarminApi: Send + Sync {
    async fn full_name(&self) -> Result<Option<String>, GarminError>;

    async fn activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivity>, GarminError>;

    async fn sleep_data(&self, date: NaiveDate) -> Result<Option<SleepResponse>, GarminError>;

    async fn hrv_data(&self, date: NaiveDate) -> Result<Option<HrvResponse>, GarminError>;

    async fn user_summary(&self, date: NaiveDate) -> Result<Option<UserSummary>, GarminError>;

    async fn morning_training_readiness(
        &self,
        date: NaiveDate,
    ) -> Result<Option<TrainingReadiness>, GarminError>;
}
