//! Garmin SSO login and the OAuth token cache.
//!
//! Flow:
//! 1. SSO embed page (sets session cookies)
//! 2. Sign-in page → CSRF token
//! 3. Credential POST → service ticket
//! 4. Ticket → OAuth1 token (signed with the mobile app consumer key)
//! 5. OAuth1 → OAuth2 bearer token used by the Connect API
//!
//! Both tokens are cached as `oauth1_token.json` / `oauth2_token.json` so
//! later runs can skip steps 1-4, and step 5 too while the bearer is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::oauth1::Signer;
use super::GarminError;
use crate::config::Credentials;

const SSO: &str = "https://sso.garmin.com/sso";
const SSO_EMBED: &str = "https://sso.garmin.com/sso/embed";
pub const CONNECT_API: &str = "https://connectapi.garmin.com";
const OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";
const SSO_USER_AGENT: &str = "com.garmin.android.apps.connectmobile";

const OAUTH1_FILE: &str = "oauth1_token.json";
const OAUTH2_FILE: &str = "oauth2_token.json";

#[derive(Debug, Clone, Deserialize)]
struct OAuthConsumer {
    consumer_key: String,
    consumer_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix seconds; stamped locally when the token is issued.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token_expires_at: Option<i64>,
}

impl OAuth2Token {
    fn stamped(mut self, now: i64) -> Self {
        self.expires_at = now + self.expires_in;
        self.refresh_token_expires_at = self.refresh_token_expires_in.map(|secs| now + secs);
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tokens {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

/// On-disk token cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cached tokens, if readable. The OAuth2 half may be absent.
    pub fn load(&self) -> Option<(OAuth1Token, Option<OAuth2Token>)> {
        let oauth1 = read_json::<OAuth1Token>(&self.dir.join(OAUTH1_FILE))?;
        let oauth2 = read_json::<OAuth2Token>(&self.dir.join(OAUTH2_FILE));
        Some((oauth1, oauth2))
    }

    pub fn dump(&self, tokens: &Tokens) -> Result<(), GarminError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.dir.join(OAUTH1_FILE),
            serde_json::to_string_pretty(&tokens.oauth1)?,
        )?;
        fs::write(
            self.dir.join(OAUTH2_FILE),
            serde_json::to_string_pretty(&tokens.oauth2)?,
        )?;
        debug!("Saved Garmin tokens to {}", self.dir.display());
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable token file {}: {e}", path.display());
            None
        }
    }
}

/// Performs SSO login and OAuth exchanges.
pub struct Authenticator {
    sso: Client,
    api: Client,
}

impl Authenticator {
    pub fn new() -> Result<Self, GarminError> {
        let sso = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        let api = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { sso, api })
    }

    /// Resume from the cache when possible, otherwise log in from scratch.
    /// Whatever tokens end up in use are written back to the cache.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        cache: &TokenCache,
    ) -> Result<Tokens, GarminError> {
        let now = chrono::Utc::now().timestamp();

        let tokens = match cache.load() {
            Some((oauth1, Some(oauth2))) if !oauth2.is_expired(now) => {
                debug!("Using cached Garmin OAuth2 token");
                Tokens { oauth1, oauth2 }
            }
            Some((oauth1, _)) => match self.exchange(&oauth1).await {
                Ok(oauth2) => {
                    debug!("Refreshed Garmin OAuth2 token from cached OAuth1 token");
                    Tokens { oauth1, oauth2 }
                }
                Err(e) => {
                    warn!("Cached Garmin token rejected ({e}), logging in again");
                    self.login(credentials).await?
                }
            },
            None => self.login(credentials).await?,
        };

        cache.dump(&tokens)?;
        Ok(tokens)
    }

    /// Full SSO login.
    pub async fn login(&self, credentials: &Credentials) -> Result<Tokens, GarminError> {
        if !credentials.is_complete() {
            return Err(GarminError::MissingCredentials);
        }
        info!("Logging in to Garmin Connect as {}", credentials.email);

        let embed_params = [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", SSO),
        ];
        let signin_params = [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", SSO_EMBED),
            ("service", SSO_EMBED),
            ("source", SSO_EMBED),
            ("redirectAfterAccountLoginUrl", SSO_EMBED),
            ("redirectAfterAccountCreationUrl", SSO_EMBED),
        ];
        let signin_url = format!("{SSO}/signin");

        // 1. Session cookies
        self.sso
            .get(SSO_EMBED)
            .query(&embed_params)
            .header(USER_AGENT, SSO_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        // 2. CSRF token
        let page = self
            .sso
            .get(&signin_url)
            .query(&signin_params)
            .header(USER_AGENT, SSO_USER_AGENT)
            .header(REFERER, SSO_EMBED)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let csrf = extract_csrf(&page)?;

        // 3. Credentials → ticket
        let form = [
            ("username", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
            ("embed", "true"),
            ("_csrf", csrf.as_str()),
        ];
        let page = self
            .sso
            .post(&signin_url)
            .query(&signin_params)
            .header(USER_AGENT, SSO_USER_AGENT)
            .header(REFERER, &signin_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let title = extract_title(&page)?;
        if title.contains("MFA") {
            return Err(GarminError::MfaRequired);
        }
        if title != "Success" {
            return Err(GarminError::Login(format!("unexpected SSO page title: {title}")));
        }
        let ticket = extract_ticket(&page)?;

        // 4-5. OAuth tokens
        let oauth1 = self.preauthorize(&ticket).await?;
        let oauth2 = self.exchange(&oauth1).await?;
        Ok(Tokens { oauth1, oauth2 })
    }

    async fn consumer(&self) -> Result<OAuthConsumer, GarminError> {
        Ok(self
            .api
            .get(OAUTH_CONSUMER_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Trade the SSO ticket for an OAuth1 token.
    async fn preauthorize(&self, ticket: &str) -> Result<OAuth1Token, GarminError> {
        let consumer = self.consumer().await?;
        let url = format!("{CONNECT_API}/oauth-service/oauth/preauthorized");
        let params = vec![
            ("ticket".to_string(), ticket.to_string()),
            ("login-url".to_string(), SSO_EMBED.to_string()),
            ("accepts-mfa-tokens".to_string(), "true".to_string()),
        ];
        let signer = Signer {
            consumer_key: &consumer.consumer_key,
            consumer_secret: &consumer.consumer_secret,
            token: None,
            token_secret: None,
        };

        let body = self
            .api
            .get(&url)
            .query(&params)
            .header(USER_AGENT, SSO_USER_AGENT)
            .header(reqwest::header::AUTHORIZATION, signer.authorize("GET", &url, &params))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_oauth1_response(&body)
    }

    /// Trade an OAuth1 token for a fresh OAuth2 bearer token.
    pub async fn exchange(&self, oauth1: &OAuth1Token) -> Result<OAuth2Token, GarminError> {
        let consumer = self.consumer().await?;
        let url = format!("{CONNECT_API}/oauth-service/oauth/exchange/user/2.0");
        let form: Vec<(String, String)> = oauth1
            .mfa_token
            .iter()
            .map(|t| ("mfa_token".to_string(), t.clone()))
            .collect();
        let signer = Signer {
            consumer_key: &consumer.consumer_key,
            consumer_secret: &consumer.consumer_secret,
            token: Some(&oauth1.oauth_token),
            token_secret: Some(&oauth1.oauth_token_secret),
        };

        let token: OAuth2Token = self
            .api
            .post(&url)
            .header(USER_AGENT, SSO_USER_AGENT)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::AUTHORIZATION, signer.authorize("POST", &url, &form))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(token.stamped(chrono::Utc::now().timestamp()))
    }
}

// --- SSO page scraping ---

static CSRF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="_csrf"\s+value="(.+?)""#).expect("valid CSRF pattern"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>(.+?)</title>").expect("valid title pattern"));
static TICKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"embed\?ticket=([^"]+)""#).expect("valid ticket pattern"));

fn capture(re: &Regex, text: &str, what: &str) -> Result<String, GarminError> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GarminError::Login(format!("{what} not found in SSO response")))
}

pub fn extract_csrf(html: &str) -> Result<String, GarminError> {
    capture(&CSRF_RE, html, "CSRF token")
}

pub fn extract_title(html: &str) -> Result<String, GarminError> {
    capture(&TITLE_RE, html, "page title")
}

pub fn extract_ticket(html: &str) -> Result<String, GarminError> {
    capture(&TICKET_RE, html, "service ticket")
}

/// `oauth_token=..&oauth_token_secret=..[&mfa_token=..]`
pub fn parse_oauth1_response(body: &str) -> Result<OAuth1Token, GarminError> {
    let mut token = None;
    let mut secret = None;
    let mut mfa_token = None;
    let mut mfa_expiration = None;

    for pair in body.trim().split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "oauth_token" => token = Some(value),
            "oauth_token_secret" => secret = Some(value),
            "mfa_token" => mfa_token = Some(value),
            "mfa_expiration_timestamp" => mfa_expiration = Some(value),
            _ => {}
        }
    }

    match (token, secret) {
        (Some(oauth_token), Some(oauth_token_secret)) => Ok(OAuth1Token {
            oauth_token,
            oauth_token_secret,
            mfa_token,
            mfa_expiration_timestamp: mfa_expiration,
            domain: Some("garmin.com".into()),
        }),
        _ => Err(GarminError::Login("OAuth1 response missing token".into())),
    }
}
