//! # Spotify Integration Module
//!
//! Interface to the parts of the Spotify Web API sporlstats needs: the OAuth
//! 2.0 PKCE flow, the player endpoints that feed the listening history store,
//! the top items endpoints and audio features.
//!
//! ## Architecture
//!
//! ```text
//! CLI / Monitor
//!      ↓
//! SpotifyClient (token refresh, retries, rate limits)
//!     ├── auth      (PKCE flow, token exchange and refresh)
//!     ├── player    (recently played, currently playing)
//!     ├── top       (top tracks, top artists)
//!     ├── artists   (artist genres, batched)
//!     └── features  (audio features, batched)
//!      ↓
//! Spotify Web API
//! ```
//!
//! ## Error Handling
//!
//! - **502 Bad Gateway**: retried after 10 seconds, a bounded number of times
//! - **429 Too Many Requests**: the `Retry-After` header is honored when it is
//!   at most two minutes, a bounded number of times; longer waits and
//!   exhausted retries surface as [`SpotifyError::RateLimited`]
//! - **204 No Content**: returned as `None` (e.g. nothing is playing)
//! - Other non-success statuses surface as [`SpotifyError::Status`]
//!
//! ## API Coverage
//!
//! - `GET /me/player/recently-played`
//! - `GET /me/player/currently-playing`
//! - `GET /me/top/{tracks,artists}`
//! - `GET /audio-features`
//! - `GET /artists`
//! - `POST /api/token`

pub mod artists;
pub mod auth;
pub mod features;
pub mod player;
pub mod top;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;

use crate::{config::SpotifyConfig, management::TokenManager, warning};

const BAD_GATEWAY_RETRIES: u32 = 3;
const BAD_GATEWAY_DELAY: Duration = Duration::from_secs(10);
const MAX_RETRY_AFTER_SECS: u64 = 120;
const RATE_LIMIT_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Spotify API responded with {0}")]
    Status(StatusCode),
    #[error("rate limited by Spotify for {0} seconds")]
    RateLimited(u64),
    #[error("token request failed: {0}")]
    Token(String),
}

/// Authenticated client for the Web API.
pub struct SpotifyClient {
    http: Client,
    config: SpotifyConfig,
    tokens: TokenManager,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig, tokens: TokenManager) -> Self {
        Self {
            http: Client::new(),
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }

    /// GETs `path` relative to the API base url and decodes the JSON body.
    ///
    /// Returns `Ok(None)` on `204 No Content`.
    pub async fn get<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, SpotifyError> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut bad_gateways = 0;
        let mut rate_limits = 0;

        loop {
            let token = self.tokens.get_valid_token(&self.config).await;
            let response = self
                .http
                .get(&url)
                .query(query)
                .bearer_auth(token)
                .send()
                .await?;

            match response.status() {
                StatusCode::NO_CONTENT => return Ok(None),
                StatusCode::BAD_GATEWAY if bad_gateways < BAD_GATEWAY_RETRIES => {
                    bad_gateways += 1;
                    sleep(BAD_GATEWAY_DELAY).await;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);

                    if retry_after > MAX_RETRY_AFTER_SECS {
                        warning!(
                            "Retry after has reached an abnormal high of {} seconds. Try again later.",
                            retry_after
                        );
                        return Err(SpotifyError::RateLimited(retry_after));
                    }
                    if rate_limits >= RATE_LIMIT_RETRIES {
                        warning!("Still rate limited after {} retries.", rate_limits);
                        return Err(SpotifyError::RateLimited(retry_after));
                    }
                    rate_limits += 1;
                    sleep(Duration::from_secs(retry_after)).await;
                }
                status if status.is_success() => return Ok(Some(response.json::<T>().await?)),
                status => return Err(SpotifyError::Status(status)),
            }
        }
    }
}
