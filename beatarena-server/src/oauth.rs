//! Google OAuth 2.0 client (authorization code flow)

use std::time::Duration;

use beatarena_common::config::GoogleConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Provider name stored in `users.oauth_provider`
pub const PROVIDER: &str = "google";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid authorize URL: {0}")]
    Url(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        warn!("Google sign-in failed: {}", err);
        ApiError::Unauthorized("Google sign-in failed".to_string())
    }
}

/// Identity returned by Google's userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { config, http })
    }

    /// Consent page URL carrying `state`
    pub fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;
        Ok(url.into())
    }

    /// Exchange an authorization code and fetch the signed-in profile
    pub async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, OAuthError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        debug!("Exchanged Google authorization code");

        let profile = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<GoogleProfile>()
            .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_state_and_client() {
        let oauth = GoogleOAuth::new(GoogleConfig {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            redirect_url: "http://localhost:5780/api/auth/google/callback".to_string(),
        })
        .unwrap();

        let url = oauth.authorize_url("abc123").unwrap();
        let parsed = reqwest::Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["state"], "abc123");
        assert_eq!(params["redirect_uri"], "http://localhost:5780/api/auth/google/callback");
        assert!(!url.contains("shh"));
    }
}
