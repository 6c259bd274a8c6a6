//! Google OAuth helpers for the Gmail pager.
//!
//! The authorizer builds the consent URL, exchanges the one-time code for
//! tokens, and refreshes access tokens. Tokens are returned to the caller
//! and never stored here.

use chrono::{Duration, Utc};
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use serde::Deserialize;
use url::Url;

use super::{Result, RetrievalError};
use crate::config::GmailSettings;
use crate::domain::{OAuthTokens, ValidationError};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// OAuth client for Google accounts.
#[derive(Debug, Clone)]
pub struct GmailAuthorizer {
    http: reqwest::Client,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    userinfo_url: Url,
    scopes: Vec<Scope>,
}

impl GmailAuthorizer {
    /// Creates an authorizer from the configured OAuth client.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Input`] if the client ID, secret, or redirect
    /// URI is missing or an endpoint is not a valid URL.
    pub fn new(http: reqwest::Client, settings: &GmailSettings) -> Result<Self> {
        if settings.client_id.is_empty() {
            return Err(ValidationError::missing("gmail.client_id").into());
        }
        if settings.client_secret.is_empty() {
            return Err(ValidationError::missing("gmail.client_secret").into());
        }
        if settings.redirect_uri.is_empty() {
            return Err(ValidationError::missing("gmail.redirect_uri").into());
        }

        Ok(Self {
            http,
            client_id: ClientId::new(settings.client_id.clone()),
            client_secret: ClientSecret::new(settings.client_secret.clone()),
            redirect_url: RedirectUrl::new(settings.redirect_uri.clone())
                .map_err(|_| ValidationError::invalid("gmail.redirect_uri", "not a URL"))?,
            auth_url: AuthUrl::new(settings.auth_url.clone())
                .map_err(|_| ValidationError::invalid("gmail.auth_url", "not a URL"))?,
            token_url: TokenUrl::new(settings.token_url.clone())
                .map_err(|_| ValidationError::invalid("gmail.token_url", "not a URL"))?,
            userinfo_url: Url::parse(&settings.userinfo_url)
                .map_err(|_| ValidationError::invalid("gmail.userinfo_url", "not a URL"))?,
            scopes: settings.scopes.iter().cloned().map(Scope::new).collect(),
        })
    }

    /// Returns the consent URL for the configured scopes.
    ///
    /// Offline access and a forced consent prompt make Google issue a
    /// refresh token. The URL is the same on every call.
    pub fn begin_authorization(&self) -> String {
        let scope = self
            .scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut url = self.auth_url.url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("redirect_uri", self.redirect_url.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url.to_string()
    }

    /// Exchanges a one-time authorization code for tokens and resolves the
    /// account's email address.
    pub async fn complete_authorization(&self, code: &str) -> Result<OAuthTokens> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::missing("code").into());
        }

        tracing::debug!("Exchanging authorization code for tokens");
        let token = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.secret().as_str()),
            ])
            .await?;

        let account_email = self.account_email(&token.access_token).await?;
        tracing::info!(account = ?account_email, "Gmail authorization completed");

        Ok(OAuthTokens {
            expiry: expiry(token.expires_in),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            account_email,
        })
    }

    /// Obtains a new access token from a refresh token.
    ///
    /// Google usually omits the refresh token from the response; the one
    /// passed in is returned in that case.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        if refresh_token.is_empty() {
            return Err(ValidationError::missing("refreshToken").into());
        }

        tracing::debug!("Refreshing access token");
        let token = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.secret().as_str()),
            ])
            .await?;

        Ok(OAuthTokens {
            expiry: expiry(token.expires_in),
            access_token: token.access_token,
            refresh_token: Some(
                token
                    .refresh_token
                    .unwrap_or_else(|| refresh_token.to_string()),
            ),
            account_email: None,
        })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.token_url.url().clone())
            .form(params)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            tracing::warn!(%status, error = ?error.as_ref().map(|e| &e.error), "Token request failed");

            return Err(match error {
                Some(e) if e.error == "invalid_grant" => RetrievalError::AuthExpired(
                    e.error_description
                        .unwrap_or_else(|| "grant is invalid or revoked".to_string()),
                ),
                _ => RetrievalError::Protocol(format!("token endpoint error ({}): {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError::Protocol(format!("parse token response: {}", e)))
    }

    async fn account_email(&self, access_token: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => RetrievalError::AuthExpired(format!("userinfo rejected token: {}", body)),
                _ => RetrievalError::Protocol(format!("userinfo error ({}): {}", status, body)),
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| RetrievalError::Protocol(format!("parse userinfo: {}", e)))?;
        Ok(info.email)
    }
}

fn expiry(expires_in: Option<i64>) -> Option<chrono::DateTime<Utc>> {
    expires_in.map(|secs| Utc::now() + Duration::seconds(secs))
}
