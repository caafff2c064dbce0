//! OAuth2 password grant and refresh against the GBDX auth endpoint

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, SubsecRound, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::http::header::{HeaderValue, AUTHORIZATION};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, RefreshToken, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};

use super::tokens::DEFAULT_EXPIRES_IN_SECS;
use super::{TokenRecord, TokenSink};
use crate::config::Credentials;
use crate::error::{ConfigError, Error, Result};

/// Runs grant and refresh exchanges for one set of credentials.
pub struct Authenticator {
    client: BasicClient,
    credentials: Credentials,
    basic_auth: HeaderValue,
}

/// Build the OAuth2 client. The token endpoint doubles as the (unused)
/// authorization endpoint since only the password grant is supported.
fn build_client(credentials: &Credentials) -> Result<BasicClient> {
    let invalid_url = |e: url::ParseError| ConfigError::Url {
        url: credentials.auth_url.clone(),
        reason: e.to_string(),
    };
    let auth_url = AuthUrl::new(credentials.auth_url.clone()).map_err(invalid_url)?;
    let token_url = TokenUrl::new(credentials.auth_url.clone()).map_err(invalid_url)?;

    // Client id and secret travel in the form body; the Basic header is
    // added separately for the password grant.
    Ok(BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(credentials.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody))
}

/// `Basic base64(client_id:client_secret)`, without url-encoding either half.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = build_client(&credentials)?;
        let header = basic_auth_header(&credentials.client_id, &credentials.client_secret);
        let basic_auth = HeaderValue::from_str(&header).map_err(|_| {
            Error::Auth("client credentials contain invalid header characters".into())
        })?;

        Ok(Self {
            client,
            credentials,
            basic_auth,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Trade username and password for a fresh token pair.
    pub async fn password_grant(&self) -> Result<TokenRecord> {
        if self.credentials.username.is_empty() {
            return Err(ConfigError::MissingKey("username").into());
        }
        if self.credentials.password.is_empty() {
            return Err(ConfigError::MissingKey("password").into());
        }

        tracing::info!(
            "Requesting new token for {} from {}",
            self.credentials.username,
            self.credentials.auth_url
        );

        let basic_auth = self.basic_auth.clone();
        let response = self
            .client
            .exchange_password(
                &ResourceOwnerUsername::new(self.credentials.username.clone()),
                &ResourceOwnerPassword::new(self.credentials.password.clone()),
            )
            .request_async(move |mut request: HttpRequest| {
                request.headers.insert(AUTHORIZATION, basic_auth);
                async_http_client(request)
            })
            .await
            .map_err(|e| auth_error("password grant", e))?;

        Ok(token_from_response(&response, None))
    }

    /// Trade the refresh token of `token` for a new token pair.
    pub async fn refresh(&self, token: &TokenRecord) -> Result<TokenRecord> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("token has no refresh token".into()))?;

        tracing::info!("Refreshing access token...");

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| auth_error("token refresh", e))?;

        Ok(token_from_response(&response, Some(refresh_token)))
    }
}

/// Pick the token a new session starts with.
///
/// A stored token that is still valid is reused as-is. An expired one is
/// kept if it can be refreshed; the session refreshes it before its first
/// request. Otherwise a password grant runs and its result goes to `sink`.
pub async fn initial_token(
    authenticator: &Authenticator,
    existing: Option<TokenRecord>,
    sink: &mut dyn TokenSink,
) -> Result<TokenRecord> {
    match existing {
        Some(token) if !token.is_expired() => {
            tracing::debug!("Reusing stored token (expires at {})", token.expires_at);
            Ok(token)
        }
        Some(token) if token.refresh_token.is_some() => {
            tracing::debug!("Stored token expired; it will be refreshed on first use");
            Ok(token)
        }
        _ => {
            let token = authenticator.password_grant().await?;
            sink.persist(&token)?;
            tracing::info!("Authenticated as {}", authenticator.credentials.username);
            Ok(token)
        }
    }
}

/// Convert an exchange response, keeping the previous refresh token when the
/// server does not rotate it.
fn token_from_response(
    response: &BasicTokenResponse,
    previous_refresh: Option<&str>,
) -> TokenRecord {
    let lifetime = response
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_EXPIRES_IN_SECS));

    let token_type = match response.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    };

    TokenRecord {
        access_token: response.access_token().secret().clone(),
        refresh_token: response
            .refresh_token()
            .map(|rt| rt.secret().clone())
            .or_else(|| previous_refresh.map(String::from)),
        token_type,
        expires_at: (Utc::now() + lifetime).trunc_subsecs(0),
        scope: response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
            .unwrap_or_default(),
    }
}

fn auth_error<RE>(exchange: &str, err: RequestTokenError<RE, BasicErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    let detail = match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        RequestTokenError::Request(e) => e.to_string(),
        RequestTokenError::Parse(e, body) => {
            format!("{} (body: {})", e, String::from_utf8_lossy(&body))
        }
        RequestTokenError::Other(msg) => msg,
    };
    tracing::warn!("{} failed: {}", exchange, detail);
    Error::Auth(format!("{} rejected: {}", exchange, detail))
}
