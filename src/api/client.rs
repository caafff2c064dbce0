//! Authenticated HTTP session for GBDX APIs
//!
//! Wraps reqwest::Client with bearer token injection and transparent refresh.

use std::fmt;
use std::path::Path;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::oauth::{initial_token, Authenticator};
use crate::auth::{EphemeralSink, TokenRecord, TokenSink, TokenStore};
use crate::config::{self, CredentialSource, Credentials};
use crate::error::{ConfigError, Error, Result};

/// Service root of the public GBDX deployment.
pub const GBDX_BASE_URL: &str = "https://geobigdata.io/";

enum SessionState {
    Authenticated(TokenRecord),
    /// A refresh was rejected; the session cannot make further requests.
    Unusable,
}

/// Authenticated session against the GBDX APIs.
///
/// Every request carries the current bearer token. An expired token is
/// refreshed before the request goes out, and a `401` triggers one refresh
/// and one retry. Each new token is handed to the session's [`TokenSink`].
pub struct GbdxSession {
    http: reqwest::Client,
    base_url: Url,
    authenticator: Authenticator,
    state: SessionState,
    sink: Box<dyn TokenSink>,
}

impl fmt::Debug for GbdxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbdxSession")
            .field("base_url", &self.base_url.as_str())
            .field("auth_url", &self.authenticator.credentials().auth_url)
            .field("token", &self.token())
            .finish_non_exhaustive()
    }
}

/// Options for opening a [`GbdxSession`].
pub struct SessionBuilder {
    http: Option<reqwest::Client>,
    base_url: String,
    config_file: Option<std::path::PathBuf>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            http: None,
            base_url: GBDX_BASE_URL.to_string(),
            config_file: None,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service root the endpoint helpers build their URLs from.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Transport for service requests, e.g. one configured with timeouts.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Use this config file instead of the environment / `~/.gbdx-config` lookup.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Resolve credentials, load any stored token and authenticate.
    pub async fn connect(self) -> Result<GbdxSession> {
        let source = config::resolve(self.config_file.as_deref())?;
        self.connect_with(source).await
    }

    /// Like [`connect`](Self::connect) with an already resolved source.
    pub async fn connect_with(self, source: CredentialSource) -> Result<GbdxSession> {
        let store = TokenStore::new(source);
        let (credentials, token) = store.load()?;
        let sink: Box<dyn TokenSink> = match store.source() {
            CredentialSource::Environment(_) => Box::new(EphemeralSink),
            CredentialSource::File(_) => Box::new(store),
        };
        self.acquire(credentials, token, sink).await
    }

    /// Build a session from explicit credentials, an optional stored token
    /// and the sink that receives every minted or refreshed token.
    pub async fn acquire(
        self,
        credentials: Credentials,
        existing: Option<TokenRecord>,
        mut sink: Box<dyn TokenSink>,
    ) -> Result<GbdxSession> {
        let base_url = Url::parse(&self.base_url).map_err(|e| ConfigError::Url {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let authenticator = Authenticator::new(credentials)?;
        let token = initial_token(&authenticator, existing, sink.as_mut()).await?;

        Ok(GbdxSession {
            http: self.http.unwrap_or_default(),
            base_url,
            authenticator,
            state: SessionState::Authenticated(token),
            sink,
        })
    }
}

/// Open a session the default way: explicit config file if given, otherwise
/// the `GBDX_*` environment variables, otherwise `~/.gbdx-config`.
pub async fn get_session(config_file: Option<&Path>) -> Result<GbdxSession> {
    let mut builder = SessionBuilder::new();
    if let Some(path) = config_file {
        builder = builder.config_file(path);
    }
    builder.connect().await
}

impl GbdxSession {
    /// Current token, or `None` once a refresh has been rejected.
    pub fn token(&self) -> Option<&TokenRecord> {
        match &self.state {
            SessionState::Authenticated(token) => Some(token),
            SessionState::Unusable => None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::Url {
                url: self.base_url.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` with the bearer token. The response status is not checked.
    pub async fn get(&mut self, url: &str) -> Result<Response> {
        tracing::debug!("GBDX GET {}", url);
        self.send(url, |http| http.get(url)).await
    }

    /// POST a form-encoded `payload` to `url`. The response status is not checked.
    pub async fn post<P>(&mut self, url: &str, payload: &P) -> Result<Response>
    where
        P: Serialize + ?Sized,
    {
        tracing::debug!("GBDX POST {}", url);
        self.send(url, |http| http.post(url).form(payload)).await
    }

    /// GET `url` and decode the JSON body, failing on a non-success status.
    pub async fn get_json<T: DeserializeOwned>(&mut self, url: &str) -> Result<T> {
        let resp = self.get(url).await?;
        let resp = check_response(resp, url).await?;
        decode_json(resp, url).await
    }

    /// POST `payload` to `url` and decode the JSON body, failing on a non-success status.
    pub async fn post_json<T, P>(&mut self, url: &str, payload: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let resp = self.post(url, payload).await?;
        let resp = check_response(resp, url).await?;
        decode_json(resp, url).await
    }

    fn current_token(&self) -> Result<&TokenRecord> {
        self.token().ok_or_else(|| {
            Error::Auth("session is unusable after a rejected token refresh".into())
        })
    }

    /// Swap in a refreshed token and persist it. A rejected refresh leaves
    /// the session unusable; a failed persist keeps the new token in use.
    async fn refresh(&mut self) -> Result<()> {
        let current = self.current_token()?;
        match self.authenticator.refresh(current).await {
            Ok(token) => {
                let persisted = self.sink.persist(&token);
                self.state = SessionState::Authenticated(token);
                persisted
            }
            Err(e) => {
                tracing::warn!("Token refresh failed; session is no longer usable");
                self.state = SessionState::Unusable;
                Err(e)
            }
        }
    }

    async fn send<F>(&mut self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut refreshed = false;
        if self.current_token()?.is_expired() {
            tracing::info!("Access token expired, refreshing...");
            self.refresh().await?;
            refreshed = true;
        }

        let resp = self.dispatch(url, &build).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || refreshed {
            return Ok(resp);
        }

        tracing::info!("401 Unauthorized for {}, refreshing token and retrying", url);
        self.refresh().await?;
        self.dispatch(url, &build).await
    }

    async fn dispatch<F>(&self, url: &str, build: &F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.current_token()?;
        build(&self.http)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|source| Error::Transport {
                url: url.to_string(),
                source,
            })
    }
}

/// Check HTTP response status code and return a clear error on failure.
pub(crate) async fn check_response(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status,
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

async fn decode_json<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T> {
    let bytes = resp.bytes().await.map_err(|source| Error::Transport {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode {
        what: "JSON",
        url: url.to_string(),
        reason: e.to_string(),
    })
}
