//! Error types shared by the session, token store and endpoint helpers

use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything a session or endpoint helper can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials or the config file could not be found, read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The auth server rejected a grant or refresh exchange.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A service endpoint answered with a non-success status.
    #[error("HTTP {} for {url}: {body}", .status.as_u16())]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// The response body was not the JSON or image data we expected.
    #[error("failed to decode {what} from {url}: {reason}")]
    Decode {
        what: &'static str,
        url: String,
        reason: String,
    },

    /// The request never produced a response (connection, TLS, ...).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// HTTP status carried by [`Error::Http`], if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures locating, reading or interpreting credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write config file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] ini::ParseError),

    #[error("config file has no [credentials] section")]
    MissingSection,

    #[error("[credentials] is missing `{0}`")]
    MissingKey(&'static str),

    #[error("[credentials] needs either client_id and client_secret, or api_key")]
    MissingClientCredentials,

    #[error("malformed [token] section")]
    Token(#[source] serde_json::Error),

    #[error("environment variable {0} is not valid unicode")]
    InvalidEnv(&'static str),

    #[error("invalid URL `{url}`: {reason}")]
    Url { url: String, reason: String },

    #[error("could not determine home directory")]
    NoHome,

    #[error("no credentials available:\n  {}", .0.join("\n  "))]
    NoCredentials(Vec<String>),
}
