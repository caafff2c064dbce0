//! Where credentials come from: environment variables or a config file

use std::env::VarError;
use std::path::{Path, PathBuf};

use super::{default_config_path, Credentials};
use crate::auth::GBDX_AUTH_URL;
use crate::error::ConfigError;

/// Environment variables read for each credential field, in lookup order.
pub const ENV_VARS: [&str; 4] = [
    "GBDX_USERNAME",
    "GBDX_PASSWORD",
    "GBDX_CLIENT_ID",
    "GBDX_CLIENT_SECRET",
];

/// A resolved origin for credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the process environment; tokens are never written anywhere.
    Environment(Credentials),
    /// A config file whose `[token]` section is kept up to date.
    File(PathBuf),
}

impl CredentialSource {
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Environment(_) => "environment variables".to_string(),
            CredentialSource::File(path) => path.display().to_string(),
        }
    }
}

/// Outcome of one strategy in the fallback chain.
enum Attempt {
    Found(CredentialSource),
    /// Not available here; the next strategy may still succeed.
    Unavailable(String),
}

enum Strategy<D> {
    Environment,
    /// The default config file, located only when this strategy is reached.
    DefaultFile(D),
}

impl<D> Strategy<D>
where
    D: FnOnce() -> Result<PathBuf, ConfigError>,
{
    fn attempt<E>(self, env: &E) -> Result<Attempt, ConfigError>
    where
        E: Fn(&str) -> Result<String, VarError>,
    {
        match self {
            Strategy::Environment => from_env(env),
            Strategy::DefaultFile(locate) => Ok(match locate() {
                Ok(path) if path.is_file() => Attempt::Found(CredentialSource::File(path)),
                Ok(path) => Attempt::Unavailable(format!("no config file at {}", path.display())),
                Err(e) => Attempt::Unavailable(e.to_string()),
            }),
        }
    }
}

fn from_env<E>(env: &E) -> Result<Attempt, ConfigError>
where
    E: Fn(&str) -> Result<String, VarError>,
{
    let mut values = Vec::with_capacity(ENV_VARS.len());
    for name in ENV_VARS {
        match env(name) {
            Ok(value) => values.push(value),
            Err(VarError::NotPresent) => {
                return Ok(Attempt::Unavailable(format!(
                    "environment variable {} is not set",
                    name
                )))
            }
            Err(VarError::NotUnicode(_)) => return Err(ConfigError::InvalidEnv(name)),
        }
    }

    let [username, password, client_id, client_secret]: [String; 4] = values
        .try_into()
        .map_err(|_| ConfigError::MissingKey("environment"))?;

    Ok(Attempt::Found(CredentialSource::Environment(Credentials {
        client_id,
        client_secret,
        username,
        password,
        auth_url: GBDX_AUTH_URL.to_string(),
    })))
}

/// Pick a credential source from the real environment and home directory.
///
/// An explicit path is the only source when given. Otherwise the
/// `GBDX_*` environment variables are tried, then `~/.gbdx-config`.
pub fn resolve(explicit: Option<&Path>) -> Result<CredentialSource, ConfigError> {
    resolve_with(explicit, |name| std::env::var(name), default_config_path)
}

/// [`resolve`] with the environment lookup and default path supplied by the
/// caller. `default_path` is only called once the environment has come up short.
pub fn resolve_with<E, D>(
    explicit: Option<&Path>,
    env: E,
    default_path: D,
) -> Result<CredentialSource, ConfigError>
where
    E: Fn(&str) -> Result<String, VarError>,
    D: FnOnce() -> Result<PathBuf, ConfigError>,
{
    if let Some(path) = explicit {
        return Ok(CredentialSource::File(path.to_path_buf()));
    }

    let chain = [Strategy::Environment, Strategy::DefaultFile(default_path)];

    let mut failures = Vec::new();
    for strategy in chain {
        match strategy.attempt(&env)? {
            Attempt::Found(source) => {
                tracing::debug!("Using credentials from {}", source.describe());
                return Ok(source);
            }
            Attempt::Unavailable(reason) => {
                tracing::debug!("Credential source skipped: {}", reason);
                failures.push(reason);
            }
        }
    }

    Err(ConfigError::NoCredentials(failures))
}
