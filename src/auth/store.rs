//! Token persistence on top of the credential source

use crate::auth::{TokenRecord, TokenSink};
use crate::config::{ConfigFile, CredentialSource, Credentials};
use crate::error::{ConfigError, Result};

/// Loads credentials and the last token for a source, and writes new tokens back.
#[derive(Debug, Clone)]
pub struct TokenStore {
    source: CredentialSource,
}

impl TokenStore {
    pub fn new(source: CredentialSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Credentials plus the stored token, if the source keeps one.
    pub fn load(&self) -> Result<(Credentials, Option<TokenRecord>), ConfigError> {
        match &self.source {
            CredentialSource::Environment(credentials) => Ok((credentials.clone(), None)),
            CredentialSource::File(path) => {
                tracing::debug!("Loading credentials from {}", path.display());
                let file = ConfigFile::load(path)?;
                let credentials = file.credentials()?;
                let token = file.token()?;
                Ok((credentials, token))
            }
        }
    }

    /// Rewrite the `[token]` section of the backing file. No-op for the environment.
    pub fn save(&self, token: &TokenRecord) -> Result<(), ConfigError> {
        match &self.source {
            CredentialSource::Environment(_) => Ok(()),
            CredentialSource::File(path) => {
                let mut file = ConfigFile::load(path)?;
                file.set_token(token)?;
                file.save(path)?;
                tracing::debug!("Saved token to {}", path.display());
                Ok(())
            }
        }
    }

    /// Remove the stored token. Returns whether one was present.
    pub fn clear(&self) -> Result<bool, ConfigError> {
        match &self.source {
            CredentialSource::Environment(_) => Ok(false),
            CredentialSource::File(path) => {
                let mut file = ConfigFile::load(path)?;
                let removed = file.clear_token()?;
                if removed {
                    file.save(path)?;
                }
                Ok(removed)
            }
        }
    }
}

impl TokenSink for TokenStore {
    fn persist(&mut self, token: &TokenRecord) -> Result<()> {
        Ok(self.save(token)?)
    }
}
