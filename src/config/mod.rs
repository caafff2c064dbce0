//! Configuration file and credential handling
//!
//! The config file is ini-style (`~/.gbdx-config` by default) with a
//! `[credentials]` section and an optional `[token]` section holding the
//! last token as JSON:
//!
//! ```ini
//! [credentials]
//! username = me@example.com
//! password = hunter2
//! api_key = client-id:client-secret
//! auth_url = https://geobigdata.io/auth/v1/oauth/token/
//!
//! [token]
//! json = {"access_token":"...","expires_at":1700000000}
//! ```
//!
//! Files written by earlier versions of the tool use `[gbdx]` with
//! `user_name`/`user_password`, and `[gbdx_token]` for the token. Both are
//! read; saving a token moves it to `[token]`.

mod source;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption, Properties};

use crate::auth::{TokenRecord, GBDX_AUTH_URL};
use crate::error::ConfigError;

pub use source::{resolve, resolve_with, CredentialSource, ENV_VARS};

const CREDENTIALS_SECTION: &str = "credentials";
const LEGACY_SECTION: &str = "gbdx";
const TOKEN_SECTION: &str = "token";
const LEGACY_TOKEN_SECTION: &str = "gbdx_token";
const TOKEN_KEY: &str = "json";

/// Default config file location, `~/.gbdx-config`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    home::home_dir()
        .map(|home| home.join(".gbdx-config"))
        .ok_or(ConfigError::NoHome)
}

/// Everything needed to run a password grant against the auth server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub auth_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

/// Split a combined `id:secret` API key. The secret may itself contain `:`.
pub fn unpack_api_key(api_key: &str) -> (String, String) {
    match api_key.split_once(':') {
        Some((id, secret)) => (id.to_string(), secret.to_string()),
        None => (api_key.to_string(), String::new()),
    }
}

/// Build [`Credentials`] from a `[credentials]` (or `[gbdx]`) section.
fn credentials_from(section: &Properties) -> Result<Credentials, ConfigError> {
    let get = |key: &str| section.get(key).map(str::to_string);

    let client_pair = (get("client_id"), get("client_secret"), get("api_key"));
    let (client_id, client_secret) = match client_pair {
        (Some(id), Some(secret), _) => (id, secret),
        (_, _, Some(api_key)) => unpack_api_key(&api_key),
        _ => return Err(ConfigError::MissingClientCredentials),
    };

    Ok(Credentials {
        client_id,
        client_secret,
        // Only the password grant needs these; a stored token can do without.
        username: get("username").or_else(|| get("user_name")).unwrap_or_default(),
        password: get("password")
            .or_else(|| get("user_password"))
            .unwrap_or_default(),
        auth_url: get("auth_url").unwrap_or_else(|| GBDX_AUTH_URL.to_string()),
    })
}

/// Quoted values are unquoted; backslashes are kept as written.
fn parse_options() -> ParseOption {
    ParseOption {
        enabled_quote: true,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn section_header(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// `text` without the named sections, each running from its header to the
/// next header. Returns whether anything was removed.
fn strip_sections(text: &str, names: &[&str]) -> (String, bool) {
    let mut kept = String::with_capacity(text.len());
    let mut skipping = false;
    let mut removed = false;
    for line in text.split_inclusive('\n') {
        if let Some(name) = section_header(line) {
            skipping = names.contains(&name);
            removed |= skipping;
        }
        if !skipping {
            kept.push_str(line);
        }
    }
    (kept, removed)
}

fn render_section(name: &str, entries: &[(&str, &str)]) -> String {
    let mut out = format!("[{}]\n", name);
    for (key, value) in entries {
        out.push_str(&format!("{} = {}\n", key, value));
    }
    out
}

/// Parsed config file.
///
/// The original text is kept so a rewrite only touches the section being
/// replaced; comments, quoting and unknown sections survive as written.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    text: String,
    ini: Ini,
}

impl ConfigFile {
    /// A file holding only a `[credentials]` section.
    pub fn with_credentials(credentials: &Credentials) -> Result<Self, ConfigError> {
        let mut file = Self::default();
        file.set_credentials(credentials)?;
        Ok(file)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str_opt(text, parse_options())?;
        Ok(Self {
            text: text.to_string(),
            ini,
        })
    }

    /// The file as it will be written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::parse(&text)
    }

    /// Overwrite `path` with the whole file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::write(path, &self.text).map_err(write_err)?;

        // Set restrictive permissions on config file (contains secrets)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).map_err(write_err)?;
        }

        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let section = self
            .ini
            .section(Some(CREDENTIALS_SECTION))
            .or_else(|| self.ini.section(Some(LEGACY_SECTION)))
            .ok_or(ConfigError::MissingSection)?;
        credentials_from(section)
    }

    /// Replace the credentials, dropping a `[gbdx]` section if there is one.
    pub fn set_credentials(&mut self, credentials: &Credentials) -> Result<(), ConfigError> {
        let section = render_section(
            CREDENTIALS_SECTION,
            &[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("auth_url", credentials.auth_url.as_str()),
            ],
        );
        self.replace_sections(&[CREDENTIALS_SECTION, LEGACY_SECTION], Some(&section))?;
        Ok(())
    }

    /// The stored token from `[token]`, or `[gbdx_token]` in older files.
    pub fn token(&self) -> Result<Option<TokenRecord>, ConfigError> {
        let Some(section) = self
            .ini
            .section(Some(TOKEN_SECTION))
            .or_else(|| self.ini.section(Some(LEGACY_TOKEN_SECTION)))
        else {
            return Ok(None);
        };
        let json = section
            .get(TOKEN_KEY)
            .ok_or(ConfigError::MissingKey("token.json"))?;
        serde_json::from_str(json)
            .map(Some)
            .map_err(ConfigError::Token)
    }

    /// Replace the token section, leaving every other section as written.
    pub fn set_token(&mut self, token: &TokenRecord) -> Result<(), ConfigError> {
        let json = serde_json::to_string(token).map_err(ConfigError::Token)?;
        let section = render_section(TOKEN_SECTION, &[(TOKEN_KEY, json.as_str())]);
        self.replace_sections(&[TOKEN_SECTION, LEGACY_TOKEN_SECTION], Some(&section))?;
        Ok(())
    }

    /// Drop the token section. Returns whether there was one.
    pub fn clear_token(&mut self) -> Result<bool, ConfigError> {
        self.replace_sections(&[TOKEN_SECTION, LEGACY_TOKEN_SECTION], None)
    }

    /// Remove the named sections and append `replacement` at the end.
    fn replace_sections(
        &mut self,
        names: &[&str],
        replacement: Option<&str>,
    ) -> Result<bool, ConfigError> {
        let (kept, removed) = strip_sections(&self.text, names);
        if !removed && replacement.is_none() {
            return Ok(false);
        }

        let body = kept.trim_end();
        let mut text = String::with_capacity(body.len() + 256);
        text.push_str(body);
        if let Some(section) = replacement {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(section);
        } else if !text.is_empty() {
            text.push('\n');
        }

        *self = Self::parse(&text)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn sample_token() -> TokenRecord {
        TokenRecord {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap(),
            scope: vec!["openid".to_string()],
        }
    }

    #[test]
    fn test_unpack_api_key_splits_on_first_colon() {
        assert_eq!(
            unpack_api_key("id:sec:ret"),
            ("id".to_string(), "sec:ret".to_string())
        );
        assert_eq!(
            unpack_api_key("abc:def"),
            ("abc".to_string(), "def".to_string())
        );
        assert_eq!(unpack_api_key("abc:"), ("abc".to_string(), String::new()));
    }

    #[test]
    fn test_unpack_api_key_without_colon() {
        assert_eq!(unpack_api_key("abc"), ("abc".to_string(), String::new()));
    }

    #[test]
    fn test_credentials_from_client_pair() {
        let file = ConfigFile::parse(
            "[credentials]\n\
             client_id = cid\n\
             client_secret = csecret\n\
             username = user\n\
             password = pass\n\
             auth_url = https://auth.example/token\n",
        )
        .unwrap();
        let creds = file.credentials().unwrap();
        assert_eq!(creds.client_id, "cid");
        assert_eq!(creds.client_secret, "csecret");
        assert_eq!(creds.auth_url, "https://auth.example/token");
    }

    #[test]
    fn test_credentials_from_api_key() {
        let file = ConfigFile::parse(
            "[credentials]\napi_key = abc:def:ghi\nusername = user\npassword = pass\n",
        )
        .unwrap();
        let creds = file.credentials().unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret, "def:ghi");
        assert_eq!(creds.auth_url, GBDX_AUTH_URL);
    }

    #[test]
    fn test_quoted_api_key() {
        let file = ConfigFile::parse("[credentials]\napi_key = \"abc:def\"\n").unwrap();
        let creds = file.credentials().unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret, "def");
    }

    #[test]
    fn test_client_pair_wins_over_api_key() {
        let file = ConfigFile::parse(
            "[credentials]\n\
             client_id = cid\n\
             client_secret = csecret\n\
             api_key = abc:def\n",
        )
        .unwrap();
        assert_eq!(file.credentials().unwrap().client_id, "cid");
    }

    #[test]
    fn test_file_written_by_configure_of_older_tool() {
        let file = ConfigFile::parse(
            "[gbdx]\n\
             auth_url = https://geobigdata.io/auth/v1/oauth/token/\n\
             user_name = me@example.com\n\
             user_password = s3cr3t!x\n\
             client_id = my-client\n\
             client_secret = my\\secret\n\
             \n",
        )
        .unwrap();
        let creds = file.credentials().unwrap();
        assert_eq!(creds.username, "me@example.com");
        assert_eq!(creds.password, "s3cr3t!x");
        assert_eq!(creds.client_id, "my-client");
        assert_eq!(creds.client_secret, "my\\secret");
        assert_eq!(creds.auth_url, "https://geobigdata.io/auth/v1/oauth/token/");
        assert!(file.token().unwrap().is_none());
    }

    #[test]
    fn test_legacy_token_section_is_read() {
        let file = ConfigFile::parse(
            "[gbdx]\n\
             client_id = cid\n\
             client_secret = csecret\n\
             \n\
             [gbdx_token]\n\
             json = {\"access_token\": \"old\", \"token_type\": \"Bearer\", \
             \"expires_in\": 604800, \"refresh_token\": \"rt\", \
             \"expires_at\": 1900000000.75, \"scope\": [\"read\", \"write\"]}\n\
             \n",
        )
        .unwrap();
        let token = file.token().unwrap().unwrap();
        assert_eq!(token.access_token, "old");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(token.scope, vec!["read", "write"]);
    }

    #[test]
    fn test_set_token_migrates_legacy_token_section() {
        let mut file = ConfigFile::parse(
            "[gbdx]\n\
             client_id = cid\n\
             client_secret = csecret\n\
             \n\
             [gbdx_token]\n\
             json = {\"access_token\": \"old\", \"expires_at\": 1}\n\
             \n",
        )
        .unwrap();
        file.set_token(&sample_token()).unwrap();

        let text = file.as_str();
        assert_eq!(text.matches("[gbdx_token]").count(), 0);
        assert_eq!(text.matches("[token]").count(), 1);
        assert!(text.starts_with("[gbdx]\nclient_id = cid\nclient_secret = csecret\n"));
        assert_eq!(file.token().unwrap(), Some(sample_token()));
        assert_eq!(file.credentials().unwrap().client_id, "cid");
    }

    #[test]
    fn test_missing_client_credentials() {
        let file = ConfigFile::parse(
            "[credentials]\nclient_id = only-half\nusername = user\npassword = pass\n",
        )
        .unwrap();
        assert!(matches!(
            file.credentials(),
            Err(ConfigError::MissingClientCredentials)
        ));
    }

    #[test]
    fn test_api_key_alone_is_enough_to_load() {
        let file = ConfigFile::parse("[credentials]\napi_key = abc:def\n").unwrap();
        let creds = file.credentials().unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret, "def");
        assert!(creds.username.is_empty());
        assert!(creds.password.is_empty());
    }

    #[test]
    fn test_missing_section() {
        let file = ConfigFile::parse("[other]\nkey = 1\n").unwrap();
        assert!(matches!(file.credentials(), Err(ConfigError::MissingSection)));
    }

    #[test]
    fn test_unparsable_file() {
        assert!(matches!(
            ConfigFile::parse("[credentials\nnot valid"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_no_token_section() {
        let file = ConfigFile::parse("[credentials]\napi_key = a:b\n").unwrap();
        assert!(file.token().unwrap().is_none());
    }

    #[test]
    fn test_token_roundtrip_through_text() {
        let mut file = ConfigFile::parse("[credentials]\napi_key = a:b\n").unwrap();
        file.set_token(&sample_token()).unwrap();
        let reparsed = ConfigFile::parse(file.as_str()).unwrap();
        assert_eq!(reparsed.token().unwrap(), Some(sample_token()));
    }

    #[test]
    fn test_set_token_keeps_other_sections_as_written() {
        let original = "# my GBDX account\n\
                        [credentials]\n\
                        ; from the portal\n\
                        api_key = 'abc:def'\n\
                        username=user\n\
                        password =   pass\n\
                        \n\
                        [proxy]\n\
                        host = proxy.local\n";
        let mut file = ConfigFile::parse(original).unwrap();
        file.set_token(&sample_token()).unwrap();

        assert!(file.as_str().starts_with(original));
        assert_eq!(file.credentials().unwrap().client_secret, "def");
        assert_eq!(file.token().unwrap(), Some(sample_token()));
    }

    #[test]
    fn test_set_token_is_idempotent() {
        let mut file = ConfigFile::parse("[credentials]\napi_key = a:b\n").unwrap();
        file.set_token(&sample_token()).unwrap();
        let first = file.as_str().to_string();
        file.set_token(&sample_token()).unwrap();
        assert_eq!(file.as_str(), first);
    }

    #[test]
    fn test_malformed_token_section() {
        let file = ConfigFile::parse("[token]\njson = not json\n").unwrap();
        assert!(matches!(file.token(), Err(ConfigError::Token(_))));
    }

    #[test]
    fn test_clear_token() {
        let mut file = ConfigFile::parse("[credentials]\napi_key = a:b\n").unwrap();
        assert!(!file.clear_token().unwrap());
        file.set_token(&sample_token()).unwrap();
        assert!(file.clear_token().unwrap());
        assert!(file.token().unwrap().is_none());
        assert_eq!(file.as_str(), "[credentials]\napi_key = a:b\n");
    }

    #[test]
    fn test_with_credentials_renders_plain_ini() {
        let creds = Credentials {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            auth_url: GBDX_AUTH_URL.to_string(),
        };
        let file = ConfigFile::with_credentials(&creds).unwrap();
        assert_eq!(
            file.as_str(),
            format!(
                "[credentials]\nusername = user\npassword = pass\nclient_id = cid\n\
                 client_secret = csecret\nauth_url = {}\n",
                GBDX_AUTH_URL
            )
        );
        assert_eq!(file.credentials().unwrap(), creds);
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials {
            client_id: "cid".to_string(),
            client_secret: "topsecret".to_string(),
            username: "user".to_string(),
            password: "hunter2".to_string(),
            auth_url: GBDX_AUTH_URL.to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("hunter2"));
    }
}
