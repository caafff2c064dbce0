//! Token record and the sink that persists it

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Seconds before `expires_at` at which a token stops being used.
pub const SAFETY_MARGIN_SECS: i64 = 600;

/// Lifetime assumed when the auth server omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// OAuth2 access/refresh token pair with its absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(with = "epoch_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, with = "scope_list")]
    pub scope: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenRecord {
    /// Whether the token is past its expiry once the safety margin is applied.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_in(now) <= Duration::zero()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Usable lifetime left at `now`, negative once expired.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - Duration::seconds(SAFETY_MARGIN_SECS) - now
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Receives every token a session mints or refreshes.
///
/// The session calls this after each successful grant or refresh exchange,
/// before the new token is used for a request.
pub trait TokenSink: Send {
    fn persist(&mut self, token: &TokenRecord) -> Result<()>;
}

impl<F> TokenSink for F
where
    F: FnMut(&TokenRecord) -> Result<()> + Send,
{
    fn persist(&mut self, token: &TokenRecord) -> Result<()> {
        (*self)(token)
    }
}

/// Sink for environment-backed sessions: tokens live only as long as the process.
#[derive(Debug, Default)]
pub struct EphemeralSink;

impl TokenSink for EphemeralSink {
    fn persist(&mut self, _token: &TokenRecord) -> Result<()> {
        tracing::debug!("Token kept in memory only (environment credentials)");
        Ok(())
    }
}

/// Epoch seconds on the wire; fractional values from older files are truncated.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.timestamp())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("expires_at is not a finite number"));
        }
        DateTime::from_timestamp(secs.trunc() as i64, 0)
            .ok_or_else(|| de::Error::custom(format!("expires_at {} out of range", secs)))
    }
}

/// Scopes are a space separated string from the server, a list once stored.
mod scope_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        Ok(match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::Joined(s)) => s.split_whitespace().map(String::from).collect(),
            Some(Repr::List(list)) => list,
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_expiring_at(expires_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            token_type: "Bearer".to_string(),
            expires_at,
            scope: vec![],
        }
    }

    #[test]
    fn test_safety_margin_applies() {
        let now = Utc::now();
        // Nominally valid for five more minutes, but inside the margin.
        let token = record_expiring_at(now + Duration::seconds(300));
        assert!(token.is_expired_at(now));

        let token = record_expiring_at(now + Duration::seconds(SAFETY_MARGIN_SECS + 60));
        assert!(!token.is_expired_at(now));
        assert_eq!(token.expires_in(now), Duration::seconds(60));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let token = record_expiring_at(now + Duration::seconds(SAFETY_MARGIN_SECS));
        assert!(token.is_expired_at(now));
    }

    #[test]
    fn test_legacy_token_json() {
        // Shape written by older tools: float expiry, list scope, extra keys.
        let json = r#"{
            "access_token": "abc",
            "refresh_token": "def",
            "token_type": "Bearer",
            "expires_in": 604800,
            "expires_at": 1446840960.123,
            "scope": ["read", "write"]
        }"#;
        let token: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(token.expires_at.timestamp(), 1446840960);
        assert_eq!(token.scope, vec!["read", "write"]);
        assert_eq!(token.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn test_scope_string_is_split() {
        let json = r#"{"access_token":"a","expires_at":10,"scope":"read write"}"#;
        let token: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(token.scope, vec!["read", "write"]);
        assert_eq!(token.token_type, "Bearer");
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = record_expiring_at(Utc::now());
        let shown = format!("{:?}", token);
        assert!(!shown.contains("\"at\""));
        assert!(!shown.contains("\"rt\""));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |token: &TokenRecord| -> Result<()> {
                seen.push(token.access_token.clone());
                Ok(())
            };
            sink.persist(&record_expiring_at(Utc::now())).unwrap();
        }
        assert_eq!(seen, vec!["at"]);
    }
}
