//! Temporary S3 credentials

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scoped, short-lived access to the user's customer data bucket.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Credentials {
    pub bucket: String,
    pub prefix: String,
    #[serde(rename = "S3_access_key", default)]
    pub access_key: Option<String>,
    #[serde(rename = "S3_secret_key", default)]
    pub secret_key: Option<String>,
    #[serde(rename = "S3_session_token", default)]
    pub session_token: Option<String>,
    /// Any fields not modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl S3Credentials {
    /// `s3://{bucket}/{prefix}`
    pub fn s3_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3creds_response() {
        let json = r#"{
            "S3_access_key": "AKIA",
            "S3_secret_key": "shh",
            "S3_session_token": "tok",
            "bucket": "gbd-customer-data",
            "prefix": "58600248-2927-4523-b44b-5fec3d278c09",
            "expiration": 3600
        }"#;
        let creds: S3Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(
            creds.s3_url(),
            "s3://gbd-customer-data/58600248-2927-4523-b44b-5fec3d278c09"
        );
        assert_eq!(creds.access_key.as_deref(), Some("AKIA"));
        assert_eq!(creds.extra.get("expiration"), Some(&serde_json::json!(3600)));
        assert!(!format!("{:?}", creds).contains("shh"));
    }
}
