//! Temporary S3 credentials endpoint (/s3creds/v1/prefix)

use crate::api::client::GbdxSession;
use crate::error::Result;
use crate::models::S3Credentials;

pub const DEFAULT_S3_DURATION_SECS: u64 = 3600;

/// Credentials valid for `duration_secs`, with their `s3://bucket/prefix` URL.
pub async fn get_s3creds(
    session: &mut GbdxSession,
    duration_secs: u64,
) -> Result<(String, S3Credentials)> {
    let mut url = session.endpoint(&["s3creds", "v1", "prefix"])?;
    url.query_pairs_mut()
        .append_pair("duration", &duration_secs.to_string());

    let creds: S3Credentials = session.get_json(url.as_str()).await?;
    Ok((creds.s3_url(), creds))
}
