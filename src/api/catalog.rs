//! Catalog lookup endpoint (/catalog/v1/record)

use reqwest::StatusCode;

use crate::api::client::{check_response, GbdxSession};
use crate::error::{Error, Result};
use crate::models::CatalogRecord;

/// Catalog record for `catalog_id`, or `None` if the catalog has no such image.
pub async fn get_catalog_record(
    session: &mut GbdxSession,
    catalog_id: &str,
) -> Result<Option<CatalogRecord>> {
    let url = session.endpoint(&["catalog", "v1", "record", catalog_id])?;
    let resp = session.get(url.as_str()).await?;
    if resp.status() == StatusCode::NOT_FOUND {
        tracing::debug!("No catalog record for {}", catalog_id);
        return Ok(None);
    }

    let resp = check_response(resp, url.as_str()).await?;
    resp.json().await.map(Some).map_err(|e| Error::Decode {
        what: "catalog record",
        url: url.to_string(),
        reason: e.to_string(),
    })
}
