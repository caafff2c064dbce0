//! Browse thumbnail endpoint (/thumbnails/v1/browse)

use image::{DynamicImage, ImageFormat};
use url::Url;

use crate::api::client::{check_response, GbdxSession};
use crate::error::{Error, Result};

fn thumbnail_url(session: &GbdxSession, catalog_id: &str) -> Result<Url> {
    let file_name = format!("{}.medium.png", catalog_id);
    session.endpoint(&["thumbnails", "v1", "browse", &file_name])
}

async fn fetch(session: &mut GbdxSession, url: &Url) -> Result<Vec<u8>> {
    let resp = session.get(url.as_str()).await?;
    let resp = check_response(resp, url.as_str()).await?;
    let bytes = resp.bytes().await.map_err(|source| Error::Transport {
        url: url.to_string(),
        source,
    })?;
    Ok(bytes.to_vec())
}

/// Decoded medium browse thumbnail for `catalog_id`.
///
/// A non-success status fails with [`Error::Http`] before any decoding.
pub async fn get_thumbnail(
    session: &mut GbdxSession,
    catalog_id: &str,
) -> Result<DynamicImage> {
    let url = thumbnail_url(session, catalog_id)?;
    let bytes = fetch(session, &url).await?;
    image::load_from_memory_with_format(&bytes, ImageFormat::Png).map_err(|e| Error::Decode {
        what: "thumbnail image",
        url: url.to_string(),
        reason: e.to_string(),
    })
}
