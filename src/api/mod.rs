//! API client module for GBDX

mod catalog;
pub mod client;
mod orders;
mod s3creds;
mod thumbnails;

pub use catalog::get_catalog_record;
pub use client::{get_session, GbdxSession, SessionBuilder, GBDX_BASE_URL};
pub use orders::get_order_status;
pub use s3creds::{get_s3creds, DEFAULT_S3_DURATION_SECS};
pub use thumbnails::get_thumbnail;
