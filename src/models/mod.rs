//! Data models for GBDX responses

mod catalog;
mod s3;

pub use catalog::*;
pub use s3::*;
