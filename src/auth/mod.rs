//! Authentication for the GBDX platform
//!
//! Implements the OAuth2 password grant against the GBDX auth endpoint,
//! keeps the resulting token pair fresh and persists it between runs.

pub mod oauth;
pub mod setup;
pub mod store;
pub mod tokens;

pub use oauth::Authenticator;
pub use store::TokenStore;
pub use tokens::{EphemeralSink, TokenRecord, TokenSink, SAFETY_MARGIN_SECS};

/// Token endpoint of the public GBDX deployment.
pub const GBDX_AUTH_URL: &str = "https://geobigdata.io/auth/v1/oauth/token/";
