//! Authenticated access to the GBDX imagery platform
//!
//! Opens an OAuth2 session from environment or config-file credentials,
//! keeps its token fresh and persisted, and wraps a few service endpoints.
//!
//! ```no_run
//! # async fn run() -> gbdx_auth::Result<()> {
//! let mut session = gbdx_auth::get_session(None).await?;
//! let status = gbdx_auth::api::get_order_status(&mut session, "1234").await?;
//! println!("{}", status);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;

pub use api::{get_session, GbdxSession, SessionBuilder};
pub use auth::{TokenRecord, TokenSink, TokenStore};
pub use config::{CredentialSource, Credentials};
pub use error::{ConfigError, Error, Result};
