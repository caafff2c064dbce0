//! Order status endpoint (/orders/v1/status)

use crate::api::client::GbdxSession;
use crate::error::Result;

/// Status information for an imagery order, as returned by the service.
pub async fn get_order_status(
    session: &mut GbdxSession,
    order_id: &str,
) -> Result<serde_json::Value> {
    let url = session.endpoint(&["orders", "v1", "status", order_id])?;
    session.get_json(url.as_str()).await
}
