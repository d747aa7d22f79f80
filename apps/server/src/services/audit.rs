//! Audit events posted to the metrics service

use crate::clients::MetricsClient;
use crate::services::locator;
use crate::Result;
use crvs_models::Bundle;

pub const REQUEST_CORRECTION_ACTION: &str = "request-correction";

/// Record a correction request against the bundle's event.
///
/// The caller's mutation has already been persisted; a failure here is
/// reported but not rolled back.
pub async fn create_new_audit_event(
    bundle: &Bundle,
    token: &str,
    metrics: &dyn MetricsClient,
) -> Result<()> {
    let event = locator::composition(bundle)?.event_type()?;
    let bearer = format!("Bearer {token}");
    metrics
        .post_event(event, REQUEST_CORRECTION_ACTION, bundle, &bearer)
        .await
        .inspect_err(|e| tracing::error!(error = %e, event = %event, "Failed to post audit event"))?;
    tracing::info!(event = %event, action = REQUEST_CORRECTION_ACTION, "Posted audit event");
    Ok(())
}
