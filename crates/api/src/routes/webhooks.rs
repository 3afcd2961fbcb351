//! Inbound payment-provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlement::{PaymentEvent, SettlementResult};

use crate::{AppState, Backend};

/// POST /webhooks/payment/{provider} — consume one provider delivery.
///
/// Every settled outcome, including payload validation rejects,
/// answers 200 so the provider stops retrying a delivery that can
/// never apply. Non-2xx responses are left to transport failures
/// outside the handler, where provider redelivery is wanted and safe
/// under the idempotency guard.
#[tracing::instrument(skip(state, event))]
pub async fn payment<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(provider): Path<String>,
    Json(event): Json<PaymentEvent>,
) -> Json<SettlementResult> {
    match state.settlement.handle(&provider, &event).await {
        Ok(result) => Json(result),
        Err(err) => {
            metrics::counter!("webhook_rejected_total").increment(1);
            tracing::warn!(provider, error = %err, "webhook payload rejected");
            Json(SettlementResult::unapplied())
        }
    }
}
