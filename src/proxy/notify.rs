//! `POST /api/notify-vps` — hand a finished onboarding to the provisioning
//! webhook.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::relay::NotifyRequest;

pub async fn notify_vps(
    State(state): State<AppState>,
    payload: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let webhook = state
        .vps_webhook
        .as_deref()
        .ok_or(ApiError::NotConfigured("WEBHOOK_VPS or VPS_SECRET"))?;
    let Json(request) = payload?;
    if !request.missing_fields().is_empty() {
        return Err(ApiError::BadRequest("sessionId and email are required".into()));
    }

    info!(session_id = %request.session_id, "Forwarding provisioning request");
    let resp = webhook.forward(&request).await.map_err(|e| {
        warn!(error = %e, "VPS webhook unreachable");
        ApiError::BadGateway("VPS webhook unreachable".into())
    })?;

    if !resp.is_success() {
        warn!(status = resp.status, "VPS webhook returned an error");
        return Err(ApiError::Upstream {
            status: resp.relay_status(),
            error: format!("VPS webhook error: {}", resp.status),
            details: resp.body,
        });
    }

    let ack = serde_json::from_str(&resp.body).unwrap_or_else(|_| serde_json::json!({ "success": true }));
    Ok(Json(ack))
}
