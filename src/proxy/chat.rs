//! `POST /api/chat` — forward a conversation turn to the chat webhook and
//! normalise whatever comes back.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::relay::{ChatReply, ChatRequest, ChatStatus};
use crate::wizard::model::UserProfile;

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let webhook = state
        .chat_webhook
        .as_deref()
        .ok_or(ApiError::NotConfigured("WEBHOOK_CHAT or CHAT_SECRET"))?;
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }

    info!(
        session_id = %request.session_id,
        first = request.context.is_some(),
        skipped = request.skipped,
        "Forwarding chat message"
    );
    let resp = webhook.forward(&request).await.map_err(|e| {
        warn!(error = %e, "Chat webhook unreachable");
        ApiError::BadGateway("Chat webhook unreachable".into())
    })?;

    if !resp.is_success() {
        warn!(status = resp.status, "Chat webhook returned an error");
        return Err(ApiError::Upstream {
            status: resp.relay_status(),
            error: format!("Chat webhook error: {}", resp.status),
            details: resp.body,
        });
    }

    normalize_reply(&resp.body).map(Json)
}

/// Turn a webhook body into a [`ChatReply`].
///
/// Accepts `message` or `reply` for the text and `status` or `done` for the
/// state. A body that is not JSON at all is taken as plain reply text.
pub fn normalize_reply(body: &str) -> Result<ChatReply, ApiError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                return Err(ApiError::BadGateway("Chat webhook returned an empty reply".into()));
            }
            return Ok(ChatReply::active(text));
        }
    };

    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(text) if !text.trim().is_empty() => return Ok(ChatReply::active(text)),
        _ => {
            return Err(ApiError::BadGateway(
                "Chat webhook returned an unexpected reply".into(),
            ));
        }
    };

    let message = obj
        .get("message")
        .or_else(|| obj.get("reply"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadGateway("Chat webhook reply has no message".into()))?
        .to_string();

    let status = obj
        .get("status")
        .and_then(|s| serde_json::from_value::<ChatStatus>(s.clone()).ok())
        .unwrap_or_else(|| match obj.get("done").and_then(Value::as_bool) {
            Some(true) => ChatStatus::Complete,
            _ => ChatStatus::Active,
        });

    let profile = obj
        .get("profile")
        .filter(|p| p.is_object())
        .and_then(|p| serde_json::from_value::<UserProfile>(p.clone()).ok());

    let quick_replies = obj
        .get("quickReplies")
        .and_then(|q| serde_json::from_value::<Vec<String>>(q.clone()).ok())
        .unwrap_or_default();

    Ok(ChatReply {
        message,
        status,
        profile,
        quick_replies,
    })
}
