//! Checkout endpoints — create a hosted checkout session for a plan tier
//! and report on it after payment.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, header},
};
use tracing::{error, info, warn};

use super::payments::{CheckoutParams, is_valid_session_id};
use super::{ApiError, AppState};
use crate::error::PaymentError;
use crate::relay::{CheckoutRedirect, CheckoutStatus, CreateCheckoutRequest, PlanTier};

pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutRedirect>, ApiError> {
    let Json(body) = payload?;
    let tier: PlanTier = body.tier.parse().map_err(ApiError::BadRequest)?;

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|o| o.trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .unwrap_or(&state.public_origin);

    let params = CheckoutParams {
        price_id: state.tier_prices.price_for(tier).to_string(),
        success_url: format!("{origin}/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{origin}/#pricing"),
    };

    let session = state
        .payments
        .create_checkout_session(&params)
        .await
        .map_err(|e| {
            error!(tier = %tier, error = %e, "Checkout session creation failed");
            ApiError::Internal("Failed to create checkout session".into())
        })?;

    info!(tier = %tier, checkout_session = %session.id, "Checkout session created");
    Ok(Json(CheckoutRedirect { url: session.url }))
}

pub async fn checkout_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<CheckoutStatus>, ApiError> {
    if !is_valid_session_id(&session_id) {
        return Err(ApiError::NotFound("Session not found".into()));
    }

    match state.payments.retrieve_checkout_session(&session_id).await {
        Ok(details) => Ok(Json(CheckoutStatus {
            status: details.payment_status,
            customer_email: details.customer_email,
            subscription_status: details.subscription_status,
        })),
        Err(PaymentError::NotFound) => Err(ApiError::NotFound("Session not found".into())),
        Err(e) => {
            warn!(checkout_session = %session_id, error = %e, "Session retrieval failed");
            Err(ApiError::BadGateway(
                "Could not reach the payment provider".into(),
            ))
        }
    }
}
