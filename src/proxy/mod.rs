//! Backend proxy — thin HTTP endpoints between the wizard and the payment
//! provider / automation webhooks. Secrets stay on this side.

pub mod chat;
pub mod checkout;
pub mod notify;
pub mod payments;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{ProxyConfig, TierPrices, WebhookConfig};
use payments::PaymentProvider;
use webhook::WebhookClient;

pub use payments::{CheckoutParams, CreatedSession, SessionDetails, StripeProvider};

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<dyn PaymentProvider>,
    pub tier_prices: TierPrices,
    /// Used for redirect URLs when the request carries no `Origin`.
    pub public_origin: String,
    pub chat_webhook: Option<Arc<WebhookClient>>,
    pub vps_webhook: Option<Arc<WebhookClient>>,
}

impl AppState {
    pub fn new(
        config: &ProxyConfig,
        client: reqwest::Client,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        let webhook = |name: &'static str, cfg: &Option<WebhookConfig>| {
            cfg.clone()
                .map(|cfg| Arc::new(WebhookClient::new(name, client.clone(), cfg)))
        };
        Self {
            payments,
            tier_prices: config.tier_prices.clone(),
            public_origin: config.public_origin.trim_end_matches('/').to_string(),
            chat_webhook: webhook("chat", &config.chat_webhook),
            vps_webhook: webhook("vps", &config.vps_webhook),
        }
    }
}

/// Build the proxy router.
pub fn proxy_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/create-checkout-session",
            post(checkout::create_checkout_session),
        )
        .route(
            "/api/checkout-session/{session_id}",
            get(checkout::checkout_session),
        )
        .route("/api/notify-vps", post(notify::notify_vps))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-host-proxy"
    }))
}

/// Every failure a handler can answer with. Rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A required backend value is missing; the endpoint refuses to run.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// A webhook answered with a non-2xx status; relayed as-is.
    #[error("{error}")]
    Upstream {
        status: StatusCode,
        error: String,
        details: String,
    },

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotConfigured(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::NotConfigured(what) = &self {
            warn!(missing = what, "Endpoint called without required configuration");
        }
        let body = match &self {
            Self::Upstream { error, details, .. } => {
                serde_json::json!({ "error": error, "details": details })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
