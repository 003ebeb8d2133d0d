//! Relay clients — the wizard's view of the backend proxy.
//!
//! The relay never retries on its own; retry is a user action. Every
//! failure is normalised into a [`RelayError`] at this boundary.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::call::{CallState, bounded};
use super::types::{
    ChatReply, ChatRequest, CheckoutRedirect, CheckoutStatus, CreateCheckoutRequest, NotifyRequest,
    PlanTier,
};
use crate::error::RelayError;

/// Conversation relay (`POST /api/chat`).
#[async_trait]
pub trait ChatRelay: Send + Sync {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, RelayError>;
}

/// Checkout relay (`POST /api/create-checkout-session`,
/// `GET /api/checkout-session/{id}`).
#[async_trait]
pub trait CheckoutRelay: Send + Sync {
    async fn create_checkout_session(&self, tier: &str) -> Result<CheckoutRedirect, RelayError>;

    async fn fetch_checkout_session(&self, session_id: &str)
    -> Result<CheckoutStatus, RelayError>;
}

/// Provisioning side channel (`POST /api/notify-vps`).
#[async_trait]
pub trait NotifyRelay: Send + Sync {
    async fn notify_vps(&self, request: &NotifyRequest) -> Result<(), RelayError>;
}

/// HTTP implementation of every relay, talking to the backend proxy.
pub struct HttpRelay {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RelayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(path, resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_json(path, resp).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T, RelayError> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        debug!(path, status = status.as_u16(), "Relay response");

        if status == StatusCode::NOT_FOUND {
            return Err(RelayError::NotFound);
        }
        if status.is_client_error() {
            return Err(RelayError::Rejected(error_message(&body)));
        }
        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| RelayError::Malformed(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else {
            RelayError::Network(e.to_string())
        }
    }
}

/// Pull `error` out of a proxy error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ChatRelay for HttpRelay {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, RelayError> {
        self.post_json("/api/chat", request).await
    }
}

#[async_trait]
impl CheckoutRelay for HttpRelay {
    async fn create_checkout_session(&self, tier: &str) -> Result<CheckoutRedirect, RelayError> {
        let body = CreateCheckoutRequest {
            tier: tier.to_string(),
        };
        self.post_json("/api/create-checkout-session", &body).await
    }

    async fn fetch_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutStatus, RelayError> {
        // Ids with path separators cannot exist; don't let them rewrite the path.
        if session_id.is_empty() || session_id.contains(['/', '?', '#']) {
            return Err(RelayError::NotFound);
        }
        self.get_json(&format!("/api/checkout-session/{session_id}"))
            .await
    }
}

#[async_trait]
impl NotifyRelay for HttpRelay {
    async fn notify_vps(&self, request: &NotifyRequest) -> Result<(), RelayError> {
        let _ack: serde_json::Value = self.post_json("/api/notify-vps", request).await?;
        Ok(())
    }
}

/// What the post-payment screen should offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentConfirmation {
    Confirmed(CheckoutStatus),
    /// The session does not exist; offer "return home".
    NotFound,
    /// Transient failure; offer "retry".
    Retryable(RelayError),
}

/// Look up a checkout session and classify the outcome for the UI.
pub async fn confirm_payment(
    relay: &dyn CheckoutRelay,
    session_id: &str,
    timeout: Duration,
) -> PaymentConfirmation {
    match bounded(timeout, relay.fetch_checkout_session(session_id)).await {
        Ok(status) => PaymentConfirmation::Confirmed(status),
        Err(e) if e.is_not_found() => PaymentConfirmation::NotFound,
        Err(e) => {
            warn!(checkout_session = session_id, error = %e, "Checkout lookup failed");
            PaymentConfirmation::Retryable(e)
        }
    }
}

/// Create a hosted checkout session for `tier`, tracking the request in
/// `call`. A call left `Pending` by an abandoned attempt is restarted.
pub async fn start_checkout(
    relay: &dyn CheckoutRelay,
    call: &mut CallState,
    tier: PlanTier,
    timeout: Duration,
) -> Result<CheckoutRedirect, RelayError> {
    if !call.begin() {
        debug!(%tier, "Restarting abandoned checkout request");
        *call = CallState::Pending;
    }
    let result = bounded(timeout, relay.create_checkout_session(tier.as_str())).await;
    call.settle(&result);
    if let Err(e) = &result {
        warn!(%tier, error = %e, "Checkout session could not be created");
    }
    result
}

/// Run a side-channel call in the background. Failures are logged and
/// dropped; the caller never waits on it.
pub fn spawn_best_effort<F>(call: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), RelayError>> + Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            Ok(()) => debug!(call, "Best-effort call delivered"),
            Err(e) => warn!(call, error = %e, "Best-effort call failed"),
        }
    })
}

/// Tell the provisioning backend about a finished onboarding.
pub fn notify_provisioning(relay: Arc<dyn NotifyRelay>, request: NotifyRequest) -> JoinHandle<()> {
    spawn_best_effort("notify-vps", async move { relay.notify_vps(&request).await })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::session::SessionId;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn relay(base: &str) -> HttpRelay {
        HttpRelay::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"bad tier"}"#), "bad tier");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn chat_reply_is_decoded() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(req): Json<ChatRequest>| async move {
                Json(ChatReply::active(format!("echo: {}", req.message)))
            }),
        );
        let base = serve(app).await;
        let reply = relay(&base)
            .send_message(&ChatRequest::new(SessionId::from("s"), "hi"))
            .await
            .unwrap();
        assert_eq!(reply.message, "echo: hi");
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let app = Router::new()
            .route(
                "/api/checkout-session/{id}",
                get(|Path(id): Path<String>| async move {
                    match id.as_str() {
                        "cs_missing" => (AxumStatus::NOT_FOUND, "{}"),
                        _ => (AxumStatus::BAD_GATEWAY, r#"{"error":"upstream"}"#),
                    }
                }),
            )
            .route(
                "/api/create-checkout-session",
                post(|| async { (AxumStatus::BAD_REQUEST, r#"{"error":"Invalid tier"}"#) }),
            )
            .route("/api/chat", post(|| async { "not json" }));
        let base = serve(app).await;
        let relay = relay(&base);

        assert_eq!(
            relay.fetch_checkout_session("cs_missing").await,
            Err(RelayError::NotFound)
        );
        assert_eq!(
            relay.fetch_checkout_session("cs_flaky").await,
            Err(RelayError::Status {
                status: 502,
                message: "upstream".into()
            })
        );
        assert_eq!(
            relay.create_checkout_session("nope").await,
            Err(RelayError::Rejected("Invalid tier".into()))
        );
        assert!(matches!(
            relay
                .send_message(&ChatRequest::new(SessionId::from("s"), "hi"))
                .await,
            Err(RelayError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn confirm_payment_distinguishes_not_found() {
        let app = Router::new().route(
            "/api/checkout-session/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "cs_ok" {
                    Ok(Json(CheckoutStatus {
                        status: "paid".into(),
                        customer_email: Some("a@b.c".into()),
                        subscription_status: Some("active".into()),
                    }))
                } else {
                    Err(AxumStatus::NOT_FOUND)
                }
            }),
        );
        let base = serve(app).await;
        let relay = relay(&base);
        let timeout = Duration::from_secs(5);

        assert!(matches!(
            confirm_payment(&relay, "cs_ok", timeout).await,
            PaymentConfirmation::Confirmed(s) if s.is_paid()
        ));
        assert_eq!(
            confirm_payment(&relay, "cs_gone", timeout).await,
            PaymentConfirmation::NotFound
        );
        assert_eq!(
            confirm_payment(&relay, "../etc", timeout).await,
            PaymentConfirmation::NotFound
        );
    }

    #[tokio::test]
    async fn unreachable_proxy_is_retryable() {
        // Nothing listens on port 9 locally.
        let relay = relay("http://127.0.0.1:9");
        assert!(matches!(
            confirm_payment(&relay, "cs_x", Duration::from_secs(5)).await,
            PaymentConfirmation::Retryable(_)
        ));
    }

    /// Checkout relay that answers after `delay`.
    struct SlowCheckout {
        delay: Duration,
    }

    #[async_trait]
    impl CheckoutRelay for SlowCheckout {
        async fn create_checkout_session(
            &self,
            tier: &str,
        ) -> Result<CheckoutRedirect, RelayError> {
            tokio::time::sleep(self.delay).await;
            Ok(CheckoutRedirect {
                url: format!("https://pay.example/{tier}"),
            })
        }

        async fn fetch_checkout_session(
            &self,
            _session_id: &str,
        ) -> Result<CheckoutStatus, RelayError> {
            Err(RelayError::NotFound)
        }
    }

    #[tokio::test]
    async fn start_checkout_times_out_then_recovers() {
        let timeout = Duration::from_millis(50);
        let mut call = CallState::default();

        let slow = SlowCheckout {
            delay: Duration::from_secs(5),
        };
        let result = start_checkout(&slow, &mut call, PlanTier::Pro, timeout).await;
        assert_eq!(result, Err(RelayError::Timeout(timeout)));
        assert_eq!(call, CallState::Failed(RelayError::Timeout(timeout)));

        let fast = SlowCheckout {
            delay: Duration::ZERO,
        };
        let redirect = start_checkout(&fast, &mut call, PlanTier::Pro, timeout)
            .await
            .unwrap();
        assert_eq!(redirect.url, "https://pay.example/pro");
        assert_eq!(call, CallState::Succeeded);
    }

    #[tokio::test]
    async fn start_checkout_restarts_abandoned_call() {
        let mut call = CallState::Pending;
        let fast = SlowCheckout {
            delay: Duration::ZERO,
        };
        start_checkout(&fast, &mut call, PlanTier::Luxury, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(call, CallState::Succeeded);
    }

    struct CountingNotify {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotifyRelay for CountingNotify {
        async fn notify_vps(&self, _request: &NotifyRequest) -> Result<(), RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::Network("offline".into()))
        }
    }

    #[tokio::test]
    async fn notify_provisioning_swallows_failures() {
        let relay = Arc::new(CountingNotify {
            calls: AtomicUsize::new(0),
        });
        let request = NotifyRequest {
            session_id: "s".into(),
            email: "a@b.c".into(),
            stripe_session_id: None,
            agent_name: None,
            channel: None,
            selected_scenarios: Vec::new(),
            personality: Vec::new(),
        };
        notify_provisioning(relay.clone(), request).await.unwrap();
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
    }
}
