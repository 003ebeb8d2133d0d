//! Integration tests for the backend proxy.
//!
//! Each test spins up the proxy on a random port (plus a fake automation
//! webhook where needed) and talks to it over real HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use agent_host::config::{ProxyConfig, TierPrices, WebhookConfig};
use agent_host::error::{PaymentError, RelayError};
use agent_host::proxy::payments::PaymentProvider;
use agent_host::proxy::{AppState, CheckoutParams, CreatedSession, SessionDetails, proxy_routes};
use agent_host::relay::{
    ChatRelay, ChatRequest, ChatStatus, CheckoutRelay, HttpRelay, NotifyRelay, NotifyRequest,
};
use agent_host::session::SessionId;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Payment provider stub that records what it was asked.
#[derive(Default)]
struct FakePayments {
    creates: Mutex<Vec<CheckoutParams>>,
    retrieves: AtomicUsize,
}

impl FakePayments {
    fn calls(&self) -> usize {
        self.creates.lock().unwrap().len() + self.retrieves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CreatedSession, PaymentError> {
        self.creates.lock().unwrap().push(params.clone());
        if params.price_id == "price_broken" {
            return Err(PaymentError::Api {
                status: 500,
                message: "provider exploded".into(),
            });
        }
        Ok(CreatedSession {
            id: "cs_test_new".into(),
            url: format!("https://pay.example/{}", params.price_id),
        })
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<SessionDetails, PaymentError> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        match id {
            "cs_test_paid" => Ok(SessionDetails {
                payment_status: "paid".into(),
                customer_email: Some("pat@example.com".into()),
                subscription_status: Some("active".into()),
            }),
            "cs_test_gone" => Err(PaymentError::NotFound),
            _ => Err(PaymentError::Network("connection reset".into())),
        }
    }
}

/// One request seen by the fake webhook.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    api_key: Option<String>,
    body: Value,
}

type SeenLog = Arc<Mutex<Vec<Seen>>>;

/// Fake automation webhook with a few canned behaviours.
async fn start_webhook() -> (String, SeenLog) {
    let seen: SeenLog = Arc::default();

    let record = |path: &'static str, seen: SeenLog| {
        move |headers: HeaderMap, body: String| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(Seen {
                    path: path.to_string(),
                    api_key: headers
                        .get("x-api-key")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    body: serde_json::from_str(&body).unwrap_or(Value::Null),
                });
            }
        }
    };

    let app = Router::new()
        .route(
            "/chat",
            post({
                let record = record("/chat", Arc::clone(&seen));
                move |headers: HeaderMap, body: String| {
                    let recorded = record(headers, body);
                    async move {
                        recorded.await;
                        axum::Json(json!({
                            "reply": "Hello! What do you do?",
                            "done": false,
                            "profile": null,
                            "quickReplies": ["Engineering", "Design"]
                        }))
                    }
                }
            }),
        )
        .route(
            "/chat-text",
            post({
                let record = record("/chat-text", Arc::clone(&seen));
                move |headers: HeaderMap, body: String| {
                    let recorded = record(headers, body);
                    async move {
                        recorded.await;
                        "just some text"
                    }
                }
            }),
        )
        .route(
            "/chat-down",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "workflow inactive") }),
        )
        .route(
            "/vps",
            post({
                let record = record("/vps", Arc::clone(&seen));
                move |headers: HeaderMap, body: String| {
                    let recorded = record(headers, body);
                    async move {
                        recorded.await;
                        ""
                    }
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn config(chat_url: Option<String>, vps_url: Option<String>) -> ProxyConfig {
    let webhook = |url: Option<String>, secret: &str| {
        url.map(|url| WebhookConfig {
            url,
            secret: SecretString::from(secret.to_string()),
        })
    };
    ProxyConfig {
        port: 0,
        public_origin: "https://agenthost.example".into(),
        stripe_secret_key: SecretString::from("sk_test_unused".to_string()),
        stripe_api_base: "http://127.0.0.1:9".into(),
        tier_prices: TierPrices {
            freemium: "price_free".into(),
            pro: "price_pro".into(),
            luxury: "price_broken".into(),
        },
        chat_webhook: webhook(chat_url, "chat-secret"),
        vps_webhook: webhook(vps_url, "vps-secret"),
    }
}

/// Start the proxy on a random port, return (base url, payments stub).
async fn start_proxy(config: ProxyConfig) -> (String, Arc<FakePayments>) {
    let payments = Arc::new(FakePayments::default());
    let state = AppState::new(&config, reqwest::Client::new(), payments.clone());
    let app = proxy_routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), payments)
}

// ── Health ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (base, _payments) = start_proxy(config(None, None)).await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

// ── Checkout ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tier_is_rejected_without_contacting_provider() {
    timeout(TEST_TIMEOUT, async {
        let (base, payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/create-checkout-session"))
            .json(&json!({"tier": "unknown-tier"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("unknown-tier"));
        assert!(error.contains("freemium, pro, luxury"));

        assert_eq!(payments.calls(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_checkout_maps_tier_and_uses_request_origin() {
    timeout(TEST_TIMEOUT, async {
        let (base, payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/create-checkout-session"))
            .header("Origin", "https://preview.example")
            .json(&json!({"tier": "pro"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["url"], "https://pay.example/price_pro");

        let params = payments.creates.lock().unwrap()[0].clone();
        assert_eq!(params.price_id, "price_pro");
        assert_eq!(
            params.success_url,
            "https://preview.example/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(params.cancel_url, "https://preview.example/#pricing");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_checkout_falls_back_to_configured_origin() {
    timeout(TEST_TIMEOUT, async {
        let (base, payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/create-checkout-session"))
            .json(&json!({"tier": "freemium"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let params = payments.creates.lock().unwrap()[0].clone();
        assert_eq!(params.cancel_url, "https://agenthost.example/#pricing");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn provider_failure_is_server_error_without_details() {
    timeout(TEST_TIMEOUT, async {
        let (base, _payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/create-checkout-session"))
            .json(&json!({"tier": "luxury"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(!body["error"].as_str().unwrap().contains("exploded"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_checkout_body_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/create-checkout-session"))
            .header("Content-Type", "application/json")
            .body("{\"plan\": 3}")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(payments.calls(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn checkout_session_status_and_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (base, payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::get(format!("{base}/api/checkout-session/cs_test_paid"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "paid");
        assert_eq!(body["customer_email"], "pat@example.com");
        assert_eq!(body["subscription_status"], "active");

        let resp = reqwest::get(format!("{base}/api/checkout-session/cs_test_gone"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = reqwest::get(format!("{base}/api/checkout-session/cs_test_flaky"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);

        assert_eq!(payments.retrieves.load(Ordering::SeqCst), 3);

        // Ids that can't be checkout sessions never reach the provider.
        let resp = reqwest::get(format!("{base}/api/checkout-session/not-a-session"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(payments.retrieves.load(Ordering::SeqCst), 3);
    })
    .await
    .expect("test timed out");
}

// ── Chat ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_forwards_with_secret_and_normalises_reply() {
    timeout(TEST_TIMEOUT, async {
        let (hook, seen) = start_webhook().await;
        let (base, _payments) = start_proxy(config(Some(format!("{hook}/chat")), None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({"sessionId": "s-42", "message": "Hi, I just signed up!"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Hello! What do you do?");
        assert_eq!(body["status"], "active");
        assert_eq!(body["quickReplies"], json!(["Engineering", "Design"]));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/chat");
        assert_eq!(seen[0].api_key.as_deref(), Some("chat-secret"));
        assert_eq!(seen[0].body["sessionId"], "s-42");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_wraps_plain_text_replies() {
    timeout(TEST_TIMEOUT, async {
        let (hook, _seen) = start_webhook().await;
        let (base, _payments) =
            start_proxy(config(Some(format!("{hook}/chat-text")), None)).await;

        let relay = HttpRelay::new(&base, Duration::from_secs(2)).unwrap();
        let reply = relay
            .send_message(&ChatRequest::new(SessionId::from("s-1"), "hello"))
            .await
            .unwrap();
        assert_eq!(reply.message, "just some text");
        assert_eq!(reply.status, ChatStatus::Active);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_relays_webhook_error_status() {
    timeout(TEST_TIMEOUT, async {
        let (hook, _seen) = start_webhook().await;
        let (base, _payments) =
            start_proxy(config(Some(format!("{hook}/chat-down")), None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({"sessionId": "s-1", "message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["details"], "workflow inactive");

        // The relay client surfaces it as a generic, retryable failure.
        let relay = HttpRelay::new(&base, Duration::from_secs(2)).unwrap();
        let err = relay
            .send_message(&ChatRequest::new(SessionId::from("s-1"), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Status { status: 503, .. }));
        assert!(!err.is_not_found());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_missing_workflow_is_not_reported_as_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (hook, _seen) = start_webhook().await;
        let (base, _payments) =
            start_proxy(config(Some(format!("{hook}/no-such-workflow")), None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({"sessionId": "s-1", "message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Chat webhook error: 404");

        let relay = HttpRelay::new(&base, Duration::from_secs(2)).unwrap();
        let err = relay
            .send_message(&ChatRequest::new(SessionId::from("s-1"), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Status { status: 502, .. }));
        assert!(!err.is_not_found());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_without_webhook_config_refuses() {
    timeout(TEST_TIMEOUT, async {
        let (base, _payments) = start_proxy(config(None, None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({"sessionId": "s-1", "message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("WEBHOOK_CHAT"));
        assert!(error.contains("CHAT_SECRET"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_rejects_malformed_body() {
    timeout(TEST_TIMEOUT, async {
        let (hook, seen) = start_webhook().await;
        let (base, _payments) = start_proxy(config(Some(format!("{hook}/chat")), None)).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/chat"))
            .json(&json!({"message": "no session"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert!(seen.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Notify ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn notify_requires_session_and_email() {
    timeout(TEST_TIMEOUT, async {
        let (hook, seen) = start_webhook().await;
        let (base, _payments) = start_proxy(config(None, Some(format!("{hook}/vps")))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/notify-vps"))
            .json(&json!({"sessionId": "s-1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "sessionId and email are required");
        assert!(seen.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn notify_fills_defaults_and_acknowledges_empty_reply() {
    timeout(TEST_TIMEOUT, async {
        let (hook, seen) = start_webhook().await;
        let (base, _payments) = start_proxy(config(None, Some(format!("{hook}/vps")))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/notify-vps"))
            .json(&json!({"sessionId": "s-1", "email": "pat@example.com"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"success": true}));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0].api_key.as_deref(), Some("vps-secret"));
        assert_eq!(seen[0].body["agentName"], Value::Null);
        assert_eq!(seen[0].body["selectedScenarios"], json!([]));
        assert_eq!(seen[0].body["personality"], json!([]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn notify_relay_client_round_trip() {
    timeout(TEST_TIMEOUT, async {
        let (hook, seen) = start_webhook().await;
        let (base, _payments) = start_proxy(config(None, Some(format!("{hook}/vps")))).await;

        let relay = HttpRelay::new(&base, Duration::from_secs(2)).unwrap();
        let request = NotifyRequest {
            session_id: "s-9".into(),
            email: "kai@example.com".into(),
            stripe_session_id: Some("cs_test_paid".into()),
            agent_name: Some("Nova".into()),
            channel: None,
            selected_scenarios: vec!["research".into()],
            personality: Vec::new(),
        };
        relay.notify_vps(&request).await.unwrap();
        assert_eq!(seen.lock().unwrap()[0].body["agentName"], "Nova");
    })
    .await
    .expect("test timed out");
}

// ── Relay client against the real proxy ────────────────────────────────

#[tokio::test]
async fn relay_client_distinguishes_not_found_from_transient() {
    timeout(TEST_TIMEOUT, async {
        let (base, _payments) = start_proxy(config(None, None)).await;
        let relay = HttpRelay::new(&base, Duration::from_secs(2)).unwrap();

        let status = relay.fetch_checkout_session("cs_test_paid").await.unwrap();
        assert!(status.is_paid());

        let gone = relay.fetch_checkout_session("cs_test_gone").await.unwrap_err();
        assert!(gone.is_not_found());

        let flaky = relay.fetch_checkout_session("cs_test_flaky").await.unwrap_err();
        assert!(!flaky.is_not_found());

        let rejected = relay.create_checkout_session("unknown-tier").await.unwrap_err();
        assert!(matches!(rejected, RelayError::Rejected(_)));
    })
    .await
    .expect("test timed out");
}
