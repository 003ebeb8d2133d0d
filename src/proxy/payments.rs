//! Payment provider boundary — hosted checkout sessions.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::PaymentError;

/// What the proxy asks the provider for when creating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutParams {
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Post-payment view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub subscription_status: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CreatedSession, PaymentError>;

    async fn retrieve_checkout_session(&self, id: &str) -> Result<SessionDetails, PaymentError>;
}

/// Whether `id` looks like a provider checkout session id. Anything else is
/// reported as not found without a provider round-trip.
pub fn is_valid_session_id(id: &str) -> bool {
    id.starts_with("cs_")
        && id.len() <= 255
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Stripe Checkout over its REST API.
pub struct StripeProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeProvider {
    pub fn new(client: reqwest::Client, api_base: &str, secret_key: SecretString) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct StripeSessionDetails {
    payment_status: String,
    customer_details: Option<StripeCustomerDetails>,
    subscription: Option<StripeSubscriptionField>,
}

#[derive(Deserialize)]
struct StripeCustomerDetails {
    email: Option<String>,
}

/// `subscription` is an id unless expanded.
#[derive(Deserialize)]
#[serde(untagged)]
enum StripeSubscriptionField {
    Expanded { status: String },
    Id(#[allow(dead_code)] String),
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<CreatedSession, PaymentError> {
        let form = [
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", params.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", params.success_url.as_str()),
            ("cancel_url", params.cancel_url.as_str()),
        ];
        let resp = self
            .client
            .post(self.sessions_url())
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let session: StripeSession = Self::read(resp).await?;
        debug!(checkout_session = %session.id, "Checkout session created");
        let url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("session has no url".into()))?;
        Ok(CreatedSession {
            id: session.id,
            url,
        })
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<SessionDetails, PaymentError> {
        let resp = self
            .client
            .get(format!("{}/{id}", self.sessions_url()))
            .bearer_auth(self.secret_key.expose_secret())
            .query(&[("expand[]", "subscription")])
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let session: StripeSessionDetails = Self::read(resp).await?;
        Ok(SessionDetails {
            payment_status: session.payment_status,
            customer_email: session.customer_details.and_then(|c| c.email),
            subscription_status: match session.subscription {
                Some(StripeSubscriptionField::Expanded { status }) => Some(status),
                _ => None,
            },
        })
    }
}
