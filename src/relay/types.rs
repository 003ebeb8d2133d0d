//! Wire schemas shared by the relay clients and the backend proxy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::SessionId;
use crate::wizard::model::{
    MessagingChannel, OnboardingRecord, PersonalityChoice, UserProfile, WizardState,
};
use crate::wizard::personality::{PersonalitySummary, derive_personality_summary};

/// Step data attached to the first chat call of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub agent_name: String,
    pub selected_scenarios: Vec<String>,
    pub personality: PersonalitySummary,
}

impl ChatContext {
    pub fn from_state(state: &WizardState) -> Self {
        Self {
            agent_name: state.agent_name.clone(),
            selected_scenarios: state.selected_scenarios.iter().cloned().collect(),
            personality: derive_personality_summary(&state.personality_choices),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl ChatRequest {
    pub fn new(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            message: message.into(),
            context: None,
            stripe_session_id: None,
            skipped: false,
        }
    }

    pub fn with_context(mut self, context: ChatContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_stripe_session(mut self, id: Option<String>) -> Self {
        self.stripe_session_id = id;
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skipped = true;
        self
    }
}

/// Where the remote conversation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Active,
    /// The remote side wants an explicit accept/cancel.
    Confirming,
    Complete,
}

/// Normalised reply from `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub status: ChatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

impl ChatReply {
    pub fn active(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: ChatStatus::Active,
            profile: None,
            quick_replies: Vec::new(),
        }
    }
}

/// Plan tiers that can be bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Freemium,
    Pro,
    Luxury,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [Self::Freemium, Self::Pro, Self::Luxury];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freemium => "freemium",
            Self::Pro => "pro",
            Self::Luxury => "luxury",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freemium" => Ok(Self::Freemium),
            "pro" => Ok(Self::Pro),
            "luxury" => Ok(Self::Luxury),
            other => {
                let valid: Vec<&str> = Self::ALL.iter().map(PlanTier::as_str).collect();
                Err(format!(
                    "Invalid tier \"{other}\". Valid tiers: {}",
                    valid.join(", ")
                ))
            }
        }
    }
}

/// Body of `POST /api/create-checkout-session`. The tier stays a string so
/// an unknown value reaches the handler and gets a 400 with the valid list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub url: String,
}

/// Response of `GET /api/checkout-session/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStatus {
    /// Provider payment status (`paid`, `unpaid`, `no_payment_required`).
    pub status: String,
    pub customer_email: Option<String>,
    pub subscription_status: Option<String>,
}

impl CheckoutStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self.status.as_str(), "paid" | "no_payment_required")
    }
}

/// Body of `POST /api/notify-vps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub channel: Option<MessagingChannel>,
    #[serde(default)]
    pub selected_scenarios: Vec<String>,
    #[serde(default)]
    pub personality: Vec<PersonalityChoice>,
}

impl NotifyRequest {
    /// Provisioning request for a finished onboarding.
    pub fn from_record(record: &OnboardingRecord, email: impl Into<String>) -> Self {
        Self {
            session_id: record.session_id.to_string(),
            email: email.into(),
            stripe_session_id: record.checkout_session_id.clone(),
            agent_name: Some(record.agent_name.clone()).filter(|n| !n.is_empty()),
            channel: record.channel,
            selected_scenarios: record.selected_scenarios.clone(),
            personality: record.personality.choices.clone(),
        }
    }

    /// Missing required fields, by wire name.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.session_id.trim().is_empty() {
            missing.push("sessionId");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        missing
    }
}
