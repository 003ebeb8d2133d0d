//! Wizard data models: the live state, the persisted envelope, and the
//! finalized onboarding record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::personality::PersonalitySummary;
use crate::session::SessionId;

/// Schema version written into every [`OnboardingRecord`].
pub const ONBOARDING_RECORD_VERSION: u32 = 2;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the onboarding conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Profile the automation backend derives from the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: String,
    pub work: String,
    pub use_cases: Vec<String>,
    pub communication_style: String,
    pub interests: Vec<String>,
    pub notes: String,
}

/// Where the finished agent will talk to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingChannel {
    Whatsapp,
    Telegram,
    Imessage,
    Slack,
    Discord,
    Signal,
}

impl MessagingChannel {
    pub const ALL: [MessagingChannel; 6] = [
        Self::Whatsapp,
        Self::Telegram,
        Self::Imessage,
        Self::Slack,
        Self::Discord,
        Self::Signal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Whatsapp => "WhatsApp",
            Self::Telegram => "Telegram",
            Self::Imessage => "iMessage",
            Self::Slack => "Slack",
            Self::Discord => "Discord",
            Self::Signal => "Signal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Whatsapp => "Most popular worldwide",
            Self::Telegram => "Fast & feature-rich",
            Self::Imessage => "Native on Apple devices",
            Self::Slack => "Great for work teams",
            Self::Discord => "Communities & servers",
            Self::Signal => "Privacy-first messaging",
        }
    }
}

impl std::fmt::Display for MessagingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Imessage => "imessage",
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Signal => "signal",
        };
        write!(f, "{s}")
    }
}

/// One side of a binary personality round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

/// The answer recorded for a personality round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pick {
    Binary { choice: Side },
    /// 1..=5
    Level { value: u8 },
}

/// A pick for a specific round, as handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityChoice {
    pub round: u8,
    pub pick: Pick,
}

impl PersonalityChoice {
    pub fn binary(round: u8, choice: Side) -> Self {
        Self {
            round,
            pick: Pick::Binary { choice },
        }
    }

    pub fn level(round: u8, value: u8) -> Self {
        Self {
            round,
            pick: Pick::Level { value },
        }
    }
}

/// The mutable record owned by the controller for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub session_id: SessionId,
    pub agent_name: String,
    pub selected_scenarios: BTreeSet<String>,
    /// Round id → pick. One entry per round; re-answering overwrites.
    pub personality_choices: BTreeMap<u8, Pick>,
    pub channel: Option<MessagingChannel>,
    pub conversation_messages: Vec<ConversationMessage>,
    pub conversation_done: bool,
    pub profile: Option<UserProfile>,
    /// Payment-provider checkout session this onboarding is paid by.
    #[serde(default)]
    pub checkout_session_id: Option<String>,
}

impl WizardState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            agent_name: String::new(),
            selected_scenarios: BTreeSet::new(),
            personality_choices: BTreeMap::new(),
            channel: None,
            conversation_messages: Vec::new(),
            conversation_done: false,
            profile: None,
            checkout_session_id: None,
        }
    }

    /// Choices as a flat list ordered by round.
    pub fn choices(&self) -> Vec<PersonalityChoice> {
        self.personality_choices
            .iter()
            .map(|(round, pick)| PersonalityChoice {
                round: *round,
                pick: *pick,
            })
            .collect()
    }
}

/// Persisted progress envelope, overwritten on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardProgress {
    pub current_step: usize,
    pub state: WizardState,
    pub last_updated: DateTime<Utc>,
}

/// Personality section of the onboarding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityRecord {
    pub choices: Vec<PersonalityChoice>,
    pub summary: PersonalitySummary,
}

/// Durable snapshot of a completed session. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRecord {
    pub version: u32,
    pub session_id: SessionId,
    pub agent_name: String,
    pub selected_scenarios: Vec<String>,
    pub personality: PersonalityRecord,
    pub profile: Option<UserProfile>,
    pub channel: Option<MessagingChannel>,
    pub conversation_log: Vec<ConversationMessage>,
    #[serde(default)]
    pub checkout_session_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl OnboardingRecord {
    /// Same content, ignoring the completion timestamp.
    pub fn same_content(&self, other: &OnboardingRecord) -> bool {
        Self {
            completed_at: other.completed_at,
            ..self.clone()
        } == *other
    }
}
