//! Onboarding wizard — the step registry, the controller that owns the
//! session state, and the two branchy steps (personality, conversation).

pub mod catalog;
pub mod controller;
pub mod conversation;
pub mod model;
pub mod personality;
pub mod steps;

pub use controller::{ScenarioToggle, WizardController};
pub use conversation::{Applied, ConversationPhase, ConversationStep, Exchange};
pub use model::{
    ConversationMessage, MessagingChannel, OnboardingRecord, PersonalityChoice, Pick, Side,
    UserProfile, WizardProgress, WizardState,
};
pub use personality::{
    LevelSelection, PersonalityPicker, PersonalitySummary, PickerPhase,
    derive_personality_summary,
};
pub use steps::{Direction, STEPS, Step, TOTAL_STEPS};
