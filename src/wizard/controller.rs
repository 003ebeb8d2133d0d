//! WizardController — owns the wizard state for one session, drives step
//! transitions, and mirrors every mutation into the progress store.

use tracing::{debug, info, warn};

use super::catalog::{self, MAX_AGENT_NAME_LEN};
use super::model::{
    ConversationMessage, MessagingChannel, ONBOARDING_RECORD_VERSION, OnboardingRecord,
    PersonalityChoice, PersonalityRecord, UserProfile, WizardState,
};
use super::personality::{derive_personality_summary, validate_choice};
use super::steps::{Direction, Step, TERMINAL_STEP, TOTAL_STEPS};
use crate::config::WizardConfig;
use crate::error::{Error, ValidationError};
use crate::session::SessionId;
use crate::store::ProgressStore;

/// Outcome of [`WizardController::toggle_scenario`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioToggle {
    Added,
    Removed,
    /// Adding would exceed the cap; the selection is unchanged.
    LimitReached,
}

pub struct WizardController {
    state: WizardState,
    step: usize,
    direction: Direction,
    config: WizardConfig,
    progress: ProgressStore,
    /// Set once the record is durably written. Locks every mutation.
    record: Option<OnboardingRecord>,
}

impl WizardController {
    /// Open a session, resuming saved progress if there is any.
    pub async fn open(session_id: SessionId, config: WizardConfig, progress: ProgressStore) -> Self {
        let (state, step) = match progress.load(&session_id).await {
            Some(saved) => {
                let step = saved.current_step.min(TERMINAL_STEP);
                info!(session_id = %session_id, step, "Resuming wizard progress");
                (saved.state, step)
            }
            None => {
                debug!(session_id = %session_id, "Starting new wizard session");
                (WizardState::new(session_id), 0)
            }
        };

        Self {
            state,
            step,
            direction: Direction::Forward,
            config,
            progress,
            record: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn session_id(&self) -> &SessionId {
        &self.state.session_id
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn step(&self) -> Step {
        Step::at(self.step).unwrap_or(Step::Launch)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total_steps(&self) -> usize {
        TOTAL_STEPS
    }

    /// Completion percentage, derived from the step index on every call.
    pub fn progress_percent(&self) -> f64 {
        (self.step + 1) as f64 / TOTAL_STEPS as f64 * 100.0
    }

    /// Name ideas for the first step, minus the name already chosen.
    pub fn name_suggestions(&self) -> impl Iterator<Item = &'static str> + '_ {
        catalog::AGENT_NAME_SUGGESTIONS
            .iter()
            .copied()
            .filter(|name| !name.eq_ignore_ascii_case(&self.state.agent_name))
    }

    pub fn is_finalized(&self) -> bool {
        self.record.is_some()
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.is_finalized() {
            debug!(session_id = %self.state.session_id, "Ignoring change to finalized session");
            return Err(ValidationError::Finalized);
        }
        Ok(())
    }

    // ── Navigation ──────────────────────────────────────────────────

    pub async fn next(&mut self) {
        if self.ensure_open().is_err() {
            return;
        }
        self.direction = Direction::Forward;
        if self.step < TERMINAL_STEP {
            self.step += 1;
            debug!(session_id = %self.state.session_id, step = self.step, "Wizard advanced");
        }
        self.persist().await;
    }

    /// No-op at step 0.
    pub async fn back(&mut self) {
        if self.ensure_open().is_err() {
            return;
        }
        self.direction = Direction::Backward;
        if self.step > 0 {
            self.step -= 1;
            debug!(session_id = %self.state.session_id, step = self.step, "Wizard went back");
        }
        self.persist().await;
    }

    pub async fn go_to_step(&mut self, target: usize) -> Result<(), ValidationError> {
        self.ensure_open()?;
        if target >= TOTAL_STEPS {
            return Err(ValidationError::StepOutOfRange {
                target,
                total: TOTAL_STEPS,
            });
        }
        self.direction = if target < self.step {
            Direction::Backward
        } else {
            Direction::Forward
        };
        self.step = target;
        debug!(session_id = %self.state.session_id, step = target, "Wizard jumped");
        self.persist().await;
        Ok(())
    }

    // ── Field setters ───────────────────────────────────────────────

    pub async fn set_agent_name(&mut self, name: &str) -> Result<(), ValidationError> {
        self.ensure_open()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyAgentName);
        }
        if name.chars().count() > MAX_AGENT_NAME_LEN {
            return Err(ValidationError::AgentNameTooLong {
                max: MAX_AGENT_NAME_LEN,
            });
        }
        self.state.agent_name = name.to_string();
        self.persist().await;
        Ok(())
    }

    pub async fn toggle_scenario(&mut self, id: &str) -> Result<ScenarioToggle, ValidationError> {
        self.ensure_open()?;
        if catalog::scenario(id).is_none() {
            return Err(ValidationError::UnknownScenario(id.to_string()));
        }

        let outcome = if self.state.selected_scenarios.remove(id) {
            ScenarioToggle::Removed
        } else if self.state.selected_scenarios.len() >= self.config.max_scenarios {
            debug!(
                session_id = %self.state.session_id,
                max = self.config.max_scenarios,
                "Scenario limit reached"
            );
            return Ok(ScenarioToggle::LimitReached);
        } else {
            self.state.selected_scenarios.insert(id.to_string());
            ScenarioToggle::Added
        };

        self.persist().await;
        Ok(outcome)
    }

    /// Record a pick, replacing any earlier pick for the same round.
    pub async fn add_personality_choice(
        &mut self,
        choice: PersonalityChoice,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        validate_choice(&choice)?;
        self.state
            .personality_choices
            .insert(choice.round, choice.pick);
        self.persist().await;
        Ok(())
    }

    pub async fn add_conversation_message(&mut self, message: ConversationMessage) {
        if self.ensure_open().is_err() {
            return;
        }
        self.state.conversation_messages.push(message);
        self.persist().await;
    }

    pub async fn set_profile(&mut self, profile: UserProfile) {
        if self.ensure_open().is_err() {
            return;
        }
        self.state.profile = Some(profile);
        self.persist().await;
    }

    /// Mark the conversation finished. Once done it stays done.
    pub async fn set_conversation_done(&mut self, done: bool, profile: Option<UserProfile>) {
        if self.ensure_open().is_err() {
            return;
        }
        if !done && self.state.conversation_done {
            debug!(session_id = %self.state.session_id, "Ignoring attempt to reopen conversation");
        }
        self.state.conversation_done |= done;
        if profile.is_some() {
            self.state.profile = profile;
        }
        self.persist().await;
    }

    pub async fn set_channel(&mut self, channel: MessagingChannel) {
        if self.ensure_open().is_err() {
            return;
        }
        self.state.channel = Some(channel);
        self.persist().await;
    }

    /// Link the payment-provider checkout session that pays for this agent.
    pub async fn attach_checkout_session(&mut self, checkout_session_id: &str) {
        if self.ensure_open().is_err() {
            return;
        }
        self.state.checkout_session_id = Some(checkout_session_id.to_string());
        self.persist().await;
    }

    // ── Finalization ────────────────────────────────────────────────

    /// Build the onboarding record, store it durably, and clear progress.
    ///
    /// Progress is only cleared once the record is written; if that write
    /// fails the session stays open and `complete()` can be retried. Later
    /// calls return the record written the first time.
    pub async fn complete(&mut self) -> Result<OnboardingRecord, Error> {
        if let Some(record) = &self.record {
            return Ok(record.clone());
        }
        if self.config.require_payment && self.state.checkout_session_id.is_none() {
            return Err(ValidationError::PaymentRequired.into());
        }

        let record = self.build_record();
        let session_id = &self.state.session_id;

        if let Err(e) = self.progress.save_record(&record).await {
            warn!(session_id = %session_id, error = %e, "Failed to store onboarding record");
            return Err(e.into());
        }
        if let Err(e) = self.progress.clear(session_id).await {
            warn!(session_id = %session_id, error = %e, "Failed to clear wizard progress");
        }

        info!(
            session_id = %session_id,
            agent = %record.agent_name,
            scenarios = record.selected_scenarios.len(),
            "Onboarding completed"
        );
        self.record = Some(record.clone());
        Ok(record)
    }

    fn build_record(&self) -> OnboardingRecord {
        let state = &self.state;
        OnboardingRecord {
            version: ONBOARDING_RECORD_VERSION,
            session_id: state.session_id.clone(),
            agent_name: state.agent_name.clone(),
            selected_scenarios: state.selected_scenarios.iter().cloned().collect(),
            personality: PersonalityRecord {
                choices: state.choices(),
                summary: derive_personality_summary(&state.personality_choices),
            },
            profile: state.profile.clone(),
            channel: state.channel,
            conversation_log: state.conversation_messages.clone(),
            checkout_session_id: state.checkout_session_id.clone(),
            completed_at: chrono::Utc::now(),
        }
    }

    /// Mirror the current state into the store. Failures are logged; the
    /// in-memory state stays authoritative.
    async fn persist(&self) {
        if let Err(e) = self
            .progress
            .save(&self.state.session_id, self.step, &self.state)
            .await
        {
            warn!(
                session_id = %self.state.session_id,
                error = %e,
                "Failed to persist wizard progress"
            );
        }
    }
}
