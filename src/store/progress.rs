//! Progress store — a passive mirror of wizard progress keyed by session.
//!
//! Also holds the finalized onboarding records: one "latest" slot shared by
//! every session, plus a per-session slot.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::traits::KeyValueStore;
use crate::error::StoreError;
use crate::session::SessionId;
use crate::wizard::model::{OnboardingRecord, WizardProgress, WizardState};

/// Storage keys.
pub mod keys {
    use crate::session::SessionId;

    /// Most recently completed onboarding record (single slot).
    pub const LATEST_ONBOARDING: &str = "agenthost_onboarding";

    pub fn progress(session_id: &SessionId) -> String {
        format!("agenthost_wizard_progress_{session_id}")
    }

    pub fn onboarding(session_id: &SessionId) -> String {
        format!("agenthost_onboarding_{session_id}")
    }
}

#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load saved progress. Never fails: a missing, unreadable, or corrupt
    /// envelope all come back as `None`.
    pub async fn load(&self, session_id: &SessionId) -> Option<WizardProgress> {
        let raw = match self.kv.get(&keys::progress(session_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to read wizard progress");
                return None;
            }
        };

        match serde_json::from_str::<WizardProgress>(&raw) {
            Ok(progress) if progress.state.session_id == *session_id => Some(progress),
            Ok(_) => {
                warn!(session_id = %session_id, "Stored progress belongs to another session; ignoring");
                None
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Discarding unparseable wizard progress");
                None
            }
        }
    }

    /// Overwrite the envelope with a fresh timestamp.
    pub async fn save(
        &self,
        session_id: &SessionId,
        step_index: usize,
        state: &WizardState,
    ) -> Result<(), StoreError> {
        let envelope = WizardProgress {
            current_step: step_index,
            state: state.clone(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string(&envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(&keys::progress(session_id), &json).await?;
        debug!(session_id = %session_id, step = step_index, "Wizard progress saved");
        Ok(())
    }

    pub async fn clear(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.kv.remove(&keys::progress(session_id)).await?;
        Ok(())
    }

    /// Write a finalized record to both the latest slot and the session slot.
    pub async fn save_record(&self, record: &OnboardingRecord) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv
            .set(&keys::onboarding(&record.session_id), &json)
            .await?;
        self.kv.set(keys::LATEST_ONBOARDING, &json).await?;
        Ok(())
    }

    /// The most recently completed record across all sessions.
    pub async fn latest_record(&self) -> Option<OnboardingRecord> {
        self.read_record(keys::LATEST_ONBOARDING).await
    }

    /// The completed record for one session.
    pub async fn record(&self, session_id: &SessionId) -> Option<OnboardingRecord> {
        self.read_record(&keys::onboarding(session_id)).await
    }

    async fn read_record(&self, key: &str) -> Option<OnboardingRecord> {
        match self.kv.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .inspect_err(|e| warn!(key, error = %e, "Discarding unparseable onboarding record"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read onboarding record");
                None
            }
        }
    }
}
