//! Personality picker — calibrates the agent's voice over a fixed list of
//! rounds, then offers a recap with redo / tweak.
//!
//! Phases: `Rounds → Summary ⇄ Tweak`, with `Summary → Rounds` on redo.
//! Every recorded pick goes through the controller, so the store always
//! mirrors what the picker shows.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::interpolate;
use super::controller::WizardController;
use super::model::{PersonalityChoice, Pick, Side, WizardState};
use crate::error::ValidationError;

/// Pause between confirming a binary pick and moving to the next round.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(900);

/// How a round is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    Binary {
        label_a: &'static str,
        label_b: &'static str,
        confirm_a: &'static str,
        confirm_b: &'static str,
    },
    Level {
        levels: [&'static str; 5],
        default: u8,
        /// A level that must be explicitly confirmed before it can be chosen.
        /// Declining snaps to the level below it.
        gated: Option<u8>,
    },
}

/// One dimension of personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub id: u8,
    pub dimension: &'static str,
    pub question: &'static str,
    pub kind: RoundKind,
}

impl Round {
    /// The pick assumed when the round has not been answered.
    pub fn default_pick(&self) -> Pick {
        match self.kind {
            RoundKind::Binary { .. } => Pick::Binary { choice: Side::A },
            RoundKind::Level { default, .. } => Pick::Level { value: default },
        }
    }

    /// Human label for a pick in this round.
    pub fn label(&self, pick: Pick) -> &'static str {
        match (self.kind, pick) {
            (RoundKind::Binary { label_a, .. }, Pick::Binary { choice: Side::A }) => label_a,
            (RoundKind::Binary { label_b, .. }, Pick::Binary { choice: Side::B }) => label_b,
            (RoundKind::Level { levels, .. }, Pick::Level { value }) if (1..=5).contains(&value) => {
                levels[usize::from(value) - 1]
            }
            _ => self.label(self.default_pick()),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.kind, RoundKind::Binary { .. })
    }
}

pub const ROUNDS: [Round; 7] = [
    Round {
        id: 1,
        dimension: "Length",
        question: "How detailed should {agent} be?",
        kind: RoundKind::Binary {
            label_a: "Short & punchy",
            label_b: "Detailed & thorough",
            confirm_a: "Got it. {agent} will keep it brief.",
            confirm_b: "Got it. {agent} will give you the full picture.",
        },
    },
    Round {
        id: 2,
        dimension: "Tone",
        question: "How should {agent} sound?",
        kind: RoundKind::Binary {
            label_a: "Professional",
            label_b: "Casual",
            confirm_a: "Noted. {agent} will keep things polished.",
            confirm_b: "Noted. {agent} will keep it relaxed.",
        },
    },
    Round {
        id: 3,
        dimension: "Emojis",
        question: "How many emojis should {agent} use?",
        kind: RoundKind::Level {
            levels: ["None", "Rare", "Some", "Frequent", "Lots"],
            default: 2,
            gated: None,
        },
    },
    Round {
        id: 4,
        dimension: "Humor",
        question: "How funny should {agent} be?",
        kind: RoundKind::Level {
            levels: ["Serious", "Dry", "Light", "Playful", "Roast me"],
            default: 3,
            gated: Some(5),
        },
    },
    Round {
        id: 5,
        dimension: "Initiative",
        question: "How proactive should {agent} be?",
        kind: RoundKind::Level {
            levels: [
                "Only when asked",
                "Occasional nudges",
                "Balanced",
                "Proactive",
                "Runs the show",
            ],
            default: 3,
            gated: None,
        },
    },
    Round {
        id: 6,
        dimension: "Opinions",
        question: "How opinionated should {agent} be?",
        kind: RoundKind::Binary {
            label_a: "Neutral",
            label_b: "Opinionated",
            confirm_a: "{agent} will lay out the options and let you decide.",
            confirm_b: "{agent} will tell you what it actually thinks.",
        },
    },
    Round {
        id: 7,
        dimension: "Style",
        question: "How should {agent} handle pushback?",
        kind: RoundKind::Binary {
            label_a: "Goes along",
            label_b: "Pushes back",
            confirm_a: "{agent} will roll with your call.",
            confirm_b: "{agent} will challenge you when it matters.",
        },
    },
];

pub fn round(id: u8) -> Option<&'static Round> {
    ROUNDS.iter().find(|r| r.id == id)
}

/// Check a choice against the round catalog.
pub fn validate_choice(choice: &PersonalityChoice) -> Result<(), ValidationError> {
    let round = round(choice.round).ok_or(ValidationError::UnknownRound(choice.round))?;
    match (round.kind, choice.pick) {
        (RoundKind::Binary { .. }, Pick::Binary { .. }) => Ok(()),
        (RoundKind::Level { .. }, Pick::Level { value }) if (1..=5).contains(&value) => Ok(()),
        (RoundKind::Level { .. }, Pick::Level { value }) => {
            Err(ValidationError::LevelOutOfRange(value))
        }
        (RoundKind::Binary { .. }, Pick::Level { .. }) => Err(ValidationError::PickKindMismatch {
            round: round.id,
            expected: "binary",
        }),
        (RoundKind::Level { .. }, Pick::Binary { .. }) => Err(ValidationError::PickKindMismatch {
            round: round.id,
            expected: "level",
        }),
    }
}

/// One line of the personality recap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitSummary {
    pub round: u8,
    pub dimension: String,
    pub label: String,
    /// Whether the label comes from an actual answer rather than the default.
    pub answered: bool,
}

/// Derived recap of every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalitySummary {
    pub traits: Vec<TraitSummary>,
    pub description: String,
}

/// Recap all rounds, using defaults for any that were not answered.
pub fn derive_personality_summary(choices: &BTreeMap<u8, Pick>) -> PersonalitySummary {
    let traits: Vec<TraitSummary> = ROUNDS
        .iter()
        .map(|round| {
            let recorded = choices.get(&round.id).copied();
            let pick = recorded.unwrap_or_else(|| round.default_pick());
            TraitSummary {
                round: round.id,
                dimension: round.dimension.to_string(),
                label: round.label(pick).to_string(),
                answered: recorded.is_some(),
            }
        })
        .collect();

    let description = traits
        .iter()
        .map(|t| format!("{}: {}", t.dimension, t.label))
        .collect::<Vec<_>>()
        .join(" · ");

    PersonalitySummary {
        traits,
        description,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerPhase {
    Rounds,
    Summary,
    Tweak,
}

/// Interstitial confirmation for a gated level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelGate {
    Closed,
    Asking,
    Confirmed,
}

/// Outcome of picking a level on the slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSelection {
    Selected(u8),
    NeedsConfirmation(u8),
}

/// Local state of the personality step.
#[derive(Debug, Clone)]
pub struct PersonalityPicker {
    phase: PickerPhase,
    round_index: usize,
    side: Option<Side>,
    side_confirmed: bool,
    level: u8,
    level_touched: bool,
    gate: LevelGate,
}

impl PersonalityPicker {
    /// Resume at the first unanswered round, or at the recap if all are
    /// answered.
    pub fn resume(state: &WizardState) -> Self {
        let first_open = ROUNDS
            .iter()
            .position(|r| !state.personality_choices.contains_key(&r.id));
        match first_open {
            Some(index) => Self::at_round(index, state),
            None => Self::open_summary(),
        }
    }

    /// Start the rounds at a given index (clamped to the recap when past
    /// the end).
    pub fn at_round(index: usize, state: &WizardState) -> Self {
        let mut picker = Self::open_summary();
        if index < ROUNDS.len() {
            picker.phase = PickerPhase::Rounds;
            picker.round_index = index;
            picker.reset_round(state);
        }
        picker
    }

    /// Jump straight to the recap. Unanswered rounds show their defaults.
    pub fn open_summary() -> Self {
        Self {
            phase: PickerPhase::Summary,
            round_index: ROUNDS.len(),
            side: None,
            side_confirmed: false,
            level: 3,
            level_touched: false,
            gate: LevelGate::Closed,
        }
    }

    pub fn phase(&self) -> PickerPhase {
        self.phase
    }

    pub fn round_index(&self) -> usize {
        self.round_index
    }

    /// The round being answered, if in the rounds phase.
    pub fn current_round(&self) -> Option<&'static Round> {
        match self.phase {
            PickerPhase::Rounds => ROUNDS.get(self.round_index),
            _ => None,
        }
    }

    pub fn selected_side(&self) -> Option<Side> {
        self.side
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn gate(&self) -> LevelGate {
        self.gate
    }

    /// The round's question with the agent's name filled in.
    pub fn question(&self, agent_name: &str) -> Option<String> {
        self.current_round()
            .map(|r| interpolate(r.question, agent_name))
    }

    // ── Binary rounds ───────────────────────────────────────────────

    /// Highlight a side. Does not record anything yet.
    pub fn select_side(&mut self, side: Side) -> Result<(), ValidationError> {
        self.binary_round("select a side")?;
        if self.side_confirmed {
            return Err(ValidationError::PickerPhase {
                action: "change a confirmed side",
            });
        }
        self.side = Some(side);
        Ok(())
    }

    /// Record the highlighted side and return the confirmation line.
    ///
    /// The caller shows the line, waits [`AUTO_ADVANCE_DELAY`], then calls
    /// [`finish_binary_round`](Self::finish_binary_round) (or uses
    /// [`settle`](Self::settle)).
    pub async fn confirm_side(
        &mut self,
        wizard: &mut WizardController,
    ) -> Result<String, ValidationError> {
        let round = self.binary_round("confirm a side")?;
        let side = match (self.side, self.side_confirmed) {
            (Some(side), false) => side,
            _ => {
                return Err(ValidationError::PickerPhase {
                    action: "confirm without a fresh selection",
                });
            }
        };

        wizard
            .add_personality_choice(PersonalityChoice::binary(round.id, side))
            .await?;
        self.side_confirmed = true;

        let template = match (round.kind, side) {
            (RoundKind::Binary { confirm_a, .. }, Side::A) => confirm_a,
            (RoundKind::Binary { confirm_b, .. }, Side::B) => confirm_b,
            _ => "",
        };
        Ok(interpolate(template, &wizard.state().agent_name))
    }

    /// Move past a confirmed binary round.
    pub fn finish_binary_round(&mut self, state: &WizardState) -> Result<(), ValidationError> {
        if !self.side_confirmed {
            return Err(ValidationError::PickerPhase {
                action: "advance before confirming",
            });
        }
        self.advance(state);
        Ok(())
    }

    /// Wait out the confirmation delay, then advance.
    pub async fn settle(&mut self, state: &WizardState) -> Result<(), ValidationError> {
        tokio::time::sleep(AUTO_ADVANCE_DELAY).await;
        self.finish_binary_round(state)
    }

    // ── Level rounds ────────────────────────────────────────────────

    pub fn select_level(&mut self, value: u8) -> Result<LevelSelection, ValidationError> {
        let gated = self.level_round("select a level")?;
        if !(1..=5).contains(&value) {
            return Err(ValidationError::LevelOutOfRange(value));
        }
        if gated == Some(value) && self.gate != LevelGate::Confirmed {
            self.gate = LevelGate::Asking;
            return Ok(LevelSelection::NeedsConfirmation(value));
        }
        self.level = value;
        self.level_touched = true;
        Ok(LevelSelection::Selected(value))
    }

    /// Accept the gated level.
    pub fn confirm_gated_level(&mut self) -> Result<u8, ValidationError> {
        let gated = self.asking_gate()?;
        self.gate = LevelGate::Confirmed;
        self.level = gated;
        self.level_touched = true;
        Ok(gated)
    }

    /// Decline the gated level; snaps to the level below it.
    pub fn decline_gated_level(&mut self) -> Result<u8, ValidationError> {
        let gated = self.asking_gate()?;
        self.gate = LevelGate::Closed;
        self.level = gated.saturating_sub(1).max(1);
        self.level_touched = true;
        Ok(self.level)
    }

    /// Record the current level and move to the next round.
    pub async fn commit_level(
        &mut self,
        wizard: &mut WizardController,
    ) -> Result<(), ValidationError> {
        self.level_round("commit a level")?;
        if !self.level_touched || self.gate == LevelGate::Asking {
            return Err(ValidationError::PickerPhase {
                action: "commit before choosing a level",
            });
        }
        let round = ROUNDS[self.round_index];
        wizard
            .add_personality_choice(PersonalityChoice::level(round.id, self.level))
            .await?;
        self.advance(wizard.state());
        Ok(())
    }

    // ── Summary / tweak ─────────────────────────────────────────────

    /// Recap of every round, defaults filled in.
    pub fn summary(&self, state: &WizardState) -> PersonalitySummary {
        derive_personality_summary(&state.personality_choices)
    }

    /// Start the rounds over from the first one. Recorded picks are kept
    /// until they are re-answered.
    pub fn redo(&mut self, state: &WizardState) -> Result<(), ValidationError> {
        self.require(PickerPhase::Summary, "redo")?;
        *self = Self::at_round(0, state);
        Ok(())
    }

    pub fn tweak(&mut self) -> Result<(), ValidationError> {
        self.require(PickerPhase::Summary, "tweak")?;
        self.phase = PickerPhase::Tweak;
        Ok(())
    }

    /// Edit any round in place without advancing.
    pub async fn tweak_choice(
        &mut self,
        wizard: &mut WizardController,
        choice: PersonalityChoice,
    ) -> Result<(), ValidationError> {
        self.require(PickerPhase::Tweak, "edit a round")?;
        wizard.add_personality_choice(choice).await
    }

    pub fn done_tweaking(&mut self) -> Result<(), ValidationError> {
        self.require(PickerPhase::Tweak, "finish tweaking")?;
        self.phase = PickerPhase::Summary;
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────

    fn advance(&mut self, state: &WizardState) {
        self.round_index += 1;
        if self.round_index >= ROUNDS.len() {
            debug!("All personality rounds answered");
            self.phase = PickerPhase::Summary;
            self.round_index = ROUNDS.len();
        } else {
            self.reset_round(state);
        }
    }

    fn reset_round(&mut self, state: &WizardState) {
        self.side = None;
        self.side_confirmed = false;
        self.level_touched = false;
        self.gate = LevelGate::Closed;
        if let Some(round) = ROUNDS.get(self.round_index) {
            self.level = match (round.kind, state.personality_choices.get(&round.id)) {
                (RoundKind::Level { .. }, Some(Pick::Level { value })) => *value,
                (RoundKind::Level { default, .. }, _) => default,
                _ => 3,
            };
        }
    }

    fn require(&self, phase: PickerPhase, action: &'static str) -> Result<(), ValidationError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(ValidationError::PickerPhase { action })
        }
    }

    fn binary_round(&self, action: &'static str) -> Result<&'static Round, ValidationError> {
        match self.current_round() {
            Some(round) if round.is_binary() => Ok(round),
            _ => Err(ValidationError::PickerPhase { action }),
        }
    }

    fn level_round(&self, action: &'static str) -> Result<Option<u8>, ValidationError> {
        match self.current_round().map(|r| r.kind) {
            Some(RoundKind::Level { gated, .. }) => Ok(gated),
            _ => Err(ValidationError::PickerPhase { action }),
        }
    }

    fn asking_gate(&self) -> Result<u8, ValidationError> {
        match (self.level_round("answer the confirmation")?, self.gate) {
            (Some(gated), LevelGate::Asking) => Ok(gated),
            _ => Err(ValidationError::PickerPhase {
                action: "answer a confirmation that was not asked",
            }),
        }
    }
}
