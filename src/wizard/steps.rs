//! Step registry — the ordered screens of the wizard.

use serde::{Deserialize, Serialize};

/// The wizard's screens, in order. The last one is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    NameAgent,
    Scenarios,
    Personality,
    Conversation,
    Channel,
    Launch,
}

pub const STEPS: [Step; 6] = [
    Step::NameAgent,
    Step::Scenarios,
    Step::Personality,
    Step::Conversation,
    Step::Channel,
    Step::Launch,
];

pub const TOTAL_STEPS: usize = STEPS.len();

/// Index of the terminal step.
pub const TERMINAL_STEP: usize = TOTAL_STEPS - 1;

impl Step {
    pub fn at(index: usize) -> Option<Step> {
        STEPS.get(index).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            Self::NameAgent => 0,
            Self::Scenarios => 1,
            Self::Personality => 2,
            Self::Conversation => 3,
            Self::Channel => 4,
            Self::Launch => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::NameAgent => "Name your agent",
            Self::Scenarios => "What should it do?",
            Self::Personality => "Shape its personality",
            Self::Conversation => "Get to know you",
            Self::Channel => "Pick a channel",
            Self::Launch => "Launch",
        }
    }

    /// Whether the shell shows a Back control on this step.
    pub fn allows_back(&self) -> bool {
        !matches!(self, Self::NameAgent | Self::Launch)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Launch)
    }
}

/// Which way the last transition went. Only used to pick an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}
