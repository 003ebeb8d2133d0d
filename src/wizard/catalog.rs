//! Static catalogs the wizard picks from.

/// A scenario the agent can be set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub id: &'static str,
    pub title: &'static str,
    pub blurb: &'static str,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: "morning-briefing",
        title: "Morning briefing",
        blurb: "Weather, calendar, and what matters today in one message.",
    },
    Scenario {
        id: "email-autopilot",
        title: "Email autopilot",
        blurb: "Triage the inbox and draft replies for approval.",
    },
    Scenario {
        id: "research",
        title: "Research",
        blurb: "Dig into a topic and come back with a summary.",
    },
    Scenario {
        id: "remember",
        title: "Remember everything",
        blurb: "Birthdays, promises, and the things you'd otherwise forget.",
    },
    Scenario {
        id: "accountability",
        title: "Accountability",
        blurb: "Check in on goals and nudge when things slip.",
    },
    Scenario {
        id: "family",
        title: "Family logistics",
        blurb: "Pickups, appointments, and shared plans.",
    },
];

pub fn scenario(id: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.id == id)
}

pub const AGENT_NAME_SUGGESTIONS: &[&str] =
    &["Nova", "Atlas", "Echo", "Sage", "Pixel", "Onyx", "Aria", "Bolt"];

/// Longest agent name accepted.
pub const MAX_AGENT_NAME_LEN: usize = 32;

/// Shown in place of an empty agent name.
pub const DEFAULT_AGENT_LABEL: &str = "your agent";

/// Replace `{agent}` placeholders with the agent's name.
pub fn interpolate(text: &str, agent_name: &str) -> String {
    let name = if agent_name.trim().is_empty() {
        DEFAULT_AGENT_LABEL
    } else {
        agent_name.trim()
    };
    text.replace("{agent}", name)
}
