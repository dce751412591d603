//! Greeting generation and persona-templated response text.
//!
//! All canned lines carry `{assistant}` / `{owner}` placeholders that are
//! filled from [`PersonaConfig`] so the display names stay configurable
//! without touching the tables.

use crate::config::{GreetingConfig, PersonaConfig};
use rand::Rng;

/// Which greeting family to use on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingKind {
    /// First visit, or a reactivation outside the return window.
    Fresh,
    /// Reactivation shortly after a previous session.
    ReturnVisit,
}

/// Pick the greeting family from the time since the last interaction.
///
/// A reactivation inside the return window but after a minimum gap of
/// inactivity reads as the same visitor coming back; anything else gets
/// the time-of-day greeting.
#[must_use]
pub fn greeting_kind(since_last_ms: u64, config: &GreetingConfig) -> GreetingKind {
    if since_last_ms < config.return_window_ms && since_last_ms > config.min_inactivity_ms {
        GreetingKind::ReturnVisit
    } else {
        GreetingKind::Fresh
    }
}

/// Time-of-day salutation: morning before 12, afternoon before 18,
/// evening otherwise.
#[must_use]
pub fn salutation_for_hour(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning"
    } else if hour < 18 {
        "Good afternoon"
    } else {
        "Good evening"
    }
}

/// First-visit greetings. Every variant ends by asking about contact, which
/// arms the pending yes/no flow.
const FRESH_GREETINGS: &[&str] = &[
    "{salutation}. Arc reactor online. I am {assistant}, your personal AI assistant. Would you like to contact {owner}?",
    "{salutation}. {assistant} systems initialized. I'm here to assist with {owner}'s portfolio. Would you like to get in touch with {owner}?",
    "{salutation}. {assistant} at your service. Would you like me to help you contact {owner}?",
];

/// Return-visit greetings, also ending in the contact question.
const RETURN_GREETINGS: &[&str] = &[
    "Welcome back. {assistant} still at your service. Would you like to contact {owner}?",
    "Hello again. {assistant} systems ready to assist you. Would you like to get in touch with {owner}?",
    "I see you've returned. Would you like me to help you contact {owner}?",
    "Arc reactor power levels stable. Would you like to connect with {owner}?",
];

/// Display names and the canned lines built from them.
#[derive(Debug, Clone)]
pub struct Persona {
    assistant_name: String,
    owner_name: String,
}

impl Persona {
    #[must_use]
    pub fn new(config: &PersonaConfig) -> Self {
        Self {
            assistant_name: config.assistant_name.clone(),
            owner_name: config.owner_name.clone(),
        }
    }

    #[must_use]
    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Change the assistant display name. An empty name restores the default.
    pub fn set_assistant_name(&mut self, name: &str) {
        self.assistant_name = if name.is_empty() {
            PersonaConfig::default().assistant_name
        } else {
            name.to_owned()
        };
    }

    /// Substitute `{assistant}` and `{owner}` placeholders.
    #[must_use]
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{assistant}", &self.assistant_name)
            .replace("{owner}", &self.owner_name)
    }

    /// Produce a greeting of the given kind for the given local hour.
    pub fn greeting(&self, kind: GreetingKind, hour: u32, rng: &mut impl Rng) -> String {
        let templates = match kind {
            GreetingKind::Fresh => FRESH_GREETINGS,
            GreetingKind::ReturnVisit => RETURN_GREETINGS,
        };
        let template = templates[rng.gen_range(0..templates.len())];
        self.fill(&template.replace("{salutation}", salutation_for_hour(hour)))
    }

    /// Hint shown by the embedding UI after a quiet period.
    #[must_use]
    pub fn reminder(&self) -> String {
        "If you'd like me to power down, just say 'stop' or another shutdown command.".to_owned()
    }

    /// Spoken when the user answers yes to the contact question.
    #[must_use]
    pub fn contact_confirmed(&self) -> String {
        "Great! I'm opening the contact form for you now.".to_owned()
    }

    /// Spoken when the user answers no to the contact question.
    #[must_use]
    pub fn contact_declined(&self) -> String {
        self.fill("No problem. Feel free to ask if you have any other questions about {owner}'s work.")
    }

    /// Spoken when a contact keyword shows up mid-conversation.
    #[must_use]
    pub fn contact_opening(&self) -> String {
        "I'll open the contact form for you right away.".to_owned()
    }
}
