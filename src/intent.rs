//! Keyword-driven intent matching over recognized transcripts.
//!
//! A transcript is lowercased, stripped of punctuation, and scanned for a
//! fixed vocabulary of key terms. Stop commands win over everything, contact
//! requests come second, then the pattern table is scanned term by term in
//! vocabulary order. A whole-transcript substring pass catches phrasings the
//! term extraction misses, and a guidance line covers the rest.

use crate::persona::Persona;
use rand::Rng;

/// Terms that terminate the interaction, checked before anything else.
const STOP_TERMS: &[&str] = &[
    "stop", "shut", "down", "power", "off", "bye", "goodbye", "exit", "end",
];

/// Terms that trigger the contact-form handoff.
const CONTACT_TERMS: &[&str] = &[
    "contact", "touch", "reach", "email", "hire", "connect", "message",
];

/// Fixed key-term vocabulary in tie-break order. The owner's name is
/// prepended at construction.
const KEY_TERMS: &[&str] = &[
    // Owner
    "developer",
    "creator",
    "portfolio",
    "about",
    // Skills
    "skill",
    "tech",
    "technology",
    "programming",
    "framework",
    "language",
    // Projects
    "project",
    "work",
    "built",
    "app",
    "website",
    "application",
    // Contact
    "contact",
    "hire",
    "touch",
    "email",
    "reach",
    // About the assistant
    "who",
    "what",
    "yourself",
    "name",
    "speaking",
    "talking",
    "are you",
    // Commands
    "stop",
    "shut",
    "down",
    "power",
    "off",
    "goodbye",
    "bye",
    "exit",
];

/// Pattern-to-responses table, templated with `{assistant}` / `{owner}`.
/// Patterns are matched lowercase; the owner placeholder in patterns is
/// filled with the lowercased owner name.
const RAW_TABLE: &[(&[&str], &[&str])] = &[
    (
        &[
            "who are you",
            "your name",
            "who is speaking",
            "tell me about yourself",
            "who am i talking to",
            "what are you",
        ],
        &[
            "I am {assistant}, an AI assistant built directly into this portfolio. I run completely in your browser with no external APIs. Think of me as a J.A.R.V.I.S-inspired guide to help you explore {owner}'s work.",
        ],
    ),
    (
        &[
            "about {owner}",
            "who is {owner}",
            "portfolio owner",
            "tell me about the developer",
            "developer",
            "creator",
        ],
        &[
            "{owner} is a passionate FullStack Web Developer who creates immersive digital experiences. He specializes in bridging the gap between design and development, where creativity meets functionality.",
            "{owner} is a talented developer who focuses on creating innovative web applications. His expertise spans both frontend and backend technologies, with a keen eye for user experience.",
        ],
    ),
    (
        &[
            "skills",
            "technologies",
            "tech stack",
            "programming languages",
            "frameworks",
            "what can {owner} do",
            "techs",
        ],
        &[
            "{owner}'s skills include React, Next.js, TypeScript, Node.js, and various cloud technologies. He's proficient in creating responsive, high-performance web applications with elegant user interfaces.",
            "{owner} works with modern web technologies including React and Next.js for frontend, Node.js for backend, and various database solutions. He's also skilled in UI/UX design implementation.",
        ],
    ),
    (
        &[
            "projects",
            "portfolio",
            "work",
            "what has {owner} built",
            "applications",
            "apps",
            "websites",
        ],
        &[
            "{owner} has developed several impressive projects showcasing full-stack development skills. These include web applications with modern UI/UX, backend APIs, and database integration. You can view them in the projects section below.",
            "{owner}'s portfolio includes a variety of projects demonstrating expertise in frontend and backend development. Each project showcases different aspects of his technical abilities and creative approach.",
        ],
    ),
    (
        &[
            "contact",
            "hire",
            "get in touch",
            "email",
            "reach out",
            "connect",
            "message",
        ],
        &[
            "Would you like to contact {owner}? I can help with that.",
            "Interested in reaching out to {owner}? I can assist with that.",
        ],
    ),
    (
        &[
            "how does this work",
            "how do you work",
            "are you using api",
            "are you online",
            "how are you working",
        ],
        &[
            "I'm built directly into this portfolio and run completely in your browser using the Web Speech API. No external servers or APIs are involved, making me 100% client-side and privacy-friendly.",
            "I'm a fully client-side AI assistant built with JavaScript and the Web Speech API. I don't use any external services or APIs - everything happens right here in your browser.",
        ],
    ),
    (
        &[
            "stop",
            "stop listening",
            "shut down",
            "power off",
            "goodbye",
            "bye",
            "exit",
            "end",
        ],
        &[
            "Arc reactor powering down. I'll stop listening now. Hover over the reactor again if you need assistance.",
            "Shutting down active systems. You can reactivate me by hovering over the arc reactor again.",
        ],
    ),
];

/// A static pattern-to-responses mapping used for canned matching.
#[derive(Debug, Clone)]
pub struct IntentEntry {
    /// Lowercase trigger phrases.
    pub patterns: Vec<String>,
    /// Response variants, chosen uniformly at random.
    pub responses: Vec<String>,
}

/// Result of matching one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Stop keyword present: terminate and speak the acknowledgment.
    Shutdown(String),
    /// Contact keyword present: open the contact form and speak the lead-in.
    Contact(String),
    /// A pattern matched: speak the canned response.
    Reply(String),
    /// Nothing matched: speak the guidance fallback.
    Fallback(String),
}

/// Matcher over the templated intent table.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    entries: Vec<IntentEntry>,
    vocabulary: Vec<String>,
    fallback: String,
    contact_lead_in: String,
}

impl IntentMatcher {
    /// Build the matcher with the persona's names substituted into the
    /// pattern table and vocabulary.
    #[must_use]
    pub fn new(persona: &Persona) -> Self {
        let owner_lower = persona.owner_name().to_lowercase();
        let entries = RAW_TABLE
            .iter()
            .map(|(patterns, responses)| IntentEntry {
                patterns: patterns
                    .iter()
                    .map(|p| p.replace("{owner}", &owner_lower))
                    .collect(),
                responses: responses.iter().map(|r| persona.fill(r)).collect(),
            })
            .collect();

        let mut vocabulary = Vec::with_capacity(KEY_TERMS.len() + 1);
        vocabulary.push(owner_lower);
        vocabulary.extend(KEY_TERMS.iter().map(|t| (*t).to_owned()));

        Self {
            entries,
            vocabulary,
            fallback: persona.fill(
                "I'm not sure I understand. You can ask me about {owner}, his skills, projects, or if you'd like to contact him.",
            ),
            contact_lead_in: persona.contact_opening(),
        }
    }

    /// The templated intent table.
    #[must_use]
    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    /// Map a transcript to an outcome. Stop beats contact beats the table.
    pub fn match_transcript(&self, transcript: &str, rng: &mut impl Rng) -> MatchOutcome {
        let lowered = transcript.to_lowercase();
        let terms = self.extract_key_terms(&lowered);

        if terms.iter().any(|t| STOP_TERMS.contains(&t.as_str())) {
            return MatchOutcome::Shutdown(self.shutdown_ack(rng));
        }

        if terms.iter().any(|t| CONTACT_TERMS.contains(&t.as_str())) {
            return MatchOutcome::Contact(self.contact_lead_in.clone());
        }

        // First term with any matching pattern wins; no cross-term ranking.
        for term in &terms {
            for entry in &self.entries {
                if entry.patterns.iter().any(|p| p.contains(term.as_str())) {
                    return MatchOutcome::Reply(pick(&entry.responses, rng));
                }
            }
        }

        // Substring pass over the whole transcript.
        for entry in &self.entries {
            if entry.patterns.iter().any(|p| lowered.contains(p.as_str())) {
                return MatchOutcome::Reply(pick(&entry.responses, rng));
            }
        }

        MatchOutcome::Fallback(self.fallback.clone())
    }

    /// Vocabulary terms present in the input, in vocabulary order.
    ///
    /// Punctuation is stripped before tokenizing; a term counts as present
    /// when any word equals or contains it.
    #[must_use]
    pub fn extract_key_terms(&self, input: &str) -> Vec<String> {
        let cleaned: String = input
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        self.vocabulary
            .iter()
            .filter(|term| {
                words
                    .iter()
                    .any(|word| *word == term.as_str() || word.contains(term.as_str()))
            })
            .cloned()
            .collect()
    }

    fn shutdown_ack(&self, rng: &mut impl Rng) -> String {
        self.entries
            .iter()
            .find(|entry| entry.patterns.iter().any(|p| p == "stop"))
            .map_or_else(
                || "I understand. Let me know if you need anything else.".to_owned(),
                |entry| pick(&entry.responses, rng),
            )
    }
}

fn pick(responses: &[String], rng: &mut impl Rng) -> String {
    responses[rng.gen_range(0..responses.len())].clone()
}

// ── Yes / no detection ──────────────────────────────────────────────

const AFFIRMATIVE_EXACT: &[&str] = &[
    "yes",
    "yeah",
    "sure",
    "ok",
    "okay",
    "yep",
    "yup",
    "absolutely",
    "please",
    "i do",
];

const AFFIRMATIVE_SUBSTR: &[&str] = &["yes please", "yeah i would", "i want to", "i'd like to"];

const NEGATIVE_EXACT: &[&str] = &["no", "nope", "not now", "no thanks", "later", "not yet"];

const NEGATIVE_SUBSTR: &[&str] = &["don't want", "not right now", "i don't need", "no i don't"];

/// Whether the input reads as a yes to the pending contact question.
#[must_use]
pub fn is_affirmative(input: &str) -> bool {
    let lowered = input.to_lowercase();
    let trimmed = lowered.trim();
    AFFIRMATIVE_EXACT.contains(&trimmed)
        || AFFIRMATIVE_SUBSTR.iter().any(|p| trimmed.contains(p))
}

/// Whether the input reads as a no to the pending contact question.
#[must_use]
pub fn is_negative(input: &str) -> bool {
    let lowered = input.to_lowercase();
    let trimmed = lowered.trim();
    NEGATIVE_EXACT.contains(&trimmed) || NEGATIVE_SUBSTR.iter().any(|p| trimmed.contains(p))
}
