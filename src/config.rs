//! Configuration types for the assistant engine.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Display names substituted into canned responses.
    pub persona: PersonaConfig,
    /// Speech synthesis tuning and voice selection preferences.
    pub voice: VoiceConfig,
    /// Listening retry budget and scheduling delays.
    pub listen: ListenConfig,
    /// Near-duplicate command suppression.
    pub debounce: DebounceConfig,
    /// Greeting variant selection thresholds.
    pub greeting: GreetingConfig,
    /// Utterance history cap and storage location.
    pub history: HistoryConfig,
    /// Seed for response variant selection. `None` seeds from entropy;
    /// set a fixed value for deterministic selection in tests.
    pub response_seed: Option<u64>,
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let body = std::fs::read_to_string(path)?;
        toml::from_str(&body)
            .map_err(|e| AssistantError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Display names for the assistant persona and the portfolio owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the assistant introduces itself with.
    pub assistant_name: String,
    /// Name of the portfolio owner the assistant presents.
    pub owner_name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: "StellarForge".to_owned(),
            owner_name: "Rishi".to_owned(),
        }
    }
}

/// Speech synthesis tuning and voice selection preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Synthesis rate multiplier.
    pub rate: f32,
    /// Synthesis pitch multiplier.
    pub pitch: f32,
    /// Synthesis volume in `0.0..=1.0`.
    pub volume: f32,
    /// Human-readable language label looked for in voice names
    /// (first fallback tier).
    pub language_label: String,
    /// BCP-47 language tag prefix looked for in voice locales.
    pub language_tag: String,
    /// Persona cues looked for in voice names (e.g. gender or accent
    /// markers). Any one matching is enough.
    pub persona_cues: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rate: 1.1,
            pitch: 1.1,
            volume: 1.0,
            language_label: "English".to_owned(),
            language_tag: "en".to_owned(),
            persona_cues: vec!["Male".to_owned(), "UK".to_owned()],
        }
    }
}

/// Listening retry budget and scheduling delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Maximum recognition retries after a no-speech result.
    pub max_retries: u32,
    /// Delay before a retry attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Delay before listening resumes after the assistant speaks,
    /// in milliseconds.
    pub relisten_delay_ms: u64,
    /// Pause between hearing the user and speaking the response,
    /// in milliseconds.
    pub response_delay_ms: u64,
    /// Delay before the contact form event fires once requested,
    /// in milliseconds.
    pub contact_open_delay_ms: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            relisten_delay_ms: 300,
            response_delay_ms: 300,
            contact_open_delay_ms: 500,
        }
    }
}

/// Near-duplicate command suppression.
///
/// The similarity threshold and window were tuned empirically in the
/// original interaction design; both are kept configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Window after the previous command within which near-duplicates are
    /// dropped, in milliseconds.
    pub window_ms: u64,
    /// Similarity ratio in `0.0..=1.0` above which two commands of
    /// comparable length count as duplicates.
    pub similarity_threshold: f32,
    /// Maximum length difference in characters for the ratio check to apply.
    pub length_slack: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            similarity_threshold: 0.7,
            length_slack: 5,
        }
    }
}

/// Greeting variant selection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Reactivation inside this window counts as a return visit,
    /// in milliseconds.
    pub return_window_ms: u64,
    /// Reactivation must follow at least this much inactivity to count as a
    /// return visit, in milliseconds.
    pub min_inactivity_ms: u64,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            return_window_ms: 2 * 60 * 1000,
            min_inactivity_ms: 10_000,
        }
    }
}

/// Utterance history cap and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Most recent entries kept; older ones are evicted first.
    pub max_entries: usize,
    /// Root directory for the persisted history file.
    pub root_dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            root_dir: default_root_dir(),
        }
    }
}

/// Returns the default state directory, `~/.stellarforge`.
fn default_root_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".stellarforge")
    } else {
        PathBuf::from("/tmp/.stellarforge")
    }
}
