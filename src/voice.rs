//! Voice I/O seam: speech synthesis and single-shot recognition behind an
//! injected trait.
//!
//! The engine itself lives in the host platform (a browser speech API, an OS
//! synthesizer, a test double). The assistant only needs three operations:
//! speak a line to completion, capture one utterance, and cancel whatever is
//! in flight. Adapters here cover the console demo and the silent no-op
//! fallback for platforms without speech support.

use crate::config::VoiceConfig;
use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;
use tracing::debug;

/// One voice advertised by the underlying engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Engine-assigned display name (e.g. "Daniel (English UK)").
    pub name: String,
    /// BCP-47 locale tag (e.g. "en-GB").
    pub language: String,
}

/// Synthesis tuning applied to every spoken line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTuning {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl VoiceTuning {
    #[must_use]
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

impl Default for VoiceTuning {
    fn default() -> Self {
        Self::from_config(&VoiceConfig::default())
    }
}

/// Result of one recognition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    /// A transcript was captured.
    Heard(String),
    /// The engine ended without hearing anything (no-speech timeout).
    NoSpeech,
}

/// Platform speech engine contract.
#[async_trait]
pub trait VoiceIo: Send + Sync {
    /// Voices the engine advertises. Empty when synthesis is unsupported.
    fn voices(&self) -> Vec<VoiceProfile>;

    /// Synthesize `text`, resolving when playback finishes or is cancelled.
    async fn speak(
        &self,
        text: &str,
        voice: Option<&VoiceProfile>,
        tuning: VoiceTuning,
    ) -> Result<()>;

    /// Capture a single utterance (non-continuous, one alternative).
    async fn listen_once(&self) -> Result<ListenOutcome>;

    /// Cancel in-flight synthesis and recognition.
    fn cancel(&self);
}

/// Pick the persona voice from the advertised list.
///
/// Fallback tiers: language label plus a persona cue in the voice name, then
/// locale tag plus a cue, then any voice in the configured locale, then none.
#[must_use]
pub fn select_preferred_voice(
    voices: &[VoiceProfile],
    config: &VoiceConfig,
) -> Option<VoiceProfile> {
    let has_cue =
        |v: &VoiceProfile| config.persona_cues.iter().any(|cue| v.name.contains(cue.as_str()));

    voices
        .iter()
        .find(|v| v.name.contains(&config.language_label) && has_cue(v))
        .or_else(|| {
            voices
                .iter()
                .find(|v| v.language.starts_with(&config.language_tag) && has_cue(v))
        })
        .or_else(|| voices.iter().find(|v| v.language.contains(&config.language_tag)))
        .cloned()
}

/// Silent adapter for platforms without speech support.
///
/// Speaking completes immediately and listening never hears anything, so the
/// assistant degrades to a no-op instead of failing.
#[derive(Debug, Default)]
pub struct NullVoice;

#[async_trait]
impl VoiceIo for NullVoice {
    fn voices(&self) -> Vec<VoiceProfile> {
        Vec::new()
    }

    async fn speak(
        &self,
        text: &str,
        _voice: Option<&VoiceProfile>,
        _tuning: VoiceTuning,
    ) -> Result<()> {
        debug!("speech unsupported, dropping line: {text}");
        Ok(())
    }

    async fn listen_once(&self) -> Result<ListenOutcome> {
        Ok(ListenOutcome::NoSpeech)
    }

    fn cancel(&self) {}
}

/// Terminal-backed adapter for the console demo: spoken lines go to stdout,
/// recognized speech is read line by line from stdin.
#[derive(Debug, Default)]
pub struct ConsoleVoice;

#[async_trait]
impl VoiceIo for ConsoleVoice {
    fn voices(&self) -> Vec<VoiceProfile> {
        vec![VoiceProfile {
            name: "Console English (UK Male)".to_owned(),
            language: "en-GB".to_owned(),
        }]
    }

    async fn speak(
        &self,
        text: &str,
        _voice: Option<&VoiceProfile>,
        _tuning: VoiceTuning,
    ) -> Result<()> {
        println!("assistant> {text}");
        Ok(())
    }

    async fn listen_once(&self) -> Result<ListenOutcome> {
        print!("you> ");
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await? {
            Some(line) if !line.trim().is_empty() => Ok(ListenOutcome::Heard(line)),
            _ => Ok(ListenOutcome::NoSpeech),
        }
    }

    fn cancel(&self) {}
}
