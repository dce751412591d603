//! StellarForge: client-local voice assistant engine for a portfolio site.
//!
//! A small conversational assistant that greets a visitor, answers canned
//! questions about the portfolio owner, and offers to open the contact form:
//! Activation → Greeting → Listening ⇄ Processing → (contact handoff |
//! shutdown) → Idle.
//!
//! # Architecture
//!
//! The engine is built from independent pieces wired together by the
//! [`assistant::Assistant`] flow controller:
//! - **Voice I/O**: the platform speech engine behind the
//!   [`voice::VoiceIo`] trait (inject a fake for tests)
//! - **Intent matching**: keyword extraction over a fixed pattern table
//!   ([`intent`])
//! - **Debounce**: near-duplicate transcript suppression ([`debounce`])
//! - **History**: capped, persisted utterance log ([`history`])
//! - **Persona**: greetings and name-templated canned text ([`persona`])

pub mod assistant;
pub mod config;
pub mod debounce;
pub mod error;
pub mod history;
pub mod intent;
pub mod persona;
pub mod voice;

pub use assistant::{Assistant, AssistantEvent, Phase};
pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use history::{HistoryStore, JsonFileStore, MemoryStore, Utterance};
pub use voice::{ConsoleVoice, ListenOutcome, NullVoice, VoiceIo, VoiceProfile, VoiceTuning};
