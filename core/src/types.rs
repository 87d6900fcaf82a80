use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What the assistant is asked to act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Tutor,
    Summarizer,
    Examiner,
}

impl Mode {
    /// Parses a mode name, falling back to the default for anything unknown
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "tutor" => Mode::Tutor,
            "summarizer" => Mode::Summarizer,
            "examiner" => Mode::Examiner,
            _ => Mode::default(),
        }
    }
}

/// Sampling style requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Creative,
    #[default]
    Balanced,
    Precise,
}

impl Tone {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "creative" => Tone::Creative,
            "balanced" => Tone::Balanced,
            "precise" => Tone::Precise,
            _ => Tone::default(),
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            Tone::Creative => 0.9,
            Tone::Balanced => 0.7,
            Tone::Precise => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    #[default]
    Friendly,
    Professional,
    Encouraging,
    Socratic,
}

impl Personality {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "friendly" => Personality::Friendly,
            "professional" => Personality::Professional,
            "encouraging" => Personality::Encouraging,
            "socratic" => Personality::Socratic,
            _ => Personality::default(),
        }
    }
}

/// Raw shape of the `config` object sent by the frontend
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProviderConfig {
    personality: Option<String>,
    mode: Option<String>,
    tone: Option<String>,
}

/// Prompt templating and sampling settings for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawProviderConfig")]
pub struct ProviderConfig {
    pub personality: Personality,
    pub mode: Mode,
    pub tone: Tone,
}

impl From<RawProviderConfig> for ProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        Self {
            personality: raw
                .personality
                .as_deref()
                .map(Personality::parse_or_default)
                .unwrap_or_default(),
            mode: raw.mode.as_deref().map(Mode::parse_or_default).unwrap_or_default(),
            tone: raw.tone.as_deref().map(Tone::parse_or_default).unwrap_or_default(),
        }
    }
}

impl ProviderConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn temperature(&self) -> f32 {
        self.tone.temperature()
    }
}

/// Which configured provider produced a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlot {
    Primary,
    Fallback,
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSlot::Primary => write!(f, "primary"),
            ProviderSlot::Fallback => write!(f, "fallback"),
        }
    }
}

/// Completion text together with the provider that answered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub text: String,
    pub provider_used: ProviderSlot,
    pub provider: String,
}
