use serde::Deserialize;
use studymate_core::{ChatTurn, Mode, ProviderConfig, Tone};

use crate::prompt::{system_instruction, truncate_chars};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryStyle {
    #[default]
    Bullet,
    Concise,
    Detailed,
    Outline,
}

impl SummaryStyle {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bullet" | "bullets" => SummaryStyle::Bullet,
            "concise" | "short" => SummaryStyle::Concise,
            "detailed" => SummaryStyle::Detailed,
            "outline" => SummaryStyle::Outline,
            _ => SummaryStyle::default(),
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            SummaryStyle::Bullet => "Write the notes as a bulleted list of key points.",
            SummaryStyle::Concise => "Write a short summary of one or two paragraphs.",
            SummaryStyle::Detailed => {
                "Write detailed notes with headings, definitions and worked examples where relevant."
            }
            SummaryStyle::Outline => "Write a hierarchical outline using numbered headings.",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: Option<String>,
}

impl SummaryRequest {
    pub fn style(&self) -> SummaryStyle {
        self.style
            .as_deref()
            .map(SummaryStyle::parse_or_default)
            .unwrap_or_default()
    }
}

pub fn summary_settings() -> ProviderConfig {
    ProviderConfig::default()
        .with_mode(Mode::Summarizer)
        .with_tone(Tone::Precise)
}

/// Prompt asking for study notes on `text`, capped at `budget` characters
pub fn build_summary_prompt(text: &str, style: SummaryStyle, budget: usize) -> Vec<ChatTurn> {
    let system = format!(
        "{}\n{}",
        system_instruction(&summary_settings()),
        style.instruction()
    );
    let user = format!(
        "Create study notes from the following material:\n\n{}",
        truncate_chars(text.trim(), budget)
    );
    vec![ChatTurn::system(system), ChatTurn::user(user)]
}
