//! Quiz generation: prompt construction and tolerant parsing of the reply

use serde::{Deserialize, Serialize};
use serde_json::Value;
use studymate_core::{ChatTurn, Mode, ProviderConfig, Tone};
use tracing::warn;

use crate::prompt::system_instruction;

pub const MAX_QUESTIONS: usize = 20;
const DEFAULT_QUESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::default(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl QuizRequest {
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
            .as_deref()
            .map(Difficulty::parse_or_default)
            .unwrap_or_default()
    }

    pub fn question_count(&self) -> usize {
        self.count.unwrap_or(DEFAULT_QUESTIONS).clamp(1, MAX_QUESTIONS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    fn is_valid(&self) -> bool {
        !self.question.trim().is_empty() && self.options.len() == 4 && self.correct < 4
    }
}

/// Settings used for quiz generation
pub fn quiz_settings() -> ProviderConfig {
    ProviderConfig::default()
        .with_mode(Mode::Examiner)
        .with_tone(Tone::Precise)
}

pub fn build_quiz_prompt(topic: &str, difficulty: Difficulty, count: usize) -> Vec<ChatTurn> {
    let system = format!(
        "{}\nRespond with JSON only: an array of objects with the keys \
         \"question\" (string), \"options\" (array of exactly 4 strings), \
         \"correct\" (index 0-3 of the right option) and \"explanation\" (string). \
         No prose and no code fences.",
        system_instruction(&quiz_settings())
    );
    let user = format!(
        "Write {} {} multiple-choice questions about: {}",
        count,
        difficulty.as_str(),
        topic.trim()
    );
    vec![ChatTurn::system(system), ChatTurn::user(user)]
}

/// Body of the first fenced code block, with any language tag removed
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// JSON values embedded in a reply: the fenced block first, then every
/// value that parses starting at a `[` or `{`
fn json_candidates(text: &str) -> impl Iterator<Item = Value> + '_ {
    let fenced = fenced_block(text).and_then(|block| serde_json::from_str::<Value>(block).ok());
    let embedded = text
        .char_indices()
        .filter(|(_, c)| *c == '[' || *c == '{')
        .filter_map(move |(offset, _)| {
            serde_json::Deserializer::from_str(&text[offset..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        });
    fenced.into_iter().chain(embedded)
}

fn questions_from(value: Value) -> Option<(usize, Vec<QuizQuestion>)> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let total = items.len();
    let questions: Vec<QuizQuestion> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<QuizQuestion>(item).ok())
        .filter(QuizQuestion::is_valid)
        .collect();
    (!questions.is_empty()).then_some((total, questions))
}

/// Extracts the valid questions from a provider reply
pub fn parse_quiz(text: &str) -> Vec<QuizQuestion> {
    match json_candidates(text).find_map(questions_from) {
        Some((total, questions)) => {
            if questions.len() < total {
                warn!(dropped = total - questions.len(), "Dropped malformed quiz questions");
            }
            questions
        }
        None => {
            warn!("Quiz reply holds no usable questions");
            Vec::new()
        }
    }
}
