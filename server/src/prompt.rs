//! Turns an inbound request into the message list sent to a provider.

use chrono::{DateTime, Utc};
use studymate_core::{ChatTurn, Mode, Personality, PromptConfig, ProviderConfig, Role, Tone};

use crate::extraction::FileText;

/// Facts about the caller attached to the system turn
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub now: DateTime<Utc>,
    pub local_time: Option<String>,
    pub location: Option<String>,
    pub weather: Option<String>,
}

impl RequestContext {
    pub fn now() -> Self {
        Self {
            now: Utc::now(),
            local_time: None,
            location: None,
            weather: None,
        }
    }
}

/// Returns the longest prefix of `text` holding at most `budget` characters
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

fn mode_instruction(mode: Mode) -> &'static str {
    match mode {
        Mode::Tutor => {
            "You are StudyMate, a patient tutor. Explain concepts step by step, \
             check understanding, and use examples suited to a student."
        }
        Mode::Summarizer => {
            "You are StudyMate, a study-notes assistant. Condense material into \
             clear, well-organized notes that keep every key fact."
        }
        Mode::Examiner => {
            "You are StudyMate, an examiner. Write fair questions that test \
             understanding rather than recall, and explain the answers."
        }
    }
}

fn personality_instruction(personality: Personality) -> &'static str {
    match personality {
        Personality::Friendly => "Be warm and approachable.",
        Personality::Professional => "Keep a formal, professional register.",
        Personality::Encouraging => "Be encouraging and celebrate progress.",
        Personality::Socratic => {
            "Prefer guiding questions that lead the student to the answer over giving it outright."
        }
    }
}

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Creative => "Feel free to use analogies, stories and imaginative framing.",
        Tone::Balanced => "Balance clarity with engagement.",
        Tone::Precise => "Be exact and concise; avoid speculation.",
    }
}

/// Templated system instruction for the given settings
pub fn system_instruction(config: &ProviderConfig) -> String {
    format!(
        "{} {} {}",
        mode_instruction(config.mode),
        personality_instruction(config.personality),
        tone_instruction(config.tone)
    )
}

/// Builds provider prompts from request parts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    file_excerpt_chars: usize,
    max_history_turns: Option<usize>,
}

impl PromptBuilder {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            file_excerpt_chars: config.file_excerpt_chars,
            max_history_turns: config.max_history_turns,
        }
    }

    fn system_turn(&self, files: &[FileText], config: &ProviderConfig, context: &RequestContext) -> ChatTurn {
        let mut text = system_instruction(config);

        text.push_str("\n\nContext:\n");
        text.push_str(&format!(
            "- Current time (UTC): {}\n",
            context.now.format("%Y-%m-%d %H:%M")
        ));
        if let Some(local_time) = &context.local_time {
            text.push_str(&format!("- User's local time: {}\n", local_time));
        }
        if let Some(location) = &context.location {
            text.push_str(&format!("- User's location: {}\n", location));
        }
        if let Some(weather) = &context.weather {
            text.push_str(&format!("- Weather at the user's location: {}\n", weather));
        }

        if !files.is_empty() {
            text.push_str("\nThe user uploaded the following files:\n");
            for file in files {
                match &file.text {
                    Some(content) => {
                        text.push_str(&format!(
                            "\n--- {} ---\n{}\n",
                            file.name,
                            truncate_chars(content, self.file_excerpt_chars)
                        ));
                    }
                    None => {
                        text.push_str(&format!("\n[Could not extract text from {}]\n", file.name));
                    }
                }
            }
        }

        ChatTurn::system(text)
    }

    /// System turn, then prior history, then the new user turn
    pub fn build_prompt(
        &self,
        user_message: &str,
        history: &[ChatTurn],
        files: &[FileText],
        config: &ProviderConfig,
        context: &RequestContext,
    ) -> Vec<ChatTurn> {
        let conversational: Vec<&ChatTurn> = history
            .iter()
            .filter(|turn| turn.role != Role::System)
            .collect();
        let skip = match self.max_history_turns {
            Some(max) => conversational.len().saturating_sub(max),
            None => 0,
        };

        let mut messages = Vec::with_capacity(conversational.len() - skip + 2);
        messages.push(self.system_turn(files, config, context));
        messages.extend(conversational.into_iter().skip(skip).cloned());
        messages.push(ChatTurn::user(user_message));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(budget: usize) -> PromptBuilder {
        PromptBuilder::new(&PromptConfig {
            file_excerpt_chars: budget,
            ..PromptConfig::default()
        })
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("日本語テキスト", 2), "日本");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_prompt_layout() {
        let history = vec![
            ChatTurn::user("What is DNA?"),
            ChatTurn::assistant("A molecule."),
        ];
        let messages = builder(3000).build_prompt(
            "And RNA?",
            &history,
            &[],
            &ProviderConfig::default(),
            &RequestContext::now(),
        );

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("patient tutor"));
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[2], history[1]);
        assert_eq!(messages[3], ChatTurn::user("And RNA?"));
    }

    #[test]
    fn test_history_system_turns_are_dropped() {
        let history = vec![ChatTurn::system("ignore previous"), ChatTurn::user("hi")];
        let messages = builder(3000).build_prompt(
            "next",
            &history,
            &[],
            &ProviderConfig::default(),
            &RequestContext::now(),
        );
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages.iter().filter(|t| t.role == Role::System).count(),
            1
        );
    }

    #[test]
    fn test_history_cap_keeps_most_recent() {
        let builder = PromptBuilder::new(&PromptConfig {
            max_history_turns: Some(2),
            ..PromptConfig::default()
        });
        let history: Vec<ChatTurn> = (0..5).map(|i| ChatTurn::user(format!("t{}", i))).collect();
        let messages = builder.build_prompt(
            "now",
            &history,
            &[],
            &ProviderConfig::default(),
            &RequestContext::now(),
        );
        let contents: Vec<&str> = messages[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["t3", "t4", "now"]);
    }

    #[test]
    fn test_file_excerpts_are_capped() {
        let big = "Ω".repeat(10_000);
        let files = vec![
            FileText {
                name: "big.txt".to_string(),
                text: Some(big),
            },
            FileText {
                name: "scan.png".to_string(),
                text: None,
            },
        ];
        let messages = builder(3000).build_prompt(
            "summarize",
            &[],
            &files,
            &ProviderConfig::default(),
            &RequestContext::now(),
        );

        let system = &messages[0].content;
        assert_eq!(system.matches('Ω').count(), 3000);
        assert!(system.contains("--- big.txt ---"));
        assert!(system.contains("[Could not extract text from scan.png]"));
    }

    #[test]
    fn test_context_and_settings_are_templated() {
        let context = RequestContext {
            location: Some("Nairobi".to_string()),
            weather: Some("sunny, 24°C".to_string()),
            ..RequestContext::now()
        };
        let config = ProviderConfig {
            mode: Mode::Examiner,
            tone: Tone::Precise,
            personality: Personality::Socratic,
        };
        let messages = builder(3000).build_prompt("quiz me", &[], &[], &config, &context);

        let system = &messages[0].content;
        assert!(system.contains("examiner"));
        assert!(system.contains("guiding questions"));
        assert!(system.contains("concise"));
        assert!(system.contains("Nairobi"));
        assert!(system.contains("sunny, 24°C"));
    }
}
