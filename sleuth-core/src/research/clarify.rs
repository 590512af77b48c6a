//! Clarifying-question stage.
//!
//! Always yields exactly [`QUESTION_COUNT`] questions: whatever the model
//! produced first, then topic templates as padding.

use super::ports::TextGenerator;
use crate::error::ServiceError;
use tracing::{info, warn};

pub const QUESTION_COUNT: usize = 5;

fn clarify_prompt(topic: &str) -> String {
    format!(
        "Ask {QUESTION_COUNT} numbered clarifying question to the user about the topic: {topic}.\n\
         The goal of the questions is to understand the intended purpose of the research \
         and help the user to understand it.\n\
         Reply only with the questions"
    )
}

/// Template question `slot` (0-based) for `topic`, numbered `number`.
fn template_question(slot: usize, number: usize, topic: &str) -> String {
    match slot {
        0 => format!("{number}. What specific aspect of {topic} are you most interested in?"),
        1 => format!("{number}. What is your current knowledge level about {topic}?"),
        2 => format!("{number}. What is the intended use of this research about {topic}?"),
        3 => format!(
            "{number}. Are there any particular challenges or problems related to {topic} you want to address?"
        ),
        _ => format!("{number}. What timeframe or scope are you considering for {topic}?"),
    }
}

/// Keep only non-empty lines that start with a digit.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// Truncate or pad `parsed` to exactly [`QUESTION_COUNT`] items.
///
/// Padding continues the numbering after the parsed questions and draws
/// templates in order, so the same input always produces the same output.
pub fn pad_questions(mut parsed: Vec<String>, topic: &str) -> Vec<String> {
    parsed.truncate(QUESTION_COUNT);
    let have = parsed.len();
    for slot in 0..QUESTION_COUNT - have {
        parsed.push(template_question(slot, have + slot + 1, topic));
    }
    parsed
}

/// The questions used when generation fails outright.
pub fn fallback_questions(topic: &str) -> Vec<String> {
    pad_questions(Vec::new(), topic)
}

/// Remote half of the stage.
pub async fn request_questions(
    generator: &dyn TextGenerator,
    system: &str,
    topic: &str,
) -> Result<Vec<String>, ServiceError> {
    let text = generator.generate(system, &clarify_prompt(topic)).await?;
    Ok(parse_questions(&text))
}

/// Derive clarifying questions, substituting templates on failure.
pub async fn derive_questions(
    generator: &dyn TextGenerator,
    system: &str,
    topic: &str,
) -> Vec<String> {
    match request_questions(generator, system, topic).await {
        Ok(parsed) => {
            if parsed.len() < QUESTION_COUNT {
                warn!(
                    stage = "clarify",
                    parsed = parsed.len(),
                    "Too few questions parsed, padding with templates"
                );
            }
            let questions = pad_questions(parsed, topic);
            info!(stage = "clarify", count = questions.len(), "Clarifying questions ready");
            questions
        }
        Err(e) => {
            warn!(stage = "clarify", error = %e, "Question generation failed, using templates");
            fallback_questions(topic)
        }
    }
}
