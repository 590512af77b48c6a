//! Goal-and-queries stage.
//!
//! Turns topic, questions and answers into one goal sentence and the initial
//! batch of [`INITIAL_QUERY_COUNT`] search queries. Never partially fails.

use super::parse::decode_json;
use super::ports::TextGenerator;
use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const INITIAL_QUERY_COUNT: usize = 5;

const FALLBACK_QUERY_PHRASES: [&str; INITIAL_QUERY_COUNT] = [
    "comprehensive guide",
    "latest research",
    "best practices",
    "expert analysis",
    "current trends",
];

/// The research goal and its initial queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub goal: String,
    pub queries: Vec<String>,
}

/// Wire shape demanded from the model.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanReply {
    goal: String,
    queries: Vec<String>,
}

fn plan_prompt(topic: &str, questions: &[String], answers: &[String]) -> String {
    let answers = serde_json::to_string(answers).unwrap_or_default();
    let questions = serde_json::to_string(questions).unwrap_or_default();
    format!(
        "Using the user answers {answers} to the questions {questions}, write a goal sentence \
         and {INITIAL_QUERY_COUNT} web search queries for the research about {topic}\n\
         Output: A json object with the goal and the {INITIAL_QUERY_COUNT} web search queries \
         that will reach it. Reply with the JSON only.\n\
         Format: {{\"goal\": \"...\", \"queries\": [\"q1\", ....]}}"
    )
}

/// Validate a model reply into a plan.
///
/// The goal must be non-empty and at least [`INITIAL_QUERY_COUNT`] non-empty
/// queries must be present; extras are dropped.
pub fn parse_plan(text: &str) -> Result<ResearchPlan, ServiceError> {
    let reply: PlanReply = decode_json(text)?;
    let goal = reply.goal.trim().to_string();
    if goal.is_empty() {
        return Err(ServiceError::malformed("goal is empty"));
    }
    let queries: Vec<String> = reply
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(INITIAL_QUERY_COUNT)
        .collect();
    if queries.len() < INITIAL_QUERY_COUNT {
        return Err(ServiceError::malformed(format!(
            "expected {INITIAL_QUERY_COUNT} queries, got {}",
            queries.len()
        )));
    }
    Ok(ResearchPlan { goal, queries })
}

/// The deterministic plan used when derivation fails.
pub fn fallback_plan(topic: &str) -> ResearchPlan {
    ResearchPlan {
        goal: format!("To provide comprehensive research about {topic} based on user requirements"),
        queries: FALLBACK_QUERY_PHRASES
            .iter()
            .map(|phrase| format!("{phrase} {topic}"))
            .collect(),
    }
}

/// Remote half of the stage.
pub async fn request_plan(
    generator: &dyn TextGenerator,
    system: &str,
    topic: &str,
    questions: &[String],
    answers: &[String],
) -> Result<ResearchPlan, ServiceError> {
    let text = generator
        .generate(system, &plan_prompt(topic, questions, answers))
        .await?;
    parse_plan(&text)
}

/// Derive the goal and initial queries, substituting the template plan on failure.
pub async fn derive_plan(
    generator: &dyn TextGenerator,
    system: &str,
    topic: &str,
    questions: &[String],
    answers: &[String],
) -> ResearchPlan {
    match request_plan(generator, system, topic, questions, answers).await {
        Ok(plan) => {
            info!(stage = "plan", goal = %plan.goal, "Research goal derived");
            plan
        }
        Err(e) => {
            warn!(stage = "plan", error = %e, "Goal derivation failed, using template plan");
            fallback_plan(topic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::mock::ScriptedGenerator;
    use pretty_assertions::assert_eq;

    const GOOD: &str = r#"{"goal": "Understand X", "queries": ["a", "b", "c", "d", "e"]}"#;

    #[test]
    fn test_parse_plan() {
        let plan = parse_plan(GOOD).unwrap();
        assert_eq!(plan.goal, "Understand X");
        assert_eq!(plan.queries, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_parse_plan_in_fence_and_truncates() {
        let text = "```json\n{\"goal\": \"G\", \"queries\": [\"1\",\"2\",\"3\",\"4\",\"5\",\"6\"]}\n```";
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.queries.len(), INITIAL_QUERY_COUNT);
        assert_eq!(plan.queries[4], "5");
    }

    #[test]
    fn test_parse_plan_rejects_bad_shapes() {
        for text in [
            "not json",
            r#"{"goal": "G"}"#,
            r#"{"goal": "", "queries": ["a","b","c","d","e"]}"#,
            r#"{"goal": "G", "queries": ["a","b","  ","d"]}"#,
            r#"{"goal": "G", "queries": ["a","b","c","d","e"], "extra": 1}"#,
            r#"["a","b"]"#,
        ] {
            let err = parse_plan(text).unwrap_err();
            assert!(
                matches!(err, ServiceError::MalformedResponse { .. }),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn test_fallback_plan() {
        let plan = fallback_plan("tidal power");
        assert_eq!(
            plan.goal,
            "To provide comprehensive research about tidal power based on user requirements"
        );
        assert_eq!(
            plan.queries,
            vec![
                "comprehensive guide tidal power",
                "latest research tidal power",
                "best practices tidal power",
                "expert analysis tidal power",
                "current trends tidal power",
            ]
        );
        assert_eq!(plan, fallback_plan("tidal power"));
    }

    #[tokio::test]
    async fn test_derive_plan_success() {
        let generator = ScriptedGenerator::new().then_text(GOOD);
        let questions = vec!["1. Why?".to_string()];
        let answers = vec!["Because".to_string()];
        let plan = derive_plan(&generator, "sys", "X", &questions, &answers).await;
        assert_eq!(plan.goal, "Understand X");

        let prompt = &generator.prompts()[0].prompt;
        assert!(prompt.contains("\"Because\""));
        assert!(prompt.contains("\"1. Why?\""));
    }

    #[tokio::test]
    async fn test_derive_plan_invalid_json_falls_back() {
        let generator = ScriptedGenerator::new().then_text("Sure! Here is your plan: goal...");
        let plan = derive_plan(&generator, "sys", "X", &[], &[]).await;
        assert_eq!(plan, fallback_plan("X"));
    }
}
