//! Evaluate-sufficiency stage.

use super::ports::TextGenerator;
use super::records::CollectedData;
use crate::error::ServiceError;
use tracing::{info, warn};

/// Result count at which collected data is presumed sufficient when the
/// evaluator is unreachable.
pub const HEURISTIC_MIN_RESULTS: usize = 5;

fn evaluation_prompt(goal: &str, data: &CollectedData) -> String {
    format!(
        "Based on the following research data: {data}\n\
         Is the following research goal satisfied? Goal: {goal}\n\
         Answer only with Yes or No.",
        data = data.to_prompt_json()
    )
}

/// A reply counts as affirmative when it contains "yes" in any case.
pub fn parse_verdict(text: &str) -> bool {
    text.to_lowercase().contains("yes")
}

pub fn heuristic_verdict(data: &CollectedData) -> bool {
    data.len() >= HEURISTIC_MIN_RESULTS
}

/// Remote half of the stage.
pub async fn request_verdict(
    generator: &dyn TextGenerator,
    system: &str,
    goal: &str,
    data: &CollectedData,
) -> Result<bool, ServiceError> {
    let text = generator
        .generate(system, &evaluation_prompt(goal, data))
        .await?;
    Ok(parse_verdict(&text))
}

/// Judge whether `data` satisfies `goal`. Each call asks afresh.
pub async fn evaluate_sufficiency(
    generator: &dyn TextGenerator,
    system: &str,
    goal: &str,
    data: &CollectedData,
) -> bool {
    match request_verdict(generator, system, goal, data).await {
        Ok(verdict) => {
            info!(stage = "evaluate", verdict, collected = data.len(), "Evaluation complete");
            verdict
        }
        Err(e) => {
            let verdict = heuristic_verdict(data);
            warn!(
                stage = "evaluate",
                error = %e,
                collected = data.len(),
                verdict,
                "Evaluation failed, using result-count heuristic"
            );
            verdict
        }
    }
}
