//! Supplemental-query stage.
//!
//! Unlike every other stage there is no fallback here: a failure is handed
//! back to the engine, which ends the search phase.

use super::parse::decode_json;
use super::ports::TextGenerator;
use super::records::CollectedData;
use crate::error::ServiceError;

pub const MAX_SUPPLEMENTAL_QUERIES: usize = 5;

fn supplement_prompt(goal: &str, data: &CollectedData) -> String {
    format!(
        "Given the research data collected so far: {data}\n\
         The research goal is: {goal}\n\
         The collected data does not satisfy the goal yet. Write {MAX_SUPPLEMENTAL_QUERIES} new \
         web search queries that cover what is missing. Do not repeat queries already used.\n\
         Output: A json array of the {MAX_SUPPLEMENTAL_QUERIES} queries. Reply with the JSON only.\n\
         Format: [\"q1\", ....]",
        data = data.to_prompt_json()
    )
}

/// Validate a model reply into a query batch: blanks are dropped, at most
/// [`MAX_SUPPLEMENTAL_QUERIES`] are kept, and an empty batch is malformed.
pub fn parse_queries(text: &str) -> Result<Vec<String>, ServiceError> {
    let raw: Vec<String> = decode_json(text)?;
    let queries: Vec<String> = raw
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_SUPPLEMENTAL_QUERIES)
        .collect();
    if queries.is_empty() {
        return Err(ServiceError::malformed("no supplemental queries"));
    }
    Ok(queries)
}

pub async fn generate_supplemental_queries(
    generator: &dyn TextGenerator,
    system: &str,
    goal: &str,
    data: &CollectedData,
) -> Result<Vec<String>, ServiceError> {
    let text = generator
        .generate(system, &supplement_prompt(goal, data))
        .await?;
    parse_queries(&text)
}
