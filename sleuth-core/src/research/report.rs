//! Report synthesis stage.

use super::citations::{ensure_references, render_reference_list};
use super::ports::TextGenerator;
use super::records::CollectedData;
use crate::error::ServiceError;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Numbered source listing shared by the prompt and the reference list.
fn numbered_sources(data: &CollectedData) -> String {
    data.iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{n}] identifier: {id}\nquery: {query}\ncontent: {content}\n",
                n = i + 1,
                id = r.identifier,
                query = r.query,
                content = r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_prompt(goal: &str, data: &CollectedData) -> String {
    format!(
        "Write a complete and detailed report about research goal: {goal}\n\
         Cite sources inline using [n], where n is the number of a source below, and append a \
         reference list under the heading \"References\" mapping each [n] to its identifier.\n\n\
         Collected data:\n{sources}",
        sources = numbered_sources(data)
    )
}

/// The templated report used when synthesis fails.
pub fn fallback_report(goal: &str, data: &CollectedData) -> String {
    let count = data.len();
    let distinct_queries = data.iter().map(|r| r.query.as_str()).collect::<BTreeSet<_>>().len();
    let findings: String = data
        .iter()
        .enumerate()
        .map(|(i, r)| format!("- {query} [{n}]\n", query = r.query, n = i + 1))
        .collect();
    format!(
        "# Deep Research Report: {goal}\n\n\
         ## Executive Summary\n\
         This report summarizes the material gathered while researching the goal above. \
         Automated synthesis was unavailable, so the findings are listed as collected.\n\n\
         ## Key Findings\n\
         Based on the collected data from {count} research queries, the following areas were covered:\n\n\
         {findings}\n\
         ### Research Methodology\n\
         - Conducted {count} targeted web searches\n\
         - Covered {distinct_queries} distinct queries\n\
         - Evaluated sufficiency against the research goal after each round\n\n\
         ## Conclusion\n\
         This research provides a starting point for understanding the topic and for further investigation.\n\n\
         {references}",
        references = render_reference_list(data)
    )
}

/// Remote half of the stage.
pub async fn request_report(
    generator: &dyn TextGenerator,
    system: &str,
    goal: &str,
    data: &CollectedData,
) -> Result<String, ServiceError> {
    generator.generate(system, &report_prompt(goal, data)).await
}

/// Write the final report. The result always carries a reference list that
/// covers its inline markers.
pub async fn synthesize_report(
    generator: &dyn TextGenerator,
    system: &str,
    goal: &str,
    data: &CollectedData,
) -> String {
    match request_report(generator, system, goal, data).await {
        Ok(text) => {
            let report = ensure_references(&text, data);
            info!(stage = "report", chars = report.len(), "Report synthesized");
            report
        }
        Err(e) => {
            warn!(stage = "report", error = %e, "Report synthesis failed, using template");
            fallback_report(goal, data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::citations::check_citations;
    use crate::research::mock::ScriptedGenerator;
    use crate::research::records::SearchResult;
    use pretty_assertions::assert_eq;

    fn data(n: usize) -> CollectedData {
        let mut data = CollectedData::new();
        for i in 1..=n {
            data.append(SearchResult::new(format!("query {i}"), format!("id-{i}"), "text"));
        }
        data
    }

    #[test]
    fn test_fallback_report_structure() {
        let report = fallback_report("Understand tides", &data(3));
        assert!(report.starts_with("# Deep Research Report: Understand tides"));
        assert!(report.contains("## Executive Summary"));
        assert!(report.contains("collected data from 3 research queries"));
        assert!(report.contains("- Conducted 3 targeted web searches"));
        assert!(report.contains("- query 2 [2]"));
        assert!(report.contains("## Conclusion"));

        let check = check_citations(&report);
        assert!(check.is_consistent());
        assert_eq!(check.listed.len(), 3);
    }

    #[test]
    fn test_fallback_report_with_no_data() {
        let report = fallback_report("g", &CollectedData::new());
        assert!(report.contains("from 0 research queries"));
        assert!(report.ends_with("## References\n\n"));
    }

    #[tokio::test]
    async fn test_prompt_numbers_sources() {
        let generator = ScriptedGenerator::new().then_text("Body [1].");
        synthesize_report(&generator, "sys", "goal", &data(2)).await;
        let prompt = &generator.prompts()[0].prompt;
        assert!(prompt.contains("[1] identifier: id-1"));
        assert!(prompt.contains("[2] identifier: id-2"));
    }

    #[tokio::test]
    async fn test_synthesized_report_gets_references() {
        let generator = ScriptedGenerator::new().then_text("Tides follow the moon [1][2].");
        let report = synthesize_report(&generator, "sys", "goal", &data(2)).await;
        assert!(report.starts_with("Tides follow the moon [1][2]."));
        assert!(check_citations(&report).is_consistent());
    }

    #[tokio::test]
    async fn test_citation_beyond_collected_data_is_dropped() {
        let generator = ScriptedGenerator::new().then_text("Claim [1]. Another claim [7].");
        let report = synthesize_report(&generator, "sys", "goal", &data(5)).await;
        assert!(report.starts_with("Claim [1]. Another claim.\n\n## References"));
        let check = check_citations(&report);
        assert!(check.dangling().is_empty());
        assert!(check.is_consistent());
        assert_eq!(check.listed.len(), 5);
    }

    #[tokio::test]
    async fn test_failure_uses_template() {
        let report = synthesize_report(&ScriptedGenerator::failing(), "sys", "g", &data(2)).await;
        assert_eq!(report, fallback_report("g", &data(2)));
    }
}
