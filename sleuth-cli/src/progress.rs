//! Terminal progress output for a research run.

use sleuth_core::research::{ResearchCallback, ResearchPhase, SearchResult};

/// Prints phase changes, finished queries and verdicts to stderr.
pub struct TerminalProgress {
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

fn describe(phase: &ResearchPhase) -> Option<String> {
    match phase {
        ResearchPhase::Searching { round: 0 } => Some("Searching initial queries".into()),
        ResearchPhase::Searching { round } => Some(format!("Searching supplemental round {round}")),
        ResearchPhase::Reporting => Some("Writing report".into()),
        ResearchPhase::Done => Some("Done".into()),
        ResearchPhase::Cancelled => Some("Cancelled".into()),
        _ => None,
    }
}

impl ResearchCallback for TerminalProgress {
    fn on_phase_change(&self, phase: &ResearchPhase) {
        if self.quiet {
            return;
        }
        if let Some(text) = describe(phase) {
            eprintln!("==> {text}");
        }
    }

    fn on_query_complete(&self, _round: usize, result: &SearchResult) {
        if !self.quiet {
            eprintln!("    - {}", result.query);
        }
    }

    fn on_round_evaluated(&self, round: usize, verdict: bool, collected: usize) {
        if !self.quiet {
            let verdict = if verdict { "sufficient" } else { "insufficient" };
            eprintln!("    round {round}: {collected} results, {verdict}");
        }
    }
}
