//! Inline `[n]` citation markers and the trailing reference list.
//!
//! Reference numbers are 1-based positions in `CollectedData`. A report is
//! well-formed when it carries a reference section and every marker cited in
//! the body has an entry there.

use super::records::CollectedData;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

pub const REFERENCES_HEADING: &str = "## References";

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("marker pattern is valid"));

/// A marker together with any spaces in front of it, for removal.
static SPACED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\[(\d+)\]").expect("spaced marker pattern is valid"));

static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?\**(references|sources)\**\s*:?\s*$")
        .expect("heading pattern is valid")
});

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s*)?\[(\d+)\]:?\s*(.+?)\s*$").expect("entry pattern is valid")
});

/// What a report cites and what its reference list provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationCheck {
    /// Markers found in the body, before the reference section.
    pub cited: BTreeSet<usize>,
    /// Reference list entries by number.
    pub listed: BTreeMap<usize, String>,
    /// Whether a reference section heading was found.
    pub has_section: bool,
}

impl CitationCheck {
    /// Cited markers with no reference entry.
    pub fn dangling(&self) -> Vec<usize> {
        self.cited
            .iter()
            .copied()
            .filter(|n| !self.listed.contains_key(n))
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.has_section && !self.listed.is_empty() && self.dangling().is_empty()
    }

    /// Whether every cited and listed number is a position in a store of
    /// `len` results.
    pub fn within(&self, len: usize) -> bool {
        let in_range = |n: &usize| (1..=len).contains(n);
        self.cited.iter().all(in_range) && self.listed.keys().all(in_range)
    }
}

/// Byte offset of the last reference section heading line.
fn section_start(report: &str) -> Option<usize> {
    let mut offset = 0;
    let mut found = None;
    for line in report.split_inclusive('\n') {
        if SECTION_HEADING.is_match(line.trim_end_matches(['\r', '\n'])) {
            found = Some(offset);
        }
        offset += line.len();
    }
    found
}

/// Split a report into its body and reference section (heading included).
fn split_sections(report: &str) -> (&str, Option<&str>) {
    match section_start(report) {
        Some(at) => (&report[..at], Some(&report[at..])),
        None => (report, None),
    }
}

pub fn check_citations(report: &str) -> CitationCheck {
    let (body, section) = split_sections(report);
    let cited = MARKER
        .captures_iter(body)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .collect();
    let listed = section
        .map(|s| {
            s.lines()
                .filter_map(|line| {
                    let caps = ENTRY.captures(line)?;
                    Some((caps[1].parse::<usize>().ok()?, caps[2].to_string()))
                })
                .collect()
        })
        .unwrap_or_default();
    CitationCheck {
        cited,
        listed,
        has_section: section.is_some(),
    }
}

/// Render the reference list for `data`, one numbered entry per result.
pub fn render_reference_list(data: &CollectedData) -> String {
    let mut out = String::from(REFERENCES_HEADING);
    out.push_str("\n\n");
    for (i, result) in data.iter().enumerate() {
        out.push_str(&format!("[{}] {}", i + 1, result.identifier));
        if let Some(source) = result.source.as_deref()
            && source != result.identifier
        {
            out.push_str(&format!(" <{source}>"));
        }
        out.push_str(&format!(" (query: \"{}\")\n", result.query));
    }
    out
}

/// Drop markers that do not name a position in a store of `len` results.
fn strip_unresolvable(body: &str, len: usize) -> String {
    SPACED_MARKER
        .replace_all(body, |caps: &regex::Captures<'_>| {
            match caps[1].parse::<usize>() {
                Ok(n) if (1..=len).contains(&n) => caps[0].to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

/// Return `report` unchanged if its citations are consistent and every
/// number points into `data`. Otherwise drop markers outside `data` and
/// replace any reference section with one rendered from `data`.
pub fn ensure_references(report: &str, data: &CollectedData) -> String {
    let check = check_citations(report);
    if check.is_consistent() && check.within(data.len()) {
        return report.to_string();
    }
    let (body, _) = split_sections(report);
    let body = strip_unresolvable(body, data.len());
    let body = body.trim_end();
    let list = render_reference_list(data);
    if body.is_empty() {
        list
    } else {
        format!("{body}\n\n{list}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::records::SearchResult;
    use pretty_assertions::assert_eq;

    fn data() -> CollectedData {
        let mut data = CollectedData::new();
        data.append(SearchResult::new("q1", "resp_1", "one"));
        data.append(
            SearchResult::new("q2", "resp_2", "two").with_source("https://example.org/two"),
        );
        data
    }

    #[test]
    fn test_check_well_formed_report() {
        let report = "Batteries store charge [1]. Quantum ones may be faster [2][1].\n\n\
                      ## References\n[1] resp_1\n- [2]: resp_2\n";
        let check = check_citations(report);
        assert_eq!(check.cited, BTreeSet::from([1, 2]));
        assert_eq!(check.listed.len(), 2);
        assert_eq!(check.listed[&2], "resp_2");
        assert!(check.is_consistent());
    }

    #[test]
    fn test_markers_in_reference_list_do_not_count_as_cited() {
        let check = check_citations("No citations here.\n\nSources:\n[1] resp_1\n");
        assert!(check.cited.is_empty());
        assert!(check.is_consistent());
    }

    #[test]
    fn test_dangling_marker() {
        let check = check_citations("See [1] and [3].\n\n**References**\n[1] resp_1\n");
        assert_eq!(check.dangling(), vec![3]);
        assert!(!check.is_consistent());
    }

    #[test]
    fn test_render_reference_list() {
        assert_eq!(
            render_reference_list(&data()),
            "## References\n\n\
             [1] resp_1 (query: \"q1\")\n\
             [2] resp_2 <https://example.org/two> (query: \"q2\")\n"
        );
    }

    #[test]
    fn test_ensure_appends_missing_list() {
        let fixed = ensure_references("Finding [1].\n", &data());
        assert!(fixed.starts_with("Finding [1].\n\n## References"));
        assert!(check_citations(&fixed).is_consistent());
    }

    #[test]
    fn test_ensure_replaces_broken_list() {
        let report = "Finding [2].\n\n## Sources\n[1] made-up\n";
        let fixed = ensure_references(report, &data());
        assert!(!fixed.contains("made-up"));
        let check = check_citations(&fixed);
        assert_eq!(check.listed[&2], "resp_2 <https://example.org/two> (query: \"q2\")");
    }

    #[test]
    fn test_out_of_range_marker_is_dropped() {
        let fixed = ensure_references("Claim [1]. Another claim [7].\n", &data());
        assert!(fixed.starts_with("Claim [1]. Another claim.\n\n## References"));
        let check = check_citations(&fixed);
        assert!(check.is_consistent());
        assert!(check.within(2));
    }

    #[test]
    fn test_self_consistent_list_beyond_data_is_replaced() {
        let report = "Claim [2][9].\n\n## References\n[2] resp_2\n[9] invented\n";
        let fixed = ensure_references(report, &data());
        assert!(fixed.starts_with("Claim [2].\n\n"));
        assert!(!fixed.contains("invented"));
        assert_eq!(check_citations(&fixed).listed.len(), 2);
    }

    #[test]
    fn test_within_bounds() {
        let check = check_citations("A [1] [2].\n\n## References\n[1] a\n[2] b\n");
        assert!(check.within(2));
        assert!(!check.within(1));
        assert!(!check_citations("A [0].").within(3));
    }

    #[test]
    fn test_ensure_is_stable() {
        let once = ensure_references("Finding [1].", &data());
        assert_eq!(ensure_references(&once, &data()), once);
        let good = "A [1].\n\n## References\n[1] resp_1\n";
        assert_eq!(ensure_references(good, &data()), good);
    }
}
