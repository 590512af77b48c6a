//! Property-based tests for the deterministic stage fallbacks.

use proptest::prelude::*;

use sleuth_core::research::clarify::{QUESTION_COUNT, pad_questions, parse_questions};
use sleuth_core::research::plan::{INITIAL_QUERY_COUNT, fallback_plan, parse_plan};
use sleuth_core::research::records::{CollectedData, SearchResult, stable_id};

proptest! {
    #[test]
    fn padded_questions_are_always_five(
        topic in "[a-z ]{1,30}",
        parsed in prop::collection::vec("[0-9]\\. [a-z ?]{0,20}", 0..10),
    ) {
        let questions = pad_questions(parsed.clone(), &topic);
        prop_assert_eq!(questions.len(), QUESTION_COUNT);
        prop_assert!(questions.iter().all(|q| !q.trim().is_empty()));
        let kept = parsed.len().min(QUESTION_COUNT);
        prop_assert_eq!(&questions[..kept], &parsed[..kept]);
    }

    #[test]
    fn parsed_questions_start_with_a_digit(text in "[0-9a-z .\\n]{0,200}") {
        for line in parse_questions(&text) {
            prop_assert!(line.starts_with(|c: char| c.is_ascii_digit()));
        }
    }

    #[test]
    fn fallback_plan_is_deterministic(topic in "\\PC{1,40}") {
        let a = fallback_plan(&topic);
        let b = fallback_plan(&topic);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.queries.len(), INITIAL_QUERY_COUNT);
        prop_assert!(a.goal.contains(topic.as_str()));
        prop_assert!(a.queries.iter().all(|q| q.ends_with(topic.as_str())));
    }

    #[test]
    fn parse_plan_never_returns_short_batches(
        goal in "[a-z ]{0,20}",
        queries in prop::collection::vec("[a-z ]{0,10}", 0..8),
    ) {
        let body = serde_json::json!({"goal": goal, "queries": queries}).to_string();
        if let Ok(plan) = parse_plan(&body) {
            prop_assert!(!plan.goal.is_empty());
            prop_assert_eq!(plan.queries.len(), INITIAL_QUERY_COUNT);
        }
    }

    #[test]
    fn stable_ids_depend_only_on_query(query in "\\PC{0,60}") {
        prop_assert_eq!(stable_id("search", &query), stable_id("search", &query));
    }

    #[test]
    fn collected_identifiers_stay_unique(ids in prop::collection::vec("[a-c]{1,2}", 0..30)) {
        let mut data = CollectedData::new();
        for id in &ids {
            data.append(SearchResult::new("q", id.clone(), "text"));
        }
        let mut seen = std::collections::HashSet::new();
        prop_assert_eq!(data.len(), ids.len());
        prop_assert!(data.iter().all(|r| seen.insert(r.identifier.clone())));
    }
}
