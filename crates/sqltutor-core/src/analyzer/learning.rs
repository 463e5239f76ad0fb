//! Learning path planning over the concept prerequisite chains

use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::debug;

use crate::knowledge::KnowledgeBase;

/// Keywords found in a finding topic, and the concepts they call for.
/// The first matching row wins.
const TOPIC_CONCEPTS: [(&[&str], &[&str]); 4] = [
    (&["aggregate"], &["aggregate_functions_concept", "group_by_concept"]),
    (&["group", "having"], &["group_by_concept", "having_clause_concept"]),
    (&["join"], &["join_concept"]),
    (&["where"], &["where_clause_concept"]),
];

/// Concepts worth studying for the given finding topics.
///
/// Each topic (see [`crate::Finding::topic`]) selects concepts by keyword,
/// every selected concept pulls in its whole prerequisite chain, and the
/// result is ordered by ascending difficulty. Keys missing from the concept
/// table sort as difficulty 1.
pub fn plan<I, S>(topics: I, knowledge: &KnowledgeBase) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected: IndexSet<String> = IndexSet::new();
    for topic in topics {
        let topic = topic.as_ref().to_lowercase();
        let concepts = TOPIC_CONCEPTS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| topic.contains(k)))
            .map(|(_, concepts)| *concepts)
            .unwrap_or_default();
        selected.extend(concepts.iter().map(|c| c.to_string()));
    }

    let mut path: IndexSet<String> = IndexSet::new();
    for concept in &selected {
        path.insert(concept.clone());
        path.extend(prerequisites(concept, knowledge));
    }

    let mut path: Vec<String> = path.into_iter().collect();
    path.sort_by_key(|key| knowledge.concept(key).map(|c| c.difficulty).unwrap_or(1));
    debug!(?path, "planned learning path");
    path
}

/// Ancestors of `key`, nearest first. The walk stops at a key that is not in
/// the concept table or that was already visited.
pub fn prerequisites(key: &str, knowledge: &KnowledgeBase) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::from([key]);
    let mut chain = Vec::new();
    let mut current = knowledge.concept(key);
    while let Some(concept) = current {
        let Some(next) = concept.prerequisite.as_deref() else {
            break;
        };
        if !visited.insert(next) {
            break;
        }
        let Some(parent) = knowledge.concept(next) else {
            break;
        };
        chain.push(parent.key.clone());
        current = Some(parent);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aggregate_topic_pulls_in_chain() {
        let knowledge = KnowledgeBase::builtin();
        let path = plan(["SEMANTIC_ERROR aggregate_in_where"], &knowledge);
        assert_eq!(
            path,
            vec![
                "select_concept",
                "where_clause_concept",
                "aggregate_functions_concept",
                "group_by_concept",
            ]
        );
    }

    #[test]
    fn test_no_duplicates_across_topics() {
        let knowledge = KnowledgeBase::builtin();
        let path = plan(
            [
                "SEMANTIC_ERROR aggregate_in_where",
                "SEMANTIC_ERROR missing_group_by",
                "SEMANTIC_ERROR having_without_group",
            ],
            &knowledge,
        );
        assert_eq!(
            path,
            vec![
                "select_concept",
                "where_clause_concept",
                "aggregate_functions_concept",
                "group_by_concept",
                "having_clause_concept",
            ]
        );
    }

    #[test]
    fn test_first_matching_keyword_wins() {
        let knowledge = KnowledgeBase::builtin();
        // "aggregate" matches before "group", so HAVING is not pulled in
        let path = plan(["SEMANTIC_ERROR missing_aggregate_with_group_by"], &knowledge);
        assert!(!path.contains(&"having_clause_concept".to_string()));
        assert!(path.contains(&"group_by_concept".to_string()));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let knowledge = KnowledgeBase::builtin();
        let path = plan(["SEMANTIC_ERROR join", "SEMANTIC_ERROR group"], &knowledge);
        // join_concept and group_by_concept both have difficulty 4
        let join = path.iter().position(|k| k == "join_concept").unwrap();
        let group = path.iter().position(|k| k == "group_by_concept").unwrap();
        assert!(join < group);
    }

    #[test]
    fn test_unrelated_topics_give_empty_path() {
        let knowledge = KnowledgeBase::builtin();
        assert!(plan(["SYNTAX_ERROR missing_from", "SCHEMA_ERROR schema_table_exists"], &knowledge).is_empty());
        assert!(plan(Vec::<String>::new(), &knowledge).is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let knowledge = KnowledgeBase::from_toml_str(
            r#"
            [concepts.a]
            label = "A"
            difficulty = 2
            prerequisite = "b"

            [concepts.b]
            label = "B"
            difficulty = 1
            prerequisite = "a"
            "#,
        )
        .unwrap();
        assert_eq!(prerequisites("a", &knowledge), vec!["b"]);
    }

    #[test]
    fn test_dangling_prerequisite_ends_chain() {
        let knowledge = KnowledgeBase::from_toml_str(
            r#"
            [concepts.join_concept]
            label = "Joins"
            difficulty = 3
            prerequisite = "missing"
            "#,
        )
        .unwrap();
        assert!(prerequisites("join_concept", &knowledge).is_empty());
        assert_eq!(plan(["join"], &knowledge), vec!["join_concept"]);
    }

    #[test]
    fn test_unknown_concept_keys_are_kept() {
        let knowledge = KnowledgeBase::default();
        assert_eq!(plan(["where"], &knowledge), vec!["where_clause_concept"]);
    }
}
