use std::collections::BTreeMap;

use proptest::prelude::*;
use sutra_core::config::QueryConfig;
use sutra_query::QueryExpander;

#[test]
fn known_phrases_win_over_bag_of_words() {
    let qx = QueryExpander::default();
    let terms = qx.extract_lexical_terms("請解釋般若波羅蜜多與緣起的關係？");
    assert_eq!(terms, vec!["般若波羅蜜多".to_string(), "緣起".to_string()]);
}

#[test]
fn shorter_phrase_inside_longer_one_is_subsumed() {
    let qx = QueryExpander::default();
    let terms = qx.extract_lexical_terms("般若波羅蜜多是什麼");
    assert_eq!(terms, vec!["般若波羅蜜多".to_string()]);
}

#[test]
fn stop_words_and_punctuation_are_stripped_without_phrases() {
    let qx = QueryExpander::default();
    let terms = qx.extract_lexical_terms("觀自在菩薩是誰？");
    assert_eq!(terms, vec!["觀自在菩薩".to_string(), "誰".to_string()]);

    let terms = qx.extract_lexical_terms("What is the meaning of bodhi?");
    assert_eq!(terms, vec!["meaning".to_string(), "bodhi".to_string()]);
}

#[test]
fn falls_back_to_stripped_question() {
    let qx = QueryExpander::default();
    assert_eq!(qx.extract_lexical_terms("是什麼？"), vec!["是什麼".to_string()]);
    assert!(qx.extract_lexical_terms("？！").is_empty());
}

#[test]
fn dictionary_candidates_cover_two_to_four_chars() {
    let qx = QueryExpander::default();
    let candidates = qx.extract_dictionary_candidates("六度，布施");
    // runs: 六度 / 布施 (punctuation splits runs)
    assert_eq!(candidates, vec!["六度".to_string(), "布施".to_string()]);

    let candidates = qx.extract_dictionary_candidates("菩提心生起");
    assert_eq!(candidates.len(), 2 + 3 + 4);
    assert_eq!(candidates[0], "菩提心生");
    assert!(candidates.contains(&"提心".to_string()));
    assert!(candidates.iter().all(|c| (2..=4).contains(&c.chars().count())));
}

#[test]
fn dictionary_candidates_ignore_latin_and_digits() {
    let qx = QueryExpander::default();
    assert!(qx.extract_dictionary_candidates("abc 123 x").is_empty());
}

#[test]
fn aliases_resolve_to_text_ids() {
    let qx = QueryExpander::default();
    let scope = qx.resolve_text_alias("心經和金剛經如何談空？").expect("scope");
    assert_eq!(scope.into_iter().collect::<Vec<_>>(), vec!["T0235".to_string(), "T0251".to_string()]);
    assert!(qx.resolve_text_alias("什麼是佛性").is_none());
}

#[test]
fn configured_phrases_and_aliases_extend_tables() {
    let mut extra_aliases = BTreeMap::new();
    extra_aliases.insert("藥師經".to_string(), vec!["T0450".to_string()]);
    let qx = QueryExpander::new(&QueryConfig { extra_phrases: vec!["藥師琉璃光".into()], extra_aliases });
    let q = qx.expand("  藥師經  中的藥師琉璃光如來 ");
    assert_eq!(q.question, "藥師經 中的藥師琉璃光如來");
    assert_eq!(q.lexical_terms, vec!["藥師琉璃光".to_string()]);
    assert!(q.text_scope.expect("scope").contains("T0450"));
}

proptest! {
    #[test]
    fn candidates_are_unique_and_bounded(s in "[一-龥，。 a-z]{0,24}") {
        let qx = QueryExpander::default();
        let candidates = qx.extract_dictionary_candidates(&s);
        let mut dedup = candidates.clone();
        dedup.sort();
        dedup.dedup();
        prop_assert_eq!(dedup.len(), candidates.len());
        for c in &candidates {
            let n = c.chars().count();
            prop_assert!((2..=4).contains(&n));
            prop_assert!(s.contains(c.as_str()));
        }
    }

    #[test]
    fn lexical_terms_never_contain_punctuation(s in "\\PC{0,40}") {
        let qx = QueryExpander::default();
        for term in qx.extract_lexical_terms(&s) {
            prop_assert!(!term.chars().any(|c| c.is_ascii_punctuation() || c == '，' || c == '。'));
            prop_assert!(!term.trim().is_empty());
        }
    }
}
