//! Whole-word keyword lookups over stored sentences.
//!
//! Both lookups compare case-insensitively and never match substrings, so
//! `the` does not match `theater`. They differ in how a sentence is
//! tokenized: search only trims punctuation around each whitespace token,
//! while occurrence counting first drops every character that is not a
//! letter, whitespace, `-`, `_` or `/`.

use crate::models::{DocumentMatches, KeywordSearch, OccurrenceReport, Sentence};
use std::collections::BTreeMap;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '/')
}

fn is_kept_for_occurrence(c: char) -> bool {
    c.is_alphabetic() || c.is_whitespace() || matches!(c, '-' | '_' | '/')
}

/// A lowercased keyword ready for token comparisons.
#[derive(Debug, Clone)]
pub struct Keyword {
    lowered: String,
}

impl Keyword {
    /// Returns `None` for a blank keyword.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                lowered: trimmed.to_lowercase(),
            })
        }
    }

    fn matches_token(&self, token: &str) -> bool {
        token.to_lowercase() == self.lowered
    }

    pub fn appears_in(&self, sentence: &str) -> bool {
        sentence
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| !is_word_char(c)))
            .any(|token| self.matches_token(token))
    }

    pub fn occurrences_in(&self, sentence: &str) -> usize {
        let cleaned: String = sentence.chars().filter(|c| is_kept_for_occurrence(*c)).collect();
        cleaned
            .split_whitespace()
            .filter(|token| self.matches_token(token))
            .count()
    }
}

/// Matching sentences of one document, numbered from 1 in stored order.
pub fn matching_sentences(keyword: &Keyword, sentences: &[Sentence]) -> BTreeMap<usize, String> {
    sentences
        .iter()
        .filter(|sentence| keyword.appears_in(&sentence.text))
        .enumerate()
        .map(|(index, sentence)| (index + 1, sentence.text.clone()))
        .collect()
}

pub fn search_documents<I>(keyword: &Keyword, documents: I) -> KeywordSearch
where
    I: IntoIterator<Item = (i64, Vec<Sentence>)>,
{
    let matches: Vec<DocumentMatches> = documents
        .into_iter()
        .filter_map(|(document_id, sentences)| {
            let numbered = matching_sentences(keyword, &sentences);
            if numbered.is_empty() {
                None
            } else {
                Some(DocumentMatches {
                    document_id,
                    sentences: numbered,
                })
            }
        })
        .collect();

    if matches.is_empty() {
        KeywordSearch::NotFound
    } else {
        KeywordSearch::Matches(matches)
    }
}

pub fn count_occurrences(keyword: &Keyword, sentences: &[Sentence]) -> OccurrenceReport {
    let mut report = OccurrenceReport::default();

    for (index, sentence) in sentences.iter().enumerate() {
        let found = keyword.occurrences_in(&sentence.text);
        if found > 0 {
            report.count += found;
            report
                .found_in
                .insert(format!("Sentence {index}"), sentence.text.clone());
        }
    }

    report
}
