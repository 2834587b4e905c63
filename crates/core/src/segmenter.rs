use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationPolicy {
    /// UAX #29 sentence boundaries.
    #[default]
    Unicode,
    /// Split on every `.`; for environments without a sentence tokenizer.
    Period,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl SegmentationPolicy {
    /// Splits `text` into trimmed, non-empty sentences in source order.
    pub fn split(self, text: &str) -> Vec<String> {
        match self {
            Self::Unicode => {
                let normalized = normalize_whitespace(text);
                keep_non_empty(normalized.unicode_sentences())
            }
            Self::Period => keep_non_empty(text.split('.')),
        }
    }
}

fn keep_non_empty<'a>(segments: impl Iterator<Item = &'a str>) -> Vec<String> {
    segments
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof \u{a0}  spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn unicode_policy_keeps_sentence_order() {
        let sentences = SegmentationPolicy::Unicode.split("Cats are great. Dogs are great too.");
        assert_eq!(sentences, vec!["Cats are great.", "Dogs are great too."]);
    }

    #[test]
    fn wrapped_lines_stay_in_one_sentence() {
        let sentences =
            SegmentationPolicy::Unicode.split("The pump is\nrated for\n40 bar. It runs hot.\n");
        assert_eq!(sentences, vec!["The pump is rated for 40 bar.", "It runs hot."]);
    }

    #[test]
    fn period_policy_discards_empty_segments() {
        let sentences = SegmentationPolicy::Period.split("First. Second.  . \n.Third");
        assert_eq!(sentences, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn blank_text_yields_nothing_under_both_policies() {
        assert!(SegmentationPolicy::Unicode.split(" \n\t ").is_empty());
        assert!(SegmentationPolicy::Period.split(" . \n . ").is_empty());
    }
}
