use crate::models::RankedWord;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

pub const TOP_SLOTS: usize = 5;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "couldn", "did", "didn", "do", "does", "doesn",
    "doing", "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn",
    "has", "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just",
    "ll", "me", "might", "more", "most", "must", "mustn", "my", "myself", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves",
    "out", "over", "own", "re", "same", "shall", "shan", "she", "should", "shouldn", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "ve", "very", "was", "wasn", "we", "were", "weren", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "won", "would", "wouldn", "you", "your",
    "yours", "yourself", "yourselves",
];

fn stopwords() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();
    SET.get_or_init(|| {
        STOPWORDS
            .iter()
            .map(|word| (*word).to_string())
            .chain(('a'..='z').map(String::from))
            .collect()
    })
}

pub fn is_stopword(word: &str) -> bool {
    stopwords().contains(&word.to_lowercase())
}

/// Word counts that iterate in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFrequencies {
    entries: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
}

impl WordFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str, count: usize) {
        match self.positions.get(word) {
            Some(&position) => self.entries[position].1 += count,
            None => {
                self.positions.insert(word.to_string(), self.entries.len());
                self.entries.push((word.to_string(), count));
            }
        }
    }

    pub fn get(&self, word: &str) -> Option<usize> {
        self.positions
            .get(word)
            .map(|&position| self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(word, count)| (word.as_str(), *count))
    }
}

impl<'a> FromIterator<(&'a str, usize)> for WordFrequencies {
    fn from_iter<I: IntoIterator<Item = (&'a str, usize)>>(iter: I) -> Self {
        let mut frequencies = Self::new();
        for (word, count) in iter {
            frequencies.add(word, count);
        }
        frequencies
    }
}

pub fn count_filtered_words(text: &str) -> WordFrequencies {
    let mut frequencies = WordFrequencies::new();

    for token in text.split_whitespace() {
        let word: String = token.chars().filter(|c| c.is_alphabetic()).collect();
        if word.is_empty() || is_stopword(&word) {
            continue;
        }
        frequencies.add(&word, 1);
    }

    frequencies
}

/// Five ranked slots; unoccupied slots stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopFive {
    slots: [Option<RankedWord>; TOP_SLOTS],
}

impl TopFive {
    pub fn slots(&self) -> &[Option<RankedWord>; TOP_SLOTS] {
        &self.slots
    }

    pub fn words(&self) -> impl Iterator<Item = &RankedWord> {
        self.slots.iter().flatten()
    }

    /// Occupied slots as `"<word>: <n> times"`, keyed by 1-based slot number.
    pub fn numbered(&self) -> BTreeMap<usize, String> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|ranked| {
                    (index + 1, format!("{}: {} times", ranked.word, ranked.frequency))
                })
            })
            .collect()
    }

    /// Places `word` in the first slot that is empty or holds a strictly
    /// lower frequency, shifting the rest down. Returns false when it ranks
    /// below every occupied slot.
    pub fn offer(&mut self, word: &str, frequency: usize) -> bool {
        let target = self.slots.iter().position(|slot| match slot {
            None => true,
            Some(ranked) => frequency > ranked.frequency,
        });

        let Some(index) = target else {
            return false;
        };

        self.slots[index..].rotate_right(1);
        self.slots[index] = Some(RankedWord {
            word: word.to_string(),
            frequency,
        });
        true
    }
}

pub fn top_five(frequencies: &WordFrequencies) -> TopFive {
    let mut ranking = TopFive::default();
    for (word, frequency) in frequencies.iter() {
        ranking.offer(word, frequency);
    }
    ranking
}
