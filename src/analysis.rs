//! Word-frequency statistics over translated titles.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Anything that is neither a letter (any script) nor whitespace.
static NON_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\s]").unwrap());

/// Word counts in order of first occurrence.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFrequencies(Vec<(String, usize)>);

impl WordFrequencies {
    #[cfg(test)]
    pub fn get(&self, word: &str) -> Option<usize> {
        self.0.iter().find(|(w, _)| w == word).map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(w, c)| (w.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for WordFrequencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (word, count) in &self.0 {
            map.serialize_entry(word, count)?;
        }
        map.end()
    }
}

/// Lowercase, letters-only tokens of `title`.
fn tokens(title: &str) -> Vec<String> {
    NON_LETTER
        .replace_all(&title.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Count words across all `titles` and keep those seen strictly more than
/// `threshold` times.
///
/// # Examples
///
/// ```ignore
/// let words = repeated_words(["Cat cat", "dog"], 1);
/// assert_eq!(words.iter().collect::<Vec<_>>(), vec![("cat", 2)]);
/// ```
pub fn repeated_words<I, S>(titles: I, threshold: usize) -> WordFrequencies
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for title in titles {
        for word in tokens(title.as_ref()) {
            match index.get(&word) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(word.clone(), order.len());
                    order.push((word, 1));
                }
            }
        }
    }

    WordFrequencies(
        order
            .into_iter()
            .filter(|(_, count)| *count > threshold)
            .collect(),
    )
}
