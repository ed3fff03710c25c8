//! Free-text cleanup for line-item descriptions.

use regex::Regex;

/// Removes configured stop words from line-item text.
#[derive(Debug, Clone)]
pub struct StopWordStripper {
    pattern: Option<Regex>,
}

impl StopWordStripper {
    /// Build a stripper matching each word as a whole word, case-insensitively.
    pub fn new<S: AsRef<str>>(stop_words: &[S]) -> Result<Self, regex::Error> {
        let words: Vec<String> = stop_words
            .iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(&w))
            .collect();

        if words.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"\b(?:{})\b", words.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Lower-case `text`, drop stop words and collapse whitespace.
    ///
    /// Returns `None` when nothing is left.
    pub fn strip(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let cleaned = match &self.pattern {
            Some(pattern) => pattern.replace_all(&lower, " ").into_owned(),
            None => lower,
        };

        let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(collapsed)
        }
    }
}
