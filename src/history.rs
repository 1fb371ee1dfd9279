//! Session-only record of past analyses.
//!
//! Entries are kept newest first. Display numbers count down from the list
//! length, so the newest entry always carries the highest number and numbers
//! are recomputed after every change.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::SentimentResult;

const TEXT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub name: String,
    pub text: String,
    pub sentiment: String,
    pub score: f64,
    pub created: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(name: &str, text: &str, result: &SentimentResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            text: text.to_string(),
            sentiment: result.label.to_string(),
            score: result.score,
            created: Utc::now(),
        }
    }

    /// Text shortened to its first 50 characters, with `...` when cut.
    pub fn preview(&self) -> String {
        if self.text.chars().count() > TEXT_PREVIEW_CHARS {
            let head: String = self.text.chars().take(TEXT_PREVIEW_CHARS).collect();
            format!("{head}...")
        } else {
            self.text.clone()
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    /// Removes the entry shown under `number`.
    pub fn remove(&mut self, number: usize) -> Option<HistoryEntry> {
        let index = self.index_of(number)?;
        Some(self.entries.remove(index))
    }

    /// Empties the history, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// `(number, entry)` pairs, newest first.
    pub fn list(&self) -> impl Iterator<Item = (usize, &HistoryEntry)> {
        let len = self.entries.len();
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, entry)| (len - i, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_of(&self, number: usize) -> Option<usize> {
        (1..=self.entries.len())
            .contains(&number)
            .then(|| self.entries.len() - number)
    }
}
