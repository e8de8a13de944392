//! Static fallback question bank.
//!
//! A JSON array of `{question, choices, answer}` entries loaded once at
//! startup. Malformed entries are dropped at load time and never surface at
//! runtime; a missing or unreadable file just yields an empty bank.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::path::Path;

use super::{ProviderResult, QuestionProvider};
use crate::types::{Question, CHOICE_COUNT};

#[derive(Debug, Deserialize)]
struct RawEntry {
    question: String,
    choices: Vec<String>,
    answer: i64,
}

#[derive(Debug, Default)]
pub struct LocalBank {
    questions: Vec<Question>,
}

impl LocalBank {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a bank from disk. Any failure to read or parse the file is
    /// logged and yields an empty bank.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::from_json(&data),
            Err(e) => {
                tracing::warn!("could not read local question bank {}: {e}", path.display());
                Self::empty()
            }
        }
    }

    /// Parse a bank from JSON, keeping only entries with exactly four string
    /// choices and an in-range answer index.
    pub fn from_json(data: &str) -> Self {
        let raw: Vec<RawEntry> = match serde_json::from_str(data) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("local question bank is not valid JSON: {e}");
                return Self::empty();
            }
        };

        let total = raw.len();
        let questions: Vec<Question> = raw
            .into_iter()
            .filter_map(|entry| {
                if entry.choices.len() != CHOICE_COUNT || entry.answer < 0 {
                    tracing::debug!("dropping malformed local question entry");
                    return None;
                }
                let choices: [String; CHOICE_COUNT] = entry.choices.try_into().ok()?;
                Question::new(entry.question, choices, entry.answer as usize)
            })
            .collect();

        if questions.len() < total {
            tracing::debug!(
                "local bank kept {} of {} entries",
                questions.len(),
                total
            );
        }
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Draw up to `amount` distinct questions at random.
    pub fn sample(&self, amount: usize) -> Vec<Question> {
        self.questions
            .choose_multiple(&mut rand::rng(), amount.min(self.questions.len()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl QuestionProvider for LocalBank {
    async fn fetch_batch(
        &self,
        amount: usize,
        _category: Option<u32>,
    ) -> ProviderResult<Vec<Question>> {
        Ok(self.sample(amount))
    }

    fn label(&self) -> &str {
        "Local"
    }
}
