//! The engine's display seam.
//!
//! The engine pushes typed state snapshots at well-defined transition
//! points and never reasons about rendering. Every call is fire-and-forget
//! from the engine's perspective; sinks must not call back into the engine.

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{FinishReason, PlayerId, RejectReason, ScoreEntry, CHOICE_COUNT};

/// Snapshot pushed when a question opens.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub text: String,
    pub choices: [String; CHOICE_COUNT],
    /// 1-based position within the set.
    pub number: usize,
    pub total: usize,
    pub seconds: u64,
    pub category: Option<String>,
    /// Leading scores only (top five).
    pub scoreboard: Vec<ScoreEntry>,
}

/// Snapshot pushed when a question's answer window closes.
#[derive(Debug, Clone, Serialize)]
pub struct RevealView {
    pub text: String,
    pub choices: [String; CHOICE_COUNT],
    pub number: usize,
    pub total: usize,
    /// Answers received per choice.
    pub counts: [u32; CHOICE_COUNT],
    pub correct_index: usize,
    /// Players who answered correctly, fastest first.
    pub fastest_correct: Vec<PlayerId>,
    /// Leading scores after this question (top ten).
    pub scoreboard: Vec<ScoreEntry>,
}

impl RevealView {
    /// Per-choice share of all received answers, as rounded percentages.
    pub fn percentages(&self) -> [u32; CHOICE_COUNT] {
        let total: u32 = self.counts.iter().sum();
        let total = total.max(1) as f64;
        let mut out = [0u32; CHOICE_COUNT];
        for (slot, count) in out.iter_mut().zip(self.counts) {
            *slot = (100.0 * count as f64 / total).round() as u32;
        }
        out
    }
}

/// Receives session state transitions for display.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A new question opened and its answer window is running.
    async fn question_opened(&self, view: QuestionView);

    /// The window closed; scores are final for this question.
    async fn reveal(&self, view: RevealView);

    /// The set's target was reached; the session awaits continue or end.
    async fn set_complete(&self, scoreboard: Vec<ScoreEntry>);

    /// Terminal state with final standings.
    async fn finished(&self, reason: FinishReason, scoreboard: Vec<ScoreEntry>);

    /// A player's input was not accepted; visible to that player only.
    async fn rejected(&self, player: &PlayerId, reason: RejectReason);

    /// A player's answer was recorded (correctness not revealed).
    async fn answer_received(&self, player: &PlayerId, choice: usize);

    /// A player's end vote was counted but the majority is not yet reached.
    async fn end_vote_registered(&self, player: &PlayerId, votes_still_needed: usize);

    /// A continuation fetched more questions into the running set.
    async fn set_continued(&self, added: usize, new_total: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reveal_with_counts(counts: [u32; 4]) -> RevealView {
        RevealView {
            text: "q".to_string(),
            choices: ["a".into(), "b".into(), "c".into(), "d".into()],
            number: 1,
            total: 3,
            counts,
            correct_index: 0,
            fastest_correct: vec![],
            scoreboard: vec![],
        }
    }

    #[test]
    fn percentages_round_per_bucket() {
        let view = reveal_with_counts([1, 1, 1, 0]);
        assert_eq!(view.percentages(), [33, 33, 33, 0]);

        let view = reveal_with_counts([3, 1, 0, 0]);
        assert_eq!(view.percentages(), [75, 25, 0, 0]);
    }

    #[test]
    fn percentages_handle_no_answers() {
        let view = reveal_with_counts([0, 0, 0, 0]);
        assert_eq!(view.percentages(), [0, 0, 0, 0]);
    }
}
