use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type ContextId = String;
pub type SessionId = String;

/// Every question carries exactly this many choices.
pub const CHOICE_COUNT: usize = 4;

/// A single multiple-choice question. Immutable once built; construction
/// validates that the correct index points at one of the four choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    choices: [String; CHOICE_COUNT],
    correct_index: usize,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        choices: [String; CHOICE_COUNT],
        correct_index: usize,
    ) -> Option<Self> {
        if correct_index >= CHOICE_COUNT {
            return None;
        }
        Some(Self {
            text: text.into(),
            choices,
            correct_index,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn choices(&self) -> &[String; CHOICE_COUNT] {
        &self.choices
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }
}

/// Session lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    AwaitingBatch,
    QuestionOpen,
    Revealing,
    SetComplete,
    Finished,
}

/// One row of the leaderboard. The engine keeps these in the order players
/// first scored, so a stable sort by points preserves first-reached ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player: PlayerId,
    pub points: u32,
}

/// Why a player-input event was not accepted. Rejections are delivered to
/// the originating player only and never disturb the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoActiveQuestion,
    WindowClosed,
    InvalidChoice,
    AlreadyAnswered,
    AlreadyVoted,
    NoActiveSession,
    NotAwaitingContinue,
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    MajorityVote,
    QuestionsExhausted,
    NoQuestionsAvailable,
    IdleTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four(prefix: &str) -> [String; CHOICE_COUNT] {
        [
            format!("{prefix} a"),
            format!("{prefix} b"),
            format!("{prefix} c"),
            format!("{prefix} d"),
        ]
    }

    #[test]
    fn question_rejects_out_of_range_answer() {
        assert!(Question::new("q", four("x"), 4).is_none());
        assert!(Question::new("q", four("x"), 3).is_some());
    }

    #[test]
    fn question_accessors() {
        let q = Question::new("capital of France?", four("city"), 2).unwrap();
        assert_eq!(q.text(), "capital of France?");
        assert_eq!(q.choices()[2], "city c");
        assert_eq!(q.correct_index(), 2);
    }
}
