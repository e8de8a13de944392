//! The trivia round state machine.
//!
//! One [`TriviaEngine`] owns one session: IDLE → AWAITING_BATCH →
//! QUESTION_OPEN → REVEALING → (QUESTION_OPEN | SET_COMPLETE) →
//! (AWAITING_BATCH | FINISHED), with any state reachable to FINISHED
//! through a majority end-vote or question exhaustion. All mutation happens
//! behind one lock, write-held for the duration of each event, so player
//! events apply in arrival order and the first accepted answer per player
//! per question is final.
//!
//! Windows close on the round clock or an end-vote majority only; a
//! question never auto-closes when all known participants have answered,
//! because the participant set is open-ended.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::clock::RoundClock;
use super::scoring;
use crate::config::{self, EngineConfig};
use crate::provider::{Category, LocalBank, QuestionProvider};
use crate::sink::{NotificationSink, QuestionView, RevealView};
use crate::types::{
    FinishReason, Phase, PlayerId, Question, RejectReason, ScoreEntry, SessionId, CHOICE_COUNT,
};

/// Errors surfaced to the host's lifecycle calls. Player-input problems are
/// not errors; they go to the sink as rejections.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a session is already running")]
    SessionActive,

    #[error("no questions available from any source")]
    NoQuestions,
}

struct SessionState {
    session_id: SessionId,
    phase: Phase,
    category_id: Option<u32>,
    category_name: Option<String>,
    /// Original set size; continuation and drain refetches reuse it.
    round_size: usize,
    target_count: usize,
    /// Questions consumed so far; equals the 1-based number of the current
    /// question while one is active.
    current_index: usize,
    bank: Vec<Question>,
    current: Option<Question>,
    window_open: bool,
    answers: HashMap<PlayerId, (usize, Instant)>,
    /// Insertion-ordered so score ties resolve to whoever scored first.
    scores: Vec<ScoreEntry>,
    participants: HashSet<PlayerId>,
    end_votes: HashSet<PlayerId>,
    opened_at: Instant,
    duration: Duration,
    /// Bumped on every question open and on finish; stale clock callbacks
    /// check it and back out.
    epoch: u64,
    clock: RoundClock,
    last_activity: Instant,
}

impl SessionState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            session_id: ulid::Ulid::new().to_string(),
            phase: Phase::Idle,
            category_id: None,
            category_name: None,
            round_size: 0,
            target_count: 0,
            current_index: 0,
            bank: Vec::new(),
            current: None,
            window_open: false,
            answers: HashMap::new(),
            scores: Vec::new(),
            participants: HashSet::new(),
            end_votes: HashSet::new(),
            opened_at: now,
            duration: Duration::from_secs(config::MIN_SECONDS),
            epoch: 0,
            clock: RoundClock::default(),
            last_activity: now,
        }
    }
}

/// Handle to one running trivia session. Cheap to clone; all clones share
/// the same state.
#[derive(Clone)]
pub struct TriviaEngine {
    inner: Arc<RwLock<SessionState>>,
    provider: Arc<dyn QuestionProvider>,
    fallback: Arc<LocalBank>,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

enum VoteOutcome {
    Finish,
    Ack(usize),
    Reject(RejectReason),
}

impl TriviaEngine {
    pub fn new(
        provider: Arc<dyn QuestionProvider>,
        fallback: Arc<LocalBank>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState::new())),
            provider,
            fallback,
            sink,
            config,
        }
    }

    /// Start the session: fetch the initial batch and open the first
    /// question. Falls back to the local bank when the remote source comes
    /// up empty; when both are empty the session reports the failure and
    /// stays IDLE.
    pub async fn start_session(
        &self,
        questions: usize,
        seconds: u64,
        category: Option<Category>,
    ) -> Result<(), EngineError> {
        let (target, category_id) = {
            let mut s = self.inner.write().await;
            if s.phase != Phase::Idle {
                return Err(EngineError::SessionActive);
            }
            let target = config::clamp_questions(questions);
            s.phase = Phase::AwaitingBatch;
            s.target_count = target;
            s.round_size = target;
            s.duration = Duration::from_secs(config::clamp_seconds(seconds));
            s.category_id = category.as_ref().map(|c| c.id);
            s.category_name = category.map(|c| c.name);
            s.last_activity = Instant::now();
            (target, s.category_id)
        };

        tracing::info!(questions = target, "starting trivia session");
        let remote = match self.provider.fetch_batch(target, category_id).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("initial question fetch failed: {e}");
                Vec::new()
            }
        };

        let bank = if remote.is_empty() {
            let sampled = self.fallback.sample(target);
            if sampled.is_empty() {
                self.inner.write().await.phase = Phase::Idle;
                self.sink
                    .finished(FinishReason::NoQuestionsAvailable, Vec::new())
                    .await;
                return Err(EngineError::NoQuestions);
            }
            tracing::info!(
                "remote source empty, sampled {} questions from the local bank",
                sampled.len()
            );
            let mut s = self.inner.write().await;
            s.target_count = sampled.len();
            if s.category_name.is_none() {
                s.category_name = Some(self.fallback.label().to_string());
            }
            drop(s);
            sampled
        } else {
            remote
        };

        self.inner.write().await.bank = bank;
        self.open_next_question().await;
        Ok(())
    }

    /// Record a player's answer for the open question. First answer wins;
    /// anything else comes back as a rejection to that player alone.
    pub async fn submit_answer(&self, player: &PlayerId, choice: usize) {
        let verdict = {
            let mut s = self.inner.write().await;
            s.last_activity = Instant::now();
            if s.current.is_none() {
                Err(RejectReason::NoActiveQuestion)
            } else if !s.window_open {
                Err(RejectReason::WindowClosed)
            } else if choice >= CHOICE_COUNT {
                Err(RejectReason::InvalidChoice)
            } else {
                s.participants.insert(player.clone());
                if s.answers.contains_key(player) {
                    Err(RejectReason::AlreadyAnswered)
                } else {
                    s.answers.insert(player.clone(), (choice, Instant::now()));
                    Ok(())
                }
            }
        };

        match verdict {
            Ok(()) => self.sink.answer_received(player, choice).await,
            Err(reason) => self.sink.rejected(player, reason).await,
        }
    }

    /// Register a vote to end the session early. The majority threshold is
    /// recomputed on every vote, so it can rise as new participants appear.
    /// Votes stay live through the transient fetch phase, so a majority can
    /// still end the session while a continuation batch is in flight.
    pub async fn vote_end(&self, player: &PlayerId) {
        let outcome = {
            let mut s = self.inner.write().await;
            s.last_activity = Instant::now();
            if matches!(s.phase, Phase::Idle | Phase::Finished) {
                VoteOutcome::Reject(RejectReason::NoActiveSession)
            } else if s.end_votes.contains(player) {
                VoteOutcome::Reject(RejectReason::AlreadyVoted)
            } else {
                s.participants.insert(player.clone());
                s.end_votes.insert(player.clone());
                let threshold = s.participants.len().div_ceil(2).max(1);
                if s.end_votes.len() >= threshold {
                    VoteOutcome::Finish
                } else {
                    VoteOutcome::Ack(threshold - s.end_votes.len())
                }
            }
        };

        match outcome {
            VoteOutcome::Finish => self.finish(FinishReason::MajorityVote).await,
            VoteOutcome::Ack(needed) => self.sink.end_vote_registered(player, needed).await,
            VoteOutcome::Reject(reason) => self.sink.rejected(player, reason).await,
        }
    }

    /// Extend a completed set with freshly fetched questions. Only valid
    /// while the session sits at SET_COMPLETE.
    pub async fn request_continue(&self, player: &PlayerId, additional: Option<usize>) {
        let request = {
            let mut s = self.inner.write().await;
            s.last_activity = Instant::now();
            if s.phase != Phase::SetComplete {
                None
            } else {
                s.phase = Phase::AwaitingBatch;
                let amount = additional
                    .unwrap_or(s.round_size)
                    .clamp(1, self.provider.max_batch());
                Some((amount, s.category_id))
            }
        };

        let Some((amount, category_id)) = request else {
            self.sink
                .rejected(player, RejectReason::NotAwaitingContinue)
                .await;
            return;
        };

        let fetched = match self.provider.fetch_batch(amount, category_id).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("continuation fetch failed: {e}");
                Vec::new()
            }
        };

        let (added, new_total) = {
            let mut s = self.inner.write().await;
            if s.phase == Phase::Finished {
                return;
            }
            let added = fetched.len();
            s.bank.extend(fetched);
            s.target_count += added;
            s.end_votes.clear();
            (added, s.target_count)
        };

        tracing::info!(added, new_total, "set continued");
        self.sink.set_continued(added, new_total).await;
        self.open_next_question().await;
    }

    /// Terminate the session: cancel any pending clock, publish final
    /// standings. Idempotent.
    pub async fn finish(&self, reason: FinishReason) {
        let board = {
            let mut s = self.inner.write().await;
            if s.phase == Phase::Finished {
                return;
            }
            s.clock.cancel();
            s.phase = Phase::Finished;
            s.window_open = false;
            s.current = None;
            s.epoch += 1;
            scoring::top_scores(&s.scores, usize::MAX)
        };

        tracing::info!(?reason, "session finished");
        self.sink.finished(reason, board).await;
    }

    /// Advance to the next question, completing the set or refetching when
    /// the bank has drained ahead of the target.
    async fn open_next_question(&self) {
        loop {
            enum Next {
                SetComplete(Vec<ScoreEntry>),
                NeedFetch(usize, Option<u32>),
                Open,
            }

            let next = {
                let mut s = self.inner.write().await;
                if s.phase == Phase::Finished {
                    return;
                }
                if s.current_index >= s.target_count {
                    s.phase = Phase::SetComplete;
                    s.window_open = false;
                    s.current = None;
                    Next::SetComplete(scoring::top_scores(&s.scores, usize::MAX))
                } else if s.current_index >= s.bank.len() {
                    s.phase = Phase::AwaitingBatch;
                    Next::NeedFetch(s.round_size.max(1), s.category_id)
                } else {
                    Next::Open
                }
            };

            match next {
                Next::SetComplete(board) => {
                    tracing::info!("set complete, awaiting continue or end");
                    self.sink.set_complete(board).await;
                    return;
                }
                Next::NeedFetch(amount, category_id) => {
                    let fetched = match self.provider.fetch_batch(amount, category_id).await {
                        Ok(batch) => batch,
                        Err(e) => {
                            tracing::warn!("refetch failed: {e}");
                            Vec::new()
                        }
                    };
                    let still_short = {
                        let mut s = self.inner.write().await;
                        if s.phase == Phase::Finished {
                            return;
                        }
                        s.bank.extend(fetched);
                        s.current_index >= s.bank.len()
                    };
                    if still_short {
                        self.finish(FinishReason::QuestionsExhausted).await;
                        return;
                    }
                    // Bank now covers the index, loop around to open.
                }
                Next::Open => {
                    self.open_question_now().await;
                    return;
                }
            }
        }
    }

    async fn open_question_now(&self) {
        let (view, epoch) = {
            let mut s = self.inner.write().await;
            if s.phase == Phase::Finished {
                return;
            }
            let question = match s.bank.get(s.current_index).cloned() {
                Some(q) => q,
                None => return,
            };
            s.current_index += 1;
            s.epoch += 1;
            s.current = Some(question.clone());
            s.answers.clear();
            s.end_votes.clear();
            s.window_open = true;
            s.opened_at = Instant::now();
            s.last_activity = s.opened_at;
            s.phase = Phase::QuestionOpen;

            let view = QuestionView {
                text: question.text().to_string(),
                choices: question.choices().clone(),
                number: s.current_index,
                total: s.target_count,
                seconds: s.duration.as_secs(),
                category: s.category_name.clone(),
                scoreboard: scoring::top_scores(&s.scores, self.config.open_board_size),
            };
            (view, s.epoch)
        };

        tracing::debug!(number = view.number, total = view.total, "question opened");
        self.sink.question_opened(view).await;

        let mut s = self.inner.write().await;
        // An end-vote may have finished the session while the sink ran.
        if s.phase == Phase::QuestionOpen && s.epoch == epoch {
            let engine = self.clone();
            let duration = s.duration;
            s.clock.arm(duration, move || async move {
                engine.clock_fired(epoch).await;
            });
        }
    }

    /// The round clock elapsed: close the window, score the answer snapshot,
    /// reveal, and advance after the configured delay. Boxed because the
    /// advance re-enters `open_next_question`, which arms a clock that calls
    /// back here.
    fn clock_fired(&self, epoch: u64) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let view = {
                let mut s = self.inner.write().await;
                if s.epoch != epoch || s.phase != Phase::QuestionOpen {
                    return;
                }
                // The countdown has served its purpose; drop the handle so a
                // later cancel cannot abort this reveal chain mid-flight.
                s.clock.disarm();
                s.window_open = false;
                s.phase = Phase::Revealing;

                let question = match s.current.clone() {
                    Some(q) => q,
                    None => return,
                };

                let counts = scoring::histogram(&s.answers);
                let correct = scoring::fastest_correct(&s.answers, question.correct_index());
                let opened_at = s.opened_at;
                let duration = s.duration;
                for (player, answered_at) in &correct {
                    let elapsed = answered_at.duration_since(opened_at);
                    scoring::add_points(
                        &mut s.scores,
                        player,
                        scoring::speed_points(duration, elapsed),
                    );
                }

                RevealView {
                    text: question.text().to_string(),
                    choices: question.choices().clone(),
                    number: s.current_index,
                    total: s.target_count,
                    counts,
                    correct_index: question.correct_index(),
                    fastest_correct: correct.into_iter().map(|(player, _)| player).collect(),
                    scoreboard: scoring::top_scores(&s.scores, self.config.reveal_board_size),
                }
            };

            tracing::debug!(number = view.number, "window closed, revealing");
            self.sink.reveal(view).await;
            tokio::time::sleep(self.config.reveal_delay).await;

            {
                let s = self.inner.read().await;
                if s.epoch != epoch || s.phase != Phase::Revealing {
                    return;
                }
            }
            self.open_next_question().await;
        })
    }

    pub async fn session_id(&self) -> SessionId {
        self.inner.read().await.session_id.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.read().await.phase
    }

    pub async fn is_finished(&self) -> bool {
        self.inner.read().await.phase == Phase::Finished
    }

    /// Full standings, descending by points, ties in first-reached order.
    pub async fn scoreboard(&self) -> Vec<ScoreEntry> {
        scoring::top_scores(&self.inner.read().await.scores, usize::MAX)
    }

    /// Time since the last player interaction or question open.
    pub async fn idle_for(&self) -> Duration {
        self.inner.read().await.last_activity.elapsed()
    }
}
