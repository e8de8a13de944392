//! Host-side session bookkeeping.
//!
//! One engine per context id (a channel, a room), held in an explicit map
//! rather than anything global. The host inserts an engine when a player
//! starts a game and looks it up to route player input; a background
//! sweeper reaps finished sessions and force-finishes sessions nobody has
//! touched for the idle TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::engine::TriviaEngine;
use crate::types::{ContextId, FinishReason};

/// How long a session may sit untouched before the sweeper ends it. A
/// host-level bound; the engine itself imposes no overall lifetime.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// How often the sweeper wakes up.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a session is already running in this context")]
    SessionActive,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ContextId, TriviaEngine>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine for a context. Refused while the context's
    /// current session is still live; a finished one is replaced.
    pub async fn insert(
        &self,
        context: ContextId,
        engine: TriviaEngine,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&context) {
            if !existing.is_finished().await {
                return Err(RegistryError::SessionActive);
            }
        }
        tracing::debug!(%context, "session registered");
        sessions.insert(context, engine);
        Ok(())
    }

    pub async fn get(&self, context: &ContextId) -> Option<TriviaEngine> {
        self.sessions.read().await.get(context).cloned()
    }

    pub async fn remove(&self, context: &ContextId) -> Option<TriviaEngine> {
        self.sessions.write().await.remove(context)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// One sweep: drop finished sessions, end sessions idle past the TTL.
    /// The ended sessions stay registered until the next sweep so their
    /// final notification has gone out before removal.
    pub async fn sweep(&self, idle_timeout: Duration) {
        let snapshot: Vec<(ContextId, TriviaEngine)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(ctx, engine)| (ctx.clone(), engine.clone()))
            .collect();

        for (context, engine) in snapshot {
            if engine.is_finished().await {
                tracing::debug!(%context, "reaping finished session");
                self.remove(&context).await;
            } else if engine.idle_for().await >= idle_timeout {
                tracing::info!(%context, "ending idle session");
                engine.finish(FinishReason::IdleTimeout).await;
            }
        }
    }
}

/// Spawn a background task that periodically sweeps the registry.
pub fn spawn_idle_sweeper(registry: Arc<SessionRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            registry.sweep(SESSION_IDLE_TIMEOUT).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::provider::LocalBank;
    use crate::sink::{NotificationSink, QuestionView, RevealView};
    use crate::types::{PlayerId, RejectReason, ScoreEntry};
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl NotificationSink for NullSink {
        async fn question_opened(&self, _view: QuestionView) {}
        async fn reveal(&self, _view: RevealView) {}
        async fn set_complete(&self, _scoreboard: Vec<ScoreEntry>) {}
        async fn finished(&self, _reason: FinishReason, _scoreboard: Vec<ScoreEntry>) {}
        async fn rejected(&self, _player: &PlayerId, _reason: RejectReason) {}
        async fn answer_received(&self, _player: &PlayerId, _choice: usize) {}
        async fn end_vote_registered(&self, _player: &PlayerId, _votes_still_needed: usize) {}
        async fn set_continued(&self, _added: usize, _new_total: usize) {}
    }

    const BANK: &str = r#"[
        {"question": "q1", "choices": ["a", "b", "c", "d"], "answer": 0},
        {"question": "q2", "choices": ["a", "b", "c", "d"], "answer": 1}
    ]"#;

    fn engine() -> TriviaEngine {
        let bank = Arc::new(LocalBank::from_json(BANK));
        TriviaEngine::new(
            bank.clone(),
            bank,
            Arc::new(NullSink),
            EngineConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn one_live_session_per_context() {
        let registry = SessionRegistry::new();
        let context = "channel-1".to_string();

        let first = engine();
        first.start_session(2, 10, None).await.unwrap();
        registry.insert(context.clone(), first.clone()).await.unwrap();

        // Second session refused while the first is live.
        let second = engine();
        assert!(matches!(
            registry.insert(context.clone(), second.clone()).await,
            Err(RegistryError::SessionActive)
        ));

        // After the first finishes it can be replaced.
        first.finish(FinishReason::MajorityVote).await;
        registry.insert(context.clone(), second).await.unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reaps_finished_and_ends_idle_sessions() {
        let registry = SessionRegistry::new();

        let done = engine();
        done.start_session(2, 10, None).await.unwrap();
        done.finish(FinishReason::MajorityVote).await;
        registry.insert("done".to_string(), done).await.unwrap();

        let idle = engine();
        idle.start_session(2, 10, None).await.unwrap();
        registry.insert("idle".to_string(), idle.clone()).await.unwrap();

        registry.sweep(SESSION_IDLE_TIMEOUT).await;
        assert!(registry.get(&"done".to_string()).await.is_none());
        // The idle session has seen recent activity and survives.
        assert!(registry.get(&"idle".to_string()).await.is_some());
        assert!(!idle.is_finished().await);

        // The session runs its questions unattended and then sits idle;
        // well past the TTL the sweeper ends it.
        tokio::time::sleep(SESSION_IDLE_TIMEOUT + Duration::from_secs(120)).await;
        registry.sweep(SESSION_IDLE_TIMEOUT).await;
        assert!(idle.is_finished().await);

        // Gone on the sweep after its finish notification went out.
        registry.sweep(SESSION_IDLE_TIMEOUT).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs() {
        let registry = Arc::new(SessionRegistry::new());
        let done = engine();
        done.start_session(2, 10, None).await.unwrap();
        done.finish(FinishReason::MajorityVote).await;
        registry.insert("ctx".to_string(), done).await.unwrap();

        let handle = spawn_idle_sweeper(registry.clone());
        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(registry.is_empty().await);
        handle.abort();
    }
}
