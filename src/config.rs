use std::time::Duration;

/// Bounds on how many questions one set may hold. The upper bound matches
/// the Open Trivia DB per-request cap.
pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 50;

/// Bounds on the per-question answer window.
pub const MIN_SECONDS: u64 = 5;
pub const MAX_SECONDS: u64 = 60;

/// Engine-side knobs: defaults for a session and display sizes for the
/// scoreboards pushed to the notification sink.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Questions per set when the host passes none.
    pub default_questions: usize,
    /// Answer window when the host passes none.
    pub default_seconds: u64,
    /// Pause between a reveal and the next question opening.
    pub reveal_delay: Duration,
    /// Scoreboard rows shown when a question opens.
    pub open_board_size: usize,
    /// Scoreboard rows shown on a reveal.
    pub reveal_board_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_questions: 10,
            default_seconds: 15,
            reveal_delay: Duration::from_secs(2),
            open_board_size: 5,
            reveal_board_size: 10,
        }
    }
}

/// Clamp a requested set size into the supported range.
pub fn clamp_questions(requested: usize) -> usize {
    requested.clamp(MIN_QUESTIONS, MAX_QUESTIONS)
}

/// Clamp a requested answer window into the supported range.
pub fn clamp_seconds(requested: u64) -> u64 {
    requested.clamp(MIN_SECONDS, MAX_SECONDS)
}

/// Configuration for the remote question provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the Open Trivia DB-compatible API.
    pub base_url: String,
    /// Timeout applied to every provider request.
    pub fetch_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opentdb.com".to_string(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or blank.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("QUIZCORE_OTDB_BASE_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.base_url);

        let fetch_timeout = std::env::var("QUIZCORE_FETCH_TIMEOUT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        Self {
            base_url,
            fetch_timeout,
        }
    }
}
