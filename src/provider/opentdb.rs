//! Open Trivia DB client.
//!
//! Questions travel base64-encoded to sidestep HTML-entity escaping in the
//! API. Each payload item carries one correct and three incorrect answers;
//! we decode, shuffle the four together, and remember where the correct one
//! landed. Session tokens keep the API from repeating questions within a
//! session; when a token runs dry (response code 4) the fetch resets it and
//! retries exactly once.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use super::{ProviderError, ProviderResult, QuestionProvider};
use crate::config::ProviderConfig;
use crate::types::Question;

/// Most questions the API hands out per request.
pub const OTDB_AMOUNT_MAX: usize = 50;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    response_code: u8,
    #[serde(default)]
    results: Vec<WireQuestion>,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    question: String,
    correct_answer: String,
    #[serde(default)]
    incorrect_answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    response_code: u8,
    #[serde(default)]
    token: Option<String>,
}

/// A question category as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CategoryResponse {
    #[serde(default)]
    trivia_categories: Vec<Category>,
}

pub struct OpenTdbProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    token: Mutex<Option<String>>,
    categories: RwLock<Vec<Category>>,
}

impl OpenTdbProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
            categories: RwLock::new(Vec::new()),
        }
    }

    /// Request a fresh session token. Returns `None` when the API is
    /// unreachable or refuses; tokens are an optimization, not a requirement.
    pub async fn request_token(&self) -> Option<String> {
        let url = format!("{}/api_token.php", self.config.base_url);
        let result = tokio::time::timeout(self.config.fetch_timeout, async {
            self.client
                .get(&url)
                .query(&[("command", "request")])
                .send()
                .await?
                .json::<TokenResponse>()
                .await
        })
        .await;

        match result {
            Ok(Ok(resp)) if resp.response_code == 0 => resp.token,
            Ok(Ok(resp)) => {
                tracing::warn!("token request refused with code {}", resp.response_code);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("token request failed: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("token request timed out");
                None
            }
        }
    }

    /// Reset a session token so exhausted questions become available again.
    pub async fn reset_token(&self, token: &str) -> bool {
        let url = format!("{}/api_token.php", self.config.base_url);
        let result = tokio::time::timeout(self.config.fetch_timeout, async {
            self.client
                .get(&url)
                .query(&[("command", "reset"), ("token", token)])
                .send()
                .await?
                .json::<TokenResponse>()
                .await
        })
        .await;

        matches!(result, Ok(Ok(resp)) if resp.response_code == 0)
    }

    /// Fetch the category catalog once so names can be resolved locally.
    pub async fn load_categories(&self) -> ProviderResult<usize> {
        let url = format!("{}/api_category.php", self.config.base_url);
        let resp = tokio::time::timeout(self.config.fetch_timeout, async {
            self.client
                .get(&url)
                .send()
                .await?
                .json::<CategoryResponse>()
                .await
        })
        .await
        .map_err(|_| ProviderError::Timeout(self.config.fetch_timeout))??;

        let count = resp.trivia_categories.len();
        *self.categories.write().await = resp.trivia_categories;
        tracing::debug!("loaded {count} trivia categories");
        Ok(count)
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.categories.read().await.clone()
    }

    /// Resolve a user-supplied category name or numeric id. Blank input and
    /// the various "anything" spellings mean no filter.
    pub async fn resolve_category(&self, input: &str) -> Option<Category> {
        let needle = input.trim();
        if needle.is_empty() {
            return None;
        }
        let lowered = needle.to_lowercase();
        if matches!(lowered.as_str(), "any" | "any category" | "all" | "random") {
            return None;
        }

        let catalog = self.categories.read().await;
        if let Some(cat) = catalog.iter().find(|c| c.name.to_lowercase() == lowered) {
            return Some(cat.clone());
        }
        let id: u32 = needle.parse().ok()?;
        match catalog.iter().find(|c| c.id == id) {
            Some(cat) => Some(cat.clone()),
            None => Some(Category {
                id,
                name: format!("Category {id}"),
            }),
        }
    }

    async fn fetch_once(
        &self,
        amount: usize,
        category: Option<u32>,
    ) -> ProviderResult<Vec<Question>> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = self.request_token().await;
        }
        let token = guard.clone();
        drop(guard);

        let mut params: Vec<(&str, String)> = vec![
            ("amount", amount.to_string()),
            ("type", "multiple".to_string()),
            ("encode", "base64".to_string()),
        ];
        if let Some(token) = &token {
            params.push(("token", token.clone()));
        }
        if let Some(category) = category {
            params.push(("category", category.to_string()));
        }

        let url = format!("{}/api.php", self.config.base_url);
        let resp = tokio::time::timeout(self.config.fetch_timeout, async {
            self.client
                .get(&url)
                .query(&params)
                .send()
                .await?
                .json::<ApiResponse>()
                .await
        })
        .await
        .map_err(|_| ProviderError::Timeout(self.config.fetch_timeout))??;

        check_code(resp.response_code)?;
        Ok(resp
            .results
            .into_iter()
            .filter_map(assemble_question)
            .collect())
    }
}

#[async_trait]
impl QuestionProvider for OpenTdbProvider {
    async fn fetch_batch(
        &self,
        amount: usize,
        category: Option<u32>,
    ) -> ProviderResult<Vec<Question>> {
        let amount = amount.clamp(1, OTDB_AMOUNT_MAX);
        match self.fetch_once(amount, category).await {
            Err(ProviderError::TokenExhausted) => {
                // The token has served every question matching this filter.
                // One reset-and-retry, then give up.
                let token = self.token.lock().await.clone();
                match token {
                    Some(token) if self.reset_token(&token).await => {
                        tracing::info!("session token exhausted, reset and retrying fetch");
                        self.fetch_once(amount, category).await
                    }
                    _ => Err(ProviderError::TokenExhausted),
                }
            }
            other => other,
        }
    }

    fn label(&self) -> &str {
        "Open Trivia DB"
    }
}

fn check_code(code: u8) -> Result<(), ProviderError> {
    match code {
        0 => Ok(()),
        1 => Err(ProviderError::NoResults),
        2 => Err(ProviderError::InvalidParameter),
        3 => Err(ProviderError::TokenNotFound),
        4 => Err(ProviderError::TokenExhausted),
        5 => Err(ProviderError::RateLimited),
        n => Err(ProviderError::UnknownCode(n)),
    }
}

/// Decode a base64 payload field, keeping the raw string when it turns out
/// not to be valid base64 (some mirrors skip the encoding).
fn decode_field(field: &str) -> String {
    BASE64
        .decode(field)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| field.to_string())
}

/// Turn one wire item into a [`Question`]: decode, shuffle the four answers
/// together, record where the correct one ended up. Items without exactly
/// three incorrect answers are dropped.
fn assemble_question(wire: WireQuestion) -> Option<Question> {
    if wire.incorrect_answers.len() != 3 {
        tracing::debug!("dropping malformed question payload");
        return None;
    }

    let mut pool: Vec<(String, bool)> = wire
        .incorrect_answers
        .iter()
        .map(|s| (decode_field(s), false))
        .collect();
    pool.push((decode_field(&wire.correct_answer), true));
    pool.shuffle(&mut rand::rng());

    let correct_index = pool.iter().position(|(_, correct)| *correct)?;
    let choices: Vec<String> = pool.into_iter().map(|(text, _)| text).collect();
    let choices: [String; 4] = choices.try_into().ok()?;

    Question::new(decode_field(&wire.question), choices, correct_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        BASE64.encode(s)
    }

    #[test]
    fn decode_field_round_trips() {
        let original = "Who composed the Brandenburg Concertos?";
        assert_eq!(decode_field(&encode(original)), original);
    }

    #[test]
    fn decode_field_passes_through_plain_text() {
        // Not valid base64, should come back untouched.
        assert_eq!(decode_field("plain text?!"), "plain text?!");
    }

    #[test]
    fn assemble_keeps_correct_index_valid() {
        for _ in 0..20 {
            let wire = WireQuestion {
                question: encode("2 + 2 = ?"),
                correct_answer: encode("4"),
                incorrect_answers: vec![encode("3"), encode("5"), encode("22")],
            };
            let q = assemble_question(wire).expect("valid item");
            assert_eq!(q.text(), "2 + 2 = ?");
            assert_eq!(q.choices()[q.correct_index()], "4");
        }
    }

    #[test]
    fn assemble_drops_wrong_incorrect_count() {
        let wire = WireQuestion {
            question: encode("q"),
            correct_answer: encode("a"),
            incorrect_answers: vec![encode("b"), encode("c")],
        };
        assert!(assemble_question(wire).is_none());
    }

    #[test]
    fn response_code_mapping() {
        assert!(check_code(0).is_ok());
        assert!(matches!(check_code(1), Err(ProviderError::NoResults)));
        assert!(matches!(check_code(2), Err(ProviderError::InvalidParameter)));
        assert!(matches!(check_code(3), Err(ProviderError::TokenNotFound)));
        assert!(matches!(check_code(4), Err(ProviderError::TokenExhausted)));
        assert!(matches!(check_code(5), Err(ProviderError::RateLimited)));
        assert!(matches!(check_code(9), Err(ProviderError::UnknownCode(9))));
    }

    #[tokio::test]
    async fn resolve_category_spellings() {
        let provider = OpenTdbProvider::new(ProviderConfig::default());
        *provider.categories.write().await = vec![Category {
            id: 9,
            name: "General Knowledge".to_string(),
        }];

        assert!(provider.resolve_category("").await.is_none());
        assert!(provider.resolve_category("Any Category").await.is_none());
        assert!(provider.resolve_category("random").await.is_none());

        let by_name = provider.resolve_category("general knowledge").await.unwrap();
        assert_eq!(by_name.id, 9);

        let by_id = provider.resolve_category("9").await.unwrap();
        assert_eq!(by_id.name, "General Knowledge");

        let unknown = provider.resolve_category("23").await.unwrap();
        assert_eq!(unknown.name, "Category 23");

        assert!(provider.resolve_category("nonsense").await.is_none());
    }

    #[tokio::test]
    #[ignore] // Hits the live API, run manually.
    async fn live_fetch() {
        let provider = OpenTdbProvider::new(ProviderConfig::default());
        let questions = provider.fetch_batch(3, None).await.unwrap();
        assert!(!questions.is_empty());
        for q in &questions {
            assert!(q.correct_index() < 4);
        }
    }
}
