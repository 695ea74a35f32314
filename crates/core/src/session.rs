use std::convert::Infallible;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials persisted between requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            id_token: None,
            expires_at: None,
        }
    }
}

// Tokens stay out of logs and panic messages.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persistence seam for the session credentials used by the HTTP client.
pub trait TokenStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> impl Future<Output = Result<Option<TokenPair>, Self::Error>> + Send;

    fn save(&self, tokens: &TokenPair) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Process-local store, used by tests and embedders without a database.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    /// Returns the stored pair without going through the async interface.
    pub fn snapshot(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace(&self, tokens: Option<TokenPair>) {
        *self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = tokens;
    }
}

impl TokenStore for MemoryTokenStore {
    type Error = Infallible;

    async fn load(&self) -> Result<Option<TokenPair>, Infallible> {
        Ok(self.snapshot())
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), Infallible> {
        self.replace(Some(tokens.clone()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), Infallible> {
        self.replace(None);
        Ok(())
    }
}
