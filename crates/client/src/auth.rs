use catalog_admin_core::TokenPair;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub const DEFAULT_LOGIN_PATH: &str = "auth/login";
pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh";
pub const DEFAULT_SYSTEM_ROLE: &str = "admin";

const CLIENT_NAME: &str = "catalog-admin";

/// Client for the credential endpoints of the catalog backend.
///
/// These calls never carry a bearer token, so they go straight through
/// `reqwest` instead of the authenticated client.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
    login_path: String,
    refresh_path: String,
    system_role: String,
    context: DeviceContext,
}

impl AuthClient {
    pub fn new(base_url: Url, http: Client, context: DeviceContext) -> Self {
        Self {
            http,
            base_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
            context,
        }
    }

    pub fn with_paths(mut self, login_path: impl Into<String>, refresh_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self.refresh_path = refresh_path.into();
        self
    }

    pub fn with_system_role(mut self, system_role: impl Into<String>) -> Self {
        self.system_role = system_role.into();
        self
    }

    /// Exchanges user credentials for a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, AuthError> {
        let url = self.base_url.join(&self.login_path)?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                email,
                password,
                context: &self.context,
                system_role: &self.system_role,
            })
            .send()
            .await?;

        parse_grant(response).await
    }

    /// Exchanges the stored refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let url = self.base_url.join(&self.refresh_path)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh_token,
                context: &self.context,
                system_role: &self.system_role,
            })
            .send()
            .await?;

        parse_grant(response).await
    }
}

/// Device metadata the backend records with every issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceContext {
    pub device_id: String,
    pub platform: String,
    pub platform_version: String,
    pub browser_name: String,
    pub browser_system_name: String,
    pub browser_system_version: String,
    pub app_version: String,
}

impl DeviceContext {
    /// Describes the running process. There is no browser, so the browser fields name
    /// this client and its host OS. Versions that cannot be detected are left empty.
    pub fn detect(device_id: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            platform: std::env::consts::OS.to_string(),
            platform_version: String::new(),
            browser_name: CLIENT_NAME.to_string(),
            browser_system_name: std::env::consts::OS.to_string(),
            browser_system_version: String::new(),
            app_version: app_version.into(),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    context: &'a DeviceContext,
    system_role: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    context: &'a DeviceContext,
    system_role: &'a str,
}

/// Tokens issued by a login or refresh call. Both tokens are guaranteed non-empty.
#[derive(Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    pub audience: Vec<String>,
    pub profile: Option<Value>,
}

impl TokenGrant {
    pub fn into_token_pair(self, now: DateTime<Utc>) -> TokenPair {
        TokenPair {
            expires_at: self
                .expires_in
                .map(|seconds| now + Duration::seconds(seconds as i64)),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            id_token: self.id_token,
        }
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RawGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    audience: Vec<String>,
    #[serde(default)]
    profile: Option<Value>,
}

impl RawGrant {
    fn validate(self) -> Result<TokenGrant, AuthError> {
        match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token))
                if !access_token.is_empty() && !refresh_token.is_empty() =>
            {
                Ok(TokenGrant {
                    access_token,
                    refresh_token,
                    id_token: self.id_token,
                    expires_in: self.expires_in,
                    audience: self.audience,
                    profile: self.profile,
                })
            }
            _ => Err(AuthError::MissingTokens),
        }
    }
}

/// Errors raised by the credential endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode token response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token response is missing the access or refresh token")]
    MissingTokens,
}

impl AuthError {
    /// Upstream status code, when the failure came from an HTTP response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}

/// Accepts both `{ "data": { ...tokens } }` and the unwrapped token object.
async fn parse_grant(response: Response) -> Result<TokenGrant, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(AuthError::Status { status, body });
    }

    let body: Value = response.json().await?;
    let grant = body
        .get("data")
        .filter(|data| data.get("access_token").is_some())
        .unwrap_or(&body);
    let raw: RawGrant = serde_json::from_value(grant.clone())?;
    raw.validate()
}
