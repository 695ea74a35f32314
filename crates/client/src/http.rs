use std::sync::Arc;

use catalog_admin_core::{TokenPair, TokenStore};
use chrono::Utc;
use metrics::counter;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AuthClient, AuthError, TokenGrant};
use crate::coordinator::{RefreshCoordinator, RefreshFailure, RefreshLease, RefreshTicket};
use crate::events::{LogoutReason, SessionEvent, SessionEvents};

/// Description of one call against the catalog API, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Errors produced by [`AuthenticatedClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Refresh(#[from] RefreshFailure),
    #[error("session expired")]
    SessionExpired,
    #[error("token store error: {0}")]
    TokenStore(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TokenStore(Box::new(err))
    }

    /// True when the session has been torn down and the user must log in again.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::SessionExpired)
    }
}

/// HTTP client that attaches the stored bearer token and transparently
/// refreshes it when the API answers `401 Unauthorized`.
///
/// Concurrent requests that hit an expired token share a single refresh call.
/// When the refresh fails, or the retried request is rejected again, the stored
/// session is cleared and a [`SessionEvent::ForcedLogout`] is published.
pub struct AuthenticatedClient<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for AuthenticatedClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    http: Client,
    base_url: Url,
    auth: AuthClient,
    store: S,
    events: SessionEvents,
    refresh: RefreshCoordinator,
    bearer: RwLock<Option<String>>,
}

impl<S> AuthenticatedClient<S>
where
    S: TokenStore + 'static,
{
    pub fn new(
        http: Client,
        base_url: Url,
        auth: AuthClient,
        store: S,
        events: SessionEvents,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                auth,
                store,
                events,
                refresh: RefreshCoordinator::new(),
                bearer: RwLock::new(None),
            }),
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Whether an access token is currently available.
    pub async fn has_session(&self) -> Result<bool, ClientError> {
        Ok(self.access_token().await?.is_some())
    }

    /// Sends `request`, refreshing the session once on `401`.
    ///
    /// Any other status is returned to the caller untouched.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let token = self.access_token().await?;
        let response = self.dispatch(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(
            stage = "auth",
            path = %request.path,
            "request rejected with 401, refreshing session"
        );
        let fresh = self.fresh_token(token.as_deref()).await?;
        let retried = self.dispatch(request, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.force_logout(LogoutReason::SessionExpired).await;
            return Err(ClientError::SessionExpired);
        }

        Ok(retried)
    }

    /// Sends `request` and decodes a successful JSON body.
    pub async fn send_json<T>(&self, request: &ApiRequest) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = ensure_success(self.send(request).await?).await?;
        Ok(response.json().await?)
    }

    /// Sends `request` and discards a successful body.
    pub async fn send_empty(&self, request: &ApiRequest) -> Result<(), ClientError> {
        ensure_success(self.send(request).await?).await?;
        Ok(())
    }

    /// Logs in with credentials and persists the issued tokens.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ClientError> {
        let grant = self.inner.auth.login(email, password).await?;
        let tokens = grant.clone().into_token_pair(Utc::now());
        self.inner
            .store
            .save(&tokens)
            .await
            .map_err(ClientError::store)?;
        *self.inner.bearer.write().await = Some(tokens.access_token);

        info!(stage = "auth", "session established");
        Ok(grant)
    }

    /// Ends the session at the user's request.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.end_session(LogoutReason::UserLogout)
            .await
            .map_err(ClientError::store)
    }

    async fn access_token(&self) -> Result<Option<String>, ClientError> {
        if let Some(token) = self.inner.bearer.read().await.clone() {
            return Ok(Some(token));
        }

        let stored = self
            .inner
            .store
            .load()
            .await
            .map_err(ClientError::store)?
            .map(|tokens| tokens.access_token)
            .filter(|token| !token.is_empty());
        if let Some(token) = &stored {
            *self.inner.bearer.write().await = Some(token.clone());
        }
        Ok(stored)
    }

    /// Returns a token newer than `rejected`, refreshing unless another request already did.
    async fn fresh_token(&self, rejected: Option<&str>) -> Result<String, ClientError> {
        if let Some(current) = self.inner.bearer.read().await.clone() {
            if Some(current.as_str()) != rejected {
                return Ok(current);
            }
        }

        match self.inner.refresh.acquire_or_wait() {
            RefreshTicket::Wait(wait) => Ok(wait.wait().await?),
            RefreshTicket::Lead(lease) => {
                // the refresh outlives a cancelled caller so waiters and the store still see its outcome
                let client = self.clone();
                tokio::spawn(async move { client.lead_refresh(lease).await })
                    .await
                    .unwrap_or_else(|err| {
                        warn!(stage = "auth", error = %err, "refresh task did not complete");
                        Err(ClientError::Refresh(RefreshFailure::abandoned()))
                    })
            }
        }
    }

    async fn lead_refresh(&self, lease: RefreshLease) -> Result<String, ClientError> {
        match self.refresh_session().await {
            Ok(tokens) => {
                counter!("auth_refresh_total", "result" => "success").increment(1);
                let waiters = lease.settle(Ok(tokens.access_token.clone()));
                info!(stage = "auth", waiters, "session refreshed");
                Ok(tokens.access_token)
            }
            Err(failure) => {
                counter!("auth_refresh_total", "result" => "failed").increment(1);
                let waiters = lease.settle(Err(failure.clone()));
                warn!(
                    stage = "auth",
                    waiters,
                    status = failure.status.map(|status| status.as_u16()),
                    error = %failure,
                    "session refresh failed"
                );
                self.force_logout(failure.logout_reason()).await;
                Err(ClientError::Refresh(failure))
            }
        }
    }

    async fn refresh_session(&self) -> Result<TokenPair, RefreshFailure> {
        let stored = self
            .inner
            .store
            .load()
            .await
            .map_err(|err| RefreshFailure::new(None, format!("failed to load tokens: {err}")))?;
        let Some(refresh_token) = stored
            .map(|tokens| tokens.refresh_token)
            .filter(|token| !token.is_empty())
        else {
            return Err(RefreshFailure::new(None, "no refresh token available"));
        };

        let grant = self.inner.auth.refresh(&refresh_token).await?;
        let tokens = grant.into_token_pair(Utc::now());
        self.inner.store.save(&tokens).await.map_err(|err| {
            RefreshFailure::new(None, format!("failed to persist refreshed tokens: {err}"))
        })?;
        *self.inner.bearer.write().await = Some(tokens.access_token.clone());
        self.inner.events.publish(SessionEvent::TokenRefreshed {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        });

        Ok(tokens)
    }

    async fn force_logout(&self, reason: LogoutReason) {
        if let Err(err) = self.end_session(reason).await {
            warn!(stage = "auth", error = %err, "failed to clear stored tokens");
        }
    }

    async fn end_session(&self, reason: LogoutReason) -> Result<(), S::Error> {
        *self.inner.bearer.write().await = None;
        let cleared = self.inner.store.clear().await;

        counter!("auth_forced_logout_total", "reason" => reason.kind()).increment(1);
        match reason {
            LogoutReason::UserLogout => info!(stage = "auth", "session closed by user"),
            _ => warn!(stage = "auth", reason = %reason, "session terminated"),
        }
        self.inner.events.publish(SessionEvent::forced_logout(reason));

        cleared
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut url = self
            .inner
            .base_url
            .join(request.path.trim_start_matches('/'))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut builder = self.inner.http.request(request.method.clone(), url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        counter!("http_requests_total", "status_class" => status_class(response.status()))
            .increment(1);
        Ok(response)
    }
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<unavailable>"));
    Err(ClientError::Status { status, body })
}
