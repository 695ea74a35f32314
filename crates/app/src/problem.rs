use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use catalog_admin_client::{AuthError, CatalogError, ClientError};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    /// Prefixes the detail with what the handler had already done when the error occurred.
    pub fn with_context(mut self, context: impl std::fmt::Display) -> Self {
        self.body.detail = format!("{context}: {}", self.body.detail);
        self
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

impl From<ClientError> for ProblemResponse {
    fn from(err: ClientError) -> Self {
        if err.is_session_fatal() {
            return Self::new(StatusCode::UNAUTHORIZED, "session_expired", err.to_string());
        }

        match &err {
            ClientError::Auth(auth) if is_rejected_credentials(auth) => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "the catalog backend rejected the credentials",
            ),
            ClientError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                Self::new(StatusCode::NOT_FOUND, "upstream_not_found", err.to_string())
            }
            ClientError::TokenStore(_) => {
                warn!(stage = "app", error = %err, "session store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "session_store_error",
                    "failed to access the stored session",
                )
            }
            _ => {
                warn!(stage = "app", error = %err, "catalog backend request failed");
                Self::new(StatusCode::BAD_GATEWAY, "upstream_error", err.to_string())
            }
        }
    }
}

impl From<CatalogError> for ProblemResponse {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Client(inner) => inner.into(),
            CatalogError::InvalidId(id) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_category_id",
                format!("category id '{id}' is not valid"),
            ),
        }
    }
}

fn is_rejected_credentials(err: &AuthError) -> bool {
    matches!(err.status().map(|status| status.as_u16()), Some(401 | 403 | 422))
}
