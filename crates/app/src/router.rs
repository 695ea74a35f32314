use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use catalog_admin_client::{
    parse_kind_list, AuthenticatedClient, CatalogClient, SessionEventFilter,
};
use catalog_admin_storage::SessionRepository;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio_stream::Stream;

use crate::categories;
use crate::events::{session_keep_alive, session_stream};
use crate::problem::ProblemResponse;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    catalog: CatalogClient<SessionRepository>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, catalog: CatalogClient<SessionRepository>) -> Self {
        Self { metrics, catalog }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn catalog(&self) -> &CatalogClient<SessionRepository> {
        &self.catalog
    }

    pub fn client(&self) -> &AuthenticatedClient<SessionRepository> {
        self.catalog.client()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/admin/session", post(login).delete(logout))
        .route("/admin/session/events", get(session_events))
        .route("/admin/categories/tree", get(categories::tree))
        .route("/admin/categories/move", post(categories::move_category))
        .route("/admin/categories/reorder", post(categories::reorder_category))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<StatusCode, ProblemResponse> {
    state
        .client()
        .login(&request.email, &request.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, ProblemResponse> {
    state.client().logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    kinds: Option<String>,
}

async fn session_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, serde_json::Error>>>, ProblemResponse> {
    let kinds = parse_kind_list(query.kinds.as_deref())
        .map_err(|err| ProblemResponse::new(StatusCode::BAD_REQUEST, "invalid_event_kinds", err))?;
    let stream = session_stream(
        state.client().events(),
        SessionEventFilter::from_kinds(kinds),
    );

    Ok(Sse::new(stream).keep_alive(session_keep_alive()))
}
