use axum::{extract::State, http::StatusCode, Json};
use catalog_admin_core::{
    tree::{build_tree, can_reparent, find_node, move_node, position_changes, reorder},
    CategoryNode, ReorderPlan, SiblingPosition,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    node_id: String,
    #[serde(default)]
    new_parent_id: Option<String>,
    #[serde(default)]
    new_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    source_id: String,
    #[serde(default)]
    from_parent_id: Option<String>,
    #[serde(default)]
    to_parent_id: Option<String>,
    to_index: usize,
}

pub async fn tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryNode>>, ProblemResponse> {
    Ok(Json(load_tree(&state).await?))
}

pub async fn move_category(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Vec<CategoryNode>>, ProblemResponse> {
    let before = load_tree(&state).await?;
    let parent_id = request.new_parent_id.as_deref();

    if find_node(&before, &request.node_id).is_none() {
        return Err(ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "category_not_found",
            format!("category '{}' does not exist", request.node_id),
        ));
    }
    if let Some(parent) = parent_id {
        if find_node(&before, parent).is_none() {
            return Err(ProblemResponse::new(
                StatusCode::NOT_FOUND,
                "parent_not_found",
                format!("parent category '{parent}' does not exist"),
            ));
        }
    }
    if !can_reparent(&before, &request.node_id, parent_id) {
        return Err(ProblemResponse::new(
            StatusCode::CONFLICT,
            "invalid_reparent",
            "a category cannot be moved below itself or one of its descendants",
        ));
    }

    let after = move_node(&before, &request.node_id, parent_id, request.new_index);
    persist(&state, &position_changes(&before, &after)).await?;
    Ok(Json(after))
}

pub async fn reorder_category(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<ReorderPlan>, ProblemResponse> {
    let before = load_tree(&state).await?;
    let plan = reorder(
        &before,
        &request.source_id,
        request.from_parent_id.as_deref(),
        request.to_parent_id.as_deref(),
        request.to_index,
    )
    .ok_or_else(|| {
        ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "sibling_list_not_found",
            "the source is not in the origin list or the destination list does not exist",
        )
    })?;

    let positions: Vec<SiblingPosition> = plan.positions().cloned().collect();
    persist(&state, &positions).await?;
    Ok(Json(plan))
}

async fn load_tree(state: &AppState) -> Result<Vec<CategoryNode>, ProblemResponse> {
    let records = state.catalog().list_categories().await?;
    Ok(build_tree(&records))
}

/// Writes positions one by one. A failure reports how many were applied before it.
async fn persist(state: &AppState, positions: &[SiblingPosition]) -> Result<(), ProblemResponse> {
    let total = positions.len();
    for (applied, position) in positions.iter().enumerate() {
        if let Err(err) = state.catalog().update_position(position).await {
            warn!(
                stage = "catalog",
                id = %position.id,
                applied,
                total,
                error = %err,
                "category position update failed"
            );
            return Err(ProblemResponse::from(err).with_context(format!(
                "{applied} of {total} positions persisted before '{}' failed",
                position.id
            )));
        }
    }
    info!(stage = "catalog", updated = positions.len(), "category positions persisted");
    Ok(())
}
