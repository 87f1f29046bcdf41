//! Feedback endpoints

use crate::api::{parse_id, ApiError, ApiJson, ApiResponse, CanteenState};
use crate::auth::{models::AuthContext, policy::ensure_can_manage, Role};
use crate::models::{Feedback, NewFeedback};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

pub const MAX_COMMENT_LEN: usize = 2000;

/// Roles allowed to remove feedback they did not write.
pub const FEEDBACK_MODERATORS: &[Role] = &[Role::Admin];

/// POST /api/feedback (student)
pub async fn create_feedback(
    State(state): State<CanteenState>,
    auth: AuthContext,
    ApiJson(payload): ApiJson<NewFeedback>,
) -> Result<(StatusCode, Json<ApiResponse<Feedback>>), ApiError> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }
    if payload
        .comment
        .as_deref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_LEN)
    {
        return Err(ApiError::bad_request("Comment is too long"));
    }

    let feedback = state
        .store
        .create_feedback(&auth.subject, payload)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("Meal"))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(feedback))))
}

/// GET /api/feedback/meal/:meal_id
pub async fn feedback_for_meal(
    State(state): State<CanteenState>,
    Path(meal_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Feedback>>>, ApiError> {
    let meal_id = parse_id(&meal_id)?;
    let feedback = state
        .store
        .list_feedback_for_meal(&meal_id)
        .map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(feedback)))
}

/// DELETE /api/feedback/:id (author or admin)
pub async fn delete_feedback(
    State(state): State<CanteenState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let feedback = state
        .store
        .get_feedback(&id)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("Feedback"))?;

    ensure_can_manage(&auth, &feedback, FEEDBACK_MODERATORS)?;

    state
        .store
        .delete_feedback(&id)
        .map_err(ApiError::internal)?;

    info!(feedback_id = %id, by = %auth.subject, role = %auth.role, "Deleted feedback");
    Ok(StatusCode::NO_CONTENT)
}
