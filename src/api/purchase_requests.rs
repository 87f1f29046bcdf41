//! Purchase request endpoints: cooks file requests, admins review them

use crate::api::{parse_id, ApiError, ApiJson, ApiResponse, CanteenState};
use crate::auth::models::AuthContext;
use crate::models::{NewPurchaseRequest, PurchaseRequest, StatusUpdate};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// POST /api/purchase-requests (cook)
pub async fn create_request(
    State(state): State<CanteenState>,
    auth: AuthContext,
    ApiJson(payload): ApiJson<NewPurchaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseRequest>>), ApiError> {
    if payload.item.trim().is_empty() {
        return Err(ApiError::bad_request("Item must not be empty"));
    }
    if payload.unit.trim().is_empty() {
        return Err(ApiError::bad_request("Unit must not be empty"));
    }
    if !payload.quantity.is_finite() || payload.quantity <= 0.0 {
        return Err(ApiError::bad_request("Quantity must be greater than zero"));
    }

    let request = state
        .store
        .create_purchase_request(&auth.subject, payload)
        .map_err(ApiError::internal)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(request))))
}

/// GET /api/purchase-requests/my (cook)
pub async fn my_requests(
    State(state): State<CanteenState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<PurchaseRequest>>>, ApiError> {
    let requests = state
        .store
        .list_purchase_requests(Some(&auth.subject))
        .map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(requests)))
}

/// GET /api/purchase-requests (admin)
pub async fn all_requests(
    State(state): State<CanteenState>,
) -> Result<Json<ApiResponse<Vec<PurchaseRequest>>>, ApiError> {
    let requests = state
        .store
        .list_purchase_requests(None)
        .map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(requests)))
}

/// PATCH /api/purchase-requests/:id/status (admin)
pub async fn update_status(
    State(state): State<CanteenState>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<StatusUpdate>,
) -> Result<Json<ApiResponse<PurchaseRequest>>, ApiError> {
    let id = parse_id(&id)?;
    let request = state
        .store
        .set_purchase_status(&id, payload.status, &auth.subject)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("Purchase request"))?;
    Ok(Json(ApiResponse::ok(request)))
}
