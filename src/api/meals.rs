//! Meal menu endpoints

use crate::api::{parse_id, ApiError, ApiJson, ApiResponse, CanteenState};
use crate::models::{Meal, MealUpdate, NewMeal};
use crate::store::today;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;

/// GET /api/meals
pub async fn list_meals(
    State(state): State<CanteenState>,
) -> Result<Json<ApiResponse<Vec<Meal>>>, ApiError> {
    let meals = state.store.list_meals().map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(meals)))
}

/// GET /api/meals/today
pub async fn todays_menu(
    State(state): State<CanteenState>,
) -> Result<Json<ApiResponse<Vec<Meal>>>, ApiError> {
    let meals = state
        .store
        .list_meals_on(&today())
        .map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(meals)))
}

/// GET /api/meals/:id
pub async fn get_meal(
    State(state): State<CanteenState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Meal>>, ApiError> {
    let id = parse_id(&id)?;
    let meal = state
        .store
        .get_meal(&id)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("Meal"))?;
    Ok(Json(ApiResponse::ok(meal)))
}

/// POST /api/meals (cook, admin)
pub async fn create_meal(
    State(state): State<CanteenState>,
    ApiJson(payload): ApiJson<NewMeal>,
) -> Result<(StatusCode, Json<ApiResponse<Meal>>), ApiError> {
    validate_name(&payload.name)?;
    validate_price(payload.price)?;
    if let Some(date) = payload.available_on.as_deref() {
        validate_date(date)?;
    }

    let meal = state
        .store
        .create_meal(payload)
        .map_err(ApiError::internal)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(meal))))
}

/// PUT /api/meals/:id (cook, admin)
pub async fn update_meal(
    State(state): State<CanteenState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<MealUpdate>,
) -> Result<Json<ApiResponse<Meal>>, ApiError> {
    let id = parse_id(&id)?;
    if let Some(name) = payload.name.as_deref() {
        validate_name(name)?;
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
    }
    if let Some(date) = payload.available_on.as_deref() {
        validate_date(date)?;
    }

    let meal = state
        .store
        .update_meal(&id, payload)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("Meal"))?;
    Ok(Json(ApiResponse::ok(meal)))
}

/// DELETE /api/meals/:id (admin)
pub async fn delete_meal(
    State(state): State<CanteenState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.store.delete_meal(&id).map_err(ApiError::internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Meal"))
    }
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Meal name must not be empty"));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::bad_request("Price must be a non-negative number"));
    }
    Ok(())
}

fn validate_date(date: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ApiError::bad_request("availableOn must be YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_input_validation() {
        assert!(validate_name("Pelmeni").is_ok());
        assert!(validate_name("   ").is_err());

        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());

        assert!(validate_date("2025-09-01").is_ok());
        assert!(validate_date("01.09.2025").is_err());

        assert!(parse_id("nope").is_err());
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
