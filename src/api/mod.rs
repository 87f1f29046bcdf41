//! HTTP handlers for the canteen resources

pub mod error;
pub mod extract;
pub mod feedback;
pub mod meals;
pub mod purchase_requests;

pub use error::ApiError;
pub use extract::ApiJson;

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::CanteenStore;

/// State shared by the canteen resource handlers
#[derive(Clone)]
pub struct CanteenState {
    pub store: Arc<CanteenStore>,
}

/// Success envelope: `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid id format"))
}
