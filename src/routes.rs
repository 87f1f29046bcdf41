//! Route table
//! Wires every endpoint behind the gate it needs and builds the application router

use crate::api::{feedback, meals, purchase_requests, CanteenState};
use crate::auth::{
    api as auth_api, auth_middleware, require_roles, AuthGate, AuthState, Role, RoleGate,
    TokenService, UserStore,
};
use crate::config::{AuthConfig, RolePolicy};
use crate::middleware::request_logging;
use crate::store::CanteenStore;
use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::{sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;

pub const SERVICE_NAME: &str = "school-canteen-backend";

/// Everything the router needs, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserStore>,
    pub canteen: Arc<CanteenStore>,
    pub tokens: Arc<TokenService>,
    pub role_policy: RolePolicy,
    pub started_at: Instant,
}

impl Services {
    pub fn new(config: &AuthConfig, users: Arc<UserStore>, canteen: Arc<CanteenStore>) -> Self {
        Self {
            users,
            canteen,
            tokens: Arc::new(TokenService::new(config)),
            role_policy: config.role_policy,
            started_at: Instant::now(),
        }
    }

    pub fn auth_gate(&self) -> AuthGate {
        AuthGate::new(self.tokens.clone(), self.users.clone(), self.role_policy)
    }
}

/// Put `router` behind the auth gate and, when given, a role gate.
pub fn guarded<S>(router: Router<S>, auth: &AuthGate, roles: Option<RoleGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let router = match roles {
        Some(gate) => router.route_layer(middleware::from_fn_with_state(gate, require_roles)),
        None => router,
    };
    // Added last so it runs first
    router.route_layer(middleware::from_fn_with_state(
        auth.clone(),
        auth_middleware,
    ))
}

pub fn build_router(services: &Services) -> Router {
    let gate = services.auth_gate();
    let auth_state = AuthState::new(services.users.clone(), services.tokens.clone());
    let canteen_state = CanteenState {
        store: services.canteen.clone(),
    };

    let admin = || Some(RoleGate::only(Role::Admin));
    let kitchen = || Some(RoleGate::new([Role::Cook, Role::Admin]));
    let cook = || Some(RoleGate::only(Role::Cook));
    let student = || Some(RoleGate::only(Role::Student));

    // --- auth -------------------------------------------------------------
    let auth_public = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login));

    let auth_profile = guarded(
        Router::new().route("/api/auth/profile", get(auth_api::profile)),
        &gate,
        None,
    );

    let auth_admin = guarded(
        Router::new()
            .route(
                "/api/auth/users",
                get(auth_api::list_users).post(auth_api::create_user),
            )
            .route("/api/auth/users/:id", delete(auth_api::delete_user))
            .route("/api/auth/users/:id/role", patch(auth_api::set_user_role)),
        &gate,
        admin(),
    );

    let auth_routes = Router::new()
        .merge(auth_public)
        .merge(auth_profile)
        .merge(auth_admin)
        .with_state(auth_state);

    // --- meals ------------------------------------------------------------
    let meals_public = Router::new()
        .route("/api/meals", get(meals::list_meals))
        .route("/api/meals/today", get(meals::todays_menu))
        .route("/api/meals/:id", get(meals::get_meal));

    let meals_kitchen = guarded(
        Router::new()
            .route("/api/meals", post(meals::create_meal))
            .route("/api/meals/:id", put(meals::update_meal)),
        &gate,
        kitchen(),
    );

    let meals_admin = guarded(
        Router::new().route("/api/meals/:id", delete(meals::delete_meal)),
        &gate,
        admin(),
    );

    // --- feedback ---------------------------------------------------------
    let feedback_public = Router::new().route(
        "/api/feedback/meal/:meal_id",
        get(feedback::feedback_for_meal),
    );

    let feedback_student = guarded(
        Router::new().route("/api/feedback", post(feedback::create_feedback)),
        &gate,
        student(),
    );

    // Author-or-admin is decided per record inside the handler
    let feedback_owner = guarded(
        Router::new().route("/api/feedback/:id", delete(feedback::delete_feedback)),
        &gate,
        None,
    );

    // --- purchase requests ------------------------------------------------
    let purchases_cook = guarded(
        Router::new()
            .route(
                "/api/purchase-requests",
                post(purchase_requests::create_request),
            )
            .route(
                "/api/purchase-requests/my",
                get(purchase_requests::my_requests),
            ),
        &gate,
        cook(),
    );

    let purchases_admin = guarded(
        Router::new()
            .route(
                "/api/purchase-requests",
                get(purchase_requests::all_requests),
            )
            .route(
                "/api/purchase-requests/:id/status",
                patch(purchase_requests::update_status),
            ),
        &gate,
        admin(),
    );

    let canteen_routes = Router::new()
        .merge(meals_public)
        .merge(meals_kitchen)
        .merge(meals_admin)
        .merge(feedback_public)
        .merge(feedback_student)
        .merge(feedback_owner)
        .merge(purchases_cook)
        .merge(purchases_admin)
        .with_state(canteen_state);

    // --- public -----------------------------------------------------------
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/api/health", get(health_check))
        .with_state(services.started_at);

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(canteen_routes)
        .fallback(not_found)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "auth": {
                "register": "POST /api/auth/register",
                "login": "POST /api/auth/login",
                "profile": "GET /api/auth/profile (token)",
                "users": "GET|POST /api/auth/users (admin)",
            },
            "meals": {
                "list": "GET /api/meals",
                "today": "GET /api/meals/today",
                "get": "GET /api/meals/:id",
                "create": "POST /api/meals (cook, admin)",
                "update": "PUT /api/meals/:id (cook, admin)",
                "delete": "DELETE /api/meals/:id (admin)",
            },
            "feedback": {
                "create": "POST /api/feedback (student)",
                "byMeal": "GET /api/feedback/meal/:mealId",
                "delete": "DELETE /api/feedback/:id (author, admin)",
            },
            "purchaseRequests": {
                "create": "POST /api/purchase-requests (cook)",
                "mine": "GET /api/purchase-requests/my (cook)",
                "all": "GET /api/purchase-requests (admin)",
                "review": "PATCH /api/purchase-requests/:id/status (admin)",
            },
            "health": "GET /api/health",
        }
    }))
}

async fn health_check(State(started_at): State<Instant>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "service": SERVICE_NAME,
        "uptime": started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Route not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}
