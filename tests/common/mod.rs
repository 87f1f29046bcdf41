//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use canteen_backend::{
    auth::{Role, User, UserStore},
    build_router,
    config::{AuthConfig, RolePolicy},
    store::CanteenStore,
    Services,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub services: Services,
}

pub fn auth_config(policy: RolePolicy) -> AuthConfig {
    AuthConfig::new(SECRET).with_role_policy(policy)
}

pub fn services(policy: RolePolicy) -> Services {
    let users = Arc::new(UserStore::in_memory_with_cost(4).expect("user store"));
    let canteen = Arc::new(CanteenStore::in_memory().expect("canteen store"));
    Services::new(&auth_config(policy), users, canteen)
}

pub fn app(policy: RolePolicy) -> TestApp {
    let services = services(policy);
    let router = build_router(&services);
    TestApp { router, services }
}

impl TestApp {
    /// Insert a user directly and mint a token for it.
    pub fn user(&self, login: &str, role: Role) -> (User, String) {
        let user = self
            .services
            .users
            .create_user(login, PASSWORD, role, "Test User")
            .expect("create user");
        let token = self
            .services
            .tokens
            .issue(&user.id.to_string(), role)
            .expect("issue token")
            .token;
        (user, token)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(&self.router, method, uri, token, body).await
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}
