//! School Canteen Backend Library
//!
//! Exposes the router, stores and auth core for use by the binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod store;

pub use config::Config;
pub use routes::{build_router, Services};
