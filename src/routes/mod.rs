// routes/mod.rs
// Route handlers and router assembly.

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};
use serde_json::json;

use crate::session;
use crate::state::AppState;

pub mod auth;
pub mod employees;
pub mod expenses;
pub mod images;
pub mod products;
pub mod sales;

pub use auth::{login, logout, me, signup};
pub use employees::{employees_index, employees_rebuild_stats};
pub use expenses::{expenses_create, expenses_delete, expenses_index};
pub use images::delete_image;
pub use products::{products_create, products_delete, products_index, products_update};
pub use sales::{sales_create, sales_delete, sales_index, sales_show, sales_update};

/// Builds the full application router; everything except sign-up, login
/// and the health probe sits behind the session middleware.
pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/employees", get(employees_index))
        .route(
            "/api/employees/{id}/rebuild-stats",
            post(employees_rebuild_stats),
        )
        .route("/api/products", get(products_index).post(products_create))
        .route(
            "/api/products/{id}",
            axum::routing::put(products_update).delete(products_delete),
        )
        .route("/api/sales", get(sales_index).post(sales_create))
        .route(
            "/api/sales/{id}",
            get(sales_show).put(sales_update).delete(sales_delete),
        )
        .route("/api/expenses", get(expenses_index).post(expenses_create))
        .route("/api/expenses/{id}", delete(expenses_delete))
        .route("/api/delete-image", delete(delete_image))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// RFC 3339 rendering for JSON payloads.
pub(crate) fn fmt_date(date: &mongodb::bson::DateTime) -> String {
    date.try_to_rfc3339_string().unwrap_or_default()
}

/// Parses a path parameter into an ObjectId, mapping failure to a
/// validation error.
pub(crate) fn parse_object_id(
    value: &str,
    what: &str,
) -> Result<mongodb::bson::oid::ObjectId, crate::error::AppError> {
    value
        .parse()
        .map_err(|_| crate::error::AppError::Validation(format!("invalid {what} id")))
}
