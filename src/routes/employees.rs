// routes/employees.rs
// GET /api/employees -> employee directory with sales stats.
// POST /api/employees/{id}/rebuild-stats -> recompute denormalized counters.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{SalesStats, User};
use crate::routes::parse_object_id;
use crate::session::SessionUser;
use crate::state::{AppState, list_employees, rebuild_sales_stats};

#[derive(Serialize)]
pub struct EmployeeDto {
    pub id: String,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub job_position: String,
    pub gender: String,
    pub role: String,
    pub permission: i32,
    pub stats: SalesStats,
}

impl From<&User> for EmployeeDto {
    fn from(user: &User) -> Self {
        EmployeeDto {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email.clone(),
            name: user.display_name(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            job_position: user.job_position.clone(),
            gender: user.gender.clone(),
            role: user.role.as_str().to_string(),
            permission: user.role.permission_level(),
            stats: user.stats.clone(),
        }
    }
}

pub async fn employees_index(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<EmployeeDto>>> {
    let employees = list_employees(&state).await?;
    Ok(Json(employees.iter().map(EmployeeDto::from).collect()))
}

pub async fn employees_rebuild_stats(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<SalesStats>> {
    let user_id = parse_object_id(&id, "user")?;
    let stats = rebuild_sales_stats(&state, &user_id).await?;
    Ok(Json(stats))
}
