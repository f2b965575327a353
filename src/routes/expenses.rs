use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{Expense, ExpenseType};
use crate::routes::{fmt_date, parse_object_id};
use crate::session::SessionUser;
use crate::state::{AppState, NewExpense, create_expense, delete_expense, list_expenses};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDto {
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub expense_type: String,
    pub description: String,
    pub product_id: Option<String>,
    pub date: String,
    pub created_by: String,
    pub created_by_name: String,
    pub last_edited_by: String,
    pub last_edited_by_name: String,
    pub last_edited_date: String,
}

impl From<&Expense> for ExpenseDto {
    fn from(expense: &Expense) -> Self {
        ExpenseDto {
            id: expense.id.map(|id| id.to_hex()).unwrap_or_default(),
            amount: expense.amount,
            expense_type: expense.expense_type.as_str().to_string(),
            description: expense.description.clone(),
            product_id: expense.product_id.map(|id| id.to_hex()),
            date: fmt_date(&expense.date),
            created_by: expense.created_by.to_hex(),
            created_by_name: expense.created_by_name.clone(),
            last_edited_by: expense.last_edited_by.to_hex(),
            last_edited_by_name: expense.last_edited_by_name.clone(),
            last_edited_date: fmt_date(&expense.last_edited_date),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub amount: f64,
    #[serde(rename = "type")]
    pub expense_type: String,
    pub description: String,
    #[serde(default)]
    pub product_id: Option<String>,
}

pub async fn expenses_index(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<ExpenseDto>>> {
    let expenses = list_expenses(&state).await?;
    Ok(Json(expenses.iter().map(ExpenseDto::from).collect()))
}

pub async fn expenses_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateExpenseRequest>,
) -> AppResult<Json<ExpenseDto>> {
    let expense_type = ExpenseType::parse(&body.expense_type).ok_or_else(|| {
        AppError::validation(format!("unknown expense type \"{}\"", body.expense_type))
    })?;
    let product_id = match &body.product_id {
        Some(raw) => Some(parse_object_id(raw, "product")?),
        None => None,
    };

    let expense = create_expense(
        &state,
        session.user_id(),
        NewExpense {
            amount: body.amount,
            expense_type,
            description: body.description,
            product_id,
        },
    )
    .await?;
    Ok(Json(ExpenseDto::from(&expense)))
}

pub async fn expenses_delete(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let expense_id = parse_object_id(&id, "expense")?;
    delete_expense(&state, &expense_id).await?;
    Ok(Json(json!({ "ok": true })))
}
