use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};

use crate::error::{AppError, AppResult};
use crate::models::{Expense, ExpenseType};

use super::{AppState, actor_display_name};

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub expense_type: ExpenseType,
    pub description: String,
    pub product_id: Option<ObjectId>,
}

pub async fn list_expenses(state: &AppState) -> AppResult<Vec<Expense>> {
    let mut cursor = state
        .expenses
        .find(doc! {})
        .sort(doc! { "date": -1 })
        .await?;
    let mut items = Vec::new();
    while let Some(expense) = cursor.try_next().await? {
        items.push(expense);
    }
    Ok(items)
}

pub async fn create_expense(
    state: &AppState,
    actor: &ObjectId,
    input: NewExpense,
) -> AppResult<Expense> {
    if input.amount <= 0.0 {
        return Err(AppError::validation("expense amount must be positive"));
    }
    if input.description.trim().is_empty() {
        return Err(AppError::validation("expense description is required"));
    }

    let actor_name = actor_display_name(state, actor).await?;
    let now = DateTime::now();
    let mut expense = Expense {
        id: None,
        amount: input.amount,
        expense_type: input.expense_type,
        description: input.description.trim().to_string(),
        product_id: input.product_id,
        date: now,
        created_by: *actor,
        created_by_name: actor_name.clone(),
        last_edited_by: *actor,
        last_edited_by_name: actor_name,
        last_edited_date: now,
    };
    let res = state.expenses.insert_one(&expense).await?;
    expense.id = res.inserted_id.as_object_id();
    Ok(expense)
}

pub async fn delete_expense(state: &AppState, id: &ObjectId) -> AppResult<()> {
    let res = state.expenses.delete_one(doc! { "_id": id }).await?;
    if res.deleted_count == 0 {
        return Err(AppError::NotFound { entity: "expense" });
    }
    Ok(())
}
