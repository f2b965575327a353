// state/events.rs
// Domain events for cross-entity side effects. Catalog mutations emit
// events instead of inlining the side effect, so the contract stays
// visible and testable on its own.

use mongodb::bson::oid::ObjectId;

use crate::error::AppResult;
use crate::models::ExpenseType;

use super::{AppState, NewExpense, create_expense};

#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A product's stock level grew by `added` units (initial stock on
    /// creation counts as an increase from zero).
    StockIncreased {
        product_id: ObjectId,
        product_name: String,
        added: i64,
        purchase_price: f64,
    },
}

/// Reacts to a domain event. A stock increase with a positive purchase
/// price generates a purchase expense attributed to the acting user.
pub async fn react(state: &AppState, actor: &ObjectId, event: DomainEvent) -> AppResult<()> {
    match event {
        DomainEvent::StockIncreased {
            product_id,
            product_name,
            added,
            purchase_price,
        } => {
            if added <= 0 || purchase_price <= 0.0 {
                return Ok(());
            }
            let expense = create_expense(
                state,
                actor,
                NewExpense {
                    amount: added as f64 * purchase_price,
                    expense_type: ExpenseType::Product,
                    description: format!("Stock purchase: {product_name} (+{added} pcs)"),
                    product_id: Some(product_id),
                },
            )
            .await?;
            tracing::info!(
                product = %product_id.to_hex(),
                amount = expense.amount,
                "purchase expense recorded for stock increase"
            );
            Ok(())
        }
    }
}
