// state/ledger.rs
// Sale ledger: creation, update and deletion of sale (income) records,
// keeping product stock and per-user sales counters consistent.
//
// Every mutating operation runs inside a single MongoDB multi-document
// transaction. Stock checks are per-product read-modify-writes on the
// open session, so a conflicting concurrent debit aborts the transaction
// instead of silently corrupting the count. No retry is attempted here;
// failures propagate to the caller unmodified.

use std::collections::HashMap;

use futures::stream::TryStreamExt;
use mongodb::ClientSession;
use mongodb::bson::{Bson, DateTime, doc, oid::ObjectId, to_bson};

use crate::error::{AppError, AppResult};
use crate::models::{Sale, SaleLine, SaleStatus, SalesStats};

use super::{AppState, actor_display_name};

/// Input for a new sale: product references with quantities. Name and
/// price snapshots are resolved inside the transaction.
#[derive(Debug, Clone)]
pub struct LineInput {
    pub product_id: ObjectId,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub lines: Vec<LineInput>,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub status: SaleStatus,
}

/// Partial update; `None` keeps the previous value.
#[derive(Debug, Clone, Default)]
pub struct SalePatch {
    pub lines: Option<Vec<LineInput>>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub status: Option<SaleStatus>,
}

pub async fn create_sale(state: &AppState, actor: &ObjectId, draft: SaleDraft) -> AppResult<Sale> {
    validate_lines(&draft.lines)?;
    let actor_name = actor_display_name(state, actor).await?;

    let mut session = state.client.start_session().await?;
    session.start_transaction().await?;
    match create_sale_in_txn(state, &mut session, actor, &actor_name, draft).await {
        Ok(sale) => {
            session.commit_transaction().await?;
            tracing::info!(
                sale = %sale.id.map(|id| id.to_hex()).unwrap_or_default(),
                status = sale.status.as_str(),
                lines = sale.products.len(),
                "sale created"
            );
            Ok(sale)
        }
        Err(err) => {
            let _ = session.abort_transaction().await;
            Err(err)
        }
    }
}

async fn create_sale_in_txn(
    state: &AppState,
    session: &mut ClientSession,
    actor: &ObjectId,
    actor_name: &str,
    draft: SaleDraft,
) -> AppResult<Sale> {
    let lines = resolve_lines(state, session, &draft.lines).await?;

    if draft.status.holds_stock() {
        let deltas = debit_deltas(&lines);
        apply_stock_deltas(state, session, &deltas, &lines).await?;
    }

    let now = DateTime::now();
    let mut sale = Sale {
        id: None,
        products: lines,
        client_name: draft.client_name,
        client_phone: draft.client_phone,
        client_email: draft.client_email,
        status: draft.status,
        created_date: now,
        created_by: Some(*actor),
        created_by_name: actor_name.to_string(),
        last_edited_by: Some(*actor),
        last_edited_by_name: actor_name.to_string(),
        last_edited_date: now,
    };
    let res = state.incomes.insert_one(&sale).session(&mut *session).await?;
    sale.id = res.inserted_id.as_object_id();

    apply_stats_deltas(
        state,
        session,
        actor,
        &stats_deltas(None, Some(draft.status)),
    )
    .await?;

    Ok(sale)
}

pub async fn update_sale(
    state: &AppState,
    actor: &ObjectId,
    sale_id: &ObjectId,
    patch: SalePatch,
) -> AppResult<Sale> {
    if let Some(lines) = &patch.lines {
        validate_lines(lines)?;
    }
    let actor_name = actor_display_name(state, actor).await?;

    let mut session = state.client.start_session().await?;
    session.start_transaction().await?;
    match update_sale_in_txn(state, &mut session, actor, &actor_name, sale_id, patch).await {
        Ok(sale) => {
            session.commit_transaction().await?;
            tracing::info!(sale = %sale_id.to_hex(), status = sale.status.as_str(), "sale updated");
            Ok(sale)
        }
        Err(err) => {
            let _ = session.abort_transaction().await;
            Err(err)
        }
    }
}

async fn update_sale_in_txn(
    state: &AppState,
    session: &mut ClientSession,
    actor: &ObjectId,
    actor_name: &str,
    sale_id: &ObjectId,
    patch: SalePatch,
) -> AppResult<Sale> {
    let prev = state
        .incomes
        .find_one(doc! { "_id": sale_id })
        .session(&mut *session)
        .await?
        .ok_or(AppError::NotFound { entity: "sale" })?;

    let next_status = patch.status.unwrap_or(prev.status);
    let next_lines = match &patch.lines {
        Some(lines) => resolve_lines(state, session, lines).await?,
        None => prev.products.clone(),
    };

    let deltas = stock_deltas(prev.status, &prev.products, next_status, &next_lines);
    apply_stock_deltas(state, session, &deltas, &next_lines).await?;

    if let Some(owner) = &prev.created_by {
        apply_stats_deltas(
            state,
            session,
            owner,
            &stats_deltas(Some(prev.status), Some(next_status)),
        )
        .await?;
    }

    let now = DateTime::now();
    let sale = Sale {
        id: Some(*sale_id),
        products: next_lines,
        client_name: patch.client_name.unwrap_or(prev.client_name),
        client_phone: patch.client_phone.unwrap_or(prev.client_phone),
        client_email: patch.client_email.unwrap_or(prev.client_email),
        status: next_status,
        created_date: prev.created_date,
        created_by: prev.created_by,
        created_by_name: prev.created_by_name,
        last_edited_by: Some(*actor),
        last_edited_by_name: actor_name.to_string(),
        last_edited_date: now,
    };

    state
        .incomes
        .update_one(
            doc! { "_id": sale_id },
            doc! { "$set": {
                "products": to_bson(&sale.products).map_err(anyhow::Error::from)?,
                "clientName": &sale.client_name,
                "clientPhone": &sale.client_phone,
                "clientEmail": &sale.client_email,
                "status": sale.status.as_str(),
                "lastEditedBy": actor,
                "lastEditedByName": actor_name,
                "lastEditedDate": now,
            } },
        )
        .session(&mut *session)
        .await?;

    Ok(sale)
}

pub async fn delete_sale(state: &AppState, sale_id: &ObjectId) -> AppResult<()> {
    let mut session = state.client.start_session().await?;
    session.start_transaction().await?;
    match delete_sale_in_txn(state, &mut session, sale_id).await {
        Ok(()) => {
            session.commit_transaction().await?;
            tracing::info!(sale = %sale_id.to_hex(), "sale deleted");
            Ok(())
        }
        Err(err) => {
            let _ = session.abort_transaction().await;
            Err(err)
        }
    }
}

async fn delete_sale_in_txn(
    state: &AppState,
    session: &mut ClientSession,
    sale_id: &ObjectId,
) -> AppResult<()> {
    let sale = state
        .incomes
        .find_one(doc! { "_id": sale_id })
        .session(&mut *session)
        .await?
        .ok_or(AppError::NotFound { entity: "sale" })?;

    // Stock was debited and never returned only while the sale is open.
    if sale.status == SaleStatus::Open {
        let deltas = credit_deltas(&sale.products);
        apply_stock_deltas(state, session, &deltas, &sale.products).await?;
    }

    if let Some(owner) = &sale.created_by {
        apply_stats_deltas(
            state,
            session,
            owner,
            &stats_deltas(Some(sale.status), None),
        )
        .await?;
    }

    state
        .incomes
        .delete_one(doc! { "_id": sale_id })
        .session(&mut *session)
        .await?;
    Ok(())
}

pub async fn get_sale_by_id(state: &AppState, id: &ObjectId) -> AppResult<Option<Sale>> {
    state
        .incomes
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Sales ordered by creation date descending, with an optional exclusive
/// `before` cursor and the server-side total count.
pub async fn list_sales(
    state: &AppState,
    limit: i64,
    before: Option<DateTime>,
) -> AppResult<(Vec<Sale>, u64)> {
    let filter = match before {
        Some(cursor) => doc! { "createdDate": { "$lt": cursor } },
        None => doc! {},
    };
    let mut cursor = state
        .incomes
        .find(filter)
        .sort(doc! { "createdDate": -1 })
        .limit(limit)
        .await?;
    let mut items = Vec::new();
    while let Some(sale) = cursor.try_next().await? {
        items.push(sale);
    }
    let total = state.incomes.count_documents(doc! {}).await?;
    Ok((items, total))
}

/// Recomputes a user's denormalized counters from the incomes collection.
/// Corrective tool for drift; not part of the regular write path.
pub async fn rebuild_sales_stats(state: &AppState, user_id: &ObjectId) -> AppResult<SalesStats> {
    let total = state
        .incomes
        .count_documents(doc! { "createdBy": user_id })
        .await? as i64;
    let open = state
        .incomes
        .count_documents(doc! { "createdBy": user_id, "status": SaleStatus::Open.as_str() })
        .await? as i64;
    let closed = state
        .incomes
        .count_documents(doc! { "createdBy": user_id, "status": SaleStatus::Closed.as_str() })
        .await? as i64;

    let stats = SalesStats {
        total_sales: total,
        open_sales: open,
        closed_sales: closed,
    };
    let res = state
        .users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "stats.total_sales": stats.total_sales,
                "stats.open_sales": stats.open_sales,
                "stats.closed_sales": stats.closed_sales,
            } },
        )
        .await?;
    if res.matched_count == 0 {
        return Err(AppError::NotFound { entity: "user" });
    }
    tracing::info!(user = %user_id.to_hex(), total, open, closed, "sales stats rebuilt");
    Ok(stats)
}

fn validate_lines(lines: &[LineInput]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::validation("a sale requires at least one product line"));
    }
    if lines.iter().any(|l| l.quantity <= 0) {
        return Err(AppError::validation("line quantities must be positive"));
    }
    Ok(())
}

/// Reads each referenced product on the open session and snapshots its
/// name and price into sale lines.
async fn resolve_lines(
    state: &AppState,
    session: &mut ClientSession,
    inputs: &[LineInput],
) -> AppResult<Vec<SaleLine>> {
    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = state
            .products
            .find_one(doc! { "_id": input.product_id })
            .session(&mut *session)
            .await?
            .ok_or(AppError::NotFound { entity: "product" })?;
        lines.push(SaleLine {
            product_id: Some(input.product_id),
            name: product.name,
            price: product.price,
            quantity: input.quantity,
        });
    }
    Ok(lines)
}

/// Net stock adjustment per product for a status/lines transition.
/// Positive values credit stock back, negative values debit it.
fn stock_deltas(
    prev_status: SaleStatus,
    prev_lines: &[SaleLine],
    next_status: SaleStatus,
    next_lines: &[SaleLine],
) -> HashMap<ObjectId, i64> {
    let mut deltas = HashMap::new();
    match (prev_status.holds_stock(), next_status.holds_stock()) {
        // canceled -> canceled: stock was never held
        (false, false) => {}
        // any -> canceled: return the previously debited lines
        (true, false) => accumulate(&mut deltas, prev_lines, 1),
        // canceled -> any other: debit the new lines
        (false, true) => accumulate(&mut deltas, next_lines, -1),
        // open <-> closed (or unchanged): stock untouched unless the
        // product list itself changed, in which case the delta is
        // re-derived as credit-old plus debit-new.
        (true, true) => {
            accumulate(&mut deltas, prev_lines, 1);
            accumulate(&mut deltas, next_lines, -1);
        }
    }
    deltas.retain(|_, v| *v != 0);
    deltas
}

fn debit_deltas(lines: &[SaleLine]) -> HashMap<ObjectId, i64> {
    let mut deltas = HashMap::new();
    accumulate(&mut deltas, lines, -1);
    deltas.retain(|_, v| *v != 0);
    deltas
}

fn credit_deltas(lines: &[SaleLine]) -> HashMap<ObjectId, i64> {
    let mut deltas = HashMap::new();
    accumulate(&mut deltas, lines, 1);
    deltas.retain(|_, v| *v != 0);
    deltas
}

fn accumulate(deltas: &mut HashMap<ObjectId, i64>, lines: &[SaleLine], sign: i64) {
    for line in lines {
        if let Some(pid) = line.product_id {
            *deltas.entry(pid).or_insert(0) += sign * line.quantity;
        }
    }
}

/// Per-product read-modify-write on the open transaction. The whole batch
/// is rejected before anything is committed if a debit would go negative.
async fn apply_stock_deltas(
    state: &AppState,
    session: &mut ClientSession,
    deltas: &HashMap<ObjectId, i64>,
    lines: &[SaleLine],
) -> AppResult<()> {
    for (product_id, delta) in deltas {
        let product = match state
            .products
            .find_one(doc! { "_id": product_id })
            .session(&mut *session)
            .await?
        {
            Some(p) => p,
            None if *delta > 0 => {
                // Crediting stock back to a product deleted since the sale
                // was recorded; nothing left to restore.
                tracing::warn!(product = %product_id.to_hex(), "stock credit skipped, product gone");
                continue;
            }
            None => return Err(AppError::NotFound { entity: "product" }),
        };

        let new_stock = product.stock + delta;
        if new_stock < 0 {
            let requested = lines
                .iter()
                .filter(|l| l.product_id.as_ref() == Some(product_id))
                .map(|l| l.quantity)
                .sum();
            return Err(AppError::InsufficientStock {
                product: product.name,
                requested,
                available: product.stock,
            });
        }

        state
            .products
            .update_one(
                doc! { "_id": product_id },
                doc! { "$inc": { "stock": delta }, "$set": { "updatedAt": DateTime::now() } },
            )
            .session(&mut *session)
            .await?;
    }
    Ok(())
}

/// Counter adjustments for a sale appearing (`prev = None`), disappearing
/// (`next = None`), or changing status. `total_sales` counts every live
/// sale including canceled ones; open/closed track their statuses.
fn stats_deltas(
    prev: Option<SaleStatus>,
    next: Option<SaleStatus>,
) -> Vec<(&'static str, i64)> {
    let mut deltas: Vec<(&'static str, i64)> = Vec::new();
    match (prev, next) {
        (None, None) => {}
        (None, Some(status)) => {
            deltas.push(("stats.total_sales", 1));
            if let Some(field) = status.counter_field() {
                deltas.push((field, 1));
            }
        }
        (Some(status), None) => {
            deltas.push(("stats.total_sales", -1));
            if let Some(field) = status.counter_field() {
                deltas.push((field, -1));
            }
        }
        (Some(old), Some(new)) if old != new => {
            if let Some(field) = old.counter_field() {
                deltas.push((field, -1));
            }
            if let Some(field) = new.counter_field() {
                deltas.push((field, 1));
            }
        }
        (Some(_), Some(_)) => {}
    }
    deltas
}

async fn apply_stats_deltas(
    state: &AppState,
    session: &mut ClientSession,
    user_id: &ObjectId,
    deltas: &[(&'static str, i64)],
) -> AppResult<()> {
    if deltas.is_empty() {
        return Ok(());
    }
    let mut inc = mongodb::bson::Document::new();
    for (field, delta) in deltas {
        inc.insert(*field, Bson::Int64(*delta));
    }
    state
        .users
        .update_one(doc! { "_id": user_id }, doc! { "$inc": inc })
        .session(&mut *session)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(pid: ObjectId, qty: i64) -> SaleLine {
        SaleLine {
            product_id: Some(pid),
            name: "p".into(),
            price: 1.0,
            quantity: qty,
        }
    }

    #[test]
    fn cancel_credits_previous_lines() {
        let a = ObjectId::new();
        let prev = vec![line(a, 3)];
        let deltas = stock_deltas(SaleStatus::Open, &prev, SaleStatus::Canceled, &prev);
        assert_eq!(deltas.get(&a), Some(&3));
    }

    #[test]
    fn reopen_debits_new_lines() {
        let a = ObjectId::new();
        let next = vec![line(a, 2)];
        let deltas = stock_deltas(SaleStatus::Canceled, &next, SaleStatus::Open, &next);
        assert_eq!(deltas.get(&a), Some(&-2));
    }

    #[test]
    fn open_closed_transition_leaves_stock_untouched() {
        let a = ObjectId::new();
        let lines = vec![line(a, 5)];
        let deltas = stock_deltas(SaleStatus::Open, &lines, SaleStatus::Closed, &lines);
        assert!(deltas.is_empty());
    }

    #[test]
    fn line_edit_rederives_net_delta() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let prev = vec![line(a, 3), line(b, 1)];
        let next = vec![line(a, 1)];
        let deltas = stock_deltas(SaleStatus::Open, &prev, SaleStatus::Open, &next);
        assert_eq!(deltas.get(&a), Some(&2)); // 3 returned, 1 taken
        assert_eq!(deltas.get(&b), Some(&1));
    }

    #[test]
    fn duplicate_lines_aggregate_per_product() {
        let a = ObjectId::new();
        let deltas = debit_deltas(&[line(a, 2), line(a, 3)]);
        assert_eq!(deltas.get(&a), Some(&-5));
    }

    #[test]
    fn legacy_lines_without_product_refs_are_skipped() {
        let mut orphan = line(ObjectId::new(), 4);
        orphan.product_id = None;
        assert!(credit_deltas(&[orphan]).is_empty());
    }

    #[test]
    fn create_bumps_total_and_status_counter() {
        let deltas = stats_deltas(None, Some(SaleStatus::Open));
        assert_eq!(
            deltas,
            vec![("stats.total_sales", 1), ("stats.open_sales", 1)]
        );
    }

    #[test]
    fn create_canceled_only_bumps_total() {
        let deltas = stats_deltas(None, Some(SaleStatus::Canceled));
        assert_eq!(deltas, vec![("stats.total_sales", 1)]);
    }

    #[test]
    fn status_change_swaps_counters_total_unchanged() {
        let deltas = stats_deltas(Some(SaleStatus::Open), Some(SaleStatus::Closed));
        assert_eq!(
            deltas,
            vec![("stats.open_sales", -1), ("stats.closed_sales", 1)]
        );
    }

    #[test]
    fn cancel_only_drops_open_counter() {
        let deltas = stats_deltas(Some(SaleStatus::Open), Some(SaleStatus::Canceled));
        assert_eq!(deltas, vec![("stats.open_sales", -1)]);
    }

    #[test]
    fn delete_drops_total_and_status_counter() {
        let deltas = stats_deltas(Some(SaleStatus::Closed), None);
        assert_eq!(
            deltas,
            vec![("stats.total_sales", -1), ("stats.closed_sales", -1)]
        );
    }

    #[test]
    fn unchanged_status_is_a_noop() {
        assert!(stats_deltas(Some(SaleStatus::Open), Some(SaleStatus::Open)).is_empty());
    }
}
