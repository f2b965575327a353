// routes/sales.rs
// Sale (income) endpoints; all mutations go through the ledger so stock
// and per-user counters stay consistent.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{Sale, SaleLine, SaleStatus};
use crate::routes::{fmt_date, parse_object_id};
use crate::session::SessionUser;
use crate::state::{
    AppState, DEFAULT_PAGE_SIZE, LineInput, SaleDraft, SalePatch, create_sale, delete_sale,
    get_sale_by_id, list_sales, update_sale,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineDto {
    pub product_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub id: String,
    pub products: Vec<SaleLineDto>,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub status: String,
    pub total: f64,
    pub created_date: String,
    pub created_by: Option<String>,
    pub created_by_name: String,
    pub last_edited_by: Option<String>,
    pub last_edited_by_name: String,
    pub last_edited_date: String,
}

impl From<&Sale> for SaleDto {
    fn from(sale: &Sale) -> Self {
        SaleDto {
            id: sale.id.map(|id| id.to_hex()).unwrap_or_default(),
            products: sale.products.iter().map(line_dto).collect(),
            client_name: sale.client_name.clone(),
            client_phone: sale.client_phone.clone(),
            client_email: sale.client_email.clone(),
            status: sale.status.as_str().to_string(),
            total: sale.total(),
            created_date: fmt_date(&sale.created_date),
            created_by: sale.created_by.map(|id| id.to_hex()),
            created_by_name: sale.created_by_name.clone(),
            last_edited_by: sale.last_edited_by.map(|id| id.to_hex()),
            last_edited_by_name: sale.last_edited_by_name.clone(),
            last_edited_date: fmt_date(&sale.last_edited_date),
        }
    }
}

fn line_dto(line: &SaleLine) -> SaleLineDto {
    SaleLineDto {
        product_id: line.product_id.map(|id| id.to_hex()),
        name: line.name.clone(),
        price: line.price,
        quantity: line.quantity,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub products: Vec<LineRequest>,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    pub products: Option<Vec<LineRequest>>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct SalesQuery {
    pub limit: Option<i64>,
    /// RFC 3339 cursor; returns sales strictly older than it.
    pub before: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPage {
    pub items: Vec<SaleDto>,
    pub total: u64,
    pub has_more: bool,
}

pub async fn sales_index(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SalesQuery>,
) -> AppResult<Json<SalesPage>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 200);
    let before = match &query.before {
        Some(raw) => Some(
            DateTime::parse_rfc3339_str(raw)
                .map_err(|_| AppError::validation("invalid before cursor"))?,
        ),
        None => None,
    };

    let (items, total) = list_sales(&state, limit, before).await?;
    // A full page is taken as "more exists". When the record count is an
    // exact multiple of the page size this over-reports once and the
    // follow-up fetch comes back empty.
    let has_more = items.len() as i64 == limit;
    Ok(Json(SalesPage {
        items: items.iter().map(SaleDto::from).collect(),
        total,
        has_more,
    }))
}

pub async fn sales_show(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<SaleDto>> {
    let sale_id = parse_object_id(&id, "sale")?;
    let sale = get_sale_by_id(&state, &sale_id)
        .await?
        .ok_or(AppError::NotFound { entity: "sale" })?;
    Ok(Json(SaleDto::from(&sale)))
}

pub async fn sales_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSaleRequest>,
) -> AppResult<Json<SaleDto>> {
    let status = parse_status(body.status.as_deref())?.unwrap_or_default();
    let lines = parse_lines(&body.products)?;

    let sale = create_sale(
        &state,
        session.user_id(),
        SaleDraft {
            lines,
            client_name: body.client_name.trim().to_string(),
            client_phone: body.client_phone.trim().to_string(),
            client_email: body.client_email.trim().to_string(),
            status,
        },
    )
    .await?;
    Ok(Json(SaleDto::from(&sale)))
}

pub async fn sales_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSaleRequest>,
) -> AppResult<Json<SaleDto>> {
    let sale_id = parse_object_id(&id, "sale")?;
    let lines = match &body.products {
        Some(lines) => Some(parse_lines(lines)?),
        None => None,
    };

    let sale = update_sale(
        &state,
        session.user_id(),
        &sale_id,
        SalePatch {
            lines,
            client_name: body.client_name,
            client_phone: body.client_phone,
            client_email: body.client_email,
            status: parse_status(body.status.as_deref())?,
        },
    )
    .await?;
    Ok(Json(SaleDto::from(&sale)))
}

pub async fn sales_delete(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let sale_id = parse_object_id(&id, "sale")?;
    delete_sale(&state, &sale_id).await?;
    Ok(Json(json!({ "ok": true })))
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<SaleStatus>> {
    match raw {
        None => Ok(None),
        Some(value) => SaleStatus::parse(value)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("unknown sale status \"{value}\""))),
    }
}

fn parse_lines(lines: &[LineRequest]) -> AppResult<Vec<LineInput>> {
    lines
        .iter()
        .map(|l| {
            Ok(LineInput {
                product_id: parse_object_id(&l.product_id, "product")?,
                quantity: l.quantity,
            })
        })
        .collect()
}
