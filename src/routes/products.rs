// routes/products.rs
// Catalog CRUD.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::Product;
use crate::routes::{fmt_date, parse_object_id};
use crate::session::SessionUser;
use crate::state::{
    AppState, NewProduct, ProductPatch, create_product, delete_product, list_products,
    update_product,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub purchase_price: f64,
    pub stock: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Product> for ProductDto {
    fn from(p: &Product) -> Self {
        ProductDto {
            id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price,
            purchase_price: p.purchase_price,
            stock: p.stock,
            category: p.category.clone(),
            image_url: p.image_url.clone(),
            created_at: fmt_date(&p.created_at),
            updated_at: fmt_date(&p.updated_at),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub purchase_price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub purchase_price: Option<f64>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub clear_image: bool,
}

pub async fn products_index(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<ProductDto>>> {
    let products = list_products(&state).await?;
    Ok(Json(products.iter().map(ProductDto::from).collect()))
}

pub async fn products_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProductRequest>,
) -> AppResult<Json<ProductDto>> {
    let product = create_product(
        &state,
        session.user_id(),
        NewProduct {
            name: body.name,
            description: body.description,
            price: body.price,
            purchase_price: body.purchase_price,
            stock: body.stock,
            category: body.category,
            image_url: body.image_url,
        },
    )
    .await?;
    Ok(Json(ProductDto::from(&product)))
}

pub async fn products_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> AppResult<Json<ProductDto>> {
    let product_id = parse_object_id(&id, "product")?;
    let product = update_product(
        &state,
        session.user_id(),
        &product_id,
        ProductPatch {
            name: body.name,
            description: body.description,
            price: body.price,
            purchase_price: body.purchase_price,
            stock: body.stock,
            category: body.category,
            image_url: body.image_url,
            clear_image: body.clear_image,
        },
    )
    .await?;
    Ok(Json(ProductDto::from(&product)))
}

pub async fn products_delete(
    _session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let product_id = parse_object_id(&id, "product")?;
    delete_product(&state, &product_id).await?;
    Ok(Json(json!({ "ok": true })))
}
