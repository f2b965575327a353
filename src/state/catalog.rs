use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};

use crate::cloudinary;
use crate::error::{AppError, AppResult};
use crate::models::Product;

use super::{AppState, DomainEvent, react};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub purchase_price: f64,
    pub stock: i64,
    pub category: String,
    pub image_url: Option<String>,
}

/// Patch for a product; `None` fields keep their previous values.
/// `clear_image` drops the image and deletes it from object storage.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub purchase_price: Option<f64>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub clear_image: bool,
}

pub async fn list_products(state: &AppState) -> AppResult<Vec<Product>> {
    let mut cursor = state.products.find(doc! {}).sort(doc! { "name": 1 }).await?;
    let mut items = Vec::new();
    while let Some(product) = cursor.try_next().await? {
        items.push(product);
    }
    Ok(items)
}

pub async fn get_product_by_id(state: &AppState, id: &ObjectId) -> AppResult<Option<Product>> {
    state
        .products
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_product(
    state: &AppState,
    actor: &ObjectId,
    input: NewProduct,
) -> AppResult<Product> {
    validate_product_fields(&input.name, input.price, input.purchase_price, input.stock)?;

    let now = DateTime::now();
    let mut product = Product {
        id: None,
        name: input.name.trim().to_string(),
        description: input.description.trim().to_string(),
        price: input.price,
        purchase_price: input.purchase_price,
        stock: input.stock,
        category: input.category.trim().to_string(),
        image_url: input.image_url,
        created_at: now,
        updated_at: now,
    };
    let res = state.products.insert_one(&product).await?;
    product.id = res.inserted_id.as_object_id();

    if let Some(id) = product.id {
        react(
            state,
            actor,
            DomainEvent::StockIncreased {
                product_id: id,
                product_name: product.name.clone(),
                added: product.stock,
                purchase_price: product.purchase_price,
            },
        )
        .await?;
    }

    Ok(product)
}

pub async fn update_product(
    state: &AppState,
    actor: &ObjectId,
    id: &ObjectId,
    patch: ProductPatch,
) -> AppResult<Product> {
    let existing = get_product_by_id(state, id)
        .await?
        .ok_or(AppError::NotFound { entity: "product" })?;

    let name = patch.name.unwrap_or(existing.name);
    let price = patch.price.unwrap_or(existing.price);
    let purchase_price = patch.purchase_price.unwrap_or(existing.purchase_price);
    let stock = patch.stock.unwrap_or(existing.stock);
    validate_product_fields(&name, price, purchase_price, stock)?;

    let image_url = if patch.clear_image {
        None
    } else {
        patch.image_url.clone().or(existing.image_url.clone())
    };

    // Replaced or cleared images are removed from object storage on a
    // best-effort basis; a failed deletion must not fail the edit.
    if let Some(old_url) = &existing.image_url {
        if image_url.as_deref() != Some(old_url.as_str()) {
            delete_image_best_effort(state, old_url).await;
        }
    }

    let updated_at = DateTime::now();
    state
        .products
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "name": &name,
                "description": patch.description.as_deref().unwrap_or(&existing.description),
                "price": price,
                "purchasePrice": purchase_price,
                "stock": stock,
                "category": patch.category.as_deref().unwrap_or(&existing.category),
                "imageUrl": image_url.clone(),
                "updatedAt": updated_at,
            } },
        )
        .await?;

    if stock > existing.stock {
        react(
            state,
            actor,
            DomainEvent::StockIncreased {
                product_id: *id,
                product_name: name.clone(),
                added: stock - existing.stock,
                purchase_price,
            },
        )
        .await?;
    }

    get_product_by_id(state, id)
        .await?
        .ok_or(AppError::NotFound { entity: "product" })
}

pub async fn delete_product(state: &AppState, id: &ObjectId) -> AppResult<()> {
    let existing = get_product_by_id(state, id)
        .await?
        .ok_or(AppError::NotFound { entity: "product" })?;

    if let Some(url) = &existing.image_url {
        delete_image_best_effort(state, url).await;
    }

    state.products.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

fn validate_product_fields(
    name: &str,
    price: f64,
    purchase_price: f64,
    stock: i64,
) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("product name is required"));
    }
    if price < 0.0 || purchase_price < 0.0 {
        return Err(AppError::validation("prices must not be negative"));
    }
    if stock < 0 {
        return Err(AppError::validation("stock must not be negative"));
    }
    Ok(())
}

async fn delete_image_best_effort(state: &AppState, url: &str) {
    let Some(config) = &state.cloudinary else {
        return;
    };
    let Some(public_id) = cloudinary::extract_public_id(url) else {
        return;
    };
    match cloudinary::destroy(&state.http, config, &public_id).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(%public_id, "object storage reported image not deleted"),
        Err(err) => tracing::warn!(%public_id, error = %err, "image deletion failed"),
    }
}
