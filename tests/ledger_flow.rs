// End-to-end ledger behavior against a real MongoDB. Tests skip when no
// server is reachable, and the transactional ones additionally skip on
// servers without replica-set support.

use mongodb::bson::oid::ObjectId;

use lavka::error::AppError;
use lavka::models::SaleStatus;
use lavka::state::{
    AppState, LineInput, NewProduct, SaleDraft, SalePatch, create_product, create_sale,
    delete_sale, get_product_by_id, get_sale_by_id, get_user_by_id, list_sales,
    rebuild_sales_stats, update_sale,
};

#[path = "common/mod.rs"]
mod common;

async fn seed_product(state: &AppState, actor: &ObjectId, name: &str, stock: i64) -> ObjectId {
    create_product(
        state,
        actor,
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: 100.0,
            purchase_price: 60.0,
            stock,
            category: "misc".to_string(),
            image_url: None,
        },
    )
    .await
    .expect("failed to seed product")
    .id
    .expect("seeded product has no id")
}

async fn stock_of(state: &AppState, id: &ObjectId) -> i64 {
    get_product_by_id(state, id)
        .await
        .unwrap()
        .expect("product missing")
        .stock
}

async fn stats_of(state: &AppState, id: &ObjectId) -> (i64, i64, i64) {
    let user = get_user_by_id(state, id).await.unwrap().expect("user missing");
    (
        user.stats.total_sales,
        user.stats.open_sales,
        user.stats.closed_sales,
    )
}

fn one_line(product_id: ObjectId, quantity: i64) -> Vec<LineInput> {
    vec![LineInput {
        product_id,
        quantity,
    }]
}

fn draft(lines: Vec<LineInput>, status: SaleStatus) -> SaleDraft {
    SaleDraft {
        lines,
        client_name: "Ivan".to_string(),
        client_phone: String::new(),
        client_email: String::new(),
        status,
    }
}

#[tokio::test]
async fn open_sale_lifecycle_keeps_stock_and_counters_consistent() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "seller@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Notebook", 5).await;

    // Create open with quantity 3: stock 5 -> 2, total/open +1.
    let sale = create_sale(&state, &seller_id, draft(one_line(product, 3), SaleStatus::Open))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, &product).await, 2);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 1, 0));
    assert_eq!(sale.products[0].name, "Notebook");
    assert_eq!(sale.products[0].price, 100.0);

    // Cancel: pre-transition lines credited back, open -1, total unchanged.
    let sale_id = sale.id.unwrap();
    update_sale(
        &state,
        &seller_id,
        &sale_id,
        SalePatch {
            status: Some(SaleStatus::Canceled),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&state, &product).await, 5);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 0, 0));

    // Oversized follow-up sale is rejected whole; nothing moves and no
    // income document is written.
    let err = create_sale(&state, &seller_id, draft(one_line(product, 6), SaleStatus::Open))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 5, .. }));
    assert_eq!(stock_of(&state, &product).await, 5);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 0, 0));
    let (_, total) = list_sales(&state, 10, None).await.unwrap();
    assert_eq!(total, 1);

    // A corrected retry succeeds exactly once.
    create_sale(&state, &seller_id, draft(one_line(product, 5), SaleStatus::Open))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, &product).await, 0);
    assert_eq!(stats_of(&state, &seller_id).await, (2, 1, 0));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn closing_a_sale_swaps_counters_without_touching_stock() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "closer@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Mug", 10).await;

    let sale = create_sale(&state, &seller_id, draft(one_line(product, 4), SaleStatus::Open))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, &product).await, 6);

    update_sale(
        &state,
        &seller_id,
        &sale.id.unwrap(),
        SalePatch {
            status: Some(SaleStatus::Closed),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&state, &product).await, 6);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 0, 1));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn editing_lines_applies_only_the_net_stock_difference() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "editor@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Pen", 10).await;

    let sale = create_sale(&state, &seller_id, draft(one_line(product, 3), SaleStatus::Open))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, &product).await, 7);

    // 3 -> 1: two units come back.
    update_sale(
        &state,
        &seller_id,
        &sale.id.unwrap(),
        SalePatch {
            lines: Some(one_line(product, 1)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&state, &product).await, 9);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 1, 0));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn deleting_sales_restores_stock_only_for_open_ones() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "remover@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Lamp", 10).await;

    let open = create_sale(&state, &seller_id, draft(one_line(product, 2), SaleStatus::Open))
        .await
        .unwrap();
    let closed = create_sale(&state, &seller_id, draft(one_line(product, 3), SaleStatus::Closed))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, &product).await, 5);
    assert_eq!(stats_of(&state, &seller_id).await, (2, 1, 1));

    delete_sale(&state, &open.id.unwrap()).await.unwrap();
    assert_eq!(stock_of(&state, &product).await, 7);
    assert_eq!(stats_of(&state, &seller_id).await, (1, 0, 1));

    delete_sale(&state, &closed.id.unwrap()).await.unwrap();
    assert_eq!(stock_of(&state, &product).await, 7);
    assert_eq!(stats_of(&state, &seller_id).await, (0, 0, 0));
    assert!(
        get_sale_by_id(&state, &closed.id.unwrap())
            .await
            .unwrap()
            .is_none()
    );

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn listing_pages_newest_first_with_total() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "lister@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Sticker", 100).await;

    for _ in 0..5 {
        create_sale(&state, &seller_id, draft(one_line(product, 1), SaleStatus::Closed))
            .await
            .unwrap();
    }

    let (first_page, total) = list_sales(&state, 2, None).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(total, 5);
    assert!(first_page[0].created_date >= first_page[1].created_date);

    let cursor = first_page.last().unwrap().created_date;
    let (second_page, _) = list_sales(&state, 10, Some(cursor)).await.unwrap();
    assert_eq!(second_page.len(), 3);
    assert!(second_page.iter().all(|s| s.created_date < cursor));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn rebuild_recovers_drifted_counters() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "auditor@example.com").await;
    let seller_id = seller.id.unwrap();
    let product = seed_product(&state, &seller_id, "Chair", 50).await;

    create_sale(&state, &seller_id, draft(one_line(product, 1), SaleStatus::Open))
        .await
        .unwrap();
    create_sale(&state, &seller_id, draft(one_line(product, 1), SaleStatus::Closed))
        .await
        .unwrap();

    // Simulate drift, then reconcile from the incomes collection.
    state
        .users
        .update_one(
            mongodb::bson::doc! { "_id": seller_id },
            mongodb::bson::doc! { "$set": { "stats.total_sales": 99, "stats.open_sales": 99 } },
        )
        .await
        .unwrap();

    let stats = rebuild_sales_stats(&state, &seller_id).await.unwrap();
    assert_eq!(stats.total_sales, 2);
    assert_eq!(stats.open_sales, 1);
    assert_eq!(stats.closed_sales, 1);
    assert_eq!(stats_of(&state, &seller_id).await, (2, 1, 1));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn sale_referencing_missing_product_is_rejected() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();
    if !common::transactions_supported(&state).await {
        common::teardown(Some(ctx)).await;
        return;
    }

    let seller = common::create_test_employee(&state, "ghost@example.com").await;
    let seller_id = seller.id.unwrap();

    let err = create_sale(
        &state,
        &seller_id,
        draft(one_line(ObjectId::new(), 1), SaleStatus::Open),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound { entity: "product" }));
    assert_eq!(stats_of(&state, &seller_id).await, (0, 0, 0));

    common::teardown(Some(ctx)).await;
}
