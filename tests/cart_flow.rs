mod common;

use axum::http::StatusCode;
use livemart_api::{
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        products::{ProductForm, VisibilityRequest},
    },
    models::{Product, Role},
    services::{cart_service, product_service},
};
use serde_json::json;
use uuid::Uuid;

use common::{create_user, form, setup_state};

fn add(product_id: Uuid, quantity: serde_json::Value) -> AddToCartRequest {
    AddToCartRequest {
        product_id: Some(product_id),
        quantity: Some(quantity),
    }
}

fn set(quantity: serde_json::Value) -> UpdateCartItemRequest {
    UpdateCartItemRequest {
        quantity: Some(quantity),
    }
}

#[tokio::test]
async fn cart_merges_caps_and_totals() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let empty = cart_service::get_cart(&state, &customer).await?.data.unwrap();
    assert!(empty.id.is_none());
    assert!(empty.items.is_empty());
    assert_eq!(empty.total, 0);

    let milk: Product = product_service::create_product(&state, &retailer, form("Milk", 6800, 50), Vec::new())
        .await?
        .data
        .unwrap();
    let bread: Product = product_service::create_product(&state, &retailer, form("Bread", 5500, 50), Vec::new())
        .await?
        .data
        .unwrap();

    cart_service::add_to_cart(&state, &customer, add(milk.id, json!(2))).await?;
    cart_service::add_to_cart(&state, &customer, add(bread.id, json!("3 loaves"))).await?;
    let cart = cart_service::add_to_cart(&state, &customer, add(milk.id, json!(1)))
        .await?
        .data
        .unwrap();

    assert!(cart.id.is_some());
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].product_id, milk.id);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.items[1].product_id, bread.id);
    assert_eq!(cart.items[1].quantity, 3);
    assert_eq!(cart.items[0].product.as_ref().map(|p| p.title.as_str()), Some("Milk"));
    assert_eq!(cart.total, 3 * 6800 + 3 * 5500);

    let capped = cart_service::add_to_cart(&state, &customer, add(bread.id, json!(5000)))
        .await?
        .data
        .unwrap();
    assert_eq!(capped.items[1].quantity, 1000);

    // Junk quantities count as one.
    let junk = cart_service::add_to_cart(&state, &customer, add(milk.id, json!("lots")))
        .await?
        .data
        .unwrap();
    assert_eq!(junk.items[0].quantity, 4);
    Ok(())
}

#[tokio::test]
async fn price_snapshot_refreshes_only_on_add() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;
    let eggs = product_service::create_product(&state, &retailer, form("Eggs", 900, 30), Vec::new())
        .await?
        .data
        .unwrap();

    cart_service::add_to_cart(&state, &customer, add(eggs.id, json!(1))).await?;
    product_service::update_product(
        &state,
        &retailer,
        eggs.id,
        ProductForm {
            price: Some(1100),
            ..Default::default()
        },
        Vec::new(),
    )
    .await?;

    let updated = cart_service::update_item(&state, &customer, eggs.id, set(json!(2)))
        .await?
        .data
        .unwrap();
    assert_eq!(updated.items[0].price_at_add, 900);
    assert_eq!(updated.total, 1800);

    let readded = cart_service::add_to_cart(&state, &customer, add(eggs.id, json!(1)))
        .await?
        .data
        .unwrap();
    assert_eq!(readded.items[0].price_at_add, 1100);
    assert_eq!(readded.items[0].quantity, 3);
    assert_eq!(readded.total, 3300);
    Ok(())
}

#[tokio::test]
async fn update_remove_and_clear() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;
    let rice = product_service::create_product(&state, &retailer, form("Rice", 4000, 30), Vec::new())
        .await?
        .data
        .unwrap();
    let dal = product_service::create_product(&state, &retailer, form("Dal", 3000, 30), Vec::new())
        .await?
        .data
        .unwrap();

    let no_cart = cart_service::update_item(&state, &customer, rice.id, set(json!(2))).await;
    assert_eq!(no_cart.unwrap_err().status(), StatusCode::NOT_FOUND);
    let no_cart = cart_service::remove_item(&state, &customer, rice.id).await;
    assert_eq!(no_cart.unwrap_err().status(), StatusCode::NOT_FOUND);

    cart_service::add_to_cart(&state, &customer, add(rice.id, json!(1))).await?;
    cart_service::add_to_cart(&state, &customer, add(dal.id, json!(1))).await?;

    let missing = cart_service::update_item(&state, &customer, Uuid::new_v4(), set(json!(2))).await;
    assert_eq!(missing.unwrap_err().status(), StatusCode::NOT_FOUND);

    let string_qty = cart_service::update_item(&state, &customer, rice.id, set(json!("7")))
        .await?
        .data
        .unwrap();
    assert_eq!(string_qty.items[0].quantity, 7);

    // A digit run too long for an integer is capped, not treated as removal.
    let huge = cart_service::update_item(&state, &customer, rice.id, set(json!("99999999999999999999")))
        .await?
        .data
        .unwrap();
    assert_eq!(huge.items.len(), 2);
    assert_eq!(huge.items[0].quantity, 1000);

    let zero = cart_service::update_item(&state, &customer, rice.id, set(json!(0)))
        .await?
        .data
        .unwrap();
    assert_eq!(zero.items.len(), 1);
    assert_eq!(zero.items[0].product_id, dal.id);

    let removed = cart_service::remove_item(&state, &customer, dal.id)
        .await?
        .data
        .unwrap();
    assert!(removed.items.is_empty());

    cart_service::add_to_cart(&state, &customer, add(rice.id, json!(2))).await?;
    let cleared = cart_service::clear_cart(&state, &customer).await?;
    assert_eq!(cleared.message, "Cart cleared");
    let cleared = cleared.data.unwrap();
    assert!(cleared.items.is_empty());
    assert_eq!(cleared.total, 0);

    // Clearing without a cart still succeeds and leaves an empty one.
    let other = create_user(&state, Role::Customer, "other@example.com").await?;
    let fresh = cart_service::clear_cart(&state, &other).await?.data.unwrap();
    assert!(fresh.id.is_some());
    Ok(())
}

#[tokio::test]
async fn add_rejects_missing_and_deleted_products() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let no_id = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: None,
            quantity: Some(json!(1)),
        },
    )
    .await;
    assert_eq!(no_id.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let unknown = cart_service::add_to_cart(&state, &customer, add(Uuid::new_v4(), json!(1))).await;
    assert_eq!(unknown.unwrap_err().status(), StatusCode::NOT_FOUND);

    let gone = product_service::create_product(&state, &retailer, form("Gone", 100, 1), Vec::new())
        .await?
        .data
        .unwrap();
    product_service::set_visibility(&state, &retailer, gone.id, VisibilityRequest { visible: true })
        .await?;
    product_service::delete_product(&state, &retailer, gone.id).await?;

    let deleted = cart_service::add_to_cart(&state, &customer, add(gone.id, json!(1))).await;
    assert_eq!(deleted.unwrap_err().status(), StatusCode::NOT_FOUND);
    Ok(())
}
