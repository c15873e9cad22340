use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{
        AddToCartRequest, MAX_LINE_QUANTITY, UpdateCartItemRequest, add_quantity, cap_quantity,
        parse_quantity,
    },
    entity::{
        cart_items::{ActiveModel as ItemActive, Column as ItemCol, Entity as CartItems, Model as ItemModel},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLine},
    response::{ApiResponse, Meta},
    services::product_service::to_products,
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => build_cart(&state.orm, cart).await?,
        None => Cart::empty(user.user_id),
    };
    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    let product_id = payload
        .product_id
        .ok_or_else(|| AppError::bad_request("productId required"))?;
    let qty = add_quantity(payload.quantity.as_ref());

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .filter(|p| !p.deleted)
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let cart = find_or_create_cart(&state.orm, user.user_id).await?;
    let items = cart_items(&state.orm, cart.id).await?;

    match items.iter().find(|it| it.product_id == product_id) {
        Some(line) => {
            let quantity = (line.quantity + qty).min(MAX_LINE_QUANTITY);
            let mut active: ItemActive = line.clone().into();
            active.quantity = Set(quantity);
            active.price_at_add = Set(product.price);
            active.update(&state.orm).await?;
        }
        None => {
            let position = items.iter().map(|it| it.position + 1).max().unwrap_or(0);
            ItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                position: Set(position),
                quantity: Set(qty),
                price_at_add: Set(product.price),
            }
            .insert(&state.orm)
            .await?;
        }
    }

    let cart = touch(&state.orm, cart).await?;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        "carts",
        serde_json::json!({ "product_id": product_id, "quantity": qty }),
    )
    .await;

    Ok(ApiResponse::success("OK", build_cart(&state.orm, cart).await?, None))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let cart = find_cart(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;

    let line = CartItems::find()
        .filter(
            Condition::all()
                .add(ItemCol::CartId.eq(cart.id))
                .add(ItemCol::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found in cart"))?;

    // Zero, negative or unreadable quantities drop the line.
    match parse_quantity(payload.quantity.as_ref()).filter(|q| *q >= 1) {
        Some(quantity) => {
            let mut active: ItemActive = line.into();
            active.quantity = Set(cap_quantity(quantity));
            active.update(&state.orm).await?;
        }
        None => {
            CartItems::delete_by_id(line.id).exec(&state.orm).await?;
        }
    }

    let cart = touch(&state.orm, cart).await?;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        "carts",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", build_cart(&state.orm, cart).await?, None))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let cart = find_cart(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;

    CartItems::delete_many()
        .filter(
            Condition::all()
                .add(ItemCol::CartId.eq(cart.id))
                .add(ItemCol::ProductId.eq(product_id)),
        )
        .exec(&state.orm)
        .await?;

    let cart = touch(&state.orm, cart).await?;
    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "carts",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        build_cart(&state.orm, cart).await?,
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = find_or_create_cart(&state.orm, user.user_id).await?;
    CartItems::delete_many()
        .filter(ItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;
    let cart = touch(&state.orm, cart).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_clear",
        "carts",
        serde_json::json!({ "cart_id": cart.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        build_cart(&state.orm, cart).await?,
        Some(Meta::empty()),
    ))
}

async fn find_cart(orm: &DatabaseConnection, user_id: Uuid) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(orm)
        .await?)
}

async fn find_or_create_cart(orm: &DatabaseConnection, user_id: Uuid) -> AppResult<CartModel> {
    if let Some(cart) = find_cart(orm, user_id).await? {
        return Ok(cart);
    }

    let now = Utc::now();
    let created = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(orm)
    .await;

    match created {
        Ok(cart) => Ok(cart),
        // Lost a race against a concurrent request for the same user.
        Err(err) => match find_cart(orm, user_id).await? {
            Some(cart) => Ok(cart),
            None => Err(err.into()),
        },
    }
}

async fn cart_items(orm: &DatabaseConnection, cart_id: Uuid) -> AppResult<Vec<ItemModel>> {
    Ok(CartItems::find()
        .filter(ItemCol::CartId.eq(cart_id))
        .order_by_asc(ItemCol::Position)
        .all(orm)
        .await?)
}

async fn touch(orm: &DatabaseConnection, cart: CartModel) -> AppResult<CartModel> {
    let mut active: CartActive = cart.into();
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(orm).await?)
}

async fn build_cart(orm: &DatabaseConnection, cart: CartModel) -> AppResult<Cart> {
    let items = cart_items(orm, cart.id).await?;

    let product_ids: Vec<Uuid> = items.iter().map(|it| it.product_id).collect();
    let models = if product_ids.is_empty() {
        Vec::new()
    } else {
        Products::find()
            .filter(ProductCol::Id.is_in(product_ids))
            .all(orm)
            .await?
    };
    let mut products: HashMap<Uuid, _> = to_products(orm, models)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let total = items
        .iter()
        .map(|it| i64::from(it.quantity) * it.price_at_add)
        .sum();
    let lines = items
        .into_iter()
        .map(|it| CartLine {
            product_id: it.product_id,
            product: products.remove(&it.product_id),
            quantity: it.quantity,
            price_at_add: it.price_at_add,
        })
        .collect();

    Ok(Cart {
        id: Some(cart.id),
        user_id: cart.user_id,
        items: lines,
        total,
        updated_at: Some(cart.updated_at.with_timezone(&Utc)),
    })
}
