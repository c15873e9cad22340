mod common;

use axum::http::StatusCode;
use livemart_api::{
    dto::products::{ApprovalRequest, NearbyQuery, ProductForm, ProductListQuery, VisibilityRequest},
    entity::products::Entity as Products,
    middleware::auth::AuthUser,
    models::{AddedBy, Product, ProductStatus, Role},
    services::{product_service, upload_service::ImageUpload},
    state::AppState,
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use uuid::Uuid;

use common::{create_user, create_user_at, form, setup_state};

fn view(name: &str) -> ProductListQuery {
    ProductListQuery {
        view: Some(name.to_string()),
        ..Default::default()
    }
}

async fn listed(state: &AppState, user: &AuthUser, query: ProductListQuery) -> Vec<Uuid> {
    product_service::list_products(state, user, query)
        .await
        .unwrap()
        .data
        .unwrap()
        .items
        .into_iter()
        .map(|p| p.id)
        .collect()
}

async fn create(state: &AppState, user: &AuthUser, form: ProductForm) -> Product {
    product_service::create_product(state, user, form, Vec::new())
        .await
        .unwrap()
        .data
        .unwrap()
}

fn approve(visible: Option<bool>) -> ApprovalRequest {
    ApprovalRequest {
        action: Some("approve".into()),
        price: None,
        quantity: None,
        visible_to_customer: visible,
    }
}

#[tokio::test]
async fn wholesaler_product_is_approved_by_retailer() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let product = create(&state, &wholesaler, form("Rice 25kg", 180000, 40)).await;
    assert_eq!(product.added_by, AddedBy::Wholesaler);
    assert_eq!(product.status, ProductStatus::Pending);
    assert_eq!(product.owner, wholesaler.user_id);
    assert_eq!(product.source_wholesaler, Some(wholesaler.user_id));
    assert!(!product.visible_to_customer);

    assert!(listed(&state, &wholesaler, view("wholesaler")).await.contains(&product.id));
    assert!(listed(&state, &retailer, view("retailer")).await.contains(&product.id));
    assert!(!listed(&state, &customer, view("customer")).await.contains(&product.id));

    let reviewed = product_service::update_approval(
        &state,
        &retailer,
        product.id,
        ApprovalRequest {
            price: Some(195000),
            ..approve(Some(true))
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(reviewed.status, ProductStatus::Approved);
    assert_eq!(reviewed.owner, retailer.user_id);
    assert_eq!(reviewed.source_wholesaler, Some(wholesaler.user_id));
    assert_eq!(reviewed.price, 195000);
    assert_eq!(reviewed.quantity, 40);
    assert!(reviewed.visible_to_customer);

    // Still tracked by the wholesaler who supplied it.
    assert!(listed(&state, &wholesaler, view("wholesaler")).await.contains(&product.id));
    assert!(listed(&state, &retailer, view("retailer")).await.contains(&product.id));
    assert!(listed(&state, &customer, view("customer")).await.contains(&product.id));

    let again = product_service::update_approval(&state, &retailer, product.id, approve(None))
        .await
        .unwrap_err();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn approval_without_visibility_stays_hidden() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let product = create(&state, &wholesaler, form("Oil 15L", 210000, 10)).await;
    let reviewed = product_service::update_approval(&state, &retailer, product.id, approve(None))
        .await?
        .data
        .unwrap();
    assert!(!reviewed.visible_to_customer);
    assert!(!listed(&state, &customer, view("customer")).await.contains(&product.id));

    product_service::set_visibility(
        &state,
        &retailer,
        product.id,
        VisibilityRequest { visible: true },
    )
    .await?;
    assert!(listed(&state, &customer, view("customer")).await.contains(&product.id));
    Ok(())
}

#[tokio::test]
async fn rejected_product_leaves_the_review_queue() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;

    let product = create(&state, &wholesaler, form("Onions", 3000, 100)).await;
    let rejected = product_service::update_approval(
        &state,
        &retailer,
        product.id,
        ApprovalRequest {
            action: Some("REJECT".into()),
            ..approve(Some(true))
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(rejected.status, ProductStatus::Rejected);
    assert_eq!(rejected.owner, wholesaler.user_id);
    assert!(!rejected.visible_to_customer);
    assert!(!listed(&state, &retailer, view("retailer")).await.contains(&product.id));
    assert!(listed(&state, &wholesaler, view("wholesaler")).await.contains(&product.id));
    Ok(())
}

#[tokio::test]
async fn review_guards_roles_actions_and_origin() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let pending = create(&state, &wholesaler, form("Wheat", 5000, 20)).await;
    let own = create(&state, &retailer, form("Milk", 6800, 12)).await;
    assert_eq!(own.status, ProductStatus::Approved);
    assert_eq!(own.source_wholesaler, None);
    assert!(!own.visible_to_customer);

    let by_wholesaler =
        product_service::update_approval(&state, &wholesaler, pending.id, approve(None)).await;
    assert_eq!(by_wholesaler.unwrap_err().status(), StatusCode::FORBIDDEN);

    let bad_action = product_service::update_approval(
        &state,
        &retailer,
        pending.id,
        ApprovalRequest {
            action: Some("maybe".into()),
            ..approve(None)
        },
    )
    .await;
    assert_eq!(bad_action.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let retailer_added =
        product_service::update_approval(&state, &retailer, own.id, approve(None)).await;
    assert_eq!(retailer_added.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let missing =
        product_service::update_approval(&state, &retailer, Uuid::new_v4(), approve(None)).await;
    assert_eq!(missing.unwrap_err().status(), StatusCode::NOT_FOUND);

    let create_as_customer =
        product_service::create_product(&state, &customer, form("Apples", 100, 1), Vec::new())
            .await;
    assert_eq!(create_as_customer.unwrap_err().status(), StatusCode::FORBIDDEN);

    let negative = product_service::create_product(&state, &retailer, form("Pears", -1, 1), Vec::new())
        .await;
    assert_eq!(negative.unwrap_err().status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn listing_requires_a_known_view() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let missing = product_service::list_products(&state, &customer, ProductListQuery::default()).await;
    assert_eq!(missing.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let unknown = product_service::list_products(&state, &customer, view("admin")).await;
    assert_eq!(unknown.unwrap_err().status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn wholesaler_view_never_shows_retailer_items() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let other = create_user(&state, Role::Wholesaler, "w2@example.com").await?;

    let mine = create(&state, &wholesaler, form("Lentils", 9000, 30)).await;
    let theirs = create(&state, &other, form("Chickpeas", 8000, 30)).await;
    let retail = create(&state, &retailer, form("Bread", 5500, 10)).await;

    let seen = listed(&state, &wholesaler, view("wholesaler")).await;
    assert!(seen.contains(&mine.id));
    assert!(!seen.contains(&theirs.id));
    assert!(!seen.contains(&retail.id));

    // Retailers see every pending wholesaler item plus their own.
    let queue = listed(&state, &retailer, view("retailer")).await;
    assert!(queue.contains(&mine.id));
    assert!(queue.contains(&theirs.id));
    assert!(queue.contains(&retail.id));
    Ok(())
}

#[tokio::test]
async fn only_owner_edits_and_source_can_delete() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let wholesaler = create_user(&state, Role::Wholesaler, "w@example.com").await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let stranger = create_user(&state, Role::Retailer, "s@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let product = create(&state, &wholesaler, form("Sugar", 4200, 50)).await;
    product_service::update_approval(&state, &retailer, product.id, approve(Some(true))).await?;

    // Ownership moved to the retailer on approval.
    let by_wholesaler = product_service::update_product(
        &state,
        &wholesaler,
        product.id,
        ProductForm::default(),
        Vec::new(),
    )
    .await;
    assert_eq!(by_wholesaler.unwrap_err().status(), StatusCode::FORBIDDEN);

    let edited = product_service::update_product(
        &state,
        &retailer,
        product.id,
        ProductForm {
            title: Some("Cane Sugar".into()),
            quantity: Some(45),
            ..Default::default()
        },
        Vec::new(),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(edited.title, "Cane Sugar");
    assert_eq!(edited.quantity, 45);
    assert_eq!(edited.price, 4200);

    let hide = product_service::set_visibility(
        &state,
        &stranger,
        product.id,
        VisibilityRequest { visible: false },
    )
    .await;
    assert_eq!(hide.unwrap_err().status(), StatusCode::FORBIDDEN);

    let delete = product_service::delete_product(&state, &stranger, product.id).await;
    assert_eq!(delete.unwrap_err().status(), StatusCode::FORBIDDEN);

    let deleted = product_service::delete_product(&state, &wholesaler, product.id).await?;
    assert_eq!(deleted.message, "Deleted");

    assert!(!listed(&state, &customer, view("customer")).await.contains(&product.id));
    assert!(!listed(&state, &retailer, view("retailer")).await.contains(&product.id));
    assert!(!listed(&state, &wholesaler, view("wholesaler")).await.contains(&product.id));

    let fetched = product_service::get_product(&state, product.id).await?.data.unwrap();
    assert!(fetched.deleted);
    Ok(())
}

#[tokio::test]
async fn customer_search_filters_the_storefront() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let customer = create_user(&state, Role::Customer, "c@example.com").await?;

    let mut ids = Vec::new();
    for (title, price, quantity) in [("Green Apples", 300, 10), ("Red Apples", 900, 0), ("Bananas", 150, 5)] {
        let product = create(&state, &retailer, form(title, price, quantity)).await;
        product_service::set_visibility(&state, &retailer, product.id, VisibilityRequest { visible: true })
            .await?;
        ids.push(product.id);
    }

    let apples = listed(
        &state,
        &customer,
        ProductListQuery {
            q: Some("APPLE".into()),
            ..view("customer")
        },
    )
    .await;
    assert_eq!(apples.len(), 2);
    assert!(!apples.contains(&ids[2]));

    let cheap_in_stock = listed(
        &state,
        &customer,
        ProductListQuery {
            max_price: Some(500),
            in_stock: Some(true),
            ..view("customer")
        },
    )
    .await;
    assert_eq!(cheap_in_stock.len(), 2);
    assert!(cheap_in_stock.contains(&ids[0]));
    assert!(cheap_in_stock.contains(&ids[2]));

    let inverted = product_service::list_products(
        &state,
        &customer,
        ProductListQuery {
            min_price: Some(500),
            max_price: Some(100),
            ..view("customer")
        },
    )
    .await;
    assert_eq!(inverted.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let page = product_service::list_products(
        &state,
        &customer,
        ProductListQuery {
            per_page: Some(2),
            ..view("customer")
        },
    )
    .await?;
    let meta = page.meta.unwrap();
    assert_eq!(meta.total, Some(3));
    assert_eq!(meta.total_pages, Some(2));
    assert_eq!(page.data.unwrap().items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn nearby_uses_owner_location() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let near = create_user_at(&state, Role::Retailer, "near@example.com", Some((12.9716, 77.5946))).await?;
    let far = create_user_at(&state, Role::Retailer, "far@example.com", Some((19.0760, 72.8777))).await?;

    let close = create(&state, &near, form("Tomatoes", 2500, 20)).await;
    let distant = create(&state, &far, form("Potatoes", 2000, 20)).await;
    for (owner, id) in [(&near, close.id), (&far, distant.id)] {
        product_service::set_visibility(&state, owner, id, VisibilityRequest { visible: true }).await?;
    }

    let found: Vec<Uuid> = product_service::nearby_products(
        &state,
        NearbyQuery {
            lat: Some(12.9352),
            lng: Some(77.6245),
            max_distance_km: Some(10.0),
        },
    )
    .await?
    .data
    .unwrap()
    .items
    .into_iter()
    .map(|p| p.id)
    .collect();
    assert_eq!(found, vec![close.id]);

    let missing = product_service::nearby_products(
        &state,
        NearbyQuery {
            lat: Some(12.9),
            lng: None,
            max_distance_km: Some(5.0),
        },
    )
    .await;
    assert_eq!(missing.unwrap_err().status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn images_are_stored_and_appended_in_order() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    let image = |name: &str| ImageUpload {
        file_name: Some(name.to_string()),
        content_type: Some("image/png".to_string()),
        bytes: vec![1, 2, 3],
    };

    let product = product_service::create_product(
        &state,
        &retailer,
        form("Grapes", 7000, 8),
        vec![image("a.png"), image("b.png")],
    )
    .await?
    .data
    .unwrap();
    assert_eq!(product.images.len(), 2);
    for url in &product.images {
        let name = url.strip_prefix("/uploads/").unwrap();
        assert!(std::path::Path::new(&state.config.upload_dir).join(name).exists());
    }

    let updated = product_service::update_product(
        &state,
        &retailer,
        product.id,
        ProductForm::default(),
        vec![image("c.png")],
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.images.len(), 3);
    assert_eq!(updated.images[..2], product.images[..]);

    let not_an_image = ImageUpload {
        content_type: Some("text/plain".into()),
        ..image("notes.txt")
    };
    let rejected =
        product_service::create_product(&state, &retailer, form("Figs", 100, 1), vec![not_an_image])
            .await;
    assert_eq!(rejected.unwrap_err().status(), StatusCode::BAD_REQUEST);

    let _ = std::fs::remove_dir_all(&state.config.upload_dir);
    Ok(())
}

#[tokio::test]
async fn failed_save_leaves_no_files_or_rows() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let retailer = create_user(&state, Role::Retailer, "r@example.com").await?;
    state.orm.execute_unprepared("DROP TABLE product_images").await?;

    let image = ImageUpload {
        file_name: Some("pear.png".into()),
        content_type: Some("image/png".into()),
        bytes: vec![7; 4],
    };
    let failed =
        product_service::create_product(&state, &retailer, form("Pears", 500, 3), vec![image]).await;
    assert_eq!(failed.unwrap_err().status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(Products::find().count(&state.orm).await?, 0);
    let leftover = std::fs::read_dir(&state.config.upload_dir)?.count();
    assert_eq!(leftover, 0);

    let _ = std::fs::remove_dir_all(&state.config.upload_dir);
    Ok(())
}
