use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use sea_orm::sea_query::{Expr, Func};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ApprovalRequest, NearbyQuery, ProductForm, ProductList, ProductListQuery, VisibilityRequest},
    entity::{
        product_images::{ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    geo::GeoPoint,
    middleware::auth::AuthUser,
    models::{AddedBy, Product, ProductStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::upload_service::{self, ImageUpload},
    state::AppState,
    workflow::{self, ApprovalAction, ApprovalDecision, WorkflowState},
};

/// Which dashboard a listing is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingView {
    Wholesaler,
    Retailer,
    Customer,
}

impl ListingView {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            None | Some("") => Err(AppError::bad_request("view query param required")),
            Some("wholesaler") => Ok(ListingView::Wholesaler),
            Some("retailer") => Ok(ListingView::Retailer),
            Some("customer") => Ok(ListingView::Customer),
            Some(_) => Err(AppError::bad_request("invalid view param")),
        }
    }

    pub fn condition(&self, user_id: Uuid) -> Condition {
        let live = Condition::all().add(Column::Deleted.eq(false));
        match self {
            // Never includes retailer-added items, even ones the wholesaler somehow owns.
            ListingView::Wholesaler => live
                .add(Column::AddedBy.ne(AddedBy::Retailer.as_str()))
                .add(
                    Condition::any()
                        .add(Column::SourceWholesaler.eq(user_id))
                        .add(Column::Owner.eq(user_id)),
                ),
            ListingView::Retailer => live.add(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(Column::AddedBy.eq(AddedBy::Wholesaler.as_str()))
                            .add(Column::Status.eq(ProductStatus::Pending.as_str())),
                    )
                    .add(Column::Owner.eq(user_id)),
            ),
            ListingView::Customer => customer_visible(),
        }
    }
}

/// Approved, published and not deleted.
pub fn customer_visible() -> Condition {
    Condition::all()
        .add(Column::Deleted.eq(false))
        .add(Column::Status.eq(ProductStatus::Approved.as_str()))
        .add(Column::VisibleToCustomer.eq(true))
}

fn search_condition(query: &ProductListQuery) -> AppResult<Condition> {
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(Column::Title))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Description))).like(pattern)),
        );
    }
    if let Some(category) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category));
    }
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::bad_request("min_price must not exceed max_price"));
        }
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }
    match query.in_stock {
        Some(true) => condition = condition.add(Column::Quantity.gt(0)),
        Some(false) => condition = condition.add(Column::Quantity.lte(0)),
        None => {}
    }
    Ok(condition)
}

pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductListQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let view = ListingView::parse(query.view.as_deref())?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = view.condition(user.user_id);
    if view == ListingView::Customer {
        condition = condition.add(search_condition(&query)?);
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = to_products(&state.orm, models).await?;

    Ok(ApiResponse::paged("Products", ProductList { items }, page, limit, total))
}

pub async fn nearby_products(
    state: &AppState,
    query: NearbyQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (Some(lat), Some(lng), Some(max_distance)) = (query.lat, query.lng, query.max_distance_km)
    else {
        return Err(AppError::bad_request("Missing lat, lng or max_distance_km"));
    };
    let origin = GeoPoint::new(lat, lng);
    if !origin.is_valid() || max_distance < 0.0 {
        return Err(AppError::bad_request("Invalid coordinates or distance"));
    }

    let models = Products::find()
        .filter(customer_visible())
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut owner_ids: Vec<Uuid> = models.iter().map(|p| p.owner).collect();
    owner_ids.sort();
    owner_ids.dedup();

    let owner_points: HashMap<Uuid, GeoPoint> = Users::find()
        .filter(UserCol::Id.is_in(owner_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|u| Some((u.id, GeoPoint::new(u.lat?, u.lng?))))
        .collect();

    let nearby: Vec<ProductModel> = models
        .into_iter()
        .filter(|p| {
            owner_points
                .get(&p.owner)
                .is_some_and(|point| origin.distance_km(point) <= max_distance)
        })
        .collect();

    let total = nearby.len() as i64;
    let items = to_products(&state.orm, nearby).await?;
    Ok(ApiResponse::paged("Nearby products", ProductList { items }, 1, total, total))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = find_product(&state.orm, id).await?;
    let product = with_images(&state.orm, model).await?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: ProductForm,
    images: Vec<ImageUpload>,
) -> AppResult<ApiResponse<Product>> {
    let init = workflow::initial_state(user.user_id, user.role)?;

    let title = form
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("title required"))?;
    let price = workflow::validate_price(form.price.unwrap_or(0))?;
    let quantity = workflow::validate_quantity(form.quantity.unwrap_or(0))?;
    upload_service::validate(&images)?;

    let urls = upload_service::store_images(&state.config.upload_dir, images).await?;

    let now = Utc::now();
    let row = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        description: Set(form.description.unwrap_or_default()),
        price: Set(price),
        quantity: Set(quantity),
        category: Set(form.category.unwrap_or_default()),
        added_by: Set(init.added_by.as_str().to_string()),
        source_wholesaler: Set(init.source_wholesaler),
        owner: Set(init.owner),
        status: Set(init.status.as_str().to_string()),
        visible_to_customer: Set(init.visible_to_customer),
        deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let product = match insert_with_images(&state.orm, row, &urls).await {
        Ok(product) => product,
        Err(err) => {
            upload_service::remove_images(&state.config.upload_dir, &urls).await;
            return Err(err);
        }
    };

    tracing::info!(product_id = %product.id, added_by = %init.added_by, status = %init.status, "product created");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "status": init.status.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product, urls)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_approval(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ApprovalRequest,
) -> AppResult<ApiResponse<Product>> {
    workflow::ensure_reviewer(user.role)?;
    let existing = find_product(&state.orm, id).await?;
    let current = workflow_state(&existing)?;

    if current.added_by != AddedBy::Wholesaler {
        return Err(AppError::bad_request(
            "Only wholesaler-added products require approval",
        ));
    }
    let decision = ApprovalDecision {
        action: payload.action.as_deref().unwrap_or_default().parse::<ApprovalAction>()?,
        price: payload.price,
        quantity: payload.quantity,
        visible_to_customer: payload.visible_to_customer,
    };
    let next = workflow::review(&current, user.user_id, user.role, &decision)?;

    let mut active: ActiveModel = existing.into();
    active.status = Set(next.status.as_str().to_string());
    active.owner = Set(next.owner);
    active.visible_to_customer = Set(next.visible_to_customer);
    active.price = Set(next.price);
    active.quantity = Set(next.quantity);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    tracing::info!(product_id = %id, retailer = %user.user_id, action = %decision.action, "product reviewed");
    audit::record(
        &state.orm,
        Some(user.user_id),
        &format!("product_{}", decision.action),
        "products",
        serde_json::json!({
            "product_id": id,
            "previous_owner": current.owner,
            "owner": next.owner,
        }),
    )
    .await;

    let product = with_images(&state.orm, product).await?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: ProductForm,
    images: Vec<ImageUpload>,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_product(&state.orm, id).await?;
    if existing.owner != user.user_id {
        return Err(AppError::forbidden("Only owner can edit"));
    }
    upload_service::validate(&images)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = form.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        active.title = Set(title);
    }
    if let Some(description) = form.description {
        active.description = Set(description);
    }
    if let Some(price) = form.price {
        active.price = Set(workflow::validate_price(price)?);
    }
    if let Some(quantity) = form.quantity {
        active.quantity = Set(workflow::validate_quantity(quantity)?);
    }
    if let Some(category) = form.category {
        active.category = Set(category);
    }
    active.updated_at = Set(Utc::now().into());

    let urls = upload_service::store_images(&state.config.upload_dir, images).await?;
    let product = match update_with_images(&state.orm, active, &urls).await {
        Ok(product) => product,
        Err(err) => {
            upload_service::remove_images(&state.config.upload_dir, &urls).await;
            return Err(err);
        }
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": id, "images_added": urls.len() }),
    )
    .await;

    let product = with_images(&state.orm, product).await?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn set_visibility(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: VisibilityRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_product(&state.orm, id).await?;
    if existing.owner != user.user_id {
        return Err(AppError::forbidden("Only owner can change visibility"));
    }

    let mut active: ActiveModel = existing.into();
    active.visible_to_customer = Set(payload.visible);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_visibility",
        "products",
        serde_json::json!({ "product_id": id, "visible": payload.visible }),
    )
    .await;

    let product = with_images(&state.orm, product).await?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

/// Soft delete: the row stays for audit but drops out of every listing.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_product(&state.orm, id).await?;
    let is_owner = existing.owner == user.user_id;
    let is_source = existing.source_wholesaler == Some(user.user_id);
    if !is_owner && !is_source {
        return Err(AppError::forbidden(
            "Only owner or original wholesaler can delete",
        ));
    }

    let mut active: ActiveModel = existing.into();
    active.deleted = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_product(orm: &DatabaseConnection, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

/// Inserts the product and its image rows together.
async fn insert_with_images(
    orm: &DatabaseConnection,
    row: ActiveModel,
    urls: &[String],
) -> AppResult<ProductModel> {
    let txn = orm.begin().await?;
    let product = row.insert(&txn).await?;
    append_images(&txn, product.id, 0, urls).await?;
    txn.commit().await?;
    Ok(product)
}

/// Saves the edited fields and appends new images after the existing ones.
async fn update_with_images(
    orm: &DatabaseConnection,
    active: ActiveModel,
    urls: &[String],
) -> AppResult<ProductModel> {
    let txn = orm.begin().await?;
    let product = active.update(&txn).await?;
    if !urls.is_empty() {
        let next_position = ProductImages::find()
            .filter(ImageCol::ProductId.eq(product.id))
            .count(&txn)
            .await? as i32;
        append_images(&txn, product.id, next_position, urls).await?;
    }
    txn.commit().await?;
    Ok(product)
}

async fn append_images<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    start: i32,
    urls: &[String],
) -> AppResult<()> {
    if urls.is_empty() {
        return Ok(());
    }
    let rows = urls.iter().enumerate().map(|(i, url)| ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        position: Set(start + i as i32),
        url: Set(url.clone()),
    });
    ProductImages::insert_many(rows).exec(conn).await?;
    Ok(())
}

/// Image URLs per product, each list in upload order.
pub(crate) async fn load_images(
    orm: &DatabaseConnection,
    product_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<String>>> {
    let mut images: HashMap<Uuid, Vec<String>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(images);
    }
    let rows = ProductImages::find()
        .filter(ImageCol::ProductId.is_in(product_ids))
        .order_by_asc(ImageCol::ProductId)
        .order_by_asc(ImageCol::Position)
        .all(orm)
        .await?;
    for row in rows {
        images.entry(row.product_id).or_default().push(row.url);
    }
    Ok(images)
}

pub(crate) async fn to_products(
    orm: &DatabaseConnection,
    models: Vec<ProductModel>,
) -> AppResult<Vec<Product>> {
    let mut images = load_images(orm, models.iter().map(|m| m.id).collect()).await?;
    models
        .into_iter()
        .map(|model| {
            let urls = images.remove(&model.id).unwrap_or_default();
            product_from_entity(model, urls)
        })
        .collect()
}

async fn with_images(orm: &DatabaseConnection, model: ProductModel) -> AppResult<Product> {
    let mut images = load_images(orm, vec![model.id]).await?;
    let urls = images.remove(&model.id).unwrap_or_default();
    product_from_entity(model, urls)
}

fn workflow_state(model: &ProductModel) -> AppResult<WorkflowState> {
    Ok(WorkflowState {
        added_by: model.added_by.parse()?,
        status: model.status.parse()?,
        owner: model.owner,
        source_wholesaler: model.source_wholesaler,
        visible_to_customer: model.visible_to_customer,
        price: model.price,
        quantity: model.quantity,
    })
}

pub(crate) fn product_from_entity(model: ProductModel, images: Vec<String>) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        title: model.title,
        description: model.description,
        price: model.price,
        quantity: model.quantity,
        category: model.category,
        images,
        added_by: model.added_by.parse()?,
        source_wholesaler: model.source_wholesaler,
        owner: model.owner,
        status: model.status.parse()?,
        visible_to_customer: model.visible_to_customer,
        deleted: model.deleted,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
