use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::products::{
        ApprovalRequest, NearbyQuery, ProductForm, ProductList, ProductListQuery, ProductUpload,
        VisibilityRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    services::{
        product_service,
        upload_service::{ImageUpload, MAX_IMAGES},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/nearby", get(nearby_products))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/approval", put(update_approval))
        .route("/{id}/visible", put(set_visibility))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(err.body_text())
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> AppResult<Option<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{field} must be a whole number")))
}

/// Splits a product multipart body into its text fields and the `images` files.
async fn read_product_form(mut multipart: Multipart) -> AppResult<(ProductForm, Vec<ImageUpload>)> {
    let mut form = ProductForm::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            if images.len() == MAX_IMAGES {
                return Err(AppError::bad_request(format!(
                    "At most {MAX_IMAGES} images are allowed"
                )));
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            images.push(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "category" => form.category = Some(value),
            "price" => form.price = parse_number("price", &value)?,
            "quantity" => form.quantity = parse_number("quantity", &value)?,
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok((form, images))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products for the requested dashboard view", body = ApiResponse<ProductList>),
        (status = 400, description = "Missing or invalid view"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Customer-visible products near a point", body = ApiResponse<ProductList>),
        (status = 400, description = "Missing coordinates"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn nearby_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::nearby_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid form or image"),
        (status = 403, description = "Customers cannot add products"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let (form, images) = read_product_form(multipart).await?;
    let resp = product_service::create_product(&state, &user, form, images).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}/approval",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = ApprovalRequest,
    responses(
        (status = 200, description = "Approved or rejected", body = ApiResponse<Product>),
        (status = 400, description = "Not awaiting review or bad action"),
        (status = 403, description = "Only retailers review"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApprovalRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_approval(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "Only owner can edit"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let (form, images) = read_product_form(multipart).await?;
    let resp = product_service::update_product(&state, &user, id, form, images).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}/visible",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = VisibilityRequest,
    responses(
        (status = 200, description = "Visibility changed", body = ApiResponse<Product>),
        (status = 403, description = "Only owner can change visibility"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn set_visibility(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VisibilityRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::set_visibility(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Only owner or original wholesaler can delete"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_numbers_are_absent() {
        assert_eq!(parse_number::<i64>("price", " ").unwrap(), None);
        assert_eq!(parse_number::<i64>("price", "250").unwrap(), Some(250));
        assert!(parse_number::<i32>("quantity", "ten").is_err());
    }
}
