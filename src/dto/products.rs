use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Product;

/// Text fields of the product multipart form.
#[derive(Debug, Default, Clone)]
pub struct ProductForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
}

/// Multipart body accepted by create and update.
#[allow(dead_code)]
#[derive(Debug, ToSchema)]
pub struct ProductUpload {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// `approve` or `reject`.
    pub action: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub visible_to_customer: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// One of `wholesaler`, `retailer`, `customer`.
    pub view: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Customer view only: case-insensitive match on title or description.
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub max_distance_km: Option<f64>,
}
