use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Product, Role, User};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetailerStats {
    pub my_product_count: usize,
    pub pending_wholesaler_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WholesalerStats {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", tag = "role")]
pub enum Dashboard {
    #[serde(rename = "customer")]
    Customer { message: String, user: Option<User> },
    #[serde(rename = "retailer")]
    Retailer {
        message: String,
        user: Option<User>,
        stats: RetailerStats,
        products: Vec<Product>,
        #[serde(rename = "pendingWholesaler")]
        pending_wholesaler: Vec<Product>,
    },
    #[serde(rename = "wholesaler")]
    Wholesaler {
        message: String,
        user: Option<User>,
        stats: WholesalerStats,
        products: Vec<Product>,
    },
}

impl Dashboard {
    pub fn role(&self) -> Role {
        match self {
            Dashboard::Customer { .. } => Role::Customer,
            Dashboard::Retailer { .. } => Role::Retailer,
            Dashboard::Wholesaler { .. } => Role::Wholesaler,
        }
    }
}
