pub mod auth_service;
pub mod cart_service;
pub mod oauth_service;
pub mod page_service;
pub mod product_service;
pub mod upload_service;
