use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            CheckEmailRequest, CheckEmailResponse, RequestOtpRequest, RequestOtpResponse,
            UpdateRoleRequest, VerifyOtpRequest, VerifyOtpResponse,
        },
        cart::{AddToCartRequest, UpdateCartItemRequest},
        pages::{Dashboard, RetailerStats, WholesalerStats},
        products::{ApprovalRequest, ProductList, ProductUpload, VisibilityRequest},
    },
    models::{AddedBy, AuthProvider, Cart, CartLine, Location, Product, ProductStatus, Role, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, pages, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::request_otp,
        auth::verify_otp,
        auth::me,
        auth::update_role,
        auth::check_email,
        auth::debug_user,
        auth::social_login,
        auth::social_callback,
        products::list_products,
        products::nearby_products,
        products::get_product,
        products::create_product,
        products::update_approval,
        products::update_product,
        products::set_visibility,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        pages::dashboard
    ),
    components(
        schemas(
            Role,
            AuthProvider,
            AddedBy,
            ProductStatus,
            Location,
            User,
            Product,
            Cart,
            CartLine,
            RequestOtpRequest,
            RequestOtpResponse,
            VerifyOtpRequest,
            VerifyOtpResponse,
            UpdateRoleRequest,
            CheckEmailRequest,
            CheckEmailResponse,
            ProductUpload,
            ApprovalRequest,
            VisibilityRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            Dashboard,
            RetailerStats,
            WholesalerStats,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<User>,
            ApiResponse<Dashboard>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "OTP and social login"),
        (name = "Products", description = "Product workflow and listings"),
        (name = "Cart", description = "Customer cart"),
        (name = "Pages", description = "Role dashboards"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
