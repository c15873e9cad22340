use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::pages::Dashboard,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::page_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{role}", get(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/pages/{role}",
    params(
        ("role" = String, Path, description = "customer, retailer or wholesaler")
    ),
    responses(
        (status = 200, description = "Role dashboard summary", body = ApiResponse<Dashboard>),
        (status = 403, description = "Role does not match the page"),
        (status = 404, description = "Unknown page"),
    ),
    security(("bearer_auth" = [])),
    tag = "Pages"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role): Path<String>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    let page = page_service::parse_page(&role)?;
    let resp = page_service::dashboard(&state, &user, page).await?;
    Ok(Json(resp))
}
