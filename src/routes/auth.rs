use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::auth::{
        CheckEmailRequest, CheckEmailResponse, DebugUserQuery, OAuthCallbackQuery,
        RequestOtpRequest, RequestOtpResponse, UpdateRoleRequest, VerifyOtpRequest,
        VerifyOtpResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::{auth_service, oauth_service},
    state::AppState,
};

pub fn router(debug_routes: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/request-otp", post(request_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/me", get(me))
        .route("/update-role", post(update_role))
        .route("/check-email", post(check_email))
        .route("/{provider}", get(social_login))
        .route("/{provider}/callback", get(social_callback));

    if debug_routes {
        tracing::warn!("debug routes enabled: /api/auth/debug-user is reachable");
        router.route("/debug-user", get(debug_user))
    } else {
        router
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/request-otp",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "OTP generated and mailed", body = ApiResponse<RequestOtpResponse>),
        (status = 400, description = "email and role required"),
    ),
    tag = "Auth"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<RequestOtpRequest>,
) -> AppResult<Json<ApiResponse<RequestOtpResponse>>> {
    let resp = auth_service::request_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verified, returns a token", body = ApiResponse<VerifyOtpResponse>),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 404, description = "User not found"),
    ),
    tag = "Auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Json<ApiResponse<VerifyOtpResponse>>> {
    let resp = auth_service::verify_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::me(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/update-role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<User>),
        (status = 400, description = "Invalid role"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::update_role(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/check-email",
    request_body = CheckEmailRequest,
    responses(
        (status = 200, description = "Whether an account exists", body = ApiResponse<CheckEmailResponse>),
        (status = 400, description = "email required"),
    ),
    tag = "Auth"
)]
pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<CheckEmailRequest>,
) -> AppResult<Json<ApiResponse<CheckEmailResponse>>> {
    let resp = auth_service::check_email(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/debug-user",
    params(DebugUserQuery),
    responses(
        (status = 200, description = "User lookup, development only", body = ApiResponse<User>),
        (status = 400, description = "Provide email or phone"),
    ),
    tag = "Auth"
)]
pub async fn debug_user(
    State(state): State<AppState>,
    Query(query): Query<DebugUserQuery>,
) -> AppResult<Json<ApiResponse<Option<User>>>> {
    let resp = auth_service::debug_get_user(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/{provider}",
    params(
        ("provider" = String, Path, description = "google or facebook")
    ),
    responses(
        (status = 303, description = "Redirect to the provider consent page"),
        (status = 404, description = "Unknown or unconfigured provider"),
    ),
    tag = "Auth"
)]
pub async fn social_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    let provider = oauth_service::parse_provider(&provider)?;
    let url = oauth_service::authorize_url(&state, provider)?;
    Ok(Redirect::to(&url))
}

#[utoipa::path(
    get,
    path = "/api/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "google or facebook"),
        OAuthCallbackQuery
    ),
    responses(
        (status = 303, description = "Redirect to the frontend with a token, or to its login page"),
        (status = 404, description = "Unknown provider"),
    ),
    tag = "Auth"
)]
pub async fn social_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<Redirect> {
    let provider = oauth_service::parse_provider(&provider)?;
    let url = oauth_service::complete_login(&state, provider, query).await;
    Ok(Redirect::to(&url))
}
