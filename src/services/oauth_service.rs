use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use serde::Deserialize;

use crate::{
    config::OAuthClientConfig,
    dto::auth::OAuthCallbackQuery,
    entity::users::{Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::issue_token,
    models::{AuthProvider, Role},
    services::auth_service::{new_user, normalize_email},
    state::AppState,
};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const FACEBOOK_AUTHORIZE_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const FACEBOOK_PROFILE_URL: &str = "https://graph.facebook.com/me";

/// Identity returned by a provider after the code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Whether the provider vouches for `email`. Facebook never does.
    pub email_verified: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct FacebookProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

pub fn parse_provider(raw: &str) -> AppResult<AuthProvider> {
    match raw.parse::<AuthProvider>() {
        Ok(provider @ (AuthProvider::Google | AuthProvider::Facebook)) => Ok(provider),
        _ => Err(AppError::not_found("Unknown provider")),
    }
}

fn client_config(state: &AppState, provider: AuthProvider) -> AppResult<&OAuthClientConfig> {
    let config = match provider {
        AuthProvider::Google => state.config.google.as_ref(),
        AuthProvider::Facebook => state.config.facebook.as_ref(),
        AuthProvider::Local => None,
    };
    config.ok_or_else(|| AppError::not_found(format!("{provider} login is not configured")))
}

/// Consent page URL the browser is sent to.
pub fn authorize_url(state: &AppState, provider: AuthProvider) -> AppResult<String> {
    let client = client_config(state, provider)?;
    let (base, scope) = match provider {
        AuthProvider::Facebook => (FACEBOOK_AUTHORIZE_URL, "email"),
        _ => (GOOGLE_AUTHORIZE_URL, "profile email"),
    };
    Ok(format!(
        "{base}?client_id={}&redirect_uri={}&response_type=code&scope={}",
        urlencoding::encode(&client.client_id),
        urlencoding::encode(&client.callback_url),
        urlencoding::encode(scope),
    ))
}

/// Completes the provider redirect and returns where the browser goes next.
/// Failures never surface to the caller; they are logged and sent to the login page.
pub async fn complete_login(
    state: &AppState,
    provider: AuthProvider,
    query: OAuthCallbackQuery,
) -> String {
    let frontend = state.config.frontend_url.as_str();
    tracing::info!(%provider, has_code = query.code.is_some(), error = ?query.error, "oauth callback");

    match finish(state, provider, query).await {
        Ok(token) => format!("{frontend}/social-login-success#token={token}"),
        Err(err) => {
            tracing::error!(%provider, error = %err, "social login failed");
            format!("{frontend}/login")
        }
    }
}

async fn finish(
    state: &AppState,
    provider: AuthProvider,
    query: OAuthCallbackQuery,
) -> AppResult<String> {
    if let Some(error) = query.error {
        return Err(AppError::bad_request(format!("provider returned {error}")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::bad_request("missing authorization code"))?;
    let client = client_config(state, provider)?;

    let profile = fetch_profile(&state.http, provider, client, &code)
        .await
        .map_err(AppError::Internal)?;
    let user = find_or_create_social_user(&state.orm, provider, profile).await?;

    tracing::info!(user_id = %user.id, %provider, "social login success");
    issue_token(
        &state.config,
        user.id,
        user.role.parse()?,
        user.email.as_deref(),
    )
}

async fn fetch_profile(
    http: &reqwest::Client,
    provider: AuthProvider,
    client: &OAuthClientConfig,
    code: &str,
) -> anyhow::Result<SocialProfile> {
    match provider {
        AuthProvider::Facebook => {
            let token: TokenResponse = http
                .get(FACEBOOK_TOKEN_URL)
                .query(&[
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", client.client_secret.as_str()),
                    ("redirect_uri", client.callback_url.as_str()),
                    ("code", code),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let profile: FacebookProfile = http
                .get(FACEBOOK_PROFILE_URL)
                .query(&[
                    ("fields", "id,name,email"),
                    ("access_token", token.access_token.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(SocialProfile {
                id: profile.id,
                name: profile.name,
                email: profile.email,
                email_verified: false,
            })
        }
        _ => {
            let token: TokenResponse = http
                .post(GOOGLE_TOKEN_URL)
                .form(&[
                    ("client_id", client.client_id.as_str()),
                    ("client_secret", client.client_secret.as_str()),
                    ("redirect_uri", client.callback_url.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code", code),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let info: GoogleUserInfo = http
                .get(GOOGLE_USERINFO_URL)
                .bearer_auth(&token.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(SocialProfile {
                id: info.sub,
                name: info.name,
                email: info.email,
                email_verified: info.email_verified,
            })
        }
    }
}

/// Looks the user up by provider identity and registers a verified customer
/// when there is none. An existing account with the same email is only reused
/// when the provider has verified that email; otherwise the login is refused.
pub async fn find_or_create_social_user(
    orm: &DatabaseConnection,
    provider: AuthProvider,
    profile: SocialProfile,
) -> AppResult<UserModel> {
    let existing = Users::find()
        .filter(
            Condition::all()
                .add(UserCol::Provider.eq(provider.as_str()))
                .add(UserCol::SocialId.eq(profile.id.as_str())),
        )
        .one(orm)
        .await?;
    if let Some(user) = existing {
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty());

    if let Some(email) = email.as_deref() {
        if let Some(user) = Users::find()
            .filter(UserCol::Email.eq(email))
            .one(orm)
            .await?
        {
            if !profile.email_verified {
                tracing::warn!(user_id = %user.id, %provider, "social login email not verified by provider");
                return Err(AppError::bad_request("Email already registered"));
            }
            tracing::info!(user_id = %user.id, %provider, "social login matched verified email");
            return Ok(user);
        }
    }

    let mut active = new_user(Role::Customer, provider);
    active.name = Set(profile.name);
    active.email = Set(email);
    active.social_id = Set(Some(profile.id));
    active.verified = Set(true);
    active.updated_at = Set(Utc::now().into());
    Ok(active.insert(orm).await?)
}
