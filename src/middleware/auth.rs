use axum::{extract::FromRequestParts, http::header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    error::{AppError, AppResult},
    models::Role,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::forbidden("Forbidden - insufficient role"));
    }
    Ok(())
}

pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    role: Role,
    email: Option<&str>,
) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::days(config.jwt_ttl_days))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        id: user_id.to_string(),
        role: role.as_str().to_string(),
        email: email.map(str::to_string),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(secret: &str, token: &str) -> AppResult<AuthUser> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| {
        tracing::debug!(error = %err, "jwt rejected");
        AppError::Unauthorized("Invalid or expired token.".into())
    })?;

    let user_id = Uuid::parse_str(&decoded.claims.id)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;
    let role = decoded
        .claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized("Invalid role in token".into()))?;

    Ok(AuthUser {
        user_id,
        role,
        email: decoded.claims.email,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("No token provided.".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid token format.".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid token format.".into()))?;

        decode_token(&state.config.jwt_secret, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            jwt_ttl_days: 7,
            otp_expiry_minutes: 5,
            debug_otp: false,
            debug_routes: false,
            frontend_url: "http://localhost:3000".into(),
            upload_dir: "uploads".into(),
            smtp: None,
            google: None,
            facebook: None,
        }
    }

    #[test]
    fn token_carries_id_role_and_email() {
        let config = config();
        let id = Uuid::new_v4();
        let token = issue_token(&config, id, Role::Wholesaler, Some("w@example.com")).unwrap();

        let user = decode_token(&config.jwt_secret, &token).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, Role::Wholesaler);
        assert_eq!(user.email.as_deref(), Some("w@example.com"));
    }

    #[test]
    fn token_signed_with_other_secret_is_unauthorized() {
        let config = config();
        let token = issue_token(&config, Uuid::new_v4(), Role::Customer, None).unwrap();

        let err = decode_token("another-secret", &token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn role_guard_rejects_other_roles() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Customer,
            email: None,
        };
        assert!(ensure_role(&user, Role::Customer).is_ok());
        assert!(matches!(
            ensure_role(&user, Role::Retailer),
            Err(AppError::Forbidden(_))
        ));
    }
}
