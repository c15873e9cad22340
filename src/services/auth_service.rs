use argon2::{
    Algorithm, Argon2, Params, PasswordHasher, Version,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use crate::{
    dto::auth::{
        CheckEmailRequest, CheckEmailResponse, DebugUserQuery, RequestOtpRequest,
        RequestOtpResponse, UpdateRoleRequest, VerifyOtpRequest, VerifyOtpResponse,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    mailer::otp_mail,
    middleware::auth::{AuthUser, issue_token},
    models::{AuthProvider, Location, Role, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const OTP_LENGTH: usize = 6;

pub async fn request_otp(
    state: &AppState,
    payload: RequestOtpRequest,
) -> AppResult<ApiResponse<RequestOtpResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("email required"))?;
    let role = payload
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("role required"))?;

    let code = generate_otp(OTP_LENGTH);
    let otp_hash = hash_otp(&code)?;
    let now = Utc::now();
    let expires_at = now + Duration::minutes(state.config.otp_expiry_minutes);
    let location = payload.location.filter(|l| !l.is_empty());

    let existing = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match existing {
        Some(user) => {
            // Role and provider stay as they are for known users.
            let mut active: UserActive = user.into();
            if let Some(name) = payload.name.filter(|n| !n.trim().is_empty()) {
                active.name = Set(Some(name));
            }
            if let Some(location) = location {
                set_location(&mut active, location);
            }
            active.otp_hash = Set(Some(otp_hash));
            active.otp_expires_at = Set(Some(expires_at.into()));
            active.otp_verified = Set(false);
            active.updated_at = Set(now.into());
            active.update(&state.orm).await?
        }
        None => {
            let role = role
                .parse::<Role>()
                .map_err(|_| AppError::bad_request("invalid role"))?;
            let mut active = new_user(role, AuthProvider::Local);
            active.email = Set(Some(email.clone()));
            active.name = Set(payload.name.filter(|n| !n.trim().is_empty()));
            if let Some(location) = location {
                set_location(&mut active, location);
            }
            active.otp_hash = Set(Some(otp_hash));
            active.otp_expires_at = Set(Some(expires_at.into()));
            active.insert(&state.orm).await?
        }
    };

    tracing::debug!(user_id = %user.id, email = %email, "otp issued");

    let mail = otp_mail(
        &email,
        user.name.as_deref(),
        &code,
        state.config.otp_expiry_minutes,
    );
    if let Err(err) = state.mailer.send(mail).await {
        tracing::warn!(error = %err, email = %email, "error sending OTP email");
    }

    let data = RequestOtpResponse {
        user_id: user.id,
        otp: state.config.debug_otp.then_some(code),
    };
    Ok(ApiResponse::success("OTP sent", data, Some(Meta::empty())))
}

pub async fn verify_otp(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<VerifyOtpResponse>> {
    let code = payload
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("userId/email and code required"))?;

    let user = match (payload.user_id.as_deref(), payload.email.as_deref()) {
        (Some(id), _) if !id.trim().is_empty() => match Uuid::parse_str(id.trim()) {
            Ok(id) => Users::find_by_id(id).one(&state.orm).await?,
            Err(_) => None,
        },
        (_, Some(email)) if !email.trim().is_empty() => {
            Users::find()
                .filter(UserCol::Email.eq(normalize_email(email)))
                .one(&state.orm)
                .await?
        }
        _ => return Err(AppError::bad_request("userId/email and code required")),
    };
    let user = user.ok_or_else(|| AppError::not_found("User not found"))?;

    let otp_hash = user
        .otp_hash
        .clone()
        .ok_or_else(|| AppError::bad_request("No OTP generated"))?;

    if let Some(expires_at) = user.otp_expires_at {
        if Utc::now() > expires_at {
            return Err(AppError::bad_request("OTP expired"));
        }
    }

    if !otp_matches(&otp_hash, code) {
        return Err(AppError::bad_request("Invalid OTP"));
    }

    let mut active: UserActive = user.into();
    active.otp_hash = Set(None);
    active.otp_verified = Set(true);
    active.verified = Set(true);
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    let profile = user_from_entity(user)?;
    let token = issue_token(&state.config, profile.id, profile.role, profile.email.as_deref())?;

    tracing::info!(user_id = %profile.id, "otp verified");
    Ok(ApiResponse::success(
        "OTP verified",
        VerifyOtpResponse {
            token,
            user: profile,
        },
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ApiResponse::success("OK", user_from_entity(model)?, None))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    let role = payload
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("role required"))?
        .parse::<Role>()
        .map_err(|_| AppError::bad_request("invalid role"))?;

    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let mut active: UserActive = model.into();
    active.role = Set(role.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let model = active.update(&state.orm).await?;

    tracing::info!(user_id = %model.id, role = %role, "role updated");
    Ok(ApiResponse::success(
        "role updated",
        user_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn check_email(
    state: &AppState,
    payload: CheckEmailRequest,
) -> AppResult<ApiResponse<CheckEmailResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("email required"))?;

    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .transpose()?;

    let data = CheckEmailResponse {
        exists: user.is_some(),
        user,
    };
    Ok(ApiResponse::success("OK", data, None))
}

pub async fn debug_get_user(
    state: &AppState,
    query: DebugUserQuery,
) -> AppResult<ApiResponse<Option<User>>> {
    let condition = match (query.email.as_deref(), query.phone.as_deref()) {
        (Some(email), _) => UserCol::Email.eq(normalize_email(email)),
        (None, Some(phone)) => UserCol::Phone.eq(phone.trim()),
        (None, None) => return Err(AppError::bad_request("Provide email or phone query param")),
    };

    let user = Users::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .transpose()?;
    Ok(ApiResponse::success("OK", user, None))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn otp_hasher() -> AppResult<Argon2<'static>> {
    // Codes live for minutes, so a light cost is enough.
    let params = Params::new(4096, 2, 1, None)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn hash_otp(code: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = otp_hasher()?
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn otp_matches(hash: &str, code: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("stored otp hash is malformed");
        return false;
    };
    otp_hasher()
        .map(|argon2| argon2.verify_password(code.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Blank active model for a new account.
pub(crate) fn new_user(role: Role, provider: AuthProvider) -> UserActive {
    let now = Utc::now();
    UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(None),
        email: Set(None),
        phone: Set(None),
        role: Set(role.as_str().to_string()),
        provider: Set(provider.as_str().to_string()),
        social_id: Set(None),
        verified: Set(false),
        address: Set(None),
        lat: Set(None),
        lng: Set(None),
        place_id: Set(None),
        otp_hash: Set(None),
        otp_expires_at: Set(None),
        otp_verified: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}

fn set_location(active: &mut UserActive, location: Location) {
    active.address = Set(location.address);
    active.lat = Set(location.lat);
    active.lng = Set(location.lng);
    active.place_id = Set(location.place_id);
}

pub(crate) fn user_from_entity(model: UserModel) -> AppResult<User> {
    let location = Location {
        address: model.address,
        lat: model.lat,
        lng: model.lng,
        place_id: model.place_id,
    };
    Ok(User {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        role: model.role.parse()?,
        provider: model.provider.parse()?,
        verified: model.verified,
        location: (!location.is_empty()).then_some(location),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp(OTP_LENGTH);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hashed_otp_only_matches_its_code() {
        let hash = hash_otp("123456").unwrap();
        assert!(otp_matches(&hash, "123456"));
        assert!(!otp_matches(&hash, "654321"));
        assert!(!otp_matches("not-a-hash", "123456"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Shop@Example.COM "), "shop@example.com");
    }
}
