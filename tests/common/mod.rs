#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use livemart_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::products::ProductForm,
    entity::users::ActiveModel as UserActive,
    mailer::{Mailer, OutgoingMail},
    middleware::auth::AuthUser,
    models::{AuthProvider, Role},
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let upload_dir = std::env::temp_dir().join(format!("livemart-test-{}", Uuid::new_v4()));
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "integration-secret".into(),
        jwt_ttl_days: 7,
        otp_expiry_minutes: 5,
        debug_otp: true,
        debug_routes: false,
        frontend_url: "http://localhost:3000".into(),
        upload_dir: upload_dir.to_string_lossy().to_string(),
        smtp: None,
        google: None,
        facebook: None,
    }
}

pub async fn setup_state() -> anyhow::Result<AppState> {
    setup_state_with(test_config()).await
}

pub async fn setup_state_with(config: AppConfig) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    AppState::new(orm, config)
}

pub fn recording(state: AppState) -> (AppState, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let state = state.with_mailer(mailer.clone());
    (state, mailer)
}

pub async fn create_user(state: &AppState, role: Role, email: &str) -> anyhow::Result<AuthUser> {
    create_user_at(state, role, email, None).await
}

pub async fn create_user_at(
    state: &AppState,
    role: Role,
    email: &str,
    location: Option<(f64, f64)>,
) -> anyhow::Result<AuthUser> {
    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(Some(email.split('@').next().unwrap_or(email).to_string())),
        email: Set(Some(email.to_string())),
        phone: Set(None),
        role: Set(role.as_str().to_string()),
        provider: Set(AuthProvider::Local.as_str().to_string()),
        social_id: Set(None),
        verified: Set(true),
        address: Set(None),
        lat: Set(location.map(|(lat, _)| lat)),
        lng: Set(location.map(|(_, lng)| lng)),
        place_id: Set(None),
        otp_hash: Set(None),
        otp_expires_at: Set(None),
        otp_verified: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
        email: user.email,
    })
}

pub fn form(title: &str, price: i64, quantity: i32) -> ProductForm {
    ProductForm {
        title: Some(title.to_string()),
        description: Some(format!("{title} description")),
        price: Some(price),
        quantity: Some(quantity),
        category: Some("produce".to_string()),
    }
}
