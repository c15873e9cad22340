use std::env;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

/// Client credentials for one OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub otp_expiry_minutes: i64,
    pub debug_otp: bool,
    pub debug_routes: bool,
    pub frontend_url: String,
    pub upload_dir: String,
    pub smtp: Option<SmtpConfig>,
    pub google: Option<OAuthClientConfig>,
    pub facebook: Option<OAuthClientConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let jwt_ttl_days = positive_from_env("JWT_TTL_DAYS").unwrap_or(7);
        let otp_expiry_minutes = positive_from_env("OTP_EXPIRY_MIN").unwrap_or(5);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_days,
            otp_expiry_minutes,
            debug_otp: flag_from_env("DEBUG_OTP"),
            debug_routes: flag_from_env("DEBUG_ROUTES"),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            upload_dir,
            smtp: smtp_from_env(),
            google: oauth_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET", "GOOGLE_CALLBACK_URL"),
            facebook: oauth_from_env(
                "FACEBOOK_APP_ID",
                "FACEBOOK_APP_SECRET",
                "FACEBOOK_CALLBACK_URL",
            ),
        })
    }
}

fn positive_from_env(key: &str) -> Option<i64> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
}

fn flag_from_env(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// SMTP is only enabled when a user is configured.
fn smtp_from_env() -> Option<SmtpConfig> {
    let user = env::var("SMTP_USER").ok().filter(|u| !u.is_empty())?;
    let host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(587);
    let password = env::var("SMTP_PASS").unwrap_or_default();
    let from = env::var("EMAIL_FROM").unwrap_or_else(|_| format!("LiveMart <{user}>"));
    Some(SmtpConfig {
        host,
        port,
        user,
        password,
        from,
    })
}

fn oauth_from_env(id_key: &str, secret_key: &str, callback_key: &str) -> Option<OAuthClientConfig> {
    let client_id = env::var(id_key).ok().filter(|v| !v.is_empty())?;
    let client_secret = env::var(secret_key).ok().filter(|v| !v.is_empty())?;
    let callback_url = env::var(callback_key).ok().filter(|v| !v.is_empty())?;
    Some(OAuthClientConfig {
        client_id,
        client_secret,
        callback_url,
    })
}
