use std::env;

use tracing::warn;

const DEV_JWT_SECRET: &str = "club-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    /// `username:password` of a chairman account created on startup when missing.
    pub bootstrap_chairman: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/club.db".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            bootstrap_chairman: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET is not set, falling back to the development secret");
            defaults.jwt_secret.clone()
        });

        let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.token_ttl_hours);

        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bcrypt_cost);

        let bootstrap_chairman = env::var("BOOTSTRAP_CHAIRMAN")
            .ok()
            .and_then(|v| parse_credentials(&v));

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            token_ttl_hours,
            bcrypt_cost,
            bootstrap_chairman,
        }
    }
}

fn parse_credentials(raw: &str) -> Option<(String, String)> {
    let (username, password) = raw.split_once(':')?;
    if username.trim().is_empty() || password.is_empty() {
        warn!("BOOTSTRAP_CHAIRMAN must look like username:password, ignoring it");
        return None;
    }
    Some((username.trim().to_string(), password.to_string()))
}
