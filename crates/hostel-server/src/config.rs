use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl: TimeDelta,
    pub reset_key: Option<String>,
    pub super_admin_email: String,
    pub super_admin_password: Option<String>,
    pub department_password: Option<String>,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Empty values count as unset.
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: or("HOSTEL_HOST", "0.0.0.0"),
            port: or("HOSTEL_PORT", "5000")
                .parse()
                .context("HOSTEL_PORT must be a port number")?,
            db_path: or("HOSTEL_DB_PATH", "hostel.db").into(),
            upload_dir: or("HOSTEL_UPLOAD_DIR", "./uploads").into(),
            jwt_secret: get("HOSTEL_JWT_SECRET").unwrap_or_default(),
            jwt_ttl: token_ttl(&or("HOSTEL_JWT_TTL_HOURS", "24"))?,
            reset_key: get("HOSTEL_SUPER_ADMIN_RESET_KEY"),
            super_admin_email: or("HOSTEL_SUPER_ADMIN_EMAIL", "admin@hostel.com"),
            super_admin_password: get("HOSTEL_SUPER_ADMIN_PASSWORD"),
            department_password: get("HOSTEL_DEPARTMENT_PASSWORD"),
            argon2_memory_kib: or("HOSTEL_ARGON2_MEMORY_KIB", "19456")
                .parse()
                .context("HOSTEL_ARGON2_MEMORY_KIB must be a number")?,
            argon2_iterations: or("HOSTEL_ARGON2_ITERATIONS", "2")
                .parse()
                .context("HOSTEL_ARGON2_ITERATIONS must be a number")?,
        })
    }

    pub fn has_usable_jwt_secret(&self) -> bool {
        !self.jwt_secret.is_empty() && !PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn token_ttl(hours: &str) -> Result<TimeDelta> {
    let hours: i64 = hours
        .parse()
        .context("HOSTEL_JWT_TTL_HOURS must be a whole number of hours")?;
    if hours <= 0 {
        bail!("HOSTEL_JWT_TTL_HOURS must be at least 1");
    }
    TimeDelta::try_hours(hours)
        .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
        .context("HOSTEL_JWT_TTL_HOURS is too large")
}
