//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::db::{Database, UserRole};
use crate::jwt::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL};
use crate::rate_limit::DEFAULT_AUTH_RATE_PER_MINUTE;
use crate::server_config::Environment;
use clap::Parser;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

pub const ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";
pub const REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasktrack",
    about = "Multi-tenant task tracker with JWT session renewal"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "tasktrack.db")]
    pub database: String,

    /// Deployment mode. Production enables Secure cookies and hides error traces
    #[arg(short, long, env = "APP_ENV", value_enum, default_value = "development")]
    pub environment: Environment,

    /// Access token lifetime, e.g. "15m", "900s", "900"
    #[arg(long, env = "ACCESS_TOKEN_TTL", value_parser = parse_duration, default_value = "15m")]
    pub access_token_ttl: Duration,

    /// Refresh token lifetime, e.g. "7d", "168h"
    #[arg(long, env = "REFRESH_TOKEN_TTL", value_parser = parse_duration, default_value = "7d")]
    pub refresh_token_ttl: Duration,

    /// Requests per minute per IP allowed on register, login and refresh
    #[arg(long, env = "AUTH_RATE_PER_MINUTE", default_value_t = DEFAULT_AUTH_RATE_PER_MINUTE)]
    pub auth_rate_per_minute: u32,

    /// Path to file containing the access token secret. Prefer JWT_ACCESS_SECRET
    #[arg(long)]
    pub jwt_access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer JWT_REFRESH_SECRET
    #[arg(long)]
    pub jwt_refresh_secret_file: Option<String>,

    /// Grant the admin role to an existing account on startup
    #[arg(long, value_name = "EMAIL")]
    pub promote_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse `<n>s`, `<n>m`, `<n>h`, `<n>d` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 60 * 60),
        Some((i, 'd')) => (&s[..i], 24 * 60 * 60),
        Some(_) => (s, 1),
        None => return Err("Duration cannot be empty".to_string()),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration: {}", s))?;
    if value == 0 {
        return Err(format!("Duration must be positive: {}", s));
    }
    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration is too large: {}", s))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            variable = env_var,
            "Secret is required. Set the environment variable (recommended) or use the matching --*-secret-file flag"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            variable = env_var,
            "Secret is shorter than {} characters. Use a longer secret", MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets and make sure they differ.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret(ACCESS_SECRET_ENV, args.jwt_access_secret_file.as_deref())?;
    let refresh = load_secret(REFRESH_SECRET_ENV, args.jwt_refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("Access and refresh token secrets must be different");
        return None;
    }

    Some((access, refresh))
}

/// Handle the --promote-admin flag.
pub async fn handle_promote_admin(db: &Database, email: &str) {
    let email = crate::auth::normalize_email(email);

    let user = match db.users().get_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!(email = %email, "No account with this email");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to look up account");
            std::process::exit(1);
        }
    };

    match db.users().set_role(&user.uuid, UserRole::Admin).await {
        Ok(_) => info!(user = %user.uuid, "Account promoted to admin"),
        Err(e) => {
            error!(error = %e, "Failed to promote account");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_token_ttl: args.access_token_ttl,
        refresh_token_ttl: args.refresh_token_ttl,
        environment: args.environment,
        auth_rate_per_minute: args.auth_rate_per_minute,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
