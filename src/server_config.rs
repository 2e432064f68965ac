//! Runtime settings shared by request handlers.
//!
//! Built once at startup and handed to every router state behind an `Arc`.

/// Deployment mode. Production turns on `Secure`/`SameSite=Strict` cookies
/// and hides internal error traces.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Versioned prefix for every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Settings derived from the environment mode.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub environment: Environment,
    /// Path the refresh cookie is scoped to.
    pub refresh_path: String,
}

impl ServerSettings {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            refresh_path: format!("{}/auth/refresh", API_PREFIX),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }

    pub fn same_site(&self) -> &'static str {
        if self.environment.is_production() {
            "Strict"
        } else {
            "Lax"
        }
    }

    /// Whether error responses may include internal traces.
    pub fn expose_error_traces(&self) -> bool {
        !self.environment.is_production()
    }
}
