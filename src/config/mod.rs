use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Durable encryption/signing secret. When unset the process falls back
    /// to an ephemeral key: anything sealed under it is unrecoverable after
    /// restart.
    pub encryption_secret: Option<String>,
    pub token_expiry_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Retention window for audit entries, in days.
    pub retention_days: i64,
    /// Default page size for audit queries.
    pub default_query_limit: i64,
    /// How often the background retention sweep runs.
    pub cleanup_interval_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        if let Ok(v) = env::var("ENCRYPTION_SECRET") {
            if !v.is_empty() {
                self.security.encryption_secret = Some(v);
            }
        }
        if let Ok(v) = env::var("TOKEN_EXPIRY_HOURS") {
            self.security.token_expiry_hours = v.parse().unwrap_or(self.security.token_expiry_hours);
        }

        if let Ok(v) = env::var("AUDIT_RETENTION_DAYS") {
            self.audit.retention_days = v.parse().unwrap_or(self.audit.retention_days);
        }
        if let Ok(v) = env::var("AUDIT_DEFAULT_QUERY_LIMIT") {
            self.audit.default_query_limit = v.parse().unwrap_or(self.audit.default_query_limit);
        }
        if let Ok(v) = env::var("AUDIT_CLEANUP_INTERVAL_HOURS") {
            self.audit.cleanup_interval_hours =
                v.parse().unwrap_or(self.audit.cleanup_interval_hours);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                encryption_secret: None,
                token_expiry_hours: 24,
            },
            audit: AuditConfig {
                retention_days: 30,
                default_query_limit: 100,
                cleanup_interval_hours: 24,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                port: 3000,
                enable_cors: true,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                encryption_secret: None,
                token_expiry_hours: 24,
            },
            audit: AuditConfig {
                retention_days: 90,
                default_query_limit: 100,
                cleanup_interval_hours: 24,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                port: 3000,
                enable_cors: false,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                encryption_secret: None,
                token_expiry_hours: 24,
            },
            audit: AuditConfig {
                retention_days: 365,
                default_query_limit: 100,
                cleanup_interval_hours: 24,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
