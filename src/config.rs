/**
 * Runtime Configuration
 * Read once from the environment at startup
 */
use bcrypt::{hash, DEFAULT_COST};

/// Longest blueprint retention accepted, about a century.
pub const MAX_BLUEPRINT_TTL_DAYS: i64 = 36_500;

/// Minimum signing secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("failed to hash ADMIN_PASSWORD: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password_hash: String,
    pub webhook_url: String,
    pub database_url: Option<String>,
    pub public_base_url: Option<String>,
    pub abstract_email_api_key: Option<String>,
    pub blueprint_ttl: Option<chrono::Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let production = environment == "production";

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if production && jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_PRODUCTION_SECRET_LEN} characters in production"),
            });
        }

        let admin_password_hash = match (var("ADMIN_PASSWORD_HASH"), var("ADMIN_PASSWORD")) {
            (Some(hash), _) => hash,
            (None, Some(plain)) => {
                if production {
                    tracing::warn!(
                        "SECURITY: ADMIN_PASSWORD is set in plain text. \
                         Prefer ADMIN_PASSWORD_HASH (see the hash-password binary)."
                    );
                }
                hash(plain, DEFAULT_COST)?
            }
            (None, None) => return Err(ConfigError::Missing("ADMIN_PASSWORD_HASH or ADMIN_PASSWORD")),
        };

        let webhook_url = var("N8N_WEBHOOK_URL").ok_or(ConfigError::Missing("N8N_WEBHOOK_URL"))?;
        if !(webhook_url.starts_with("http://") || webhook_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "N8N_WEBHOOK_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let database_url = var("DATABASE_URL");
        if production && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let blueprint_ttl = match var("BLUEPRINT_TTL_DAYS") {
            Some(days) => {
                let days: i64 = days.parse().map_err(|_| ConfigError::Invalid {
                    name: "BLUEPRINT_TTL_DAYS",
                    reason: format!("'{days}' is not a whole number of days"),
                })?;
                if days > MAX_BLUEPRINT_TTL_DAYS {
                    return Err(ConfigError::Invalid {
                        name: "BLUEPRINT_TTL_DAYS",
                        reason: format!("must be at most {MAX_BLUEPRINT_TTL_DAYS} days"),
                    });
                }
                (days > 0).then(|| chrono::Duration::days(days))
            }
            None => None,
        };

        Ok(Self {
            environment,
            jwt_secret,
            admin_username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password_hash,
            webhook_url,
            database_url,
            public_base_url: var("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            abstract_email_api_key: var("ABSTRACT_EMAIL_API_KEY"),
            blueprint_ttl,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const HASH: &str = "$2b$04$abcdefghijklmnopqrstuuJ8a0vL1C8Nqj2o0r6m3YbZc8t7dV4mK";

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", "dev-secret"),
            ("ADMIN_PASSWORD_HASH", HASH),
            ("N8N_WEBHOOK_URL", "https://n8n.example.com/webhook/blueprint"),
        ]
    }

    #[test]
    fn test_development_defaults() {
        let config = load(&base()).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.admin_username, "admin");
        assert!(config.database_url.is_none());
        assert!(config.blueprint_ttl.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_secret_fails_closed() {
        let vars: Vec<_> = base().into_iter().filter(|(k, _)| *k != "JWT_SECRET").collect();
        assert!(matches!(load(&vars), Err(ConfigError::Missing("JWT_SECRET"))));

        let mut vars = base();
        vars.push(("JWT_SECRET", "   "));
        vars.remove(0);
        assert!(matches!(load(&vars), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn test_missing_password_and_webhook() {
        let vars: Vec<_> = base()
            .into_iter()
            .filter(|(k, _)| *k != "ADMIN_PASSWORD_HASH")
            .collect();
        assert!(matches!(load(&vars), Err(ConfigError::Missing(_))));

        let vars: Vec<_> = base().into_iter().filter(|(k, _)| *k != "N8N_WEBHOOK_URL").collect();
        assert!(matches!(load(&vars), Err(ConfigError::Missing("N8N_WEBHOOK_URL"))));
    }

    #[test]
    fn test_production_requires_long_secret_and_database() {
        let mut vars = base();
        vars.push(("ENVIRONMENT", "production"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "JWT_SECRET", .. })
        ));

        vars[0] = ("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("DATABASE_URL"))));

        vars.push(("DATABASE_URL", "postgresql://localhost/revamply"));
        assert!(load(&vars).unwrap().is_production());
    }

    #[test]
    fn test_blueprint_ttl_and_base_url() {
        let mut vars = base();
        vars.push(("BLUEPRINT_TTL_DAYS", "30"));
        vars.push(("PUBLIC_BASE_URL", "https://revamply.example/"));
        let config = load(&vars).unwrap();
        assert_eq!(config.blueprint_ttl, Some(chrono::Duration::days(30)));
        assert_eq!(config.public_base_url.as_deref(), Some("https://revamply.example"));

        vars.push(("BLUEPRINT_TTL_DAYS", "soon"));
        let vars: Vec<_> = vars
            .into_iter()
            .filter(|pair| *pair != ("BLUEPRINT_TTL_DAYS", "30"))
            .collect();
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "BLUEPRINT_TTL_DAYS", .. })
        ));
    }

    #[test]
    fn test_blueprint_ttl_is_capped() {
        let mut vars = base();
        vars.push(("BLUEPRINT_TTL_DAYS", "36500"));
        assert_eq!(
            load(&vars).unwrap().blueprint_ttl,
            Some(chrono::Duration::days(MAX_BLUEPRINT_TTL_DAYS))
        );

        let mut vars = base();
        vars.push(("BLUEPRINT_TTL_DAYS", "100000000"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "BLUEPRINT_TTL_DAYS", .. })
        ));
    }
}
