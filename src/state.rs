//! Shared handler state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::routes::auth::SessionKeys;
use crate::store::{
    BlueprintStore, ContentStore, KvStore, LoginRateLimiter, SiteSettingsStore,
};
use crate::validation::EmailValidator;
use crate::webhook::WebhookClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn KvStore>,
    pub content: ContentStore,
    pub blueprints: BlueprintStore,
    pub site: SiteSettingsStore,
    pub login_limiter: LoginRateLimiter,
    pub sessions: SessionKeys,
    pub webhook: WebhookClient,
    pub email_validator: EmailValidator,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn KvStore>) -> Self {
        let http = reqwest::Client::new();

        Self {
            content: ContentStore::new(store.clone()),
            blueprints: BlueprintStore::new(store.clone(), config.blueprint_ttl),
            site: SiteSettingsStore::new(store.clone()),
            login_limiter: LoginRateLimiter::new(store.clone()),
            sessions: SessionKeys::new(&config.jwt_secret),
            webhook: WebhookClient::new(http.clone(), config.webhook_url.clone()),
            email_validator: EmailValidator::new(http, config.abstract_email_api_key.clone()),
            config: Arc::new(config),
            store,
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::store::MemoryStore;

    pub const TEST_PASSWORD: &str = "correct horse battery";

    /// Config with a cheap bcrypt hash and a webhook nobody listens on.
    pub fn test_config() -> AppConfig {
        AppConfig {
            environment: "test".to_string(),
            jwt_secret: "test-secret-for-unit-tests-only-0123456789".to_string(),
            admin_username: "admin".to_string(),
            admin_password_hash: bcrypt::hash(TEST_PASSWORD, 4).unwrap(),
            webhook_url: "http://127.0.0.1:9/webhook".to_string(),
            database_url: None,
            public_base_url: Some("https://revamply.test".to_string()),
            abstract_email_api_key: None,
            blueprint_ttl: None,
        }
    }

    pub fn test_state() -> AppState {
        AppState::new(test_config(), Arc::new(MemoryStore::new()))
    }
}
