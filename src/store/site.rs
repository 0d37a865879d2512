//! Site-wide settings: the admin config document, its generated CSS and the theme.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{get_json, set_json, KvStore, StoreError};
use crate::db::models::Theme;

const CONFIG_KEY: &str = "site:config";
const CSS_KEY: &str = "site:css-overrides";
const THEME_KEY: &str = "site:theme";

/// Color keys in the config document and the CSS variables they drive.
const COLOR_VARIABLES: [(&str, &str); 6] = [
    ("heroBg", "--hero-bg"),
    ("heroTitle", "--hero-title"),
    ("heroDesc", "--hero-desc"),
    ("trustBg", "--trust-bg"),
    ("trustCardBg", "--trust-card-bg"),
    ("trustCardTitle", "--trust-card-title"),
];

const CSS_RULES: &str = r#"
.hero-wrapper {
    background-color: var(--hero-bg, #0a0a0a) !important;
}

.hero-title-line1,
.hero-title-line3 {
    color: var(--hero-title, #ffffff) !important;
}

.hero-description {
    color: var(--hero-desc, #d1d5db) !important;
}

.why-trust-wrapper {
    background-color: var(--trust-bg, #0a0a0a) !important;
}

.efficiency-card,
.overhead-card,
.growth-card {
    background-color: var(--trust-card-bg, #1a1a1a) !important;
}

.efficiency-title,
.overhead-title,
.growth-title {
    color: var(--trust-card-title, #ffffff) !important;
}
"#;

pub fn default_config() -> Value {
    json!({
        "hero": {
            "title1": "AI Solutions That",
            "title2": "Save Time, Cut Costs",
            "title3": "& Grow Revenue",
            "description": "Revamply develops tailored AI solutions using advanced machine learning, natural language processing, and automation.",
            "ctaText": "Get Your Free Blueprint"
        },
        "whyTrust": {
            "title": "Why Businesses Trust Revamply for AI Transformation",
            "efficiency": {
                "title": "Intelligent Efficiency",
                "text": "Automate repetitive tasks with AI so your team can focus on high-value growth activities."
            },
            "overhead": {
                "title": "Reduce Overhead",
                "text": "Eliminate inefficiencies and lower operational expenses with intelligent automation and optimized workflows."
            },
            "growth": {
                "title": "Accelerate Growth",
                "text": "Scale faster with data-driven insights and AI-powered decision making."
            }
        },
        "colors": {
            "heroBg": "#0a0a0a",
            "heroTitle": "#ffffff",
            "heroDesc": "#d1d5db",
            "trustBg": "#0a0a0a",
            "trustCardBg": "#1a1a1a",
            "trustCardTitle": "#ffffff"
        }
    })
}

/// A value is usable in a declaration when it cannot close the declaration or the block.
fn is_safe_css_value(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && !value
            .chars()
            .any(|c| matches!(c, ';' | '{' | '}' | '<' | '>' | '\\' | '\n' | '\r'))
}

/// Renders the override stylesheet for a config document.
pub fn render_css_overrides(config: &Value, generated_at: DateTime<Utc>) -> String {
    let mut variables = String::new();
    if let Some(colors) = config.get("colors") {
        for (key, variable) in COLOR_VARIABLES {
            match colors.get(key).and_then(Value::as_str) {
                Some(value) if is_safe_css_value(value) => {
                    variables.push_str(&format!("    {variable}: {value};\n"));
                }
                Some(value) => {
                    tracing::warn!(color = %key, value = %value, "ignoring unsafe css value");
                }
                None => {}
            }
        }
    }

    format!(
        "/* Auto-generated CSS overrides from Admin Panel */\n\
         /* Generated at: {} */\n\n\
         :root {{\n{}}}\n{}",
        generated_at.to_rfc3339(),
        variables,
        CSS_RULES
    )
}

#[derive(Clone)]
pub struct SiteSettingsStore {
    store: Arc<dyn KvStore>,
}

impl SiteSettingsStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Saved config, or the defaults when none was saved.
    pub async fn config(&self) -> Result<Value, StoreError> {
        Ok(get_json(self.store.as_ref(), CONFIG_KEY)
            .await?
            .unwrap_or_else(default_config))
    }

    /// Saves the config and regenerates the override stylesheet.
    pub async fn save_config(&self, config: &Value) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), CONFIG_KEY, config, None).await?;
        let css = render_css_overrides(config, Utc::now());
        set_json(self.store.as_ref(), CSS_KEY, &css, None).await?;
        tracing::info!("site config saved");
        Ok(())
    }

    /// Stylesheet for the current config.
    pub async fn css_overrides(&self) -> Result<String, StoreError> {
        match get_json::<String>(self.store.as_ref(), CSS_KEY).await? {
            Some(css) => Ok(css),
            None => Ok(render_css_overrides(&self.config().await?, Utc::now())),
        }
    }

    pub async fn theme(&self) -> Result<Theme, StoreError> {
        Ok(get_json(self.store.as_ref(), THEME_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), THEME_KEY, &theme, None).await
    }
}
