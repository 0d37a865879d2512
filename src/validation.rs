//! Form field validation and the scored email check behind `/api/validate-email`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ABSTRACT_API_URL: &str = "https://emailvalidation.abstractapi.com/v1/";
const DOMAIN_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const EXTERNAL_API_TIMEOUT: Duration = Duration::from_secs(8);

lazy_static! {
    /// Loose address shape used by the intake forms.
    pub static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    static ref STRICT_EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .unwrap();

    /// Submission ids end up in blueprint links, so they stay URL-safe.
    static ref SUBMISSION_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._-]{1,128}$").unwrap();

    static ref SUSPICIOUS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(test|demo|fake|example|sample|temp|spam|noreply)\d*@").unwrap(),
        Regex::new(r"^\d+@").unwrap(),
        Regex::new(r"(?i)^[a-z]@").unwrap(),
    ];
}

const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "guerrillamail.com",
    "mailinator.com",
    "tempmail.org",
    "yopmail.com",
    "throwaway.email",
    "temp-mail.org",
    "getnada.com",
    "maildrop.cc",
    "sharklasers.com",
    "grr.la",
    "guerrillamailblock.com",
    "pokemail.net",
    "spam4.me",
    "bccto.me",
    "chacuo.net",
    "dispostable.com",
    "fake-mail.ml",
    "fakeinbox.com",
];

const ROLE_ACCOUNTS: &[&str] = &[
    "admin",
    "administrator",
    "support",
    "help",
    "info",
    "contact",
    "sales",
    "marketing",
    "noreply",
    "no-reply",
    "billing",
    "accounts",
    "webmaster",
    "postmaster",
    "hostmaster",
    "abuse",
    "security",
    "privacy",
    "legal",
    "compliance",
];

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn is_valid_submission_id(id: &str) -> bool {
    SUBMISSION_ID_REGEX.is_match(id)
}

/// A full name needs a first and a last part.
pub fn is_valid_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub valid: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl CheckOutcome {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
            skipped: false,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            skipped: false,
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
            skipped: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChecks {
    pub syntax: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposable: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_base: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<CheckOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailValidation {
    pub valid: bool,
    pub email: String,
    pub checks: EmailChecks,
    pub reason: String,
    pub confidence: u32,
    pub risk_level: RiskLevel,
}

pub fn check_syntax(email: &str) -> CheckOutcome {
    if !STRICT_EMAIL_REGEX.is_match(email) {
        return CheckOutcome::fail("Invalid email format");
    }
    let Some((local, domain)) = email.split_once('@') else {
        return CheckOutcome::fail("Invalid email format");
    };
    if local.len() > 64 {
        return CheckOutcome::fail("Local part too long");
    }
    if domain.len() > 253 {
        return CheckOutcome::fail("Domain too long");
    }
    CheckOutcome::pass("Valid syntax")
}

pub fn check_disposable(domain: &str) -> CheckOutcome {
    if DISPOSABLE_DOMAINS.contains(&domain) {
        CheckOutcome::fail("Disposable email provider")
    } else {
        CheckOutcome::pass("Not disposable")
    }
}

pub fn check_role_based(local: &str) -> CheckOutcome {
    if ROLE_ACCOUNTS.contains(&local) {
        CheckOutcome::fail("Role-based email address")
    } else {
        CheckOutcome::pass("Personal email")
    }
}

/// Length of the run of identical characters that ends the local part.
fn trailing_run(local: &str) -> usize {
    let mut chars = local.chars().rev();
    let Some(last) = chars.next() else {
        return 0;
    };
    1 + chars.take_while(|c| *c == last).count()
}

pub fn check_patterns(email: &str) -> CheckOutcome {
    let local = email.split('@').next().unwrap_or_default();
    let suspicious =
        SUSPICIOUS_PATTERNS.iter().any(|p| p.is_match(email)) || trailing_run(local) >= 5;
    if suspicious {
        CheckOutcome::fail("Suspicious email pattern")
    } else {
        CheckOutcome::pass("Normal pattern")
    }
}

/// Combines the checks into a confidence percentage and a verdict.
pub fn score(checks: &EmailChecks) -> (bool, u32, RiskLevel, String) {
    match &checks.syntax {
        Some(syntax) if syntax.valid => {}
        Some(syntax) => return (false, 0, RiskLevel::High, syntax.reason.clone()),
        None => return (false, 0, RiskLevel::High, "Invalid email format".to_string()),
    }

    let mut score = 20u32;
    let mut max = 20u32;
    let mut reasons = Vec::new();

    let weighted = [
        (&checks.domain, 25, "Domain issues"),
        (&checks.disposable, 20, "Disposable email"),
        (&checks.role_base, 10, "Role-based email"),
        (&checks.patterns, 15, "Suspicious pattern"),
    ];
    for (check, weight, label) in weighted {
        max += weight;
        match check {
            Some(outcome) if outcome.valid => score += weight,
            _ => reasons.push(label),
        }
    }

    if let Some(external) = checks.external.as_ref().filter(|e| !e.skipped) {
        max += 10;
        if external.valid {
            score += 10;
        } else {
            reasons.push("External validation failed");
        }
    }

    let confidence = ((score as f64 / max as f64) * 100.0).round() as u32;
    let (valid, risk) = match confidence {
        c if c >= 80 => (true, RiskLevel::Low),
        c if c >= 60 => (true, RiskLevel::Medium),
        _ => (false, RiskLevel::High),
    };
    let reason = if reasons.is_empty() {
        "Email appears valid".to_string()
    } else {
        reasons.join(", ")
    };
    (valid, confidence, risk, reason)
}

#[derive(Debug, Deserialize)]
struct AbstractResponse {
    deliverability: Option<String>,
}

#[derive(Clone)]
pub struct EmailValidator {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl EmailValidator {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    pub async fn validate(&self, email: &str) -> EmailValidation {
        let normalized = email.trim().to_lowercase();
        let syntax = check_syntax(email.trim());
        let syntax_ok = syntax.valid;
        let mut checks = EmailChecks {
            syntax: Some(syntax),
            ..EmailChecks::default()
        };

        if let Some((local, domain)) = normalized.split_once('@').filter(|_| syntax_ok) {
            checks.disposable = Some(check_disposable(domain));
            checks.domain = Some(self.check_domain(domain).await);
            checks.role_base = Some(check_role_based(local));
            checks.patterns = Some(check_patterns(&normalized));
            checks.external = Some(self.check_external(&normalized).await);
        }

        let (valid, confidence, risk_level, reason) = score(&checks);
        tracing::debug!(confidence, valid, "email validated");
        EmailValidation {
            valid,
            email: normalized,
            checks,
            reason,
            confidence,
            risk_level,
        }
    }

    /// The domain must resolve. Mail-exchanger records are not consulted.
    async fn check_domain(&self, domain: &str) -> CheckOutcome {
        let lookup = tokio::net::lookup_host((domain, 25u16));
        match tokio::time::timeout(DOMAIN_LOOKUP_TIMEOUT, lookup).await {
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    CheckOutcome::pass("Domain resolves")
                } else {
                    CheckOutcome::fail("Domain does not exist")
                }
            }
            Ok(Err(_)) => CheckOutcome::fail("Domain does not exist"),
            Err(_) => CheckOutcome::fail("Domain lookup timed out"),
        }
    }

    async fn check_external(&self, email: &str) -> CheckOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return CheckOutcome::skip("External validation not configured");
        };

        let response = self
            .http
            .get(ABSTRACT_API_URL)
            .timeout(EXTERNAL_API_TIMEOUT)
            .query(&[("api_key", api_key), ("email", email)])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let data = match response {
            Ok(r) => r.json::<AbstractResponse>().await,
            Err(e) => Err(e),
        };

        match data {
            Ok(AbstractResponse {
                deliverability: Some(deliverability),
            }) => {
                let reason = format!("External API: {deliverability}");
                if deliverability == "DELIVERABLE" {
                    CheckOutcome::pass(reason)
                } else {
                    CheckOutcome::fail(reason)
                }
            }
            Ok(_) => CheckOutcome::skip("External validation unavailable"),
            Err(e) => {
                tracing::warn!(error = %e, "external email validation failed");
                CheckOutcome::skip("External validation unavailable")
            }
        }
    }
}
