use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use domain::value_objects::{billing::BillingConfig, lifecycle_policy::LifecyclePolicy};
use infra::payments::{
    stripe_client::{STRIPE_API_BASE, StripeConfig},
    stripe_webhook::DEFAULT_TOLERANCE_SECS,
};

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let stage = Stage::try_from(&lookup("STAGE").unwrap_or_default()).unwrap_or_default();

    let backend_server = BackendServer {
        port: parsed(&lookup, "SERVER_PORT_BACKEND", None)?,
        body_limit: parsed(&lookup, "SERVER_BODY_LIMIT", Some(10))?,
        timeout: parsed(&lookup, "SERVER_TIMEOUT", Some(30))?,
    };

    let database = Database {
        url: required(&lookup, "DATABASE_URL")?,
        max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", Some(10))?,
    };

    let stripe = StripeConfig {
        secret_key: required(&lookup, "STRIPE_SECRET_KEY")?,
        webhook_secret: required(&lookup, "STRIPE_WEBHOOK_SECRET")?,
        api_base: lookup("STRIPE_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| STRIPE_API_BASE.to_string()),
        timeout: Duration::from_secs(parsed(&lookup, "STRIPE_TIMEOUT_SECS", Some(20))?),
        webhook_tolerance_secs: parsed(
            &lookup,
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            Some(DEFAULT_TOLERANCE_SECS),
        )?,
    };

    let billing = BillingConfig {
        subscription_price_id: required(&lookup, "STRIPE_SUBSCRIPTION_PRICE_ID")?,
        notice_fee_minor: parsed(&lookup, "NOTICE_FEE_AMOUNT_MINOR", None)?,
        currency: lookup("BILLING_CURRENCY")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "eur".to_string()),
    };
    if billing.notice_fee_minor < 0 {
        bail!("NOTICE_FEE_AMOUNT_MINOR must not be negative");
    }

    let lifecycle = lifecycle_policy(&lookup)?;

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        stripe,
        billing,
        lifecycle,
    })
}

pub fn lifecycle_policy(lookup: &impl Fn(&str) -> Option<String>) -> Result<LifecyclePolicy> {
    let defaults = LifecyclePolicy::default();
    let policy = LifecyclePolicy {
        follow_up_after_days: parsed(
            lookup,
            "LIFECYCLE_FOLLOW_UP_AFTER_DAYS",
            Some(defaults.follow_up_after_days),
        )?,
        escalation_after_days: parsed(
            lookup,
            "LIFECYCLE_ESCALATION_AFTER_DAYS",
            Some(defaults.escalation_after_days),
        )?,
        injunction_after_days: parsed(
            lookup,
            "LIFECYCLE_INJUNCTION_AFTER_DAYS",
            Some(defaults.injunction_after_days),
        )?,
    };

    if policy.follow_up_after_days < 0
        || policy.escalation_after_days < 0
        || policy.injunction_after_days < 0
    {
        bail!("LIFECYCLE_* thresholds must not be negative");
    }
    Ok(policy)
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{key} is invalid"))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<T>,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} is invalid")),
        None => default.with_context(|| format!("{key} is invalid")),
    }
}
