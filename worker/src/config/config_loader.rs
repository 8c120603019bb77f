use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use domain::value_objects::lifecycle_policy::LifecyclePolicy;
use infra::notifications::http_mailer::MailerConfig;

use super::config_model::{Database, DotEnvyConfig, Scheduler, WorkerServer};

const DAY_SECS: u64 = 24 * 60 * 60;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let worker_server = WorkerServer {
        port: parsed(&lookup, "SERVER_PORT_WORKER", None)?,
        body_limit: parsed(&lookup, "SERVER_BODY_LIMIT", Some(1))?,
        timeout: parsed(&lookup, "SERVER_TIMEOUT", Some(120))?,
    };

    let database = Database {
        url: required(&lookup, "DATABASE_URL")?,
        max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", Some(5))?,
    };

    let defaults = LifecyclePolicy::default();
    let lifecycle = LifecyclePolicy {
        follow_up_after_days: parsed(
            &lookup,
            "LIFECYCLE_FOLLOW_UP_AFTER_DAYS",
            Some(defaults.follow_up_after_days),
        )?,
        escalation_after_days: parsed(
            &lookup,
            "LIFECYCLE_ESCALATION_AFTER_DAYS",
            Some(defaults.escalation_after_days),
        )?,
        injunction_after_days: parsed(
            &lookup,
            "LIFECYCLE_INJUNCTION_AFTER_DAYS",
            Some(defaults.injunction_after_days),
        )?,
    };
    if lifecycle.follow_up_after_days < 0
        || lifecycle.escalation_after_days < 0
        || lifecycle.injunction_after_days < 0
    {
        bail!("LIFECYCLE_* thresholds must not be negative");
    }

    let mailer = MailerConfig {
        endpoint: required(&lookup, "MAILER_ENDPOINT")?,
        api_key: optional(&lookup, "MAILER_API_KEY"),
        sender: required(&lookup, "MAILER_SENDER")?,
        timeout: Duration::from_secs(parsed(&lookup, "MAILER_TIMEOUT_SECS", Some(10))?),
    };

    let interval_secs: u64 = parsed(&lookup, "SCHEDULER_INTERVAL_SECS", Some(DAY_SECS))?;
    if interval_secs == 0 {
        bail!("SCHEDULER_INTERVAL_SECS must be positive");
    }
    let scheduler = Scheduler {
        internal_token: optional(&lookup, "INTERNAL_SCHEDULER_TOKEN"),
        interval: Duration::from_secs(interval_secs),
        run_on_start: parsed(&lookup, "SCHEDULER_RUN_ON_START", Some(true))?,
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        lifecycle,
        mailer,
        scheduler,
    })
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).and_then(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    optional(lookup, key).with_context(|| format!("{key} is invalid"))
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
    match optional(lookup, key) {
        Some(raw) => raw.parse::<T>().with_context(|| format!("{key} is invalid")),
        None => default.with_context(|| format!("{key} is invalid")),
    }
}
