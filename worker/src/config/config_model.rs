use std::time::Duration;

use domain::value_objects::lifecycle_policy::LifecyclePolicy;
use infra::notifications::http_mailer::MailerConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub lifecycle: LifecyclePolicy,
    pub mailer: MailerConfig,
    pub scheduler: Scheduler,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Bearer token for the manual trigger; the route answers 503 without one.
    pub internal_token: Option<String>,
    pub interval: Duration,
    pub run_on_start: bool,
}
