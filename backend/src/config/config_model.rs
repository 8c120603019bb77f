use domain::value_objects::{billing::BillingConfig, lifecycle_policy::LifecyclePolicy};
use infra::payments::stripe_client::StripeConfig;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: StripeConfig,
    pub billing: BillingConfig,
    pub lifecycle: LifecyclePolicy,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}
