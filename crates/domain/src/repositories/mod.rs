pub mod app_users;
pub mod comments;
pub mod documents;
pub mod notifier;
pub mod payment_gateway;
pub mod payment_provider_customers;
pub mod payments;
pub mod procedures;
pub mod store_error;
pub mod subscriptions;
