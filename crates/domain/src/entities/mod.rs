pub mod comments;
pub mod documents;
pub mod payment_provider_customers;
pub mod payments;
pub mod procedures;
pub mod subscriptions;
