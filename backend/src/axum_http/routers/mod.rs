pub mod payments;
pub mod procedures;
pub mod stripe_webhook;
pub mod subscriptions;
