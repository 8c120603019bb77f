pub mod stripe_client;
pub mod stripe_dto;
pub mod stripe_webhook;
