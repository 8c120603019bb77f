pub mod postgres_connection;
pub mod repositories;
pub mod store_errors;
