pub mod billing;
pub mod enums;
pub mod installments;
pub mod lifecycle;
pub mod lifecycle_policy;
pub mod payment_processor;
pub mod reconciliation;
pub mod signatures;
