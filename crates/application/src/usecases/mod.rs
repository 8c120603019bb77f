pub mod case_records;
pub mod injunction_payment;
pub mod payment_records;
pub mod payment_reconciliation;
pub mod payment_snapshots;
pub mod procedure_actions;
pub mod procedure_transitions;
pub mod processor_events;
pub mod subscription_sync;
pub mod temporal_transitions;
