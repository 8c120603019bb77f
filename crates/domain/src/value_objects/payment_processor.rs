//! Validated views of processor objects.
//!
//! The gateway adapter decodes raw processor JSON once into these types; use cases
//! never touch the wire format.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::enums::subscription_statuses::SubscriptionStatus;

pub type Metadata = HashMap<String, String>;

pub mod metadata_keys {
    pub const PROCEDURE_ID: &str = "procedure_id";
    pub const USER_ID: &str = "user_id";
    pub const KIND: &str = "kind";
    pub const KIND_INJUNCTION: &str = "injunction";
    pub const COMPANY_EXTRACT_KEY: &str = "company_extract_key";
    pub const AFFIDAVIT_KEY: &str = "affidavit_key";
    pub const INJUNCTION_NOTE: &str = "injunction_note";
    pub const FAILURE_MESSAGE: &str = "failure_message";
    pub const RECEIPT_URL: &str = "receipt_url";
}

pub fn is_injunction_metadata(metadata: &Metadata) -> bool {
    metadata
        .get(metadata_keys::KIND)
        .is_some_and(|kind| kind == metadata_keys::KIND_INJUNCTION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub status: SessionStatus,
    pub payment_status: SessionPaymentStatus,
    pub payment_intent_id: Option<String>,
    pub invoice_id: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub amount_total_minor: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

/// Outcome of a payment as far as the engine is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: Option<String>,
    pub latest_charge_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub last_payment_error: Option<String>,
}

impl PaymentIntent {
    /// `requires_payment_method` after an attempt (an error is attached) is a definitive decline.
    pub fn settlement(&self) -> Settlement {
        match self.status {
            IntentStatus::Succeeded => Settlement::Succeeded,
            IntentStatus::Canceled => Settlement::Failed,
            IntentStatus::RequiresPaymentMethod if self.last_payment_error.is_some() => {
                Settlement::Failed
            }
            _ => Settlement::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub id: String,
    pub status: ChargeStatus,
    pub failure_message: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub status: InvoiceStatus,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorSubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl ProcessorSubscriptionStatus {
    /// Collapses processor-only states onto the stored status set.
    pub fn to_local(self) -> SubscriptionStatus {
        match self {
            ProcessorSubscriptionStatus::Trialing => SubscriptionStatus::Trialing,
            ProcessorSubscriptionStatus::Active => SubscriptionStatus::Active,
            ProcessorSubscriptionStatus::PastDue | ProcessorSubscriptionStatus::Paused => {
                SubscriptionStatus::PastDue
            }
            ProcessorSubscriptionStatus::Unpaid | ProcessorSubscriptionStatus::Incomplete => {
                SubscriptionStatus::Unpaid
            }
            ProcessorSubscriptionStatus::Canceled
            | ProcessorSubscriptionStatus::IncompleteExpired => SubscriptionStatus::Canceled,
        }
    }

    /// Ranking used when several subscriptions exist for one customer.
    pub fn selection_rank(self) -> u8 {
        match self {
            ProcessorSubscriptionStatus::Active | ProcessorSubscriptionStatus::Trialing => 0,
            ProcessorSubscriptionStatus::Incomplete => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: ProcessorSubscriptionStatus,
    pub price_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created: DateTime<Utc>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionListFilter {
    All,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub metadata: Metadata,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceItemRequest {
    pub customer_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    /// Attach to the subscription's upcoming invoice instead of a one-off invoice.
    pub subscription_id: Option<String>,
    pub metadata: Metadata,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRequest {
    pub customer_id: String,
    pub description: String,
    pub metadata: Metadata,
    pub idempotency_key: String,
}

/// Everything reconciliation needs to know about one payment, resolved from a
/// session or an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSnapshot {
    pub intent_id: String,
    pub settlement: Settlement,
    pub amount_minor: i64,
    pub currency: String,
    pub charge_id: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub failure_message: Option<String>,
}

impl PaymentSnapshot {
    pub fn from_intent(intent: PaymentIntent) -> Self {
        Self {
            settlement: intent.settlement(),
            intent_id: intent.id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            charge_id: intent.latest_charge_id,
            customer_id: intent.customer_id,
            description: intent.description,
            metadata: intent.metadata,
            failure_message: intent.last_payment_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEventKind {
    CheckoutSessionCompleted,
    CheckoutSessionAsyncPaymentSucceeded,
    CheckoutSessionAsyncPaymentFailed,
    CheckoutSessionExpired,
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    SubscriptionChanged,
    InvoicePaid,
    Other(String),
}

impl ProcessorEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.async_payment_succeeded" => {
                Self::CheckoutSessionAsyncPaymentSucceeded
            }
            "checkout.session.async_payment_failed" => Self::CheckoutSessionAsyncPaymentFailed,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentFailed,
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => Self::SubscriptionChanged,
            "invoice.paid" => Self::InvoicePaid,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Verified webhook event reduced to the fields the engine routes on.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorEvent {
    pub id: String,
    pub kind: ProcessorEventKind,
    pub object_id: String,
    pub metadata: Metadata,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}
