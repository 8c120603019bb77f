//! Wire shapes of the Stripe REST API, decoded once here and converted into the
//! processor value objects the use cases work with.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use domain::{
    repositories::payment_gateway::GatewayError,
    value_objects::payment_processor::{
        Charge, ChargeStatus, CheckoutSession, IntentStatus, Invoice, InvoiceItem, InvoiceStatus,
        Metadata, PaymentIntent, ProcessorEvent, ProcessorEventKind, ProcessorSubscription,
        ProcessorSubscriptionStatus, SessionPaymentStatus, SessionStatus,
    },
};

/// Expandable references arrive either as a bare id or as the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StripeRef {
    Id(String),
    Object { id: String },
}

impl StripeRef {
    pub fn into_id(self) -> String {
        match self {
            StripeRef::Id(id) | StripeRef::Object { id } => id,
        }
    }
}

fn ref_id(reference: Option<StripeRef>) -> Option<String> {
    reference.map(StripeRef::into_id)
}

fn timestamp(seconds: i64, field: &str) -> Result<DateTime<Utc>, GatewayError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| GatewayError::InvalidPayload(format!("{field} out of range: {seconds}")))
}

fn optional_timestamp(
    seconds: Option<i64>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, GatewayError> {
    seconds.map(|s| timestamp(s, field)).transpose()
}

fn unknown(kind: &str, value: &str) -> GatewayError {
    GatewayError::InvalidPayload(format!("unknown {kind} `{value}`"))
}

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorDetails {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub param: Option<String>,
    pub decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub status: Option<String>,
    pub payment_status: String,
    pub payment_intent: Option<StripeRef>,
    pub invoice: Option<StripeRef>,
    pub subscription: Option<StripeRef>,
    pub customer: Option<StripeRef>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl TryFrom<StripeCheckoutSession> for CheckoutSession {
    type Error = GatewayError;

    fn try_from(raw: StripeCheckoutSession) -> Result<Self, Self::Error> {
        let status = match raw.status.as_deref() {
            Some("open") | None => SessionStatus::Open,
            Some("complete") => SessionStatus::Complete,
            Some("expired") => SessionStatus::Expired,
            Some(other) => return Err(unknown("checkout session status", other)),
        };
        let payment_status = match raw.payment_status.as_str() {
            "paid" => SessionPaymentStatus::Paid,
            "unpaid" => SessionPaymentStatus::Unpaid,
            "no_payment_required" => SessionPaymentStatus::NoPaymentRequired,
            other => return Err(unknown("checkout payment status", other)),
        };

        Ok(CheckoutSession {
            id: raw.id,
            status,
            payment_status,
            payment_intent_id: ref_id(raw.payment_intent),
            invoice_id: ref_id(raw.invoice),
            subscription_id: ref_id(raw.subscription),
            customer_id: ref_id(raw.customer),
            amount_total_minor: raw.amount_total,
            currency: raw.currency,
            metadata: raw.metadata.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeLastPaymentError {
    pub message: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub customer: Option<StripeRef>,
    pub latest_charge: Option<StripeRef>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub last_payment_error: Option<StripeLastPaymentError>,
}

impl TryFrom<StripePaymentIntent> for PaymentIntent {
    type Error = GatewayError;

    fn try_from(raw: StripePaymentIntent) -> Result<Self, Self::Error> {
        let status = match raw.status.as_str() {
            "requires_payment_method" => IntentStatus::RequiresPaymentMethod,
            "requires_confirmation" => IntentStatus::RequiresConfirmation,
            "requires_action" => IntentStatus::RequiresAction,
            "processing" => IntentStatus::Processing,
            "requires_capture" => IntentStatus::RequiresCapture,
            "canceled" => IntentStatus::Canceled,
            "succeeded" => IntentStatus::Succeeded,
            other => return Err(unknown("payment intent status", other)),
        };

        let last_payment_error = raw.last_payment_error.map(|err| {
            err.message
                .or(err.code)
                .unwrap_or_else(|| "payment failed".to_string())
        });

        Ok(PaymentIntent {
            id: raw.id,
            status,
            amount_minor: raw.amount,
            currency: raw.currency,
            customer_id: ref_id(raw.customer),
            latest_charge_id: ref_id(raw.latest_charge),
            description: raw.description,
            metadata: raw.metadata.unwrap_or_default(),
            last_payment_error,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub status: String,
    pub failure_message: Option<String>,
    pub receipt_url: Option<String>,
}

impl TryFrom<StripeCharge> for Charge {
    type Error = GatewayError;

    fn try_from(raw: StripeCharge) -> Result<Self, Self::Error> {
        let status = match raw.status.as_str() {
            "succeeded" => ChargeStatus::Succeeded,
            "pending" => ChargeStatus::Pending,
            "failed" => ChargeStatus::Failed,
            other => return Err(unknown("charge status", other)),
        };
        Ok(Charge {
            id: raw.id,
            status,
            failure_message: raw.failure_message,
            receipt_url: raw.receipt_url,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub status: Option<String>,
    pub customer: Option<StripeRef>,
    pub subscription: Option<StripeRef>,
    pub payment_intent: Option<StripeRef>,
    pub created: i64,
}

impl TryFrom<StripeInvoice> for Invoice {
    type Error = GatewayError;

    fn try_from(raw: StripeInvoice) -> Result<Self, Self::Error> {
        let status = match raw.status.as_deref() {
            Some("draft") | None => InvoiceStatus::Draft,
            Some("open") => InvoiceStatus::Open,
            Some("paid") => InvoiceStatus::Paid,
            Some("uncollectible") => InvoiceStatus::Uncollectible,
            Some("void") => InvoiceStatus::Void,
            Some(other) => return Err(unknown("invoice status", other)),
        };
        Ok(Invoice {
            id: raw.id,
            status,
            customer_id: ref_id(raw.customer),
            subscription_id: ref_id(raw.subscription),
            payment_intent_id: ref_id(raw.payment_intent),
            created: timestamp(raw.created, "invoice.created")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceItem {
    pub id: String,
    pub invoice: Option<StripeRef>,
}

impl From<StripeInvoiceItem> for InvoiceItem {
    fn from(raw: StripeInvoiceItem) -> Self {
        InvoiceItem {
            id: raw.id,
            invoice_id: ref_id(raw.invoice),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: StripeRef,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub created: i64,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripeRef>,
}

impl StripeSubscription {
    /// Returns the subscription period start timestamp, falling back to the first item
    /// or the billing cycle anchor when the top-level field is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .or(self.billing_cycle_anchor)
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

impl TryFrom<StripeSubscription> for ProcessorSubscription {
    type Error = GatewayError;

    fn try_from(raw: StripeSubscription) -> Result<Self, Self::Error> {
        let status = match raw.status.as_str() {
            "trialing" => ProcessorSubscriptionStatus::Trialing,
            "active" => ProcessorSubscriptionStatus::Active,
            "past_due" => ProcessorSubscriptionStatus::PastDue,
            "unpaid" => ProcessorSubscriptionStatus::Unpaid,
            "canceled" => ProcessorSubscriptionStatus::Canceled,
            "incomplete" => ProcessorSubscriptionStatus::Incomplete,
            "incomplete_expired" => ProcessorSubscriptionStatus::IncompleteExpired,
            "paused" => ProcessorSubscriptionStatus::Paused,
            other => return Err(unknown("subscription status", other)),
        };
        let current_period_start =
            optional_timestamp(raw.period_start(), "subscription.current_period_start")?;
        let current_period_end =
            optional_timestamp(raw.period_end(), "subscription.current_period_end")?;
        let price_id = raw
            .items
            .data
            .into_iter()
            .find_map(|item| item.price)
            .map(StripeRef::into_id);

        Ok(ProcessorSubscription {
            id: raw.id,
            customer_id: raw.customer.into_id(),
            status,
            price_id,
            current_period_start,
            current_period_end,
            cancel_at_period_end: raw.cancel_at_period_end,
            created: timestamp(raw.created, "subscription.created")?,
            metadata: raw.metadata.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: StripeEventObject,
}

/// The fields the engine reads from any event object, whatever its type.
#[derive(Debug, Deserialize)]
pub struct StripeEventObject {
    pub id: String,
    pub object: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub customer: Option<StripeRef>,
    pub subscription: Option<StripeRef>,
}

impl From<StripeEvent> for ProcessorEvent {
    fn from(raw: StripeEvent) -> Self {
        let object = raw.data.object;
        ProcessorEvent {
            id: raw.id,
            kind: ProcessorEventKind::from_type(&raw.type_),
            object_id: object.id,
            metadata: object.metadata.unwrap_or_default(),
            customer_id: ref_id(object.customer),
            subscription_id: ref_id(object.subscription),
        }
    }
}

/// Form-encoded `metadata[key]=value` pairs.
pub fn metadata_form(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = metadata
        .iter()
        .map(|(key, value)| (format!("metadata[{key}]"), value.clone()))
        .collect();
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::value_objects::payment_processor::Settlement;
    use serde_json::json;

    #[test]
    fn declined_intent_decodes_as_failed() {
        let raw: StripePaymentIntent = serde_json::from_value(json!({
            "id": "pi_2",
            "object": "payment_intent",
            "status": "requires_payment_method",
            "amount": 11880,
            "currency": "eur",
            "customer": "cus_1",
            "latest_charge": "ch_2",
            "description": null,
            "metadata": { "procedure_id": "8f0e6a44-7b1c-4d5e-9c55-3f0bb2a1c001" },
            "last_payment_error": { "code": "card_declined", "message": "Your card was declined." }
        }))
        .unwrap();

        let intent = PaymentIntent::try_from(raw).unwrap();
        assert_eq!(intent.settlement(), Settlement::Failed);
        assert_eq!(intent.latest_charge_id.as_deref(), Some("ch_2"));
        assert_eq!(
            intent.last_payment_error.as_deref(),
            Some("Your card was declined.")
        );
    }

    #[test]
    fn expanded_references_collapse_to_ids() {
        let raw: StripeCheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "status": "complete",
            "payment_status": "paid",
            "payment_intent": { "id": "pi_1", "object": "payment_intent" },
            "invoice": null,
            "subscription": null,
            "customer": "cus_1",
            "amount_total": 11880,
            "currency": "eur",
            "metadata": {}
        }))
        .unwrap();

        let session = CheckoutSession::try_from(raw).unwrap();
        assert_eq!(session.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(session.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.payment_status, SessionPaymentStatus::Paid);
    }

    #[test]
    fn unknown_status_is_an_invalid_payload() {
        let raw: StripeCharge = serde_json::from_value(json!({
            "id": "ch_1",
            "status": "disputed",
            "failure_message": null,
            "receipt_url": null
        }))
        .unwrap();

        assert!(matches!(
            Charge::try_from(raw),
            Err(GatewayError::InvalidPayload(_))
        ));
    }

    #[test]
    fn subscription_period_falls_back_to_items() {
        let raw: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "incomplete_expired",
            "cancel_at_period_end": false,
            "created": 1_700_000_000,
            "metadata": null,
            "items": { "data": [{
                "current_period_start": 1_700_000_000,
                "current_period_end": 1_702_592_000,
                "price": { "id": "price_basic", "object": "price" }
            }]}
        }))
        .unwrap();

        let subscription = ProcessorSubscription::try_from(raw).unwrap();
        assert_eq!(
            subscription.status,
            ProcessorSubscriptionStatus::IncompleteExpired
        );
        assert_eq!(subscription.price_id.as_deref(), Some("price_basic"));
        assert_eq!(
            subscription.current_period_end.map(|at| at.timestamp()),
            Some(1_702_592_000)
        );
        assert!(subscription.metadata.is_empty());
    }

    #[test]
    fn invoice_event_carries_its_subscription() {
        let raw: StripeEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": {
                "id": "in_1",
                "object": "invoice",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": {}
            }}
        }))
        .unwrap();

        let event = ProcessorEvent::from(raw);
        assert_eq!(event.kind, ProcessorEventKind::InvoicePaid);
        assert_eq!(event.object_id, "in_1");
        assert_eq!(event.subscription_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn metadata_form_is_stable() {
        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), "u".to_string());
        metadata.insert("procedure_id".to_string(), "p".to_string());

        assert_eq!(
            metadata_form(&metadata),
            vec![
                ("metadata[procedure_id]".to_string(), "p".to_string()),
                ("metadata[user_id]".to_string(), "u".to_string()),
            ]
        );
    }
}
