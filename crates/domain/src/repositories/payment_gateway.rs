use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::value_objects::payment_processor::{
    Charge, CheckoutSession, Invoice, InvoiceItem, InvoiceItemRequest, InvoiceRequest,
    PaymentIntent, ProcessorEvent, ProcessorSubscription, SubscriptionListFilter,
    SubscriptionRequest,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Timeout, connection failure, 429 or 5xx.
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
    #[error("payment processor has no {0}")]
    NotFound(String),
    #[error("payment processor rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected payment processor payload: {0}")]
    InvalidPayload(String),
    #[error("invalid webhook signature")]
    InvalidSignature,
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Read and create operations against the payment processor. Never touches local state.
#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn retrieve_checkout_session(&self, session_id: &str) -> GatewayResult<CheckoutSession>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent>;

    async fn retrieve_charge(&self, charge_id: &str) -> GatewayResult<Charge>;

    async fn retrieve_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice>;

    async fn list_invoices(&self, customer_id: &str) -> GatewayResult<Vec<Invoice>>;

    async fn create_invoice_item(&self, request: InvoiceItemRequest) -> GatewayResult<InvoiceItem>;

    async fn create_invoice(&self, request: InvoiceRequest) -> GatewayResult<Invoice>;

    async fn finalize_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice>;

    async fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> GatewayResult<ProcessorSubscription>;

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> GatewayResult<ProcessorSubscription>;

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        filter: SubscriptionListFilter,
    ) -> GatewayResult<Vec<ProcessorSubscription>>;

    /// Checks the signature header and decodes the event.
    fn verify_webhook(&self, payload: &str, signature_header: &str)
    -> GatewayResult<ProcessorEvent>;
}
