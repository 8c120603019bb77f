use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use domain::{
    repositories::payment_gateway::{GatewayError, GatewayResult, PaymentGateway},
    value_objects::payment_processor::{
        Charge, CheckoutSession, Invoice, InvoiceItem, InvoiceItemRequest, InvoiceRequest,
        PaymentIntent, ProcessorEvent, ProcessorSubscription, SubscriptionListFilter,
        SubscriptionRequest,
    },
};

use super::{
    stripe_dto::{
        StripeCharge, StripeCheckoutSession, StripeErrorEnvelope, StripeInvoice,
        StripeInvoiceItem, StripeList, StripePaymentIntent, StripeSubscription, metadata_form,
    },
    stripe_webhook,
};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

const LIST_LIMIT: &str = "100";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub timeout: Duration,
    pub webhook_tolerance_secs: i64,
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

type Form = Vec<(String, String)>;

impl StripeClient {
    pub fn new(config: StripeConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        form: Option<Form>,
        idempotency_key: Option<&str>,
        context: &str,
    ) -> GatewayResult<T> {
        let mut request = self
            .http
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.secret_key));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(form) = form {
            request = request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .form(&form);
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let resp = request.send().await.map_err(|err| {
            error!(error = %err, context = %context, "stripe request did not complete");
            GatewayError::Unavailable(format!("{context}: {err}"))
        })?;
        let resp = Self::ensure_success(resp, context).await?;

        let body = resp
            .text()
            .await
            .map_err(|err| GatewayError::Unavailable(format!("{context}: {err}")))?;
        serde_json::from_str::<T>(&body)
            .map_err(|err| GatewayError::InvalidPayload(format!("{context}: {err}")))
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let stripe_error_message = details.as_ref().and_then(|d| d.message.clone());

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        Err(classify(status, context, stripe_error_message))
    }
}

fn classify(status: StatusCode, context: &str, message: Option<String>) -> GatewayError {
    let detail = message.unwrap_or_else(|| status.to_string());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GatewayError::Unavailable(format!("{context}: {detail}"))
    } else if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(context.to_string())
    } else {
        GatewayError::Rejected(format!("{context}: {detail}"))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn retrieve_checkout_session(&self, session_id: &str) -> GatewayResult<CheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/retrieve
        let raw: StripeCheckoutSession = self
            .send(
                Method::GET,
                &format!("checkout/sessions/{session_id}"),
                &[],
                None,
                None,
                "retrieve checkout session",
            )
            .await?;
        raw.try_into()
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent> {
        let raw: StripePaymentIntent = self
            .send(
                Method::GET,
                &format!("payment_intents/{intent_id}"),
                &[],
                None,
                None,
                "retrieve payment intent",
            )
            .await?;
        raw.try_into()
    }

    async fn retrieve_charge(&self, charge_id: &str) -> GatewayResult<Charge> {
        let raw: StripeCharge = self
            .send(
                Method::GET,
                &format!("charges/{charge_id}"),
                &[],
                None,
                None,
                "retrieve charge",
            )
            .await?;
        raw.try_into()
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice> {
        let raw: StripeInvoice = self
            .send(
                Method::GET,
                &format!("invoices/{invoice_id}"),
                &[],
                None,
                None,
                "retrieve invoice",
            )
            .await?;
        raw.try_into()
    }

    async fn list_invoices(&self, customer_id: &str) -> GatewayResult<Vec<Invoice>> {
        let raw: StripeList<StripeInvoice> = self
            .send(
                Method::GET,
                "invoices",
                &[("customer", customer_id), ("limit", LIST_LIMIT)],
                None,
                None,
                "list invoices",
            )
            .await?;
        if raw.has_more {
            debug!(%customer_id, "stripe invoice list truncated to first page");
        }
        raw.data.into_iter().map(Invoice::try_from).collect()
    }

    async fn create_invoice_item(&self, request: InvoiceItemRequest) -> GatewayResult<InvoiceItem> {
        // https://stripe.com/docs/api/invoiceitems/create
        let mut form: Form = vec![
            ("customer".to_string(), request.customer_id),
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency),
            ("description".to_string(), request.description),
        ];
        if let Some(subscription_id) = request.subscription_id {
            form.push(("subscription".to_string(), subscription_id));
        }
        form.extend(metadata_form(&request.metadata));

        let raw: StripeInvoiceItem = self
            .send(
                Method::POST,
                "invoiceitems",
                &[],
                Some(form),
                Some(&request.idempotency_key),
                "create invoice item",
            )
            .await?;
        Ok(raw.into())
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> GatewayResult<Invoice> {
        let mut form: Form = vec![
            ("customer".to_string(), request.customer_id),
            ("description".to_string(), request.description),
            (
                "pending_invoice_items_behavior".to_string(),
                "include".to_string(),
            ),
            ("auto_advance".to_string(), "true".to_string()),
        ];
        form.extend(metadata_form(&request.metadata));

        let raw: StripeInvoice = self
            .send(
                Method::POST,
                "invoices",
                &[],
                Some(form),
                Some(&request.idempotency_key),
                "create invoice",
            )
            .await?;
        raw.try_into()
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice> {
        let raw: StripeInvoice = self
            .send(
                Method::POST,
                &format!("invoices/{invoice_id}/finalize"),
                &[],
                Some(Vec::new()),
                Some(&format!("finalize-{invoice_id}")),
                "finalize invoice",
            )
            .await?;
        raw.try_into()
    }

    async fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> GatewayResult<ProcessorSubscription> {
        // https://stripe.com/docs/api/subscriptions/create
        let mut form: Form = vec![
            ("customer".to_string(), request.customer_id),
            ("items[0][price]".to_string(), request.price_id),
        ];
        form.extend(metadata_form(&request.metadata));

        let raw: StripeSubscription = self
            .send(
                Method::POST,
                "subscriptions",
                &[],
                Some(form),
                Some(&request.idempotency_key),
                "create subscription",
            )
            .await?;
        raw.try_into()
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()> {
        // https://stripe.com/docs/api/subscriptions/cancel
        let _: StripeSubscription = self
            .send(
                Method::DELETE,
                &format!("subscriptions/{subscription_id}"),
                &[],
                None,
                None,
                "cancel subscription",
            )
            .await?;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> GatewayResult<ProcessorSubscription> {
        let raw: StripeSubscription = self
            .send(
                Method::GET,
                &format!("subscriptions/{subscription_id}"),
                &[],
                None,
                None,
                "retrieve subscription",
            )
            .await?;
        raw.try_into()
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        filter: SubscriptionListFilter,
    ) -> GatewayResult<Vec<ProcessorSubscription>> {
        let status = match filter {
            SubscriptionListFilter::All => "all",
            SubscriptionListFilter::Active => "active",
        };
        let raw: StripeList<StripeSubscription> = self
            .send(
                Method::GET,
                "subscriptions",
                &[
                    ("customer", customer_id),
                    ("status", status),
                    ("limit", LIST_LIMIT),
                ],
                None,
                None,
                "list subscriptions",
            )
            .await?;
        raw.data
            .into_iter()
            .map(ProcessorSubscription::try_from)
            .collect()
    }

    fn verify_webhook(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> GatewayResult<ProcessorEvent> {
        stripe_webhook::verify_signature(
            &self.config.webhook_secret,
            payload,
            signature_header,
            Utc::now(),
            self.config.webhook_tolerance_secs,
        )?;
        stripe_webhook::decode_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_base: &str) -> StripeClient {
        StripeClient::new(StripeConfig {
            secret_key: "sk_test".into(),
            webhook_secret: "whsec_test".into(),
            api_base: api_base.into(),
            timeout: Duration::from_secs(5),
            webhook_tolerance_secs: stripe_webhook::DEFAULT_TOLERANCE_SECS,
        })
        .unwrap()
    }

    #[test]
    fn throttling_and_outages_are_retryable() {
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "ctx", None).is_retryable());
        assert!(classify(StatusCode::BAD_GATEWAY, "ctx", None).is_retryable());
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, "retrieve charge", None),
            GatewayError::NotFound(_)
        ));
        let rejected = classify(
            StatusCode::BAD_REQUEST,
            "create invoice",
            Some("No such customer".into()),
        );
        assert!(!rejected.is_retryable());
        assert!(rejected.to_string().contains("No such customer"));
    }

    #[test]
    fn urls_tolerate_a_trailing_slash() {
        assert_eq!(
            client("http://localhost:12111/").url("payment_intents/pi_1"),
            "http://localhost:12111/v1/payment_intents/pi_1"
        );
    }

    #[test]
    fn webhook_signed_with_the_configured_secret_is_decoded() {
        let payload = r#"{"id":"evt_9","type":"payment_intent.succeeded","data":{"object":{"id":"pi_9","object":"payment_intent","metadata":{}}}}"#;
        let header = stripe_webhook::sign("whsec_test", payload, Utc::now().timestamp());

        let event = client(STRIPE_API_BASE)
            .verify_webhook(payload, &header)
            .unwrap();
        assert_eq!(event.object_id, "pi_9");

        assert!(matches!(
            client(STRIPE_API_BASE).verify_webhook(payload, "t=1,v1=00"),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn unreachable_api_is_unavailable() {
        let err = client("http://127.0.0.1:9")
            .retrieve_payment_intent("pi_1")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
