use std::sync::Arc;

use domain::{
    repositories::payment_gateway::{GatewayError, PaymentGateway},
    value_objects::{
        payment_processor::{ProcessorEvent, ProcessorEventKind, is_injunction_metadata},
        reconciliation::{PaymentReference, ReconcileCommand, ReconcileReport},
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{
    injunction_payment::InjunctionPaymentUseCase,
    payment_reconciliation::{PaymentReconciliationUseCase, ReconciliationError, procedure_id_from},
    subscription_sync::{SubscriptionSyncError, SubscriptionSyncUseCase},
};

#[derive(Debug, Error)]
pub enum ProcessorEventError {
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionSyncError),
}

impl ProcessorEventError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorEventError::InvalidWebhook(_) => false,
            ProcessorEventError::Reconciliation(err) => err.is_retryable(),
            ProcessorEventError::Subscription(err) => err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Reconciled { report: ReconcileReport },
    SubscriptionSynced { external_subscription_id: String },
    Ignored { event_type: String },
}

/// Verifies processor webhooks and routes them to reconciliation or subscription sync.
pub struct ProcessorEventsUseCase {
    gateway: Arc<dyn PaymentGateway + Send + Sync>,
    reconciliation: Arc<PaymentReconciliationUseCase>,
    injunction: Arc<InjunctionPaymentUseCase>,
    subscriptions: Arc<SubscriptionSyncUseCase>,
}

impl ProcessorEventsUseCase {
    pub fn new(
        gateway: Arc<dyn PaymentGateway + Send + Sync>,
        reconciliation: Arc<PaymentReconciliationUseCase>,
        injunction: Arc<InjunctionPaymentUseCase>,
        subscriptions: Arc<SubscriptionSyncUseCase>,
    ) -> Self {
        Self {
            gateway,
            reconciliation,
            injunction,
            subscriptions,
        }
    }

    pub async fn handle(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> Result<WebhookOutcome, ProcessorEventError> {
        let event = self
            .gateway
            .verify_webhook(payload, signature_header)
            .map_err(|err| match err {
                GatewayError::InvalidSignature => {
                    ProcessorEventError::InvalidWebhook("signature mismatch".into())
                }
                other => ProcessorEventError::InvalidWebhook(other.to_string()),
            })?;
        info!(event_id = %event.id, kind = ?event.kind, "webhooks: event received");

        match &event.kind {
            ProcessorEventKind::CheckoutSessionCompleted
            | ProcessorEventKind::CheckoutSessionAsyncPaymentSucceeded
            | ProcessorEventKind::CheckoutSessionAsyncPaymentFailed
            | ProcessorEventKind::CheckoutSessionExpired => {
                let reference = PaymentReference::Session(event.object_id.clone());
                self.reconcile(&event, reference).await
            }
            ProcessorEventKind::PaymentIntentSucceeded | ProcessorEventKind::PaymentIntentFailed => {
                if procedure_id_from(&event.metadata).is_none() {
                    return Ok(ignored(&event));
                }
                let reference = PaymentReference::Intent(event.object_id.clone());
                self.reconcile(&event, reference).await
            }
            ProcessorEventKind::SubscriptionChanged => {
                self.sync_subscription(&event, event.object_id.clone()).await
            }
            ProcessorEventKind::InvoicePaid => match event.subscription_id.clone() {
                Some(subscription_id) => self.sync_subscription(&event, subscription_id).await,
                None => Ok(ignored(&event)),
            },
            ProcessorEventKind::Other(_) => Ok(ignored(&event)),
        }
    }

    async fn reconcile(
        &self,
        event: &ProcessorEvent,
        reference: PaymentReference,
    ) -> Result<WebhookOutcome, ProcessorEventError> {
        let command = ReconcileCommand {
            reference,
            procedure_id: procedure_id_from(&event.metadata),
        };

        let report = if is_injunction_metadata(&event.metadata) {
            self.injunction.reconcile(command).await?
        } else {
            match self.reconciliation.reconcile(command.clone()).await {
                Err(ReconciliationError::MisroutedInjunction { procedure_id }) => {
                    warn!(
                        event_id = %event.id,
                        ?procedure_id,
                        "webhooks: rerouting payment to the injunction path"
                    );
                    self.injunction.reconcile(command).await?
                }
                other => other?,
            }
        };

        Ok(WebhookOutcome::Reconciled { report })
    }

    async fn sync_subscription(
        &self,
        event: &ProcessorEvent,
        external_subscription_id: String,
    ) -> Result<WebhookOutcome, ProcessorEventError> {
        match self
            .subscriptions
            .apply_processor_subscription(&external_subscription_id)
            .await?
        {
            Some(_) => Ok(WebhookOutcome::SubscriptionSynced {
                external_subscription_id,
            }),
            None => Ok(ignored(event)),
        }
    }
}

fn ignored(event: &ProcessorEvent) -> WebhookOutcome {
    let event_type = match &event.kind {
        ProcessorEventKind::Other(event_type) => event_type.clone(),
        kind => format!("{kind:?}"),
    };
    WebhookOutcome::Ignored { event_type }
}
