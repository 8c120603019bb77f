use std::sync::Arc;

use domain::{
    repositories::payment_gateway::{GatewayError, GatewayResult, PaymentGateway},
    value_objects::{
        payment_processor::{
            CheckoutSession, Metadata, PaymentIntent, PaymentSnapshot, SessionPaymentStatus,
            SessionStatus, Settlement,
        },
        reconciliation::PaymentReference,
    },
};
use tracing::{debug, warn};

/// What the processor currently says about a payment reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPayment {
    /// Settled either way, with an intent to record.
    Settled(PaymentSnapshot),
    /// Not settled yet; nothing to record.
    Pending { metadata: Metadata },
    /// Expired checkout that never produced an intent.
    Abandoned { metadata: Metadata },
}

impl ResolvedPayment {
    pub fn metadata(&self) -> &Metadata {
        match self {
            ResolvedPayment::Settled(snapshot) => &snapshot.metadata,
            ResolvedPayment::Pending { metadata } | ResolvedPayment::Abandoned { metadata } => {
                metadata
            }
        }
    }
}

pub struct PaymentSnapshots {
    gateway: Arc<dyn PaymentGateway + Send + Sync>,
}

impl PaymentSnapshots {
    pub fn new(gateway: Arc<dyn PaymentGateway + Send + Sync>) -> Self {
        Self { gateway }
    }

    pub async fn resolve(&self, reference: &PaymentReference) -> GatewayResult<ResolvedPayment> {
        match reference {
            PaymentReference::Intent(intent_id) => {
                let intent = self.gateway.retrieve_payment_intent(intent_id).await?;
                Ok(self.from_intent(intent, None).await)
            }
            PaymentReference::Session(session_id) => {
                let session = self.gateway.retrieve_checkout_session(session_id).await?;
                self.from_session(session).await
            }
        }
    }

    async fn from_session(&self, session: CheckoutSession) -> GatewayResult<ResolvedPayment> {
        let intent_id = match session.payment_intent_id.clone() {
            Some(intent_id) => Some(intent_id),
            None => match &session.invoice_id {
                Some(invoice_id) => {
                    let invoice = self.gateway.retrieve_invoice(invoice_id).await?;
                    debug!(
                        session_id = %session.id,
                        invoice_id = %invoice.id,
                        "reconciliation: resolving intent through invoice"
                    );
                    invoice.payment_intent_id
                }
                None => None,
            },
        };

        let Some(intent_id) = intent_id else {
            return match (session.status, session.payment_status) {
                (SessionStatus::Expired, _) => Ok(ResolvedPayment::Abandoned {
                    metadata: session.metadata,
                }),
                (_, SessionPaymentStatus::Paid) => Err(GatewayError::InvalidPayload(format!(
                    "paid session {} carries no payment intent",
                    session.id
                ))),
                _ => Ok(ResolvedPayment::Pending {
                    metadata: session.metadata,
                }),
            };
        };

        let intent = self.gateway.retrieve_payment_intent(&intent_id).await?;
        Ok(self.from_intent(intent, Some(session)).await)
    }

    /// Session metadata wins over intent metadata for the keys both carry;
    /// the checkout is where the case reference was attached.
    async fn from_intent(
        &self,
        intent: PaymentIntent,
        session: Option<CheckoutSession>,
    ) -> ResolvedPayment {
        let mut snapshot = PaymentSnapshot::from_intent(intent);
        if let Some(session) = session {
            snapshot.metadata.extend(session.metadata);
            if snapshot.customer_id.is_none() {
                snapshot.customer_id = session.customer_id;
            }
        }

        match snapshot.settlement {
            Settlement::Pending => ResolvedPayment::Pending {
                metadata: snapshot.metadata,
            },
            Settlement::Succeeded => ResolvedPayment::Settled(snapshot),
            Settlement::Failed => {
                if let Some(charge_id) = snapshot.charge_id.clone() {
                    match self.gateway.retrieve_charge(&charge_id).await {
                        Ok(charge) => {
                            if charge.failure_message.is_some() {
                                snapshot.failure_message = charge.failure_message;
                            }
                        }
                        Err(err) => warn!(
                            %charge_id,
                            error = %err,
                            "reconciliation: failed charge lookup skipped"
                        ),
                    }
                }
                ResolvedPayment::Settled(snapshot)
            }
        }
    }
}
