use std::sync::Arc;

use domain::{
    entities::procedures::ProcedureEntity,
    repositories::{
        payment_gateway::{GatewayError, PaymentGateway},
        payment_provider_customers::PaymentProviderCustomerRepository,
        payments::PaymentRepository,
        procedures::ProcedureRepository,
        store_error::StoreError,
    },
    value_objects::{
        billing::STRIPE_PROVIDER,
        enums::{payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus},
        lifecycle::{ProcedureEvent, TransitionError},
        payment_processor::{Metadata, PaymentSnapshot, Settlement, is_injunction_metadata, metadata_keys},
        reconciliation::{ReconcileCommand, ReconcileReport, SettlementView},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    payment_records::PaymentLedger,
    payment_snapshots::{PaymentSnapshots, ResolvedPayment},
    procedure_transitions::{ProcedureTransitions, TransitionFailure},
    subscription_sync::SubscriptionSyncUseCase,
};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("payment processor unavailable: {0}")]
    ProcessorUnavailable(String),
    #[error(transparent)]
    Processor(GatewayError),
    #[error("procedure {0} not found")]
    ProcedureNotFound(Uuid),
    #[error("injunction payments must be reconciled through the injunction endpoint")]
    MisroutedInjunction { procedure_id: Option<Uuid> },
    #[error("procedure {procedure_id} is not awaiting an injunction payment ({status})")]
    NotInjunctionStage {
        procedure_id: Uuid,
        status: ProcedureStatus,
    },
    #[error("payment carries no resolvable owner")]
    UnresolvedOwner,
    #[error("payment carries no procedure reference")]
    UnresolvedProcedure,
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Transition(TransitionError),
    #[error("procedure {0} kept changing under concurrent writers")]
    Contended(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconciliationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconciliationError::ProcessorUnavailable(_)
                | ReconciliationError::Contended(_)
                | ReconciliationError::Store(_)
        )
    }
}

impl From<GatewayError> for ReconciliationError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(reason) => ReconciliationError::ProcessorUnavailable(reason),
            GatewayError::InvalidSignature => {
                ReconciliationError::InvalidWebhook("signature mismatch".into())
            }
            other => ReconciliationError::Processor(other),
        }
    }
}

impl ReconciliationError {
    /// The case may have entered the injunction stage after it was read; the
    /// refusal still names it so the caller can reroute.
    pub(crate) fn from_transition(procedure_id: Uuid, failure: TransitionFailure) -> Self {
        match failure {
            TransitionFailure::NotFound(id) => ReconciliationError::ProcedureNotFound(id),
            TransitionFailure::Rejected(TransitionError::Misrouted { .. }) => {
                ReconciliationError::MisroutedInjunction {
                    procedure_id: Some(procedure_id),
                }
            }
            TransitionFailure::Rejected(err) => ReconciliationError::Transition(err),
            TransitionFailure::Contended(id) => ReconciliationError::Contended(id),
            TransitionFailure::Store(err) => ReconciliationError::Store(err),
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconciliationError>;

pub(crate) fn procedure_id_from(metadata: &Metadata) -> Option<Uuid> {
    metadata
        .get(metadata_keys::PROCEDURE_ID)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

pub(crate) fn owner_from(procedure: Option<&ProcedureEntity>, metadata: &Metadata) -> Option<Uuid> {
    procedure.map(|procedure| procedure.owner_user_id).or_else(|| {
        metadata
            .get(metadata_keys::USER_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    })
}

pub struct PaymentReconciliationUseCase {
    snapshots: PaymentSnapshots,
    ledger: PaymentLedger,
    transitions: Arc<ProcedureTransitions>,
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync>,
    subscriptions: Arc<SubscriptionSyncUseCase>,
}

impl PaymentReconciliationUseCase {
    pub fn new(
        gateway: Arc<dyn PaymentGateway + Send + Sync>,
        payments: Arc<dyn PaymentRepository + Send + Sync>,
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync>,
        transitions: Arc<ProcedureTransitions>,
        subscriptions: Arc<SubscriptionSyncUseCase>,
    ) -> Self {
        Self {
            snapshots: PaymentSnapshots::new(gateway),
            ledger: PaymentLedger::new(payments),
            transitions,
            procedures,
            customers,
            subscriptions,
        }
    }

    pub async fn reconcile(&self, command: ReconcileCommand) -> ReconcileResult<ReconcileReport> {
        let reference = command.reference.id().to_string();
        info!(%reference, procedure_id = ?command.procedure_id, "reconciliation: started");

        let resolved = self.snapshots.resolve(&command.reference).await.map_err(|err| {
            warn!(%reference, error = %err, "reconciliation: processor lookup failed");
            ReconciliationError::from(err)
        })?;

        let procedure_id = command
            .procedure_id
            .or_else(|| procedure_id_from(resolved.metadata()));
        let procedure = match procedure_id {
            Some(id) => Some(
                self.procedures
                    .find_by_id(id)
                    .await?
                    .ok_or(ReconciliationError::ProcedureNotFound(id))?,
            ),
            None => None,
        };

        let injunction_stage = procedure
            .as_ref()
            .is_some_and(|procedure| procedure.status.is_injunction_stage());
        if is_injunction_metadata(resolved.metadata()) || injunction_stage {
            warn!(%reference, ?procedure_id, "reconciliation: injunction payment on the generic path");
            return Err(ReconciliationError::MisroutedInjunction { procedure_id });
        }

        let snapshot = match resolved {
            ResolvedPayment::Pending { .. } => {
                info!(%reference, "reconciliation: payment not settled yet");
                return Ok(ReconcileReport {
                    procedure: procedure.as_ref().map(ProcedureEntity::view),
                    ..ReconcileReport::pending()
                });
            }
            ResolvedPayment::Abandoned { .. } => {
                info!(%reference, "reconciliation: checkout expired without a payment");
                return Ok(ReconcileReport {
                    settlement: SettlementView::Failed,
                    procedure: procedure.as_ref().map(ProcedureEntity::view),
                    ..ReconcileReport::pending()
                });
            }
            ResolvedPayment::Settled(snapshot) => snapshot,
        };

        let owner_user_id = owner_from(procedure.as_ref(), &snapshot.metadata)
            .ok_or(ReconciliationError::UnresolvedOwner)?;
        let entry = self
            .ledger
            .record(&snapshot, owner_user_id, procedure_id)
            .await
            .map_err(|err| {
                error!(%reference, db_error = ?err, "reconciliation: failed to record payment");
                ReconciliationError::Store(err)
            })?;
        self.remember_customer(owner_user_id, &snapshot).await;

        let mut report = ReconcileReport {
            settlement: snapshot.settlement.into(),
            payment: Some(entry.payment.view()),
            procedure: procedure.as_ref().map(ProcedureEntity::view),
            applied: None,
            shared_with: entry.shared_with,
        };
        let Some(procedure_id) = procedure_id else {
            info!(%reference, payment_id = %entry.payment.id, "reconciliation: payment recorded without a procedure");
            return Ok(report);
        };

        let payment_id = entry.payment.id;
        let outcome = match (snapshot.settlement, entry.payment.status) {
            (Settlement::Succeeded, PaymentStatus::Succeeded) => Some(
                self.transitions
                    .apply(procedure_id, |_| ProcedureEvent::PaymentConfirmed { payment_id })
                    .await
                    .map_err(|failure| ReconciliationError::from_transition(procedure_id, failure))?,
            ),
            (Settlement::Failed, PaymentStatus::Failed)
                if entry.payment.procedure_id == Some(procedure_id) =>
            {
                Some(
                    self.transitions
                        .apply(procedure_id, |_| ProcedureEvent::PaymentFailed { payment_id })
                        .await
                        .map_err(|failure| {
                            ReconciliationError::from_transition(procedure_id, failure)
                        })?,
                )
            }
            _ => None,
        };

        if let Some(outcome) = outcome {
            report.applied = outcome.applied();
            report.procedure = Some(outcome.procedure().view());
            if snapshot.settlement == Settlement::Succeeded {
                self.run_paid_case_tasks(outcome.procedure()).await;
            }
        }

        info!(
            %reference,
            %procedure_id,
            %payment_id,
            settlement = ?report.settlement,
            applied = ?report.applied,
            "reconciliation: finished"
        );
        Ok(report)
    }

    async fn remember_customer(&self, owner_user_id: Uuid, snapshot: &PaymentSnapshot) {
        let Some(customer_id) = &snapshot.customer_id else {
            return;
        };
        if let Err(err) = self
            .customers
            .upsert_customer_ref(owner_user_id, STRIPE_PROVIDER, customer_id)
            .await
        {
            warn!(%owner_user_id, db_error = ?err, "reconciliation: failed to store customer ref");
        }
    }

    /// Add-on subscription and notice fee; failures never undo the confirmed status.
    async fn run_paid_case_tasks(&self, procedure: &ProcedureEntity) {
        if !matches!(
            procedure.status,
            ProcedureStatus::New | ProcedureStatus::InstallmentPlan
        ) {
            return;
        }

        if procedure.subscription_add_on_flag {
            if let Err(err) = self
                .subscriptions
                .provision_subscription(procedure.owner_user_id, procedure.id)
                .await
            {
                warn!(
                    procedure_id = %procedure.id,
                    error = %err,
                    "reconciliation: subscription add-on provisioning failed"
                );
            }
        }

        if procedure.notice_flag {
            if let Err(err) = self.subscriptions.bill_notice_fee(procedure.id).await {
                warn!(
                    procedure_id = %procedure.id,
                    error = %err,
                    "reconciliation: notice fee billing failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{
        repositories::{
            payment_gateway::MockPaymentGateway,
            payment_provider_customers::MockPaymentProviderCustomerRepository,
            payments::MockPaymentRepository, procedures::MockProcedureRepository,
            subscriptions::MockSubscriptionRepository,
        },
        value_objects::{
            billing::BillingConfig, lifecycle_policy::LifecyclePolicy,
            reconciliation::PaymentReference,
        },
    };

    fn use_case(
        gateway: MockPaymentGateway,
        payments: MockPaymentRepository,
        procedures: MockProcedureRepository,
    ) -> PaymentReconciliationUseCase {
        let gateway: Arc<dyn PaymentGateway + Send + Sync> = Arc::new(gateway);
        let procedures: Arc<dyn ProcedureRepository + Send + Sync> = Arc::new(procedures);
        let customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync> =
            Arc::new(MockPaymentProviderCustomerRepository::new());
        let subscriptions = Arc::new(SubscriptionSyncUseCase::new(
            Arc::new(MockSubscriptionRepository::new()),
            Arc::clone(&customers),
            Arc::clone(&procedures),
            Arc::clone(&gateway),
            BillingConfig {
                subscription_price_id: "price_addon".into(),
                notice_fee_minor: 2_500,
                currency: "eur".into(),
            },
        ));
        let transitions = Arc::new(ProcedureTransitions::new(
            Arc::clone(&procedures),
            LifecyclePolicy::default(),
        ));
        PaymentReconciliationUseCase::new(
            gateway,
            Arc::new(payments),
            procedures,
            customers,
            transitions,
            subscriptions,
        )
    }

    #[tokio::test]
    async fn unreachable_processor_touches_nothing() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .returning(|_| Err(GatewayError::Unavailable("timeout".into())));

        let mut payments = MockPaymentRepository::new();
        payments.expect_insert_payment().never();
        payments.expect_update_payment().never();
        let mut procedures = MockProcedureRepository::new();
        procedures.expect_find_by_id().never();
        procedures.expect_save_lifecycle().never();

        let err = use_case(gateway, payments, procedures)
            .reconcile(ReconcileCommand {
                reference: PaymentReference::Intent("pi_1".into()),
                procedure_id: Some(Uuid::new_v4()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconciliationError::ProcessorUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn late_injunction_refusal_names_the_procedure() {
        let procedure_id = Uuid::new_v4();

        let err = ReconciliationError::from_transition(
            procedure_id,
            TransitionFailure::Rejected(TransitionError::Misrouted {
                status: ProcedureStatus::InjunctionRequested,
            }),
        );

        assert!(matches!(
            err,
            ReconciliationError::MisroutedInjunction { procedure_id: Some(id) } if id == procedure_id
        ));
        assert!(!err.is_retryable());
    }
}
