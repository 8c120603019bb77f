use std::sync::Arc;

use domain::{
    repositories::{
        comments::CommentRepository, documents::DocumentRepository,
        payment_gateway::PaymentGateway, payments::PaymentRepository,
        procedures::ProcedureRepository,
    },
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        lifecycle::ProcedureEvent,
        payment_processor::Settlement,
        reconciliation::{ReconcileCommand, ReconcileReport, SettlementView},
    },
};
use tracing::{error, info, warn};

use super::{
    case_records::CaseRecords,
    payment_reconciliation::{ReconcileResult, ReconciliationError, procedure_id_from},
    payment_records::PaymentLedger,
    payment_snapshots::{PaymentSnapshots, ResolvedPayment},
    procedure_transitions::ProcedureTransitions,
};

/// Reconciles the court-injunction payment of a procedure.
///
/// The payment is recorded by intent only; the procedure's main payment link is
/// left alone and the injunction payment is stored on its own column.
pub struct InjunctionPaymentUseCase {
    snapshots: PaymentSnapshots,
    ledger: PaymentLedger,
    records: CaseRecords,
    transitions: Arc<ProcedureTransitions>,
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
}

impl InjunctionPaymentUseCase {
    pub fn new(
        gateway: Arc<dyn PaymentGateway + Send + Sync>,
        payments: Arc<dyn PaymentRepository + Send + Sync>,
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        documents: Arc<dyn DocumentRepository + Send + Sync>,
        comments: Arc<dyn CommentRepository + Send + Sync>,
        transitions: Arc<ProcedureTransitions>,
    ) -> Self {
        Self {
            snapshots: PaymentSnapshots::new(gateway),
            ledger: PaymentLedger::new(payments),
            records: CaseRecords::new(documents, comments),
            transitions,
            procedures,
        }
    }

    pub async fn reconcile(&self, command: ReconcileCommand) -> ReconcileResult<ReconcileReport> {
        let reference = command.reference.id().to_string();
        info!(%reference, procedure_id = ?command.procedure_id, "injunction: reconciliation started");

        let resolved = self.snapshots.resolve(&command.reference).await.map_err(|err| {
            warn!(%reference, error = %err, "injunction: processor lookup failed");
            ReconciliationError::from(err)
        })?;

        let procedure_id = command
            .procedure_id
            .or_else(|| procedure_id_from(resolved.metadata()))
            .ok_or(ReconciliationError::UnresolvedProcedure)?;
        let procedure = self
            .procedures
            .find_by_id(procedure_id)
            .await?
            .ok_or(ReconciliationError::ProcedureNotFound(procedure_id))?;

        if !procedure.status.is_injunction_stage() {
            warn!(%reference, %procedure_id, status = %procedure.status, "injunction: procedure not awaiting injunction payment");
            return Err(ReconciliationError::NotInjunctionStage {
                procedure_id,
                status: procedure.status,
            });
        }

        let snapshot = match resolved {
            ResolvedPayment::Pending { .. } => {
                return Ok(ReconcileReport {
                    procedure: Some(procedure.view()),
                    ..ReconcileReport::pending()
                });
            }
            ResolvedPayment::Abandoned { .. } => {
                return Ok(ReconcileReport {
                    settlement: SettlementView::Failed,
                    procedure: Some(procedure.view()),
                    ..ReconcileReport::pending()
                });
            }
            ResolvedPayment::Settled(snapshot) => snapshot,
        };

        let entry = self
            .ledger
            .record(&snapshot, procedure.owner_user_id, None)
            .await
            .map_err(|err| {
                error!(%reference, db_error = ?err, "injunction: failed to record payment");
                ReconciliationError::Store(err)
            })?;

        let mut report = ReconcileReport {
            settlement: snapshot.settlement.into(),
            payment: Some(entry.payment.view()),
            procedure: Some(procedure.view()),
            applied: None,
            shared_with: entry.shared_with,
        };

        if snapshot.settlement != Settlement::Succeeded
            || entry.payment.status != PaymentStatus::Succeeded
        {
            info!(%reference, %procedure_id, "injunction: payment not successful, status unchanged");
            return Ok(report);
        }

        self.records
            .materialize_injunction(procedure_id, procedure.owner_user_id, &snapshot.metadata)
            .await?;

        let payment_id = entry.payment.id;
        let outcome = self
            .transitions
            .apply(procedure_id, |_| ProcedureEvent::InjunctionPaymentConfirmed { payment_id })
            .await
            .map_err(|failure| ReconciliationError::from_transition(procedure_id, failure))?;
        report.applied = outcome.applied();
        report.procedure = Some(outcome.procedure().view());

        info!(
            %reference,
            %procedure_id,
            %payment_id,
            applied = ?report.applied,
            "injunction: reconciliation finished"
        );
        Ok(report)
    }
}
