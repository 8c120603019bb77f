use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use domain::{
    entities::procedures::ProcedureEntity,
    repositories::{
        app_users::AppUserRepository,
        notifier::{Notifier, OutboundMessage},
        procedures::ProcedureRepository,
    },
    value_objects::{enums::procedure_statuses::ProcedureStatus, lifecycle::ProcedureEvent},
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::procedure_transitions::{ProcedureTransitions, TransitionOutcome};

const REPORTED_IDS_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub applied_ids: Vec<Uuid>,
}

impl ScanReport {
    fn record_applied(&mut self, procedure_id: Uuid) {
        self.applied += 1;
        if self.applied_ids.len() < REPORTED_IDS_LIMIT {
            self.applied_ids.push(procedure_id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerRunReport {
    pub run_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub follow_ups: ScanReport,
    pub escalations: ScanReport,
}

/// Daily time-based transitions anchored on the notice dispatch date.
///
/// Both scans are guarded by conditional writes, so overlapping runs and
/// re-runs of the same day are harmless.
pub struct TemporalTransitionsUseCase {
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    users: Arc<dyn AppUserRepository + Send + Sync>,
    notifier: Arc<dyn Notifier + Send + Sync>,
    transitions: Arc<ProcedureTransitions>,
}

impl TemporalTransitionsUseCase {
    pub fn new(
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        users: Arc<dyn AppUserRepository + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
        transitions: Arc<ProcedureTransitions>,
    ) -> Self {
        Self {
            procedures,
            users,
            notifier,
            transitions,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<SchedulerRunReport> {
        let today = now.date_naive();
        info!(%today, "scheduler: run started");

        let follow_ups = self.send_follow_ups(now, today).await?;
        let escalations = self.escalate(today).await?;

        info!(
            %today,
            follow_ups_sent = follow_ups.applied,
            follow_ups_failed = follow_ups.failed,
            escalated = escalations.applied,
            escalations_failed = escalations.failed,
            "scheduler: run finished"
        );
        Ok(SchedulerRunReport {
            run_at: now,
            today,
            follow_ups,
            escalations,
        })
    }

    async fn send_follow_ups(&self, now: DateTime<Utc>, today: NaiveDate) -> Result<ScanReport> {
        let days = self.transitions.policy().follow_up_after_days;
        let cutoff = today - Duration::days(days);
        let candidates = self.procedures.list_follow_up_candidates(cutoff).await?;
        let mut report = ScanReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for procedure in candidates {
            let procedure_id = procedure.id;
            let recipient = match self.users.find_email(procedure.owner_user_id).await {
                Ok(Some(email)) => email,
                Ok(None) => {
                    warn!(%procedure_id, "scheduler: owner has no email, follow-up skipped");
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(%procedure_id, db_error = ?err, "scheduler: owner lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.procedures.claim_follow_up(procedure_id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(%procedure_id, db_error = ?err, "scheduler: follow-up claim failed");
                    report.failed += 1;
                    continue;
                }
            }

            match self
                .notifier
                .send(follow_up_message(recipient, &procedure, today))
                .await
            {
                Ok(()) => {
                    info!(%procedure_id, "scheduler: follow-up sent");
                    report.record_applied(procedure_id);
                }
                Err(err) => {
                    warn!(%procedure_id, error = ?err, "scheduler: follow-up send failed, releasing claim");
                    if let Err(release_err) =
                        self.procedures.release_follow_up(procedure_id, now).await
                    {
                        error!(
                            %procedure_id,
                            db_error = ?release_err,
                            "scheduler: follow-up claim could not be released"
                        );
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn escalate(&self, today: NaiveDate) -> Result<ScanReport> {
        let days = self.transitions.policy().escalation_after_days;
        let cutoff = today - Duration::days(days);
        let candidates = self
            .procedures
            .list_dispatched_on_or_before(ProcedureStatus::NoticeSent, cutoff)
            .await?;
        let mut report = ScanReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for procedure in candidates {
            let procedure_id = procedure.id;
            match self
                .transitions
                .apply(procedure_id, |_| ProcedureEvent::DispatchElapsed { today })
                .await
            {
                Ok(TransitionOutcome::Applied { procedure, .. }) => {
                    report.record_applied(procedure_id);
                    self.notify_escalation(&procedure).await;
                }
                Ok(TransitionOutcome::Unchanged { .. }) => report.skipped += 1,
                Err(err) => {
                    error!(%procedure_id, error = %err, "scheduler: escalation failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn notify_escalation(&self, procedure: &ProcedureEntity) {
        let recipient = match self.users.find_email(procedure.owner_user_id).await {
            Ok(Some(email)) => email,
            _ => return,
        };
        let message = OutboundMessage {
            recipient,
            subject: "Your case is ready for an injunction".to_string(),
            body: format!(
                "No settlement was reached after the formal notice for procedure {}. \
                 You can now request a court injunction.",
                procedure.id
            ),
        };
        if let Err(err) = self.notifier.send(message).await {
            warn!(procedure_id = %procedure.id, error = ?err, "scheduler: escalation notice not sent");
        }
    }
}

fn follow_up_message(
    recipient: String,
    procedure: &ProcedureEntity,
    today: NaiveDate,
) -> OutboundMessage {
    let days = procedure.days_since_dispatch(today).unwrap_or_default();
    OutboundMessage {
        recipient,
        subject: "Follow-up on your formal notice".to_string(),
        body: format!(
            "The formal notice for procedure {} was dispatched {} days ago. \
             Let us know whether the debtor has paid or replied.",
            procedure.id, days
        ),
    }
}
