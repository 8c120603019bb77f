use std::sync::Arc;

use domain::{
    entities::procedures::ProcedureEntity,
    repositories::{
        procedures::ProcedureRepository,
        store_error::StoreError,
    },
    value_objects::{
        lifecycle::{Decision, ProcedureEvent, TransitionError, check_invariants, decide},
        lifecycle_policy::LifecyclePolicy,
        reconciliation::AppliedTransition,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied {
        procedure: ProcedureEntity,
        transition: AppliedTransition,
    },
    Unchanged {
        procedure: ProcedureEntity,
        reason: &'static str,
    },
}

impl TransitionOutcome {
    pub fn procedure(&self) -> &ProcedureEntity {
        match self {
            TransitionOutcome::Applied { procedure, .. }
            | TransitionOutcome::Unchanged { procedure, .. } => procedure,
        }
    }

    pub fn into_procedure(self) -> ProcedureEntity {
        match self {
            TransitionOutcome::Applied { procedure, .. }
            | TransitionOutcome::Unchanged { procedure, .. } => procedure,
        }
    }

    pub fn applied(&self) -> Option<AppliedTransition> {
        match self {
            TransitionOutcome::Applied { transition, .. } => Some(*transition),
            TransitionOutcome::Unchanged { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionFailure {
    #[error("procedure {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("procedure {0} kept changing under concurrent writers")]
    Contended(Uuid),
    #[error(transparent)]
    Store(StoreError),
}

/// Read, decide, conditional write. A stale write re-reads and decides again
/// against the fresh status, so a transition whose source no longer matches
/// resolves to a no-op instead of overwriting.
pub struct ProcedureTransitions {
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    policy: LifecyclePolicy,
}

impl ProcedureTransitions {
    pub fn new(
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self { procedures, policy }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub async fn apply<F>(
        &self,
        procedure_id: Uuid,
        event_for: F,
    ) -> Result<TransitionOutcome, TransitionFailure>
    where
        F: Fn(&ProcedureEntity) -> ProcedureEvent + Send + Sync,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .procedures
                .find_by_id(procedure_id)
                .await
                .map_err(TransitionFailure::Store)?
                .ok_or(TransitionFailure::NotFound(procedure_id))?;

            let event = event_for(&current);
            let transition = match decide(&current.lifecycle_state(), event, &self.policy)? {
                Decision::Apply(transition) => transition,
                Decision::Unchanged(reason) => {
                    debug!(
                        %procedure_id,
                        status = %current.status,
                        event = event.name(),
                        reason,
                        "transitions: nothing to apply"
                    );
                    return Ok(TransitionOutcome::Unchanged {
                        procedure: current,
                        reason,
                    });
                }
            };

            let next = current.apply(&transition);
            check_invariants(&next.lifecycle_state())?;

            match self.procedures.save_lifecycle(&next).await {
                Ok(saved) => {
                    info!(
                        %procedure_id,
                        from = %transition.from,
                        to = %transition.to,
                        event = event.name(),
                        "transitions: applied"
                    );
                    return Ok(TransitionOutcome::Applied {
                        procedure: saved,
                        transition: AppliedTransition {
                            from: transition.from,
                            to: transition.to,
                        },
                    });
                }
                Err(StoreError::StaleWrite) => {
                    warn!(
                        %procedure_id,
                        attempt,
                        event = event.name(),
                        "transitions: stale write, re-reading"
                    );
                }
                Err(err) => return Err(TransitionFailure::Store(err)),
            }
        }

        Err(TransitionFailure::Contended(procedure_id))
    }
}
