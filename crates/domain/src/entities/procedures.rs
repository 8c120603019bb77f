use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    schema::procedures,
    value_objects::{
        enums::{payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus},
        installments::{InstallmentPlan, InstallmentPlanError},
        lifecycle::{LifecycleState, SideEffect, Transition},
        reconciliation::ReconciledProcedure,
    },
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = procedures)]
pub struct ProcedureEntity {
    pub id: Uuid,
    pub status: ProcedureStatus,
    pub client_id: Uuid,
    pub owner_user_id: Uuid,
    pub assigned_agent_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub injunction_payment_id: Option<Uuid>,
    pub installment_plan: Option<serde_json::Value>,
    pub notice_flag: bool,
    pub subscription_add_on_flag: bool,
    pub notice_fee_item_ref: Option<String>,
    pub dispatch_date: Option<NaiveDate>,
    pub reminder_date_1: Option<NaiveDate>,
    pub reminder_date_2: Option<NaiveDate>,
    pub follow_up_sent_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns a lifecycle transition may touch, written together with the version bump.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = procedures, treat_none_as_null = true)]
pub struct ProcedureLifecycleChangeset {
    pub status: ProcedureStatus,
    pub assigned_agent_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub injunction_payment_id: Option<Uuid>,
    pub dispatch_date: Option<NaiveDate>,
    pub follow_up_sent_at: Option<DateTime<Utc>>,
}

impl ProcedureEntity {
    /// Stored plan; a malformed or missing column reads as no plan.
    pub fn installments(&self) -> Result<InstallmentPlan, InstallmentPlanError> {
        match &self.installment_plan {
            Some(value) if !value.is_null() => InstallmentPlan::from_json(value),
            _ => Ok(InstallmentPlan::default()),
        }
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        LifecycleState {
            status: self.status,
            payment_id: self.payment_id,
            payment_status: self.payment_status,
            injunction_payment_id: self.injunction_payment_id,
            assigned_agent_id: self.assigned_agent_id,
            dispatch_date: self.dispatch_date,
            has_installment_plan: self
                .installments()
                .map(|plan| !plan.is_empty())
                .unwrap_or(false),
        }
    }

    pub fn days_since_dispatch(&self, today: NaiveDate) -> Option<i64> {
        self.dispatch_date
            .map(|dispatched| (today - dispatched).num_days())
    }

    /// Row after the transition, as it should be persisted (version not yet bumped).
    pub fn apply(&self, transition: &Transition) -> ProcedureEntity {
        let next_state = self.lifecycle_state().after(transition);
        let mut next = self.clone();
        next.status = next_state.status;
        next.payment_id = next_state.payment_id;
        next.payment_status = next_state.payment_status;
        next.injunction_payment_id = next_state.injunction_payment_id;
        next.assigned_agent_id = next_state.assigned_agent_id;
        next.dispatch_date = next_state.dispatch_date;
        if transition
            .effects
            .iter()
            .any(|effect| matches!(effect, SideEffect::SetDispatchDate { .. }))
        {
            next.follow_up_sent_at = None;
        }
        next
    }

    pub fn lifecycle_changeset(&self) -> ProcedureLifecycleChangeset {
        ProcedureLifecycleChangeset {
            status: self.status,
            assigned_agent_id: self.assigned_agent_id,
            payment_id: self.payment_id,
            payment_status: self.payment_status,
            injunction_payment_id: self.injunction_payment_id,
            dispatch_date: self.dispatch_date,
            follow_up_sent_at: self.follow_up_sent_at,
        }
    }

    pub fn view(&self) -> ReconciledProcedure {
        ReconciledProcedure {
            id: self.id,
            status: self.status,
            payment_status: self.payment_status,
        }
    }
}
