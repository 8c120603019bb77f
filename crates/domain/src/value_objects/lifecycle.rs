//! Procedure state machine.
//!
//! `decide` is pure: it reads the current lifecycle state and an event and
//! returns the transition to persist. Persistence and retries live in the
//! application layer.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use super::{
    enums::{payment_statuses::PaymentStatus, procedure_statuses::ProcedureStatus},
    lifecycle_policy::LifecyclePolicy,
};

/// The part of a procedure the state machine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: ProcedureStatus,
    pub payment_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub injunction_payment_id: Option<Uuid>,
    pub assigned_agent_id: Option<Uuid>,
    pub dispatch_date: Option<NaiveDate>,
    pub has_installment_plan: bool,
}

impl LifecycleState {
    pub fn days_since_dispatch(&self, today: NaiveDate) -> Option<i64> {
        self.dispatch_date
            .map(|dispatched| (today - dispatched).num_days())
    }

    /// State after the transition's side effects.
    pub fn after(&self, transition: &Transition) -> LifecycleState {
        let mut next = self.clone();
        next.status = transition.to;
        for effect in &transition.effects {
            match *effect {
                SideEffect::AttachPayment { payment_id } => {
                    next.payment_id = Some(payment_id);
                    next.payment_status = Some(PaymentStatus::Succeeded);
                }
                SideEffect::MarkPaymentFailed { payment_id } => {
                    next.payment_id = Some(payment_id);
                    next.payment_status = Some(PaymentStatus::Failed);
                }
                SideEffect::AttachInjunctionPayment { payment_id } => {
                    next.injunction_payment_id = Some(payment_id);
                }
                SideEffect::AssignAgent { agent_id } => {
                    next.assigned_agent_id = Some(agent_id);
                }
                SideEffect::SetDispatchDate { on } => {
                    next.dispatch_date = Some(on);
                }
            }
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Owner,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureEvent {
    PaymentConfirmed { payment_id: Uuid },
    PaymentFailed { payment_id: Uuid },
    InjunctionPaymentConfirmed { payment_id: Uuid },
    AgentAssigned { agent_id: Uuid },
    MessagePosted { author: Actor },
    NoticeDispatched { on: NaiveDate },
    DispatchElapsed { today: NaiveDate },
    InjunctionRequested {
        today: NaiveDate,
        supporting_documents: bool,
    },
    Resolved,
    Canceled,
}

impl ProcedureEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProcedureEvent::PaymentConfirmed { .. } => "payment_confirmed",
            ProcedureEvent::PaymentFailed { .. } => "payment_failed",
            ProcedureEvent::InjunctionPaymentConfirmed { .. } => "injunction_payment_confirmed",
            ProcedureEvent::AgentAssigned { .. } => "agent_assigned",
            ProcedureEvent::MessagePosted { .. } => "message_posted",
            ProcedureEvent::NoticeDispatched { .. } => "notice_dispatched",
            ProcedureEvent::DispatchElapsed { .. } => "dispatch_elapsed",
            ProcedureEvent::InjunctionRequested { .. } => "injunction_requested",
            ProcedureEvent::Resolved => "resolved",
            ProcedureEvent::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    AttachPayment { payment_id: Uuid },
    MarkPaymentFailed { payment_id: Uuid },
    AttachInjunctionPayment { payment_id: Uuid },
    AssignAgent { agent_id: Uuid },
    /// Also clears the follow-up marker of the previous dispatch.
    SetDispatchDate { on: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ProcedureStatus,
    pub to: ProcedureStatus,
    pub effects: Vec<SideEffect>,
}

impl Transition {
    fn to(from: ProcedureStatus, to: ProcedureStatus) -> Self {
        Self {
            from,
            to,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: SideEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Apply(Transition),
    /// Nothing to write; the reason is logged by callers.
    Unchanged(&'static str),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("procedure is in injunction stage ({status}); use the injunction payment path")]
    Misrouted { status: ProcedureStatus },
    #[error("procedure is not awaiting an injunction payment (status {status})")]
    NotInjunctionStage { status: ProcedureStatus },
    #[error("{event} is not allowed from {from}")]
    InvalidTransition {
        from: ProcedureStatus,
        event: &'static str,
    },
    #[error("procedure is closed ({status})")]
    Terminal { status: ProcedureStatus },
    #[error("injunction can be requested in {days_remaining} day(s)")]
    InjunctionTooEarly { days_remaining: i64 },
    #[error("company extract and signed affidavit are both required")]
    MissingSupportingDocuments,
    #[error("formal notice has not been dispatched")]
    MissingDispatchDate,
    #[error("lifecycle invariant violated: {0}")]
    InvariantViolated(String),
}

fn is_conversation_stage(status: ProcedureStatus) -> bool {
    matches!(
        status,
        ProcedureStatus::InProgress
            | ProcedureStatus::AwaitingAgentReply
            | ProcedureStatus::AwaitingOwnerReply
    )
}

pub fn decide(
    state: &LifecycleState,
    event: ProcedureEvent,
    policy: &LifecyclePolicy,
) -> Result<Decision, TransitionError> {
    use ProcedureStatus as S;

    let from = state.status;
    let invalid = || TransitionError::InvalidTransition {
        from,
        event: event.name(),
    };

    let decision = match event {
        ProcedureEvent::PaymentConfirmed { payment_id } => {
            if from.is_injunction_stage() {
                return Err(TransitionError::Misrouted { status: from });
            }
            let confirmed = if state.has_installment_plan {
                S::InstallmentPlan
            } else {
                S::New
            };
            match from {
                S::Draft => Decision::Apply(
                    Transition::to(from, confirmed).with(SideEffect::AttachPayment { payment_id }),
                ),
                // A plan added after confirmation only re-applies with the linked payment.
                S::New
                    if state.payment_id.is_none()
                        || (state.has_installment_plan
                            && state.payment_id == Some(payment_id)) =>
                {
                    Decision::Apply(
                        Transition::to(from, confirmed)
                            .with(SideEffect::AttachPayment { payment_id }),
                    )
                }
                S::New if state.payment_id != Some(payment_id) => {
                    Decision::Unchanged("case already has a committed payment")
                }
                _ => Decision::Unchanged("payment already confirmed"),
            }
        }
        ProcedureEvent::PaymentFailed { payment_id } => {
            if from.is_injunction_stage() {
                return Err(TransitionError::Misrouted { status: from });
            }
            let linked_elsewhere = state.payment_id.is_some_and(|linked| linked != payment_id);
            match from {
                S::Draft
                    if state.payment_id == Some(payment_id)
                        && state.payment_status == Some(PaymentStatus::Failed) =>
                {
                    Decision::Unchanged("payment failure already recorded")
                }
                S::Draft | S::New | S::InstallmentPlan if !linked_elsewhere => Decision::Apply(
                    Transition::to(from, S::Draft)
                        .with(SideEffect::MarkPaymentFailed { payment_id }),
                ),
                S::Draft | S::New | S::InstallmentPlan => {
                    Decision::Unchanged("failed payment is not the case payment")
                }
                _ => Decision::Unchanged("case is past the payment stage"),
            }
        }
        ProcedureEvent::InjunctionPaymentConfirmed { payment_id } => match from {
            S::InjunctionRequested => Decision::Apply(
                Transition::to(from, S::InjunctionPaid)
                    .with(SideEffect::AttachInjunctionPayment { payment_id }),
            ),
            S::InjunctionPaid => Decision::Unchanged("injunction already paid"),
            _ => return Err(TransitionError::NotInjunctionStage { status: from }),
        },
        ProcedureEvent::AgentAssigned { agent_id } => match from {
            S::New => Decision::Apply(
                Transition::to(from, S::InProgress).with(SideEffect::AssignAgent { agent_id }),
            ),
            _ if is_conversation_stage(from) => {
                if state.assigned_agent_id == Some(agent_id) {
                    Decision::Unchanged("agent already assigned")
                } else {
                    Decision::Apply(
                        Transition::to(from, from).with(SideEffect::AssignAgent { agent_id }),
                    )
                }
            }
            _ if from.is_terminal() => return Err(TransitionError::Terminal { status: from }),
            _ => return Err(invalid()),
        },
        ProcedureEvent::MessagePosted { author } => {
            if from.is_terminal() {
                return Err(TransitionError::Terminal { status: from });
            }
            if !is_conversation_stage(from) {
                Decision::Unchanged("status is not driven by messages")
            } else {
                let to = match author {
                    Actor::Owner => S::AwaitingAgentReply,
                    Actor::Agent => S::AwaitingOwnerReply,
                };
                if to == from {
                    Decision::Unchanged("already awaiting that party")
                } else {
                    Decision::Apply(Transition::to(from, to))
                }
            }
        }
        ProcedureEvent::NoticeDispatched { on } => match from {
            S::New | S::InstallmentPlan => {
                Decision::Apply(Transition::to(from, S::NoticeSent).with(SideEffect::SetDispatchDate { on }))
            }
            _ if is_conversation_stage(from) => {
                Decision::Apply(Transition::to(from, S::NoticeSent).with(SideEffect::SetDispatchDate { on }))
            }
            S::NoticeSent if state.dispatch_date == Some(on) => {
                Decision::Unchanged("notice already dispatched")
            }
            _ if from.is_terminal() => return Err(TransitionError::Terminal { status: from }),
            _ => return Err(invalid()),
        },
        ProcedureEvent::DispatchElapsed { today } => match (from, state.days_since_dispatch(today)) {
            (S::NoticeSent, Some(days)) if days >= policy.escalation_after_days => {
                Decision::Apply(Transition::to(from, S::PreInjunction))
            }
            (S::NoticeSent, Some(_)) => Decision::Unchanged("escalation not due"),
            (S::NoticeSent, None) => Decision::Unchanged("no dispatch date"),
            _ => Decision::Unchanged("not awaiting escalation"),
        },
        ProcedureEvent::InjunctionRequested {
            today,
            supporting_documents,
        } => match from {
            S::InjunctionRequested | S::InjunctionPaid => {
                Decision::Unchanged("injunction already requested")
            }
            S::NoticeSent | S::PreInjunction => {
                let days = state
                    .days_since_dispatch(today)
                    .ok_or(TransitionError::MissingDispatchDate)?;
                if days < policy.injunction_after_days {
                    return Err(TransitionError::InjunctionTooEarly {
                        days_remaining: policy.injunction_after_days - days,
                    });
                }
                if !supporting_documents {
                    return Err(TransitionError::MissingSupportingDocuments);
                }
                Decision::Apply(Transition::to(from, S::InjunctionRequested))
            }
            _ if from.is_terminal() => return Err(TransitionError::Terminal { status: from }),
            _ => return Err(invalid()),
        },
        ProcedureEvent::Resolved => match from {
            S::Resolved => Decision::Unchanged("already resolved"),
            S::Canceled => return Err(TransitionError::Terminal { status: from }),
            _ => Decision::Apply(Transition::to(from, S::Resolved)),
        },
        ProcedureEvent::Canceled => match from {
            S::Canceled => Decision::Unchanged("already canceled"),
            S::Resolved => return Err(TransitionError::Terminal { status: from }),
            _ => Decision::Apply(Transition::to(from, S::Canceled)),
        },
    };

    Ok(decision)
}

/// Status / projection agreement every persisted procedure must satisfy.
pub fn check_invariants(state: &LifecycleState) -> Result<(), TransitionError> {
    match state.status {
        ProcedureStatus::Draft if state.payment_status == Some(PaymentStatus::Succeeded) => Err(
            TransitionError::InvariantViolated("draft procedure carries a succeeded payment".into()),
        ),
        ProcedureStatus::New | ProcedureStatus::InstallmentPlan
            if state.payment_id.is_none()
                || state.payment_status != Some(PaymentStatus::Succeeded) =>
        {
            Err(TransitionError::InvariantViolated(format!(
                "{} procedure without a succeeded payment",
                state.status
            )))
        }
        ProcedureStatus::InjunctionPaid if state.injunction_payment_id.is_none() => Err(
            TransitionError::InvariantViolated("injunction paid without a payment".into()),
        ),
        _ => Ok(()),
    }
}
