use std::sync::Arc;

use anyhow::Result;
use application::usecases::{
    injunction_payment::InjunctionPaymentUseCase,
    payment_reconciliation::PaymentReconciliationUseCase,
    procedure_actions::ProcedureActionsUseCase, procedure_transitions::ProcedureTransitions,
    processor_events::ProcessorEventsUseCase, subscription_sync::SubscriptionSyncUseCase,
};
use domain::repositories::{
    comments::CommentRepository, documents::DocumentRepository, payment_gateway::PaymentGateway,
    payment_provider_customers::PaymentProviderCustomerRepository, payments::PaymentRepository,
    procedures::ProcedureRepository, subscriptions::SubscriptionRepository,
};
use infra::{
    payments::stripe_client::StripeClient,
    postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            comments::CommentPostgres, documents::DocumentPostgres,
            payment_provider_customers::PaymentProviderCustomerPostgres,
            payments::PaymentPostgres, procedures::ProcedurePostgres,
            subscriptions::SubscriptionPostgres,
        },
    },
};

use crate::config::config_model::DotEnvyConfig;

/// Use cases shared by the HTTP routers. One `ProcedureTransitions` instance backs all of them.
#[derive(Clone)]
pub struct UseCases {
    pub reconciliation: Arc<PaymentReconciliationUseCase>,
    pub injunction: Arc<InjunctionPaymentUseCase>,
    pub subscriptions: Arc<SubscriptionSyncUseCase>,
    pub procedures: Arc<ProcedureActionsUseCase>,
    pub processor_events: Arc<ProcessorEventsUseCase>,
}

pub struct Repositories {
    pub procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    pub payments: Arc<dyn PaymentRepository + Send + Sync>,
    pub subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
    pub customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync>,
    pub documents: Arc<dyn DocumentRepository + Send + Sync>,
    pub comments: Arc<dyn CommentRepository + Send + Sync>,
}

impl Repositories {
    pub fn postgres(db_pool: Arc<PgPoolSquad>) -> Self {
        Self {
            procedures: Arc::new(ProcedurePostgres::new(Arc::clone(&db_pool))),
            payments: Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
            subscriptions: Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
            customers: Arc::new(PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool))),
            documents: Arc::new(DocumentPostgres::new(Arc::clone(&db_pool))),
            comments: Arc::new(CommentPostgres::new(Arc::clone(&db_pool))),
        }
    }
}

pub fn build(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<UseCases> {
    let gateway: Arc<dyn PaymentGateway + Send + Sync> =
        Arc::new(StripeClient::new(config.stripe.clone())?);
    Ok(assemble(
        Repositories::postgres(db_pool),
        gateway,
        config,
    ))
}

pub fn assemble(
    repos: Repositories,
    gateway: Arc<dyn PaymentGateway + Send + Sync>,
    config: &DotEnvyConfig,
) -> UseCases {
    let transitions = Arc::new(ProcedureTransitions::new(
        Arc::clone(&repos.procedures),
        config.lifecycle,
    ));

    let subscriptions = Arc::new(SubscriptionSyncUseCase::new(
        Arc::clone(&repos.subscriptions),
        Arc::clone(&repos.customers),
        Arc::clone(&repos.procedures),
        Arc::clone(&gateway),
        config.billing.clone(),
    ));

    let reconciliation = Arc::new(PaymentReconciliationUseCase::new(
        Arc::clone(&gateway),
        Arc::clone(&repos.payments),
        Arc::clone(&repos.procedures),
        Arc::clone(&repos.customers),
        Arc::clone(&transitions),
        Arc::clone(&subscriptions),
    ));

    let injunction = Arc::new(InjunctionPaymentUseCase::new(
        Arc::clone(&gateway),
        Arc::clone(&repos.payments),
        Arc::clone(&repos.procedures),
        Arc::clone(&repos.documents),
        Arc::clone(&repos.comments),
        Arc::clone(&transitions),
    ));

    let procedures = Arc::new(ProcedureActionsUseCase::new(
        Arc::clone(&transitions),
        Arc::clone(&repos.procedures),
        Arc::clone(&repos.documents),
        Arc::clone(&repos.comments),
    ));

    let processor_events = Arc::new(ProcessorEventsUseCase::new(
        gateway,
        Arc::clone(&reconciliation),
        Arc::clone(&injunction),
        Arc::clone(&subscriptions),
    ));

    UseCases {
        reconciliation,
        injunction,
        subscriptions,
        procedures,
        processor_events,
    }
}
