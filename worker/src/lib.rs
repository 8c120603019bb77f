pub mod axum_http;
pub mod config;
pub mod services;

use std::sync::Arc;

use anyhow::Result;
use application::usecases::{
    procedure_transitions::ProcedureTransitions, temporal_transitions::TemporalTransitionsUseCase,
};
use domain::repositories::{
    app_users::AppUserRepository, notifier::Notifier, procedures::ProcedureRepository,
};
use infra::{
    notifications::http_mailer::HttpMailer,
    postgres::{
        postgres_connection,
        repositories::{app_users::AppUserPostgres, procedures::ProcedurePostgres},
    },
};
use tracing::info;

pub async fn run() -> Result<()> {
    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");
    let db_pool_arc = Arc::new(postgres_pool);

    let procedure_repository: Arc<dyn ProcedureRepository + Send + Sync> =
        Arc::new(ProcedurePostgres::new(Arc::clone(&db_pool_arc)));
    let user_repository: Arc<dyn AppUserRepository + Send + Sync> =
        Arc::new(AppUserPostgres::new(Arc::clone(&db_pool_arc)));
    let notifier: Arc<dyn Notifier + Send + Sync> =
        Arc::new(HttpMailer::new(dotenvy_env.mailer.clone())?);

    let transitions = Arc::new(ProcedureTransitions::new(
        Arc::clone(&procedure_repository),
        dotenvy_env.lifecycle,
    ));
    let scheduler_usecase = Arc::new(TemporalTransitionsUseCase::new(
        procedure_repository,
        user_repository,
        notifier,
        transitions,
    ));

    let scheduler_loop = tokio::spawn(services::scheduler_loop::run_scheduler_loop(
        Arc::clone(&scheduler_usecase),
        dotenvy_env.scheduler.clone(),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, scheduler_usecase).await
    });

    tokio::select! {
        result = scheduler_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
