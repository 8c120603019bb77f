use std::sync::Arc;

use anyhow::Result;
use application::usecases::temporal_transitions::TemporalTransitionsUseCase;
use chrono::Utc;
use tracing::{error, info};

use crate::config::config_model::Scheduler;

pub async fn run_scheduler_loop(
    usecase: Arc<TemporalTransitionsUseCase>,
    config: Scheduler,
) -> Result<()> {
    info!(
        interval_secs = config.interval.as_secs(),
        run_on_start = config.run_on_start,
        "scheduler loop started"
    );
    if !config.run_on_start {
        tokio::time::sleep(config.interval).await;
    }

    loop {
        run_once(&usecase).await;
        tokio::time::sleep(config.interval).await;
    }
}

async fn run_once(usecase: &TemporalTransitionsUseCase) {
    match usecase.run(Utc::now()).await {
        Ok(report) => info!(
            today = %report.today,
            follow_ups_scanned = report.follow_ups.scanned,
            escalations_scanned = report.escalations.scanned,
            "scheduler loop: run completed"
        ),
        // Scans are idempotent; the next tick retries whatever was left.
        Err(err) => error!(error = ?err, "scheduler loop: run failed"),
    }
}
