use std::sync::Arc;
use std::time::Duration;
use std::{env, path::PathBuf};

use generation::{BudgetGenerationJob, FileStore, TransactionGenerationJob};
use scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "generation=debug,scheduler=info".into()),
        )
        .init();

    // Settings path from environment (with sane default), then the settings
    // file itself with fallback to built-in defaults.
    let settings_path = env::var("SETTINGS_PATH").ok().map(PathBuf::from);
    let settings = settings_loader::load_settings_with_fallback(settings_path.as_ref())?
        .unwrap_or_default();

    tracing::info!("Recurring generation service");
    tracing::info!("Database file: {}", settings.database_file);
    tracing::info!(
        "Schedules: budgets at {}, transactions at {}",
        settings.budget_schedule,
        settings.transaction_schedule
    );

    let store = Arc::new(FileStore::new(&settings.database_file));

    let mut scheduler = Scheduler::new();
    scheduler.register(Arc::new(BudgetGenerationJob::new(
        store.clone(),
        store.clone(),
        settings.budget_schedule.clone(),
    )));
    scheduler.register(Arc::new(TransactionGenerationJob::new(
        store.clone(),
        store.clone(),
        settings.transaction_schedule.clone(),
    )));
    scheduler.start();

    // Run until interrupted, then shut the job tasks down cooperatively.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    scheduler
        .stop(Duration::from_secs(settings.shutdown_timeout_secs))
        .await;

    Ok(())
}
