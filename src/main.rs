use std::process;
use std::sync::Arc;

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use gaffer::{
    application::{
        error::AppError,
        jobs::{SyncJobContext, parse_schedule, process_live_poll_job, process_sync_data_job},
        repos::FplRepositories,
        service::FplDataService,
        source::SourceClient,
        sync::SyncService,
    },
    cache::{CacheInvalidator, CacheLoader, DeadlineScheduler, KeyValueStore, TtlPolicy},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{ApiState, build_router},
        redis::RedisStore,
        telemetry,
        upstream::FplClient,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let repositories = init_repositories(&settings).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&settings.redis).await?);

    let ttl = TtlPolicy::new(settings.cache.dev_mode);
    if settings.cache.dev_mode {
        info!(target: "gaffer::main", "development mode: cache lifetimes shortened");
    }

    let client: Arc<dyn SourceClient> = Arc::new(FplClient::new(&settings.upstream)?);
    let repos: Arc<dyn FplRepositories> = repositories.clone();
    let loader = CacheLoader::new(store.clone(), ttl);
    let service = FplDataService::new(loader, client, repos.clone());

    let invalidator = Arc::new(CacheInvalidator::new(store.clone()));
    let scheduler = Arc::new(DeadlineScheduler::new(invalidator));
    let sync = Arc::new(SyncService::new(service.clone(), repos, scheduler.clone()));
    let service = Arc::new(service);

    // Arm deadline invalidation from whatever data is already reachable; a
    // cold cache defers this to the first sync.
    sync.initialize().await;

    let monitor_handle = spawn_job_monitor(sync.clone(), &settings.jobs)?;

    let state = ApiState {
        service,
        sync,
        db: repositories,
        store,
    };

    let result = serve_http(&settings, state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;
    scheduler.abort_all();

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn spawn_job_monitor(
    sync: Arc<SyncService>,
    jobs: &config::JobsSettings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let sync_schedule = parse_schedule(&jobs.sync_cron)?;
    let poll_schedule = parse_schedule(&jobs.live_poll_cron)?;
    let context = SyncJobContext { sync };

    let sync_worker = WorkerBuilder::new("sync-data-worker")
        .data(context.clone())
        .backend(CronStream::new(sync_schedule))
        .build_fn(process_sync_data_job);
    let poll_worker = WorkerBuilder::new("live-poll-worker")
        .data(context)
        .backend(CronStream::new(poll_schedule))
        .build_fn(process_live_poll_job);

    let monitor = Monitor::new().register(sync_worker).register(poll_worker);

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let addr = settings.server.addr().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "invalid listen address: {err}"
        )))
    })?;

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;

    info!(target: "gaffer::main", %addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}
