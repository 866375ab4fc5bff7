//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::capture::{CaptureSettings, JobInterceptor, RequestInterceptor};
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, MaintenanceCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::StorageService;
use crate::domain::maintenance::QueryMergeTask;
use crate::domain::tracker::{Tracker, TrackerOptions, TracingSink};

/// Wired collector: storage, tracker and the interceptors hosts wrap work with
pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<StorageService>,
    pub tracker: Tracker,
    pub requests: RequestInterceptor,
    pub jobs: JobInterceptor,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Maintenance {
                command: MaintenanceCommands::MergeQueries,
            }) => Self::merge_queries(&cli_config).await,
            Some(Commands::Start) | None => {
                let app = Self::init(&cli_config).await?;
                Self::start_server(app).await
            }
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        Self::from_config(config).await
    }

    /// Build the collector from an already-layered configuration
    ///
    /// Background tasks are not started; call `start_background_tasks`.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let storage = AppStorage::init(&config).await?;

        let database = Arc::new(
            StorageService::init(&config.database, &storage)
                .await
                .with_context(|| {
                    format!("Failed to initialize {} storage", config.database.backend)
                })?,
        );

        let tracker = Tracker::new(
            database.repository(),
            Arc::new(TracingSink),
            TrackerOptions::from_config(&config.tracker, config.capture.async_mode),
        );
        let settings = CaptureSettings::from_config(&config.capture);
        let requests = RequestInterceptor::new(settings.clone(), tracker.clone());
        let jobs = JobInterceptor::new(settings, tracker.clone());
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            tracker,
            requests,
            jobs,
        })
    }

    /// One-shot dedup merge for the `maintenance merge-queries` command
    async fn merge_queries(cli: &CliConfig) -> Result<()> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = StorageService::init(&config.database, &storage).await?;

        let report = QueryMergeTask::new(database.repository())
            .run_once()
            .await
            .context("Query merge failed")?;
        database.close().await;

        if report.is_empty() {
            println!("No duplicate queries found.");
        } else {
            println!(
                "Merged {} duplicate query rows across {} groups ({} operations repointed, {} hashes rewritten).",
                report.merged_rows,
                report.groups,
                report.operations_repointed,
                report.hashes_rewritten
            );
        }
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        banner::print_banner(&app.config, &app.storage.data_dir().display().to_string());

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    /// Start the tracker dispatcher and storage/maintenance tasks
    ///
    /// All handles are registered with the shutdown service, which drains the
    /// tracker before closing storage.
    pub async fn start_background_tasks(&self) {
        if let Some(h) = self.tracker.start(self.shutdown.subscribe()) {
            self.shutdown.register(h).await;
        }

        self.shutdown
            .register(
                self.database
                    .start_background_task(self.shutdown.subscribe()),
            )
            .await;

        if let Some(h) = QueryMergeTask::new(self.database.repository()).start(
            self.config.maintenance.merge_interval_minutes,
            self.shutdown.subscribe(),
        ) {
            self.shutdown.register(h).await;
        }

        tracing::debug!("Background tasks started");
    }
}
