//! CLI entrypoint for taskforge
//!
//! This is the main binary that wires together all layers using
//! dependency injection, then runs one task end-to-end.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use taskforge_application::{
    ExecuteRequest, ExecutionCoordinator, MessageBus, NewTask, PlanningService,
    ReliableEventPublisher, StrategyRegistry,
};
use taskforge_domain::TaskId;
use taskforge_infrastructure::{
    ConfigLoader, FileConfig, FileOutputFormat, HeuristicClassifier, InMemoryMessageBus,
    InMemoryTaskStore, JsonlMessageBus, OpenAiCompatibleClient, OpenAiSettings,
};
use taskforge_presentation::{Cli, ConsoleFormatter, OutputFormat};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        println!("Configuration sources (lowest to highest priority):");
        for source in ConfigLoader::config_sources() {
            println!("  {}", source);
        }
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    let _log_guard = init_logging(&cli, &config)?;
    info!("Starting taskforge");

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        bail!("Invalid configuration ({} problem(s))", errors.len());
    }

    if !config.output.color {
        colored::control::set_override(false);
    }

    let Some(description) = cli.description.clone() else {
        bail!("A task description is required. Use --help for usage.");
    };
    let Some(title) = cli.resolved_title() else {
        bail!("Could not derive a title from the description; pass --title.");
    };

    // === Dependency Injection ===
    let coordinator_config = config.coordinator_config();

    let api_key = config.llm.api_key().with_context(|| {
        format!(
            "No API key found; set the {} environment variable",
            config.llm.api_key_env
        )
    })?;
    let settings = OpenAiSettings::new(api_key)
        .with_base_url(config.llm.base_url.clone())
        .with_price_per_1k_tokens(config.llm.price_per_1k_tokens)
        .with_request_timeout(Duration::from_secs(config.llm.request_timeout_secs));
    let llm = Arc::new(OpenAiCompatibleClient::new(settings)?);

    let store = Arc::new(InMemoryTaskStore::new());
    let bus: Arc<dyn MessageBus> = match &config.publisher.events_dir {
        Some(dir) => match JsonlMessageBus::in_dir(dir) {
            Some(bus) => Arc::new(bus),
            None => {
                warn!(dir = %dir.display(), "Event log unavailable, keeping events in memory");
                Arc::new(InMemoryMessageBus::new())
            }
        },
        None => Arc::new(InMemoryMessageBus::new()),
    };
    let publisher = Arc::new(ReliableEventPublisher::new(
        bus,
        coordinator_config.publisher.clone(),
    ));

    let planning = Arc::new(
        PlanningService::new(llm.clone(), coordinator_config.strategy.clone())
            .with_memory(store.clone()),
    );
    let strategies = StrategyRegistry::standard(llm, planning, &coordinator_config.strategy);

    let coordinator = ExecutionCoordinator::new(
        store.clone(),
        store,
        Arc::new(HeuristicClassifier::new()),
        publisher,
        strategies,
        coordinator_config,
    );

    // === Run ===
    let mut new_task = NewTask::new(cli.user.as_str(), title, description);
    if let Some(task_type) = cli.task_type {
        new_task = new_task.with_task_type(task_type);
    }
    let task = coordinator.create_task(new_task).await?;

    let mut request = ExecuteRequest::default();
    if let Some(strategy) = cli.strategy {
        request = request.with_strategy(strategy);
    }
    if let Some(model) = &cli.model {
        request = request.with_model(model.clone());
    }
    let ticket = coordinator.execute(task.id(), request).await?;
    info!(
        task_id = %ticket.task_id,
        execution_id = %ticket.execution_id,
        strategy = %ticket.strategy,
        "Execution accepted"
    );

    tokio::select! {
        result = follow_logs(&coordinator, task.id(), cli.quiet) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!(task_id = %task.id(), "Interrupted, cancelling execution");
            coordinator
                .cancel(task.id(), Some("interrupted".to_string()))
                .await?;
            follow_logs(&coordinator, task.id(), true).await?;
        }
    }

    coordinator.shutdown().await;
    let task = coordinator.get_task(task.id()).await?;

    let format = cli.output.unwrap_or(match config.output.format {
        FileOutputFormat::Text => OutputFormat::Text,
        FileOutputFormat::Json => OutputFormat::Json,
    });
    let output = match format {
        OutputFormat::Text => ConsoleFormatter::format(&task),
        OutputFormat::Json => ConsoleFormatter::format_json(&task),
    };
    println!("{}", output);

    Ok(())
}

/// Stream the execution log until it closes.
async fn follow_logs(coordinator: &ExecutionCoordinator, task_id: TaskId, quiet: bool) -> Result<()> {
    let mut subscription = coordinator.logs(task_id).await?;
    while let Some(line) = subscription.next_line().await {
        if !quiet {
            eprintln!("{}", ConsoleFormatter::log_line(&line));
        }
    }
    Ok(())
}

/// `RUST_LOG` wins, then `-v`, then `logging.level`, then `warn`.
fn init_logging(cli: &Cli, config: &FileConfig) -> Result<Option<WorkerGuard>> {
    let directive = match cli.verbose {
        0 => config.logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}
