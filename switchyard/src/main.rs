#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod simulated;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use args::{Args, Command};
use clap::Parser;
use futures::StreamExt;
use switchyard_config::Config;
use switchyard_core::CompletionRequest;
use switchyard_engine::Engine;
use switchyard_routing::RoutingOptions;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    let _telemetry_guard = switchyard_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::info!(
        config_path = %args.config.display(),
        providers = config.providers.len(),
        "starting switchyard"
    );

    match args.command {
        Command::Validate => {
            let enabled = config.providers.values().filter(|p| p.enabled).count();
            println!(
                "configuration valid: {enabled} of {} providers enabled, {} budgets",
                config.providers.len(),
                config.ledger.budgets.len()
            );
        }
        Command::Route { prompt, execute } => route(&config, prompt, execute).await?,
        Command::Simulate {
            requests,
            concurrency,
            prompt,
            bypass_cache,
        } => {
            let options = RoutingOptions {
                bypass_cache,
                ..RoutingOptions::default()
            };
            simulate(&config, requests, concurrency, prompt, &options).await?;
        }
    }

    tracing::info!("switchyard stopped");
    Ok(())
}

/// Build the engine over simulated providers, restoring any saved snapshot
async fn build_engine(config: &Config) -> anyhow::Result<Arc<Engine>> {
    let registry = simulated::registry(config)?;
    let engine = Engine::new(config, registry)?;

    if let Some(persistence) = engine.persistence()
        && engine.load_snapshot(&persistence.path).await?
    {
        tracing::info!(path = %persistence.path.display(), "statistics snapshot restored");
    }

    Ok(Arc::new(engine))
}

async fn route(config: &Config, prompt: String, execute: bool) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let request = CompletionRequest::from_prompt(prompt);
    let options = RoutingOptions::default();

    let output = if execute {
        serde_json::to_string_pretty(&engine.route_and_execute(&request, &options).await?)?
    } else {
        serde_json::to_string_pretty(&engine.route(&request, &options)?)?
    };
    println!("{output}");

    if let Some(persistence) = engine.persistence() {
        engine.save_snapshot(&persistence.path).await?;
    }
    Ok(())
}

async fn simulate(
    config: &Config,
    requests: usize,
    concurrency: usize,
    prompt: String,
    options: &RoutingOptions,
) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;

    let shutdown = CancellationToken::new();
    let maintenance = engine.spawn_maintenance(shutdown.clone());
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let request = CompletionRequest::from_prompt(prompt);
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let traffic = futures::stream::iter(0..requests)
        .map(|_| async {
            match engine.route_and_execute(&request, options).await {
                Ok(report) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        provider = %report.feedback.provider,
                        cache_hit = report.feedback.cache_hit,
                        cost = report.feedback.cost,
                        "simulated request succeeded"
                    );
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "simulated request failed");
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<()>>();

    tokio::select! {
        _ = traffic => {}
        () = shutdown.cancelled() => tracing::info!("simulation interrupted"),
    }

    shutdown.cancel();
    maintenance.await?;

    let summary = serde_json::json!({
        "requests": requests,
        "succeeded": succeeded.load(Ordering::Relaxed),
        "failed": failed.load(Ordering::Relaxed),
        "cache": engine.cache_stats(),
        "budgets": engine.budgets(),
        "statistics": engine.export_statistics(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
