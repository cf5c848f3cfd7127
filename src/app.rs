use crate::{
    cli::args::{Cli, Command},
    config::{ConfigLoader, EngineConfig},
    core::{
        models::{DispatchRequest, ScanStatus, ScanType, ToolId},
        orchestrator::Orchestrator,
        pool::WorkerPool,
        store::{FileStore, ScanQuery, ScanStore},
    },
    plugins::{options::ScanOptions, registry::AdapterRegistry},
    ui::{printer, progress::ScanSpinner, table},
    utils::logging,
};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load_with_custom_path(cli.config.as_deref())?;

    let level = logging::level_from_cli(&cli, &config.logging.level);
    logging::init(level)?;

    if let Command::Config = cli.command {
        print!("{}", ConfigLoader::template()?);
        return Ok(());
    }

    let store: Arc<dyn ScanStore> = Arc::new(
        FileStore::open(&config.storage.dir)
            .with_context(|| format!("Failed to open scan store at {}", config.storage.dir.display()))?,
    );
    let registry = Arc::new(AdapterRegistry::from_config(&config));
    registry.log_summary();

    match cli.command {
        Command::Scan {
            tool,
            target,
            scan_type,
            options,
            options_json,
            json,
            detach,
        } => {
            if detach {
                let scan = store
                    .create(scan_type.unwrap_or_else(|| tool.scan_type()), tool.as_str(), &target)
                    .await?;
                printer::print_success(&format!("scan {} queued, run `blitzscan worker` to execute it", scan.id));
                return Ok(());
            }
            let options = build_options(options_json.as_deref(), &options)?;
            scan(&config, store, registry, tool, &target, scan_type, options, json).await
        }
        Command::Status { id } => {
            let scan = store.get(id).await?;
            printer::print_scan(&scan);
            Ok(())
        }
        Command::Results { id } => {
            let scan = store.get(id).await?;
            match &scan.results {
                Some(envelope) => printer::print_results(envelope),
                None => bail!("scan {} has no results (status {})", id, scan.status),
            }
        }
        Command::List { status, skip, limit } => {
            let mut query = ScanQuery::default().page(skip, limit);
            if let Some(status) = status {
                query = query.with_status(status);
            }
            let page = store.list(&query).await?;
            println!("{}", table::scans(&page));
            println!("{} of {} scans", page.scans.len(), page.total);
            Ok(())
        }
        Command::Cancel { id } => {
            let orchestrator = Orchestrator::new(store, registry);
            let scan = orchestrator.cancel(id).await?;
            printer::print_scan(&scan);
            Ok(())
        }
        Command::Tools => {
            let tools = registry.availability();
            println!("{}", table::tools(&tools));
            let missing = tools.iter().filter(|t| !t.is_available()).count();
            if missing > 0 {
                printer::print_warning(&format!("{} of {} tools cannot be launched", missing, tools.len()));
            }
            Ok(())
        }
        Command::Worker => {
            let orchestrator = Arc::new(Orchestrator::new(store, registry));
            for id in orchestrator.recover_interrupted().await? {
                printer::print_warning(&format!("scan {} was interrupted, marked FAILED", id));
            }

            let pool = WorkerPool::spawn(
                Arc::clone(&orchestrator),
                config.workers.count,
                config.workers.queue_depth,
            );
            let queued = pool.submit_pending().await?;
            tracing::info!("{} pending scans queued on {} workers", queued.len(), pool.worker_count());
            pool.shutdown().await;

            printer::print_success(&format!("{} pending scans processed", queued.len()));
            Ok(())
        }
        Command::Recover => {
            let orchestrator = Orchestrator::new(store, registry);
            let recovered = orchestrator.recover_interrupted().await?;
            if recovered.is_empty() {
                printer::print_success("no interrupted scans");
            } else {
                for id in &recovered {
                    printer::print_warning(&format!("scan {} was interrupted, marked FAILED", id));
                }
            }
            Ok(())
        }
        Command::Config => Ok(()),
    }
}

/// `--options` JSON first, then each `-o key=value` on top.
fn build_options(json: Option<&str>, pairs: &[String]) -> Result<ScanOptions> {
    let mut options = match json {
        Some(raw) => {
            let map: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(raw).context("--options must be a JSON object")?;
            ScanOptions::from_map(map)
        }
        None => ScanOptions::new(),
    };
    options.merge(ScanOptions::from_pairs(pairs).map_err(anyhow::Error::msg)?);
    Ok(options)
}

#[allow(clippy::too_many_arguments)]
async fn scan(
    config: &EngineConfig,
    store: Arc<dyn ScanStore>,
    registry: Arc<AdapterRegistry>,
    tool: ToolId,
    target: &str,
    scan_type: Option<ScanType>,
    options: ScanOptions,
    json: bool,
) -> Result<()> {
    let (tx, events) = mpsc::unbounded_channel();
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), registry).with_events(tx));

    let scan = store
        .create(scan_type.unwrap_or_else(|| tool.scan_type()), tool.as_str(), target)
        .await?;
    tracing::info!("created scan {} ({} against {})", scan.id, tool, target);

    let spinner = (!json).then(|| {
        ScanSpinner::new(&format!("scan {}: queued", scan.id)).follow(scan.id, events)
    });

    let pool = WorkerPool::spawn(Arc::clone(&orchestrator), 1, config.workers.queue_depth);
    pool.submit(DispatchRequest::for_scan(&scan, options)).await?;

    let id = scan.id;
    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling scan {}", id);
                if let Err(e) = orchestrator.cancel(id).await {
                    tracing::error!("could not cancel scan {}: {}", id, e);
                }
            }
        })
    };

    pool.shutdown().await;
    interrupt.abort();
    drop(orchestrator);
    if let Some(spinner) = spinner {
        let _ = spinner.await;
    }

    let scan = store.get(id).await?;
    if json {
        if let Some(envelope) = &scan.results {
            printer::print_results(envelope)?;
        }
    } else {
        printer::print_scan(&scan);
        if let Some(envelope) = &scan.results {
            println!();
            printer::print_results(envelope)?;
        }
    }

    match scan.status {
        ScanStatus::Completed => Ok(()),
        status => bail!(
            "scan {} ended {}{}",
            id,
            status,
            scan.error_message.map(|m| format!(": {}", m)).unwrap_or_default()
        ),
    }
}
