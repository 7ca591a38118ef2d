//! Print engine daemon
//!
//! `print-engine` runs one processor per configured printer and serves the
//! submission API on `HTTP_ADDR` until Ctrl-C.
//! `print-engine preview <template_id> <order.json> [receipt|kitchen_ticket]`
//! renders an order to stdout without queueing anything.

use std::time::Duration;

use anyhow::{Context, bail};
use print_engine::printing::preview_lines;
use print_engine::{
    BackgroundTasks, Config, EngineState, LayoutResolver, TargetKind, TaskKind, TemplateCatalog,
    setup_environment,
};

const TASK_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = setup_environment()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => run_daemon(config).await,
        Some("preview") => preview(&config, &args[1..]),
        Some(other) => bail!("unknown command: {}", other),
    }
}

fn preview(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let (Some(template_id), Some(order_path)) = (args.first(), args.get(1)) else {
        bail!("usage: print-engine preview <template_id> <order.json> [receipt|kitchen_ticket]");
    };
    let target = match args.get(2).map(String::as_str) {
        None | Some("receipt") => TargetKind::Receipt,
        Some("kitchen_ticket") => TargetKind::KitchenTicket,
        Some(other) => bail!("unknown target kind: {}", other),
    };

    let catalog = TemplateCatalog::new();
    catalog
        .load_dir(&config.template_dir)
        .context("loading templates")?;
    let template = catalog
        .get(template_id)
        .with_context(|| format!("template {} not found", template_id))?;
    let order: serde_json::Value = serde_json::from_slice(
        &std::fs::read(order_path).with_context(|| format!("reading {}", order_path))?,
    )?;

    // Render only; a running daemon holds the queue database
    let settings = config.render_settings();
    let nodes = LayoutResolver::new(settings.value_formatter()).resolve(&template, &order, target)?;
    let columns = settings.columns_for(&template);
    let commands = settings.formatter().format(&nodes, columns);
    for line in preview_lines(&commands, columns) {
        println!("{}", line);
    }
    Ok(())
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    tracing::info!(work_dir = %config.work_dir, "Print engine starting...");

    let state = EngineState::initialize(&config).context("initializing print engine")?;
    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks);

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("binding {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "HTTP API listening");
    let app = print_engine::api::build_app(state);
    let http_token = tasks.shutdown_token();
    tasks.spawn("http_api", TaskKind::Worker, async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(http_token.cancelled_owned())
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "HTTP API stopped");
        }
    });

    tasks.log_summary();

    let mut health_tick = tokio::time::interval(TASK_HEALTH_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = health_tick.tick() => {
                tasks.check_health();
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
