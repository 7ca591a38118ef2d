//! Engine state - everything the daemon wires together at startup
//!
//! `EngineState::initialize` opens the queue, loads the template catalog,
//! registers the configured printers and builds the [`PrintService`] with a
//! route per printer. `start_background_tasks` then starts one processor per
//! device plus the health probe and cleanup timers.
//!
//! The queue database is held by this process for its whole life, so other
//! processes submit through the HTTP API (see [`crate::api`]).

use std::sync::Arc;
use std::time::Duration;

use receipt_printer::Codepage;

use super::{BackgroundTasks, Config, EngineResult, PrintEngineError, TaskKind};
use crate::printing::{
    DeviceRegistry, DeviceSpec, EscPosDriver, PrintJobProcessor, PrintQueueStore, PrintService,
    TargetKind,
};
use crate::template::TemplateCatalog;

/// Health probe cadence for the device registry
const DEVICE_PROBE_INTERVAL: Duration = Duration::from_secs(15);
/// Finished jobs are kept this long for the operator
const FINISHED_JOB_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct EngineState {
    pub config: Config,
    pub store: PrintQueueStore,
    pub registry: DeviceRegistry,
    pub service: Arc<PrintService>,
}

impl EngineState {
    /// Open the queue, load templates and register printers from `config`
    pub fn initialize(config: &Config) -> EngineResult<Self> {
        let store = PrintQueueStore::open(config.queue_db_path())?
            .with_max_attempts(config.max_print_attempts);

        let catalog = TemplateCatalog::new();
        catalog.load_dir(&config.template_dir)?;
        tracing::info!(templates = ?catalog.ids(), "Template catalog ready");

        let registry = DeviceRegistry::new();
        let mut service = PrintService::new(
            store.clone(),
            catalog,
            registry.clone(),
            config.render_settings(),
        );
        for (target, spec) in config.device_routes() {
            let name = register_device(&registry, target, &spec, config.codepage)?;
            service = service.with_route(target, name);
        }

        if registry.list().is_empty() {
            tracing::warn!("No printers configured (RECEIPT_PRINTER / KITCHEN_PRINTER)");
        }

        Ok(Self {
            config: config.clone(),
            store,
            registry,
            service: Arc::new(service),
        })
    }

    /// Start processors, the device health probe and finished-job cleanup
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let policy = self.config.retry_policy();
        for handle in self.registry.handles() {
            let name = handle.name().to_string();
            let processor = PrintJobProcessor::new(self.store.clone(), handle, policy)
                .with_poll_interval(self.config.poll_interval())
                .with_protocol_alert_threshold(self.config.protocol_error_alert_threshold);
            let token = tasks.shutdown_token();
            tasks.spawn(format!("processor:{}", name), TaskKind::Worker, async move {
                if let Err(e) = processor.run(token).await {
                    tracing::error!(error = %e, "Print job processor exited");
                }
            });
        }

        let probe_token = tasks.shutdown_token();
        tasks.spawn(
            "device_health_probe",
            TaskKind::Periodic,
            self.registry
                .clone()
                .run_health_probe(DEVICE_PROBE_INTERVAL, probe_token),
        );

        let cleanup_store = self.store.clone();
        let cleanup_token = tasks.shutdown_token();
        tasks.spawn("job_cleanup", TaskKind::Periodic, async move {
            loop {
                if let Err(e) = cleanup_store.cleanup_finished(FINISHED_JOB_RETENTION) {
                    tracing::error!(error = %e, "Print job cleanup failed");
                }
                tokio::select! {
                    _ = cleanup_token.cancelled() => break,
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => {}
                }
            }
        });
    }
}

/// The device is named after the target kind it serves
fn register_device(
    registry: &DeviceRegistry,
    target: TargetKind,
    spec: &str,
    codepage: Codepage,
) -> EngineResult<String> {
    let name = target.to_string();
    let spec = DeviceSpec::parse(spec)
        .map_err(|e| PrintEngineError::DeviceConfig(format!("{}: {}", name, e)))?;
    let driver = EscPosDriver::from_spec(&name, &spec, codepage)
        .map_err(|e| PrintEngineError::DeviceConfig(format!("{}: {}", name, e)))?;
    registry.register(Arc::new(driver));
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::with_overrides(dir.path().to_string_lossy().to_string());
        config.receipt_printer = None;
        config.kitchen_printer = None;
        config
    }

    #[test]
    fn test_initialize_routes_each_configured_printer() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.receipt_printer = Some("tcp://127.0.0.1:9".to_string());
        config.kitchen_printer = Some("spool://kitchen".to_string());
        config.max_print_attempts = 2;

        let state = EngineState::initialize(&config).unwrap();
        let names: Vec<String> = state.registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["kitchen_ticket", "receipt"]);
        assert_eq!(state.store.max_attempts(), 2);
        assert!(state.service.catalog().is_empty());
    }

    #[test]
    fn test_bad_device_spec_fails_startup() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.kitchen_printer = Some("usb://whatever".to_string());

        let err = EngineState::initialize(&config).err().unwrap();
        assert!(matches!(err, PrintEngineError::DeviceConfig(_)));
    }

    #[test]
    fn test_broken_template_fails_startup() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.template_dir).unwrap();
        std::fs::write(format!("{}/receipt.json", config.template_dir), "{ not json").unwrap();

        let err = EngineState::initialize(&config).err().unwrap();
        assert!(matches!(err, PrintEngineError::TemplateInvalid(_)));
    }
}
