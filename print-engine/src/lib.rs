//! Print Engine - receipt rendering and print delivery
//!
//! # Overview
//!
//! Turns an order snapshot plus a receipt template into a fixed-width
//! command stream and delivers it, at least once, to thermal printers that
//! are often offline.
//!
//! ```text
//! order + template -> LayoutResolver -> ThermalFormatter -> PrintCommand[]
//!     -> PrintQueueStore (redb) -> PrintJobProcessor -> DeviceDriver -> paper
//! ```
//!
//! # Modules
//!
//! ```text
//! print-engine/src/
//! ├── api/        # HTTP submission and operator routes
//! ├── core/       # config, errors, startup wiring, background tasks
//! ├── template/   # template model, value formatting, resolver, catalog
//! ├── thermal/    # width fitting and the formatter
//! ├── printing/   # commands, jobs, queue, devices, processor, service
//! └── utils/      # logging, time
//! ```

pub mod api;
pub mod core;
pub mod printing;
pub mod template;
pub mod thermal;
pub mod utils;

pub use core::{
    BackgroundTasks, Config, EngineResult, EngineState, PrintEngineError, TaskKind,
};
pub use printing::{
    DeviceDriver, DeviceError, DeviceRegistry, JobStatus, PrintCommand, PrintJob,
    PrintJobProcessor, PrintQueueStore, PrintService, RetryPolicy, TargetKind,
};
pub use template::{LayoutResolver, Template, TemplateCatalog, TemplateError};
pub use thermal::{RenderSettings, ThermalFormatter};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, read configuration, prepare the work directory and logging
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();
    let config = Config::from_env();

    std::fs::create_dir_all(&config.work_dir)?;
    init_logger_with_file(&config.log_level, config.log_dir.as_deref())?;
    Ok(config)
}
