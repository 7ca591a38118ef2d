//! Core infrastructure: configuration, errors, startup wiring, background tasks

pub mod config;
pub mod error;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{EngineResult, PrintEngineError};
pub use state::EngineState;
pub use tasks::{BackgroundTasks, TaskKind};
