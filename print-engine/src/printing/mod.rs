//! Print jobs, queue and delivery
//!
//! - [`command`] - abstract print commands (formatter output, driver input)
//! - [`job`] - job record and status machine
//! - [`storage`] - redb-backed durable queue
//! - [`device`] - driver contract, connectivity cache, registry
//! - [`escpos`] - ESC/POS driver over TCP or a spooler helper
//! - [`processor`] - per-device worker with retry and backoff
//! - [`service`] - submission and operator API

pub mod command;
pub mod device;
pub mod escpos;
pub mod job;
pub mod processor;
pub mod retry;
pub mod service;
pub mod storage;

pub use command::{FittedCell, PrintCommand, preview_lines};
pub use device::{
    Device, DeviceDriver, DeviceError, DeviceErrorCode, DeviceHandle, DeviceRegistry, Transport,
};
pub use escpos::{DeviceSpec, EscPosDriver, encode_commands};
pub use job::{JobStatus, NewPrintJob, PrintJob, QueueStats, TargetKind};
pub use processor::{PrintJobProcessor, ProcessorHealth, Step};
pub use retry::RetryPolicy;
pub use service::{PrintService, RenderedDocument};
pub use storage::{PrintQueueStore, QueueResult, QueueStoreError};
