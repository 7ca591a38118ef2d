//! Device driver contract and connectivity tracking
//!
//! A driver takes the abstract [`PrintCommand`] stream and answers with a
//! typed result. An unreachable printer is an ordinary `DeviceError`, not a
//! panic and not an engine error.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use receipt_printer::PrintError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::command::PrintCommand;
use crate::utils::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceErrorCode {
    /// Printer unreachable
    Disconnected,
    /// Reached, but the job was rejected or garbled
    Protocol,
    Timeout,
    /// The driver cannot do what was asked; retrying will not help
    Unsupported,
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceError {
    pub code: DeviceErrorCode,
    pub message: String,
}

impl DeviceError {
    pub fn new(code: DeviceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(DeviceErrorCode::Disconnected, message)
    }

    /// Worth another attempt later
    pub fn is_transient(&self) -> bool {
        !matches!(self.code, DeviceErrorCode::Unsupported)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DeviceError {}

impl From<PrintError> for DeviceError {
    fn from(err: PrintError) -> Self {
        let code = match &err {
            PrintError::Connection(_) | PrintError::Offline(_) | PrintError::Io(_) => {
                DeviceErrorCode::Disconnected
            }
            PrintError::Timeout(_) => DeviceErrorCode::Timeout,
            PrintError::Spooler(_) => DeviceErrorCode::Protocol,
            PrintError::InvalidConfig(_) => DeviceErrorCode::Unsupported,
        };
        Self::new(code, err.to_string())
    }
}

/// How a device is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Transport {
    /// Raw TCP (port 9100)
    Network { addr: String },
    /// Helper process fed on stdin (CUPS `lp -o raw`, vendor USB tools)
    Spooler { queue: String },
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Network { addr } => write!(f, "tcp://{}", addr),
            Transport::Spooler { queue } => write!(f, "spool://{}", queue),
        }
    }
}

/// One printer, whatever the transport
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn name(&self) -> &str;

    fn transport(&self) -> Transport;

    async fn is_connected(&self) -> bool;

    async fn send(&self, commands: &[PrintCommand]) -> Result<(), DeviceError>;
}

/// Operator view of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub transport: Transport,
    pub last_known_connected: bool,
    pub last_checked_at: Option<i64>,
}

/// A driver plus its cached connectivity
pub struct DeviceHandle {
    driver: Arc<dyn DeviceDriver>,
    connected: AtomicBool,
    /// 0 until the first probe
    last_checked_at: AtomicI64,
}

impl DeviceHandle {
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self {
            driver,
            connected: AtomicBool::new(false),
            last_checked_at: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn last_known_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Ask the driver and refresh the cached state
    pub async fn probe(&self) -> bool {
        let connected = self.driver.is_connected().await;
        self.mark_connected(connected);
        connected
    }

    pub fn mark_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        let first = self.last_checked_at.swap(now_millis(), Ordering::AcqRel) == 0;
        if was != connected || first {
            if connected {
                tracing::info!(device = %self.name(), "Printer online");
            } else {
                tracing::warn!(device = %self.name(), "Printer offline");
            }
        }
    }

    /// Send through the driver; a disconnect also updates the cached state
    pub async fn send(&self, commands: &[PrintCommand]) -> Result<(), DeviceError> {
        let result = self.driver.send(commands).await;
        match &result {
            Ok(()) => self.mark_connected(true),
            Err(e) if e.code == DeviceErrorCode::Disconnected => self.mark_connected(false),
            Err(_) => {}
        }
        result
    }

    pub fn snapshot(&self) -> Device {
        let checked = self.last_checked_at.load(Ordering::Acquire);
        Device {
            name: self.name().to_string(),
            transport: self.driver.transport(),
            last_known_connected: self.last_known_connected(),
            last_checked_at: (checked > 0).then_some(checked),
        }
    }
}

/// Process-wide set of devices, keyed by name
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<DashMap<String, Arc<DeviceHandle>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver: Arc<dyn DeviceDriver>) -> Arc<DeviceHandle> {
        let handle = Arc::new(DeviceHandle::new(driver));
        tracing::info!(device = %handle.name(), transport = %handle.driver.transport(), "Device registered");
        self.devices
            .insert(handle.name().to_string(), handle.clone());
        handle
    }

    pub fn get(&self, name: &str) -> Option<Arc<DeviceHandle>> {
        self.devices.get(name).map(|entry| entry.value().clone())
    }

    pub fn handles(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    /// Snapshots sorted by name
    pub fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.iter().map(|e| e.value().snapshot()).collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub async fn probe_all(&self) {
        for handle in self.handles() {
            handle.probe().await;
        }
    }

    /// Refresh connectivity every `interval` until shutdown
    pub async fn run_health_probe(self, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Device health probe started");
        loop {
            self.probe_all().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("Device health probe stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FlakyDriver {
        online: AtomicBool,
        sends: AtomicUsize,
    }

    #[async_trait]
    impl DeviceDriver for FlakyDriver {
        fn name(&self) -> &str {
            "bar"
        }

        fn transport(&self) -> Transport {
            Transport::Network {
                addr: "10.0.0.5:9100".into(),
            }
        }

        async fn is_connected(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        async fn send(&self, _commands: &[PrintCommand]) -> Result<(), DeviceError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DeviceError::disconnected("no route to host"))
            }
        }
    }

    #[test]
    fn test_print_error_mapping() {
        let err: DeviceError = PrintError::Connection("refused".into()).into();
        assert_eq!(err.code, DeviceErrorCode::Disconnected);
        assert!(err.is_transient());

        let err: DeviceError = PrintError::Spooler("lp exited with 1".into()).into();
        assert_eq!(err.code, DeviceErrorCode::Protocol);

        let err: DeviceError = PrintError::InvalidConfig("bad addr".into()).into();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_registry_tracks_connectivity() {
        let driver = Arc::new(FlakyDriver {
            online: AtomicBool::new(true),
            sends: AtomicUsize::new(0),
        });
        let registry = DeviceRegistry::new();
        let handle = registry.register(driver.clone());

        assert!(registry.list()[0].last_checked_at.is_none());
        registry.probe_all().await;
        let devices = registry.list();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].last_known_connected);
        assert_eq!(devices[0].transport.to_string(), "tcp://10.0.0.5:9100");

        driver.online.store(false, Ordering::SeqCst);
        let err = handle.send(&[PrintCommand::Cut]).await.unwrap_err();
        assert_eq!(err.code, DeviceErrorCode::Disconnected);
        assert!(!registry.get("bar").unwrap().last_known_connected());
        assert_eq!(driver.sends.load(Ordering::SeqCst), 1);
    }
}
