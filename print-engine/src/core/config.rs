use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use receipt_printer::Codepage;

use crate::printing::{RetryPolicy, TargetKind};
use crate::thermal::RenderSettings;

/// Print engine configuration
///
/// # Environment variables
///
/// Every field can be overridden from the environment (a `.env` file is
/// honoured by the binary):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/print-engine | queue database and logs |
/// | TEMPLATE_DIR | $WORK_DIR/templates | template JSON files |
/// | PAPER_COLUMNS | 42 | width when a template does not set one |
/// | FEED_LINES | 3 | feed before the final cut |
/// | CURRENCY_SYMBOL | £ | currency prefix |
/// | TIMEZONE | Europe/London | zone for datetime bindings |
/// | MAX_PRINT_ATTEMPTS | 5 | attempts before a job fails for good |
/// | RETRY_BASE_DELAY_MS | 2000 | first backoff step |
/// | RETRY_MAX_DELAY_MS | 60000 | backoff cap |
/// | POLL_INTERVAL_MS | 1000 | idle poll interval |
/// | PROTOCOL_ERROR_ALERT_THRESHOLD | 3 | protocol errors before operator alert |
/// | RECEIPT_PRINTER | - | `tcp://host:port` or `spool://queue` |
/// | KITCHEN_PRINTER | - | `tcp://host:port` or `spool://queue` |
/// | PRINTER_CODEPAGE | pc858 | `pc858` or `gbk` |
/// | HTTP_ADDR | 127.0.0.1:8090 | submission and operator API |
/// | LOG_LEVEL | info | tracing level |
/// | LOG_DIR | - | rolling log directory |
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub template_dir: String,
    pub paper_columns: usize,
    pub feed_lines: u8,
    pub currency_symbol: String,
    pub timezone: Tz,
    pub max_print_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub protocol_error_alert_threshold: u32,
    /// Device spec for customer receipts
    pub receipt_printer: Option<String>,
    /// Device spec for kitchen tickets
    pub kitchen_printer: Option<String>,
    pub codepage: Codepage,
    pub http_addr: String,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, defaults otherwise
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/print-engine".into());
        let template_dir = std::env::var("TEMPLATE_DIR")
            .unwrap_or_else(|_| format!("{}/templates", work_dir));

        Self {
            work_dir,
            template_dir,
            paper_columns: env_or("PAPER_COLUMNS", 42),
            feed_lines: env_or("FEED_LINES", 3),
            currency_symbol: std::env::var("CURRENCY_SYMBOL").unwrap_or_else(|_| "£".into()),
            timezone: env_or("TIMEZONE", chrono_tz::Europe::London),
            max_print_attempts: env_or("MAX_PRINT_ATTEMPTS", 5),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 2000),
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", 60_000),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", 1000),
            protocol_error_alert_threshold: env_or("PROTOCOL_ERROR_ALERT_THRESHOLD", 3),
            receipt_printer: non_empty_var("RECEIPT_PRINTER"),
            kitchen_printer: non_empty_var("KITCHEN_PRINTER"),
            codepage: match std::env::var("PRINTER_CODEPAGE").as_deref() {
                Ok("gbk") | Ok("GBK") => Codepage::Gbk,
                _ => Codepage::Pc858,
            },
            http_addr: std::env::var("HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: non_empty_var("LOG_DIR"),
        }
    }

    /// Override the work directory (tests)
    pub fn with_overrides(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.template_dir = format!("{}/templates", config.work_dir);
        config
    }

    /// Path of the redb queue database
    pub fn queue_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("print_queue.redb")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_base_delay_ms)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            default_columns: self.paper_columns.max(1),
            feed_lines: self.feed_lines,
            currency_symbol: self.currency_symbol.clone(),
            timezone: self.timezone,
        }
    }

    /// Configured (target kind, device spec) routes
    pub fn device_routes(&self) -> Vec<(TargetKind, String)> {
        let mut routes = Vec::new();
        if let Some(spec) = &self.receipt_printer {
            routes.push((TargetKind::Receipt, spec.clone()));
        }
        if let Some(spec) = &self.kitchen_printer {
            routes.push((TargetKind::KitchenTicket, spec.clone()));
        }
        routes
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
