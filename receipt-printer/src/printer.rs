//! Printer transports for sending ESC/POS data
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - Spooler printers, reached through a helper process that accepts raw
//!   bytes on stdin (CUPS `lp -o raw`, vendor USB helpers)

use crate::error::{PrintError, PrintResult};
use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Trait for printer transports
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw ESC/POS data to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// Network printer (TCP port 9100)
///
/// Most thermal printers accept raw jobs on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
    probe_timeout: Duration,
}

impl NetworkPrinter {
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(500),
        })
    }

    /// Set connect/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(data), fields(addr = %self.addr, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        debug!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr)))??;

        info!("Print data delivered");
        Ok(())
    }

    #[instrument(fields(addr = %self.addr))]
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

/// A helper invocation: program plus arguments
#[derive(Debug, Clone)]
struct HelperCommand {
    program: String,
    args: Vec<String>,
}

impl HelperCommand {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        cmd
    }
}

/// Spooler printer
///
/// Streams raw bytes into a helper process on stdin. The default helper is
/// CUPS: `lp -d <queue> -o raw`, with `lpstat -p <queue>` as the status probe.
#[derive(Debug, Clone)]
pub struct SpoolerPrinter {
    queue: String,
    submit: HelperCommand,
    status: Option<HelperCommand>,
    timeout: Duration,
}

impl SpoolerPrinter {
    /// CUPS queue by name
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_string(),
            submit: HelperCommand {
                program: "lp".to_string(),
                args: vec![
                    "-d".to_string(),
                    queue.to_string(),
                    "-o".to_string(),
                    "raw".to_string(),
                ],
            },
            status: Some(HelperCommand {
                program: "lpstat".to_string(),
                args: vec!["-p".to_string(), queue.to_string()],
            }),
            timeout: Duration::from_secs(10),
        }
    }

    /// Vendor helper that reads raw bytes on stdin.
    ///
    /// No status probe is configured; the queue is assumed online until a
    /// submission fails.
    pub fn with_helper(queue: &str, program: &str, args: &[&str]) -> Self {
        Self {
            queue: queue.to_string(),
            submit: HelperCommand {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            status: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl Printer for SpoolerPrinter {
    #[instrument(skip(self, data), fields(queue = %self.queue, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut child = self
            .submit
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PrintError::Connection(format!("{}: cannot start helper: {}", self.queue, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
            stdin.shutdown().await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PrintError::Timeout(format!("Spooler timeout: {}", self.queue)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PrintError::Spooler(format!(
                "{} exited with {}: {}",
                self.submit.program, output.status, stderr
            )));
        }

        info!("Print data handed to spooler");
        Ok(())
    }

    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn is_online(&self) -> bool {
        let Some(status) = &self.status else {
            return true;
        };

        let mut probe = status.command();
        probe.stdin(Stdio::null());
        match tokio::time::timeout(self.timeout, probe.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                // lpstat prints "printer X disabled since ..." for paused queues
                let online = !stdout.contains("disabled");
                if !online {
                    warn!("Spooler queue disabled");
                }
                online
            }
            Ok(Ok(output)) => {
                warn!(status = %output.status, "Spooler queue unknown");
                false
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Spooler status probe failed");
                false
            }
            Err(_) => {
                warn!("Spooler status probe timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        assert!(NetworkPrinter::from_addr("invalid").is_err());
    }

    #[tokio::test]
    async fn test_network_printer_delivers_bytes() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        printer.print(b"\x1B\x40hello").await.unwrap();
        drop(printer);

        assert_eq!(server.await.unwrap(), b"\x1B\x40hello");
    }

    #[tokio::test]
    async fn test_network_printer_offline() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        assert!(!printer.is_online().await);
        let err = printer.print(b"x").await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spooler_helper_exit_status() {
        let ok = SpoolerPrinter::with_helper("test", "sh", &["-c", "cat > /dev/null"]);
        assert!(ok.is_online().await);
        ok.print(b"receipt").await.unwrap();

        let failing = SpoolerPrinter::with_helper("test", "sh", &["-c", "cat > /dev/null; exit 3"]);
        let err = failing.print(b"receipt").await.unwrap_err();
        assert!(matches!(err, PrintError::Spooler(_)));
    }

    #[tokio::test]
    async fn test_spooler_missing_helper() {
        let printer = SpoolerPrinter::with_helper("test", "definitely-not-a-real-helper", &[]);
        let err = printer.print(b"receipt").await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
