//! ESC/POS device driver
//!
//! Renders [`PrintCommand`]s with `receipt_printer::EscPosBuilder` and ships
//! the bytes over TCP or through a spooler helper.

use async_trait::async_trait;
use receipt_printer::{
    Codepage, EscPosBuilder, Justify, NetworkPrinter, PrintError, Printer, SpoolerPrinter,
};
use tracing::instrument;

use super::command::PrintCommand;
use super::device::{DeviceDriver, DeviceError, Transport};
use crate::template::Align;

/// Where an ESC/POS device lives, parsed from configuration
///
/// - `tcp://192.168.1.50:9100` (port defaults to 9100)
/// - `spool://kitchen` (CUPS queue name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    Network { addr: String },
    Spooler { queue: String },
}

impl DeviceSpec {
    pub fn parse(spec: &str) -> Result<Self, DeviceError> {
        let spec = spec.trim();
        if let Some(addr) = spec.strip_prefix("tcp://") {
            let addr = if addr.contains(':') {
                addr.to_string()
            } else {
                format!("{}:9100", addr)
            };
            return Ok(DeviceSpec::Network { addr });
        }
        if let Some(queue) = spec.strip_prefix("spool://")
            && !queue.is_empty()
        {
            return Ok(DeviceSpec::Spooler {
                queue: queue.to_string(),
            });
        }
        Err(DeviceError::from(PrintError::InvalidConfig(format!(
            "Unknown device spec: {}",
            spec
        ))))
    }
}

enum Connection {
    Network(NetworkPrinter),
    Spooler(SpoolerPrinter),
}

pub struct EscPosDriver {
    name: String,
    connection: Connection,
    codepage: Codepage,
}

impl EscPosDriver {
    pub fn network(name: &str, printer: NetworkPrinter, codepage: Codepage) -> Self {
        Self {
            name: name.to_string(),
            connection: Connection::Network(printer),
            codepage,
        }
    }

    pub fn spooler(name: &str, printer: SpoolerPrinter, codepage: Codepage) -> Self {
        Self {
            name: name.to_string(),
            connection: Connection::Spooler(printer),
            codepage,
        }
    }

    pub fn from_spec(name: &str, spec: &DeviceSpec, codepage: Codepage) -> Result<Self, DeviceError> {
        match spec {
            DeviceSpec::Network { addr } => Ok(Self::network(
                name,
                NetworkPrinter::from_addr(addr)?,
                codepage,
            )),
            DeviceSpec::Spooler { queue } => {
                Ok(Self::spooler(name, SpoolerPrinter::new(queue), codepage))
            }
        }
    }
}

/// Encode a command stream as ESC/POS bytes
pub fn encode_commands(commands: &[PrintCommand], codepage: Codepage) -> Vec<u8> {
    let mut builder = EscPosBuilder::new().with_codepage(codepage);
    for command in commands {
        match command {
            PrintCommand::Text { line } => {
                builder.line(line);
            }
            PrintCommand::Rule { ch, width } => {
                builder.line(&PrintCommand::rule_line(*ch, *width));
            }
            PrintCommand::TableRow { cells } => {
                builder.line(&PrintCommand::row_line(cells));
            }
            PrintCommand::SetBold { on } => {
                builder.bold(*on);
            }
            PrintCommand::SetAlign { align } => {
                builder.align(justify(*align));
            }
            PrintCommand::FeedLines { n } => {
                builder.feed(*n);
            }
            PrintCommand::Cut => {
                builder.cut();
            }
        }
    }
    builder.build()
}

fn justify(align: Align) -> Justify {
    match align {
        Align::Left => Justify::Left,
        Align::Center => Justify::Center,
        Align::Right => Justify::Right,
    }
}

#[async_trait]
impl DeviceDriver for EscPosDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> Transport {
        match &self.connection {
            Connection::Network(p) => Transport::Network {
                addr: p.addr().to_string(),
            },
            Connection::Spooler(p) => Transport::Spooler {
                queue: p.queue().to_string(),
            },
        }
    }

    async fn is_connected(&self) -> bool {
        match &self.connection {
            Connection::Network(p) => p.is_online().await,
            Connection::Spooler(p) => p.is_online().await,
        }
    }

    #[instrument(skip(self, commands), fields(device = %self.name, commands = commands.len()))]
    async fn send(&self, commands: &[PrintCommand]) -> Result<(), DeviceError> {
        let data = encode_commands(commands, self.codepage);
        match &self.connection {
            Connection::Network(p) => p.print(&data).await?,
            Connection::Spooler(p) => p.print(&data).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::FittedCell;
    use crate::printing::device::DeviceErrorCode;

    #[test]
    fn test_parse_spec() {
        assert_eq!(
            DeviceSpec::parse("tcp://10.0.0.5").unwrap(),
            DeviceSpec::Network {
                addr: "10.0.0.5:9100".into()
            }
        );
        assert_eq!(
            DeviceSpec::parse(" spool://kitchen ").unwrap(),
            DeviceSpec::Spooler {
                queue: "kitchen".into()
            }
        );
        let err = DeviceSpec::parse("usb://whatever").unwrap_err();
        assert_eq!(err.code, DeviceErrorCode::Unsupported);
    }

    #[test]
    fn test_encode_commands() {
        let commands = vec![
            PrintCommand::SetAlign {
                align: Align::Center,
            },
            PrintCommand::SetBold { on: true },
            PrintCommand::Text {
                line: "CAFE".into(),
            },
            PrintCommand::SetBold { on: false },
            PrintCommand::TableRow {
                cells: vec![
                    FittedCell {
                        text: "Tea ".into(),
                        align: Align::Left,
                    },
                    FittedCell {
                        text: "£3".into(),
                        align: Align::Right,
                    },
                ],
            },
            PrintCommand::Rule { ch: '-', width: 4 },
            PrintCommand::FeedLines { n: 3 },
            PrintCommand::Cut,
        ];

        let data = encode_commands(&commands, Codepage::Pc858);
        let expected: Vec<u8> = [
            &[0x1B, 0x74, 19][..],
            &[0x1B, 0x40, 0x1B, 0x74, 19],
            &[0x1B, 0x61, 0x01],
            &[0x1B, 0x45, 0x01],
            b"CAFE\n",
            &[0x1B, 0x45, 0x00],
            &[b'T', b'e', b'a', b' ', 0x9C, b'3', b'\n'],
            b"----\n",
            &[0x1B, 0x64, 3],
            &[0x1D, 0x56, 0x00],
        ]
        .concat();
        assert_eq!(data, expected);
    }

    #[tokio::test]
    async fn test_network_driver_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let spec = DeviceSpec::parse(&format!("tcp://{}", addr)).unwrap();
        let driver = EscPosDriver::from_spec("receipt", &spec, Codepage::Pc858).unwrap();
        assert!(!driver.is_connected().await);
        let err = driver.send(&[PrintCommand::Cut]).await.unwrap_err();
        assert_eq!(err.code, DeviceErrorCode::Disconnected);
    }
}
