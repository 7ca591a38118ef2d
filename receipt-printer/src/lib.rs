//! # receipt-printer
//!
//! ESC/POS thermal printer plumbing - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW bytes reach paper:
//! - ESC/POS command building
//! - Codepage encoding (GBK, PC858) with printer cell widths
//! - Network printing (TCP port 9100)
//! - Spooler printing through a helper process (`lp -o raw` and friends)
//!
//! WHAT to print (templates, layout, queueing) lives in `print-engine`.
//!
//! ## Example
//!
//! ```ignore
//! use receipt_printer::{EscPosBuilder, Justify, NetworkPrinter, Printer};
//!
//! let mut builder = EscPosBuilder::new();
//! builder.align(Justify::Center).bold(true).line("THE ANCHOR").bold(false);
//! builder.align(Justify::Left).line("Table 12");
//! builder.feed(3).cut();
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod printer;

// Re-exports
pub use encoding::{Codepage, char_cells, encode, text_cells};
pub use error::{PrintError, PrintResult};
pub use escpos::{EscPosBuilder, Justify};
pub use printer::{NetworkPrinter, Printer, SpoolerPrinter};
