//! Thermal formatter
//!
//! Turns resolved nodes into a flat [`PrintCommand`] list for a fixed
//! paper width. Pure: no device, no clock.
//!
//! Guarantees for every emitted line:
//! - `Text` lines fit in `columns` cells
//! - `TableRow` cells sum to exactly `columns` cells

pub mod text;

use chrono_tz::Tz;

use crate::printing::{FittedCell, PrintCommand};
use crate::template::{Align, ResolvedNode, Template, ValueFormatter, Weight};
use text::{allocate_columns, fit_cell, wrap};

/// Rendering knobs shared by every job
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Paper width used when a template leaves it at 0
    pub default_columns: usize,
    pub feed_lines: u8,
    pub currency_symbol: String,
    pub timezone: Tz,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_columns: 42,
            feed_lines: 3,
            currency_symbol: "£".to_string(),
            timezone: chrono_tz::Europe::London,
        }
    }
}

impl RenderSettings {
    pub fn columns_for(&self, template: &Template) -> usize {
        match template.paper_width_columns {
            0 => self.default_columns.max(1),
            n => n,
        }
    }

    pub fn value_formatter(&self) -> ValueFormatter {
        ValueFormatter::new(self.currency_symbol.clone(), self.timezone)
    }

    pub fn formatter(&self) -> ThermalFormatter {
        ThermalFormatter::new(self.feed_lines)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThermalFormatter {
    feed_lines: u8,
}

impl Default for ThermalFormatter {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Align and bold as last told to the printer
struct PrinterState {
    align: Align,
    bold: bool,
}

impl PrinterState {
    fn set_align(&mut self, align: Align, out: &mut Vec<PrintCommand>) {
        if self.align != align {
            out.push(PrintCommand::SetAlign { align });
            self.align = align;
        }
    }

    fn set_bold(&mut self, bold: bool, out: &mut Vec<PrintCommand>) {
        if self.bold != bold {
            out.push(PrintCommand::SetBold { on: bold });
            self.bold = bold;
        }
    }
}

impl ThermalFormatter {
    pub fn new(feed_lines: u8) -> Self {
        Self { feed_lines }
    }

    pub fn format(&self, nodes: &[ResolvedNode], columns: usize) -> Vec<PrintCommand> {
        let columns = columns.max(1);
        let mut out = Vec::with_capacity(nodes.len() + 4);
        let mut state = PrinterState {
            align: Align::Left,
            bold: false,
        };

        for node in nodes {
            match node {
                ResolvedNode::Text { text, style } => {
                    state.set_align(style.align, &mut out);
                    state.set_bold(style.weight == Weight::Bold, &mut out);
                    for line in wrap(text, columns) {
                        out.push(PrintCommand::Text { line });
                    }
                }
                ResolvedNode::TableRow { cells, weight } => {
                    // cells are padded to the full width already
                    state.set_align(Align::Left, &mut out);
                    state.set_bold(*weight == Weight::Bold, &mut out);
                    let fractions: Vec<f64> = cells.iter().map(|c| c.width_fraction).collect();
                    let widths = allocate_columns(&fractions, columns);
                    let fitted = cells
                        .iter()
                        .zip(widths)
                        .map(|(cell, width)| FittedCell {
                            text: fit_cell(&cell.text, width, cell.align),
                            align: cell.align,
                        })
                        .collect();
                    out.push(PrintCommand::TableRow { cells: fitted });
                }
                ResolvedNode::Rule { ch } => {
                    state.set_bold(false, &mut out);
                    out.push(PrintCommand::Rule {
                        ch: *ch,
                        width: columns,
                    });
                }
                ResolvedNode::SectionBreak => out.push(PrintCommand::FeedLines { n: 1 }),
            }
        }

        state.set_align(Align::Left, &mut out);
        state.set_bold(false, &mut out);
        out.push(PrintCommand::FeedLines {
            n: self.feed_lines,
        });
        out.push(PrintCommand::Cut);
        out
    }
}

/// Format with the standard feed
pub fn format(nodes: &[ResolvedNode], columns: usize) -> Vec<PrintCommand> {
    ThermalFormatter::default().format(nodes, columns)
}
