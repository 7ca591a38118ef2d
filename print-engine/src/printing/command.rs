//! Abstract print commands
//!
//! Output of the thermal formatter and input of every device driver. No
//! wire encoding lives here.

use receipt_printer::char_cells;
use serde::{Deserialize, Serialize};

use crate::template::Align;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PrintCommand {
    Text { line: String },
    /// Divider spanning `width` cells
    Rule { ch: char, width: usize },
    /// Cells already padded to their column widths
    TableRow { cells: Vec<FittedCell> },
    SetBold { on: bool },
    SetAlign { align: Align },
    FeedLines { n: u8 },
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedCell {
    pub text: String,
    pub align: Align,
}

impl PrintCommand {
    /// The printable line of a rule; wide divider chars repeat half as often
    pub fn rule_line(ch: char, width: usize) -> String {
        let cells = char_cells(ch).max(1);
        std::iter::repeat_n(ch, width / cells).collect()
    }

    /// The printable line of a table row
    pub fn row_line(cells: &[FittedCell]) -> String {
        cells.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Plain-text rendering of a command stream, for operator preview
///
/// Alignment is applied by padding; feeds become blank lines; the cut is a
/// dashed line.
pub fn preview_lines(commands: &[PrintCommand], columns: usize) -> Vec<String> {
    use crate::thermal::text::fit_cell;

    let mut align = Align::Left;
    let mut lines = Vec::new();
    for command in commands {
        match command {
            PrintCommand::Text { line } => {
                let padded = fit_cell(line, columns, align);
                lines.push(padded.trim_end().to_string());
            }
            PrintCommand::Rule { ch, width } => lines.push(PrintCommand::rule_line(*ch, *width)),
            PrintCommand::TableRow { cells } => {
                lines.push(PrintCommand::row_line(cells).trim_end().to_string())
            }
            PrintCommand::SetAlign { align: next } => align = *next,
            PrintCommand::SetBold { .. } => {}
            PrintCommand::FeedLines { n } => {
                lines.extend(std::iter::repeat_n(String::new(), *n as usize))
            }
            PrintCommand::Cut => lines.push(PrintCommand::rule_line('-', columns)),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(PrintCommand::SetAlign {
            align: Align::Center,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "op": "setAlign", "align": "center" }));

        let json = serde_json::to_value(PrintCommand::Cut).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "cut" }));
    }

    #[test]
    fn test_rule_line_wide_char() {
        assert_eq!(PrintCommand::rule_line('=', 5), "=====");
        assert_eq!(PrintCommand::rule_line('═', 4), "════");
        assert_eq!(PrintCommand::rule_line('一', 5), "一一");
    }

    #[test]
    fn test_preview_applies_alignment() {
        let commands = vec![
            PrintCommand::SetAlign {
                align: Align::Center,
            },
            PrintCommand::Text {
                line: "SHOP".into(),
            },
            PrintCommand::SetAlign { align: Align::Left },
            PrintCommand::TableRow {
                cells: vec![
                    FittedCell {
                        text: "Tea  ".into(),
                        align: Align::Left,
                    },
                    FittedCell {
                        text: "£3.00".into(),
                        align: Align::Right,
                    },
                ],
            },
            PrintCommand::FeedLines { n: 1 },
            PrintCommand::Cut,
        ];
        assert_eq!(
            preview_lines(&commands, 10),
            vec!["   SHOP", "Tea  £3.00", "", "----------"]
        );
    }
}
