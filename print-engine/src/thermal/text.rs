//! Fixed-width text helpers
//!
//! Widths are printer cells: wide (CJK) characters take two, everything
//! else one. A character is never split.

use receipt_printer::{char_cells, text_cells};

use crate::template::Align;

const ELLIPSIS: &str = "...";

/// Integer column counts for a row of width fractions
///
/// Each cell gets `floor(fraction * columns)`; the remainder is handed out
/// one column at a time starting from the last cell, so the result always
/// sums to `columns`.
pub fn allocate_columns(fractions: &[f64], columns: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = fractions
        .iter()
        .map(|f| {
            let f = if f.is_finite() { f.max(0.0) } else { 0.0 };
            (f * columns as f64 + 1e-9).floor() as usize
        })
        .collect();
    if widths.is_empty() {
        return widths;
    }

    let mut total: usize = widths.iter().sum();
    let mut cursor = widths.len();
    while total < columns {
        cursor = if cursor == 0 { widths.len() - 1 } else { cursor - 1 };
        widths[cursor] += 1;
        total += 1;
    }
    // Only reachable for fractions above 1.0, which validation rejects
    while total > columns {
        match widths.iter().rposition(|w| *w > 0) {
            Some(i) => {
                widths[i] -= 1;
                total -= 1;
            }
            None => break,
        }
    }
    widths
}

/// Longest prefix of `s` that fits in `max` cells, with its cell count
pub fn take_cells(s: &str, max: usize) -> (&str, usize) {
    let mut used = 0;
    for (index, c) in s.char_indices() {
        let w = char_cells(c);
        if used + w > max {
            return (&s[..index], used);
        }
        used += w;
    }
    (s, used)
}

/// Replace control characters with spaces
///
/// Order data reaches the printer verbatim; a stray ESC or GS would be
/// executed as a command.
pub fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Pad or truncate `text` to exactly `width` cells
///
/// Truncation keeps as much text as fits before a trailing `...` when the
/// cell is at least four wide.
pub fn fit_cell(text: &str, width: usize, align: Align) -> String {
    let text = printable(text);
    let cells = text_cells(&text);

    if cells > width {
        let mut out = String::with_capacity(width);
        let used = if width > ELLIPSIS.len() {
            let (head, used) = take_cells(&text, width - ELLIPSIS.len());
            out.push_str(head);
            out.push_str(ELLIPSIS);
            used + ELLIPSIS.len()
        } else {
            let (head, used) = take_cells(&text, width);
            out.push_str(head);
            used
        };
        out.push_str(&" ".repeat(width - used));
        return out;
    }

    let slack = width - cells;
    let (left, right) = match align {
        Align::Left => (0, slack),
        Align::Right => (slack, 0),
        Align::Center => (slack / 2, slack - slack / 2),
    };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Word wrap at whitespace; tokens wider than a line are hard broken
///
/// Embedded newlines start new lines and leading indentation of each
/// paragraph survives on its first line. Nothing is dropped, though other
/// control characters print as spaces.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = printable(paragraph.trim_end_matches('\r'));
        let trimmed = paragraph.trim_start();
        let indent: String = paragraph[..paragraph.len() - trimmed.len()]
            .chars()
            .map(|_| ' ')
            .collect();

        let mut line = String::new();
        let mut line_cells = 0;
        if indent.len() < width {
            line.push_str(&indent);
            line_cells = indent.len();
        }
        let mut has_word = false;

        for word in trimmed.split_whitespace() {
            let word_cells = text_cells(word);
            if has_word {
                if line_cells + 1 + word_cells <= width {
                    line.push(' ');
                    line.push_str(word);
                    line_cells += 1 + word_cells;
                    continue;
                }
                lines.push(std::mem::take(&mut line));
                line_cells = 0;
            }

            if line_cells + word_cells <= width {
                line.push_str(word);
                line_cells += word_cells;
                has_word = true;
                continue;
            }

            let mut rest = word;
            while !rest.is_empty() {
                let (head, used) = take_cells(rest, width - line_cells);
                if head.is_empty() {
                    if line_cells == 0 {
                        // a single character wider than the paper
                        let len = rest.chars().next().map_or(rest.len(), char::len_utf8);
                        lines.push(rest[..len].to_string());
                        rest = &rest[len..];
                    } else {
                        lines.push(std::mem::take(&mut line));
                        line_cells = 0;
                    }
                    continue;
                }
                line.push_str(head);
                line_cells += used;
                rest = &rest[head.len()..];
                if !rest.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_cells = 0;
                }
            }
            has_word = line_cells > 0;
        }

        if has_word {
            lines.push(line);
        } else {
            lines.push(String::new());
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_last_cell_remainder() {
        assert_eq!(allocate_columns(&[0.6, 0.1, 0.3], 32), vec![19, 3, 10]);
        assert_eq!(allocate_columns(&[0.5, 0.5], 42), vec![21, 21]);
        // unallocated share spread from the last cell backwards
        assert_eq!(allocate_columns(&[0.5, 0.3], 32), vec![19, 13]);
        assert_eq!(allocate_columns(&[1.0 / 3.0; 3], 32), vec![10, 11, 11]);
    }

    #[test]
    fn test_allocate_always_sums_to_columns() {
        let rows: [&[f64]; 5] = [
            &[0.6, 0.1, 0.3],
            &[0.25, 0.25, 0.25, 0.25],
            &[0.7, 0.3],
            &[0.15, 0.55, 0.1, 0.2],
            &[0.0, 1.0],
        ];
        for columns in [1, 32, 42, 48, 95] {
            for fractions in rows {
                let widths = allocate_columns(fractions, columns);
                assert_eq!(widths.iter().sum::<usize>(), columns, "{:?} @ {}", fractions, columns);
            }
        }
    }

    #[test]
    fn test_fit_cell_pads_and_truncates() {
        assert_eq!(fit_cell("Tea", 6, Align::Left), "Tea   ");
        assert_eq!(fit_cell("Tea", 6, Align::Right), "   Tea");
        assert_eq!(fit_cell("Tea", 6, Align::Center), " Tea  ");
        assert_eq!(fit_cell("Chocolate cake", 10, Align::Left), "Chocola...");
        assert_eq!(fit_cell("£12.50", 3, Align::Right), "£12");
    }

    #[test]
    fn test_fit_cell_wide_characters() {
        let fitted = fit_cell("宫保鸡丁饭", 7, Align::Left);
        assert_eq!(fitted, "宫保...");
        assert_eq!(text_cells(&fitted), 7);

        let fitted = fit_cell("宫保鸡丁", 9, Align::Left);
        assert_eq!(fitted, "宫保鸡丁 ");
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(
            wrap("Thank you for dining with us today", 16),
            vec!["Thank you for", "dining with us", "today"]
        );
        assert_eq!(wrap("", 16), vec![""]);
        assert_eq!(wrap("a\n\nb", 16), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_hard_breaks_long_tokens() {
        let lines = wrap("see https://example.com/receipt/123456", 12);
        assert_eq!(lines, vec!["see", "https://exam", "ple.com/rece", "ipt/123456"]);
        let joined: String = lines.concat();
        assert_eq!(joined.replace(' ', ""), "seehttps://example.com/receipt/123456");
    }

    #[test]
    fn test_control_characters_print_as_spaces() {
        assert_eq!(wrap("Ann\x1dV\x00Smith\x1b@", 32), vec!["Ann V Smith @"]);
        assert_eq!(wrap("\tTable 4", 32), vec![" Table 4"]);
        assert_eq!(fit_cell("a\x1bb", 5, Align::Left), "a b  ");
    }

    #[test]
    fn test_wrap_keeps_indent_and_width() {
        let lines = wrap("   - extra shot of espresso please", 14);
        assert_eq!(lines[0], "   - extra");
        for line in &lines {
            assert!(text_cells(line) <= 14);
        }
    }
}
