//! ESC/POS command builder
//!
//! Fluent API over a byte buffer. Text goes in as UTF-8 and is converted to
//! the printer codepage in [`EscPosBuilder::build`].

use crate::encoding::{Codepage, encode};

/// Horizontal justification (ESC a n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

impl Justify {
    fn code(self) -> u8 {
        match self {
            Justify::Left => 0x00,
            Justify::Center => 0x01,
            Justify::Right => 0x02,
        }
    }
}

/// ESC/POS command builder
pub struct EscPosBuilder {
    buf: Vec<u8>,
    codepage: Codepage,
}

impl EscPosBuilder {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(4096);
        // ESC @ - initialize printer
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self {
            buf,
            codepage: Codepage::default(),
        }
    }

    /// Select the codepage used by [`build`](Self::build)
    pub fn with_codepage(mut self, codepage: Codepage) -> Self {
        self.codepage = codepage;
        self
    }

    // === Text ===

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(b'\n');
        self
    }

    /// ESC d n - print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Style ===

    pub fn align(&mut self, justify: Justify) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, justify.code()]);
        self
    }

    /// ESC E n - emphasized mode
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, u8::from(on)]);
        self
    }

    // === Paper ===

    /// GS V 0 - full cut
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    /// Encode into the selected codepage
    pub fn build(self) -> Vec<u8> {
        encode(&self.buf, self.codepage)
    }

    /// Raw UTF-8 buffer without codepage conversion (debugging, tests)
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_style_bytes() {
        let mut b = EscPosBuilder::new();
        b.align(Justify::Center).bold(true).line("HELLO").bold(false);

        let data = b.build_raw();
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert_eq!(&data[2..5], &[0x1B, 0x61, 0x01]);
        assert_eq!(&data[5..8], &[0x1B, 0x45, 0x01]);
        assert_eq!(&data[8..14], b"HELLO\n");
        assert_eq!(&data[14..], &[0x1B, 0x45, 0x00]);
    }

    #[test]
    fn test_feed_then_cut() {
        let mut b = EscPosBuilder::new();
        b.feed(3).cut();
        assert!(b.build_raw().ends_with(&[0x1B, 0x64, 3, 0x1D, 0x56, 0x00]));
    }
}
