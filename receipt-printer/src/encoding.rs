//! Codepage encoding and cell widths for thermal printers
//!
//! Receipt text is built as UTF-8 interleaved with ESC/POS control bytes.
//! Before it reaches the wire it is converted to the printer's codepage:
//! - ASCII bytes (0x00-0x7F) pass through untouched, which keeps ESC/POS
//!   commands intact
//! - Everything else is decoded as UTF-8 and re-encoded
//!
//! Chinese firmware runs in GBK double-byte mode; Western firmware runs in
//! PC858 (CP850 plus the Euro sign). GBK has no pound or euro glyph, so those
//! two are printed by hopping to PC858 for a single byte.

use tracing::instrument;

/// FS & - enter Chinese (double-byte) mode
const FS_CHINESE_ON: [u8; 2] = [0x1C, 0x26];
/// FS . - leave Chinese mode
const FS_CHINESE_OFF: [u8; 2] = [0x1C, 0x2E];
/// FS C 1 - select GBK
const FS_SELECT_GBK: [u8; 3] = [0x1C, 0x43, 0x01];
/// ESC t 19 - select PC858 character table
const ESC_TABLE_PC858: [u8; 3] = [0x1B, 0x74, 19];
/// ESC @ - initialize (resets codepage state)
const ESC_INIT: [u8; 2] = [0x1B, 0x40];

/// Printer character table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codepage {
    /// GBK double-byte mode, currency symbols escaped through PC858
    #[default]
    Gbk,
    /// PC858 single-byte table; characters outside it print as `?`
    Pc858,
}

/// Number of printer cells a character occupies.
///
/// East-Asian wide characters take two cells on every thermal head we ship
/// to; everything else takes one. Control characters take none.
pub fn char_cells(c: char) -> usize {
    let cp = c as u32;
    if c.is_control() {
        return 0;
    }
    let wide = matches!(cp,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD);
    if wide { 2 } else { 1 }
}

/// Number of printer cells a string occupies
pub fn text_cells(s: &str) -> usize {
    s.chars().map(char_cells).sum()
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to the given codepage
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn encode(bytes: &[u8], codepage: Codepage) -> Vec<u8> {
    match codepage {
        Codepage::Gbk => encode_gbk(bytes),
        Codepage::Pc858 => encode_pc858(bytes),
    }
}

fn encode_gbk(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    out.extend_from_slice(&FS_CHINESE_ON);
    out.extend_from_slice(&FS_SELECT_GBK);

    walk(bytes, |chunk| match chunk {
        Chunk::Init => {
            out.extend_from_slice(&ESC_INIT);
            // INIT drops Chinese mode, turn it back on
            out.extend_from_slice(&FS_CHINESE_ON);
        }
        Chunk::Ascii(b) => out.push(b),
        Chunk::Text(text) => {
            let mut run = String::new();
            for c in text.chars() {
                match currency_byte(c) {
                    Some(byte) => {
                        flush_gbk(&mut run, &mut out);
                        out.extend_from_slice(&FS_CHINESE_OFF);
                        out.extend_from_slice(&ESC_TABLE_PC858);
                        out.push(byte);
                        out.extend_from_slice(&FS_CHINESE_ON);
                    }
                    None => run.push(c),
                }
            }
            flush_gbk(&mut run, &mut out);
        }
    });

    out.extend_from_slice(&FS_CHINESE_OFF);
    out
}

fn flush_gbk(run: &mut String, out: &mut Vec<u8>) {
    if run.is_empty() {
        return;
    }
    let (gbk, _, _) = encoding_rs::GBK.encode(run);
    out.extend_from_slice(&gbk);
    run.clear();
}

fn encode_pc858(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + ESC_TABLE_PC858.len());
    out.extend_from_slice(&ESC_TABLE_PC858);

    walk(bytes, |chunk| match chunk {
        Chunk::Init => {
            out.extend_from_slice(&ESC_INIT);
            out.extend_from_slice(&ESC_TABLE_PC858);
        }
        Chunk::Ascii(b) => out.push(b),
        Chunk::Text(text) => out.extend(text.chars().map(|c| pc858_byte(c).unwrap_or(b'?'))),
    });

    out
}

enum Chunk<'a> {
    Init,
    Ascii(u8),
    Text(&'a str),
}

/// Split a buffer into INIT commands, single ASCII bytes and runs of
/// non-ASCII UTF-8 text.
fn walk<'a>(bytes: &'a [u8], mut f: impl FnMut(Chunk<'a>)) {
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == ESC_INIT[0] && bytes.get(i + 1) == Some(&ESC_INIT[1]) {
            f(Chunk::Init);
            i += 2;
        } else if b.is_ascii() {
            f(Chunk::Ascii(b));
            i += 1;
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii() {
                i += 1;
            }
            match std::str::from_utf8(&bytes[start..i]) {
                Ok(text) => f(Chunk::Text(text)),
                // Broken UTF-8 never comes from our builders; print a marker
                Err(_) => f(Chunk::Ascii(b'?')),
            }
        }
    }
}

/// Currency symbols missing from GBK, with their PC858 byte
fn currency_byte(c: char) -> Option<u8> {
    match c {
        '€' => Some(0xD5),
        '£' => Some(0x9C),
        _ => None,
    }
}

/// PC858 byte for the Latin characters receipts actually use
fn pc858_byte(c: char) -> Option<u8> {
    let byte = match c {
        'Ç' => 0x80,
        'ü' => 0x81,
        'é' => 0x82,
        'â' => 0x83,
        'ä' => 0x84,
        'à' => 0x85,
        'å' => 0x86,
        'ç' => 0x87,
        'ê' => 0x88,
        'ë' => 0x89,
        'è' => 0x8A,
        'ï' => 0x8B,
        'î' => 0x8C,
        'ì' => 0x8D,
        'Ä' => 0x8E,
        'Å' => 0x8F,
        'É' => 0x90,
        'æ' => 0x91,
        'Æ' => 0x92,
        'ô' => 0x93,
        'ö' => 0x94,
        'ò' => 0x95,
        'û' => 0x96,
        'ù' => 0x97,
        'ÿ' => 0x98,
        'Ö' => 0x99,
        'Ü' => 0x9A,
        'ø' => 0x9B,
        '£' => 0x9C,
        'Ø' => 0x9D,
        '×' => 0x9E,
        'á' => 0xA0,
        'í' => 0xA1,
        'ó' => 0xA2,
        'ú' => 0xA3,
        'ñ' => 0xA4,
        'Ñ' => 0xA5,
        '¿' => 0xA8,
        '½' => 0xAB,
        '¼' => 0xAC,
        '¡' => 0xAD,
        'Á' => 0xB5,
        'Â' => 0xB6,
        'À' => 0xB7,
        '¥' => 0xBE,
        'ã' => 0xC6,
        'Ã' => 0xC7,
        'Ê' => 0xD2,
        'Ë' => 0xD3,
        'È' => 0xD4,
        '€' => 0xD5,
        'Í' => 0xD6,
        'Î' => 0xD7,
        'Ï' => 0xD8,
        'Ì' => 0xDE,
        'Ó' => 0xE0,
        'ß' => 0xE1,
        'Ô' => 0xE2,
        'Ò' => 0xE3,
        'õ' => 0xE4,
        'Õ' => 0xE5,
        'Ú' => 0xE9,
        'Û' => 0xEA,
        'Ù' => 0xEB,
        '°' => 0xF8,
        _ => return None,
    };
    Some(byte)
}
