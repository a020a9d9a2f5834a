//! Line parser for Bus Pirate terminal output.
//!
//! Replies are free-form text. [`Response::parse`] strips VT100 escape
//! sequences, splits the text into lines and classifies each one as a
//! [`Line`]. Callers only ever inspect the typed lines.

use crate::mode::BusPirateMode;

/// One byte clocked out by the Bus Pirate, and whether the target acked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxByte {
    pub value: u8,
    pub ack: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `I2C>` with nothing after it: the terminal is waiting for input.
    Prompt(BusPirateMode),
    /// `TX: 0xEE ACK 0xD0 ACK`
    Tx(Vec<TxByte>),
    /// `RX: 0x80 ACK 0x2A ACK 0x80 NACK`
    Rx(Vec<u8>),
    /// A scan result line, e.g. `0x77 (0xEE W) (0xEF R)`.
    ScanHit(u8),
    /// Anything else: echo, banners, status bar noise.
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    text: String,
    lines: Vec<Line>,
}

impl Response {
    pub fn parse(raw: &str) -> Self {
        let text = strip_ansi(raw);
        let lines = text
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_line)
            .collect();
        Self { text, lines }
    }

    /// The reply with escape sequences removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.text.contains(marker)
    }

    /// The mode of the trailing prompt, if the reply ends with one.
    pub fn prompt(&self) -> Option<&BusPirateMode> {
        match self.lines.last() {
            Some(Line::Prompt(mode)) => Some(mode),
            _ => None,
        }
    }

    pub fn tx_bytes(&self) -> impl Iterator<Item = &TxByte> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Tx(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
    }

    /// Every received byte, in the order the lines arrived.
    pub fn rx_bytes(&self) -> Vec<u8> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Rx(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// 7-bit addresses reported by `scan`, first appearance order, no duplicates.
    pub fn scan_addresses(&self) -> Vec<u8> {
        let mut found = Vec::new();
        for line in &self.lines {
            if let Line::ScanHit(address) = line {
                if !found.contains(address) {
                    found.push(*address);
                }
            }
        }
        found
    }
}

fn parse_line(line: &str) -> Line {
    if let Some(rest) = line.strip_prefix("TX:") {
        return Line::Tx(parse_tx(rest));
    }
    if let Some(rest) = line.strip_prefix("RX:") {
        return Line::Rx(tokens(rest).filter_map(parse_hex).collect());
    }
    if let Some((name, rest)) = line.split_once('>') {
        if rest.trim().is_empty() {
            if let Some(mode) = BusPirateMode::from_prompt(name.trim()) {
                return Line::Prompt(mode);
            }
        }
    }
    if let Some(address) = parse_scan_hit(line) {
        return Line::ScanHit(address);
    }
    Line::Text(line.to_string())
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|token| !token.is_empty())
}

fn parse_hex(token: &str) -> Option<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    u8::from_str_radix(digits, 16).ok()
}

fn parse_tx(rest: &str) -> Vec<TxByte> {
    let mut bytes: Vec<TxByte> = Vec::new();
    for token in tokens(rest) {
        if let Some(value) = parse_hex(token) {
            bytes.push(TxByte { value, ack: true });
        } else if token.eq_ignore_ascii_case("NACK") {
            if let Some(last) = bytes.last_mut() {
                last.ack = false;
            }
        }
    }
    bytes
}

/// BP5 prints `0x77 (0xEE W) (0xEF R)`: the 7-bit address first, then the
/// 8-bit write and read forms. A line holding only an 8-bit form maps back
/// through `>> 1`.
fn parse_scan_hit(line: &str) -> Option<u8> {
    let mut parts = tokens(line);
    let first = parse_hex(parts.next()?)?;
    let eight_bit = matches!(parts.next(), Some("W" | "R"));
    if eight_bit || first > 0x7F {
        Some(first >> 1)
    } else {
        Some(first)
    }
}

/// Remove CSI sequences (`ESC [ params final`) and two-byte `ESC x` escapes.
fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if let Some('[') = chars.next() {
            // parameter and intermediate bytes, then one final byte in @..=~
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}
