//! Command strings understood by the Bus Pirate 5 terminal.

use std::fmt::Write;

/// A bare newline makes the terminal reprint its prompt.
pub(crate) const MODE_QUERY: &str = "";
pub(crate) const MODE_MENU: &str = "m";
pub(crate) const MODE_MENU_I2C: &str = "5";
pub(crate) const POWER_SUPPLY_ON: &str = "W";
pub(crate) const SCAN: &str = "scan";

pub(crate) const VT100_QUESTION: &str = "VT100 compatible color mode?";
pub(crate) const MODE_MENU_TITLE: &str = "Mode selection";
pub(crate) const PREVIOUS_SETTINGS_QUESTION: &str = "Use previous settings?";
pub(crate) const I2C_SPEED_QUESTION: &str = "I2C speed";
pub(crate) const CLOCK_STRETCHING_QUESTION: &str = "Clock stretching";
pub(crate) const VOLTS_QUESTION: &str = "Volts";
pub(crate) const CURRENT_QUESTION: &str = "Maximum current";
pub(crate) const POWER_ENABLED: &str = "Power supply:Enabled";

/// One leg of an I2C transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Write(&'a [u8]),
    Read(usize),
}

impl Segment<'_> {
    pub(crate) fn read_len(&self) -> usize {
        match self {
            Segment::Read(len) => *len,
            Segment::Write(_) => 0,
        }
    }
}

/// Render a transaction on the 7-bit `address`.
///
/// A change between writing and reading opens with `[` (start, or repeated
/// start after the first) followed by the 8-bit address byte; runs of the
/// same kind are merged so no restart falls between them. The whole
/// transaction ends with `]`.
/// `[Write(&[0xD0]), Read(1)]` on 0x77 renders as `[0xEE 0xD0 [0xEF r:1]`.
pub(crate) fn transaction(address: u8, segments: &[Segment<'_>]) -> String {
    let mut command = String::new();
    let mut previous: Option<&Segment<'_>> = None;
    let mut pending_read = 0usize;
    for segment in segments {
        let same_kind = matches!(
            (previous, segment),
            (Some(Segment::Write(_)), Segment::Write(_)) | (Some(Segment::Read(_)), Segment::Read(_))
        );
        match segment {
            Segment::Write(bytes) => {
                flush_read(&mut command, &mut pending_read);
                if !same_kind {
                    open(&mut command, address << 1);
                }
                for byte in bytes.iter() {
                    let _ = write!(command, " 0x{byte:02X}");
                }
            }
            Segment::Read(len) => {
                if !same_kind {
                    open(&mut command, (address << 1) | 1);
                }
                pending_read += len;
            }
        }
        previous = Some(segment);
    }
    flush_read(&mut command, &mut pending_read);
    if !command.is_empty() {
        command.push(']');
    }
    command
}

fn open(command: &mut String, address_byte: u8) {
    if !command.is_empty() {
        command.push(' ');
    }
    let _ = write!(command, "[0x{address_byte:02X}");
}

fn flush_read(command: &mut String, pending: &mut usize) {
    if *pending > 0 {
        let _ = write!(command, " r:{pending}");
        *pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_read_uses_repeated_start() {
        let command = transaction(0x77, &[Segment::Write(&[0xD0]), Segment::Read(1)]);
        assert_eq!(command, "[0xEE 0xD0 [0xEF r:1]");
    }

    #[test]
    fn register_write() {
        let command = transaction(0x77, &[Segment::Write(&[0xF4, 0x55])]);
        assert_eq!(command, "[0xEE 0xF4 0x55]");
    }

    #[test]
    fn read_only_transaction() {
        assert_eq!(transaction(0x76, &[Segment::Read(8)]), "[0xED r:8]");
        assert_eq!(transaction(0x76, &[]), "");
    }

    #[test]
    fn same_kind_segments_are_merged() {
        let writes = transaction(0x77, &[Segment::Write(&[0xF4]), Segment::Write(&[0x55])]);
        assert_eq!(writes, "[0xEE 0xF4 0x55]");

        let reads = transaction(
            0x77,
            &[Segment::Write(&[0xF7]), Segment::Read(3), Segment::Read(5)],
        );
        assert_eq!(reads, "[0xEE 0xF7 [0xEF r:8]");

        let mixed = transaction(
            0x77,
            &[Segment::Read(1), Segment::Write(&[0xF3]), Segment::Read(1)],
        );
        assert_eq!(mixed, "[0xEF r:1 [0xEE 0xF3 [0xEF r:1]");
    }
}
