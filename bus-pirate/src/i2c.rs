//! `embedded-hal` 1.0 I2C on top of the terminal command set.

use embedded_hal::i2c::{ErrorType, I2c, Operation};

use crate::bus_pirate::BusPirate;
use crate::command::Segment;
use crate::error::Error;
use crate::transport::Transport;

impl<T: Transport> ErrorType for BusPirate<T> {
    type Error = Error;
}

impl<T: Transport> I2c for BusPirate<T> {
    /// The whole slice of operations goes out as one bracketed command. A
    /// repeated start separates a write from a following read and vice versa;
    /// adjacent operations of the same kind run on without one.
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let received = {
            let segments: Vec<Segment<'_>> = operations
                .iter()
                .filter_map(|operation| match operation {
                    Operation::Write(bytes) => Some(Segment::Write(bytes)),
                    Operation::Read(buf) if buf.is_empty() => None,
                    Operation::Read(buf) => Some(Segment::Read(buf.len())),
                })
                .collect();
            self.transfer(address, &segments)?
        };

        let mut rest = received.as_slice();
        for operation in operations.iter_mut() {
            if let Operation::Read(buf) = operation {
                let (head, tail) = rest.split_at(buf.len());
                buf.copy_from_slice(head);
                rest = tail;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource, Operation};

    use crate::mock::ScriptedPort;
    use crate::{BusPirate, BusPirateConfig};

    fn pirate(script: impl FnOnce(ScriptedPort) -> ScriptedPort) -> BusPirate<ScriptedPort> {
        let config = BusPirateConfig {
            timeout_seconds: 0.2,
            ..BusPirateConfig::default()
        };
        let port = script(ScriptedPort::new().expect("", "\r\nI2C> "));
        let mut bp = BusPirate::with_transport(port, config);
        bp.detect_mode().unwrap();
        bp
    }

    #[test]
    fn write_read_fills_buffer() {
        let mut bp = pirate(|port| {
            port.expect(
                "[0xEE 0xFA [0xEF r:3]",
                "\r\nTX: 0xEE ACK 0xFA ACK \r\nTX: 0xEF ACK \r\nRX: 0x80 ACK 0x2A ACK 0x80 NACK\r\nI2C> ",
            )
        });
        let mut raw = [0u8; 3];
        bp.write_read(0x77, &[0xFA], &mut raw).unwrap();
        assert_eq!(raw, [0x80, 0x2A, 0x80]);
    }

    #[test]
    fn nack_maps_to_error_kind() {
        let mut bp =
            pirate(|port| port.expect("[0xEE 0xE0 0xB6]", "\r\nTX: 0xEE NACK \r\nI2C> "));
        let err = bp.write(0x77, &[0xE0, 0xB6]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
    }

    #[test]
    fn adjacent_writes_share_one_start() {
        let mut bp = pirate(|port| {
            port.expect(
                "[0xEE 0xF4 0x55]",
                "\r\nTX: 0xEE ACK 0xF4 ACK 0x55 ACK \r\nI2C> ",
            )
        });
        bp.transaction(0x77, &mut [Operation::Write(&[0xF4]), Operation::Write(&[0x55])])
            .unwrap();
        assert!(bp.transport().is_exhausted());
    }

    #[test]
    fn adjacent_reads_split_one_burst() {
        let mut bp = pirate(|port| {
            port.expect(
                "[0xEE 0xF7 [0xEF r:5]",
                "\r\nTX: 0xEE ACK 0xF7 ACK \r\nTX: 0xEF ACK \r\n\
                 RX: 0x01 ACK 0x02 ACK 0x03 ACK 0x04 ACK 0x05 NACK\r\nI2C> ",
            )
        });
        let mut first = [0u8; 3];
        let mut second = [0u8; 2];
        bp.transaction(
            0x77,
            &mut [
                Operation::Write(&[0xF7]),
                Operation::Read(&mut first),
                Operation::Read(&mut second),
            ],
        )
        .unwrap();
        assert_eq!(first, [0x01, 0x02, 0x03]);
        assert_eq!(second, [0x04, 0x05]);
    }
}
