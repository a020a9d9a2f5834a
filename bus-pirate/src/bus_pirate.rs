use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use serialport::{FlowControl, SerialPort, SerialPortInfo};

use crate::command::{self, Segment};
use crate::config::BusPirateConfig;
use crate::error::{Error, NackStage, ProtocolError, Result};
use crate::mode::BusPirateMode;
use crate::response::{Line, Response};
use crate::transport::Transport;

/// USB ids of the Bus Pirate 5 CDC interface.
pub const BUS_PIRATE_VID: u16 = 0x1209;
pub const BUS_PIRATE_PID: u16 = 0x7331;

/// Per-read timeout on the serial port; the reply timeout is enforced on top.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
/// Once a dialog question shows up, keep reading until the line is idle this long.
const QUIET_PERIOD: Duration = Duration::from_millis(50);
const SETTLE_TIME: Duration = Duration::from_millis(500);

pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports().map_err(|e| Error::Io(e.into()))
}

pub struct BusPirate<T = Box<dyn SerialPort>> {
    port: T,
    config: BusPirateConfig,
    mode: Option<BusPirateMode>,
}

impl BusPirate {
    /// Open the configured serial device, assert DTR and flush whatever the
    /// terminal printed before we attached.
    pub fn connect(config: BusPirateConfig) -> Result<Self> {
        let connection_error = |source| Error::Connection {
            path: config.port.clone(),
            source,
        };
        let mut port = serialport::new(&config.port, config.baud)
            .timeout(POLL_TIMEOUT)
            .flow_control(FlowControl::None)
            .open()
            .map_err(connection_error)?;
        // CDC firmware holds output until the host reports ready
        port.write_data_terminal_ready(true)
            .map_err(connection_error)?;
        thread::sleep(SETTLE_TIME);
        port.discard_input()?;
        info!("Serial connection established on {}", config.port);
        Ok(Self::with_transport(port, config))
    }
}

impl<T: Transport> BusPirate<T> {
    pub fn with_transport(port: T, config: BusPirateConfig) -> Self {
        Self {
            port,
            config,
            mode: None,
        }
    }

    pub fn config(&self) -> &BusPirateConfig {
        &self.config
    }

    /// Mode seen on the most recent prompt, if any prompt has been seen yet.
    pub fn mode(&self) -> Option<&BusPirateMode> {
        self.mode.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.port
    }

    /// Ask the terminal for its prompt and classify it.
    pub fn detect_mode(&mut self) -> Result<BusPirateMode> {
        let mut response = self.exchange(command::MODE_QUERY, &[command::VT100_QUESTION])?;
        if response.prompt().is_none() && response.contains(command::VT100_QUESTION) {
            debug!("VT100 prompt detected, disabling color mode");
            response = self.exchange("n", &[])?;
        }
        match response.prompt() {
            Some(mode) => {
                debug!("Bus Pirate is in {} mode", mode);
                Ok(mode.clone())
            }
            None => Err(self.timeout(command::MODE_QUERY)),
        }
    }

    /// Walk the mode menu into I2C, answering each configuration question.
    /// Does nothing if the terminal already shows `I2C>`.
    pub fn enter_i2c_mode(&mut self) -> Result<()> {
        let current = match self.mode.clone() {
            Some(mode) => mode,
            None => self.detect_mode()?,
        };
        if current == BusPirateMode::I2c {
            info!("Bus Pirate is already in I2C mode");
            return Ok(());
        }
        info!("Bus Pirate is in {} mode, switching to I2C", current);

        let menu = self.exchange(command::MODE_MENU, &[command::MODE_MENU_TITLE])?;
        if !menu.contains(command::MODE_MENU_TITLE) {
            return Err(unexpected(command::MODE_MENU, command::MODE_MENU_TITLE));
        }

        let questions = [
            command::PREVIOUS_SETTINGS_QUESTION,
            command::I2C_SPEED_QUESTION,
            command::CLOCK_STRETCHING_QUESTION,
        ];
        let speed = self.config.i2c_speed_khz.to_string();
        let stretching = if self.config.clock_stretching { "2" } else { "1" };

        let mut response = self.exchange(command::MODE_MENU_I2C, &questions)?;
        for _ in 0..questions.len() {
            if response.prompt().is_some() {
                break;
            }
            let answer = if response.contains(command::PREVIOUS_SETTINGS_QUESTION) {
                "n"
            } else if response.contains(command::I2C_SPEED_QUESTION) {
                speed.as_str()
            } else if response.contains(command::CLOCK_STRETCHING_QUESTION) {
                stretching
            } else {
                break;
            };
            trace!("answering mode menu with {:?}", answer);
            response = self.exchange(answer, &questions)?;
        }

        match self.detect_mode()? {
            BusPirateMode::I2c => {
                info!("Bus Pirate is now in I2C mode");
                Ok(())
            }
            other => Err(ProtocolError::ModeSwitchFailed(other).into()),
        }
    }

    /// Turn on the programmable supply with the configured voltage and limit.
    pub fn enable_power_supply(&mut self) -> Result<()> {
        let questions = [command::VOLTS_QUESTION, command::CURRENT_QUESTION];
        let volts = format!("{:.2}", self.config.supply_volts);
        let current = self
            .config
            .current_limit_ma
            .map(|ma| format!("{ma}"))
            .unwrap_or_default();

        let mut response = self.exchange(command::POWER_SUPPLY_ON, &questions)?;
        for _ in 0..questions.len() {
            if response.prompt().is_some() {
                break;
            }
            let answer = if response.contains(command::VOLTS_QUESTION) {
                volts.as_str()
            } else if response.contains(command::CURRENT_QUESTION) {
                current.as_str()
            } else {
                break;
            };
            response = self.exchange(answer, &questions)?;
        }

        if response.contains(command::POWER_ENABLED) {
            info!("Power supply enabled at {}V", volts);
            Ok(())
        } else {
            warn!("Power supply reply: {:?}", response.text());
            Err(ProtocolError::PowerNotEnabled.into())
        }
    }

    /// 7-bit addresses that answered the `scan` command.
    pub fn scan_bus(&mut self) -> Result<Vec<u8>> {
        self.require_i2c()?;
        let response = self.exchange(command::SCAN, &[])?;
        let found = response.scan_addresses();
        debug!("scan found {:02X?}", found);
        Ok(found)
    }

    pub fn write_register(&mut self, device_addr: u8, register_addr: u8, value: u8) -> Result<()> {
        self.transfer(device_addr, &[Segment::Write(&[register_addr, value])])
            .map(|_| ())
    }

    pub fn read_registers(
        &mut self,
        device_addr: u8,
        register_addr: u8,
        count: usize,
    ) -> Result<Vec<u8>> {
        self.transfer(
            device_addr,
            &[Segment::Write(&[register_addr]), Segment::Read(count)],
        )
    }

    /// Run one bracketed I2C transaction and return the bytes read.
    pub(crate) fn transfer(&mut self, address: u8, segments: &[Segment<'_>]) -> Result<Vec<u8>> {
        self.require_i2c()?;
        let command = command::transaction(address, segments);
        if command.is_empty() {
            return Ok(Vec::new());
        }
        let response = self.exchange(&command, &[])?;

        let address_bytes = [address << 1, (address << 1) | 1];
        for line in response.lines() {
            let Line::Tx(bytes) = line else {
                continue;
            };
            if let Some((index, byte)) = bytes.iter().enumerate().find(|(_, byte)| !byte.ack) {
                // every TX line after a (re)start leads with the address byte
                let stage = if index == 0 && address_bytes.contains(&byte.value) {
                    NackStage::Address
                } else {
                    NackStage::Data
                };
                return Err(ProtocolError::Nack {
                    address,
                    byte: byte.value,
                    stage,
                }
                .into());
            }
        }

        let expected: usize = segments.iter().map(Segment::read_len).sum();
        let mut received = response.rx_bytes();
        if received.len() < expected {
            return Err(ProtocolError::ShortRead {
                address,
                expected,
                received: received.len(),
            }
            .into());
        }
        received.truncate(expected);
        Ok(received)
    }

    /// Send `command`, then collect the reply until it ends in a prompt or
    /// contains one of `markers`.
    pub fn exchange(&mut self, command: &str, markers: &[&str]) -> Result<Response> {
        self.port.discard_input()?;
        trace!("-> {:?}", command);
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;

        let deadline = Instant::now() + self.config.timeout();
        let mut raw: Vec<u8> = Vec::new();
        let mut buf = [0u8; 512];
        // set once a dialog marker appears; the reply is done when input goes quiet
        let mut quiet_since: Option<Instant> = None;

        loop {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    // decode the whole buffer so characters split across reads survive
                    raw.extend_from_slice(&buf[..n]);
                    let response = Response::parse(&String::from_utf8_lossy(&raw));
                    if let Some(mode) = response.prompt() {
                        trace!("<- {:?}", response.text());
                        self.mode = Some(mode.clone());
                        return Ok(response);
                    }
                    if markers.iter().any(|marker| response.contains(marker)) {
                        quiet_since = Some(Instant::now());
                    }
                }
                Ok(_) => {}
                Err(e) if is_idle(&e) => {}
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if let Some(since) = quiet_since {
                if now.duration_since(since) >= QUIET_PERIOD || now >= deadline {
                    let response = Response::parse(&String::from_utf8_lossy(&raw));
                    trace!("<- {:?}", response.text());
                    return Ok(response);
                }
            }
            if now >= deadline {
                if !raw.is_empty() {
                    debug!(
                        "unrecognized reply to {:?}: {:?}",
                        command,
                        String::from_utf8_lossy(&raw)
                    );
                }
                return Err(self.timeout(command));
            }
        }
    }

    fn require_i2c(&self) -> Result<()> {
        match self.mode {
            Some(BusPirateMode::I2c) => Ok(()),
            _ => Err(Error::NotInI2cMode),
        }
    }

    fn timeout(&self, command: &str) -> Error {
        Error::Timeout {
            command: command.to_string(),
            timeout: self.config.timeout(),
        }
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn unexpected(command: &str, expected: &str) -> Error {
    ProtocolError::UnexpectedResponse {
        command: command.to_string(),
        expected: expected.to_string(),
    }
    .into()
}
