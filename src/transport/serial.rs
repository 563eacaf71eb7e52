use std::io;
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use crate::core::{Result, SerialConfig, SessionConfig};
use super::{LineStream, StreamTransport};

/// Tile attached over a UART
pub type SerialTransport = StreamTransport<Box<dyn SerialPort>>;

impl LineStream for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }

    fn has_pending(&mut self) -> io::Result<bool> {
        Ok(self.bytes_to_read().map_err(io::Error::from)? > 0)
    }
}

impl StreamTransport<Box<dyn SerialPort>> {
    /// Opens the serial device
    pub fn open(config: &SerialConfig, session: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let port = serialport::new(&config.device, config.baud_rate)
            .timeout(session.line_timeout)
            .open()?;
        info!(device = %config.device, baud = config.baud_rate, "Tile serial connected");
        Ok(StreamTransport::new(port, session.max_line_len))
    }
}
