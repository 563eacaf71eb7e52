use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Request/response policy for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long one blocking line read may wait
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub line_timeout: Duration,
    /// Extra read attempts after the first one before giving up
    pub max_retries: u32,
    /// Pause between read attempts
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub retry_delay: Duration,
    /// Longest line accepted from the modem
    pub max_line_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            line_timeout: Duration::from_secs(2),
            max_retries: super::DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(200),
            max_line_len: super::MAX_LINE_LEN,
        }
    }
}

impl SessionConfig {
    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.line_timeout.is_zero() {
            return Err(Error::config("line_timeout must be non-zero"));
        }
        if self.max_line_len < 16 {
            return Err(Error::config(format!(
                "max_line_len {} is too small",
                self.max_line_len
            )));
        }
        Ok(())
    }
}

/// Serial device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial device path
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: super::DEFAULT_BAUD_RATE,
        }
    }
}

impl SerialConfig {
    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(Error::config("serial device path is empty"));
        }
        if self.baud_rate == 0 {
            return Err(Error::config("baud rate must be non-zero"));
        }
        Ok(())
    }
}

/// Eval kit telnet console settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub connect_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            host: "192.168.4.1".to_string(),
            port: super::DEFAULT_TELNET_PORT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TcpConfig {
    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host is empty"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be non-zero"));
        }
        Ok(())
    }
}
