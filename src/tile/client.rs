use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::{
    Error, GpsStatus, PowerStatus, Result, SerialConfig, SessionConfig, TcpConfig,
    MAX_APPLICATION_ID, MAX_MESSAGE_LEN,
};
use crate::protocol::message::{
    TAG_DATETIME, TAG_FIRMWARE, TAG_FIX_QUALITY, TAG_MESSAGES, TAG_POSITION, TAG_RECEIVE_TEST,
    TAG_TRANSMIT,
};
use crate::protocol::{decode_line, fold, fold_line, parse, Field, Sentence, StatusSnapshot};
use crate::session::{Session, TracingTranscript, Transcript};
use crate::transport::{SerialTransport, TcpTransport, Transport};
use crate::util::{is_quotable, to_hex};
use super::unsolicited::Unsolicited;

/// Eval kit console commands that print one power rail each
const POWER_COMMANDS: [&str; 3] = ["@show solar", "@show 3v3", "@show battery"];

/// User data for a `$TD` transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    /// Printable ASCII, sent quoted
    Text(String),
    /// Arbitrary bytes, sent as hex
    Binary(Vec<u8>),
}

impl MessagePayload {
    fn len(&self) -> usize {
        match self {
            MessagePayload::Text(text) => text.len(),
            MessagePayload::Binary(data) => data.len(),
        }
    }

    fn to_field(&self) -> Result<String> {
        match self {
            MessagePayload::Text(text) if is_quotable(text) => Ok(format!("\"{}\"", text)),
            MessagePayload::Text(_) => Err(Error::protocol(
                "text payload must be printable ASCII without double quotes",
            )),
            MessagePayload::Binary(data) => Ok(to_hex(data)),
        }
    }
}

/// Modem acknowledgement of a queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// High-level operations on a Tile modem
pub struct TileClient<T> {
    session: Session<T>,
}

impl TileClient<SerialTransport> {
    /// Opens a Tile on a serial device
    pub fn open_serial(serial: &SerialConfig, config: SessionConfig) -> Result<Self> {
        Self::open_serial_with(serial, config, TracingTranscript)
    }

    /// Opens a Tile on a serial device, recording the exchange to `transcript`
    pub fn open_serial_with(
        serial: &SerialConfig,
        config: SessionConfig,
        transcript: impl Transcript + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let transport = SerialTransport::open(serial, &config)?;
        let mut session = Session::new(transport, config).with_transcript(transcript);
        session.note(&format!("Tile Serial Connected on {}", serial.device));
        Ok(TileClient::new(session))
    }
}

impl TileClient<TcpTransport> {
    /// Connects to a Tile through the eval kit telnet console
    pub fn connect_tcp(tcp: &TcpConfig, config: SessionConfig) -> Result<Self> {
        Self::connect_tcp_with(tcp, config, TracingTranscript)
    }

    /// Connects through the telnet console, recording the exchange to `transcript`
    pub fn connect_tcp_with(
        tcp: &TcpConfig,
        config: SessionConfig,
        transcript: impl Transcript + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let transport = TcpTransport::connect(tcp, &config)?;
        let mut session = Session::new(transport, config).with_transcript(transcript);
        session.note(&format!("Tile Telnet Connected on {}:{}", tcp.host, tcp.port));
        Ok(TileClient::new(session))
    }
}

impl<T: Transport> TileClient<T> {
    pub fn new(session: Session<T>) -> Self {
        TileClient { session }
    }

    /// Direct access for commands without a dedicated operation
    pub fn session(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    /// Firmware version string, passed through as reported
    pub fn get_firmware_version(&mut self) -> Result<String> {
        let line = self.session.write_and_expect(TAG_FIRMWARE, &report_of(TAG_FIRMWARE))?;
        match parse(&decode_response(&line, TAG_FIRMWARE)?) {
            Some(Field::FirmwareVersion(version)) => Ok(version),
            _ => Err(unexpected(&line)),
        }
    }

    /// Current GPS time, or `None` while the modem has no valid time
    pub fn get_gps_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        let mut reports = Unsolicited::enable(&mut self.session, TAG_DATETIME)?;
        let line = reports.query(&report_of(TAG_DATETIME))?;
        reports.finish()?;

        match parse(&decode_response(&line, TAG_DATETIME)?) {
            Some(Field::DateTime(dt)) if dt.valid => {
                let time = dt.to_utc();
                if time.is_none() {
                    warn!(timestamp = %dt.timestamp, "Unparseable GPS time");
                }
                Ok(time)
            }
            Some(Field::DateTime(_)) => {
                debug!("GPS time not yet valid");
                Ok(None)
            }
            _ => Err(unexpected(&line)),
        }
    }

    /// Position and fix quality, queried back to back
    pub fn get_gps_stats(&mut self) -> Result<GpsStatus> {
        let mut snapshot = StatusSnapshot::default();
        for tag in [TAG_POSITION, TAG_FIX_QUALITY] {
            let mut reports = Unsolicited::enable(&mut self.session, tag)?;
            let line = reports.query(&report_of(tag))?;
            reports.finish()?;
            snapshot = fold(snapshot, &decode_response(&line, tag)?);
        }

        if !snapshot.gps.is_complete() {
            return Err(Error::protocol("incomplete GPS report"));
        }
        Ok(snapshot.gps)
    }

    /// Number of messages held by the modem
    pub fn get_message_count(&mut self, unread_only: bool) -> Result<u32> {
        let command = if unread_only { "$MM C=U" } else { "$MM C=*" };
        let line = self.session.write_and_expect(command, &report_of(TAG_MESSAGES))?;
        match parse(&decode_response(&line, TAG_MESSAGES)?) {
            Some(Field::MessageCount(count)) => Ok(count),
            _ => Err(unexpected(&line)),
        }
    }

    /// Queues one message for transmission.
    ///
    /// A missing or negative acknowledgement is returned as an error; the
    /// payload is never resent here.
    pub fn send_message(
        &mut self,
        payload: &MessagePayload,
        application_id: Option<u16>,
    ) -> Result<SendReceipt> {
        let command = transmit_command(payload, application_id)?;
        let line = self.session.write_and_expect(&command, &ack_of(TAG_TRANSMIT))?;

        match parse(&decode_response(&line, TAG_TRANSMIT)?) {
            Some(Field::SendAck(ack)) if ack.accepted => {
                info!(message_id = ?ack.detail, "Message queued");
                Ok(SendReceipt {
                    message_id: ack.detail,
                })
            }
            Some(Field::SendAck(ack)) => Err(Error::rejected(
                ack.detail.unwrap_or_else(|| "ERR".to_string()),
            )),
            _ => Err(unexpected(&line)),
        }
    }

    /// Most recent background RSSI in dBm
    pub fn get_rssi(&mut self) -> Result<i32> {
        let is_rssi =
            framed(TAG_RECEIVE_TEST, |payload| payload.starts_with("RSSI") || is_err(payload));
        let line = self.session.write_and_expect("$RT @", &is_rssi)?;
        match parse(&decode_response(&line, TAG_RECEIVE_TEST)?) {
            Some(Field::Rssi(rssi)) => Ok(rssi),
            _ => Err(unexpected(&line)),
        }
    }

    /// Sets the unsolicited RSSI report interval; zero turns reports off
    pub fn set_rssi_rate(&mut self, seconds: u32) -> Result<()> {
        let line = self
            .session
            .write_and_expect(&format!("$RT {}", seconds), &ack_of(TAG_RECEIVE_TEST))?;
        decode_response(&line, TAG_RECEIVE_TEST).map(|_| ())
    }

    /// Turns off the unsolicited reports this client manages
    pub fn disable_unsolicited(&mut self) -> Result<()> {
        for tag in [TAG_DATETIME, TAG_POSITION, TAG_FIX_QUALITY] {
            let line = self.session.write_and_expect(&format!("{} 0", tag), &ack_of(tag))?;
            decode_response(&line, tag)?;
        }
        Ok(())
    }

    /// Reads the eval kit power rails, listening `window` after each query
    pub fn poll_power(&mut self, window: Duration) -> Result<PowerStatus> {
        let mut snapshot = StatusSnapshot::default();
        for command in POWER_COMMANDS {
            self.session.write_raw(command)?;
            for line in self.session.capture(window)? {
                snapshot = fold_line(snapshot, &line);
            }
        }
        Ok(snapshot.power)
    }

    /// Folds everything the modem reports during `window` into a snapshot
    pub fn poll_status(&mut self, window: Duration) -> Result<StatusSnapshot> {
        let lines = self.session.capture(window)?;
        Ok(lines
            .iter()
            .fold(StatusSnapshot::default(), |state, line| fold_line(state, line)))
    }
}

/// Matches a well-framed `tag` sentence whose payload passes `accept`.
/// A line carrying the tag that fails to decode is skipped, so a
/// corrupted copy never stands in for the reply.
pub(super) fn framed(
    tag: &'static str,
    accept: impl Fn(&str) -> bool,
) -> impl Fn(&str) -> bool {
    move |line: &str| {
        let Some(start) = line.find(tag) else {
            return false;
        };
        match decode_line(line[start..].as_bytes()) {
            Ok(sentence) => sentence.tag == tag && accept(sentence.payload.as_str()),
            Err(e) => {
                debug!(line, error = %e, "Skipping unreadable reply");
                false
            }
        }
    }
}

/// Matches a `tag` report or a rejection, but not an `OK` ack
pub(super) fn report_of(tag: &'static str) -> impl Fn(&str) -> bool {
    framed(tag, |payload| !is_ok(payload))
}

/// Matches a `tag` acknowledgement, positive or negative
pub(super) fn ack_of(tag: &'static str) -> impl Fn(&str) -> bool {
    framed(tag, |payload| is_ok(payload) || is_err(payload))
}

fn is_ok(payload: &str) -> bool {
    payload == "OK" || payload.starts_with("OK,")
}

fn is_err(payload: &str) -> bool {
    payload == "ERR" || payload.starts_with("ERR,")
}

/// Decodes the part of a matched line starting at `tag`, so a power
/// line glued in front does not spoil the frame. An `ERR` reply becomes
/// [`Error::Rejected`] carrying the modem's reason.
pub(super) fn decode_response(line: &str, tag: &str) -> Result<Sentence> {
    let start = line.find(tag).unwrap_or(0);
    let sentence = decode_line(line[start..].as_bytes())?;
    if is_err(&sentence.payload) {
        let reason = sentence.payload.trim_start_matches("ERR").trim_start_matches(',');
        return Err(Error::rejected(if reason.is_empty() { "ERR" } else { reason }));
    }
    Ok(sentence)
}

fn unexpected(line: &str) -> Error {
    Error::protocol(format!("unexpected response {:?}", line))
}

fn transmit_command(payload: &MessagePayload, application_id: Option<u16>) -> Result<String> {
    if payload.len() == 0 {
        return Err(Error::protocol("message payload is empty"));
    }
    if payload.len() > MAX_MESSAGE_LEN {
        return Err(Error::protocol(format!(
            "message payload of {} bytes exceeds {} bytes",
            payload.len(),
            MAX_MESSAGE_LEN
        )));
    }

    let mut command = String::from("$TD ");
    if let Some(id) = application_id {
        if id > MAX_APPLICATION_ID {
            return Err(Error::protocol(format!("application id {} out of range", id)));
        }
        command.push_str(&format!("AI={},", id));
    }
    command.push_str(&payload.to_field()?);
    Ok(command)
}
