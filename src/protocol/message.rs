use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

use crate::core::{FixQuality, FixType, GpsPosition, Rail, RailReading};

/// Sentence tags understood by the parser
pub const TAG_DATETIME: &str = "$DT";
pub const TAG_POSITION: &str = "$GN";
pub const TAG_FIX_QUALITY: &str = "$GS";
pub const TAG_RECEIVE_TEST: &str = "$RT";
pub const TAG_MESSAGES: &str = "$MM";
pub const TAG_FIRMWARE: &str = "$FV";
pub const TAG_TRANSMIT: &str = "$TD";

/// Format of the `$DT` timestamp field
const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// One checksum-verified protocol line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentence {
    /// Tag including the `$` marker, e.g. `$DT`
    pub tag: String,
    /// Everything between the tag and the checksum delimiter
    pub payload: String,
}

impl Sentence {
    pub fn new(tag: impl Into<String>, payload: impl Into<String>) -> Self {
        Sentence {
            tag: tag.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            f.write_str(&self.tag)
        } else {
            write!(f, "{} {}", self.tag, self.payload)
        }
    }
}

/// `$DT` timestamp as reported, with its validity flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTimeField {
    /// `YYYYMMDDhhmmss`
    pub timestamp: String,
    /// `V` reported; `I` means the modem has no valid time yet
    pub valid: bool,
}

impl DateTimeField {
    /// Timestamp as UTC, or `None` if it does not parse
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.timestamp, DATETIME_FORMAT)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

/// Answer to a `$TD` transmit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    pub accepted: bool,
    /// Message id on success, reason on failure
    pub detail: Option<String>,
}

/// Structured content of a recognised sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Rssi(i32),
    DateTime(DateTimeField),
    Position(GpsPosition),
    FixQuality(FixQuality),
    MessageCount(u32),
    FirmwareVersion(String),
    SendAck(SendAck),
}

/// Decodes a sentence by tag. Unknown tags and unexpected shapes
/// (including plain `OK` acknowledgements) yield `None`.
pub fn parse(sentence: &Sentence) -> Option<Field> {
    let payload = sentence.payload.trim();
    match sentence.tag.as_str() {
        TAG_RECEIVE_TEST => parse_rssi(payload).map(Field::Rssi),
        TAG_DATETIME => parse_datetime(payload).map(Field::DateTime),
        TAG_POSITION => parse_position(payload).map(Field::Position),
        TAG_FIX_QUALITY => parse_fix_quality(payload).map(Field::FixQuality),
        TAG_MESSAGES => parse_message_count(payload).map(Field::MessageCount),
        TAG_FIRMWARE if !payload.is_empty() => Some(Field::FirmwareVersion(payload.to_string())),
        TAG_TRANSMIT => parse_send_ack(payload).map(Field::SendAck),
        _ => None,
    }
}

fn parse_rssi(payload: &str) -> Option<i32> {
    let value = payload.strip_prefix("RSSI=")?;
    let value = value.split(',').next()?;
    value.trim().parse().ok()
}

fn parse_datetime(payload: &str) -> Option<DateTimeField> {
    let (timestamp, flag) = payload.rsplit_once(',')?;
    let valid = match flag.trim() {
        "V" => true,
        "I" => false,
        _ => return None,
    };
    let timestamp = timestamp.trim();
    if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(DateTimeField {
        timestamp: timestamp.to_string(),
        valid,
    })
}

fn parse_position(payload: &str) -> Option<GpsPosition> {
    let values: Vec<&str> = payload.split(',').map(str::trim).collect();
    if values.len() != 5 {
        return None;
    }
    Some(GpsPosition {
        latitude: values[0].to_string(),
        longitude: values[1].to_string(),
        altitude: values[2].to_string(),
        course: values[3].to_string(),
        speed: values[4].to_string(),
    })
}

fn parse_fix_quality(payload: &str) -> Option<FixQuality> {
    let values: Vec<&str> = payload.split(',').map(str::trim).collect();
    if values.len() != 5 {
        return None;
    }
    Some(FixQuality {
        hdop: values[0].to_string(),
        vdop: values[1].to_string(),
        satellites: values[2].to_string(),
        fix: values[4].to_string(),
        fix_type: FixType::from_code(values[4]),
    })
}

fn parse_message_count(payload: &str) -> Option<u32> {
    payload.strip_prefix("C=").unwrap_or(payload).trim().parse().ok()
}

fn parse_send_ack(payload: &str) -> Option<SendAck> {
    let (status, detail) = match payload.split_once(',') {
        Some((status, detail)) => (status.trim(), Some(detail.trim().to_string())),
        None => (payload, None),
    };
    let accepted = match status {
        "OK" => true,
        "ERR" => false,
        _ => return None,
    };
    Some(SendAck { accepted, detail })
}

/// A power rail line from the eval kit console
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub rail: Rail,
    pub reading: RailReading,
}

/// Parses `"<RAIL>: <volts>V <amps>A"`. The line must already be split
/// from any overlapping sentence.
pub fn parse_power(line: &str) -> Option<PowerReading> {
    let rail = Rail::from_line(line)?;
    let mut values = line[rail.prefix().len()..].split_whitespace();
    let volts = values.next()?.strip_suffix('V')?.parse().ok()?;
    let amps = values.next()?.strip_suffix('A')?.parse().ok()?;
    Some(PowerReading {
        rail,
        reading: RailReading { volts, amps },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn sentence(tag: &str, payload: &str) -> Sentence {
        Sentence::new(tag, payload)
    }

    #[test]
    fn test_parse_rssi() {
        assert_eq!(parse(&sentence("$RT", "RSSI=-88")), Some(Field::Rssi(-88)));
        assert_eq!(parse(&sentence("$RT", "RSSI=-104,SNR=-5")), Some(Field::Rssi(-104)));
        assert_eq!(parse(&sentence("$RT", "OK")), None);
    }

    #[test]
    fn test_parse_datetime() {
        let field = parse(&sentence("$DT", "20210909102029,V"));
        let Some(Field::DateTime(dt)) = field else {
            panic!("expected datetime, got {:?}", field);
        };
        assert!(dt.valid);
        let utc = dt.to_utc().unwrap();
        assert_eq!((utc.year(), utc.month(), utc.day()), (2021, 9, 9));
        assert_eq!((utc.hour(), utc.minute(), utc.second()), (10, 20, 29));
    }

    #[test]
    fn test_parse_invalid_datetime_is_surfaced() {
        assert_eq!(
            parse(&sentence("$DT", "20210909102029,I")),
            Some(Field::DateTime(DateTimeField {
                timestamp: "20210909102029".into(),
                valid: false,
            }))
        );
        assert_eq!(parse(&sentence("$DT", "OK")), None);
    }

    #[test]
    fn test_parse_position_allows_empty_fields() {
        let Some(Field::Position(pos)) = parse(&sentence("$GN", ",,,,")) else {
            panic!("expected position");
        };
        assert_eq!(pos, GpsPosition::default());

        let Some(Field::Position(pos)) = parse(&sentence("$GN", "37.8921,-122.0155,77,89,2")) else {
            panic!("expected position");
        };
        assert_eq!(pos.longitude, "-122.0155");
        assert_eq!(pos.speed, "2");
        assert_eq!(parse(&sentence("$GN", "OK")), None);
    }

    #[test]
    fn test_parse_fix_quality() {
        let Some(Field::FixQuality(q)) = parse(&sentence("$GS", "109,214,12,0,G3")) else {
            panic!("expected fix quality");
        };
        assert_eq!(q.satellites, "12");
        assert_eq!(q.fix_type, FixType::Standalone3D);

        let Some(Field::FixQuality(q)) = parse(&sentence("$GS", "109,214,12,0,ZZ")) else {
            panic!("expected fix quality");
        };
        assert_eq!(q.fix_type, FixType::Unknown);
    }

    #[test]
    fn test_parse_message_count() {
        assert_eq!(parse(&sentence("$MM", "7")), Some(Field::MessageCount(7)));
        assert_eq!(parse(&sentence("$MM", "C=12")), Some(Field::MessageCount(12)));
        assert_eq!(parse(&sentence("$MM", "OK")), None);
    }

    #[test]
    fn test_parse_firmware_and_ack() {
        assert_eq!(
            parse(&sentence("$FV", "2021-07-16-00:28:12,v1.0.0")),
            Some(Field::FirmwareVersion("2021-07-16-00:28:12,v1.0.0".into()))
        );
        assert_eq!(
            parse(&sentence("$TD", "OK,5354468575624")),
            Some(Field::SendAck(SendAck {
                accepted: true,
                detail: Some("5354468575624".into()),
            }))
        );
        assert_eq!(
            parse(&sentence("$TD", "ERR")),
            Some(Field::SendAck(SendAck { accepted: false, detail: None }))
        );
    }

    #[test]
    fn test_unknown_tag_ignored() {
        assert_eq!(parse(&sentence("$M138", "BOOT,RUNNING")), None);
    }

    #[test]
    fn test_parse_power() {
        let reading = parse_power("SOL: 1.128V 0.0A").unwrap();
        assert_eq!(reading.rail, Rail::Solar);
        assert_eq!(reading.reading, RailReading { volts: 1.128, amps: 0.0 });

        let reading = parse_power("3V3: 3.376V 0.056A").unwrap();
        assert_eq!(reading.rail, Rail::V3V3);
        assert_eq!(reading.reading.amps, 0.056);

        assert!(parse_power("BAT: 3.992 0.156A").is_none());
        assert!(parse_power("$RT RSSI=-88").is_none());
    }
}
