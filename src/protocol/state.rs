use serde::Serialize;
use tracing::debug;

use crate::core::{GpsStatus, PowerStatus};
use super::codec::{decode_line, split_overlap};
use super::message::{parse, parse_power, DateTimeField, Field, Sentence};

/// Everything learned from a round of status sentences
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub gps: GpsStatus,
    pub power: PowerStatus,
    pub rssi: Option<i32>,
    pub datetime: Option<DateTimeField>,
}

/// Folds one sentence into the snapshot. Each field group is replaced
/// whole by the latest sentence of its kind; anything else is left alone.
pub fn fold(mut state: StatusSnapshot, sentence: &Sentence) -> StatusSnapshot {
    match parse(sentence) {
        Some(Field::Position(position)) => state.gps.position = Some(position),
        Some(Field::FixQuality(quality)) => state.gps.quality = Some(quality),
        Some(Field::Rssi(rssi)) => state.rssi = Some(rssi),
        Some(Field::DateTime(datetime)) => state.datetime = Some(datetime),
        _ => {}
    }
    state
}

/// Folds one raw line, which may be a power rail line with a sentence
/// glued onto its end.
pub fn fold_line(mut state: StatusSnapshot, line: &str) -> StatusSnapshot {
    let line = line.trim_end_matches(['\r', '\n']);
    let (head, tail) = split_overlap(line);

    let sentence_text = if head.starts_with('$') {
        Some(head)
    } else {
        if let Some(power) = parse_power(head) {
            state.power.set(power.rail, power.reading);
        }
        tail
    };

    if let Some(text) = sentence_text {
        match decode_line(text.as_bytes()) {
            Ok(sentence) => state = fold(state, &sentence),
            Err(e) => debug!(line = text, error = %e, "Dropping unreadable sentence"),
        }
    }
    state
}

/// Folds every newline-separated line of a captured block of text
pub fn fold_text(state: StatusSnapshot, text: &str) -> StatusSnapshot {
    text.lines().fold(state, fold_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixType, Rail, RailReading};

    const CAPTURE: &str = "$GN 37.8921,-122.0155,77,89,2*01\n\
                           $GS 109,214,12,0,G3*7C\n\
                           SOL: 1.128V 0.0A$RT RSSI=-88*2d\n\
                           3V3: 3.376V 0.056A$DT 20210909102029,V*43\n\
                           BAT: 3.992V 0.156A\n\
                           $M138 BOOT,RUNNING*2A\n";

    #[test]
    fn test_fold_capture() {
        let state = fold_text(StatusSnapshot::default(), CAPTURE);

        assert!(state.gps.is_complete());
        assert_eq!(state.gps.quality.as_ref().unwrap().fix_type, FixType::Standalone3D);
        assert_eq!(state.rssi, Some(-88));
        assert_eq!(state.datetime.as_ref().unwrap().timestamp, "20210909102029");
        assert_eq!(
            state.power.get(Rail::Battery),
            Some(RailReading { volts: 3.992, amps: 0.156 })
        );
        assert!(state.power.solar.is_some());
        assert!(state.power.v3v3.is_some());
    }

    #[test]
    fn test_fold_same_sentence_twice() {
        let sentence = decode_line(b"$GN 37.8921,-122.0155,77,89,2*01").unwrap();
        let once = fold(StatusSnapshot::default(), &sentence);
        let twice = fold(once.clone(), &sentence);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fold_order_independent() {
        let lines: Vec<&str> = CAPTURE.lines().collect();
        let forward = lines.iter().fold(StatusSnapshot::default(), |s, l| fold_line(s, l));
        let backward = lines.iter().rev().fold(StatusSnapshot::default(), |s, l| fold_line(s, l));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_last_write_wins() {
        let state = fold_text(
            StatusSnapshot::default(),
            "$RT RSSI=-88*2d\n$RT RSSI=-104*18\n",
        );
        assert_eq!(state.rssi, Some(-104));
    }

    #[test]
    fn test_bad_lines_leave_state_untouched() {
        let before = fold_text(StatusSnapshot::default(), "$RT RSSI=-88*2d\n");
        let after = fold_text(before.clone(), "$RT RSSI=-90*00\ngarbage\n$GN OK*2D\nSOL: ?V\n");
        assert_eq!(before, after);
    }
}
