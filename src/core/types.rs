use std::fmt;

use serde::Serialize;

/// GNSS fix code table as reported in the fifth `$GS` field
pub const GNSS_FIX_TYPES: &[(&str, FixType)] = &[
    ("NF", FixType::NoFix),
    ("DR", FixType::DeadReckoning),
    ("G2", FixType::Standalone2D),
    ("G3", FixType::Standalone3D),
    ("D2", FixType::Differential2D),
    ("D3", FixType::Differential3D),
    ("RK", FixType::GnssDeadReckoning),
    ("TT", FixType::TimeOnly),
];

/// Kind of GNSS fix the modem currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FixType {
    NoFix,
    DeadReckoning,
    Standalone2D,
    Standalone3D,
    Differential2D,
    Differential3D,
    GnssDeadReckoning,
    TimeOnly,
    /// Code not present in the fix table
    Unknown,
}

impl FixType {
    /// Looks up a two-letter fix code; unknown codes map to `FixType::Unknown`
    pub fn from_code(code: &str) -> Self {
        GNSS_FIX_TYPES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, fix)| *fix)
            .unwrap_or(FixType::Unknown)
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            FixType::NoFix => "No Fix",
            FixType::DeadReckoning => "Dead Reckoning",
            FixType::Standalone2D => "Standalone 2D",
            FixType::Standalone3D => "Standalone 3D",
            FixType::Differential2D => "Differential 2D",
            FixType::Differential3D => "Differential 3D",
            FixType::GnssDeadReckoning => "GNSS + Dead Reckoning",
            FixType::TimeOnly => "Time Only",
            FixType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Geospatial fields from one `$GN` sentence.
///
/// Values stay textual: the modem leaves them empty when there is no fix,
/// so numeric coercion is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpsPosition {
    pub latitude: String,
    pub longitude: String,
    /// Meters
    pub altitude: String,
    /// Degrees
    pub course: String,
    /// km/h
    pub speed: String,
}

/// Fix quality fields from one `$GS` sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixQuality {
    pub hdop: String,
    pub vdop: String,
    pub satellites: String,
    /// Raw two-letter fix code
    pub fix: String,
    pub fix_type: FixType,
}

/// Aggregated GPS state. Each group is replaced as a whole by the latest
/// sentence of its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpsStatus {
    pub position: Option<GpsPosition>,
    pub quality: Option<FixQuality>,
}

impl GpsStatus {
    /// True once both `$GN` and `$GS` have been seen
    pub fn is_complete(&self) -> bool {
        self.position.is_some() && self.quality.is_some()
    }

    /// Multi-line report of every known field
    pub fn verbose(&self) -> String {
        let mut out = String::from("Swarm Tile GPS Fix:\n");
        if let Some(p) = &self.position {
            out.push_str(&format!("Latitude: {}\n", p.latitude));
            out.push_str(&format!("Longitude: {}\n", p.longitude));
            out.push_str(&format!("Altitude: {} meters\n", p.altitude));
            out.push_str(&format!("Course: {} degrees\n", p.course));
            out.push_str(&format!("Speed: {} km/h\n", p.speed));
        }
        if let Some(q) = &self.quality {
            out.push_str(&format!("Horizontal Dilution of Precision: {}\n", q.hdop));
            out.push_str(&format!("Vertical Dilution of Precision: {}\n", q.vdop));
            out.push_str(&format!("GNSS Sats: {}\n", q.satellites));
            out.push_str(&format!("Fix: {}\n", q.fix));
            out.push_str(&format!("Fix Type: {}\n", q.fix_type));
        }
        out
    }
}

impl fmt::Display for GpsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(p) => write!(f, "Swarm Tile GPS Fix ({}, {})", p.latitude, p.longitude),
            None => f.write_str("Swarm Tile GPS Fix (none)"),
        }
    }
}

/// Power rail reported on the eval kit console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rail {
    Solar,
    V3V3,
    Battery,
}

impl Rail {
    /// Line prefix used by the console, including the colon
    pub fn prefix(&self) -> &'static str {
        match self {
            Rail::Solar => "SOL:",
            Rail::V3V3 => "3V3:",
            Rail::Battery => "BAT:",
        }
    }

    /// Matches a line against the known rail prefixes
    pub fn from_line(line: &str) -> Option<Self> {
        [Rail::Solar, Rail::V3V3, Rail::Battery]
            .into_iter()
            .find(|rail| line.starts_with(rail.prefix()))
    }
}

/// One voltage/current sample of a rail
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RailReading {
    pub volts: f32,
    pub amps: f32,
}

/// Latest reading per power rail
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerStatus {
    pub solar: Option<RailReading>,
    pub v3v3: Option<RailReading>,
    pub battery: Option<RailReading>,
}

impl PowerStatus {
    /// Replaces the reading for one rail
    pub fn set(&mut self, rail: Rail, reading: RailReading) {
        match rail {
            Rail::Solar => self.solar = Some(reading),
            Rail::V3V3 => self.v3v3 = Some(reading),
            Rail::Battery => self.battery = Some(reading),
        }
    }

    /// Reading for one rail, if seen
    pub fn get(&self, rail: Rail) -> Option<RailReading> {
        match rail {
            Rail::Solar => self.solar,
            Rail::V3V3 => self.v3v3,
            Rail::Battery => self.battery,
        }
    }
}
