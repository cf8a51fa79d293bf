//! Line-oriented capture files of raw packets.
//!
//! One packet per line, hex encoded. Blank lines and lines starting with
//! `#` are skipped. LVPM lines are prefixed with the reader's timing:
//!
//! ```text
//! # hvpm
//! 000000000000f03f...
//! # lvpm: <time_since_start> <time_since_last_sample> <hex>
//! 0.5 0.25 00010000...
//! ```

use crate::error::MonsoonError;
use crate::variant::{AnyPacket, HardwareVariant, PacketTiming};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;

/// A raw packet as recorded in a capture file
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPacket {
    /// 1-based line number in the source file, 0 if not read from a file
    pub line: usize,
    pub timing: PacketTiming,
    pub raw_bytes: Bytes,
}

impl CapturedPacket {
    pub fn new(raw_bytes: impl Into<Bytes>, timing: PacketTiming) -> Self {
        Self {
            line: 0,
            timing,
            raw_bytes: raw_bytes.into(),
        }
    }

    /// Get the raw bytes as a hex string
    pub fn hex_string(&self) -> String {
        hex::encode(&self.raw_bytes)
    }

    /// Render this packet as a capture line for `variant`
    pub fn to_line(&self, variant: HardwareVariant) -> String {
        match variant {
            HardwareVariant::Hvpm => self.hex_string(),
            HardwareVariant::Lvpm => format!(
                "{} {} {}",
                self.timing.time_since_start,
                self.timing.time_since_last_sample,
                self.hex_string()
            ),
        }
    }

    pub fn decode(&self, variant: HardwareVariant) -> Result<AnyPacket, MonsoonError> {
        AnyPacket::decode(variant, self.raw_bytes.clone(), self.timing)
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> MonsoonError {
    MonsoonError::ParseError {
        line,
        message: message.into(),
    }
}

fn parse_hex(line: usize, text: &str) -> Result<Bytes, MonsoonError> {
    hex::decode(text)
        .map(Bytes::from)
        .map_err(|e| parse_error(line, format!("invalid hex: {}", e)))
}

fn parse_time(line: usize, text: &str, name: &str) -> Result<f64, MonsoonError> {
    text.parse::<f64>()
        .map_err(|e| parse_error(line, format!("invalid {} {:?}: {}", name, text, e)))
}

/// Parse one capture line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_capture_line(
    variant: HardwareVariant,
    line_no: usize,
    line: &str,
) -> Result<Option<CapturedPacket>, MonsoonError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let (timing, hex_field) = match (variant, fields.as_slice()) {
        (HardwareVariant::Hvpm, [hex_field]) => (PacketTiming::default(), *hex_field),
        (HardwareVariant::Lvpm, [start, elapsed, hex_field]) => {
            let timing = PacketTiming::new(
                parse_time(line_no, start, "time_since_start")?,
                parse_time(line_no, elapsed, "time_since_last_sample")?,
            );
            (timing, *hex_field)
        }
        (HardwareVariant::Hvpm, _) => {
            return Err(parse_error(line_no, format!("expected 1 field, got {}", fields.len())));
        }
        (HardwareVariant::Lvpm, _) => {
            return Err(parse_error(line_no, format!("expected 3 fields, got {}", fields.len())));
        }
    };

    Ok(Some(CapturedPacket {
        line: line_no,
        timing,
        raw_bytes: parse_hex(line_no, hex_field)?,
    }))
}

/// A sequence of captured packets from one monitor
#[derive(Debug, Clone)]
pub struct Capture {
    variant: HardwareVariant,
    packets: Vec<CapturedPacket>,
}

impl Capture {
    pub fn new(variant: HardwareVariant) -> Self {
        Self {
            variant,
            packets: Vec::new(),
        }
    }

    pub fn from_reader<R: BufRead>(variant: HardwareVariant, reader: R) -> Result<Self, MonsoonError> {
        let mut capture = Self::new(variant);
        for (i, line) in reader.lines().enumerate() {
            if let Some(packet) = parse_capture_line(variant, i + 1, &line?)? {
                capture.add(packet);
            }
        }
        debug!(variant = %variant, packets = capture.len(), "Loaded capture");
        Ok(capture)
    }

    pub fn load(variant: HardwareVariant, path: impl AsRef<Path>) -> Result<Self, MonsoonError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(variant, BufReader::new(file))
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "# {}", self.variant)?;
        for packet in &self.packets {
            writeln!(writer, "{}", packet.to_line(self.variant))?;
        }
        Ok(())
    }

    pub fn add(&mut self, packet: CapturedPacket) {
        self.packets.push(packet);
    }

    pub fn variant(&self) -> HardwareVariant {
        self.variant
    }

    pub fn packets(&self) -> &[CapturedPacket] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Decode every packet in order
    pub fn decode(&self) -> impl Iterator<Item = Result<AnyPacket, MonsoonError>> + '_ {
        self.packets.iter().map(move |packet| packet.decode(self.variant))
    }
}
