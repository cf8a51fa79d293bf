//! Dispatch between the HVPM and LVPM decoders.
//!
//! The hardware type is detected once where bytes enter the program; after
//! that every buffer goes through the matching decoder and downstream code
//! sees either an [`AnyPacket`] or flat [`SampleRecord`]s.

use crate::channel::Granularity;
use crate::constants::{
    HVPM_FIELD_COUNT, HVPM_HEADER_SIZE, HVPM_MEASUREMENT_SIZE, LVPM_FIELD_COUNT, LVPM_HEADER_SIZE,
    LVPM_MEASUREMENT_SIZE, LVPM_TRAILER_SIZE,
};
use crate::error::MonsoonError;
use crate::hvpm::HvpmPacket;
use crate::lvpm::LvpmPacket;
use crate::sample::{Measurement, SamplePacket, SampleType};
use bytes::Bytes;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which power monitor produced a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HardwareVariant {
    #[strum(to_string = "HVPM")]
    Hvpm,
    #[strum(to_string = "LVPM")]
    Lvpm,
}

impl HardwareVariant {
    pub fn header_size(self) -> usize {
        match self {
            HardwareVariant::Hvpm => HVPM_HEADER_SIZE,
            HardwareVariant::Lvpm => LVPM_HEADER_SIZE,
        }
    }

    pub fn measurement_size(self) -> usize {
        match self {
            HardwareVariant::Hvpm => HVPM_MEASUREMENT_SIZE,
            HardwareVariant::Lvpm => LVPM_MEASUREMENT_SIZE,
        }
    }

    /// Bytes after the last record that belong to no record
    pub fn trailer_size(self) -> usize {
        match self {
            HardwareVariant::Hvpm => 0,
            HardwareVariant::Lvpm => LVPM_TRAILER_SIZE,
        }
    }

    pub fn field_count(self) -> usize {
        match self {
            HardwareVariant::Hvpm => HVPM_FIELD_COUNT,
            HardwareVariant::Lvpm => LVPM_FIELD_COUNT,
        }
    }

    /// Number of records a buffer of `buffer_len` bytes frames, without decoding it
    pub fn measurement_count(self, buffer_len: usize) -> Result<usize, MonsoonError> {
        let overhead = self.header_size() + self.trailer_size();
        let body = buffer_len.checked_sub(overhead).ok_or(MonsoonError::InsufficientData {
            expected: overhead,
            actual: buffer_len,
        })?;
        let record_size = self.measurement_size();
        match body % record_size {
            0 => Ok(body / record_size),
            remainder => Err(MonsoonError::PartialRecord { record_size, remainder }),
        }
    }
}

/// Packet timing supplied by the reader, for variants whose header has none.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PacketTiming {
    pub time_since_start: f64,
    pub time_since_last_sample: f64,
}

impl PacketTiming {
    pub fn new(time_since_start: f64, time_since_last_sample: f64) -> Self {
        Self {
            time_since_start,
            time_since_last_sample,
        }
    }
}

/// A measurement flattened to variant-independent fields.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleRecord {
    /// Position within the packet
    pub index: usize,
    pub sample_time: f64,
    pub sample_type: SampleType,
    pub granularity: Option<Granularity>,
    pub values: Vec<i32>,
}

impl SampleRecord {
    pub fn from_measurement<M: Measurement>(index: usize, measurement: &M) -> Self {
        Self {
            index,
            sample_time: measurement.sample_time(),
            sample_type: measurement.sample_type(),
            granularity: measurement.calibration_granularity(),
            values: measurement.fields(),
        }
    }
}

fn records_of<P: SamplePacket>(packet: &P) -> Vec<SampleRecord> {
    packet
        .measurements()
        .iter()
        .enumerate()
        .map(|(i, m)| SampleRecord::from_measurement(i, m))
        .collect()
}

/// A decoded packet of either variant.
#[derive(Debug, Clone)]
pub enum AnyPacket {
    Hvpm(HvpmPacket),
    Lvpm(LvpmPacket),
}

impl AnyPacket {
    /// Decode `bytes` with the decoder for `variant`.
    ///
    /// HVPM packets carry their own timing and ignore `timing`.
    pub fn decode(variant: HardwareVariant, bytes: impl Into<Bytes>, timing: PacketTiming) -> Result<Self, MonsoonError> {
        match variant {
            HardwareVariant::Hvpm => Ok(AnyPacket::Hvpm(HvpmPacket::new(bytes)?)),
            HardwareVariant::Lvpm => Ok(AnyPacket::Lvpm(LvpmPacket::new(
                bytes,
                timing.time_since_start,
                timing.time_since_last_sample,
            )?)),
        }
    }

    pub fn variant(&self) -> HardwareVariant {
        match self {
            AnyPacket::Hvpm(_) => HardwareVariant::Hvpm,
            AnyPacket::Lvpm(_) => HardwareVariant::Lvpm,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnyPacket::Hvpm(packet) => packet.len(),
            AnyPacket::Lvpm(packet) => packet.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn time_since_start(&self) -> f64 {
        match self {
            AnyPacket::Hvpm(packet) => packet.time_since_start(),
            AnyPacket::Lvpm(packet) => packet.time_since_start(),
        }
    }

    pub fn time_since_last_sample(&self) -> f64 {
        match self {
            AnyPacket::Hvpm(packet) => packet.time_since_last_sample(),
            AnyPacket::Lvpm(packet) => packet.time_since_last_sample(),
        }
    }

    pub fn raw(&self) -> &Bytes {
        match self {
            AnyPacket::Hvpm(packet) => packet.raw(),
            AnyPacket::Lvpm(packet) => packet.raw(),
        }
    }

    pub fn records(&self) -> Vec<SampleRecord> {
        match self {
            AnyPacket::Hvpm(packet) => records_of(packet),
            AnyPacket::Lvpm(packet) => records_of(packet),
        }
    }
}

impl From<HvpmPacket> for AnyPacket {
    fn from(packet: HvpmPacket) -> Self {
        AnyPacket::Hvpm(packet)
    }
}

impl From<LvpmPacket> for AnyPacket {
    fn from(packet: LvpmPacket) -> Self {
        AnyPacket::Lvpm(packet)
    }
}
