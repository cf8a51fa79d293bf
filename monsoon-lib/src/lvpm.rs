use crate::channel::{Channel, Granularity};
use crate::constants::{
    LVPM_FIELD_COUNT, LVPM_HEADER_SIZE, LVPM_MEASUREMENT_SIZE, LVPM_TRAILER_SIZE, LVPM_VOLTAGE_INDEX,
};
use crate::error::MonsoonError;
use crate::sample::{Measurement, SamplePacket, SampleType, interpolated_sample_time, split_records};
use bytes::Bytes;
use std::fmt;
use std::ops::Index;
use tracing::trace;
use zerocopy::byteorder::big_endian::{I16, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// LVPM measurement record (8 bytes, big-endian)
///
/// For regular measurements the low bit of each current reading encodes
/// that reading's own coarse/fine granularity; it is passed through as-is.
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LvpmMeasurementRaw {
    pub main: I16,
    pub usb: I16,
    pub aux: I16,
    pub voltage: U16,
}

impl LvpmMeasurementRaw {
    pub fn new(main: i16, usb: i16, aux: i16, voltage: u16) -> Self {
        Self {
            main: I16::new(main),
            usb: I16::new(usb),
            aux: I16::new(aux),
            voltage: U16::new(voltage),
        }
    }

    pub fn values(&self) -> [i32; LVPM_FIELD_COUNT] {
        [
            self.main.get() as i32,
            self.usb.get() as i32,
            self.aux.get() as i32,
            self.voltage.get() as i32,
        ]
    }
}

/// LVPM packet header (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LvpmHeaderRaw {
    // Flags, possibly with a sequence number mixed in
    pub flags: u8,
    // Sample type code shared by every record in the packet
    pub packet_type: u8,
    pub reserved: [u8; 2],
}

impl LvpmHeaderRaw {
    pub fn new(flags: u8, sample_type: SampleType) -> Self {
        Self {
            flags,
            packet_type: sample_type.lvpm_code(),
            reserved: [0; 2],
        }
    }
}

/// Selector for an LVPM lookup: a channel's current or the voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LvpmField {
    Channel(Channel),
    Voltage,
}

impl From<Channel> for LvpmField {
    fn from(channel: Channel) -> Self {
        LvpmField::Channel(channel)
    }
}

impl LvpmField {
    pub fn index(self) -> usize {
        match self {
            LvpmField::Channel(channel) => channel.index(),
            LvpmField::Voltage => LVPM_VOLTAGE_INDEX,
        }
    }
}

/// One decoded LVPM measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LvpmMeasurement {
    raw: LvpmMeasurementRaw,
    sample_time: f64,
    sample_type: SampleType,
    granularity: Option<Granularity>,
}

impl LvpmMeasurement {
    /// Decode an 8-byte record.
    ///
    /// Calibration packets alternate fine and coarse records, so their
    /// granularity follows from `entry_index`. Regular measurements carry
    /// granularity per reading instead and get none here.
    pub fn new(
        raw: &[u8],
        sample_time: f64,
        sample_type: SampleType,
        entry_index: usize,
    ) -> Result<Self, MonsoonError> {
        let raw = LvpmMeasurementRaw::read_from_bytes(raw).map_err(|_| MonsoonError::InvalidLength {
            expected: LVPM_MEASUREMENT_SIZE,
            actual: raw.len(),
        })?;
        let granularity = sample_type
            .is_calibration()
            .then(|| Granularity::from_calibration_index(entry_index));
        Ok(Self {
            raw,
            sample_time,
            sample_type,
            granularity,
        })
    }

    pub fn get(&self, field: impl Into<LvpmField>) -> i32 {
        self.values()[field.into().index()]
    }

    pub fn voltage(&self) -> u16 {
        self.raw.voltage.get()
    }

    /// Raw tuple access by position
    pub fn value(&self, index: usize) -> Result<i32, MonsoonError> {
        self.values().get(index).copied().ok_or(MonsoonError::IndexOutOfBounds {
            index,
            len: LVPM_FIELD_COUNT,
        })
    }

    pub fn values(&self) -> [i32; LVPM_FIELD_COUNT] {
        self.raw.values()
    }

    pub fn raw(&self) -> &LvpmMeasurementRaw {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn sample_time(&self) -> f64 {
        self.sample_time
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// `None` unless this is a calibration record
    pub fn calibration_granularity(&self) -> Option<Granularity> {
        self.granularity
    }
}

impl Measurement for LvpmMeasurement {
    const FIELD_COUNT: usize = LVPM_FIELD_COUNT;

    fn sample_time(&self) -> f64 {
        self.sample_time
    }

    fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    fn field(&self, index: usize) -> Result<i32, MonsoonError> {
        self.value(index)
    }

    fn fields(&self) -> Vec<i32> {
        self.values().to_vec()
    }

    fn calibration_granularity(&self) -> Option<Granularity> {
        self.granularity
    }
}

impl fmt::Display for LvpmMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.6}s {}", self.sample_time, self.sample_type)?;
        if let Some(granularity) = self.granularity {
            write!(f, " ({})", granularity)?;
        }
        write!(
            f,
            " Main={} USB={} Aux={} V={}",
            self.get(Channel::Main),
            self.get(Channel::Usb),
            self.get(Channel::Aux),
            self.voltage()
        )
    }
}

/// One framed LVPM read.
///
/// The LVPM header carries no timing, so the reader that captured the
/// buffer supplies `time_since_start` and `time_since_last_sample`.
#[derive(Debug, Clone, PartialEq)]
pub struct LvpmPacket {
    raw: Bytes,
    header: LvpmHeaderRaw,
    time_since_start: f64,
    time_since_last_sample: f64,
    measurements: Vec<LvpmMeasurement>,
}

impl LvpmPacket {
    pub fn new(
        buffer: impl Into<Bytes>,
        time_since_start: f64,
        time_since_last_sample: f64,
    ) -> Result<Self, MonsoonError> {
        let raw: Bytes = buffer.into();
        let min_len = LVPM_HEADER_SIZE + LVPM_TRAILER_SIZE;
        if raw.len() < min_len {
            return Err(MonsoonError::InsufficientData {
                expected: min_len,
                actual: raw.len(),
            });
        }

        let (header, rest) = LvpmHeaderRaw::read_from_prefix(raw.as_ref()).map_err(|_| {
            MonsoonError::InsufficientData {
                expected: LVPM_HEADER_SIZE,
                actual: raw.len(),
            }
        })?;
        // The final byte is not part of any record
        let body = &rest[..rest.len() - LVPM_TRAILER_SIZE];

        let records = split_records(body, LVPM_MEASUREMENT_SIZE)?;
        let count = records.len();
        let sample_type = SampleType::from_lvpm_code(header.packet_type);

        let measurements = records
            .enumerate()
            .map(|(i, record)| {
                let sample_time = interpolated_sample_time(time_since_start, time_since_last_sample, count, i);
                LvpmMeasurement::new(record, sample_time, sample_type, i)
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!(count, %sample_type, flags = header.flags, "Decoded LVPM packet");

        Ok(Self {
            raw,
            header,
            time_since_start,
            time_since_last_sample,
            measurements,
        })
    }

    pub fn header(&self) -> &LvpmHeaderRaw {
        &self.header
    }

    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// The raw packet type byte
    pub fn packet_type(&self) -> u8 {
        self.header.packet_type
    }

    pub fn sample_type(&self) -> SampleType {
        SampleType::from_lvpm_code(self.header.packet_type)
    }

    pub fn time_since_start(&self) -> f64 {
        self.time_since_start
    }

    pub fn time_since_last_sample(&self) -> f64 {
        self.time_since_last_sample
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LvpmMeasurement> {
        self.measurements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LvpmMeasurement> {
        self.measurements.iter()
    }

    pub fn measurements(&self) -> &[LvpmMeasurement] {
        &self.measurements
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl SamplePacket for LvpmPacket {
    type Measurement = LvpmMeasurement;

    fn measurements(&self) -> &[LvpmMeasurement] {
        &self.measurements
    }

    fn time_since_start(&self) -> f64 {
        self.time_since_start
    }

    fn time_since_last_sample(&self) -> f64 {
        self.time_since_last_sample
    }
}

impl Index<usize> for LvpmPacket {
    type Output = LvpmMeasurement;

    fn index(&self, index: usize) -> &LvpmMeasurement {
        &self.measurements[index]
    }
}

impl<'a> IntoIterator for &'a LvpmPacket {
    type Item = &'a LvpmMeasurement;
    type IntoIter = std::slice::Iter<'a, LvpmMeasurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}
