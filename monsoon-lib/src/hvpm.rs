use crate::channel::{Channel, Granularity, Reading};
use crate::constants::{
    HVPM_FIELD_COUNT, HVPM_GAIN_BASE, HVPM_GAIN_MASK, HVPM_HEADER_SIZE, HVPM_MEASUREMENT_SIZE, HVPM_SAMPLE_TYPE_MASK,
    HVPM_VOLTAGE_BASE,
};
use crate::error::MonsoonError;
use crate::sample::{Measurement, SamplePacket, SampleType, interpolated_sample_time, split_records};
use bytes::Bytes;
use modular_bitfield::prelude::*;
use std::fmt;
use std::ops::Index;
use tracing::trace;
use zerocopy::byteorder::{big_endian, little_endian};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// HVPM measurement record as it appears on the wire (18 bytes, big-endian)
///
/// | Pos | Offset | Type | Channel | Reading |
/// |-----|--------|------|---------|---------|
/// | 0   | 0      | u16  | Main    | Coarse  |
/// | 1   | 2      | u16  | Main    | Fine    |
/// | 2   | 4      | u16  | USB     | Coarse  |
/// | 3   | 6      | u16  | USB     | Fine    |
/// | 4   | 8      | u16  | Aux     | Coarse  |
/// | 5   | 10     | u16  | Aux     | Fine    |
/// | 6   | 12     | u16  | Main    | Voltage |
/// | 7   | 14     | u16  | USB     | Voltage |
/// | 8   | 16     | u8   | USB     | Gain    |
/// | 9   | 17     | u8   | Main    | Gain    |
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HvpmMeasurementRaw {
    pub main_coarse: big_endian::U16,
    pub main_fine: big_endian::U16,
    pub usb_coarse: big_endian::U16,
    pub usb_fine: big_endian::U16,
    pub aux_coarse: big_endian::U16,
    pub aux_fine: big_endian::U16,
    // Carries Aux voltage instead when the device's voltage channel is set to Aux
    pub main_voltage: big_endian::U16,
    pub usb_voltage: big_endian::U16,
    pub usb_gain: u8,
    // Low nibble: gain. Bits 4-5: sample type. Upper bits undocumented.
    pub main_gain: u8,
}

impl HvpmMeasurementRaw {
    /// Build a record from its decoded tuple. The two gain slots are single
    /// bytes on the wire, so values above 0xFF there are rejected.
    pub fn from_values(values: [u16; HVPM_FIELD_COUNT]) -> Result<Self, MonsoonError> {
        let gain_byte = |index: usize| {
            u8::try_from(values[index]).map_err(|_| MonsoonError::ValueOutOfRange {
                index,
                value: values[index],
            })
        };
        Ok(Self {
            main_coarse: big_endian::U16::new(values[0]),
            main_fine: big_endian::U16::new(values[1]),
            usb_coarse: big_endian::U16::new(values[2]),
            usb_fine: big_endian::U16::new(values[3]),
            aux_coarse: big_endian::U16::new(values[4]),
            aux_fine: big_endian::U16::new(values[5]),
            main_voltage: big_endian::U16::new(values[6]),
            usb_voltage: big_endian::U16::new(values[7]),
            usb_gain: gain_byte(8)?,
            main_gain: gain_byte(9)?,
        })
    }

    pub fn values(&self) -> [u16; HVPM_FIELD_COUNT] {
        [
            self.main_coarse.get(),
            self.main_fine.get(),
            self.usb_coarse.get(),
            self.usb_fine.get(),
            self.aux_coarse.get(),
            self.aux_fine.get(),
            self.main_voltage.get(),
            self.usb_voltage.get(),
            self.usb_gain as u16,
            self.main_gain as u16,
        ]
    }
}

/// HVPM packet header (20 bytes, little-endian)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HvpmHeaderRaw {
    pub time_since_start: little_endian::F64,
    pub time_since_last_sample: little_endian::F64,
    pub dropped_count: little_endian::I16,
    pub flags: u8,
    pub reserved: u8,
}

impl HvpmHeaderRaw {
    pub fn new(time_since_start: f64, time_since_last_sample: f64, dropped_count: i16, flags: u8) -> Self {
        Self {
            time_since_start: little_endian::F64::new(time_since_start),
            time_since_last_sample: little_endian::F64::new(time_since_last_sample),
            dropped_count: little_endian::I16::new(dropped_count),
            flags,
            reserved: 0,
        }
    }
}

/// HVPM header flags byte. Only the packet counter is documented.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvpmFlags {
    pub packet_counter: B4,
    #[skip]
    unknown: B4,
}

/// One decoded HVPM measurement with its interpolated sample time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvpmMeasurement {
    raw: HvpmMeasurementRaw,
    sample_time: f64,
}

impl HvpmMeasurement {
    /// Decode an 18-byte record. Any other length is rejected.
    pub fn new(raw: &[u8], sample_time: f64) -> Result<Self, MonsoonError> {
        let raw = HvpmMeasurementRaw::read_from_bytes(raw).map_err(|_| MonsoonError::InvalidLength {
            expected: HVPM_MEASUREMENT_SIZE,
            actual: raw.len(),
        })?;
        Ok(Self { raw, sample_time })
    }

    /// Tuple position holding `reading` for `channel`.
    ///
    /// Voltage counts up from slot 6, gain counts down from slot 9, and
    /// currents are laid out as coarse/fine pairs per channel.
    pub fn value_index(channel: Channel, reading: Reading) -> usize {
        match reading {
            Reading::Voltage => HVPM_VOLTAGE_BASE + channel.index(),
            Reading::Gain => HVPM_GAIN_BASE - channel.index(),
            Reading::Current(granularity) => channel.index() * 2 + u8::from(granularity) as usize,
        }
    }

    /// Look up a reading for a channel. Gains are masked to their low nibble.
    pub fn get(&self, channel: Channel, reading: Reading) -> u16 {
        let value = self.values()[Self::value_index(channel, reading)];
        match reading {
            Reading::Gain => value & HVPM_GAIN_MASK as u16,
            _ => value,
        }
    }

    /// Raw tuple access by position
    pub fn value(&self, index: usize) -> Result<u16, MonsoonError> {
        self.values().get(index).copied().ok_or(MonsoonError::IndexOutOfBounds {
            index,
            len: HVPM_FIELD_COUNT,
        })
    }

    pub fn values(&self) -> [u16; HVPM_FIELD_COUNT] {
        self.raw.values()
    }

    pub fn raw(&self) -> &HvpmMeasurementRaw {
        &self.raw
    }

    /// The record re-encoded exactly as it was received
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn sample_time(&self) -> f64 {
        self.sample_time
    }

    /// The sample type bits of the main gain byte, unshifted
    pub fn raw_sample_type(&self) -> u8 {
        self.raw.main_gain & HVPM_SAMPLE_TYPE_MASK
    }

    pub fn sample_type(&self) -> SampleType {
        SampleType::from_hvpm_bits(self.raw_sample_type())
    }
}

impl Measurement for HvpmMeasurement {
    const FIELD_COUNT: usize = HVPM_FIELD_COUNT;

    fn sample_time(&self) -> f64 {
        self.sample_time
    }

    fn sample_type(&self) -> SampleType {
        HvpmMeasurement::sample_type(self)
    }

    fn field(&self, index: usize) -> Result<i32, MonsoonError> {
        self.value(index).map(i32::from)
    }

    fn fields(&self) -> Vec<i32> {
        self.values().into_iter().map(i32::from).collect()
    }
}

impl fmt::Display for HvpmMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.6}s {} ", self.sample_time, self.sample_type())?;
        for channel in Channel::ALL {
            write!(
                f,
                "{}[c={} f={} g={}] ",
                channel,
                self.get(channel, Reading::Current(Granularity::Coarse)),
                self.get(channel, Reading::Current(Granularity::Fine)),
                self.get(channel, Reading::Gain),
            )?;
        }
        write!(
            f,
            "Vmain={} Vusb={}",
            self.get(Channel::Main, Reading::Voltage),
            self.get(Channel::Usb, Reading::Voltage)
        )
    }
}

/// One framed HVPM read: header plus zero or more measurements.
#[derive(Debug, Clone)]
pub struct HvpmPacket {
    raw: Bytes,
    header: HvpmHeaderRaw,
    measurements: Vec<HvpmMeasurement>,
}

impl HvpmPacket {
    /// Decode a complete packet buffer.
    ///
    /// The body after the 20-byte header must be a whole number of 18-byte
    /// records. Sample times are interpolated across `time_since_last_sample`.
    pub fn new(buffer: impl Into<Bytes>) -> Result<Self, MonsoonError> {
        let raw: Bytes = buffer.into();
        let (header, body) =
            HvpmHeaderRaw::read_from_prefix(raw.as_ref()).map_err(|_| MonsoonError::InsufficientData {
                expected: HVPM_HEADER_SIZE,
                actual: raw.len(),
            })?;

        let records = split_records(body, HVPM_MEASUREMENT_SIZE)?;
        let count = records.len();
        let start = header.time_since_start.get();
        let elapsed = header.time_since_last_sample.get();

        let measurements = records
            .enumerate()
            .map(|(i, record)| HvpmMeasurement::new(record, interpolated_sample_time(start, elapsed, count, i)))
            .collect::<Result<Vec<_>, _>>()?;

        trace!(
            count,
            dropped = header.dropped_count.get(),
            counter = HvpmFlags::from_bytes([header.flags]).packet_counter(),
            "Decoded HVPM packet"
        );

        Ok(Self {
            raw,
            header,
            measurements,
        })
    }

    pub fn header(&self) -> &HvpmHeaderRaw {
        &self.header
    }

    pub fn time_since_start(&self) -> f64 {
        self.header.time_since_start.get()
    }

    pub fn time_since_last_sample(&self) -> f64 {
        self.header.time_since_last_sample.get()
    }

    /// Samples the device reports it dropped before this packet
    pub fn dropped_count(&self) -> i16 {
        self.header.dropped_count.get()
    }

    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// 4-bit rolling counter from the low nibble of the flags byte
    pub fn packet_counter(&self) -> u8 {
        HvpmFlags::from_bytes([self.header.flags]).packet_counter()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HvpmMeasurement> {
        self.measurements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HvpmMeasurement> {
        self.measurements.iter()
    }

    pub fn measurements(&self) -> &[HvpmMeasurement] {
        &self.measurements
    }

    /// The buffer this packet was decoded from
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

impl SamplePacket for HvpmPacket {
    type Measurement = HvpmMeasurement;

    fn measurements(&self) -> &[HvpmMeasurement] {
        &self.measurements
    }

    fn time_since_start(&self) -> f64 {
        HvpmPacket::time_since_start(self)
    }

    fn time_since_last_sample(&self) -> f64 {
        HvpmPacket::time_since_last_sample(self)
    }
}

impl Index<usize> for HvpmPacket {
    type Output = HvpmMeasurement;

    fn index(&self, index: usize) -> &HvpmMeasurement {
        &self.measurements[index]
    }
}

impl<'a> IntoIterator for &'a HvpmPacket {
    type Item = &'a HvpmMeasurement;
    type IntoIter = std::slice::Iter<'a, HvpmMeasurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

impl TryFrom<Bytes> for HvpmPacket {
    type Error = MonsoonError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        HvpmPacket::new(bytes)
    }
}
