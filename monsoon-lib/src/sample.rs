//! Variant-independent view of decoded measurements and packets.
//!
//! HVPM and LVPM monitors share the same conceptual record (a timestamped
//! tuple of per-channel readings tagged with a sample type) but lay it out
//! differently on the wire. The traits here let analysis code work over
//! either without caring which decoder produced the data.

use crate::channel::Granularity;
use crate::constants::HVPM_SAMPLE_TYPE_MASK;
use crate::error::MonsoonError;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a record is a live measurement or a calibration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleType {
    #[default]
    #[strum(to_string = "measurement")]
    Measurement,
    #[strum(to_string = "zero-cal")]
    ZeroCal,
    #[strum(to_string = "ref-cal")]
    RefCal,
    #[strum(to_string = "invalid")]
    Invalid,
}

impl SampleType {
    /// Classify the sample type bits of an HVPM main gain byte.
    pub fn from_hvpm_bits(bits: u8) -> Self {
        match bits & HVPM_SAMPLE_TYPE_MASK {
            0x00 => SampleType::Measurement,
            0x10 => SampleType::ZeroCal,
            0x30 => SampleType::RefCal,
            _ => SampleType::Invalid,
        }
    }

    /// The HVPM bit pattern for this sample type.
    pub fn hvpm_bits(self) -> u8 {
        match self {
            SampleType::Measurement => 0x00,
            SampleType::ZeroCal => 0x10,
            SampleType::Invalid => 0x20,
            SampleType::RefCal => 0x30,
        }
    }

    /// Classify an LVPM packet type code. Codes above 3 are undocumented.
    pub fn from_lvpm_code(code: u8) -> Self {
        match code {
            0 => SampleType::Measurement,
            1 => SampleType::ZeroCal,
            3 => SampleType::RefCal,
            _ => SampleType::Invalid,
        }
    }

    /// The LVPM packet type code for this sample type.
    pub fn lvpm_code(self) -> u8 {
        match self {
            SampleType::Measurement => 0,
            SampleType::ZeroCal => 1,
            SampleType::Invalid => 2,
            SampleType::RefCal => 3,
        }
    }

    pub fn is_calibration(self) -> bool {
        matches!(self, SampleType::ZeroCal | SampleType::RefCal)
    }
}

/// A single decoded measurement record.
pub trait Measurement {
    /// Number of fields in the decoded tuple
    const FIELD_COUNT: usize;

    /// Absolute sample time in seconds since the start of sampling
    fn sample_time(&self) -> f64;

    fn sample_type(&self) -> SampleType;

    fn is_calibration(&self) -> bool {
        self.sample_type().is_calibration()
    }

    /// Raw tuple access, widened so signed and unsigned fields share a type
    fn field(&self, index: usize) -> Result<i32, MonsoonError>;

    /// All fields of the decoded tuple, in wire order
    fn fields(&self) -> Vec<i32>;

    /// Granularity of a calibration record, when the variant defines one
    fn calibration_granularity(&self) -> Option<Granularity> {
        None
    }
}

/// A decoded packet: a header plus its owned measurements.
pub trait SamplePacket {
    type Measurement: Measurement;

    fn measurements(&self) -> &[Self::Measurement];

    fn time_since_start(&self) -> f64;

    fn time_since_last_sample(&self) -> f64;

    fn len(&self) -> usize {
        self.measurements().len()
    }

    fn is_empty(&self) -> bool {
        self.measurements().is_empty()
    }

    fn get(&self, index: usize) -> Option<&Self::Measurement> {
        self.measurements().get(index)
    }
}

/// Spread `count` batched samples evenly over the interval since the last packet.
///
/// The hardware only timestamps packets, so per-sample times are interpolated:
/// sample `index` lands at `start + (index + 1) * (elapsed / count)`, so the
/// last sample of the packet lands on `start + elapsed`.
pub(crate) fn interpolated_sample_time(start: f64, elapsed: f64, count: usize, index: usize) -> f64 {
    start + (index + 1) as f64 * (elapsed / count as f64)
}

/// Split a packet body into fixed-size records, rejecting a partial trailing record.
pub(crate) fn split_records(body: &[u8], record_size: usize) -> Result<std::slice::ChunksExact<'_, u8>, MonsoonError> {
    let remainder = body.len() % record_size;
    if remainder != 0 {
        return Err(MonsoonError::PartialRecord { record_size, remainder });
    }
    Ok(body.chunks_exact(record_size))
}
