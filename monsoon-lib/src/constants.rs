// Wire layout constants for Monsoon power monitor sample packets

/// Size of the HVPM packet header (20 bytes: two f64 timestamps, i16 dropped count, flags, pad)
pub const HVPM_HEADER_SIZE: usize = 20;

/// Size of one HVPM measurement record (8 x u16 + 2 x u8)
pub const HVPM_MEASUREMENT_SIZE: usize = 18;

/// Number of fields in a decoded HVPM measurement
pub const HVPM_FIELD_COUNT: usize = 10;

/// Tuple position of the first voltage field in an HVPM measurement
pub const HVPM_VOLTAGE_BASE: usize = 6;

/// Tuple position the gain lookup counts down from
pub const HVPM_GAIN_BASE: usize = 9;

/// Gain bytes only carry a meaningful gain in their low nibble
pub const HVPM_GAIN_MASK: u8 = 0x0F;

/// Sample type bits inside the main gain byte (tuple position 9)
pub const HVPM_SAMPLE_TYPE_MASK: u8 = 0x30;

/// Size of the LVPM packet header (flags, packet type, 2 reserved bytes)
pub const LVPM_HEADER_SIZE: usize = 4;

/// Size of one LVPM measurement record (3 x i16 + 1 x u16)
pub const LVPM_MEASUREMENT_SIZE: usize = 8;

/// Number of fields in a decoded LVPM measurement
pub const LVPM_FIELD_COUNT: usize = 4;

/// Tuple position of the voltage field in an LVPM measurement
pub const LVPM_VOLTAGE_INDEX: usize = 3;

/// Every LVPM buffer ends in one byte of unknown meaning
pub const LVPM_TRAILER_SIZE: usize = 1;

/// The HVPM packet counter wraps at 16 (4 bits)
pub const HVPM_PACKET_COUNTER_MODULUS: u8 = 16;
