//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use monsoon_lib::hvpm::{HvpmHeaderRaw, HvpmMeasurementRaw};
#[allow(unused_imports)]
pub use monsoon_lib::lvpm::{LvpmHeaderRaw, LvpmMeasurementRaw};
#[allow(unused_imports)]
pub use monsoon_lib::{
    Channel, Granularity, HvpmMeasurement, HvpmPacket, LvpmField, LvpmMeasurement, LvpmPacket, MonsoonError, Reading,
    SampleType,
};
#[allow(unused_imports)]
pub use zerocopy::IntoBytes;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// HVPM packet: start=1.0, elapsed=2.0, dropped=0, flags=0x05, two records.
///
/// Record 0: currents 0x0102..0x0b0c, Vmain=0x1234, Vusb=0x5678, usb gain 0xa3, main gain 0x12 (zero-cal)
/// Record 1: currents 1..6, Vmain=7, Vusb=8, usb gain 0x01, main gain 0x3f (ref-cal)
#[allow(dead_code)]
pub const HVPM_TWO_RECORDS: &str = "000000000000f03f0000000000000040000005000102030405060708090a0b0c12345678a31200010002000300040005000600070008013f";

/// LVPM zero-cal packet: flags=0x80, two records, trailing byte 0xaa.
///
/// Record 0: Main=-1, USB=2, Aux=-300, V=4000
/// Record 1: Main=10, USB=20, Aux=30, V=4001
#[allow(dead_code)]
pub const LVPM_ZERO_CAL_TWO_RECORDS: &str = "80010000ffff0002fed40fa0000a0014001e0fa1aa";

/// Build an HVPM packet buffer from a header and decoded record tuples
#[allow(dead_code)]
pub fn hvpm_buffer(header: HvpmHeaderRaw, records: &[[u16; 10]]) -> Vec<u8> {
    let mut buffer = header.as_bytes().to_vec();
    for values in records {
        buffer.extend_from_slice(HvpmMeasurementRaw::from_values(*values).unwrap().as_bytes());
    }
    buffer
}

/// Build an LVPM packet buffer, including the trailing byte
#[allow(dead_code)]
pub fn lvpm_buffer(flags: u8, sample_type: SampleType, records: &[(i16, i16, i16, u16)]) -> Vec<u8> {
    let mut buffer = LvpmHeaderRaw::new(flags, sample_type).as_bytes().to_vec();
    for &(main, usb, aux, voltage) in records {
        buffer.extend_from_slice(LvpmMeasurementRaw::new(main, usb, aux, voltage).as_bytes());
    }
    buffer.push(0xAA);
    buffer
}
