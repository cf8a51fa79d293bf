pub mod capture;
pub mod channel;
pub mod constants;
pub mod error;
pub mod hvpm;
pub mod lvpm;
pub mod sample;
pub mod tracker;
pub mod variant;


pub use capture::{Capture, CapturedPacket};
pub use channel::{Channel, Granularity, Reading};
pub use error::MonsoonError;
pub use hvpm::{HvpmMeasurement, HvpmPacket};
pub use lvpm::{LvpmField, LvpmMeasurement, LvpmPacket};
pub use sample::{Measurement, SamplePacket, SampleType};
pub use tracker::DropTracker;
pub use variant::{AnyPacket, HardwareVariant, PacketTiming, SampleRecord};
