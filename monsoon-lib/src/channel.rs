use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the three power rails a Monsoon monitor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Channel {
    #[strum(to_string = "Main")]
    Main = 0,
    #[strum(to_string = "USB")]
    Usb = 1,
    #[strum(to_string = "Aux")]
    Aux = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Main, Channel::Usb, Channel::Aux];

    /// Position of this channel in the per-record field tables
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Resolution of an ADC current reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Granularity {
    #[strum(to_string = "coarse")]
    Coarse = 0,
    #[strum(to_string = "fine")]
    Fine = 1,
}

impl Granularity {
    /// Calibration records alternate fine/coarse, starting with fine.
    pub fn from_calibration_index(entry_index: usize) -> Self {
        if entry_index % 2 == 0 {
            Granularity::Fine
        } else {
            Granularity::Coarse
        }
    }
}

/// What kind of value to read for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Reading {
    Voltage,
    Gain,
    Current(Granularity),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Voltage => write!(f, "voltage"),
            Reading::Gain => write!(f, "gain"),
            Reading::Current(granularity) => write!(f, "{} current", granularity),
        }
    }
}

impl From<Granularity> for Reading {
    fn from(granularity: Granularity) -> Self {
        Reading::Current(granularity)
    }
}
