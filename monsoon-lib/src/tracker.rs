use crate::constants::HVPM_PACKET_COUNTER_MODULUS;
use crate::hvpm::HvpmPacket;
use crate::lvpm::LvpmPacket;
use crate::variant::AnyPacket;
use tracing::warn;

/// Tracks packet loss across a stream of decoded packets.
///
/// HVPM headers carry a 4-bit rolling counter and a device-side dropped
/// count. A gap in the counter means packets were lost between the device
/// and the reader; a gap of exactly 16 packets cannot be detected.
#[derive(Debug, Clone, Default)]
pub struct DropTracker {
    last_counter: Option<u8>,
    packets: u64,
    measurements: u64,
    missed_packets: u64,
    reported_dropped: i64,
}

impl DropTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an HVPM packet, returning how many packets went missing before it
    pub fn observe_hvpm(&mut self, packet: &HvpmPacket) -> u8 {
        let counter = packet.packet_counter();
        let missed = match self.last_counter {
            Some(last) => {
                let expected = (last + 1) % HVPM_PACKET_COUNTER_MODULUS;
                (counter + HVPM_PACKET_COUNTER_MODULUS - expected) % HVPM_PACKET_COUNTER_MODULUS
            }
            None => 0,
        };
        if missed > 0 {
            warn!(counter, missed, "Packet counter gap");
        }

        let dropped = packet.dropped_count();
        if dropped != 0 {
            warn!(dropped, "Device reported dropped samples");
        }

        self.last_counter = Some(counter);
        self.packets += 1;
        self.measurements += packet.len() as u64;
        self.missed_packets += missed as u64;
        self.reported_dropped += dropped as i64;
        missed
    }

    /// Record an LVPM packet. LVPM has no documented counter, so nothing can be missed.
    pub fn observe_lvpm(&mut self, packet: &LvpmPacket) -> u8 {
        self.packets += 1;
        self.measurements += packet.len() as u64;
        0
    }

    pub fn observe(&mut self, packet: &AnyPacket) -> u8 {
        match packet {
            AnyPacket::Hvpm(packet) => self.observe_hvpm(packet),
            AnyPacket::Lvpm(packet) => self.observe_lvpm(packet),
        }
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn measurements(&self) -> u64 {
        self.measurements
    }

    /// Packets inferred lost from counter gaps
    pub fn missed_packets(&self) -> u64 {
        self.missed_packets
    }

    /// Sum of the dropped counts reported in packet headers
    pub fn reported_dropped(&self) -> i64 {
        self.reported_dropped
    }

    pub fn has_gaps(&self) -> bool {
        self.missed_packets > 0 || self.reported_dropped != 0
    }
}
