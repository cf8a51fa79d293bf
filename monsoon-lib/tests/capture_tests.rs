//! Tests for capture files, variant dispatch and drop tracking

mod common;

use common::*;
use monsoon_lib::capture::parse_capture_line;
use monsoon_lib::{AnyPacket, Capture, CapturedPacket, DropTracker, HardwareVariant, Measurement, PacketTiming};
use std::io::Cursor;

#[test]
fn test_capture_loads_hvpm_lines() {
    let text = format!("# HVPM\n\n{}\n   \n# trailing comment\n{}\n", HVPM_TWO_RECORDS, HVPM_TWO_RECORDS);
    let capture = Capture::from_reader(HardwareVariant::Hvpm, Cursor::new(text)).expect("Failed to load capture");

    assert_eq!(capture.len(), 2);
    assert_eq!(capture.packets()[0].line, 3);
    assert_eq!(capture.packets()[1].line, 6);

    let packets: Vec<AnyPacket> = capture.decode().collect::<Result<_, _>>().unwrap();
    assert_eq!(packets.len(), 2);
    assert!(packets.iter().all(|p| p.variant() == HardwareVariant::Hvpm));
    assert_eq!(packets[0].len(), 2);
    assert_eq!(packets[0].time_since_start(), 1.0);
}

#[test]
fn test_capture_loads_lvpm_lines_with_timing() {
    let text = format!("0.5 0.25 {}\n", LVPM_ZERO_CAL_TWO_RECORDS);
    let capture = Capture::from_reader(HardwareVariant::Lvpm, Cursor::new(text)).unwrap();

    assert_eq!(capture.packets()[0].timing, PacketTiming::new(0.5, 0.25));
    let packet = capture.decode().next().unwrap().unwrap();
    match packet {
        AnyPacket::Lvpm(lvpm) => {
            assert_eq!(lvpm.time_since_start(), 0.5);
            assert_eq!(lvpm[0].sample_time(), 0.625);
            assert_eq!(lvpm[1].sample_time(), 0.75);
        }
        other => panic!("Expected LVPM packet, got {:?}", other),
    }
}

#[test]
fn test_capture_line_errors() {
    let cases = [
        (HardwareVariant::Hvpm, "zz", "invalid hex"),
        (HardwareVariant::Hvpm, "abc", "invalid hex"),
        (HardwareVariant::Hvpm, "00 11", "expected 1 field"),
        (HardwareVariant::Lvpm, "0001000000", "expected 3 fields"),
        (HardwareVariant::Lvpm, "soon 1.0 0001000000", "invalid time_since_start"),
    ];

    for (variant, line, expected) in cases {
        match parse_capture_line(variant, 7, line) {
            Err(MonsoonError::ParseError { line: line_no, message }) => {
                assert_eq!(line_no, 7);
                assert!(message.contains(expected), "{:?}: got message {:?}", line, message);
            }
            other => panic!("{:?}: expected ParseError, got {:?}", line, other),
        }
    }
}

#[test]
fn test_capture_write_then_read() {
    let mut capture = Capture::new(HardwareVariant::Lvpm);
    capture.add(CapturedPacket::new(
        hex_to_bytes(LVPM_ZERO_CAL_TWO_RECORDS),
        PacketTiming::new(2.5, 0.125),
    ));

    let mut out = Vec::new();
    capture.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("# LVPM\n"));

    let reloaded = Capture::from_reader(HardwareVariant::Lvpm, Cursor::new(text)).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.packets()[0].timing, PacketTiming::new(2.5, 0.125));
    assert_eq!(reloaded.packets()[0].raw_bytes, capture.packets()[0].raw_bytes);
}

#[test]
fn test_capture_decode_reports_malformed_packet() {
    let mut truncated = HVPM_TWO_RECORDS.to_string();
    truncated.truncate(truncated.len() - 4);
    let capture = Capture::from_reader(HardwareVariant::Hvpm, Cursor::new(truncated)).unwrap();

    let result = capture.decode().next().unwrap();
    assert!(matches!(
        result,
        Err(MonsoonError::PartialRecord {
            record_size: 18,
            remainder: 16
        })
    ));
}

#[test]
fn test_any_packet_records() {
    let packet = AnyPacket::decode(
        HardwareVariant::Hvpm,
        hex_to_bytes(HVPM_TWO_RECORDS),
        PacketTiming::default(),
    )
    .unwrap();

    let records = packet.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].index, 0);
    assert_eq!(records[0].sample_time, 2.0);
    assert_eq!(records[0].sample_type, SampleType::ZeroCal);
    assert_eq!(records[0].granularity, None);
    assert_eq!(records[0].values.len(), 10);
    assert_eq!(records[1].values[9], 0x3f);

    let lvpm = AnyPacket::decode(
        HardwareVariant::Lvpm,
        hex_to_bytes(LVPM_ZERO_CAL_TWO_RECORDS),
        PacketTiming::new(0.0, 1.0),
    )
    .unwrap();
    let records = lvpm.records();
    assert_eq!(records[0].values, vec![-1, 2, -300, 4000]);
    assert_eq!(records[0].granularity, Some(Granularity::Fine));
    assert_eq!(records[1].granularity, Some(Granularity::Coarse));
}

#[test]
fn test_measurement_fields_match_values() {
    let hvpm = HvpmPacket::new(hex_to_bytes(HVPM_TWO_RECORDS)).unwrap();
    for m in &hvpm {
        let fields = Measurement::fields(m);
        let expected: Vec<i32> = m.values().iter().map(|&v| v as i32).collect();
        assert_eq!(fields, expected);
        for (i, field) in fields.iter().enumerate() {
            assert_eq!(m.field(i).unwrap(), *field);
        }
    }

    let lvpm = LvpmPacket::new(hex_to_bytes(LVPM_ZERO_CAL_TWO_RECORDS), 0.0, 1.0).unwrap();
    assert_eq!(lvpm[1].fields(), vec![10, 20, 30, 4001]);
    assert_eq!(lvpm[1].fields().len(), <LvpmMeasurement as Measurement>::FIELD_COUNT);
}

#[cfg(feature = "serde")]
#[test]
fn test_sample_record_serializes_to_json() {
    let packet = AnyPacket::decode(
        HardwareVariant::Lvpm,
        hex_to_bytes(LVPM_ZERO_CAL_TWO_RECORDS),
        PacketTiming::new(0.0, 1.0),
    )
    .unwrap();
    let records = packet.records();

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["index"], 0);
    assert_eq!(json["sample_time"], 0.5);
    assert_eq!(json["sample_type"], "ZeroCal");
    assert_eq!(json["granularity"], "Fine");
    assert_eq!(json["values"], serde_json::json!([-1, 2, -300, 4000]));

    let back: monsoon_lib::SampleRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, records[0]);

    let hvpm = AnyPacket::decode(HardwareVariant::Hvpm, hex_to_bytes(HVPM_TWO_RECORDS), PacketTiming::default()).unwrap();
    let json = serde_json::to_value(&hvpm.records()[1]).unwrap();
    assert_eq!(json["sample_type"], "RefCal");
    assert!(json["granularity"].is_null());
    assert_eq!(json["values"].as_array().unwrap().len(), 10);
}

#[test]
fn test_drop_tracker_counts_counter_gaps() {
    let mut tracker = DropTracker::new();
    let counters = [14u8, 15, 0, 3, 4];
    let mut missed = Vec::new();

    for (i, counter) in counters.iter().enumerate() {
        let dropped = if i == 4 { 2 } else { 0 };
        let buffer = hvpm_buffer(HvpmHeaderRaw::new(i as f64, 1.0, dropped, *counter), &[[0; 10]]);
        let packet = HvpmPacket::new(buffer).unwrap();
        missed.push(tracker.observe(&AnyPacket::Hvpm(packet)));
    }

    assert_eq!(missed, vec![0, 0, 0, 2, 0]);
    assert_eq!(tracker.packets(), 5);
    assert_eq!(tracker.measurements(), 5);
    assert_eq!(tracker.missed_packets(), 2);
    assert_eq!(tracker.reported_dropped(), 2);
    assert!(tracker.has_gaps());
}

#[test]
fn test_drop_tracker_lvpm_never_gaps() {
    let mut tracker = DropTracker::new();
    for _ in 0..3 {
        let packet = LvpmPacket::new(hex_to_bytes(LVPM_ZERO_CAL_TWO_RECORDS), 0.0, 1.0).unwrap();
        assert_eq!(tracker.observe_lvpm(&packet), 0);
    }
    assert_eq!(tracker.measurements(), 6);
    assert!(!tracker.has_gaps());
}
