use anyhow::Result;
use clap::ValueEnum;
use monsoon_lib::{AnyPacket, HardwareVariant};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per measurement
    Table,
    /// One CSV row per measurement
    Csv,
    /// One JSON object per measurement
    Json,
}

/// Writes decoded measurements in the selected format.
pub enum RecordSink {
    Table(Box<dyn Write>),
    Csv(csv::Writer<Box<dyn Write>>),
    Json(Box<dyn Write>),
}

impl RecordSink {
    pub fn new(format: OutputFormat, writer: Box<dyn Write>, variant: HardwareVariant) -> Result<Self> {
        Ok(match format {
            OutputFormat::Table => RecordSink::Table(writer),
            OutputFormat::Json => RecordSink::Json(writer),
            OutputFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(writer);
                let mut header: Vec<String> = ["packet", "index", "sample_time", "sample_type", "granularity"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                header.extend((0..variant.field_count()).map(|i| format!("v{}", i)));
                wtr.write_record(&header)?;
                RecordSink::Csv(wtr)
            }
        })
    }

    pub fn write_packet(&mut self, packet_index: usize, packet: &AnyPacket) -> Result<()> {
        match self {
            RecordSink::Table(out) => match packet {
                AnyPacket::Hvpm(hvpm) => {
                    for (i, m) in hvpm.iter().enumerate() {
                        writeln!(out, "#{:<6} {:>3} {}", packet_index, i, m)?;
                    }
                }
                AnyPacket::Lvpm(lvpm) => {
                    for (i, m) in lvpm.iter().enumerate() {
                        writeln!(out, "#{:<6} {:>3} {}", packet_index, i, m)?;
                    }
                }
            },
            RecordSink::Csv(wtr) => {
                for record in packet.records() {
                    let mut row = vec![
                        packet_index.to_string(),
                        record.index.to_string(),
                        format!("{:.9}", record.sample_time),
                        record.sample_type.to_string(),
                        record.granularity.map(|g| g.to_string()).unwrap_or_default(),
                    ];
                    row.extend(record.values.iter().map(|v| v.to_string()));
                    wtr.write_record(&row)?;
                }
            }
            RecordSink::Json(out) => {
                for record in packet.records() {
                    let line = serde_json::json!({ "packet": packet_index, "record": record });
                    writeln!(out, "{}", line)?;
                }
            }
        }
        Ok(())
    }

    /// Push buffered rows through to the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        match self {
            RecordSink::Table(out) | RecordSink::Json(out) => out.flush()?,
            RecordSink::Csv(wtr) => wtr.flush()?,
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monsoon_lib::capture::parse_capture_line;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    const HVPM_LINE: &str = "000000000000f03f0000000000000040000005000102030405060708090a0b0c12345678a31200010002000300040005000600070008013f";

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.borrow().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn hvpm_packet() -> AnyPacket {
        parse_capture_line(HardwareVariant::Hvpm, 1, HVPM_LINE)
            .unwrap()
            .unwrap()
            .decode(HardwareVariant::Hvpm)
            .unwrap()
    }

    #[test]
    fn test_csv_rows_reach_writer_on_flush() {
        let buffer = SharedBuffer::default();
        let mut sink = RecordSink::new(OutputFormat::Csv, Box::new(buffer.clone()), HardwareVariant::Hvpm).unwrap();

        sink.write_packet(0, &hvpm_packet()).unwrap();
        assert!(buffer.lines().is_empty());

        sink.flush().unwrap();
        let lines = buffer.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("packet,index,sample_time,sample_type,granularity,v0,"));
        assert!(lines[1].starts_with("0,0,2.000000000,zero-cal,,"));
        assert!(lines[2].starts_with("0,1,3.000000000,ref-cal,,"));

        sink.write_packet(1, &hvpm_packet()).unwrap();
        sink.flush().unwrap();
        assert_eq!(buffer.lines().len(), 5);
    }

    #[test]
    fn test_json_lines_reach_writer_on_flush() {
        let buffer = SharedBuffer::default();
        let mut sink = RecordSink::new(OutputFormat::Json, Box::new(buffer.clone()), HardwareVariant::Hvpm).unwrap();

        sink.write_packet(0, &hvpm_packet()).unwrap();
        sink.flush().unwrap();
        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["packet"], 0);
        assert_eq!(first["record"]["sample_type"], "ZeroCal");
    }
}
