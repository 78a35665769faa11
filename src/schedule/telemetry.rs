use crate::error::Result;
use nalgebra::Vector3;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One telemetry sample of the tracked rigid body.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub time: f32,
    /// Tracked component of the body's linear velocity.
    pub velocity: f32,
    /// Net force applied by the fluid on the body, if recorded.
    pub force: Option<Vector3<f32>>,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.velocity)?;
        if let Some(force) = &self.force {
            write!(f, " {} {} {}", force.x, force.y, force.z)?;
        }
        Ok(())
    }
}

/// Append-only text log of telemetry records, one line per record.
///
/// Write failures never interrupt the simulation: they are logged and the sample is dropped.
pub struct TelemetrySink {
    out: Box<dyn Write>,
    with_force: bool,
    written: usize,
    dropped: usize,
}

impl TelemetrySink {
    /// Creates (or truncates) the file at `path` and writes the header line.
    pub fn create(path: impl AsRef<Path>, with_force: bool) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::info!("writing telemetry to {}", path.as_ref().display());
        Self::new(BufWriter::new(file), with_force)
    }

    /// Wraps an arbitrary writer and writes the header line.
    pub fn new(out: impl Write + 'static, with_force: bool) -> Result<Self> {
        let mut out: Box<dyn Write> = Box::new(out);
        out.write_all(format!("{}\n", Self::header(with_force)).as_bytes())?;
        Ok(Self {
            out,
            with_force,
            written: 0,
            dropped: 0,
        })
    }

    pub fn header(with_force: bool) -> &'static str {
        if with_force {
            "time(s) linearVelocity(m/s) forceX(N) forceY(N) forceZ(N)"
        } else {
            "time(s) linearVelocity(m/s)"
        }
    }

    pub fn records_force(&self) -> bool {
        self.with_force
    }

    /// Appends one line. Returns `false` if the record could not be written.
    pub fn append(&mut self, record: &TelemetryRecord) -> bool {
        match self.out.write_all(format!("{record}\n").as_bytes()) {
            Ok(()) => {
                self.written += 1;
                true
            }
            Err(e) => {
                self.dropped += 1;
                log::warn!("dropped telemetry sample at t = {}: {e}", record.time);
                false
            }
        }
    }

    /// Number of records successfully written.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of records lost to write failures.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            log::warn!("failed to flush telemetry: {e}");
        }
    }
}

impl Drop for TelemetrySink {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;
    use std::io;

    /// Accepts `budget` writes, then fails.
    struct FlakyWriter {
        budget: usize,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.budget -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn record_formatting() {
        let r = TelemetryRecord {
            time: 15.5,
            velocity: -0.25,
            force: Some(vector![0.0, 1.0, 2.5]),
        };
        assert_eq!(r.to_string(), "15.5 -0.25 0 1 2.5");

        let r = TelemetryRecord {
            time: 15.5,
            velocity: -0.25,
            force: None,
        };
        assert_eq!(r.to_string(), "15.5 -0.25");
    }

    #[test]
    fn file_sink_writes_header_and_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("telemetry.txt");
        let mut sink = TelemetrySink::create(&path, true)?;
        assert!(sink.append(&TelemetryRecord {
            time: 15.0001,
            velocity: -0.5,
            force: Some(vector![0.0, 0.0, 3.0]),
        }));
        sink.flush();
        drop(sink);

        let content = std::fs::read_to_string(&path)?;
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], TelemetrySink::header(true));
        assert_eq!(lines[1].split_whitespace().count(), 5);
        assert!(content.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn write_failures_are_counted_not_raised() -> Result<()> {
        // Room for the header only.
        let mut sink = TelemetrySink::new(FlakyWriter { budget: 1 }, false)?;
        let record = TelemetryRecord {
            time: 1.0,
            velocity: 0.0,
            force: None,
        };
        assert!(!sink.append(&record));
        assert!(!sink.append(&record));
        assert_eq!(sink.written(), 0);
        assert_eq!(sink.dropped(), 2);
        Ok(())
    }
}
