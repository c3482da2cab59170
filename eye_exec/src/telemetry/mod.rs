//! # Telemetry Recorder
//!
//! Records fixed-rate samples of the reference eye during a profiled move. Only the most recent
//! move is kept, starting a new recording discards the previous one.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod analytics;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use eye_if::eqpt::AxisId;
use util::archive::{ArchiveError, Archiver};

pub use analytics::MotionStats;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Header of exported telemetry files.
pub const CSV_HEADER: &str = "time,pan_abs,tilt_abs,pan_rel,tilt_rel,pan_vel,tilt_vel";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single telemetry sample of the reference eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Time since the start of the move.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Units: degrees
    pub pan_abs: f64,

    /// Units: degrees
    pub tilt_abs: f64,

    /// Units: degrees
    pub pan_rel: f64,

    /// Units: degrees
    pub tilt_rel: f64,
}

/// A row of an exported telemetry file. Field names are the CSV columns.
#[derive(Debug, Serialize)]
struct ExportRow {
    time: f64,
    pan_abs: f64,
    tilt_abs: f64,
    pan_rel: f64,
    tilt_rel: f64,

    /// Smoothed velocity estimate, see [`analytics::smoothed_velocity`]
    pan_vel: f64,
    tilt_vel: f64,
}

/// Recorder holding the samples of the most recent profiled move.
#[derive(Debug, Default)]
pub struct Recorder {
    samples: Vec<TelemetrySample>,

    complete: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the previous recording and start a new one.
    pub fn start(&mut self) {
        self.samples.clear();
        self.complete = false;
    }

    /// Record a sample.
    ///
    /// ## Arguments
    /// - `time_s` - time since the start of the move
    /// - `abs_deg` - absolute `(pan, tilt)` of the reference eye
    /// - `rel_deg` - relative `(pan, tilt)` of the reference eye
    pub fn record(&mut self, time_s: f64, abs_deg: (f64, f64), rel_deg: (f64, f64)) {
        self.samples.push(TelemetrySample {
            time_s,
            pan_abs: abs_deg.0,
            tilt_abs: abs_deg.1,
            pan_rel: rel_deg.0,
            tilt_rel: rel_deg.1,
        });
    }

    /// Mark the recording as complete. A recording which is never completed was aborted.
    pub fn finish(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Analytics of the current recording.
    pub fn stats(&self, trim_fraction: f64) -> MotionStats {
        analytics::stats(&self.samples, trim_fraction)
    }

    /// Write the recording to `file_name` in the archive root, returning the number of rows
    /// written.
    ///
    /// Velocity columns are estimated from the recorded positions when exporting.
    pub fn export_csv<P: AsRef<Path>>(
        &self,
        arch_root: &Path,
        file_name: P,
    ) -> Result<usize, ArchiveError> {
        let mut arch = Archiver::from_path(arch_root, file_name)?;

        let pan_vel = analytics::smoothed_velocity(&self.samples, AxisId::Pan);
        let tilt_vel = analytics::smoothed_velocity(&self.samples, AxisId::Tilt);

        for (i, s) in self.samples.iter().enumerate() {
            arch.serialise(ExportRow {
                time: s.time_s,
                pan_abs: s.pan_abs,
                tilt_abs: s.tilt_abs,
                pan_rel: s.pan_rel,
                tilt_rel: s.tilt_rel,
                pan_vel: pan_vel.get(i).copied().unwrap_or(0.0),
                tilt_vel: tilt_vel.get(i).copied().unwrap_or(0.0),
            })?;
        }
        arch.flush()?;

        debug!(
            "Exported {} telemetry samples to {:?}",
            self.samples.len(),
            arch.path()
        );

        Ok(self.samples.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_start_discards_previous() {
        let mut rec = Recorder::new();
        rec.start();
        rec.record(0.0, (90.0, 90.0), (0.0, 0.0));
        rec.finish();
        assert!(rec.is_complete());

        rec.start();
        assert!(rec.is_empty());
        assert!(!rec.is_complete());
    }

    #[test]
    fn test_export_csv() {
        let mut rec = Recorder::new();
        rec.start();
        for k in 0..6 {
            let pan = 90.0 + k as f64;
            rec.record(k as f64 * 0.01, (pan, 93.0), (pan - 90.0, 0.0));
        }

        let root = std::env::temp_dir().join("eye_exec_telemetry_test");
        assert_eq!(rec.export_csv(&root, "profile.csv").unwrap(), 6);

        let text = std::fs::read_to_string(root.join("profile.csv")).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));

        let rows: Vec<Vec<f64>> = lines
            .map(|l| l.split(',').map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(&rows[0][..5], &[0.0, 90.0, 93.0, 0.0, 0.0]);

        // Velocities come from the 5 sample smoothed positions, where the shrinking windows at
        // the ends of the series distort the otherwise constant 100 deg/s
        let smoothed = analytics::smoothed_velocity(rec.samples(), AxisId::Pan);
        let expected = [50.0, 50.0, 75.0, 75.0, 50.0, 50.0];
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row[5], smoothed[i]);
            assert!((row[5] - expected[i]).abs() < 1e-6, "row {}: {}", i, row[5]);
            assert_eq!(row[6], 0.0);
        }

        std::fs::remove_dir_all(&root).ok();
    }
}
