//! Per-tick recorders: [`MotionTracker`] for head and controllers,
//! [`GazeTracker`] for the eye tracker.
//!
//! Trackers only read from the rig.  The session runner samples both once
//! per tick while a trial is running and hands the rows to the trial when it
//! ends.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use roomrecall_rig::{EyeTracker, GazeSample, InputSource, PoseSource};
use roomrecall_spatial::{Pose, Vec3};
use roomrecall_types::{ControllerState, ExperimentError};
use serde::{Deserialize, Serialize};

/// Column header of the tracker export.
pub const TRACKER_HEADER: [&str; 22] = [
    "time",
    "head_pos_x",
    "head_pos_y",
    "head_pos_z",
    "head_rot_x",
    "head_rot_y",
    "head_rot_z",
    "left_pos_x",
    "left_pos_y",
    "left_pos_z",
    "left_rot_x",
    "left_rot_y",
    "left_rot_z",
    "right_pos_x",
    "right_pos_y",
    "right_pos_z",
    "right_rot_x",
    "right_rot_y",
    "right_rot_z",
    "grab_force",
    "grab",
    "trigger",
];

/// Column header of the gaze export.
pub const GAZE_HEADER: [&str; 13] = [
    "time",
    "ori_x",
    "ori_y",
    "ori_z",
    "dir_x",
    "dir_y",
    "dir_z",
    "gaze_x",
    "gaze_y",
    "gaze_z",
    "gaze_object",
    "pupil_l",
    "pupil_r",
];

/// Written to the `gaze_*` columns while the participant is not fixating.
pub const MISSING_GAZE: f32 = -99999.0;

/// One sample.  Rotations are Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub time: f64,
    pub head_position: Vec3,
    pub head_euler: Vec3,
    pub left_position: Vec3,
    pub left_euler: Vec3,
    pub right_position: Vec3,
    pub right_euler: Vec3,
    pub controller: ControllerState,
}

impl MotionSample {
    fn record(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(TRACKER_HEADER.len());
        row.push(self.time.to_string());
        for v in [
            self.head_position,
            self.head_euler,
            self.left_position,
            self.left_euler,
            self.right_position,
            self.right_euler,
        ] {
            row.extend([v.x.to_string(), v.y.to_string(), v.z.to_string()]);
        }
        row.push(self.controller.squeeze.to_string());
        row.push(self.controller.grip_held.to_string());
        row.push(self.controller.trigger_held.to_string());
        row
    }
}

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    samples: Vec<MotionSample>,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample<R: PoseSource + InputSource + ?Sized>(&mut self, now: f64, rig: &R) {
        let (head, left, right): (Pose, Pose, Pose) =
            (rig.head(), rig.left_controller(), rig.right_controller());
        self.samples.push(MotionSample {
            time: now,
            head_position: head.position,
            head_euler: head.rotation.to_euler_degrees(),
            left_position: left.position,
            left_euler: left.rotation.to_euler_degrees(),
            right_position: right.position,
            right_euler: right.rotation.to_euler_degrees(),
            controller: rig.controller_state(),
        });
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Hand over the collected samples and start afresh.
    pub fn take(&mut self) -> Vec<MotionSample> {
        std::mem::take(&mut self.samples)
    }
}

/// A [`GazeSample`] stamped with the tick it was taken on.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeRecord {
    pub time: f64,
    pub sample: GazeSample,
}

impl GazeRecord {
    fn record(&self) -> Vec<String> {
        let s = &self.sample;
        let (point, object) = match &s.focus {
            Some(focus) => (focus.point, focus.object.clone().unwrap_or_default()),
            None => (
                Vec3::new(MISSING_GAZE, MISSING_GAZE, MISSING_GAZE),
                String::new(),
            ),
        };
        let mut row = Vec::with_capacity(GAZE_HEADER.len());
        row.push(self.time.to_string());
        for v in [s.origin, s.direction, point] {
            row.extend([v.x.to_string(), v.y.to_string(), v.z.to_string()]);
        }
        row.push(object);
        row.push(s.pupil_left_mm.to_string());
        row.push(s.pupil_right_mm.to_string());
        row
    }
}

#[derive(Debug, Clone, Default)]
pub struct GazeTracker {
    records: Vec<GazeRecord>,
}

impl GazeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample<R: EyeTracker + ?Sized>(&mut self, now: f64, rig: &R) {
        self.records.push(GazeRecord {
            time: now,
            sample: rig.gaze_sample(),
        });
    }

    pub fn records(&self) -> &[GazeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand over the collected records and start afresh.
    pub fn take(&mut self) -> Vec<GazeRecord> {
        std::mem::take(&mut self.records)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────

fn write_rows<W, I>(header: &[&str], rows: I, writer: W) -> Result<(), ExperimentError>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let io = |e: csv::Error| ExperimentError::Io {
        path: "<tracker>".to_string(),
        details: e.to_string(),
    };
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header).map_err(io)?;
    for row in rows {
        wtr.write_record(&row).map_err(io)?;
    }
    wtr.flush().map_err(|e| ExperimentError::Io {
        path: "<tracker>".to_string(),
        details: e.to_string(),
    })
}

fn create(path: &Path) -> Result<File, ExperimentError> {
    File::create(path).map_err(|e| ExperimentError::Io {
        path: path.display().to_string(),
        details: e.to_string(),
    })
}

/// Write `samples` as CSV with [`TRACKER_HEADER`].
///
/// # Errors
///
/// [`ExperimentError::Io`] on write failure.
pub fn write_motion_csv<W: Write>(samples: &[MotionSample], writer: W) -> Result<(), ExperimentError> {
    write_rows(&TRACKER_HEADER, samples.iter().map(MotionSample::record), writer)
}

/// [`write_motion_csv`] into a new file at `path`.
///
/// # Errors
///
/// [`ExperimentError::Io`] if the file cannot be created or written.
pub fn save_motion_csv(samples: &[MotionSample], path: &Path) -> Result<(), ExperimentError> {
    write_motion_csv(samples, create(path)?)
}

/// Write `records` as CSV with [`GAZE_HEADER`].  Rows without a fixation
/// carry [`MISSING_GAZE`] in the gaze point and an empty `gaze_object`.
///
/// # Errors
///
/// [`ExperimentError::Io`] on write failure.
pub fn write_gaze_csv<W: Write>(records: &[GazeRecord], writer: W) -> Result<(), ExperimentError> {
    write_rows(&GAZE_HEADER, records.iter().map(GazeRecord::record), writer)
}

/// [`write_gaze_csv`] into a new file at `path`.
///
/// # Errors
///
/// [`ExperimentError::Io`] if the file cannot be created or written.
pub fn save_gaze_csv(records: &[GazeRecord], path: &Path) -> Result<(), ExperimentError> {
    write_gaze_csv(records, create(path)?)
}
