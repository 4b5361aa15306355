//! Trial results schema and error computation.
//!
//! Every trial records the same set of columns ([`RESULT_COLUMNS`]); fields
//! that do not apply (no target, non-placement response) are simply absent.
//!
//! Positional errors are `response − target` per axis plus the Euclidean
//! distance.  The angular error is the shortest rotation between the two
//! orientations.  The per-axis Euler errors are plain component differences
//! of the `[0, 360)` Euler angles and are not wrap-safe: a target at 359°
//! and a response at 1° differ by -358°, not 2°.

use roomrecall_spatial::{Pose, Vec3};
use roomrecall_types::TrialResults;

use crate::response::ResponseRecord;
use crate::target::Target;

/// Result columns in export order.
pub const RESULT_COLUMNS: &[&str] = &[
    "t_starting_pos",
    "standing_y_rotation",
    "target_label",
    "target_pos_x",
    "target_pos_y",
    "target_pos_z",
    "target_euler_x",
    "target_euler_y",
    "target_euler_z",
    "target_bbox_center_x",
    "target_bbox_center_y",
    "target_bbox_center_z",
    "target_bbox_size_x",
    "target_bbox_size_y",
    "target_bbox_size_z",
    "t_scene_preview_start",
    "t_scene_preview_end",
    "t_response_start",
    "response_pos_x_pivot",
    "response_pos_y_pivot",
    "response_pos_z_pivot",
    "response_euler_x",
    "response_euler_y",
    "response_euler_z",
    "tar_error_pos",
    "tar_error_pos_x",
    "tar_error_pos_y",
    "tar_error_pos_z",
    "response_bbox_center_x",
    "response_bbox_center_y",
    "response_bbox_center_z",
    "tar_error_bbox",
    "tar_error_bbox_x",
    "tar_error_bbox_y",
    "tar_error_bbox_z",
    "tar_error_angle",
    "tar_error_euler_x",
    "tar_error_euler_y",
    "tar_error_euler_z",
    "standing_pos_x",
    "standing_pos_y",
    "standing_pos_z",
    "t_response_end",
];

fn record_vec(results: &mut TrialResults, prefix: &str, suffix: &str, v: Vec3) {
    results.record(format!("{prefix}_x{suffix}"), v.x);
    results.record(format!("{prefix}_y{suffix}"), v.y);
    results.record(format!("{prefix}_z{suffix}"), v.z);
}

/// Target label, pose and extent.
pub fn record_target(results: &mut TrialResults, target: &Target) {
    results.record("target_label", target.label.as_str());
    record_vec(results, "target_pos", "", target.pose.position);
    record_vec(results, "target_euler", "", target.pose.rotation.to_euler_degrees());
    record_vec(results, "target_bbox_center", "", target.bounds.center());
    record_vec(results, "target_bbox_size", "", target.bounds.size());
}

/// Cursor pivot position and orientation.
pub fn record_response(results: &mut TrialResults, response: &ResponseRecord) {
    record_vec(results, "response_pos", "_pivot", response.pose.position);
    record_vec(results, "response_euler", "", response.pose.rotation.to_euler_degrees());
}

/// Where the participant stood when confirming.
pub fn record_standing(results: &mut TrialResults, head: &Pose) {
    record_vec(results, "standing_pos", "", head.position);
}

/// Bounding-box error of a placement response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsError {
    pub response_center: Vec3,
    /// `response centre − target centre`.
    pub offset: Vec3,
    pub distance: f32,
}

/// Target-vs-response errors of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    /// `response − target` pivot positions.
    pub offset: Vec3,
    pub distance: f32,
    pub bounds: Option<BoundsError>,
    /// Shortest rotation between target and response, in degrees.
    pub angle: f32,
    /// Raw Euler component differences, in degrees.
    pub euler: Vec3,
}

impl ErrorMetrics {
    /// Compare a response against the target.  Bounds errors are computed
    /// only when the response carries bounds.
    pub fn compute(target: &Target, response: &ResponseRecord) -> Self {
        let offset = response.pose.position.sub(target.pose.position);
        let bounds = response.bounds.map(|rb| {
            let response_center = rb.center();
            let target_center = target.bounds.center();
            BoundsError {
                response_center,
                offset: response_center.sub(target_center),
                distance: target_center.distance(response_center),
            }
        });
        let target_euler = target.pose.rotation.to_euler_degrees();
        let response_euler = response.pose.rotation.to_euler_degrees();
        Self {
            offset,
            distance: target.pose.position.distance(response.pose.position),
            bounds,
            angle: target.pose.rotation.angle_degrees(response.pose.rotation),
            euler: response_euler.sub(target_euler),
        }
    }

    pub fn record(&self, results: &mut TrialResults) {
        results.record("tar_error_pos", self.distance);
        record_vec(results, "tar_error_pos", "", self.offset);
        if let Some(b) = &self.bounds {
            record_vec(results, "response_bbox_center", "", b.response_center);
            results.record("tar_error_bbox", b.distance);
            record_vec(results, "tar_error_bbox", "", b.offset);
        }
        results.record("tar_error_angle", self.angle);
        record_vec(results, "tar_error_euler", "", self.euler);
    }
}
