//! What the participant sees and hears, besides the scene itself.

use roomrecall_spatial::{Pose, Vec3};
use roomrecall_types::{Cue, Rgba};

/// Screen fades, auditory cues, the instruction board and the standing
/// marker on the floor.
pub trait Presentation: Send {
    /// Start fading the view towards `color` over `duration` seconds.
    ///
    /// Returns immediately; callers wait out the duration themselves.
    fn fade_to(&mut self, color: Rgba, duration: f32);

    fn play_cue(&mut self, cue: Cue);

    /// Show the instruction board with `text`; `\n` starts a new line.
    fn show_instruction(&mut self, text: &str);

    fn hide_instruction(&mut self);

    /// Place the "stand here" marker at `position` facing `yaw_deg`.
    fn show_standing_marker(&mut self, position: Vec3, yaw_deg: f32);

    fn hide_standing_marker(&mut self);
}

/// The cube-mask occluder shown between preview and response.
pub trait Occluder: Send {
    /// Re-roll the occluder's appearance.
    fn randomize_occluder(&mut self);

    fn set_occluder_visible(&mut self, visible: bool);
}

/// Pointer devices attached to the response controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Ray-cast laser; the endpoint is where the ray hits.
    Laser,
    /// Short rigid stick; the endpoint is at a fixed offset from the hand.
    Stick,
}

pub trait PointerDevices: Send {
    fn set_pointer_visible(&mut self, kind: PointerKind, visible: bool);

    /// Current pose of the pointer's cursor endpoint.
    fn pointer_endpoint(&self, kind: PointerKind) -> Pose;
}

/// Where the participant is fixating, if anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeFocus {
    /// World-space hit point of the combined gaze ray.
    pub point: Vec3,
    /// Name of the object hit, when the host resolves it.
    pub object: Option<String>,
}

/// One reading of the eye tracker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GazeSample {
    /// Origin of the combined gaze ray.
    pub origin: Vec3,
    /// Unit direction of the combined gaze ray.
    pub direction: Vec3,
    /// `None` while the participant is not fixating anything in range.
    pub focus: Option<GazeFocus>,
    pub pupil_left_mm: f32,
    pub pupil_right_mm: f32,
}

pub trait EyeTracker: Send {
    /// Launch the vendor calibration routine.
    fn launch_calibration(&mut self);

    /// Current combined gaze ray, fixation and pupil sizes.
    fn gaze_sample(&self) -> GazeSample;
}
