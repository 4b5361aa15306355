//! [`StartGate`] – holds a trial until the participant is in position.
//!
//! The participant walks to the standing marker and presses the trigger.  On
//! that press the gate measures how far the head is from the marker (on the
//! floor plane) and how far the view is turned away from the required
//! heading.  If either is at or beyond its limit the press is rejected, the
//! optional error cue plays and further presses are ignored for
//! [`MISALIGNMENT_COOLDOWN`] seconds.
//!
//! ```text
//!            confirm, aligned
//!  Waiting ─────────────────────▶ Satisfied
//!    ▲   │ confirm, misaligned
//!    │   ▼
//!   Cooldown (0.6 s)
//! ```

use roomrecall_rig::{PoseSource, Presentation};
use roomrecall_spatial::{Pose, Vec3, delta_angle};
use roomrecall_types::Cue;
use tracing::{debug, info};

/// Seconds during which confirms are ignored after a rejected one.
pub const MISALIGNMENT_COOLDOWN: f64 = 0.6;

/// Where and how the participant must stand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartRequirement {
    /// Standing point; only x and z are compared.
    pub position: Vec3,
    /// Required heading in degrees.
    pub yaw_deg: f32,
    /// Planar distance limit in metres (exclusive).
    pub max_distance: f32,
    /// Heading error limit in degrees (exclusive).
    pub max_angle: f32,
    /// Play [`Cue::Error`] on a rejected confirm.
    pub error_cue: bool,
}

/// Measured offset of the head from the requirement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub distance: f32,
    pub angle: f32,
}

impl StartRequirement {
    pub fn measure(&self, head: &Pose) -> Alignment {
        Alignment {
            distance: self.position.planar_distance(head.position),
            angle: delta_angle(self.yaw_deg, head.yaw_degrees()).abs(),
        }
    }

    /// `true` when both offsets are strictly inside their limits.
    pub fn accepts(&self, alignment: Alignment) -> bool {
        alignment.distance < self.max_distance && alignment.angle < self.max_angle
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateState {
    Waiting,
    /// Confirms are ignored until `until`.
    Cooldown { until: f64 },
    Satisfied,
}

#[derive(Debug, Clone)]
pub struct StartGate {
    requirement: StartRequirement,
    state: GateState,
    rejections: usize,
}

impl StartGate {
    pub fn new(requirement: StartRequirement) -> Self {
        Self {
            requirement,
            state: GateState::Waiting,
            rejections: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn requirement(&self) -> &StartRequirement {
        &self.requirement
    }

    /// Number of confirms rejected so far.
    pub fn rejections(&self) -> usize {
        self.rejections
    }

    /// Advance the gate by one tick.
    ///
    /// `confirm` is this tick's trigger edge.  Returns `true` once the gate
    /// is satisfied.
    pub fn poll<R: PoseSource + Presentation + ?Sized>(
        &mut self,
        now: f64,
        confirm: bool,
        rig: &mut R,
    ) -> bool {
        if let GateState::Cooldown { until } = self.state {
            if now < until {
                return false;
            }
            self.state = GateState::Waiting;
        }

        match self.state {
            GateState::Satisfied => true,
            GateState::Waiting if confirm => {
                let alignment = self.requirement.measure(&rig.head());
                if self.requirement.accepts(alignment) {
                    info!(
                        distance = alignment.distance,
                        angle = alignment.angle,
                        "start position reached"
                    );
                    self.state = GateState::Satisfied;
                    true
                } else {
                    debug!(
                        distance = alignment.distance,
                        angle = alignment.angle,
                        "start position rejected"
                    );
                    if self.requirement.error_cue {
                        rig.play_cue(Cue::Error);
                    }
                    self.rejections += 1;
                    self.state = GateState::Cooldown {
                        until: now + MISALIGNMENT_COOLDOWN,
                    };
                    false
                }
            }
            _ => false,
        }
    }
}
