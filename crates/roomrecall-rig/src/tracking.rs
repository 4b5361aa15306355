//! Tracked poses and controller input.

use roomrecall_spatial::Pose;
use roomrecall_types::{ControllerState, InputEdges};

/// Head and hand poses, sampled at the current frame.
pub trait PoseSource: Send {
    fn head(&self) -> Pose;
    fn left_controller(&self) -> Pose;
    fn right_controller(&self) -> Pose;
}

/// Controller buttons.
pub trait InputSource: Send {
    /// Drain the button-down edges seen since the previous poll.
    ///
    /// Call at most once per scheduling tick: an edge is reported exactly
    /// once.
    fn poll_edges(&mut self) -> InputEdges;

    /// Continuous state of the response controller.
    fn controller_state(&self) -> ControllerState;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedInput {
        pending: Vec<InputEdges>,
    }

    impl InputSource for ScriptedInput {
        fn poll_edges(&mut self) -> InputEdges {
            if self.pending.is_empty() {
                InputEdges::default()
            } else {
                self.pending.remove(0)
            }
        }

        fn controller_state(&self) -> ControllerState {
            ControllerState::default()
        }
    }

    #[test]
    fn scripted_input_reports_each_edge_once() {
        let mut input = ScriptedInput {
            pending: vec![InputEdges {
                confirm: true,
                grip: false,
            }],
        };
        assert!(input.poll_edges().confirm);
        assert!(!input.poll_edges().confirm);
    }
}
