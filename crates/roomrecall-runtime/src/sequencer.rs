//! [`TrialSequencer`] – runs one trial from the start gate to teardown.
//!
//! A trial is a fixed sequence of steps.  Each step does its work and then
//! names what it waits for before the next step may run:
//!
//! ```text
//! StartPosition ─▶ FadeOut ─▶ SceneTransition ─▶ ArrangementSetup
//!   ─▶ TargetResolution ─▶ Preview ─▶ Concealment ─▶ ObjectShift
//!   ─▶ ResponseSetup ─▶ AwaitGrip ─▶ AwaitConfirm ─▶ RecordResponse
//!   ─▶ ErrorComputation ─▶ Cleanup ─▶ Restore
//! ```
//!
//! The sequencer never blocks.  The owner calls [`tick`][TrialSequencer::tick]
//! once per frame with the current time and the input edges of that frame;
//! the sequencer checks its pending [`Wait`], and once it is satisfied runs
//! steps until the next one that has to wait.  An input wait installed during
//! a tick first looks at the edges of the following tick, so a single button
//! press never satisfies two waits.
//!
//! Results are written into the trial's [`TrialResults`] as soon as the step
//! that measures them runs.

use roomrecall_protocol::metrics::{record_response, record_standing, record_target};
use roomrecall_protocol::{
    ArrangementTable, ErrorMetrics, LabelTable, ResponseCapture, ResponseRecord, SceneCache,
    SettingsView, ShiftedObjects, StartGate, StartRequirement, Target, resolve_target,
    spawn_point,
};
use roomrecall_rig::Rig;
use roomrecall_spatial::Vec3;
use roomrecall_types::{Cue, ExperimentError, InputEdges, ResponseMode, Rgba, TrialResults};
use tracing::{debug, error, info, warn};

use crate::config::ExperimentConfig;

/// Instruction shown while the participant walks to the standing marker.
pub const INSTRUCTION_TEXT: &str =
    "Please stand on the blue markings\nand press the trigger to start!";

// ────────────────────────────────────────────────────────────────────────────
// Trial plan
// ────────────────────────────────────────────────────────────────────────────

/// Everything a trial reads from its settings, parsed up front so that a bad
/// setting fails the trial before anything is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialPlan {
    /// Standing marker position; the origin unless both `view_x` and
    /// `view_z` are given.
    pub standing_position: Vec3,
    pub view_rotation: f32,
    pub preview_label: Option<String>,
    pub scene: Option<String>,
    pub arrangement: Option<String>,
    pub target: Option<String>,
    pub response_mode: ResponseMode,
    /// Space-separated object ids; `None` when empty.
    pub shift_objects: Option<String>,
    pub shift: Vec3,
    pub show_mask: bool,
}

impl TrialPlan {
    /// # Errors
    ///
    /// [`ExperimentError::TypeMismatch`] for a mistyped setting,
    /// [`ExperimentError::UnknownResponseMode`] for an unrecognised
    /// `response_mode`.
    pub fn from_settings<S: SettingsView + ?Sized>(
        settings: &S,
        config: &ExperimentConfig,
    ) -> Result<Self, ExperimentError> {
        let standing_position = match (settings.float("view_x")?, settings.float("view_z")?) {
            (Some(x), Some(z)) => Vec3::new(x, 0.0, z),
            _ => Vec3::zero(),
        };
        let response_mode = settings
            .string("response_mode")?
            .map(str::parse::<ResponseMode>)
            .transpose()?
            .unwrap_or_default();
        let owned = |key: &str| -> Result<Option<String>, ExperimentError> {
            Ok(settings.string(key)?.map(str::to_string))
        };

        Ok(Self {
            standing_position,
            view_rotation: settings.float_or("view_rotation", 0.0)?,
            preview_label: owned("preview_label")?,
            scene: owned("scene")?,
            arrangement: owned("arrangement")?,
            target: owned("target")?,
            response_mode,
            shift_objects: owned("shift_objects")?.filter(|ids| !ids.trim().is_empty()),
            shift: Vec3::new(
                settings.float_or("shift_x", 0.0)?,
                settings.float_or("shift_y", 0.0)?,
                settings.float_or("shift_z", 0.0)?,
            ),
            show_mask: settings.bool_or("show_mask_scene", config.show_mask_scene)?,
        })
    }

    /// Text for the instruction panel, naming the next object when enabled.
    pub fn instruction(&self, config: &ExperimentConfig) -> String {
        match &self.preview_label {
            Some(label) if config.preview_target_label => {
                format!("{INSTRUCTION_TEXT}\nNext Object: {label}")
            }
            _ => INSTRUCTION_TEXT.to_string(),
        }
    }

    fn start_requirement(&self, config: &ExperimentConfig) -> StartRequirement {
        StartRequirement {
            position: self.standing_position,
            yaw_deg: self.view_rotation,
            max_distance: config.max_distance_from_origin,
            max_angle: config.max_view_direction_error,
            error_cue: config.sound_on_view_misalignment,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Phases and waits
// ────────────────────────────────────────────────────────────────────────────

/// Externally visible stage of the running trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    StartPosition,
    FadeOut,
    SceneTransition,
    ArrangementSetup,
    TargetResolution,
    Preview,
    Concealment,
    ObjectShift,
    ResponseSetup,
    AwaitGrip,
    AwaitConfirm,
    RecordResponse,
    ErrorComputation,
    Cleanup,
    Restore,
}

/// What the sequencer is waiting for before running the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wait {
    Ready,
    /// Until the clock reaches the given time in seconds.
    Until(f64),
    Confirm,
    Grip,
    SceneLoad,
    StartGate,
}

fn after(now: f64, seconds: f32) -> Wait {
    Wait::Until(now + f64::from(seconds))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Instruction,
    StartPosition,
    FadeOut,
    SceneTransition,
    ArrangementSetup,
    TargetResolution,
    PreviewStart,
    PreviewEnd,
    BlankFade,
    BlankReveal,
    MaskFadeOut,
    MaskSwap,
    MaskHideTarget,
    MaskReveal,
    ObjectShift,
    ResponseSetup,
    AwaitGrip,
    AwaitConfirm,
    RecordResponse,
    ErrorComputation,
    Cleanup,
    CleanupRelease,
    Restore,
    Done,
}

impl Step {
    fn phase(self) -> Phase {
        match self {
            Step::Instruction | Step::StartPosition => Phase::StartPosition,
            Step::FadeOut => Phase::FadeOut,
            Step::SceneTransition => Phase::SceneTransition,
            Step::ArrangementSetup => Phase::ArrangementSetup,
            Step::TargetResolution => Phase::TargetResolution,
            Step::PreviewStart | Step::PreviewEnd => Phase::Preview,
            Step::BlankFade
            | Step::BlankReveal
            | Step::MaskFadeOut
            | Step::MaskSwap
            | Step::MaskHideTarget
            | Step::MaskReveal => Phase::Concealment,
            Step::ObjectShift => Phase::ObjectShift,
            Step::ResponseSetup => Phase::ResponseSetup,
            Step::AwaitGrip => Phase::AwaitGrip,
            Step::AwaitConfirm => Phase::AwaitConfirm,
            Step::RecordResponse => Phase::RecordResponse,
            Step::ErrorComputation => Phase::ErrorComputation,
            Step::Cleanup | Step::CleanupRelease => Phase::Cleanup,
            Step::Restore | Step::Done => Phase::Restore,
        }
    }
}

/// Outcome of one [`tick`][TrialSequencer::tick].
#[derive(Debug, Clone, PartialEq)]
pub enum TrialStatus {
    /// No trial has been begun.
    Idle,
    Running,
    /// The trial finished on this tick.
    Ended(TrialResults),
    /// The trial failed part-way and was torn down.  `results` holds what
    /// had been recorded before the failure.
    Aborted {
        results: TrialResults,
        error: ExperimentError,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// TrialSequencer
// ────────────────────────────────────────────────────────────────────────────

struct TrialRun {
    number: usize,
    plan: TrialPlan,
    step: Step,
    wait: Wait,
    gate: StartGate,
    instruction: String,
    results: TrialResults,
    target: Option<Target>,
    capture: Option<ResponseCapture>,
    response: Option<ResponseRecord>,
    shifted: Option<ShiftedObjects>,
}

pub struct TrialSequencer {
    config: ExperimentConfig,
    cache: SceneCache,
    arrangements: Option<ArrangementTable>,
    labels: LabelTable,
    run: Option<TrialRun>,
}

impl TrialSequencer {
    pub fn new(
        config: ExperimentConfig,
        cache: SceneCache,
        arrangements: Option<ArrangementTable>,
        labels: LabelTable,
    ) -> Self {
        Self {
            config,
            cache,
            arrangements,
            labels,
            run: None,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn cache(&self) -> &SceneCache {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Stage of the running trial.
    pub fn phase(&self) -> Option<Phase> {
        self.run.as_ref().map(|r| r.step.phase())
    }

    pub fn waiting_on(&self) -> Option<Wait> {
        self.run.as_ref().map(|r| r.wait)
    }

    /// Results recorded so far by the running trial.
    pub fn results(&self) -> Option<&TrialResults> {
        self.run.as_ref().map(|r| &r.results)
    }

    /// Start trial `number`: parse its settings, show the standing marker
    /// and the instruction, and arm the start gate.
    ///
    /// # Errors
    ///
    /// See [`TrialPlan::from_settings`].  Nothing is shown on error.
    pub fn begin<S: SettingsView + ?Sized, R: Rig + ?Sized>(
        &mut self,
        number: usize,
        settings: &S,
        now: f64,
        rig: &mut R,
    ) -> Result<(), ExperimentError> {
        let plan = TrialPlan::from_settings(settings, &self.config)?;
        if let Some(previous) = self.run.take() {
            warn!(trial = previous.number, "trial replaced before it ended");
        }
        info!(
            trial = number,
            scene = ?plan.scene,
            target = ?plan.target,
            mode = %plan.response_mode,
            "trial begins"
        );
        let mut run = TrialRun {
            number,
            gate: StartGate::new(plan.start_requirement(&self.config)),
            instruction: plan.instruction(&self.config),
            plan,
            step: Step::Instruction,
            wait: Wait::Ready,
            results: TrialResults::new(),
            target: None,
            capture: None,
            response: None,
            shifted: None,
        };
        run.wait = self.step(&mut run, now, rig)?;
        self.run = Some(run);
        Ok(())
    }

    /// Advance the running trial.
    ///
    /// `edges` are the input edges polled for this tick.  A backend failure
    /// (typically the response cursor vanishing) tears the trial down and is
    /// reported as [`TrialStatus::Aborted`].
    pub fn tick<R: Rig + ?Sized>(&mut self, now: f64, edges: InputEdges, rig: &mut R) -> TrialStatus {
        let Some(mut run) = self.run.take() else {
            return TrialStatus::Idle;
        };
        match self.advance(&mut run, now, edges, rig) {
            Ok(true) => {
                info!(trial = run.number, recorded = run.results.len(), "trial ended");
                TrialStatus::Ended(run.results)
            }
            Ok(false) => {
                self.run = Some(run);
                TrialStatus::Running
            }
            Err(error) => {
                error!(trial = run.number, step = ?run.step, error = %error, "trial aborted");
                self.abandon(&mut run, rig);
                TrialStatus::Aborted {
                    results: run.results,
                    error,
                }
            }
        }
    }

    /// Undo whatever the failed trial left in the world and return to the
    /// instruction view.  Every part is attempted; failures are only logged.
    fn abandon<R: Rig + ?Sized>(&mut self, run: &mut TrialRun, rig: &mut R) {
        let trial = run.number;
        set_target_active(run.target.as_ref(), true, rig);
        if let Some(capture) = run.capture.take()
            && let Err(e) = capture.release(rig)
        {
            warn!(trial, error = %e, "releasing response cursor failed");
        }
        if let Some(shifted) = run.shifted.take() {
            shifted.restore(rig);
        }
        rig.set_occluder_visible(false);
        rig.hide_standing_marker();
        rig.show_instruction(&run.instruction);
        self.cache.deactivate_to_base(rig);
        rig.fade_to(Rgba::CLEAR, self.config.fade_duration);
        debug!(trial, "aborted trial torn down");
    }

    fn advance<R: Rig + ?Sized>(
        &mut self,
        run: &mut TrialRun,
        now: f64,
        edges: InputEdges,
        rig: &mut R,
    ) -> Result<bool, ExperimentError> {
        if let Some(capture) = &run.capture {
            capture.follow(rig)?;
        }

        let ready = match run.wait {
            Wait::Ready => true,
            Wait::Until(t) => now >= t,
            Wait::Confirm => edges.confirm,
            Wait::Grip => edges.grip,
            Wait::SceneLoad => self.cache.poll(rig),
            Wait::StartGate => run.gate.poll(now, edges.confirm, rig),
        };
        if !ready {
            return Ok(false);
        }

        loop {
            if run.step == Step::Done {
                return Ok(true);
            }
            run.wait = self.step(run, now, rig)?;
            if run.wait != Wait::Ready {
                return Ok(false);
            }
        }
    }

    /// Run the current step, move to the next and return what it waits for.
    fn step<R: Rig + ?Sized>(
        &mut self,
        run: &mut TrialRun,
        now: f64,
        rig: &mut R,
    ) -> Result<Wait, ExperimentError> {
        let Self {
            config,
            cache,
            arrangements,
            labels,
            ..
        } = self;
        let fade = config.fade_duration;
        let half = fade / 2.0;
        let trial = run.number;
        debug!(trial, step = ?run.step, "trial step");

        let (next, wait) = match run.step {
            Step::Instruction => {
                rig.show_standing_marker(run.plan.standing_position, run.plan.view_rotation);
                rig.show_instruction(&run.instruction);
                (Step::StartPosition, Wait::StartGate)
            }
            Step::StartPosition => {
                let head = rig.head();
                run.results.record("t_starting_pos", now);
                run.results.record("standing_y_rotation", head.yaw_degrees());
                (Step::FadeOut, Wait::Ready)
            }
            Step::FadeOut => {
                rig.hide_instruction();
                rig.fade_to(config.fade_color, fade);
                (Step::SceneTransition, after(now, fade))
            }
            Step::SceneTransition => {
                let wait = match run.plan.scene.as_deref() {
                    None => Wait::Ready,
                    Some(scene) => match cache.request(scene, rig) {
                        Ok(()) if cache.poll(rig) => Wait::Ready,
                        Ok(()) => Wait::SceneLoad,
                        // Logged by the cache; the trial goes on in whatever
                        // scene is current.
                        Err(ExperimentError::UnknownScene(_)) => Wait::Ready,
                        Err(e) => return Err(e),
                    },
                };
                (Step::ArrangementSetup, wait)
            }
            Step::ArrangementSetup => {
                match (arrangements.as_ref(), run.plan.arrangement.as_deref()) {
                    (Some(table), Some(name)) => {
                        let report = table.apply(name, cache.registry(), rig);
                        if !report.is_clean() {
                            warn!(
                                trial,
                                arrangement = %name,
                                failures = report.failures.len(),
                                "arrangement only partly applied"
                            );
                        }
                    }
                    (None, Some(name)) => {
                        debug!(trial, arrangement = %name, "no arrangement table loaded");
                    }
                    _ => {}
                }
                (Step::TargetResolution, Wait::Ready)
            }
            Step::TargetResolution => {
                run.target = run
                    .plan
                    .target
                    .as_deref()
                    .and_then(|name| resolve_target(name, cache.registry(), &*rig, labels));
                if let Some(target) = &run.target {
                    record_target(&mut run.results, target);
                    info!(
                        trial,
                        scene = ?cache.current(),
                        target = %target.name,
                        label = %target.label,
                        "target resolved"
                    );
                }
                (Step::PreviewStart, Wait::Ready)
            }
            Step::PreviewStart => {
                rig.fade_to(Rgba::CLEAR, fade);
                run.results.record("t_scene_preview_start", now);
                let wait = if config.preview_wait_for_trigger {
                    Wait::Confirm
                } else {
                    after(now, config.preview_duration)
                };
                (Step::PreviewEnd, wait)
            }
            Step::PreviewEnd => {
                run.results.record("t_scene_preview_end", now);
                let next = if run.plan.show_mask {
                    Step::MaskFadeOut
                } else {
                    Step::BlankFade
                };
                (next, Wait::Ready)
            }

            // Blank: grey screen for the whole blank period.
            Step::BlankFade => {
                rig.fade_to(config.fade_color, fade);
                (Step::BlankReveal, after(now, config.blank_duration))
            }
            Step::BlankReveal => {
                set_target_active(run.target.as_ref(), false, rig);
                rig.fade_to(Rgba::CLEAR, fade);
                run.results.record("t_response_start", now);
                (Step::ObjectShift, Wait::Ready)
            }

            // Masked: the scene is swapped for the occluder behind two half
            // fades on either side.
            Step::MaskFadeOut => {
                rig.randomize_occluder();
                rig.fade_to(config.fade_color, half);
                (Step::MaskSwap, after(now, half))
            }
            Step::MaskSwap => {
                cache.set_roots_visible(false, rig);
                rig.set_occluder_visible(true);
                rig.fade_to(Rgba::CLEAR, half);
                (Step::MaskHideTarget, after(now, config.blank_duration))
            }
            Step::MaskHideTarget => {
                set_target_active(run.target.as_ref(), false, rig);
                rig.fade_to(config.fade_color, half);
                (Step::MaskReveal, after(now, half))
            }
            Step::MaskReveal => {
                rig.set_occluder_visible(false);
                cache.set_roots_visible(true, rig);
                rig.fade_to(Rgba::CLEAR, half);
                run.results.record("t_response_start", now);
                (Step::ObjectShift, Wait::Ready)
            }

            Step::ObjectShift => {
                if let Some(ids) = run.plan.shift_objects.as_deref() {
                    run.shifted = Some(ShiftedObjects::apply(
                        ids,
                        run.plan.shift,
                        cache.registry(),
                        rig,
                    ));
                }
                (Step::ResponseSetup, Wait::Ready)
            }
            Step::ResponseSetup => {
                let spawn = spawn_point(run.plan.view_rotation, rig.head().position.y);
                let capture = ResponseCapture::activate(
                    run.plan.response_mode,
                    run.target.as_ref(),
                    spawn,
                    cache.registry(),
                    rig,
                )?;
                let gated = capture.needs_grip();
                run.capture = Some(capture);
                if gated {
                    (Step::AwaitGrip, Wait::Grip)
                } else {
                    (Step::AwaitConfirm, Wait::Confirm)
                }
            }
            Step::AwaitGrip => {
                debug!(trial, "cursor grabbed");
                (Step::AwaitConfirm, Wait::Confirm)
            }
            Step::AwaitConfirm => {
                run.results.record("t_response_end", now);
                (Step::RecordResponse, Wait::Ready)
            }
            Step::RecordResponse => {
                if let Some(capture) = &run.capture {
                    let record = capture.capture(&*rig)?;
                    record_response(&mut run.results, &record);
                    run.response = Some(record);
                }
                (Step::ErrorComputation, Wait::Ready)
            }
            Step::ErrorComputation => {
                if let (Some(target), Some(response)) = (&run.target, &run.response) {
                    let metrics = ErrorMetrics::compute(target, response);
                    metrics.record(&mut run.results);
                    info!(
                        trial,
                        error_pos = metrics.distance,
                        error_angle = metrics.angle,
                        "response recorded"
                    );
                }
                record_standing(&mut run.results, &rig.head());
                (Step::Cleanup, Wait::Ready)
            }
            Step::Cleanup => {
                rig.fade_to(config.fade_color, fade);
                if config.sound_on_trial_end {
                    rig.play_cue(Cue::Confirm);
                }
                (Step::CleanupRelease, after(now, fade))
            }
            Step::CleanupRelease => {
                set_target_active(run.target.as_ref(), true, rig);
                if let Some(capture) = run.capture.take()
                    && let Err(e) = capture.release(rig)
                {
                    warn!(trial, error = %e, "releasing response cursor failed");
                }
                if let Some(shifted) = run.shifted.take() {
                    shifted.restore(rig);
                }
                (Step::Restore, Wait::Ready)
            }
            Step::Restore => {
                rig.show_instruction(&run.instruction);
                rig.hide_standing_marker();
                cache.deactivate_to_base(rig);
                rig.fade_to(Rgba::CLEAR, fade);
                (Step::Done, after(now, fade))
            }
            Step::Done => (Step::Done, Wait::Ready),
        };

        run.step = next;
        Ok(wait)
    }
}

fn set_target_active<R: Rig + ?Sized>(target: Option<&Target>, active: bool, rig: &mut R) {
    if let Some(target) = target
        && let Err(e) = rig.set_active(target.handle, active)
    {
        warn!(object = %target.name, error = %e, "toggling target failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomrecall_protocol::SettingsStore;
    use roomrecall_rig::sim::{SimObjectSpec, SimRig};
    use roomrecall_rig::{InputSource, ObjectStore};
    use roomrecall_spatial::{Pose, Quaternion};

    const TICK: f64 = 0.05;

    fn rig() -> SimRig {
        SimRig::builder()
            .with_scene(
                "K01",
                vec![
                    SimObjectSpec::new("K01_G03", Vec3::new(0.0, 1.0, 0.0))
                        .with_mesh(Vec3::new(0.2, 0.2, 0.2)),
                    SimObjectSpec::new("K01_L05", Vec3::new(1.0, 1.0, 0.0)),
                ],
            )
            .build()
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            preview_wait_for_trigger: false,
            preview_duration: 0.5,
            ..ExperimentConfig::default()
        }
    }

    fn sequencer(rig: &SimRig, config: ExperimentConfig) -> TrialSequencer {
        TrialSequencer::new(
            config,
            SceneCache::new(rig),
            None,
            LabelTable::bundled().unwrap(),
        )
    }

    fn trial(mode: &str) -> SettingsStore {
        SettingsStore::new()
            .with("scene", "K01")
            .with("target", "K01_G03")
            .with("response_mode", mode)
    }

    fn tick(seq: &mut TrialSequencer, rig: &mut SimRig, now: &mut f64) -> TrialStatus {
        *now += TICK;
        let edges = rig.poll_edges();
        seq.tick(*now, edges, rig)
    }

    fn drive_until(seq: &mut TrialSequencer, rig: &mut SimRig, now: &mut f64, phase: Phase) {
        for _ in 0..1000 {
            if seq.phase() == Some(phase) {
                return;
            }
            tick(seq, rig, now);
        }
        panic!("never reached {phase:?}");
    }

    fn drive_to_end(seq: &mut TrialSequencer, rig: &mut SimRig, now: &mut f64) -> TrialResults {
        for _ in 0..1000 {
            if let TrialStatus::Ended(results) = tick(seq, rig, now) {
                return results;
            }
        }
        panic!("trial never ended");
    }

    fn start(seq: &mut TrialSequencer, rig: &mut SimRig, settings: &SettingsStore) -> f64 {
        seq.begin(1, settings, 0.0, rig).unwrap();
        rig.press_confirm();
        0.0
    }

    #[test]
    fn cube_placement_end_to_end() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("cube"));

        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitGrip);
        let cube = rig.find("CursorCube").unwrap();
        rig.set_position(cube, Vec3::new(0.0, 1.0, 0.1)).unwrap();

        // A confirm without a prior grip does not count.
        rig.press_confirm();
        tick(&mut seq, &mut rig, &mut now);
        assert_eq!(seq.phase(), Some(Phase::AwaitGrip));

        rig.press_grip();
        tick(&mut seq, &mut rig, &mut now);
        assert_eq!(seq.phase(), Some(Phase::AwaitConfirm));
        rig.press_confirm();
        let results = drive_to_end(&mut seq, &mut rig, &mut now);

        let err = results.number("tar_error_pos").unwrap();
        assert!((err - 0.1).abs() < 1e-5, "tar_error_pos = {err}");
        assert_eq!(results.number("tar_error_pos_y"), Some(0.0));
        assert!(results.contains("tar_error_bbox"));
        assert!(results.contains("response_bbox_center_z"));
        assert!(!rig.is_active(cube));
        assert!(!seq.is_running());
    }

    #[test]
    fn timestamps_are_ordered() {
        let mut rig = rig();
        rig.set_auto_grip(true);
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("cube"));
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        rig.press_confirm();
        let results = drive_to_end(&mut seq, &mut rig, &mut now);

        let keys = [
            "t_starting_pos",
            "t_scene_preview_start",
            "t_scene_preview_end",
            "t_response_start",
            "t_response_end",
        ];
        let times: Vec<f64> = keys.iter().map(|k| results.number(k).unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "{times:?}");
        let preview = times[2] - times[1];
        assert!(preview >= 0.5 - 1e-9);
    }

    #[test]
    fn blank_concealment_fades_and_hides_target() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("point"));
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);

        let target = rig.find("K01_G03").unwrap();
        assert!(!rig.is_active(target));
        let colours: Vec<Rgba> = rig.fades().iter().map(|(c, _)| *c).collect();
        assert_eq!(
            colours,
            vec![Rgba::GRAY, Rgba::CLEAR, Rgba::GRAY, Rgba::CLEAR]
        );
        assert!(rig.fades().iter().all(|(_, d)| *d == 0.5));

        rig.press_confirm();
        drive_to_end(&mut seq, &mut rig, &mut now);
        assert!(rig.is_active(target));
        assert_eq!(rig.fades().len(), 6);
        assert_eq!(rig.cues(), &[Cue::Confirm]);
    }

    #[test]
    fn masked_concealment_swaps_scene_for_occluder() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let settings = trial("point").with("show_mask_scene", true);
        let mut now = start(&mut seq, &mut rig, &settings);

        drive_until(&mut seq, &mut rig, &mut now, Phase::Concealment);
        let root = rig.find("K01").unwrap();
        let mut saw_occluder = false;
        while seq.phase() == Some(Phase::Concealment) {
            if rig.occluder_visible() {
                saw_occluder = true;
                assert!(!rig.is_active(root));
            }
            tick(&mut seq, &mut rig, &mut now);
        }
        assert!(saw_occluder);
        assert!(!rig.occluder_visible());
        assert!(rig.is_active(root));
        assert_eq!(rig.occluder_randomizations(), 1);

        let halves = rig.fades()[2..6].iter().filter(|(_, d)| *d == 0.25).count();
        assert_eq!(halves, 4);
    }

    #[test]
    fn point_mode_needs_no_grip_and_records_no_bounds() {
        let mut rig = rig();
        let hand = Pose::at(Vec3::new(0.2, 1.0, 0.3));
        rig.set_right_controller(hand);
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("point"));

        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        rig.press_confirm();
        let results = drive_to_end(&mut seq, &mut rig, &mut now);

        assert_eq!(results.number("response_pos_x_pivot"), Some(f64::from(0.2_f32)));
        assert!(results.contains("tar_error_pos"));
        assert!(!results.contains("tar_error_bbox"));
    }

    #[test]
    fn object_mode_copy_is_destroyed() {
        let mut rig = rig();
        rig.set_auto_grip(true);
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("object"));
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        let with_copy = rig.object_count();
        assert!(rig.find("K01_G03(Clone)").is_some());

        rig.press_confirm();
        let results = drive_to_end(&mut seq, &mut rig, &mut now);
        assert!(rig.object_count() < with_copy);
        assert!(rig.find("K01_G03(Clone)").is_none());
        assert!(results.contains("tar_error_angle"));
    }

    #[test]
    fn laser_and_stick_use_pointer_endpoints() {
        for (mode, kind) in [
            ("laser", roomrecall_rig::PointerKind::Laser),
            ("stick", roomrecall_rig::PointerKind::Stick),
        ] {
            let mut rig = rig();
            rig.set_pointer_endpoint(kind, Pose::at(Vec3::new(0.0, 1.0, 0.5)));
            let mut seq = sequencer(&rig, config());
            let mut now = start(&mut seq, &mut rig, &trial(mode));
            drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
            assert!(rig.pointer_visible(kind));
            rig.press_confirm();
            let results = drive_to_end(&mut seq, &mut rig, &mut now);
            assert!(!rig.pointer_visible(kind));
            assert_eq!(results.number("response_pos_z_pivot"), Some(0.5));
        }
    }

    #[test]
    fn trial_without_target_skips_error_fields() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let settings = SettingsStore::new().with("scene", "K01");
        let mut now = start(&mut seq, &mut rig, &settings);
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        rig.press_confirm();
        let results = drive_to_end(&mut seq, &mut rig, &mut now);

        assert!(!results.contains("target_label"));
        assert!(!results.contains("tar_error_pos"));
        assert!(results.contains("standing_pos_y"));
        assert!(results.contains("t_response_end"));
    }

    #[test]
    fn unknown_response_mode_fails_before_anything_is_shown() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let err = seq.begin(1, &trial("wave"), 0.0, &mut rig).unwrap_err();
        assert_eq!(err, ExperimentError::UnknownResponseMode("wave".to_string()));
        assert!(rig.instruction().is_none());
        assert!(!seq.is_running());
    }

    #[test]
    fn misaligned_start_keeps_waiting() {
        let mut rig = rig();
        rig.set_head(Pose::new(
            Vec3::new(0.0, 1.7, 0.0),
            Quaternion::from_yaw_degrees(90.0),
        ));
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("point"));
        for _ in 0..5 {
            tick(&mut seq, &mut rig, &mut now);
        }
        assert_eq!(seq.phase(), Some(Phase::StartPosition));
        assert_eq!(rig.cues(), &[Cue::Error]);
        assert!(!seq.results().unwrap().contains("t_starting_pos"));
    }

    #[test]
    fn preview_can_wait_for_trigger() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, ExperimentConfig::default());
        let mut now = start(&mut seq, &mut rig, &trial("point"));
        drive_until(&mut seq, &mut rig, &mut now, Phase::Preview);
        for _ in 0..200 {
            tick(&mut seq, &mut rig, &mut now);
        }
        assert_eq!(seq.phase(), Some(Phase::Preview));
        rig.press_confirm();
        tick(&mut seq, &mut rig, &mut now);
        assert_eq!(seq.phase(), Some(Phase::Concealment));
    }

    #[test]
    fn instruction_names_next_object_and_marker_follows_view() {
        let mut rig = rig();
        let cfg = ExperimentConfig {
            preview_target_label: true,
            ..config()
        };
        let mut seq = sequencer(&rig, cfg);
        let settings = trial("point")
            .with("preview_label", "mug")
            .with("view_x", 1.0_f32)
            .with("view_z", -0.5_f32)
            .with("view_rotation", 180.0_f32);
        seq.begin(3, &settings, 0.0, &mut rig).unwrap();

        let lines: Vec<&str> = rig.instruction().unwrap().lines().collect();
        assert_eq!(
            lines,
            vec![
                "Please stand on the blue markings",
                "and press the trigger to start!",
                "Next Object: mug",
            ]
        );
        assert_eq!(rig.standing_marker(), Some((Vec3::new(1.0, 0.0, -0.5), 180.0)));
    }

    #[test]
    fn shifted_objects_are_put_back() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let settings = trial("point")
            .with("shift_objects", "K01_L05 K01_X99")
            .with("shift_x", 0.5_f32);
        let mut now = start(&mut seq, &mut rig, &settings);
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);

        let moved = rig.find("K01_L05").unwrap();
        assert!((rig.pose(moved).unwrap().position.x - 1.5).abs() < 1e-5);
        rig.press_confirm();
        drive_to_end(&mut seq, &mut rig, &mut now);
        assert_eq!(rig.pose(moved).unwrap().position, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn unknown_scene_is_skipped() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let settings = SettingsStore::new().with("scene", "Z99");
        let mut now = start(&mut seq, &mut rig, &settings);
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        assert_eq!(seq.cache().current(), None);
        rig.press_confirm();
        drive_to_end(&mut seq, &mut rig, &mut now);
    }

    #[test]
    fn vanished_cursor_aborts_and_tears_down() {
        let mut rig = rig();
        rig.set_auto_grip(true);
        let mut seq = sequencer(&rig, config());
        let settings = trial("cube")
            .with("shift_objects", "K01_L05")
            .with("shift_x", 0.5_f32);
        let mut now = start(&mut seq, &mut rig, &settings);
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        let cube = rig.find("CursorCube").unwrap();
        rig.destroy(cube).unwrap();

        rig.press_confirm();
        let mut outcome = TrialStatus::Running;
        for _ in 0..10 {
            outcome = tick(&mut seq, &mut rig, &mut now);
            if outcome != TrialStatus::Running {
                break;
            }
        }
        let (results, error) = match outcome {
            TrialStatus::Aborted { results, error } => (results, error),
            other => panic!("expected an aborted trial, got {other:?}"),
        };
        assert!(matches!(error, ExperimentError::ObjectNotFound(_)));
        assert!(results.contains("t_response_end"));
        assert!(!results.contains("response_pos_x_pivot"));

        assert!(!seq.is_running());
        let target = rig.find("K01_G03").unwrap();
        assert!(rig.is_active(target));
        let moved = rig.find("K01_L05").unwrap();
        assert_eq!(rig.pose(moved).unwrap().position, Vec3::new(1.0, 1.0, 0.0));
        assert!(rig.standing_marker().is_none());
        assert_eq!(rig.instruction(), Some(INSTRUCTION_TEXT));
        assert_eq!(rig.active_scene(), Some(roomrecall_rig::BASE_SCENE));
    }

    #[test]
    fn restore_returns_to_the_base_scene() {
        let mut rig = rig();
        let mut seq = sequencer(&rig, config());
        let mut now = start(&mut seq, &mut rig, &trial("point"));
        drive_until(&mut seq, &mut rig, &mut now, Phase::AwaitConfirm);
        rig.press_confirm();
        drive_to_end(&mut seq, &mut rig, &mut now);

        assert_eq!(rig.active_scene(), Some(roomrecall_rig::BASE_SCENE));
        assert_eq!(rig.resident_scenes(), vec!["K01".to_string()]);
        assert!(rig.standing_marker().is_none());
        assert_eq!(rig.instruction(), Some(INSTRUCTION_TEXT));
        let root = rig.find("K01").unwrap();
        assert!(!rig.is_active(root));
    }
}
