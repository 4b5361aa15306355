//! Sessions, blocks and trials, and the [`SessionRunner`] that plays them.
//!
//! A [`Session`] owns its blocks in order and each [`Block`] owns its trials
//! in order.  The trial list itself comes from an [`ExperimentBuilder`]; the
//! runner then plays the trials strictly one after another:
//!
//! ```text
//!  setup ─▶ trial 1 ─▶ ITI ─▶ trial 2 ─▶ … ─▶ trial n ─▶ closing message ─▶ finished
//! ```
//!
//! # Example
//!
//! ```rust
//! use roomrecall_protocol::SettingsStore;
//! use roomrecall_rig::sim::SimRig;
//! use roomrecall_runtime::session::{Session, SessionEvent, SessionInfo, SessionRunner};
//! use roomrecall_types::ExperimentError;
//!
//! fn two_trials(session: &mut Session) -> Result<(), ExperimentError> {
//!     let block = session.create_block();
//!     block.add_trial(SettingsStore::new());
//!     block.add_trial(SettingsStore::new());
//!     Ok(())
//! }
//!
//! let mut rig = SimRig::default();
//! rig.set_auto_confirm(true);
//! let session = Session::new(SessionInfo::new("demo", "P01"), SettingsStore::new());
//! let mut runner = SessionRunner::setup(session, &two_trials, &mut rig, &mut rand::rng(), 0.0)?;
//!
//! let mut now = 0.0;
//! while !runner.is_finished() {
//!     now += 0.02;
//!     runner.tick(now, &mut rig)?;
//! }
//! assert_eq!(runner.session().ended_trials(), 2);
//! # Ok::<(), ExperimentError>(())
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use roomrecall_protocol::{
    ArrangementTable, LabelTable, LayeredSettings, SceneCache, SettingsStore,
};
use roomrecall_rig::Rig;
use roomrecall_types::{ExperimentError, TrialResults};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExperimentConfig;
use crate::sequencer::{TrialSequencer, TrialStatus};
use crate::tracker::{GazeRecord, GazeTracker, MotionSample, MotionTracker};

/// Message shown once the last trial has ended.
pub const CLOSING_TEXT: &str = "End of session! Thank you\nfor your participation!";

/// Seconds the closing message stays up before the session is finished.
pub const CLOSING_HOLD: f64 = 3.0;

// ────────────────────────────────────────────────────────────────────────────
// Model
// ────────────────────────────────────────────────────────────────────────────

/// Identity of a session run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub experiment: String,
    pub participant: String,
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(experiment: impl Into<String>, participant: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            experiment: experiment.into(),
            participant: participant.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trial {
    number: usize,
    block_number: usize,
    settings: SettingsStore,
    results: TrialResults,
    motion: Vec<MotionSample>,
    gaze: Vec<GazeRecord>,
    ended: bool,
}

impl Trial {
    /// 1-based position in the session, after shuffling.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn block_number(&self) -> usize {
        self.block_number
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn results(&self) -> &TrialResults {
        &self.results
    }

    /// Tracker samples taken while the trial ran.
    pub fn motion(&self) -> &[MotionSample] {
        &self.motion
    }

    pub fn gaze(&self) -> &[GazeRecord] {
        &self.gaze
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Mark the trial ended and store what it measured.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::TrialAlreadyEnded`] on a second call.
    pub fn end(&mut self, results: TrialResults) -> Result<(), ExperimentError> {
        if self.ended {
            return Err(ExperimentError::TrialAlreadyEnded(self.number));
        }
        self.results = results;
        self.ended = true;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    number: usize,
    trials: Vec<Trial>,
}

impl Block {
    pub fn number(&self) -> usize {
        self.number
    }

    /// Append a trial; it is numbered when the session is set up.
    pub fn add_trial(&mut self, settings: SettingsStore) -> &mut Trial {
        self.trials.push(Trial {
            number: 0,
            block_number: self.number,
            settings,
            results: TrialResults::new(),
            motion: Vec::new(),
            gaze: Vec::new(),
            ended: false,
        });
        let last = self.trials.len() - 1;
        &mut self.trials[last]
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn shuffle<G: Rng + ?Sized>(&mut self, rng: &mut G) {
        self.trials.shuffle(rng);
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    info: SessionInfo,
    settings: SettingsStore,
    blocks: Vec<Block>,
}

impl Session {
    pub fn new(info: SessionInfo, settings: SettingsStore) -> Self {
        Self {
            info,
            settings,
            blocks: Vec::new(),
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn create_block(&mut self) -> &mut Block {
        let number = self.blocks.len() + 1;
        self.blocks.push(Block {
            number,
            trials: Vec::new(),
        });
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// All trials in session order.
    pub fn trials(&self) -> impl Iterator<Item = &Trial> {
        self.blocks.iter().flat_map(|b| b.trials.iter())
    }

    pub fn trial_count(&self) -> usize {
        self.blocks.iter().map(|b| b.trials.len()).sum()
    }

    pub fn ended_trials(&self) -> usize {
        self.trials().filter(|t| t.ended).count()
    }

    /// Trial by 1-based session number.
    pub fn trial(&self, number: usize) -> Option<&Trial> {
        self.trials().find(|t| t.number == number)
    }

    pub(crate) fn trial_mut(&mut self, number: usize) -> Option<&mut Trial> {
        self.blocks
            .iter_mut()
            .flat_map(|b| b.trials.iter_mut())
            .find(|t| t.number == number)
    }

    /// Number the trials 1.. in block order.
    pub(crate) fn renumber(&mut self) {
        let mut n = 0;
        for block in &mut self.blocks {
            for trial in &mut block.trials {
                n += 1;
                trial.number = n;
            }
        }
    }
}

/// Fills a session with its blocks and trials, typically from a trial
/// specification file.
pub trait ExperimentBuilder {
    fn build_experiment(&self, session: &mut Session) -> Result<(), ExperimentError>;
}

impl<F> ExperimentBuilder for F
where
    F: Fn(&mut Session) -> Result<(), ExperimentError>,
{
    fn build_experiment(&self, session: &mut Session) -> Result<(), ExperimentError> {
        self(session)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────

/// Something that happened during a [`SessionRunner::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    TrialBegan { trial: usize },
    TrialEnded { trial: usize },
    /// The trial failed part-way; it still ends with what it recorded.
    TrialAborted { trial: usize },
    /// The next trial begins at `until`.
    InterTrialWait { next: usize, until: f64 },
    /// The closing message is up.
    SessionFinalized,
    SessionFinished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunnerState {
    InTrial { trial: usize },
    InterTrial { next: usize, until: f64 },
    Finalizing { until: f64 },
    Finished,
}

pub struct SessionRunner {
    session: Session,
    sequencer: TrialSequencer,
    tracker: MotionTracker,
    gaze: GazeTracker,
    state: RunnerState,
    pending: Vec<SessionEvent>,
}

impl SessionRunner {
    /// Build the session and begin its first trial.
    ///
    /// # Errors
    ///
    /// Fatal setup problems: builder failures, [`ExperimentError::EmptySession`],
    /// mistyped settings, a configured arrangement table that is missing or
    /// malformed, or a first trial that cannot start.
    pub fn setup<B, R, G>(
        mut session: Session,
        builder: &B,
        rig: &mut R,
        rng: &mut G,
        now: f64,
    ) -> Result<Self, ExperimentError>
    where
        B: ExperimentBuilder + ?Sized,
        R: Rig + ?Sized,
        G: Rng + ?Sized,
    {
        builder.build_experiment(&mut session)?;
        let config = ExperimentConfig::from_settings(session.settings())?;
        info!(
            session = %session.info.id,
            experiment = %session.info.experiment,
            participant = %session.info.participant,
            specification = ?config.trial_specification_name,
            trials = session.trial_count(),
            "trial design imported"
        );
        if session.trial_count() == 0 {
            return Err(ExperimentError::EmptySession);
        }

        if config.randomize_trials {
            for block in &mut session.blocks {
                block.shuffle(rng);
            }
        }
        session.renumber();

        let arrangements = match config.arrangements_path() {
            Some(path) => {
                let table = ArrangementTable::from_path(&path)?;
                info!(
                    path = %path.display(),
                    arrangements = table.names().len(),
                    "arrangements loaded"
                );
                Some(table)
            }
            None => None,
        };

        if config.calibrate_eye_tracker {
            info!("launching eye tracker calibration");
            rig.launch_calibration();
        }

        let cache = SceneCache::new(&*rig);
        cache.sweep(rig);

        let mut runner = Self {
            sequencer: TrialSequencer::new(config, cache, arrangements, LabelTable::bundled()?),
            session,
            tracker: MotionTracker::new(),
            gaze: GazeTracker::new(),
            state: RunnerState::Finished,
            pending: Vec::new(),
        };
        runner.begin_trial(1, now, rig)?;
        Ok(runner)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sequencer(&self) -> &TrialSequencer {
        &self.sequencer
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == RunnerState::Finished
    }

    /// Give back the session, typically for export once finished.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Advance the session by one frame.
    ///
    /// Input edges are polled exactly once per call.
    ///
    /// A trial that fails part-way is ended with its partial results and the
    /// session moves on as usual.
    ///
    /// # Errors
    ///
    /// A trial that cannot start; the session stops there.
    pub fn tick<R: Rig + ?Sized>(
        &mut self,
        now: f64,
        rig: &mut R,
    ) -> Result<Vec<SessionEvent>, ExperimentError> {
        let edges = rig.poll_edges();
        let mut events = std::mem::take(&mut self.pending);

        match self.state {
            RunnerState::InTrial { trial } => {
                self.tracker.sample(now, &*rig);
                self.gaze.sample(now, &*rig);
                match self.sequencer.tick(now, edges, rig) {
                    TrialStatus::Ended(results) => {
                        self.finish_trial(trial, results, now, rig, &mut events)?;
                    }
                    TrialStatus::Aborted { results, error } => {
                        warn!(trial, error = %error, "trial aborted, session continues");
                        events.push(SessionEvent::TrialAborted { trial });
                        self.finish_trial(trial, results, now, rig, &mut events)?;
                    }
                    TrialStatus::Running | TrialStatus::Idle => {}
                }
            }
            RunnerState::InterTrial { next, until } if now >= until => {
                self.begin_trial(next, now, rig)?;
                events.append(&mut self.pending);
            }
            RunnerState::Finalizing { until } if now >= until => {
                info!(session = %self.session.info.id, "session finished");
                self.state = RunnerState::Finished;
                events.push(SessionEvent::SessionFinished);
            }
            _ => {}
        }
        Ok(events)
    }

    fn begin_trial<R: Rig + ?Sized>(
        &mut self,
        number: usize,
        now: f64,
        rig: &mut R,
    ) -> Result<(), ExperimentError> {
        let session_settings = &self.session.settings;
        let trial = self
            .session
            .blocks
            .iter()
            .flat_map(|b| b.trials.iter())
            .find(|t| t.number == number)
            .ok_or_else(|| ExperimentError::Config(format!("no trial numbered {number}")))?;
        let settings = LayeredSettings::new(&trial.settings, session_settings);
        self.sequencer.begin(number, &settings, now, rig)?;
        self.tracker.take();
        self.gaze.take();
        self.state = RunnerState::InTrial { trial: number };
        self.pending.push(SessionEvent::TrialBegan { trial: number });
        Ok(())
    }

    fn finish_trial<R: Rig + ?Sized>(
        &mut self,
        number: usize,
        results: TrialResults,
        now: f64,
        rig: &mut R,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), ExperimentError> {
        let motion = self.tracker.take();
        let gaze = self.gaze.take();
        let total = self.session.trial_count();
        let trial = self
            .session
            .trial_mut(number)
            .ok_or_else(|| ExperimentError::Config(format!("no trial numbered {number}")))?;
        trial.end(results)?;
        trial.motion = motion;
        trial.gaze = gaze;
        events.push(SessionEvent::TrialEnded { trial: number });

        if number < total {
            let until = now + f64::from(self.sequencer.config().iti_duration);
            debug!(next = number + 1, until, "inter-trial interval");
            self.state = RunnerState::InterTrial {
                next: number + 1,
                until,
            };
            events.push(SessionEvent::InterTrialWait {
                next: number + 1,
                until,
            });
        } else {
            info!(trials = total, "last trial ended");
            rig.show_instruction(CLOSING_TEXT);
            self.state = RunnerState::Finalizing {
                until: now + CLOSING_HOLD,
            };
            events.push(SessionEvent::SessionFinalized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use roomrecall_protocol::SettingsView;
    use roomrecall_rig::sim::{SimObjectSpec, SimRig};
    use roomrecall_rig::{GazeSample, ObjectStore, SceneBackend};
    use roomrecall_spatial::Vec3;

    use crate::sequencer::Phase;

    fn trials(n: usize) -> impl Fn(&mut Session) -> Result<(), ExperimentError> {
        move |session: &mut Session| {
            let block = session.create_block();
            for i in 0..n {
                block.add_trial(
                    SettingsStore::new()
                        .with("scene", "K01")
                        .with("target", "K01_G03")
                        .with("preview_label", format!("item {i}")),
                );
            }
            Ok(())
        }
    }

    fn rig() -> SimRig {
        let mut rig = SimRig::builder()
            .with_scene(
                "K01",
                vec![SimObjectSpec::new("K01_G03", Vec3::new(0.0, 1.0, 0.0))],
            )
            .build();
        rig.set_auto_confirm(true);
        rig
    }

    fn session(settings: SettingsStore) -> Session {
        Session::new(SessionInfo::new("roomrecall-test", "P01"), settings)
    }

    fn quick() -> SettingsStore {
        SettingsStore::new()
            .with("randomize_trials", false)
            .with("preview_wait_for_trigger", false)
            .with("preview_duration", 0.2_f32)
    }

    fn run_to_end(runner: &mut SessionRunner, rig: &mut SimRig) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let mut now = 0.0;
        for _ in 0..20_000 {
            if runner.is_finished() {
                return events;
            }
            now += 0.02;
            events.extend(runner.tick(now, rig).unwrap());
        }
        panic!("session never finished");
    }

    #[test]
    fn trial_end_is_once_only() {
        let mut s = session(SettingsStore::new());
        s.create_block().add_trial(SettingsStore::new());
        s.renumber();
        let trial = s.trial_mut(1).unwrap();
        trial.end(TrialResults::new()).unwrap();
        assert_eq!(
            trial.end(TrialResults::new()),
            Err(ExperimentError::TrialAlreadyEnded(1))
        );
    }

    #[test]
    fn empty_session_is_rejected() {
        let mut rig = rig();
        let none = |_: &mut Session| -> Result<(), ExperimentError> { Ok(()) };
        let err = SessionRunner::setup(
            session(quick()),
            &none,
            &mut rig,
            &mut StdRng::seed_from_u64(1),
            0.0,
        )
        .err();
        assert_eq!(err, Some(ExperimentError::EmptySession));
    }

    #[test]
    fn runs_every_trial_then_finalizes_once() {
        let mut rig = rig();
        rig.set_gaze(GazeSample {
            pupil_left_mm: 4.0,
            ..GazeSample::default()
        });
        let mut runner = SessionRunner::setup(
            session(quick()),
            &trials(3),
            &mut rig,
            &mut StdRng::seed_from_u64(7),
            0.0,
        )
        .unwrap();
        let events = run_to_end(&mut runner, &mut rig);

        let began: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::TrialBegan { trial } => Some(*trial),
                _ => None,
            })
            .collect();
        assert_eq!(began, vec![1, 2, 3]);

        let waits = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::InterTrialWait { .. }))
            .count();
        assert_eq!(waits, 2);
        let finalized = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::SessionFinalized))
            .count();
        assert_eq!(finalized, 1);
        assert_eq!(events.last(), Some(&SessionEvent::SessionFinished));

        assert_eq!(runner.session().ended_trials(), 3);
        assert_eq!(rig.instruction(), Some(CLOSING_TEXT));
        for trial in runner.session().trials() {
            assert!(trial.results().contains("tar_error_pos"));
            assert!(!trial.motion().is_empty());
            assert_eq!(trial.gaze().len(), trial.motion().len());
            assert!(trial.gaze().iter().all(|g| g.sample.pupil_left_mm == 4.0));
        }
    }

    #[test]
    fn non_last_trial_waits_one_iti() {
        let mut rig = rig();
        let mut runner = SessionRunner::setup(
            session(quick().with("iti_duration", 2.0_f32)),
            &trials(2),
            &mut rig,
            &mut StdRng::seed_from_u64(7),
            0.0,
        )
        .unwrap();
        let events = run_to_end(&mut runner, &mut rig);

        let pos = |want: fn(&SessionEvent) -> bool| events.iter().position(want).unwrap();
        let ended = pos(|e| matches!(e, SessionEvent::TrialEnded { trial: 1 }));
        let wait = pos(|e| matches!(e, SessionEvent::InterTrialWait { next: 2, .. }));
        let began = pos(|e| matches!(e, SessionEvent::TrialBegan { trial: 2 }));
        assert!(ended < wait && wait < began);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::TrialBegan { trial: 2 }))
                .count(),
            1
        );
    }

    #[test]
    fn aborted_trial_ends_and_the_session_moves_on() {
        let mut rig = rig();
        rig.set_auto_grip(true);
        let builder = |session: &mut Session| -> Result<(), ExperimentError> {
            let block = session.create_block();
            for mode in ["cube", "point"] {
                block.add_trial(
                    SettingsStore::new()
                        .with("scene", "K01")
                        .with("target", "K01_G03")
                        .with("response_mode", mode),
                );
            }
            Ok(())
        };
        let mut runner = SessionRunner::setup(
            session(quick()),
            &builder,
            &mut rig,
            &mut StdRng::seed_from_u64(7),
            0.0,
        )
        .unwrap();

        let mut events = Vec::new();
        let mut now = 0.0;
        let mut cube_removed = false;
        for _ in 0..20_000 {
            if runner.is_finished() {
                break;
            }
            if !cube_removed
                && runner.state() == (RunnerState::InTrial { trial: 1 })
                && runner.sequencer().phase() == Some(Phase::AwaitGrip)
            {
                let cube = rig.find("CursorCube").unwrap();
                rig.destroy(cube).unwrap();
                cube_removed = true;
            }
            now += 0.02;
            events.extend(runner.tick(now, &mut rig).unwrap());
        }

        assert!(cube_removed);
        assert!(runner.is_finished());
        assert!(events.contains(&SessionEvent::TrialAborted { trial: 1 }));
        assert!(!events.contains(&SessionEvent::TrialAborted { trial: 2 }));
        assert!(events.contains(&SessionEvent::TrialBegan { trial: 2 }));
        assert_eq!(runner.session().ended_trials(), 2);

        let first = runner.session().trial(1).unwrap();
        assert!(first.results().contains("t_starting_pos"));
        assert!(!first.results().contains("tar_error_pos"));
        let second = runner.session().trial(2).unwrap();
        assert!(second.results().contains("tar_error_pos"));

        let target = rig.find("K01_G03").unwrap();
        assert!(rig.is_active(target));
    }

    #[test]
    fn shuffle_is_seeded_and_renumbered() {
        let build = |seed: u64| {
            let mut rig = rig();
            let runner = SessionRunner::setup(
                session(SettingsStore::new()),
                &trials(8),
                &mut rig,
                &mut StdRng::seed_from_u64(seed),
                0.0,
            )
            .unwrap();
            runner
                .session()
                .trials()
                .map(|t| t.settings().string("preview_label").unwrap().unwrap().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(build(42), build(42));

        let mut rig = rig();
        let runner = SessionRunner::setup(
            session(SettingsStore::new()),
            &trials(8),
            &mut rig,
            &mut StdRng::seed_from_u64(42),
            0.0,
        )
        .unwrap();
        let numbers: Vec<usize> = runner.session().trials().map(Trial::number).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn missing_arrangement_file_is_fatal() {
        let mut rig = rig();
        let result = SessionRunner::setup(
            session(quick().with("arrangements_csv", "no-such-arrangements.csv")),
            &trials(1),
            &mut rig,
            &mut StdRng::seed_from_u64(1),
            0.0,
        );
        match result {
            Err(ExperimentError::ArrangementFileMissing(path)) => {
                assert!(path.ends_with("no-such-arrangements.csv"))
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("setup should fail"),
        }
        assert!(rig.instruction().is_none());
    }

    #[test]
    fn calibration_and_sweep_run_at_setup() {
        let mut rig = rig();
        rig.begin_load("K01").unwrap();
        let _ = SessionRunner::setup(
            session(quick().with("calibrate_eye_tracker", true)),
            &trials(1),
            &mut rig,
            &mut StdRng::seed_from_u64(1),
            0.0,
        )
        .unwrap();
        assert_eq!(rig.calibrations(), 1);
        assert_eq!(rig.unloads("K01"), 1);
    }

    #[test]
    fn unknown_response_mode_aborts_setup() {
        let mut rig = rig();
        let builder = |session: &mut Session| -> Result<(), ExperimentError> {
            session
                .create_block()
                .add_trial(SettingsStore::new().with("response_mode", "wave"));
            Ok(())
        };
        let err = SessionRunner::setup(
            session(quick()),
            &builder,
            &mut rig,
            &mut StdRng::seed_from_u64(1),
            0.0,
        )
        .err();
        assert_eq!(
            err,
            Some(ExperimentError::UnknownResponseMode("wave".to_string()))
        );
    }
}
