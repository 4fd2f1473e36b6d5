mod keymap;

pub use keymap::{Key, KeyInput, KeyKind, KeyMap};

use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::Error;
use crate::indexer::{self, SampleNaming};

/// Input symbols after key mapping. Pose and person ids are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectPose(usize),
    SelectPerson(u32),
    StartCapture,
    StopCapture,
    ToggleCapture,
    CaptureOnce,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No pose selected.
    Idle,
    Selected,
    Capturing,
    /// Quota reached for the current slot.
    Complete,
}

/// One (pose, person) capture folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// 1-based position in the configured pose list.
    pub pose_id: usize,
    pub pose: String,
    pub person: Option<u32>,
    pub folder: PathBuf,
    pub naming: SampleNaming,
}

impl Slot {
    pub fn label(&self) -> String {
        match self.person {
            Some(person) => format!("{} / person {}", self.pose, person),
            None => self.pose.clone(),
        }
    }
}

/// Where and under which name the next sample goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub folder: PathBuf,
    pub stem: String,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoPoseSelected,
    QuotaReached,
    AllSlotsCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Selected(Slot),
    CaptureStarted,
    CaptureStopped,
    Write(WriteRequest),
    Rejected(Rejection),
    Ignored,
    Quit,
}

/// Session progress after a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Continue,
    PersonAdvanced(Slot),
    Complete,
    AllSlotsCompleted,
}

/// Turns mapped input into write decisions for the selected slot and enforces
/// the per-slot quota and the pacing between streamed writes.
///
/// The filesystem is consulted only when a slot is selected; afterwards the
/// next index is tracked in memory.
#[derive(Debug)]
pub struct CaptureController {
    config: AppConfig,
    state: SessionState,
    slot: Option<Slot>,
    progress: u32,
    next_index: u32,
    last_write: Option<Instant>,
    all_slots_completed: bool,
}

impl CaptureController {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            state: SessionState::Idle,
            slot: None,
            progress: 0,
            next_index: 1,
            last_write: None,
            all_slots_completed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn slot(&self) -> Option<&Slot> {
        self.slot.as_ref()
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn max_samples(&self) -> u32 {
        self.config.max_samples
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn all_slots_completed(&self) -> bool {
        self.all_slots_completed
    }

    pub fn handle(&mut self, action: Action) -> Result<Outcome, Error> {
        let outcome = match action {
            Action::SelectPose(pose_id) => {
                if pose_id == 0 || pose_id > self.config.poses.len() {
                    return Ok(Outcome::Ignored);
                }
                let person = (self.config.max_persons > 0).then_some(1);
                Outcome::Selected(self.select(pose_id, person)?)
            }
            Action::SelectPerson(person) => {
                if person == 0 || person > self.config.max_persons {
                    return Ok(Outcome::Ignored);
                }
                match self.slot.as_ref().map(|slot| slot.pose_id) {
                    Some(pose_id) => Outcome::Selected(self.select(pose_id, Some(person))?),
                    None => Outcome::Rejected(Rejection::NoPoseSelected),
                }
            }
            Action::StartCapture => self.start(),
            Action::StopCapture => self.stop(),
            Action::ToggleCapture => {
                if self.state == SessionState::Capturing {
                    self.stop()
                } else {
                    self.start()
                }
            }
            Action::CaptureOnce => match self.check_capture_allowed() {
                Some(rejection) => Outcome::Rejected(rejection),
                None => Outcome::Write(self.current_request()),
            },
            Action::Quit => Outcome::Quit,
        };
        debug!("{:?} -> {:?}", action, self.state);
        Ok(outcome)
    }

    /// Streamed write for this loop iteration, if capturing and the pacing
    /// delay since the previous write has passed.
    pub fn tick(&self, now: Instant) -> Option<WriteRequest> {
        if self.state != SessionState::Capturing || self.progress >= self.config.max_samples {
            return None;
        }
        let paced = self
            .last_write
            .map_or(true, |last| {
                now.saturating_duration_since(last) >= self.config.capture_delay()
            });
        paced.then(|| self.current_request())
    }

    /// Account for a sample that was just written at the current index.
    pub fn record_write(&mut self, now: Instant) -> Result<Progress, Error> {
        let Some(next_index) = self.next_index.checked_add(1) else {
            return Err(Error::Other(format!(
                "sample index {} is the last one available",
                self.next_index
            )));
        };
        self.progress += 1;
        self.next_index = next_index;
        self.last_write = Some(now);

        if self.progress < self.config.max_samples {
            return Ok(Progress::Continue);
        }

        let Some(slot) = self.slot.clone() else {
            return Ok(Progress::Continue);
        };
        match slot.person {
            Some(person) if person < self.config.max_persons => {
                let next = self.select(slot.pose_id, Some(person + 1))?;
                info!("{} complete, advancing to {}", slot.label(), next.label());
                Ok(Progress::PersonAdvanced(next))
            }
            Some(_) => {
                info!("{} complete, all person slots filled", slot.label());
                self.state = SessionState::Complete;
                self.all_slots_completed = true;
                Ok(Progress::AllSlotsCompleted)
            }
            None => {
                info!("{} complete with {} samples", slot.label(), self.progress);
                self.state = SessionState::Complete;
                Ok(Progress::Complete)
            }
        }
    }

    fn select(&mut self, pose_id: usize, person: Option<u32>) -> Result<Slot, Error> {
        let pose = self.config.poses[pose_id - 1].clone();
        let mut folder = self.config.dataset_root.join(&pose);
        if let Some(person) = person {
            folder.push(self.config.person_name(person));
        }
        let naming = self.config.file_naming.naming_for(&pose);

        self.next_index = indexer::next_index(&folder, &naming)?;
        self.progress = 0;
        self.last_write = None;
        self.all_slots_completed = false;
        self.state = SessionState::Selected;

        let slot = Slot {
            pose_id,
            pose,
            person,
            folder,
            naming,
        };
        info!(
            "Selected {} (next index {})",
            slot.label(),
            self.next_index
        );
        self.slot = Some(slot.clone());
        Ok(slot)
    }

    fn start(&mut self) -> Outcome {
        if let Some(rejection) = self.check_capture_allowed() {
            return Outcome::Rejected(rejection);
        }
        if self.state == SessionState::Capturing {
            return Outcome::Ignored;
        }
        self.state = SessionState::Capturing;
        Outcome::CaptureStarted
    }

    fn stop(&mut self) -> Outcome {
        if self.state != SessionState::Capturing {
            return Outcome::Ignored;
        }
        self.state = SessionState::Selected;
        Outcome::CaptureStopped
    }

    fn check_capture_allowed(&self) -> Option<Rejection> {
        match self.state {
            SessionState::Idle => Some(Rejection::NoPoseSelected),
            SessionState::Complete if self.all_slots_completed => {
                Some(Rejection::AllSlotsCompleted)
            }
            SessionState::Complete => Some(Rejection::QuotaReached),
            SessionState::Selected | SessionState::Capturing => None,
        }
    }

    fn current_request(&self) -> WriteRequest {
        // only reachable from Selected/Capturing, which always carry a slot
        let (folder, naming) = match &self.slot {
            Some(slot) => (slot.folder.clone(), slot.naming.clone()),
            None => (self.config.dataset_root.clone(), SampleNaming::Bare),
        };
        WriteRequest {
            stem: indexer::sample_stem(&naming, self.next_index),
            folder,
            index: self.next_index,
        }
    }
}
