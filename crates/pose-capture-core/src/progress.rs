use crate::frame::Frame;
use crate::landmarks::Detection;
use crate::session::{Rejection, Slot, WriteRequest};
use crate::writer::SampleRecord;

/// Snapshot of the controller shown alongside each preview frame.
#[derive(Debug, Clone)]
pub struct StatusLine<'a> {
    pub slot: Option<&'a Slot>,
    pub capturing: bool,
    pub progress: u32,
    pub max_samples: u32,
    pub next_index: u32,
}

/// Trait for reporting capture session events.
///
/// The CLI implements it with a terminal status line and progress bar.
/// All methods have default no-op implementations.
pub trait CaptureReporter {
    fn on_session_start(&self, _source: &str) {}
    fn on_frame(&self, _frame: &Frame, _detection: Option<&Detection>, _status: &StatusLine<'_>) {}
    fn on_selected(&self, _slot: &Slot, _next_index: u32, _max_samples: u32) {}
    fn on_capture_started(&self) {}
    fn on_capture_stopped(&self) {}
    fn on_sample_written(&self, _request: &WriteRequest, _record: &SampleRecord, _progress: u32) {}
    fn on_rejected(&self, _rejection: Rejection) {}
    fn on_person_advanced(&self, _slot: &Slot, _next_index: u32) {}
    fn on_complete(&self, _slot: &Slot, _all_slots: bool) {}
    fn on_detector_error(&self, _message: &str) {}
    fn on_session_end(&self, _samples_written: usize) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl CaptureReporter for SilentReporter {}
