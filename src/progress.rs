use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard};

use pose_capture_core::frame::Frame;
use pose_capture_core::landmarks::Detection;
use pose_capture_core::progress::StatusLine;
use pose_capture_core::session::{Rejection, Slot, WriteRequest};
use pose_capture_core::writer::SampleRecord;
use pose_capture_core::CaptureReporter;

const BAR_TEMPLATE: &str = "  {prefix:.cyan} [{bar:30.green/dim}] {pos}/{len} {msg}";

/// Terminal reporter for a capture session.
///
/// - One progress bar per selected slot, length = sample quota
/// - Bar message mirrors the live status (recording flag, landmark count)
/// - Events are printed above the bar; the terminal is in raw mode, so lines end in `\r\n`
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    last_detector_error: Mutex<Option<String>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            last_detector_error: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }

    fn say(&self, line: String) {
        match self.bar().as_ref() {
            Some(pb) => pb.suspend(|| eprint!("{}\r\n", line)),
            None => eprint!("{}\r\n", line),
        }
    }

    fn slot_bar(slot: &Slot, progress: u32, max_samples: u32) -> ProgressBar {
        let pb = ProgressBar::new(max_samples as u64);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─");
        pb.set_style(style);
        pb.set_prefix(slot.label());
        pb.set_position(progress as u64);
        pb
    }
}

impl CaptureReporter for CliReporter {
    fn on_session_start(&self, source: &str) {
        self.say(format!("  {} Reading frames from {}", "▶".cyan(), source));
    }

    fn on_frame(&self, _frame: &Frame, detection: Option<&Detection>, status: &StatusLine<'_>) {
        let guard = self.bar();
        let Some(pb) = guard.as_ref() else {
            return;
        };
        let landmarks = detection.map(Detection::landmark_count).unwrap_or(0);
        let state = if status.capturing { "REC" } else { "   " };
        pb.set_message(format!(
            "{} next #{:03} | {} landmarks",
            state, status.next_index, landmarks
        ));
        if pb.position() != status.progress as u64 {
            pb.set_position(status.progress as u64);
        }
    }

    fn on_selected(&self, slot: &Slot, next_index: u32, max_samples: u32) {
        self.finish_bar();
        self.say(format!(
            "  {} Selected {} (next #{:03}, quota {})",
            "●".green(),
            slot.label().bold(),
            next_index,
            max_samples
        ));
        self.set_bar(Self::slot_bar(slot, 0, max_samples));
    }

    fn on_capture_started(&self) {
        self.say(format!("  {} Capturing", "●".red()));
    }

    fn on_capture_stopped(&self) {
        self.say(format!("  {} Stopped", "■".yellow()));
    }

    fn on_sample_written(&self, request: &WriteRequest, record: &SampleRecord, progress: u32) {
        if let Some(pb) = self.bar().as_ref() {
            pb.set_position(progress as u64);
        }
        if record.landmarks.is_none() {
            self.say(format!(
                "  {} {} saved without landmarks",
                "!".yellow(),
                request.stem
            ));
        }
    }

    fn on_rejected(&self, rejection: Rejection) {
        let message = match rejection {
            Rejection::NoPoseSelected => "Select a pose first (press its number)",
            Rejection::QuotaReached => "Sample quota reached for this pose",
            Rejection::AllSlotsCompleted => "All persons for this pose are complete",
        };
        self.say(format!("  {} {}", "✗".red(), message.red()));
    }

    fn on_person_advanced(&self, slot: &Slot, next_index: u32) {
        let max_samples = self.bar().as_ref().and_then(|pb| pb.length()).unwrap_or(0);
        self.finish_bar();
        self.say(format!(
            "  {} Next up: {} (next #{:03})",
            "→".cyan(),
            slot.label().bold(),
            next_index
        ));
        self.set_bar(Self::slot_bar(slot, 0, max_samples as u32));
    }

    fn on_complete(&self, slot: &Slot, all_slots: bool) {
        self.finish_bar();
        if all_slots {
            self.say(format!(
                "  {} All persons done for {}",
                "✓".green(),
                slot.pose.bold()
            ));
        } else {
            self.say(format!(
                "  {} {} complete, pick another pose",
                "✓".green(),
                slot.label().bold()
            ));
        }
    }

    fn on_detector_error(&self, message: &str) {
        // a failing detector fails on every frame
        {
            let mut last = self
                .last_detector_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.as_deref() == Some(message) {
                return;
            }
            *last = Some(message.to_string());
        }
        self.say(format!("  {} Detector: {}", "!".yellow(), message));
    }

    fn on_session_end(&self, samples_written: usize) {
        self.finish_bar();
        self.say(format!(
            "  {} Session ended, {} samples written",
            "✓".green(),
            samples_written
        ));
    }
}
