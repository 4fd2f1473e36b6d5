use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::{AppConfig, CaptureMode};
use crate::detector::LandmarkDetector;
use crate::error::Error;
use crate::frame::{Frame, FrameSource};
use crate::landmarks::Detection;
use crate::progress::{CaptureReporter, StatusLine};
use crate::session::{
    CaptureController, KeyInput, KeyMap, Outcome, Progress, SessionState, WriteRequest,
};
use crate::writer::SampleWriter;

/// Non-blocking key source.
pub trait InputSource {
    /// Next pending key event, or `None` when nothing was pressed.
    fn poll(&mut self) -> Result<Option<KeyInput>, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionEnd {
    #[default]
    Quit,
    /// The frame source stopped delivering frames.
    SourceFailed(String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub samples_written: usize,
    /// Samples written without a landmark file.
    pub image_only: usize,
    pub per_folder: BTreeMap<PathBuf, usize>,
    pub end: SessionEnd,
}

/// The capture loop: one frame, one detection and all pending key events per
/// iteration. Every write completes before the next event is handled.
pub struct CaptureEngine<S, D, I> {
    source: S,
    detector: D,
    input: I,
    controller: CaptureController,
    keymap: KeyMap,
    writer: SampleWriter,
}

impl<S, D, I> CaptureEngine<S, D, I>
where
    S: FrameSource,
    D: LandmarkDetector,
    I: InputSource,
{
    pub fn new(config: &AppConfig, source: S, detector: D, input: I) -> Self {
        Self {
            source,
            detector,
            input,
            controller: CaptureController::new(config),
            keymap: KeyMap::new(config.poses.len(), config.max_persons, config.capture_mode),
            writer: SampleWriter::new(
                config.image_variant,
                config.landmark_schema,
                config.jpeg_quality,
            ),
        }
    }

    /// Override the configured capture mode, e.g. when the terminal cannot
    /// report key releases.
    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.keymap = self.keymap.with_mode(mode);
        self
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn run(&mut self, reporter: &dyn CaptureReporter) -> Result<SessionSummary, Error> {
        let source_name = self.source.describe();
        info!(
            "Capture session on {} with detector {} ({:?} mode)",
            source_name,
            self.detector.describe(),
            self.keymap.mode()
        );
        reporter.on_session_start(&source_name);

        let mut summary = SessionSummary::default();
        'session: loop {
            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    error!("Frame source {} failed: {}", source_name, err);
                    summary.end = SessionEnd::SourceFailed(err.to_string());
                    break;
                }
            };

            let detection = match self.detector.detect(&frame) {
                Ok(detection) => detection,
                Err(err) => {
                    warn!("Detection failed on frame {}: {}", frame.sequence, err);
                    reporter.on_detector_error(&err.to_string());
                    None
                }
            };

            reporter.on_frame(&frame, detection.as_ref(), &self.status());

            let mut wrote_frame = false;
            while let Some(input) = self.input.poll()? {
                let Some(action) = self.keymap.action(input) else {
                    continue;
                };
                match self.controller.handle(action)? {
                    Outcome::Quit => {
                        info!("Quit requested");
                        summary.end = SessionEnd::Quit;
                        break 'session;
                    }
                    Outcome::Write(request) => {
                        if !wrote_frame {
                            self.write_sample(
                                &request,
                                &frame,
                                detection.as_ref(),
                                &mut summary,
                                reporter,
                            )?;
                            wrote_frame = true;
                        }
                    }
                    Outcome::Selected(slot) => reporter.on_selected(
                        &slot,
                        self.controller.next_index(),
                        self.controller.max_samples(),
                    ),
                    Outcome::CaptureStarted => reporter.on_capture_started(),
                    Outcome::CaptureStopped => reporter.on_capture_stopped(),
                    Outcome::Rejected(rejection) => {
                        info!("Capture rejected: {:?}", rejection);
                        reporter.on_rejected(rejection);
                    }
                    Outcome::Ignored => {}
                }
            }

            if wrote_frame {
                continue;
            }
            if let Some(request) = self.controller.tick(Instant::now()) {
                self.write_sample(&request, &frame, detection.as_ref(), &mut summary, reporter)?;
            }
        }

        info!(
            "Session ended: {} samples ({} image-only)",
            summary.samples_written, summary.image_only
        );
        reporter.on_session_end(summary.samples_written);
        Ok(summary)
    }

    fn write_sample(
        &mut self,
        request: &WriteRequest,
        frame: &Frame,
        detection: Option<&Detection>,
        summary: &mut SessionSummary,
        reporter: &dyn CaptureReporter,
    ) -> Result<(), Error> {
        let record = self.writer.write(request, frame, detection)?;

        summary.samples_written += 1;
        if record.landmarks.is_none() {
            summary.image_only += 1;
        }
        *summary.per_folder.entry(request.folder.clone()).or_default() += 1;
        reporter.on_sample_written(request, &record, self.controller.progress() + 1);

        let slot = self.controller.slot().cloned();
        match self.controller.record_write(Instant::now())? {
            Progress::Continue => {}
            Progress::PersonAdvanced(next) => {
                reporter.on_person_advanced(&next, self.controller.next_index())
            }
            Progress::Complete => {
                if let Some(slot) = &slot {
                    reporter.on_complete(slot, false);
                }
            }
            Progress::AllSlotsCompleted => {
                if let Some(slot) = &slot {
                    reporter.on_complete(slot, true);
                }
            }
        }
        Ok(())
    }

    fn status(&self) -> StatusLine<'_> {
        StatusLine {
            slot: self.controller.slot(),
            capturing: self.controller.state() == SessionState::Capturing,
            progress: self.controller.progress(),
            max_samples: self.controller.max_samples(),
            next_index: self.controller.next_index(),
        }
    }
}
