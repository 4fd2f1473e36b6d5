use image::codecs::jpeg::JpegEncoder;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::error::Error;
use crate::frame::Frame;
use crate::landmarks::Detection;

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub trait LandmarkDetector {
    fn describe(&self) -> String;

    /// Landmarks found in `frame`, or `None` when there are none.
    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, Error>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, Error> {
        (**self).detect(frame)
    }
}

/// Finds nothing; every sample is image-only.
pub struct NoDetector;

impl LandmarkDetector for NoDetector {
    fn describe(&self) -> String {
        "none".to_string()
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Option<Detection>, Error> {
        Ok(None)
    }
}

pub fn open_detector(config: &DetectorConfig) -> Result<Box<dyn LandmarkDetector>, Error> {
    match config.command.as_deref() {
        Some(argv) if !argv.is_empty() => Ok(Box::new(CommandDetector::spawn(argv)?)),
        _ => {
            info!("No detector configured, samples will be image-only");
            Ok(Box::new(NoDetector))
        }
    }
}

/// External detector process driven over a line protocol.
///
/// Per frame the detector receives the path of a JPEG scratch file on one
/// stdin line and answers with one JSON line on stdout: `null` or a
/// `Detection` object (`pose`, `face`, `hands`).
pub struct CommandDetector {
    program: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    scratch: PathBuf,
}

impl CommandDetector {
    pub fn spawn(argv: &[String]) -> Result<Self, Error> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Detector("empty detector command".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| Error::Detector(format!("cannot start '{}': {}", program, err)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(Error::Detector(format!("no pipes to '{}'", program)));
        };

        let scratch = std::env::temp_dir().join(format!(
            "pose-capture-{}-{}.jpg",
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        info!("Started detector '{}' (pid {})", program, child.id());

        Ok(Self {
            program: program.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            scratch,
        })
    }
}

impl LandmarkDetector for CommandDetector {
    fn describe(&self) -> String {
        self.program.clone()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Detection>, Error> {
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, 95).encode_image(&frame.image)?;
        fs::write(&self.scratch, &encoded)?;

        writeln!(self.stdin, "{}", self.scratch.display())
            .and_then(|_| self.stdin.flush())
            .map_err(|err| Error::Detector(format!("'{}' stopped reading: {}", self.program, err)))?;

        let mut reply = String::new();
        let read = self.stdout.read_line(&mut reply)?;
        if read == 0 {
            return Err(Error::Detector(format!("'{}' exited", self.program)));
        }

        let detection: Option<Detection> = serde_json::from_str(reply.trim()).map_err(|err| {
            Error::Detector(format!("bad reply from '{}': {}", self.program, err))
        })?;
        debug!(
            "Frame {}: {} landmarks",
            frame.sequence,
            detection.as_ref().map_or(0, Detection::landmark_count)
        );
        Ok(detection.filter(|d| !d.is_empty()))
    }
}

impl Drop for CommandDetector {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!("Could not stop detector '{}': {}", self.program, err);
        }
        let _ = self.child.wait();
        let _ = fs::remove_file(&self.scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_no_detector_finds_nothing() {
        let mut detector = NoDetector;
        let frame = Frame::new(RgbImage::new(2, 2), 0);
        assert!(detector.detect(&frame).unwrap().is_none());
    }

    #[test]
    fn test_open_detector_without_command() {
        let detector = open_detector(&DetectorConfig::default()).unwrap();
        assert_eq!(detector.describe(), "none");

        let detector = open_detector(&DetectorConfig {
            command: Some(vec![]),
        })
        .unwrap();
        assert_eq!(detector.describe(), "none");
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let argv = vec!["pose-capture-no-such-detector".to_string()];
        assert!(matches!(
            CommandDetector::spawn(&argv),
            Err(Error::Detector(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_detector_line_protocol() {
        let script = r#"while read path; do test -s "$path" && echo '{"pose": [[0.5, 0.5, 0.0, 1.0]]}' || echo null; done"#;
        let argv = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        let mut detector = CommandDetector::spawn(&argv).unwrap();

        let frame = Frame::new(RgbImage::new(4, 4), 3);
        let detection = detector.detect(&frame).unwrap().unwrap();
        assert_eq!(detection.pose.len(), 1);
        assert_eq!(detection.pose[0].visibility, Some(1.0));
    }
}
