mod commands;
mod logging;
mod progress;
mod terminal;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use terminal::{TerminalGuard, TerminalInput};
use tracing::{error, info, warn};

use pose_capture_core::config::CaptureMode;
use pose_capture_core::dataset::{self, DatasetSummary};
use pose_capture_core::detector::{self, LandmarkDetector};
use pose_capture_core::frame::{self, Frame};
use pose_capture_core::indexer::{self, SampleNaming};
use pose_capture_core::{AppConfig, CaptureEngine, SessionEnd, SessionSummary};

fn main() -> ExitCode {
    dotenv().ok();

    let args = Cli::parse();
    let interactive = matches!(args.command, None | Some(Commands::Collect));

    // stdout belongs to the status line while collecting
    let _guard = logging::init_logger(!interactive);

    // returning instead of exiting lets the log guard flush
    let result = checked_config(pose_capture_core::config::load_configuration())
        .and_then(|config| dispatch(args.command, &config));
    if let Err(err) = &result {
        error!("Error: {:#}", err);
        eprintln!("{} {:#}", "Error:".red(), err);
    }
    ExitCode::from(exit_status(&result))
}

fn checked_config<E>(loaded: Result<AppConfig, E>) -> anyhow::Result<AppConfig>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let config = loaded.context("loading configuration")?;
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn dispatch(command: Option<Commands>, config: &AppConfig) -> anyhow::Result<bool> {
    match command {
        None | Some(Commands::Collect) => run_collect(config),
        Some(Commands::NextIndex { folder, prefix }) => {
            run_next_index(&folder, &prefix).map(|_| true)
        }
        Some(Commands::Stats { csv }) => run_stats(config, csv).map(|_| true),
        Some(Commands::PrintConfig) => run_print_config(config).map(|_| true),
        Some(Commands::CheckDetector) => run_check_detector(config),
    }
}

/// 0 on success, 1 on an error or a failed session/check.
fn exit_status(result: &anyhow::Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) | Err(_) => 1,
    }
}

/// Interactive capture. `Ok(false)` when the camera stopped delivering frames.
fn run_collect(config: &AppConfig) -> anyhow::Result<bool> {
    let source = frame::open_source(&config.camera).context("opening frame source")?;
    let detector = detector::open_detector(&config.detector).context("starting detector")?;

    terminal::print_banner(config);
    let summary = {
        let guard = TerminalGuard::enter(config.capture_mode == CaptureMode::Hold)?;
        let mut engine = CaptureEngine::new(config, source, detector, TerminalInput);
        if config.capture_mode == CaptureMode::Hold && !guard.reports_key_release() {
            warn!("Terminal does not report key releases, hold mode falls back to burst");
            eprint!(
                "{}\r\n",
                "Key releases unavailable: SPACE toggles capture instead of hold".yellow()
            );
            engine = engine.with_capture_mode(CaptureMode::Burst);
        }
        let reporter = CliReporter::new();
        engine.run(&reporter)?
    };

    println!();
    for (folder, count) in &summary.per_folder {
        println!("  {} {}", format!("{:>4}", count).green(), folder.display());
    }
    println!(
        "{} samples written, {} without landmarks",
        format!("{}", summary.samples_written).green(),
        format!("{}", summary.image_only).yellow(),
    );
    info!("{}", totals_line(&summary));

    match summary.end {
        SessionEnd::Quit => Ok(true),
        SessionEnd::SourceFailed(reason) => {
            eprintln!("{} {}", "Camera stopped:".red(), reason);
            Ok(false)
        }
    }
}

/// Plain-text session totals for the log file.
fn totals_line(summary: &SessionSummary) -> String {
    format!(
        "{} samples written, {} without landmarks, {} folders",
        summary.samples_written,
        summary.image_only,
        summary.per_folder.len()
    )
}

fn run_next_index(folder: &Path, prefix: &str) -> anyhow::Result<()> {
    let naming = SampleNaming::from_prefix(prefix);
    let next = indexer::next_index(folder, &naming)
        .with_context(|| format!("scanning {}", folder.display()))?;
    println!("{}", next);
    Ok(())
}

fn run_stats(config: &AppConfig, as_csv: bool) -> anyhow::Result<()> {
    let summary = dataset::summarize(&config.dataset_root, config)?;
    if as_csv {
        write_stats_csv(&summary)
    } else {
        print_stats_table(config, &summary);
        Ok(())
    }
}

fn print_stats_table(config: &AppConfig, summary: &DatasetSummary) {
    println!(
        "{:<28} {:>8} {:>10} {:>10} {:>8} {:>6}  {}",
        "folder".bold(),
        "samples".bold(),
        "landmarks".bold(),
        "image-only".bold(),
        "orphans".bold(),
        "next".bold(),
        "last capture".bold()
    );
    for slot in &summary.slots {
        let samples = format!("{:>8}", slot.samples);
        let samples = if slot.samples as u64 >= config.max_samples as u64 {
            samples.green()
        } else {
            samples.normal()
        };
        let orphans = format!("{:>8}", slot.orphaned_landmarks);
        let orphans = if slot.orphaned_landmarks > 0 {
            orphans.red()
        } else {
            orphans.normal()
        };
        let next = slot
            .next_index
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let last = slot
            .last_capture
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {} {:>10} {:>10} {} {:>6}  {}",
            slot.folder.display().to_string(),
            samples,
            slot.with_landmarks,
            slot.image_only,
            orphans,
            next,
            last
        );
    }
    println!(
        "{} samples in {} folders, {} orphaned landmark files",
        format!("{}", summary.total_samples()).green(),
        summary.slots.len(),
        format!("{}", summary.total_orphans()).red(),
    );
}

fn write_stats_csv(summary: &DatasetSummary) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "folder",
        "pose",
        "person",
        "samples",
        "with_landmarks",
        "image_only",
        "orphaned_landmarks",
        "next_index",
        "last_capture",
    ])?;
    for slot in &summary.slots {
        writer.write_record([
            slot.folder.display().to_string(),
            slot.pose.clone(),
            slot.person.clone().unwrap_or_default(),
            slot.samples.to_string(),
            slot.with_landmarks.to_string(),
            slot.image_only.to_string(),
            slot.orphaned_landmarks.to_string(),
            slot.next_index.map(|n| n.to_string()).unwrap_or_default(),
            slot.last_capture.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn run_print_config(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// One detection on a blank frame. `Ok(false)` when the detector fails.
fn run_check_detector(config: &AppConfig) -> anyhow::Result<bool> {
    let mut detector = detector::open_detector(&config.detector).context("starting detector")?;
    let frame = Frame::blank(config.camera.width, config.camera.height);
    info!("Checking detector {}", detector.describe());

    match detector.detect(&frame) {
        Ok(Some(detection)) => {
            println!(
                "{} {} answered with {} landmarks",
                "✓".green(),
                detector.describe(),
                detection.landmark_count()
            );
            Ok(true)
        }
        Ok(None) => {
            println!(
                "{} {} answered (nothing detected on a blank frame)",
                "✓".green(),
                detector.describe()
            );
            Ok(true)
        }
        Err(err) => {
            error!("Detector check failed: {}", err);
            println!("{} {}: {}", "✗".red(), detector.describe(), err);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_failure_is_an_error() {
        let loaded: Result<AppConfig, io::Error> = Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid type: string \"lots\", expected u32",
        ));
        let err = checked_config(loaded).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("loading configuration"));
        assert!(message.contains("lots"));
        assert_eq!(exit_status(&Err(err)), 1);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = AppConfig {
            poses: Vec::new(),
            ..AppConfig::default()
        };
        let err = checked_config::<io::Error>(Ok(config)).unwrap_err();
        assert!(format!("{:#}", err).contains("at least one pose"));
    }

    #[test]
    fn test_exit_status() {
        assert!(checked_config::<io::Error>(Ok(AppConfig::default())).is_ok());
        assert_eq!(exit_status(&Ok(true)), 0);
        assert_eq!(exit_status(&Ok(false)), 1);
    }

    #[test]
    fn test_totals_line_is_plain_text() {
        colored::control::set_override(true);
        let mut summary = SessionSummary {
            samples_written: 5,
            image_only: 2,
            ..SessionSummary::default()
        };
        summary.per_folder.insert("dataset/pose1".into(), 5);
        let line = totals_line(&summary);
        colored::control::unset_override();

        assert_eq!(line, "5 samples written, 2 without landmarks, 1 folders");
        assert!(!line.contains('\x1b'));
    }
}
