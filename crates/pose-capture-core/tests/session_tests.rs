use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

use pose_capture_core::session::{Outcome, Progress, Rejection, WriteRequest};
use pose_capture_core::{Action, AppConfig, CaptureController, SessionState};

fn config(root: &Path, max_samples: u32) -> AppConfig {
    AppConfig {
        dataset_root: root.to_path_buf(),
        poses: vec!["pose1".to_string(), "pose2".to_string()],
        max_samples,
        capture_delay_ms: 100,
        ..AppConfig::default()
    }
}

/// Simulates the writer: the request's folder/stem become an image on disk.
fn write(request: &WriteRequest) {
    fs::create_dir_all(&request.folder).unwrap();
    fs::write(request.folder.join(format!("{}.jpg", request.stem)), b"").unwrap();
}

#[test]
fn test_capture_without_pose_is_rejected() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 3));

    for action in [Action::StartCapture, Action::ToggleCapture, Action::CaptureOnce] {
        assert_eq!(
            controller.handle(action).unwrap(),
            Outcome::Rejected(Rejection::NoPoseSelected)
        );
    }
    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(controller.progress(), 0);
    assert!(controller.tick(Instant::now()).is_none());
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_out_of_range_selection_is_ignored() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 3));

    assert_eq!(controller.handle(Action::SelectPose(0)).unwrap(), Outcome::Ignored);
    assert_eq!(controller.handle(Action::SelectPose(3)).unwrap(), Outcome::Ignored);
    assert_eq!(controller.handle(Action::SelectPerson(1)).unwrap(), Outcome::Ignored);
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn test_selection_computes_index_from_folder() {
    let tmp = tempdir().unwrap();
    let pose1 = tmp.path().join("pose1");
    fs::create_dir_all(&pose1).unwrap();
    fs::write(pose1.join("pose1_001.jpg"), b"").unwrap();
    fs::write(pose1.join("pose1_002.jpg"), b"").unwrap();

    let mut controller = CaptureController::new(&config(tmp.path(), 3));
    let Outcome::Selected(slot) = controller.handle(Action::SelectPose(1)).unwrap() else {
        panic!("expected selection");
    };
    assert_eq!(slot.pose, "pose1");
    assert_eq!(slot.folder, pose1);
    assert_eq!(controller.next_index(), 3);
    assert_eq!(controller.state(), SessionState::Selected);

    let Outcome::Write(request) = controller.handle(Action::CaptureOnce).unwrap() else {
        panic!("expected a write");
    };
    assert_eq!(request.stem, "pose1_003");
    assert_eq!(request.index, 3);
}

#[test]
fn test_burst_writes_quota_then_completes() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 3));
    controller.handle(Action::SelectPose(1)).unwrap();
    let first_index = controller.next_index();

    assert_eq!(
        controller.handle(Action::StartCapture).unwrap(),
        Outcome::CaptureStarted
    );

    let mut now = Instant::now();
    let mut written = Vec::new();
    for _ in 0..3 {
        let request = controller.tick(now).expect("paced write due");
        write(&request);
        written.push(request.index);
        controller.record_write(now).unwrap();
        now += Duration::from_millis(100);
    }

    assert_eq!(written, vec![first_index, first_index + 1, first_index + 2]);
    assert_eq!(controller.state(), SessionState::Complete);
    assert_eq!(controller.progress(), 3);

    // the capture key may still be held
    assert!(controller.tick(now + Duration::from_secs(1)).is_none());
    assert_eq!(
        controller.handle(Action::CaptureOnce).unwrap(),
        Outcome::Rejected(Rejection::QuotaReached)
    );
    assert_eq!(
        controller.handle(Action::StartCapture).unwrap(),
        Outcome::Rejected(Rejection::QuotaReached)
    );
    assert_eq!(fs::read_dir(tmp.path().join("pose1")).unwrap().count(), 3);
}

#[test]
fn test_streamed_writes_respect_pacing() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 10));
    controller.handle(Action::SelectPose(2)).unwrap();
    controller.handle(Action::ToggleCapture).unwrap();

    let start = Instant::now();
    assert!(controller.tick(start).is_some());
    controller.record_write(start).unwrap();

    assert!(controller.tick(start + Duration::from_millis(50)).is_none());
    assert!(controller.tick(start + Duration::from_millis(100)).is_some());
}

#[test]
fn test_stop_returns_to_selected() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 10));
    controller.handle(Action::SelectPose(1)).unwrap();

    assert_eq!(controller.handle(Action::StopCapture).unwrap(), Outcome::Ignored);
    controller.handle(Action::StartCapture).unwrap();
    assert_eq!(controller.handle(Action::StartCapture).unwrap(), Outcome::Ignored);
    assert_eq!(
        controller.handle(Action::ToggleCapture).unwrap(),
        Outcome::CaptureStopped
    );
    assert_eq!(controller.state(), SessionState::Selected);
    assert!(controller.tick(Instant::now()).is_none());
}

#[test]
fn test_selecting_other_pose_resets_progress() {
    let tmp = tempdir().unwrap();
    let pose2 = tmp.path().join("pose2");
    fs::create_dir_all(&pose2).unwrap();
    fs::write(pose2.join("pose2_010.jpg"), b"").unwrap();

    let mut controller = CaptureController::new(&config(tmp.path(), 5));
    controller.handle(Action::SelectPose(1)).unwrap();
    controller.handle(Action::StartCapture).unwrap();
    let now = Instant::now();
    let request = controller.tick(now).unwrap();
    write(&request);
    controller.record_write(now).unwrap();
    assert_eq!(controller.progress(), 1);
    assert_eq!(controller.next_index(), 2);

    let Outcome::Selected(slot) = controller.handle(Action::SelectPose(2)).unwrap() else {
        panic!("expected selection");
    };
    assert_eq!(slot.pose, "pose2");
    assert_eq!(controller.state(), SessionState::Selected);
    assert_eq!(controller.progress(), 0);
    assert_eq!(controller.next_index(), 11);

    // back to pose1: its folder now holds one sample
    controller.handle(Action::SelectPose(1)).unwrap();
    assert_eq!(controller.next_index(), 2);
    assert_eq!(controller.progress(), 0);
}

#[test]
fn test_new_pose_after_complete() {
    let tmp = tempdir().unwrap();
    let mut controller = CaptureController::new(&config(tmp.path(), 1));
    controller.handle(Action::SelectPose(1)).unwrap();
    let Outcome::Write(request) = controller.handle(Action::CaptureOnce).unwrap() else {
        panic!("expected a write");
    };
    write(&request);
    assert_eq!(controller.record_write(Instant::now()).unwrap(), Progress::Complete);
    assert_eq!(controller.state(), SessionState::Complete);

    controller.handle(Action::SelectPose(2)).unwrap();
    assert_eq!(controller.state(), SessionState::Selected);
    assert!(matches!(
        controller.handle(Action::CaptureOnce).unwrap(),
        Outcome::Write(_)
    ));
}

#[test]
fn test_persons_advance_until_all_slots_completed() {
    let tmp = tempdir().unwrap();
    let config = AppConfig {
        max_persons: 2,
        ..config(tmp.path(), 2)
    };
    let mut controller = CaptureController::new(&config);

    let Outcome::Selected(slot) = controller.handle(Action::SelectPose(1)).unwrap() else {
        panic!("expected selection");
    };
    assert_eq!(slot.person, Some(1));
    assert_eq!(slot.folder, tmp.path().join("pose1").join("person1"));

    controller.handle(Action::StartCapture).unwrap();
    let mut now = Instant::now();
    let mut progress = Vec::new();
    for _ in 0..4 {
        if controller.state() == SessionState::Selected {
            controller.handle(Action::StartCapture).unwrap();
        }
        let request = controller.tick(now).unwrap();
        write(&request);
        progress.push(controller.record_write(now).unwrap());
        now += Duration::from_millis(100);
    }

    assert_eq!(progress[0], Progress::Continue);
    let Progress::PersonAdvanced(next) = &progress[1] else {
        panic!("expected person advance, got {:?}", progress[1]);
    };
    assert_eq!(next.person, Some(2));
    assert_eq!(progress[3], Progress::AllSlotsCompleted);

    assert!(controller.all_slots_completed());
    assert_eq!(
        controller.handle(Action::CaptureOnce).unwrap(),
        Outcome::Rejected(Rejection::AllSlotsCompleted)
    );
    assert_eq!(
        fs::read_dir(tmp.path().join("pose1").join("person1")).unwrap().count(),
        2
    );
    assert_eq!(
        fs::read_dir(tmp.path().join("pose1").join("person2")).unwrap().count(),
        2
    );

    // picking a person again reopens capture for that slot
    controller.handle(Action::SelectPerson(1)).unwrap();
    assert_eq!(controller.next_index(), 3);
    assert!(!controller.all_slots_completed());
}

#[test]
fn test_person_selection_without_pose_is_rejected() {
    let tmp = tempdir().unwrap();
    let config = AppConfig {
        max_persons: 3,
        ..config(tmp.path(), 2)
    };
    let mut controller = CaptureController::new(&config);
    assert_eq!(
        controller.handle(Action::SelectPerson(2)).unwrap(),
        Outcome::Rejected(Rejection::NoPoseSelected)
    );
    assert_eq!(controller.handle(Action::SelectPerson(4)).unwrap(), Outcome::Ignored);
}

#[test]
fn test_exhausted_index_space_is_an_error() {
    let tmp = tempdir().unwrap();
    let pose1 = tmp.path().join("pose1");
    fs::create_dir_all(&pose1).unwrap();
    fs::write(pose1.join("pose1_4294967295.jpg"), b"").unwrap();

    let mut controller = CaptureController::new(&config(tmp.path(), 3));
    assert!(controller.handle(Action::SelectPose(1)).is_err());
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn test_write_at_last_index_does_not_wrap() {
    let tmp = tempdir().unwrap();
    let pose1 = tmp.path().join("pose1");
    fs::create_dir_all(&pose1).unwrap();
    fs::write(pose1.join("pose1_4294967294.jpg"), b"").unwrap();

    let mut controller = CaptureController::new(&config(tmp.path(), 3));
    controller.handle(Action::SelectPose(1)).unwrap();
    let Outcome::Write(request) = controller.handle(Action::CaptureOnce).unwrap() else {
        panic!("expected a write");
    };
    assert_eq!(request.index, u32::MAX);
    write(&request);

    assert!(controller.record_write(Instant::now()).is_err());
    assert_eq!(controller.next_index(), u32::MAX);
    assert_eq!(controller.progress(), 0);
}
