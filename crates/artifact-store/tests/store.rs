use std::fs;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pagewatch_artifact_store::{ArtifactStore, StoreErrKind};
use pagewatch_core_types::{
    Action, DemoRecord, DemoResult, RecordingArtifact, RunStatus, StepResult, TestPlan, TestStep,
    VideoMetadata,
};

fn record(day: u32, with_video: bool) -> DemoRecord {
    let timestamp = Utc.with_ymd_and_hms(2026, 5, day, 10, 0, 0).unwrap();
    let plan = TestPlan {
        id: "plan-1".into(),
        name: "checkout".into(),
        url: Some("https://shop.test/".into()),
        steps: vec![TestStep::new(
            1,
            "open",
            Action::Navigate {
                target: "https://shop.test/".into(),
            },
        )],
    };
    let results = DemoResult::from_steps(
        "plan-1",
        vec![StepResult::passed(1, "navigate", "open")],
        Duration::from_millis(1200),
        None,
    );
    let video = with_video.then(|| RecordingArtifact {
        data: vec![0xff, 0xd8, 0xff, 0xd9],
        metadata: VideoMetadata {
            duration: 1200,
            file_size: 4,
            resolution: "1280x720".into(),
            mime_type: "video/webm".into(),
            timestamp,
            filename: "pagewatch-20260501-100000.webm".into(),
        },
    });
    DemoRecord {
        demo_name: "checkout".into(),
        test_plan_id: "plan-1".into(),
        timestamp,
        duration: 1200,
        file_size: if with_video { 4 } else { 0 },
        resolution: with_video.then(|| "1280x720".to_string()),
        status: RunStatus::Complete,
        passed: results.passed,
        summary: results.summary.clone(),
        video,
        thumbnail: Some("data:image/png;base64,iVBORw0KGgo=".into()),
        results,
        test_plan: plan,
    }
}

#[test]
fn save_then_load_keeps_record_and_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), 30);
    store.init().unwrap();

    let id = store.save(&record(2, true)).unwrap();
    let run_dir = dir.path().join("runs/2026-05-02").join(&id);
    assert!(run_dir.join("record.json").exists());
    assert!(run_dir.join("video.webm").exists());
    assert!(run_dir.join("thumbnail.png").exists());

    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.summary, "1/1 steps passed");
    assert_eq!(loaded.test_plan.steps.len(), 1);
    let video = loaded.video.clone().unwrap();
    assert_eq!(video.mime_type, "video/webm");
    assert_eq!(store.read_file(&id, &video).unwrap(), vec![0xff, 0xd8, 0xff, 0xd9]);
    let thumb = loaded.thumbnail.unwrap();
    assert_eq!(store.read_file(&id, &thumb).unwrap()[..4], [0x89, b'P', b'N', b'G']);
}

#[test]
fn empty_recordings_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), 30);
    store.init().unwrap();
    let mut rec = record(2, true);
    if let Some(video) = rec.video.as_mut() {
        video.data.clear();
        video.metadata.file_size = 0;
    }
    let id = store.save(&rec).unwrap();
    assert!(store.load(&id).unwrap().video.is_none());
}

#[test]
fn a_fresh_store_finds_runs_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = ArtifactStore::new(dir.path(), 30);
        store.init().unwrap();
        store.save(&record(3, false)).unwrap()
    };
    let reopened = ArtifactStore::new(dir.path(), 30);
    assert_eq!(reopened.load(&id).unwrap().demo_name, "checkout");
}

#[test]
fn list_is_newest_first_and_skips_corrupt_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), 30);
    store.init().unwrap();
    let older = store.save(&record(1, false)).unwrap();
    let newer = store.save(&record(4, true)).unwrap();

    let broken = dir.path().join("runs/2026-05-03/broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("record.json"), b"{not json").unwrap();
    fs::create_dir_all(dir.path().join("runs/2026-05-03/unfinished")).unwrap();

    let listed = store.list().unwrap();
    let ids: Vec<_> = listed.iter().map(|run| run.id.as_str()).collect();
    assert_eq!(ids, vec![newer.as_str(), older.as_str()]);
    assert!(listed[0].has_video);
    assert!(!listed[1].has_video);
}

#[test]
fn unknown_and_corrupt_ids_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), 30);
    store.init().unwrap();
    let err = store.load("missing").unwrap_err();
    assert!(err.is_not_found());

    let broken = dir.path().join("runs/2026-05-03/broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("record.json"), b"[]").unwrap();
    let err = store.load("broken").unwrap_err();
    assert!(matches!(err.kind(), StoreErrKind::Corrupt(_)));
}

#[test]
fn sweep_removes_days_past_retention() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), 7);
    store.init().unwrap();
    let old = store.save(&record(1, false)).unwrap();
    let kept = store.save(&record(9, false)).unwrap();
    fs::create_dir_all(dir.path().join("runs/scratch")).unwrap();

    let now = Utc.with_ymd_and_hms(2026, 5, 12, 8, 0, 0).unwrap();
    let stats = store.sweep_at(now).unwrap();
    assert_eq!(stats.removed_runs, 1);
    assert!(store.load(&old).unwrap_err().is_not_found());
    assert!(store.load(&kept).is_ok());
    assert!(dir.path().join("runs/scratch").exists());
}
