use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pagewatch_core_types::{DemoRecord, RecordingArtifact};

use crate::errors::{StoreError, StoreResult};
use crate::fs::{layout, reader, sweep, writer};
use crate::model::{RunSummary, StoredFile, StoredRun};

const TARGET: &str = "artifact-store";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed_runs: usize,
}

/// Run store rooted at a directory.
///
/// All operations are blocking filesystem calls; async callers should hop onto a blocking
/// thread.
pub struct ArtifactStore {
    root: PathBuf,
    retention_days: u32,
    dirs: Mutex<HashMap<String, PathBuf>>,
}

impl ArtifactStore {
    /// `retention_days == 0` keeps runs forever.
    pub fn new(root: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            retention_days,
            dirs: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(layout::runs_root(&self.root))?;
        debug!(target: TARGET, root = %self.root.display(), "store ready");
        Ok(())
    }

    /// Persists one run and returns its id. A failed save removes whatever it had written.
    pub fn save(&self, record: &DemoRecord) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let dir = layout::run_dir(&self.root, record.timestamp, &id);
        match self.write_run(&id, &dir, record) {
            Ok(()) => {
                info!(
                    target: TARGET,
                    id = %id,
                    demo = %record.demo_name,
                    passed = record.passed,
                    "run saved"
                );
                self.dirs.lock().insert(id.clone(), dir);
                Ok(id)
            }
            Err(err) => {
                writer::remove_dir(&dir);
                Err(err)
            }
        }
    }

    fn write_run(&self, id: &str, dir: &Path, record: &DemoRecord) -> StoreResult<()> {
        let video = match record.video.as_ref().filter(|video| !video.is_empty()) {
            Some(artifact) => Some(write_video(dir, artifact)?),
            None => None,
        };
        let thumbnail = match record.thumbnail.as_deref() {
            Some(data_url) => write_thumbnail(dir, data_url)?,
            None => None,
        };
        let stored = StoredRun {
            id: id.to_string(),
            demo_name: record.demo_name.clone(),
            test_plan_id: record.test_plan_id.clone(),
            timestamp: record.timestamp,
            duration: record.duration,
            file_size: record.file_size,
            resolution: record.resolution.clone(),
            status: record.status,
            passed: record.passed,
            summary: record.summary.clone(),
            video,
            thumbnail,
            results: record.results.clone(),
            test_plan: record.test_plan.clone(),
        };
        // The record goes last: a directory without one is an unfinished run.
        writer::write_json(layout::record_path(dir), &stored)?;
        Ok(())
    }

    /// Summaries of every readable run, newest first. Corrupt records are skipped.
    pub fn list(&self) -> StoreResult<Vec<RunSummary>> {
        let mut runs = Vec::new();
        for dir in self.run_dirs()? {
            let path = layout::record_path(&dir);
            if !path.exists() {
                continue;
            }
            match reader::read_json::<StoredRun>(&path) {
                Ok(run) => {
                    self.dirs.lock().insert(run.id.clone(), dir);
                    runs.push(RunSummary::from(&run));
                }
                Err(err) => warn!(target: TARGET, path = %path.display(), "skipping run: {}", err),
            }
        }
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    pub fn load(&self, id: &str) -> StoreResult<StoredRun> {
        let dir = self.locate(id)?;
        reader::read_json(&layout::record_path(&dir))
    }

    /// Reads a payload referenced by a stored run.
    pub fn read_file(&self, id: &str, file: &StoredFile) -> StoreResult<Vec<u8>> {
        let dir = self.locate(id)?;
        reader::read_bytes(&dir.join(&file.file))
    }

    pub fn sweep(&self) -> StoreResult<SweepStats> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> StoreResult<SweepStats> {
        if self.retention_days == 0 {
            return Ok(SweepStats::default());
        }
        let cutoff = (now - Duration::days(i64::from(self.retention_days))).date_naive();
        let removed_runs = sweep::sweep_days(&layout::runs_root(&self.root), cutoff)?;
        if removed_runs > 0 {
            self.dirs.lock().retain(|_, dir| dir.exists());
            info!(target: TARGET, removed_runs, %cutoff, "retention sweep");
        }
        Ok(SweepStats { removed_runs })
    }

    fn locate(&self, id: &str) -> StoreResult<PathBuf> {
        if let Some(dir) = self.dirs.lock().get(id) {
            return Ok(dir.clone());
        }
        let found = self
            .run_dirs()?
            .into_iter()
            .find(|dir| dir.file_name().map(|name| name == id).unwrap_or(false))
            .ok_or_else(|| StoreError::not_found(id))?;
        self.dirs.lock().insert(id.to_string(), found.clone());
        Ok(found)
    }

    fn run_dirs(&self) -> StoreResult<Vec<PathBuf>> {
        let runs_root = layout::runs_root(&self.root);
        if !runs_root.exists() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for day in fs::read_dir(&runs_root)? {
            let day = day?;
            let is_day = day
                .file_name()
                .to_str()
                .and_then(layout::parse_day)
                .is_some();
            if !is_day || !day.file_type()?.is_dir() {
                continue;
            }
            for run in fs::read_dir(day.path())? {
                let run = run?;
                if run.file_type()?.is_dir() {
                    dirs.push(run.path());
                }
            }
        }
        Ok(dirs)
    }
}

fn write_video(dir: &Path, artifact: &RecordingArtifact) -> StoreResult<StoredFile> {
    let extension = Path::new(&artifact.metadata.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
        .to_string();
    let name = layout::video_file_name(&extension);
    writer::write_atomic(dir.join(&name), &artifact.data)?;
    Ok(StoredFile {
        file: name,
        mime_type: artifact.metadata.mime_type.clone(),
        bytes: artifact.data.len() as u64,
    })
}

/// Thumbnails arrive as data URLs. One that cannot be decoded is dropped, not fatal.
fn write_thumbnail(dir: &Path, data_url: &str) -> StoreResult<Option<StoredFile>> {
    let Some((mime_type, bytes)) = decode_data_url(data_url) else {
        warn!(target: TARGET, "thumbnail is not a base64 data url; dropped");
        return Ok(None);
    };
    let extension = match mime_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    let name = layout::thumbnail_file_name(extension);
    writer::write_atomic(dir.join(&name), &bytes)?;
    Ok(Some(StoredFile {
        file: name,
        mime_type,
        bytes: bytes.len() as u64,
    }))
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and decoded bytes.
pub(crate) fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = BASE64.decode(payload.trim()).ok()?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type.to_string()
    };
    Some((mime_type, bytes))
}
