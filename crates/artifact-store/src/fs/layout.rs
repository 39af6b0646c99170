use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

pub const RUNS_DIR: &str = "runs";
pub const RECORD_FILE: &str = "record.json";
const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn runs_root(root: &Path) -> PathBuf {
    root.join(RUNS_DIR)
}

pub fn day_dir(root: &Path, ts: DateTime<Utc>) -> PathBuf {
    let mut path = runs_root(root);
    path.push(ts.format(DAY_FORMAT).to_string());
    path
}

pub fn run_dir(root: &Path, ts: DateTime<Utc>, id: &str) -> PathBuf {
    day_dir(root, ts).join(id)
}

pub fn record_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RECORD_FILE)
}

pub fn video_file_name(extension: &str) -> String {
    format!("video.{extension}")
}

pub fn thumbnail_file_name(extension: &str) -> String {
    format!("thumbnail.{extension}")
}

/// Parses a day directory name back into its date. Foreign directories yield `None`.
pub fn parse_day(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, DAY_FORMAT).ok()
}
