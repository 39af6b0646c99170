use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDate;

use super::layout::parse_day;

/// Removes every day directory strictly older than `cutoff` and returns how many run
/// directories went with them. Entries whose name is not a date are left alone.
pub fn sweep_days(runs_root: &Path, cutoff: NaiveDate) -> io::Result<usize> {
    if !runs_root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(runs_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(day) = name.to_str().and_then(parse_day) else {
            continue;
        };
        if day < cutoff {
            let runs = fs::read_dir(entry.path())?.count();
            fs::remove_dir_all(entry.path())?;
            removed += runs;
        }
    }
    Ok(removed)
}
