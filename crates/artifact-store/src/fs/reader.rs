use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::{StoreErrKind, StoreError, StoreResult};

pub fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let buf = read_bytes(path)?;
    serde_json::from_slice(&buf)
        .map_err(|err| StoreErrKind::Corrupt(format!("{}: {err}", path.display())).into())
}

pub fn read_bytes(path: &Path) -> StoreResult<Vec<u8>> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::not_found(path.display().to_string()),
        _ => StoreError::from(err),
    })?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
