//! JSON artifacts written to and read back from `output_dir`.

use std::path::Path;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::RunResult;

/// Pretty-prints `value` to `path`, creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).map_err(|e| AppError::io(path, e))
}

pub fn read_results(path: &Path) -> Result<Vec<RunResult>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}
