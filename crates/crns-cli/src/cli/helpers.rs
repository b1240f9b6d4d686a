use super::CliError;
use crns_core::common::ProcessingConfig;
use crns_core::domain::CrnsError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let text = fs::read_to_string(path).map_err(|source| {
        CliError::Compute(CrnsError::io_system(
            "IO.READ",
            format!("failed to read {what} '{}': {source}", path.display()),
        ))
    })?;
    serde_json::from_str(&text).map_err(|source| {
        CliError::Compute(CrnsError::input_validation(
            "INPUT.JSON",
            format!("failed to parse {what} '{}': {source}", path.display()),
        ))
    })
}

pub(super) fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| {
                CliError::Compute(CrnsError::io_system(
                    "IO.WRITE",
                    format!(
                        "failed to create directory for {what} '{}': {source}",
                        path.display()
                    ),
                ))
            })?;
        }
    }
    let text = serde_json::to_string_pretty(value).map_err(|source| {
        CliError::Compute(CrnsError::internal(
            "IO.SERIALIZE",
            format!("failed to serialize {what}: {source}"),
        ))
    })?;
    fs::write(path, text).map_err(|source| {
        CliError::Compute(CrnsError::io_system(
            "IO.WRITE",
            format!("failed to write {what} '{}': {source}", path.display()),
        ))
    })
}

/// Absent config path means the documented defaults.
pub(super) fn load_config(path: Option<&PathBuf>) -> Result<ProcessingConfig, CliError> {
    match path {
        Some(path) => read_json(path, "processing config"),
        None => Ok(ProcessingConfig::default()),
    }
}
