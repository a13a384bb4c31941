//! Utility functions for error handling
//!
//! Helpers that wrap filesystem access with errors naming the path and
//! what it was needed for.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{AnalysisError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(AnalysisError::io_error(format!(
            "File not found: {} (needed for: {purpose})",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(AnalysisError::io_error(format!(
            "Path is not a file: {} (expected a file for: {purpose})",
            path.display()
        )));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied - check file permissions",
            _ => "Failed to open file",
        };
        AnalysisError::io_error_with_source(
            format!("{context}: {} ({purpose})", path.display()),
            e,
        )
    })
}

/// Create a file, creating its parent directories first
pub fn safe_create_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent, purpose)?;
    }

    fs::File::create(path).map_err(|e| {
        AnalysisError::io_error_with_source(
            format!("Failed to create {} for: {purpose}", path.display()),
            e,
        )
    })
}

/// Make sure a directory exists, creating it if needed
pub fn ensure_directory(path: &Path, purpose: &str) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }

    if path.exists() {
        return Err(AnalysisError::io_error(format!(
            "Path is not a directory: {} (expected a directory for: {purpose})",
            path.display()
        )));
    }

    fs::create_dir_all(path).map_err(|e| {
        AnalysisError::io_error_with_source(
            format!("Failed to create directory {} for: {purpose}", path.display()),
            e,
        )
    })
}

/// Safely read a file to string with rich error information
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;

    let mut content = String::new();
    match io::Read::read_to_string(&mut file, &mut content) {
        Ok(_) => Ok(content),
        Err(e) => {
            let context = match e.kind() {
                io::ErrorKind::InvalidData => "File contains invalid UTF-8 data",
                _ => "Failed to read file content",
            };
            Err(AnalysisError::io_error_with_source(
                format!("{context}: {} ({purpose})", path.display()),
                e,
            ))
        }
    }
}
