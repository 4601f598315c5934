use crate::daemon::types::GovError;

use std::{fs, os, path};

const ALLOWED_PREFIXES: [&str; 2] = ["/proc/", "/sys/"];

fn validate_path_secure(path_str: &str) -> Result<(), GovError> {
    let path = path::Path::new(path_str);
    let canonical_path = fs::canonicalize(path).map_err(|e| {
        GovError::InvalidPath(format!("Path resolution failed for {path_str}: {e}"))
    })?;
    let canonical_str = canonical_path
        .to_str()
        .ok_or_else(|| GovError::InvalidPath("Non-UTF8 path".to_string()))?;
    if ALLOWED_PREFIXES
        .iter()
        .any(|&prefix| canonical_str.starts_with(prefix))
    {
        Ok(())
    } else {
        Err(GovError::PermissionDenied(format!(
            "Access denied: {canonical_str}"
        )))
    }
}

pub fn open_file_for_write(path: &str) -> Result<fs::File, GovError> {
    validate_path_secure(path)?;
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(GovError::IoError)
}

pub fn open_file_for_read(path: &str) -> Result<fs::File, GovError> {
    validate_path_secure(path)?;
    fs::OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(GovError::IoError)
}

/// Rewrites a single integer value at offset 0, newline-terminated, without
/// heap allocation. Sysfs attribute files want exactly this shape.
pub fn write_to_stream(file: &mut fs::File, value: u64) -> Result<(), GovError> {
    let mut buffer = itoa::Buffer::new();
    let formatted_str = buffer.format(value);
    let mut write_buf = [0u8; 32];
    let bytes = formatted_str.as_bytes();
    let len = bytes.len();
    let fd = os::fd::AsFd::as_fd(file);
    if len < write_buf.len() {
        write_buf[..len].copy_from_slice(bytes);
        write_buf[len] = b'\n';
        rustix::io::pwrite(fd, &write_buf[..=len], 0).map_err(|e| {
            log::warn!("Write via rustix::pwrite failed: {e}");
            GovError::IoError(e.into())
        })?;
    } else {
        rustix::io::pwrite(fd, bytes, 0).map_err(|e| {
            log::warn!("Write via rustix::pwrite failed: {e}");
            GovError::IoError(e.into())
        })?;
    }
    Ok(())
}

pub fn read_trimmed(path: &str) -> Result<String, GovError> {
    validate_path_secure(path)?;
    let content = fs::read_to_string(path).map_err(GovError::IoError)?;
    Ok(content.trim().to_string())
}
