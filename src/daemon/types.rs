use std::fmt;

#[derive(Debug)]
pub enum GovError {
    IoError(std::io::Error),
    SystemCheckFailed(String),
    PermissionDenied(String),
    InvalidPath(String),
    InvalidInput(String),
    StatParseError(String),
}

impl fmt::Display for GovError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovError::IoError(e) => write!(f, "I/O Error: {e}"),
            GovError::SystemCheckFailed(s) => write!(f, "System Check Failed: {s}"),
            GovError::PermissionDenied(s) => write!(f, "Permission Denied: {s}"),
            GovError::InvalidPath(s) => write!(f, "Invalid Path: {s}"),
            GovError::InvalidInput(s) => write!(f, "Invalid Input: {s}"),
            GovError::StatParseError(s) => write!(f, "Stat Parse Error: {s}"),
        }
    }
}

impl From<std::io::Error> for GovError {
    fn from(err: std::io::Error) -> Self {
        GovError::IoError(err)
    }
}
