//! Error types for audio file decoding

use thiserror::Error;

/// File layer error type
#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type alias
pub type FileResult<T> = Result<T, FileError>;
