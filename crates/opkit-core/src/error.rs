//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid base64 archive encoding: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Invalid archive: {message}")]
    Archive { message: String },

    #[error("Malformed manifest{}: {message}", source_suffix(.source_name))]
    Manifest {
        source_name: Option<String>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    pub(crate) fn manifest(source_name: Option<&str>, message: impl Into<String>) -> Self {
        Self::Manifest {
            source_name: source_name.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether this error came from decoding the archive container itself
    /// (base64, gzip or tar) rather than from a manifest inside it
    pub fn is_decode_error(&self) -> bool {
        matches!(self, CoreError::Decode(_) | CoreError::Archive { .. })
    }
}

fn source_suffix(source_name: &Option<String>) -> String {
    match source_name {
        Some(name) => format!(" in {}", name),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
