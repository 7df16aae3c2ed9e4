use std::path::PathBuf;
use thiserror::Error;

use super::models::ProviderType;

/// Errors from re-reading a provider file.
///
/// The store is left untouched whenever one of these is returned.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Cannot open provider file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The common fields could not be decoded. Covers empty files, broken
    /// YAML and files missing the required `id` or `type`.
    #[error("Invalid provider envelope in {path}: {source}")]
    Envelope {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot rewind {path}: {source}")]
    Rewind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {provider_type} payload in {path}: {source}")]
    Payload {
        path: PathBuf,
        provider_type: ProviderType,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ProviderError {
    /// Path of the file that failed.
    pub fn path(&self) -> &PathBuf {
        match self {
            ProviderError::Open { path, .. }
            | ProviderError::Envelope { path, .. }
            | ProviderError::Rewind { path, .. }
            | ProviderError::Payload { path, .. } => path,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
