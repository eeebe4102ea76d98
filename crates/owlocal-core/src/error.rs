use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OwlocalError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("sequence '{package}/{sequence}' references unknown action '{component}'")]
    UnknownSequenceComponent {
        package: String,
        sequence: String,
        component: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OwlocalError>;
