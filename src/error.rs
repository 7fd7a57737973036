use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscriber store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("subscriber store {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API rejected request: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sampler could not be run: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("sampler exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("unparseable sampler output {0:?}")]
    Parse(String),
}
