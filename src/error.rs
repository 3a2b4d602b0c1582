use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run before any item is dispatched.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("input directory does not exist: {0}")]
    MissingInputDir(PathBuf),

    #[error("input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("target size must be non-zero, got {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("no image extensions configured")]
    NoExtensions,

    #[error("no readable images found")]
    NoImages,

    #[error("accelerated execution requested but no GPU adapter is available")]
    AcceleratorUnavailable,

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Failure of a single image. Never escapes the orchestrator.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("unreadable source: {0}")]
    UnreadableSource(#[source] image::ImageError),

    #[error("accelerator resize failed: {0}")]
    Accelerator(String),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, PrepError>;
