pub mod batch;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod resize;
pub mod stats;
pub mod transform;

pub use batch::{plan, run, BatchPlan, BatchReport, WorkItem};
pub use config::PreprocessConfig;
pub use device::ExecutionTarget;
pub use discovery::OutputFormat;
pub use error::{ItemError, PrepError};
pub use resize::{ResizeFilter, Resizer, TargetSize};

/// fmt subscriber on stderr, `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
