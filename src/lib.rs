//! Uploads screen recordings to YouTube with metadata derived from the file name.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filename_date;
pub mod metadata;
pub mod reporter;
pub mod workflow;

pub use catalog::{Category, CategoryCatalog};
pub use config::UploaderConfig;
pub use error::UploaderError;
pub use reporter::ProgressReporter;
pub use workflow::{run, run_cli};

/// Initialize tracing for the CLI binaries. Logs go to stderr so stdout stays readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
