use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Failures while wiring the process: settings, the CMS client, logging, files.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("`{key}` must be set")]
    MissingSetting { key: &'static str },
    #[error("could not build the content API client")]
    ContentClient(#[source] reqwest::Error),
    #[error("could not install the tracing subscriber")]
    Tracing(#[source] TryInitError),
    #[error("i/o failure")]
    Io(#[from] std::io::Error),
}
