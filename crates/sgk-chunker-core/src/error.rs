use thiserror::Error;

/// Construction-time failures of the pipeline stages.
///
/// Once a stage is built its transformations are infallible: per-document
/// anomalies (no markers, filtered spans, missing chapters) are absorbed and
/// logged rather than returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to compile pattern '{id}': {source}")]
    Pattern {
        id: &'static str,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
