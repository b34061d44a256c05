use thiserror::Error;

/// Errors raised by the colony analysis pipeline.
///
/// An empty plate (zero colonies) and an undetectable dish boundary are not
/// errors; both produce a valid, possibly empty, result.
#[derive(Error, Debug)]
pub enum ColonyError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "{feature_set} requires at least {required} features, but only {} available: {}",
        .available.len(),
        join_or_none(.available)
    )]
    InsufficientFeatures {
        feature_set: String,
        required: usize,
        available: Vec<String>,
    },

    #[error("Pipeline step '{step}' needs {missing}; add the step that produces it first")]
    StageOrder { step: String, missing: &'static str },

    #[error("Need at least {required} colonies, found {found}")]
    InsufficientColonies { required: usize, found: usize },

    #[error("Need at least {required} samples, found {found}")]
    InsufficientSamples { required: usize, found: usize },

    #[error("Statistical test failed: {0}")]
    Statistics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ColonyError>;

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
