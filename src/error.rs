use thiserror::Error;

/// Errors raised while clustering a dataset and persisting the results.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The requested algorithm is not one of the supported clustering families.
    #[error("cannot work with {name} just yet")]
    UnsupportedEstimator { name: String },

    /// The component selection does not fit within the dataset's feature columns.
    #[error("invalid component selection: {message}")]
    InvalidSelection { message: String },

    /// A flat array could not be mapped onto the declared N-dimensional coordinates.
    #[error("could not reshape to N-dimensional dataset: {message}")]
    Reshape { message: String },

    /// Writing a result group failed.
    #[error("failed to write results group {group}")]
    Persistence {
        group: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading an existing result group failed.
    #[error("failed to read existing results from {group}")]
    Storage {
        group: String,
        #[source]
        source: anyhow::Error,
    },

    /// The estimator rejected its hyperparameters or the data it was given.
    #[error("{algorithm}: {message}")]
    Estimator {
        algorithm: &'static str,
        message: String,
    },

    /// Real-valued data does not have the width the target dtype requires.
    #[error("dtype conversion failed: {message}")]
    Dtype { message: String },

    /// Labels outside of the cluster range handed to reordering.
    #[error("invalid labels: {message}")]
    InvalidLabels { message: String },

    #[error("invalid estimator configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ClusterError {
    pub(crate) fn reshape(message: impl Into<String>) -> Self {
        Self::Reshape {
            message: message.into(),
        }
    }

    pub(crate) fn selection(message: impl Into<String>) -> Self {
        Self::InvalidSelection {
            message: message.into(),
        }
    }

    pub(crate) fn dtype(message: impl Into<String>) -> Self {
        Self::Dtype {
            message: message.into(),
        }
    }

    pub(crate) fn estimator(algorithm: &'static str, message: impl Into<String>) -> Self {
        Self::Estimator {
            algorithm,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
