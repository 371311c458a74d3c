use thiserror::Error;

use crate::core::fitting::FitError;
use crate::core::models::constraints::ConstraintError;
use crate::core::qm::task::TaskError;
use crate::core::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Task descriptor rejected: {source}")]
    Task {
        #[from]
        source: TaskError,
    },

    #[error("Bundle store failure: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("Constraint validation failed: {source}")]
    Constraints {
        #[from]
        source: ConstraintError,
    },

    #[error("Charge fitting failed: {source}")]
    Fitting {
        #[from]
        source: FitError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
