use thiserror::Error;

use crate::engine::EngineError;
use crate::state_machine::JobId;

#[derive(Debug, Error)]
pub enum PartgenError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misuse of a generation controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Generation job {0} is already in flight")]
    JobInFlight(JobId),

    #[error("No generation job has been started")]
    NoActiveJob,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_error_converts() {
        let id = JobId::new();
        let err: PartgenError = ControllerError::JobInFlight(id.clone()).into();
        assert_eq!(
            err.to_string(),
            format!("Controller error: Generation job {id} is already in flight")
        );
    }

    #[test]
    fn invalid_parameter_display() {
        let err = PartgenError::InvalidParameter {
            name: "col_min".into(),
            reason: "not a number".into(),
        };
        assert_eq!(err.to_string(), "Invalid parameter col_min: not a number");
    }
}
