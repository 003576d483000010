mod job;
mod state;

pub use job::{
    ActiveJob, DownloadLink, FailureKind, GenerationReport, JobId, JobOutcome, JobParameters,
    JobStatus, ParamValue,
};
pub use state::{ControllerState, StateMachine, Transition};
