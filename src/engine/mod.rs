pub mod client;
pub mod error;
pub mod types;

pub use client::{EngineClient, RequestChannel};
pub use error::EngineError;
pub use types::{Command, SubmissionResult, command_payload, parse_status};
