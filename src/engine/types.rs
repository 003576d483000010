//! Wire format of the `/engine` endpoint.
//!
//! Every request is a flat JSON object: the job parameters plus a `Command`
//! discriminator. Replies use capitalised field names (`Status`, `Filename`,
//! `ErrMessage`, `Confirm`), mapped here with `serde(rename)`.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::state_machine::{JobParameters, JobStatus};

/// Command discriminator multiplexed over the single engine endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Check,
    Submit,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "Start",
            Command::Check => "Check",
            Command::Submit => "Submit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build `{ ...params, "Command": command }`. The discriminator wins over a
/// parameter that happens to be named `Command`.
pub fn command_payload(params: &JobParameters, command: Command) -> Value {
    let mut body = serde_json::Map::new();
    for (name, value) in params.iter() {
        body.insert(name.to_string(), value.to_json());
    }
    body.insert("Command".into(), Value::String(command.as_str().into()));
    Value::Object(body)
}

/// Reply to a Start or Check request.
#[derive(Debug, Clone, Deserialize)]
struct StatusResponse {
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "Filename")]
    filename: Option<String>,
    #[serde(rename = "ErrMessage")]
    err_message: Option<String>,
}

/// Classify a Start/Check reply body.
///
/// Never fails: bodies that do not match the protocol become
/// [`JobStatus::Unknown`] carrying the raw status (or the raw body when there
/// is no usable status string).
pub fn parse_status(body: &Value) -> JobStatus {
    let Ok(resp) = serde_json::from_value::<StatusResponse>(body.clone()) else {
        return JobStatus::Unknown {
            raw: body.to_string(),
        };
    };

    match (resp.status.as_deref(), resp.filename) {
        (Some("Working"), _) => JobStatus::Working,
        (Some("Ready"), Some(filename)) => JobStatus::Ready { filename },
        (Some("Error"), _) => JobStatus::Error {
            message: resp
                .err_message
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        (Some(other), _) => JobStatus::Unknown {
            raw: other.to_string(),
        },
        (None, _) => JobStatus::Unknown {
            raw: body.to_string(),
        },
    }
}

/// Reply to a Submit request.
#[derive(Debug, Clone, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "Confirm")]
    confirm: Option<Value>,
    #[serde(rename = "ErrMessage")]
    err_message: Option<String>,
}

/// Result of a one-shot form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted { confirmation: Option<String> },
    Rejected { message: Option<String> },
}

impl SubmissionResult {
    pub fn from_body(body: &Value) -> Self {
        let Ok(resp) = serde_json::from_value::<SubmitResponse>(body.clone()) else {
            return SubmissionResult::Rejected { message: None };
        };

        if resp.status.as_deref() == Some("OK") {
            let confirmation = resp.confirm.and_then(|c| match c {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            });
            SubmissionResult::Accepted { confirmation }
        } else {
            SubmissionResult::Rejected {
                message: resp.err_message,
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted { .. })
    }

    /// User-facing text for this result.
    pub fn message(&self) -> String {
        match self {
            SubmissionResult::Accepted {
                confirmation: Some(c),
            } => format!("Submission succeeded. Your confirmation number is {c}."),
            SubmissionResult::Accepted { confirmation: None } => "Submission succeeded.".into(),
            SubmissionResult::Rejected { message: Some(m) } => format!("Error occurred: {m}"),
            SubmissionResult::Rejected { message: None } => "Unknown error occurred".into(),
        }
    }
}
