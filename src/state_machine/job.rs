use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
use uuid::Uuid;

/// A single parameter value sent to the generation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Interpret raw text (from a query string or the command line) as a
    /// number when it parses as a finite float, otherwise keep it as text.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ParamValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Ordered name/value mapping describing one generation job.
///
/// The server has no job handle of its own: it re-derives the job from these
/// parameters, so they are re-sent unchanged with every check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParameters {
    entries: Vec<(String, ParamValue)>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter. A replaced parameter keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay every entry of `other` on top of `self`.
    pub fn merge(&mut self, other: JobParameters) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for JobParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = JobParameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for JobParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JobParameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParametersVisitor;

        impl<'de> Visitor<'de> for ParametersVisitor {
            type Value = JobParameters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut params = JobParameters::new();
                while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
                    params.insert(name, value);
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(ParametersVisitor)
    }
}

/// Identifies one job started by a controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the server for a Start or Check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Working,
    Ready { filename: String },
    Error { message: String },
    /// Anything that is not one of the three known replies.
    Unknown { raw: String },
}

/// Reference to a finished artifact on the server.
///
/// The filename is an opaque server-issued token; it is only URL-encoded,
/// never validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    filename: String,
    url: Url,
}

impl DownloadLink {
    /// Build `<endpoint>?name=<filename>`.
    pub fn new(endpoint: &Url, filename: &str) -> Self {
        let mut url = endpoint.clone();
        url.query_pairs_mut().clear().append_pair("name", filename);
        Self {
            filename: filename.to_string(),
            url,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Why a job ended without an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The server reported that the job failed.
    Server(String),
    /// The server replied with something the protocol does not define.
    Protocol(String),
    /// The Start request failed and nothing is left that could retry it.
    Unreachable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Server(msg) => write!(f, "Error: {msg}"),
            FailureKind::Protocol(_) => write!(f, "Unexpected response from the server"),
            FailureKind::Unreachable => write!(f, "Could not reach the generation server"),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success(DownloadLink),
    Failure(FailureKind),
}

/// Bookkeeping for the job a controller is currently driving.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub id: JobId,
    pub parameters: JobParameters,
    pub checks_sent: u32,
    pub transport_failures: u32,
    pub started_at: DateTime<Utc>,
}

impl ActiveJob {
    pub fn new(parameters: JobParameters) -> Self {
        Self {
            id: JobId::new(),
            parameters,
            checks_sent: 0,
            transport_failures: 0,
            started_at: Utc::now(),
        }
    }
}

/// Summary produced once a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub job_id: JobId,
    pub parameters: JobParameters,
    pub succeeded: bool,
    pub artifact: Option<String>,
    pub error: Option<String>,
    pub checks_sent: u32,
    pub transport_failures: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl GenerationReport {
    pub fn from_job(job: &ActiveJob, outcome: &JobOutcome) -> Self {
        let now = Utc::now();
        let (succeeded, artifact, error) = match outcome {
            JobOutcome::Success(link) => (true, Some(link.to_string()), None),
            JobOutcome::Failure(kind) => (false, None, Some(kind.to_string())),
        };

        Self {
            job_id: job.id.clone(),
            parameters: job.parameters.clone(),
            succeeded,
            artifact,
            error,
            checks_sent: job.checks_sent,
            transport_failures: job.transport_failures,
            started_at: job.started_at,
            completed_at: now,
            duration_ms: (now - job.started_at).num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut params = JobParameters::new();
        params.insert("layer_height", 0.2);
        params.insert("col_min", 0.3);
        params.insert("layer_height", 0.1);

        let names: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["layer_height", "col_min"]);
        assert_eq!(params.get("layer_height"), Some(&ParamValue::Number(0.1)));
    }

    #[test]
    fn param_value_parse() {
        assert_eq!(ParamValue::parse("0.25"), ParamValue::Number(0.25));
        assert_eq!(ParamValue::parse("abc"), ParamValue::Text("abc".into()));
        assert_eq!(ParamValue::parse("inf"), ParamValue::Text("inf".into()));
        assert_eq!(ParamValue::Text(" 3 ".into()).as_f64(), Some(3.0));
    }

    #[test]
    fn download_link_encodes_filename() {
        let endpoint = Url::parse("http://127.0.0.1:8081/getmodel").unwrap();
        let link = DownloadLink::new(&endpoint, "part 1&2.stl");
        assert_eq!(link.filename(), "part 1&2.stl");
        assert_eq!(
            link.to_string(),
            "http://127.0.0.1:8081/getmodel?name=part+1%262.stl"
        );
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(
            FailureKind::Server("bad layer height".into()).to_string(),
            "Error: bad layer height"
        );
        assert!(FailureKind::Protocol("Banana".into())
            .to_string()
            .contains("Unexpected response"));
    }

    #[test]
    fn report_from_failed_job() {
        let params: JobParameters = [("layer_height", 0.2)].into_iter().collect();
        let mut job = ActiveJob::new(params);
        job.checks_sent = 3;
        job.transport_failures = 1;

        let report =
            GenerationReport::from_job(&job, &JobOutcome::Failure(FailureKind::Server("x".into())));
        assert_eq!(report.job_id, job.id);
        assert!(!report.succeeded);
        assert_eq!(report.error.as_deref(), Some("Error: x"));
        assert_eq!(report.checks_sent, 3);
        assert_eq!(report.transport_failures, 1);
        assert!(report.duration_ms >= 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["parameters"], serde_json::json!({"layer_height": 0.2}));
    }

    #[test]
    fn parameters_serialization_roundtrip() {
        let params: JobParameters = [
            ("layer_height", ParamValue::Number(0.2)),
            ("label", ParamValue::Text("test".into())),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"layer_height":0.2,"label":"test"}"#);
        let parsed: JobParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn parameters_deserialize_keeps_document_order() {
        let parsed: JobParameters =
            serde_json::from_str(r#"{"col_max": 1.5, "layer_height": 0.2, "col_max": 2}"#).unwrap();
        let names: Vec<&str> = parsed.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["col_max", "layer_height"]);
        assert_eq!(parsed.get("col_max"), Some(&ParamValue::Number(2.0)));
        assert!(serde_json::from_str::<JobParameters>(r#"[["a", 1]]"#).is_err());
    }
}
