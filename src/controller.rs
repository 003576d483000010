//! Generation lifecycle controller.
//!
//! [`GenerationController`] starts a job on the server, polls it on a fixed
//! interval, interprets each reply through [`StateMachine`] and reports to a
//! [`DisplaySink`]. Requests run as spawned tasks; only the timer is ever
//! cancelled, so a reply can arrive after its job ended. Every reply carries
//! a [`Ticket`] and is dropped unless it belongs to the current job and the
//! controller is still `Polling`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PartgenConfig;
use crate::engine::{
    Command, EngineError, RequestChannel, SubmissionResult, command_payload, parse_status,
};
use crate::error::ControllerError;
use crate::state_machine::{
    ActiveJob, ControllerState, DownloadLink, FailureKind, GenerationReport, JobId, JobOutcome,
    JobParameters, StateMachine, Transition,
};
use crate::ui::{DisplaySink, Progress};

pub const WORKING_MESSAGE: &str = "Working... This may take up to two minutes...";
pub const COMMUNICATION_ERROR_MESSAGE: &str = "Server communication error";

/// Fixed settings shared by every job a controller runs.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Engine endpoint path passed to [`RequestChannel::send`].
    pub engine_path: String,
    /// Absolute artifact endpoint; download links are `<endpoint>?name=<file>`.
    pub artifact_endpoint: Url,
    pub poll_interval: Duration,
    /// Where to save finished artifacts. `None` only reports the link.
    pub download_dir: Option<PathBuf>,
}

impl ControllerSettings {
    pub fn from_config(config: &PartgenConfig, artifact_endpoint: Url) -> Self {
        Self {
            engine_path: config.engine_path.clone(),
            artifact_endpoint,
            poll_interval: config.poll_interval(),
            download_dir: config.artifact_dir(),
        }
    }
}

/// Identifies the request a reply answers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    job: JobId,
    command: Command,
}

#[derive(Debug)]
struct Reply {
    ticket: Ticket,
    result: Result<Value, EngineError>,
}

/// Drives one generation job at a time.
pub struct GenerationController<C, S> {
    channel: Arc<C>,
    settings: ControllerSettings,
    state: ControllerState,
    job: Option<ActiveJob>,
    sink: Option<S>,
    timer: Option<Interval>,
    in_flight: JoinSet<Reply>,
}

impl<C: RequestChannel, S: DisplaySink> GenerationController<C, S> {
    pub fn new(channel: Arc<C>, settings: ControllerSettings) -> Self {
        Self {
            channel,
            settings,
            state: ControllerState::Idle,
            job: None,
            sink: None,
            timer: None,
            in_flight: JoinSet::new(),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    #[cfg(test)]
    fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    #[cfg(test)]
    fn parameters(&self) -> Option<&JobParameters> {
        self.job.as_ref().map(|j| &j.parameters)
    }

    /// Start a new job and send its `Start` request without waiting for the reply.
    ///
    /// Rejected while another job is still polling; that job is left untouched.
    pub fn start(
        &mut self,
        parameters: JobParameters,
        mut sink: S,
    ) -> Result<JobId, ControllerError> {
        let next = StateMachine::begin(&self.state, self.job.as_ref().map(|j| &j.id))?;

        sink.set_progress(Progress::Indeterminate);
        let job = ActiveJob::new(parameters);
        let id = job.id.clone();
        info!(job = %id, params = job.parameters.len(), "starting generation job");

        self.job = Some(job);
        self.sink = Some(sink);
        self.timer = None;
        self.state = next;
        self.dispatch(Command::Start);
        Ok(id)
    }

    /// Send one `Check` request for the current job.
    ///
    /// Returns `false` without sending anything unless a job is polling. A
    /// tick can fire after the timer was cancelled, so this guard is what
    /// stops stray checks.
    pub fn poll(&mut self) -> bool {
        if !self.state.is_polling() || self.job.is_none() {
            debug!(state = %self.state, "poll ignored");
            return false;
        }
        if let Some(job) = self.job.as_mut() {
            job.checks_sent += 1;
        }
        self.dispatch(Command::Check);
        true
    }

    /// Drive the current job until it reaches a terminal state.
    ///
    /// Replies are polled before timer ticks, so a reply that is already
    /// waiting is interpreted before another check goes out.
    pub async fn run(&mut self) -> Result<JobOutcome, ControllerError> {
        if self.job.is_none() {
            return Err(ControllerError::NoActiveJob);
        }

        loop {
            if let ControllerState::Terminated(outcome) = &self.state {
                return Ok(outcome.clone());
            }

            let has_timer = self.timer.is_some();
            tokio::select! {
                biased;

                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok(reply) => self.handle_reply(reply).await,
                    Err(e) => warn!(error = %e, "request task failed"),
                },
                _ = next_tick(&mut self.timer), if has_timer => {
                    self.poll();
                }
                else => {
                    // Nothing in flight and no timer: the Start request was
                    // lost and no tick will ever retry it.
                    warn!("no request in flight and no timer scheduled");
                    self.terminate(FailureKind::Unreachable);
                }
            }
        }
    }

    /// Summary of the current job once it has terminated.
    pub fn report(&self) -> Option<GenerationReport> {
        match (&self.state, &self.job) {
            (ControllerState::Terminated(outcome), Some(job)) => {
                Some(GenerationReport::from_job(job, outcome))
            }
            _ => None,
        }
    }

    /// Send a one-shot `Submit` command with form data. Never polls or retries.
    pub async fn submit(&self, data: &JobParameters) -> Result<SubmissionResult, EngineError> {
        let payload = command_payload(data, Command::Submit);
        let body = self.channel.send(&self.settings.engine_path, payload).await?;
        let result = SubmissionResult::from_body(&body);
        info!(accepted = result.is_accepted(), "submission answered");
        Ok(result)
    }

    fn dispatch(&mut self, command: Command) {
        let Some(job) = self.job.as_ref() else {
            return;
        };
        let ticket = Ticket {
            job: job.id.clone(),
            command,
        };
        let payload = command_payload(&job.parameters, command);
        let channel = Arc::clone(&self.channel);
        let endpoint = self.settings.engine_path.clone();

        debug!(job = %ticket.job, %command, "sending request");
        self.in_flight.spawn(async move {
            let result = channel.send(&endpoint, payload).await;
            Reply { ticket, result }
        });
    }

    async fn handle_reply(&mut self, reply: Reply) {
        let current = self.job.as_ref().map(|j| &j.id);
        if !self.state.is_polling() || current != Some(&reply.ticket.job) {
            debug!(job = %reply.ticket.job, command = %reply.ticket.command, "ignoring stale reply");
            return;
        }

        let body = match reply.result {
            Ok(body) => body,
            Err(e) => {
                warn!(command = %reply.ticket.command, error = %e, "request failed, retrying on next tick");
                if let Some(job) = self.job.as_mut() {
                    job.transport_failures += 1;
                }
                self.show_message(COMMUNICATION_ERROR_MESSAGE);
                return;
            }
        };

        let status = parse_status(&body);
        debug!(command = %reply.ticket.command, ?status, "reply received");
        match StateMachine::interpret(status, self.timer.is_some()) {
            Transition::KeepPolling { schedule_timer } => {
                self.show_message(WORKING_MESSAGE);
                if schedule_timer {
                    self.schedule_timer();
                }
            }
            Transition::Finish(filename) => {
                let link = DownloadLink::new(&self.settings.artifact_endpoint, &filename);
                self.finish(link).await;
            }
            Transition::Fail(kind) => self.terminate(kind),
        }
    }

    fn schedule_timer(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let period = self.settings.poll_interval;
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        debug!(period_ms = period.as_millis() as u64, "poll timer scheduled");
    }

    fn end_job(&mut self, transition: Transition, outcome: JobOutcome) {
        self.timer = None;
        self.state = StateMachine::advance(&self.state, &transition, || outcome);
        if let Some(sink) = self.sink.as_mut() {
            sink.set_progress(Progress::Percent(100));
        }
    }

    fn terminate(&mut self, kind: FailureKind) {
        info!(reason = %kind, "generation failed");
        if let FailureKind::Protocol(raw) = &kind {
            warn!(%raw, "unexpected reply from server");
        }
        self.show_message(&kind.to_string());
        self.end_job(Transition::Fail(kind.clone()), JobOutcome::Failure(kind));
    }

    async fn finish(&mut self, link: DownloadLink) {
        info!(artifact = %link, "generation finished");
        self.end_job(
            Transition::Finish(link.filename().to_string()),
            JobOutcome::Success(link.clone()),
        );
        self.show_message(&format!(
            "Ready! Download it from {link} if it doesn't begin automatically"
        ));

        let Some(dir) = self.settings.download_dir.clone() else {
            return;
        };
        match self.save_artifact(&link, &dir).await {
            Ok(path) => {
                info!(path = %path.display(), "artifact saved");
                self.show_message(&format!("Ready! Saved {} (from {link})", path.display()));
            }
            Err(e) => {
                warn!(error = %e, "artifact download failed");
                self.show_message(&format!(
                    "Ready! Download failed ({e}); fetch it from {link}"
                ));
            }
        }
    }

    async fn save_artifact(&self, link: &DownloadLink, dir: &Path) -> anyhow::Result<PathBuf> {
        let bytes = self.channel.fetch_artifact(link).await?;
        // The filename is the server's token; only its last component is used locally.
        let name = Path::new(link.filename())
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("artifact.stl"));
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    fn show_message(&mut self, text: &str) {
        if let Some(sink) = self.sink.as_mut() {
            sink.set_message(text);
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
