//! Asynchronous job submission and polling.
//!
//! Jobs run on the cluster; the client only submits a description and then
//! observes the job's state by polling its status resource.
//!
//! ```text
//! submit ──► id ──► GET status ─┬─ succeeded ─────────────► Succeeded
//!                     ▲         ├─ failed / cancelled ─────► Failed
//!                     │         └─ anything else ─┬─ attempts < max ─ sleep ─┐
//!                     │                           └─ attempts = max ─► TimedOut
//!                     └───────────────────────────────────────────────────────┘
//! ```
//!
//! A rejected status response ends polling with [`Error::Poll`].

use std::fmt;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resources::{ResourceClient, job_status_path};
use crate::session::Session;

/// Pause between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Non-terminal observations tolerated before handing back to the operator.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Operation-specific job parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobParams {
    /// Compute the differences between two snapshots.
    ChangelistCreate {
        /// Older snapshot id.
        older_snapid: u64,
        /// Newer snapshot id.
        newer_snapid: u64,
        /// Keep replication state.
        retain_repstate: bool,
    },
}

impl JobParams {
    /// Job type name as the cluster knows it.
    #[must_use]
    pub const fn job_type(&self) -> &'static str {
        match self {
            Self::ChangelistCreate { .. } => "changelistcreate",
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::ChangelistCreate {
                older_snapid,
                newer_snapid,
                retain_repstate,
            } => json!({
                "retain_repstate": retain_repstate,
                "newer_snapid": newer_snapid,
                "older_snapid": older_snapid,
            }),
        }
    }
}

/// A job description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Operation parameters.
    pub params: JobParams,
    /// Scheduling priority (1 highest, 10 lowest).
    pub priority: u8,
    /// Impact policy.
    pub policy: String,
    /// Allow a duplicate of an already queued job.
    pub allow_dup: bool,
}

impl JobSpec {
    /// Changelist between two snapshots at priority 5, low impact.
    pub fn changelist(older_snapid: u64, newer_snapid: u64) -> Result<Self> {
        if older_snapid == newer_snapid {
            return Err(Error::validation(format!(
                "older and newer snapshot are both {older_snapid}"
            )));
        }
        Ok(Self {
            params: JobParams::ChangelistCreate {
                older_snapid,
                newer_snapid,
                retain_repstate: false,
            },
            priority: 5,
            policy: "low".to_owned(),
            allow_dup: false,
        })
    }

    /// Request body; parameters live under `<type>_params`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let job_type = self.params.job_type();
        let mut body = json!({
            "type": job_type,
            "priority": self.priority,
            "policy": self.policy,
            "allow_dup": self.allow_dup,
        });
        if let Value::Object(map) = &mut body {
            map.insert(format!("{job_type}_params"), self.params.to_value());
        }
        body
    }
}

/// Job state as observed through polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Queued, not yet started.
    Pending,
    /// Executing.
    Running,
    /// Paused by user, system, or policy.
    Paused,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled by a user or the system.
    Cancelled,
    /// A state this client does not recognise, or no entry at all.
    Unknown(String),
}

impl JobState {
    /// Whether polling should stop on this state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl From<&str> for JobState {
    fn from(raw: &str) -> Self {
        match raw {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled_user" | "cancelled_system" => Self::Cancelled,
            "running" => Self::Running,
            "pending" | "queued" => Self::Pending,
            s if s.starts_with("paused") => Self::Paused,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown(raw) if raw.is_empty() => write!(f, "unknown"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job reported `succeeded`.
    Succeeded {
        /// Job id.
        job_id: u64,
    },
    /// The job reached a failed or cancelled state.
    Failed {
        /// Job id.
        job_id: u64,
        /// Terminal state.
        state: JobState,
    },
    /// The job was still not done after the attempt ceiling; check manually.
    TimedOut {
        /// Job id.
        job_id: u64,
        /// Observations made.
        attempts: u32,
        /// URL to check the job's status by hand.
        status_url: String,
    },
}

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between queries.
    pub interval: Duration,
    /// Non-terminal observations before timing out.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Drives submit → poll → terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobPoller {
    policy: PollPolicy,
}

impl JobPoller {
    /// Creates a poller with a custom policy.
    #[must_use]
    pub const fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submits a job and returns its id.
    pub async fn submit(&self, session: &Session, spec: &JobSpec) -> Result<u64> {
        let job_id = ResourceClient::new(session)
            .submit_job(&spec.to_body())
            .await?;
        info!(job_id, job_type = spec.params.job_type(), "job submitted");
        Ok(job_id)
    }

    /// Polls until the job is terminal or the attempt ceiling is reached.
    pub async fn await_completion(&self, session: &Session, job_id: u64) -> Result<JobOutcome> {
        self.await_completion_with(session, job_id, |_, _| Ok(())).await
    }

    /// Like [`Self::await_completion`], reporting each non-terminal
    /// observation (attempt number, state) to `on_pending`.
    ///
    /// An error from `on_pending` stops polling and is returned as is.
    pub async fn await_completion_with<F>(
        &self,
        session: &Session,
        job_id: u64,
        mut on_pending: F,
    ) -> Result<JobOutcome>
    where
        F: FnMut(u32, &JobState) -> Result<()>,
    {
        let client = ResourceClient::new(session);
        let mut attempts = 0;

        loop {
            let entries = client.job_status(job_id).await?;
            let state = entries
                .first()
                .map_or_else(|| JobState::Unknown(String::new()), |e| JobState::from(e.state.as_str()));
            debug!(job_id, %state, attempts, "job status observed");

            match state {
                JobState::Succeeded => {
                    info!(job_id, "job succeeded");
                    return Ok(JobOutcome::Succeeded { job_id });
                }
                JobState::Failed | JobState::Cancelled => {
                    info!(job_id, %state, "job ended without success");
                    return Ok(JobOutcome::Failed { job_id, state });
                }
                pending => {
                    attempts += 1;
                    if attempts >= self.policy.max_attempts {
                        let status_url = session.endpoint().url(&job_status_path(job_id));
                        info!(job_id, attempts, %status_url, "job still not done, giving up");
                        return Ok(JobOutcome::TimedOut {
                            job_id,
                            attempts,
                            status_url,
                        });
                    }
                    on_pending(attempts, &pending)?;
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use test_case::test_case;

    use super::*;
    use crate::session::tests::{mock_login, open_session};

    fn fast() -> JobPoller {
        JobPoller::new(PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    #[test]
    fn changelist_body_matches_cluster_format() {
        let spec = JobSpec::changelist(2, 3).expect("valid");
        assert_eq!(
            spec.to_body(),
            json!({
                "type": "changelistcreate",
                "changelistcreate_params": {
                    "retain_repstate": false,
                    "newer_snapid": 3,
                    "older_snapid": 2,
                },
                "priority": 5,
                "policy": "low",
                "allow_dup": false,
            })
        );
    }

    #[test]
    fn changelist_against_itself_is_rejected() {
        assert!(JobSpec::changelist(4, 4).is_err());
    }

    #[test_case("succeeded", JobState::Succeeded)]
    #[test_case("failed", JobState::Failed)]
    #[test_case("cancelled_user", JobState::Cancelled)]
    #[test_case("running", JobState::Running)]
    #[test_case("paused_priority", JobState::Paused)]
    #[test_case("weird", JobState::Unknown("weird".into()))]
    fn state_parsing(raw: &str, expected: JobState) {
        assert_eq!(JobState::from(raw), expected);
    }

    #[tokio::test]
    async fn submit_returns_server_id() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/platform/7/job/jobs")
                    .json_body_partial(r#"{"type": "changelistcreate", "priority": 5}"#);
                then.status(201).json_body(json!({"id": 77}));
            })
            .await;

        let session = open_session(&server).await;
        let spec = JobSpec::changelist(2, 3).expect("valid");
        let id = fast().submit(&session, &spec).await.expect("submit");
        assert_eq!(id, 77);
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn submit_rejection_is_submit_error() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/platform/7/job/jobs");
                then.status(400);
            })
            .await;

        let session = open_session(&server).await;
        let spec = JobSpec::changelist(2, 3).expect("valid");
        let err = fast().submit(&session, &spec).await.expect_err("rejected");
        assert!(matches!(err, Error::Submit { status: 400, .. }));
    }

    #[tokio::test]
    async fn first_succeeded_observation_wins() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/platform/7/job/jobs/77");
                then.status(200)
                    .json_body(json!({"jobs": [{"id": 77, "state": "succeeded"}]}));
            })
            .await;

        let session = open_session(&server).await;
        let outcome = fast().await_completion(&session, 77).await.expect("poll");
        assert_eq!(outcome, JobOutcome::Succeeded { job_id: 77 });
        status.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn times_out_after_exactly_max_attempts() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/platform/7/job/jobs/77");
                then.status(200)
                    .json_body(json!({"jobs": [{"id": 77, "state": "running"}]}));
            })
            .await;

        let session = open_session(&server).await;
        let mut seen = Vec::new();
        let outcome = fast()
            .await_completion_with(&session, 77, |attempt, _| {
                seen.push(attempt);
                Ok(())
            })
            .await
            .expect("poll");

        assert_eq!(
            outcome,
            JobOutcome::TimedOut {
                job_id: 77,
                attempts: 10,
                status_url: format!("{}/platform/7/job/jobs/77", server.base_url()),
            }
        );
        status.assert_hits_async(10).await;
        assert_eq!(seen, (1..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn progress_error_stops_polling() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/platform/7/job/jobs/77");
                then.status(200)
                    .json_body(json!({"jobs": [{"id": 77, "state": "running"}]}));
            })
            .await;

        let session = open_session(&server).await;
        let err = fast()
            .await_completion_with(&session, 77, |_, _| {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into())
            })
            .await
            .expect_err("progress failed");

        assert!(matches!(err, Error::Io(_)));
        status.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn failed_state_is_terminal() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/platform/7/job/jobs/77");
                then.status(200)
                    .json_body(json!({"jobs": [{"id": 77, "state": "failed"}]}));
            })
            .await;

        let session = open_session(&server).await;
        let outcome = fast().await_completion(&session, 77).await.expect("poll");
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                job_id: 77,
                state: JobState::Failed
            }
        );
        status.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn rejected_status_abandons_polling() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/platform/7/job/jobs/77");
                then.status(503);
            })
            .await;

        let session = open_session(&server).await;
        let err = fast()
            .await_completion(&session, 77)
            .await
            .expect_err("poll failure");
        assert!(matches!(err, Error::Poll { status: 503, .. }));
        status.assert_hits_async(1).await;
    }
}
