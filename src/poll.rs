use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::ProfilerTransport;
use crate::domain::JobHandle;
use crate::error::MisraError;
use crate::output::{ProgressEvent, ProgressSink};
use crate::response::{ResultPayload, ServerResponse, classify};

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Fixed-delay retry policy for the status loop. Attempts are unbounded unless
/// `max_wait` caps the total time spent waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(30),
            max_wait: None,
        }
    }
}

impl PollPolicy {
    pub fn delay_for(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            self.initial_delay
        } else {
            self.interval
        }
    }
}

pub struct StatusPoller<'a, T: ProfilerTransport, S: Sleeper> {
    transport: &'a T,
    sleeper: &'a S,
    policy: PollPolicy,
}

impl<'a, T: ProfilerTransport, S: Sleeper> StatusPoller<'a, T, S> {
    pub fn new(transport: &'a T, sleeper: &'a S, policy: PollPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Follows `handle` from `initial` until the job finishes. Server-reported
    /// errors and empty results end the loop as errors without another request.
    pub fn poll(
        &self,
        handle: &JobHandle,
        initial: ServerResponse,
        sink: &dyn ProgressSink,
    ) -> Result<ResultPayload, MisraError> {
        let mut current = initial;
        let mut echo: Option<BTreeMap<String, String>> = None;
        let mut attempt = 0usize;
        let mut waited = Duration::ZERO;

        loop {
            match current {
                ServerResponse::Finished(payload) => {
                    info!(job_id = %handle.job_id, attempts = attempt, "job finished");
                    return Ok(payload);
                }
                ServerResponse::Error { message } => {
                    sink.event(ProgressEvent::new(format!("job failed: {message}")));
                    return Err(MisraError::JobFailed(message));
                }
                ServerResponse::NoData { message } => {
                    sink.event(ProgressEvent::new(message.clone()));
                    return Err(MisraError::NoData(message));
                }
                ServerResponse::Running(report) | ServerResponse::Launched(report) => {
                    if !report.message.is_empty() {
                        sink.event(if waited.is_zero() {
                            ProgressEvent::new(report.message)
                        } else {
                            ProgressEvent::waited(report.message, waited)
                        });
                    }
                    echo.get_or_insert(report.fields);
                }
            }

            let delay = self.policy.delay_for(attempt);
            if let Some(max_wait) = self.policy.max_wait
                && waited + delay > max_wait
            {
                return Err(MisraError::PollTimeout {
                    job_id: handle.job_id.clone(),
                    waited_secs: waited.as_secs(),
                });
            }
            debug!(job_id = %handle.job_id, delay_secs = delay.as_secs(), "waiting before status query");
            self.sleeper.sleep(delay);
            waited += delay;
            attempt += 1;

            let fields = status_fields(handle, echo.as_ref());
            let raw = self
                .transport
                .status(&fields)
                .map_err(|err| MisraError::PollTransport {
                    job_id: handle.job_id.clone(),
                    message: err.to_string(),
                })?;
            current = classify(raw)?;
            debug!(job_id = %handle.job_id, attempt, kind = current.kind(), "status query answered");
        }
    }
}

/// Status query form: the first structured payload echoed back, keyed by the job
/// identifier and the locally known destination.
pub fn status_fields(
    handle: &JobHandle,
    echo: Option<&BTreeMap<String, String>>,
) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = echo
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.as_str() != "job_id" && key.as_str() != "localOut")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    fields.push(("job_id".to_string(), handle.job_id.clone()));
    fields.push(("localOut".to_string(), handle.destination.to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wait_is_short() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for(50), Duration::from_secs(30));
        assert_eq!(policy.max_wait, None);
    }

    #[test]
    fn status_fields_prefer_local_handle() {
        let handle = JobHandle::new("job-7", "results");
        let echo = BTreeMap::from([
            ("launched".to_string(), "1".to_string()),
            ("job_id".to_string(), "stale".to_string()),
            ("localOut".to_string(), "/server/path".to_string()),
        ]);
        let fields = status_fields(&handle, Some(&echo));
        assert_eq!(
            fields,
            vec![
                ("launched".to_string(), "1".to_string()),
                ("job_id".to_string(), "job-7".to_string()),
                ("localOut".to_string(), "results".to_string()),
            ]
        );
    }
}
