use camino::Utf8PathBuf;
use tracing::info;

use crate::client::ProfilerTransport;
use crate::domain::{JobHandle, JobRequest};
use crate::error::MisraError;
use crate::materialize::{DestinationOrigin, ResultBundle, ResultMaterializer};
use crate::output::{ProgressEvent, ProgressSink};
use crate::poll::{PollPolicy, Sleeper, StatusPoller};
use crate::prompt::Prompter;
use crate::resume::JobResumer;
use crate::response::ServerResponse;
use crate::submit::JobSubmitter;

pub struct App<T: ProfilerTransport, S: Sleeper> {
    transport: T,
    sleeper: S,
    policy: PollPolicy,
    working_dir: Option<Utf8PathBuf>,
}

impl<T: ProfilerTransport, S: Sleeper> App<T, S> {
    pub fn new(transport: T, sleeper: S, policy: PollPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// The destination is checked before anything is sent, so a declined
    /// overwrite costs no server job.
    pub fn run(
        &self,
        request: &JobRequest,
        prompter: &dyn Prompter,
        sink: &dyn ProgressSink,
    ) -> Result<ResultBundle, MisraError> {
        let materializer = self.materializer(prompter);
        let destination =
            materializer.prepare_destination(&request.destination, DestinationOrigin::Local)?;

        let response = JobSubmitter::new(&self.transport).submit(request)?;
        let (job_id, payload) = match response {
            ServerResponse::Finished(payload) => (None, payload),
            ServerResponse::Error { message } => {
                sink.event(ProgressEvent::new(format!("job failed: {message}")));
                return Err(MisraError::JobFailed(message));
            }
            ServerResponse::NoData { message } => {
                sink.event(ProgressEvent::new(message.clone()));
                return Err(MisraError::NoData(message));
            }
            ServerResponse::Launched(report) | ServerResponse::Running(report) => {
                let job_id = report.job_id.clone().ok_or(MisraError::MissingJobId)?;
                info!(%job_id, "job accepted");
                sink.event(ProgressEvent::submitted(&job_id));
                let handle = JobHandle::new(&job_id, &destination);
                let payload = self.poller().poll(
                    &handle,
                    ServerResponse::Launched(report),
                    sink,
                )?;
                (Some(job_id), payload)
            }
        };

        let mut bundle = materializer.materialize(payload, &destination, sink)?;
        bundle.job_id = job_id;
        Ok(bundle)
    }

    pub fn resume(
        &self,
        job_id: &str,
        prompter: &dyn Prompter,
        sink: &dyn ProgressSink,
    ) -> Result<ResultBundle, MisraError> {
        JobResumer::new(
            &self.transport,
            self.poller(),
            self.materializer(prompter),
        )
        .resume(job_id, sink)
    }

    fn materializer<'a>(
        &'a self,
        prompter: &'a dyn Prompter,
    ) -> ResultMaterializer<'a, dyn Prompter + 'a> {
        ResultMaterializer::new(prompter).with_working_dir(self.working_dir.clone())
    }

    fn poller(&self) -> StatusPoller<'_, T, S> {
        StatusPoller::new(&self.transport, &self.sleeper, self.policy)
    }
}
