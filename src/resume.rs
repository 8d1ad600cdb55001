use camino::Utf8Path;
use tracing::info;

use crate::client::ProfilerTransport;
use crate::domain::JobHandle;
use crate::error::MisraError;
use crate::materialize::{DestinationOrigin, ResultBundle, ResultMaterializer};
use crate::output::{ProgressEvent, ProgressSink};
use crate::poll::{Sleeper, StatusPoller};
use crate::prompt::Prompter;
use crate::response::{ServerResponse, classify};

pub struct JobResumer<'a, T: ProfilerTransport, S: Sleeper, P: Prompter + ?Sized> {
    transport: &'a T,
    poller: StatusPoller<'a, T, S>,
    materializer: ResultMaterializer<'a, P>,
}

impl<'a, T: ProfilerTransport, S: Sleeper, P: Prompter + ?Sized> JobResumer<'a, T, S, P> {
    pub fn new(
        transport: &'a T,
        poller: StatusPoller<'a, T, S>,
        materializer: ResultMaterializer<'a, P>,
    ) -> Self {
        Self {
            transport,
            poller,
            materializer,
        }
    }

    pub fn resume(&self, job_id: &str, sink: &dyn ProgressSink) -> Result<ResultBundle, MisraError> {
        let raw = self.transport.lookup(job_id)?;
        sink.event(ProgressEvent::new(format!("Obtained status of job {job_id}")));
        let response = classify(raw)?;
        info!(job_id, kind = response.kind(), "job lookup answered");

        let mut bundle = match response {
            ServerResponse::Finished(payload) => {
                let local_out = payload.local_out.clone().ok_or_else(|| {
                    MisraError::Filesystem("finished job carried no output directory".to_string())
                })?;
                let destination = self
                    .materializer
                    .prepare_destination(Utf8Path::new(&local_out), DestinationOrigin::Server)?;
                self.materializer.materialize(payload, &destination, sink)?
            }
            ServerResponse::Error { message } => return Err(MisraError::JobFailed(message)),
            ServerResponse::NoData { message } => return Err(MisraError::NoData(message)),
            ServerResponse::Running(report) | ServerResponse::Launched(report) => {
                let local_out = report.local_out.clone().ok_or_else(|| {
                    MisraError::Filesystem("job lookup carried no output directory".to_string())
                })?;
                let destination = self
                    .materializer
                    .prepare_destination(Utf8Path::new(&local_out), DestinationOrigin::Server)?;
                let handle = JobHandle::new(job_id, &destination);
                let payload = self
                    .poller
                    .poll(&handle, ServerResponse::Running(report), sink)?;
                self.materializer.materialize(payload, &destination, sink)?
            }
        };
        bundle.job_id = Some(job_id.to_string());
        Ok(bundle)
    }
}
