use tracing::info;

use crate::client::ProfilerTransport;
use crate::domain::JobRequest;
use crate::error::MisraError;
use crate::response::{ServerResponse, classify};

pub struct JobSubmitter<'a, T: ProfilerTransport> {
    transport: &'a T,
}

impl<'a, T: ProfilerTransport> JobSubmitter<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    pub fn submit(&self, request: &JobRequest) -> Result<ServerResponse, MisraError> {
        let fields = request.form_fields();
        info!(
            mode = %request.mode,
            files = request.files.len(),
            destination = %request.destination,
            "submitting profiling job"
        );
        let raw = self.transport.submit(&fields, &request.files)?;
        classify(raw)
    }
}
