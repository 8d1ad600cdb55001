use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MisraError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("no scope given")]
    #[diagnostic(help(
        "set experiments=SRX/DRX/ERX, studies=SRP/DRP/ERP (comma separated) or taxonID"
    ))]
    MissingScope,

    #[error("no analysis mode given")]
    #[diagnostic(help("set mode= to one of mirna, spike, libs, libsG, download"))]
    MissingMode,

    #[error("invalid analysis mode: {0}")]
    InvalidMode(String),

    #[error("invalid {kind} identifier: {value}")]
    InvalidScopeId { kind: &'static str, value: String },

    #[error("invalid value for {key}: {value}")]
    InvalidOption { key: &'static str, value: String },

    #[error("the {role} file could not be found: {path}")]
    MissingInputFile { role: &'static str, path: String },

    #[error("request to the profiler failed: {0}")]
    #[diagnostic(help("the web server may be down; try again later"))]
    Http(String),

    #[error("lost connection while following job {job_id}: {message}")]
    #[diagnostic(help("the job keeps running on the server; run `misra resume {job_id}` later"))]
    PollTransport { job_id: String, message: String },

    #[error("job failed: {0}")]
    #[diagnostic(help("please report the error to srnabench@gmail.com"))]
    JobFailed(String),

    #[error("{0}")]
    NoData(String),

    #[error("unexpected response from the profiler (status {status})")]
    #[diagnostic(help("please report the error to srnabench@gmail.com"))]
    UnexpectedResponse { status: u16 },

    #[error("the profiler response carried no job identifier")]
    MissingJobId,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("output directory {0} already exists and overwrite was declined")]
    OverwriteDeclined(String),

    #[error("no location chosen for output directory {0}")]
    DestinationChoice(String),

    #[error("result download failed with status {status}")]
    DownloadStatus { status: u16 },

    #[error("result archive could not be unpacked: {0}")]
    #[diagnostic(help(
        "the job finished on the server; run `misra resume <job-id>` to download it again"
    ))]
    MalformedArchive(String),

    #[error("job {job_id} did not finish within {waited_secs}s")]
    #[diagnostic(help("the job keeps running on the server; run `misra resume {job_id}` later"))]
    PollTimeout { job_id: String, waited_secs: u64 },
}
