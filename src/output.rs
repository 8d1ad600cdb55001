use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::materialize::ResultBundle;
use crate::stats::StatFile;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
    pub job_id: Option<String>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
            job_id: None,
        }
    }

    pub fn waited(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
            job_id: None,
        }
    }

    pub fn submitted(job_id: &str) -> Self {
        Self {
            message: format!(
                "Job {job_id} submitted. If the connection is lost, run `misra resume {job_id}`."
            ),
            elapsed: None,
            job_id: Some(job_id.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmittedRecord<'a> {
    job_id: &'a str,
    resume: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let stamp = Local::now().format("%H:%M:%S");
        match event.elapsed {
            Some(elapsed) => println!(
                "[{stamp}] {} (waited {}s)",
                event.message,
                elapsed.as_secs()
            ),
            None => println!("[{stamp}] {}", event.message),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_bundle(result: &ResultBundle) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_stat(result: &StatFile) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl JsonOutput {
    /// The single line printed while a job runs: its id, as soon as the server
    /// assigns one. Every other event is silent.
    pub fn event_line(event: &ProgressEvent) -> Option<String> {
        let job_id = event.job_id.as_deref()?;
        serde_json::to_string(&SubmittedRecord {
            job_id,
            resume: format!("misra resume {job_id}"),
        })
        .ok()
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        if let Some(line) = Self::event_line(&event) {
            let mut stdout = io::stdout();
            let _ = writeln!(stdout, "{line}").and_then(|_| stdout.flush());
        }
    }
}
