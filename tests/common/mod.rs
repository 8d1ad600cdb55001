#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8PathBuf;
use zip::write::SimpleFileOptions;

use misra::client::{ProfilerTransport, RawResponse};
use misra::domain::UploadFile;
use misra::error::MisraError;
use misra::output::{ProgressEvent, ProgressSink};
use misra::poll::Sleeper;

pub enum Scripted {
    Json(String),
    Archive {
        bytes: Vec<u8>,
        local_out: Option<String>,
    },
    Stat {
        name: String,
        content: String,
    },
    Fail(String),
}

impl Scripted {
    pub fn json(body: &str) -> Self {
        Scripted::Json(body.to_string())
    }

    pub fn archive(entries: &[(&str, &str)]) -> Self {
        Scripted::Archive {
            bytes: zip_bytes(entries),
            local_out: None,
        }
    }

    pub fn archive_for(entries: &[(&str, &str)], local_out: &str) -> Self {
        Scripted::Archive {
            bytes: zip_bytes(entries),
            local_out: Some(local_out.to_string()),
        }
    }

    fn into_raw(self) -> Result<RawResponse, MisraError> {
        match self {
            Scripted::Json(body) => Ok(RawResponse {
                status: 200,
                content_type: Some("application/json".to_string()),
                headers: BTreeMap::new(),
                body: Box::new(Cursor::new(body.into_bytes())),
            }),
            Scripted::Archive { bytes, local_out } => {
                let mut headers = BTreeMap::from([("finished".to_string(), "1".to_string())]);
                if let Some(local_out) = local_out {
                    headers.insert("localout".to_string(), local_out);
                }
                Ok(RawResponse {
                    status: 200,
                    content_type: Some("application/zip".to_string()),
                    headers,
                    body: Box::new(Cursor::new(bytes)),
                })
            }
            Scripted::Stat { name, content } => Ok(RawResponse {
                status: 200,
                content_type: Some("text/csv".to_string()),
                headers: BTreeMap::from([("name".to_string(), name)]),
                body: Box::new(Cursor::new(content.into_bytes())),
            }),
            Scripted::Fail(message) => Err(MisraError::Http(message)),
        }
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    pub submit_responses: Mutex<VecDeque<Scripted>>,
    pub status_responses: Mutex<VecDeque<Scripted>>,
    pub lookup_responses: Mutex<VecDeque<Scripted>>,
    pub stat_responses: Mutex<VecDeque<Scripted>>,
    pub taxon_queries: Mutex<Vec<String>>,
    pub submissions: Mutex<Vec<(Vec<(String, String)>, Vec<UploadFile>)>>,
    pub status_queries: Mutex<Vec<Vec<(String, String)>>>,
    pub lookups: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn with_submit(self, response: Scripted) -> Self {
        self.submit_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_status(self, response: Scripted) -> Self {
        self.status_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_lookup(self, response: Scripted) -> Self {
        self.lookup_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_stat(self, response: Scripted) -> Self {
        self.stat_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn status_count(&self) -> usize {
        self.status_queries.lock().unwrap().len()
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

fn next(queue: &Mutex<VecDeque<Scripted>>) -> Result<RawResponse, MisraError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .ok_or_else(|| MisraError::Http("no scripted response left".to_string()))?
        .into_raw()
}

impl ProfilerTransport for ScriptedTransport {
    fn submit(
        &self,
        fields: &[(String, String)],
        files: &[UploadFile],
    ) -> Result<RawResponse, MisraError> {
        self.submissions
            .lock()
            .unwrap()
            .push((fields.to_vec(), files.to_vec()));
        next(&self.submit_responses)
    }

    fn status(&self, fields: &[(String, String)]) -> Result<RawResponse, MisraError> {
        self.status_queries.lock().unwrap().push(fields.to_vec());
        next(&self.status_responses)
    }

    fn lookup(&self, job_id: &str) -> Result<RawResponse, MisraError> {
        self.lookups.lock().unwrap().push(job_id.to_string());
        next(&self.lookup_responses)
    }

    fn db_stat(&self) -> Result<RawResponse, MisraError> {
        next(&self.stat_responses)
    }

    fn taxon_stat(&self, taxon_id: &str) -> Result<RawResponse, MisraError> {
        self.taxon_queries.lock().unwrap().push(taxon_id.to_string());
        next(&self.stat_responses)
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
    pub job_ids: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.contains(needle))
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        if let Some(job_id) = event.job_id {
            self.job_ids.lock().unwrap().push(job_id);
        }
        self.messages.lock().unwrap().push(event.message);
    }
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// Relative path to content for every file below `root`.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(relative, fs::read(&path).unwrap());
        }
    }
}
