use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::RawResponse;
use crate::error::MisraError;

const MESSAGE_FIELD: &str = "backtext";
const JOB_ID_FIELDS: [&str; 4] = ["job_id", "jobID", "jobId", "id"];
const LOCAL_OUT_FIELD: &str = "localOut";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub message: String,
    pub job_id: Option<String>,
    pub local_out: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl StatusReport {
    fn from_object(object: &Map<String, Value>) -> Self {
        let fields: BTreeMap<String, String> = object
            .iter()
            .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
            .collect();
        let message = fields.get(MESSAGE_FIELD).cloned().unwrap_or_default();
        let job_id = JOB_ID_FIELDS
            .iter()
            .find_map(|key| fields.get(*key))
            .filter(|value| !value.is_empty())
            .cloned();
        let local_out = fields
            .get(LOCAL_OUT_FIELD)
            .filter(|value| !value.is_empty())
            .cloned();
        Self {
            message,
            job_id,
            local_out,
            fields,
        }
    }
}

pub struct ResultPayload {
    pub status: u16,
    pub local_out: Option<String>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for ResultPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultPayload")
            .field("status", &self.status)
            .field("local_out", &self.local_out)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ServerResponse {
    Error { message: String },
    NoData { message: String },
    Running(StatusReport),
    Launched(StatusReport),
    Finished(ResultPayload),
}

impl ServerResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerResponse::Error { .. } => "error",
            ServerResponse::NoData { .. } => "nodata",
            ServerResponse::Running(_) => "running",
            ServerResponse::Launched(_) => "launched",
            ServerResponse::Finished(_) => "finished",
        }
    }
}

/// Classifies one exchange.
///
/// Structured bodies never fail: anything unparseable becomes
/// [`ServerResponse::Error`]. A binary body without the `finished` header is the
/// only unrecoverable outcome.
pub fn classify(raw: RawResponse) -> Result<ServerResponse, MisraError> {
    if raw.is_structured() {
        let RawResponse { mut body, .. } = raw;
        let mut text = String::new();
        if let Err(err) = body.read_to_string(&mut text) {
            return Ok(ServerResponse::Error {
                message: format!("unreadable status payload: {err}"),
            });
        }
        let response = classify_structured(&text);
        debug!(kind = response.kind(), "classified structured response");
        return Ok(response);
    }

    if raw.header("finished").is_some() {
        debug!(status = raw.status, "classified result stream");
        let local_out = raw.header(LOCAL_OUT_FIELD).map(str::to_string);
        return Ok(ServerResponse::Finished(ResultPayload {
            status: raw.status,
            local_out,
            body: raw.body,
        }));
    }

    Err(MisraError::UnexpectedResponse { status: raw.status })
}

fn classify_structured(text: &str) -> ServerResponse {
    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            return ServerResponse::Error {
                message: "status payload is not a JSON object".to_string(),
            };
        }
        Err(err) => {
            return ServerResponse::Error {
                message: format!("malformed status payload: {err}"),
            };
        }
    };

    let report = StatusReport::from_object(&object);
    if object.contains_key("error") {
        ServerResponse::Error {
            message: report.message,
        }
    } else if object.contains_key("nodata") {
        ServerResponse::NoData {
            message: report.message,
        }
    } else if object.contains_key("launched") || object.contains_key("finished") {
        ServerResponse::Launched(report)
    } else {
        ServerResponse::Running(report)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(if *flag { "True" } else { "False" }.to_string()),
        _ => None,
    }
}
