use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::error::MisraError;

static EXPERIMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[SED]RX\d+$").unwrap());
static STUDY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[SED]RP\d+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentId(String);

impl ExperimentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExperimentId {
    type Err = MisraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !EXPERIMENT_RE.is_match(&normalized) {
            return Err(MisraError::InvalidScopeId {
                kind: "experiment",
                value: value.to_string(),
            });
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StudyId(String);

impl StudyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StudyId {
    type Err = MisraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !STUDY_RE.is_match(&normalized) {
            return Err(MisraError::InvalidScopeId {
                kind: "study",
                value: value.to_string(),
            });
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxonId(String);

impl TaxonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxonId {
    type Err = MisraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() || !normalized.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(MisraError::InvalidScopeId {
                kind: "taxon",
                value: value.to_string(),
            });
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    pub experiments: Vec<ExperimentId>,
    pub studies: Vec<StudyId>,
    pub taxa: Vec<TaxonId>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.studies.is_empty() && self.taxa.is_empty()
    }
}

pub fn parse_id_list<T>(value: &str) -> Result<Vec<T>, MisraError>
where
    T: FromStr<Err = MisraError>,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse)
        .collect()
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    Mirna,
    Spike,
    Libs,
    LibsG,
    Download,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Mirna => "mirna",
            AnalysisMode::Spike => "spike",
            AnalysisMode::Libs => "libs",
            AnalysisMode::LibsG => "libsG",
            AnalysisMode::Download => "download",
        }
    }

    /// Upload roles the mode needs, in the order they map to `fn1`, `fn2`.
    pub fn file_roles(&self) -> &'static [FileRole] {
        match self {
            AnalysisMode::Mirna => &[FileRole::Mature, FileRole::Hairpin],
            AnalysisMode::Spike => &[FileRole::SpikeFile],
            AnalysisMode::Libs | AnalysisMode::LibsG => &[FileRole::Libs],
            AnalysisMode::Download => &[],
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = MisraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "mirna" => Ok(AnalysisMode::Mirna),
            "spike" | "exact" => Ok(AnalysisMode::Spike),
            "libs" => Ok(AnalysisMode::Libs),
            "libsG" => Ok(AnalysisMode::LibsG),
            "download" => Ok(AnalysisMode::Download),
            other => Err(MisraError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Mature,
    Hairpin,
    SpikeFile,
    Libs,
}

impl FileRole {
    pub fn key(&self) -> &'static str {
        match self {
            FileRole::Mature => "mature",
            FileRole::Hairpin => "hairpin",
            FileRole::SpikeFile => "spikeFile",
            FileRole::Libs => "libs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub role: FileRole,
    pub path: Utf8PathBuf,
}

impl UploadFile {
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileOptions {
    pub align_type: Option<String>,
    pub mismatches: Option<u32>,
    pub max_multiplicity: Option<u32>,
    pub min_read_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub separator: String,
    pub min_read_length: Option<u32>,
    pub max_read_length: Option<u32>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            separator: "#".to_string(),
            min_read_length: None,
            max_read_length: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub scope: Scope,
    pub mode: AnalysisMode,
    pub options: ProfileOptions,
    pub download: DownloadOptions,
    pub files: Vec<UploadFile>,
    pub destination: Utf8PathBuf,
}

impl JobRequest {
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        let mut push = |key: &str, value: String| fields.push((key.to_string(), value));

        push("type", "profiler".to_string());
        push("mode", self.mode.as_str().to_string());
        if !self.scope.experiments.is_empty() {
            push(
                "experiments",
                join_ids(self.scope.experiments.iter().map(ExperimentId::as_str)),
            );
        }
        if !self.scope.studies.is_empty() {
            push(
                "studies",
                join_ids(self.scope.studies.iter().map(StudyId::as_str)),
            );
        }
        if !self.scope.taxa.is_empty() {
            push("taxonID", join_ids(self.scope.taxa.iter().map(TaxonId::as_str)));
        }
        if let Some(align_type) = &self.options.align_type {
            push("alignType", align_type.clone());
        }
        if let Some(mm) = self.options.mismatches {
            push("mm", mm.to_string());
        }
        if let Some(max) = self.options.max_multiplicity {
            push("max", max.to_string());
        }
        if let Some(min_rc) = self.options.min_read_count {
            push("minRC", min_rc.to_string());
        }
        if self.mode == AnalysisMode::Download {
            push("sep", self.download.separator.clone());
            if let Some(min) = self.download.min_read_length {
                push("minReadLength", min.to_string());
            }
            if let Some(max) = self.download.max_read_length {
                push("maxReadLength", max.to_string());
            }
        }
        for (index, file) in self.files.iter().enumerate() {
            push(&format!("fn{}", index + 1), file.file_name().to_string());
        }
        push("localOut", self.destination.to_string());
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub destination: Utf8PathBuf,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, destination: impl AsRef<Utf8Path>) -> Self {
        Self {
            job_id: job_id.into(),
            destination: destination.as_ref().to_path_buf(),
        }
    }
}
