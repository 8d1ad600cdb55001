use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::domain::{
    AnalysisMode, DownloadOptions, FileRole, JobRequest, ProfileOptions, Scope, UploadFile,
    parse_id_list,
};
use crate::error::MisraError;

pub const DEFAULT_DESTINATION: &str = "misra_results";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    List(Vec<Scalar>),
}

impl Scalar {
    pub fn text(&self) -> Option<String> {
        let text = match self {
            Scalar::Text(text) => text.trim().to_string(),
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
            Scalar::List(items) => items
                .iter()
                .filter_map(Scalar::text)
                .collect::<Vec<_>>()
                .join(","),
        };
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawConfig {
    pub experiments: Option<Scalar>,
    pub studies: Option<Scalar>,
    #[serde(rename = "taxonID")]
    pub taxon_id: Option<Scalar>,
    pub mode: Option<Scalar>,
    #[serde(rename = "alignType")]
    pub align_type: Option<Scalar>,
    pub mm: Option<Scalar>,
    pub max: Option<Scalar>,
    #[serde(rename = "minRC")]
    pub min_rc: Option<Scalar>,
    #[serde(rename = "localOut")]
    pub local_out: Option<Scalar>,
    pub sep: Option<Scalar>,
    #[serde(rename = "minReadLength")]
    pub min_read_length: Option<Scalar>,
    #[serde(rename = "maxReadLength")]
    pub max_read_length: Option<Scalar>,
    pub mature: Option<Scalar>,
    pub hairpin: Option<Scalar>,
    #[serde(rename = "spikeFile")]
    pub spike_file: Option<Scalar>,
    pub libs: Option<Scalar>,
}

impl RawConfig {
    fn file(&self, role: FileRole) -> Option<String> {
        let value = match role {
            FileRole::Mature => &self.mature,
            FileRole::Hairpin => &self.hairpin,
            FileRole::SpikeFile => &self.spike_file,
            FileRole::Libs => &self.libs,
        };
        value.as_ref().and_then(Scalar::text)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Utf8Path) -> Result<JobRequest, MisraError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| MisraError::ConfigRead(path.as_std_path().to_path_buf()))?;
        let raw = if path.extension() == Some("txt") {
            info!(%path, "reading key=value config");
            Self::parse_key_value(&content)?
        } else {
            info!(%path, "reading JSON config");
            serde_json::from_str(&content).map_err(|err| MisraError::ConfigParse(err.to_string()))?
        };
        Self::resolve_config(raw)
    }

    pub fn parse_key_value(content: &str) -> Result<RawConfig, MisraError> {
        let map: BTreeMap<String, Value> = content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), Value::String(value.trim().to_string())))
            .collect();
        serde_json::from_value(Value::Object(map.into_iter().collect()))
            .map_err(|err| MisraError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(raw: RawConfig) -> Result<JobRequest, MisraError> {
        let text = |value: &Option<Scalar>| value.as_ref().and_then(Scalar::text);

        let scope = Scope {
            experiments: text(&raw.experiments)
                .map(|value| parse_id_list(&value))
                .transpose()?
                .unwrap_or_default(),
            studies: text(&raw.studies)
                .map(|value| parse_id_list(&value))
                .transpose()?
                .unwrap_or_default(),
            taxa: text(&raw.taxon_id)
                .map(|value| parse_id_list(&value))
                .transpose()?
                .unwrap_or_default(),
        };
        if scope.is_empty() {
            return Err(MisraError::MissingScope);
        }

        let mode: AnalysisMode = text(&raw.mode).ok_or(MisraError::MissingMode)?.parse()?;

        let options = ProfileOptions {
            align_type: text(&raw.align_type),
            mismatches: parse_number("mm", text(&raw.mm))?,
            max_multiplicity: parse_number("max", text(&raw.max))?,
            min_read_count: parse_number("minRC", text(&raw.min_rc))?,
        };
        let download = DownloadOptions {
            separator: text(&raw.sep).unwrap_or_else(|| DownloadOptions::default().separator),
            min_read_length: parse_number("minReadLength", text(&raw.min_read_length))?,
            max_read_length: parse_number("maxReadLength", text(&raw.max_read_length))?,
        };

        let files = mode
            .file_roles()
            .iter()
            .map(|role| {
                let path = raw.file(*role).ok_or_else(|| MisraError::MissingInputFile {
                    role: role.key(),
                    path: "<unset>".to_string(),
                })?;
                let path = Utf8PathBuf::from(path);
                if !path.as_std_path().is_file() {
                    return Err(MisraError::MissingInputFile {
                        role: role.key(),
                        path: path.to_string(),
                    });
                }
                Ok(UploadFile { role: *role, path })
            })
            .collect::<Result<Vec<_>, MisraError>>()?;

        let destination = text(&raw.local_out)
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DESTINATION));

        Ok(JobRequest {
            scope,
            mode,
            options,
            download,
            files,
            destination,
        })
    }
}

fn parse_number(key: &'static str, value: Option<String>) -> Result<Option<u32>, MisraError> {
    value
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| MisraError::InvalidOption { key, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_skips_comments_and_blank_lines() {
        let raw = ConfigLoader::parse_key_value(
            "# comment\nexperiments=SRX1,SRX2\n\nmode = download\nsep=a=b\n",
        )
        .unwrap();
        assert_eq!(raw.experiments, Some(Scalar::Text("SRX1,SRX2".to_string())));
        assert_eq!(raw.mode, Some(Scalar::Text("download".to_string())));
        assert_eq!(raw.sep, Some(Scalar::Text("a=b".to_string())));
    }

    #[test]
    fn list_scalar_joins() {
        let value = Scalar::List(vec![
            Scalar::Text("SRP1".to_string()),
            Scalar::Text(" ".to_string()),
            Scalar::Text("SRP2".to_string()),
        ]);
        assert_eq!(value.text().as_deref(), Some("SRP1,SRP2"));
    }
}
