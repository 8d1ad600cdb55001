use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::client::{ProfilerTransport, RawResponse};
use crate::domain::TaxonId;
use crate::error::MisraError;

const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct StatFile {
    pub path: Utf8PathBuf,
    pub preview: Vec<String>,
}

pub fn download_db_stat<T: ProfilerTransport>(
    transport: &T,
    directory: &Utf8Path,
) -> Result<StatFile, MisraError> {
    let response = transport.db_stat()?;
    save_stat(response, directory)
}

pub fn download_taxon_stat<T: ProfilerTransport>(
    transport: &T,
    taxon: &TaxonId,
    directory: &Utf8Path,
) -> Result<StatFile, MisraError> {
    let response = transport.taxon_stat(taxon.as_str())?;
    save_stat(response, directory)
}

fn save_stat(mut response: RawResponse, directory: &Utf8Path) -> Result<StatFile, MisraError> {
    if !(200..300).contains(&response.status) {
        return Err(MisraError::DownloadStatus {
            status: response.status,
        });
    }
    // The server names the file; only its final component is used.
    let name = response
        .header("name")
        .and_then(|name| Utf8Path::new(name).file_name())
        .map(str::to_string)
        .ok_or(MisraError::UnexpectedResponse {
            status: response.status,
        })?;
    fs::create_dir_all(directory.as_std_path())
        .map_err(|err| MisraError::Filesystem(err.to_string()))?;
    let path = directory.join(name);

    let mut file =
        File::create(path.as_std_path()).map_err(|err| MisraError::Filesystem(err.to_string()))?;
    io::copy(&mut response.body, &mut file)
        .map_err(|err| MisraError::Http(format!("statistics download interrupted: {err}")))?;
    info!(%path, "statistics written");

    let reader = BufReader::new(
        File::open(path.as_std_path()).map_err(|err| MisraError::Filesystem(err.to_string()))?,
    );
    let preview = reader
        .lines()
        .take(PREVIEW_LINES)
        .map(|line| line.map(|line| line.trim().to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| MisraError::Filesystem(err.to_string()))?;

    Ok(StatFile { path, preview })
}
