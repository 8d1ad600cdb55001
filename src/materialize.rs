use std::fs;
use std::io::{ErrorKind, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::MisraError;
use crate::fs_util::{extract_zip, is_empty_dir, merge_dir, validate_zip};
use crate::output::{ProgressEvent, ProgressSink};
use crate::prompt::Prompter;
use crate::response::ResultPayload;

pub const ARCHIVE_CHUNK_SIZE: usize = 512;
pub const SUMMARY_FILE: &str = "results.html";

#[derive(Debug, Clone, Serialize)]
pub struct ResultBundle {
    pub job_id: Option<String>,
    pub destination: Utf8PathBuf,
    pub files: Vec<Utf8PathBuf>,
    pub summary: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationOrigin {
    Local,
    Server,
}

pub struct ResultMaterializer<'a, P: Prompter + ?Sized> {
    prompter: &'a P,
    working_dir: Option<Utf8PathBuf>,
}

impl<'a, P: Prompter + ?Sized> ResultMaterializer<'a, P> {
    pub fn new(prompter: &'a P) -> Self {
        Self {
            prompter,
            working_dir: None,
        }
    }

    /// Where the "current directory" option places a server-named destination.
    /// Defaults to the process working directory.
    pub fn with_working_dir(mut self, working_dir: Option<Utf8PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    /// Makes sure `path` exists and may be written to. Reusing a non-empty
    /// directory needs confirmation; declining leaves it untouched.
    pub fn prepare_destination(
        &self,
        path: &Utf8Path,
        origin: DestinationOrigin,
    ) -> Result<Utf8PathBuf, MisraError> {
        let std_path = path.as_std_path();
        if std_path.exists() {
            if !std_path.is_dir() {
                return Err(MisraError::Filesystem(format!(
                    "{path} exists and is not a directory"
                )));
            }
            let empty =
                is_empty_dir(std_path).map_err(|err| MisraError::Filesystem(err.to_string()))?;
            if !empty {
                let question = format!(
                    "Output directory {path} already exists. Overwrite files with the same name?"
                );
                if !self.prompter.confirm(&question)? {
                    return Err(MisraError::OverwriteDeclined(path.to_string()));
                }
            }
            return Ok(path.to_path_buf());
        }

        let local_name = path.file_name().filter(|name| *name != path.as_str());
        match (origin, local_name) {
            (DestinationOrigin::Server, Some(name)) => {
                let options = vec![
                    format!("create {path}"),
                    format!("create {name} in the current directory"),
                ];
                let question = format!("Output directory {path} does not exist locally.");
                match self.prompter.select(&question, &options)? {
                    Some(0) => create_dir(path),
                    Some(1) => {
                        let local = match &self.working_dir {
                            Some(dir) => dir.join(name),
                            None => Utf8PathBuf::from(name),
                        };
                        self.prepare_destination(&local, DestinationOrigin::Local)
                    }
                    _ => Err(MisraError::DestinationChoice(path.to_string())),
                }
            }
            _ => create_dir(path),
        }
    }

    /// The archive is validated and expanded into a staging directory before
    /// anything is moved into `destination`.
    pub fn materialize(
        &self,
        payload: ResultPayload,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<ResultBundle, MisraError> {
        if !(200..300).contains(&payload.status) {
            return Err(MisraError::DownloadStatus {
                status: payload.status,
            });
        }
        fs::create_dir_all(destination.as_std_path())
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;

        sink.event(ProgressEvent::new(format!(
            "Retrieving result files into {destination}"
        )));
        let mut archive = tempfile::Builder::new()
            .prefix(".misra-download")
            .suffix(".zip")
            .tempfile_in(destination.as_std_path())
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;
        let mut body = payload.body;
        let bytes = copy_chunks(&mut body, archive.as_file_mut())?;
        info!(%destination, bytes, "result archive downloaded");

        validate_zip(archive.path())?;
        let staging = tempfile::Builder::new()
            .prefix(".misra-extract")
            .tempdir_in(destination.as_std_path())
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;
        let written = extract_zip(archive.path(), staging.path())?;
        merge_dir(staging.path(), destination.as_std_path())
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;
        staging
            .close()
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;
        archive
            .close()
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;

        let files = written
            .into_iter()
            .map(|relative| {
                Utf8PathBuf::from_path_buf(relative)
                    .map(|relative| destination.join(relative))
                    .map_err(|_| MisraError::Filesystem("non-utf8 file path in archive".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let summary_path = destination.join(SUMMARY_FILE);
        let summary = summary_path.as_std_path().is_file().then_some(summary_path);
        if summary.is_none() {
            warn!(%destination, "result archive carried no {}", SUMMARY_FILE);
        }
        sink.event(ProgressEvent::new(format!(
            "Unpacked {} files into {destination}",
            files.len()
        )));

        Ok(ResultBundle {
            job_id: None,
            destination: destination.to_path_buf(),
            files,
            summary,
        })
    }
}

fn create_dir(path: &Utf8Path) -> Result<Utf8PathBuf, MisraError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| MisraError::Filesystem(format!("create {path}: {err}")))?;
    info!(%path, "created output directory");
    Ok(path.to_path_buf())
}

fn copy_chunks<R: Read + ?Sized, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, MisraError> {
    let mut buffer = [0u8; ARCHIVE_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(MisraError::Http(format!("result download interrupted: {err}")));
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| MisraError::Filesystem(err.to_string()))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(|err| MisraError::Filesystem(err.to_string()))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;
    use crate::output::JsonOutput;
    use crate::prompt::FixedPrompter;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn missing_local_destination_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let dest = utf8(&temp.path().join("a/b"));
        let prompter = FixedPrompter::decline_all();
        let prepared = ResultMaterializer::new(&prompter)
            .prepare_destination(&dest, DestinationOrigin::Local)
            .unwrap();
        assert_eq!(prepared, dest);
        assert!(dest.as_std_path().is_dir());
    }

    #[test]
    fn empty_existing_destination_needs_no_confirmation() {
        let temp = tempfile::tempdir().unwrap();
        let dest = utf8(temp.path());
        let prompter = FixedPrompter::decline_all();
        let materializer = ResultMaterializer::new(&prompter);
        assert!(
            materializer
                .prepare_destination(&dest, DestinationOrigin::Local)
                .is_ok()
        );
    }

    #[test]
    fn server_destination_without_choice_fails() {
        let temp = tempfile::tempdir().unwrap();
        let dest = utf8(&temp.path().join("remote/out"));
        let prompter = FixedPrompter::decline_all();
        let result = ResultMaterializer::new(&prompter)
            .prepare_destination(&dest, DestinationOrigin::Server);
        assert_matches!(result, Err(MisraError::DestinationChoice(_)));
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn failed_transfer_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let dest = utf8(temp.path());
        let prompter = FixedPrompter::accept_all();
        let payload = ResultPayload {
            status: 500,
            local_out: None,
            body: Box::new(Cursor::new(b"partial".to_vec())),
        };
        let result = ResultMaterializer::new(&prompter).materialize(payload, &dest, &JsonOutput);
        assert_matches!(result, Err(MisraError::DownloadStatus { status: 500 }));
        assert!(is_empty_dir(temp.path()).unwrap());
    }

    #[test]
    fn corrupt_archive_leaves_destination_clean() {
        let temp = tempfile::tempdir().unwrap();
        let dest = utf8(temp.path());
        fs::write(temp.path().join("keep.txt"), "keep").unwrap();
        let prompter = FixedPrompter::accept_all();
        let payload = ResultPayload {
            status: 200,
            local_out: None,
            body: Box::new(Cursor::new(b"definitely not a zip".to_vec())),
        };
        let result = ResultMaterializer::new(&prompter).materialize(payload, &dest, &JsonOutput);
        assert_matches!(result, Err(MisraError::MalformedArchive(_)));
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("keep.txt")]);
    }

    #[test]
    fn chunked_copy_counts_bytes() {
        let data = vec![7u8; ARCHIVE_CHUNK_SIZE * 3 + 5];
        let mut out = Vec::new();
        let total = copy_chunks(&mut Cursor::new(data.clone()), &mut out).unwrap();
        assert_eq!(total as usize, data.len());
        assert_eq!(out, data);
    }
}
