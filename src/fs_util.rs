use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::MisraError;

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, MisraError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| MisraError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| MisraError::MalformedArchive(err.to_string()))?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| MisraError::MalformedArchive(err.to_string()))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            MisraError::MalformedArchive("zip entry path traversal detected".to_string())
        })?;
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| MisraError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| MisraError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| MisraError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| MisraError::MalformedArchive(err.to_string()))?;
        written.push(relative);
    }
    Ok(written)
}

pub fn validate_zip(zip_path: &Path) -> Result<(), MisraError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| MisraError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| MisraError::MalformedArchive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| MisraError::MalformedArchive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| MisraError::MalformedArchive(err.to_string()))?;
    }
    Ok(())
}

pub fn merge_dir(staging: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            if to.is_dir() {
                merge_dir(&from, &to)?;
                fs::remove_dir(&from)?;
                continue;
            }
            if to.exists() {
                fs::remove_file(&to)?;
            }
        } else if to.is_dir() {
            fs::remove_dir_all(&to)?;
        }
        fs::rename(&from, &to)?;
    }
    Ok(())
}

pub fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extract_nested_entries() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("back.zip");
        write_zip(
            &zip_path,
            &[("results.html", "<html/>"), ("tables/mature.tsv", "a\t1")],
        );
        let out = temp.path().join("out");
        validate_zip(&zip_path).unwrap();
        let written = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(out.join("tables/mature.tsv")).unwrap(),
            "a\t1"
        );
    }

    #[test]
    fn truncated_zip_is_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("back.zip");
        fs::write(&zip_path, b"PK\x03\x04 not really").unwrap();
        assert!(matches!(
            validate_zip(&zip_path),
            Err(MisraError::MalformedArchive(_))
        ));
    }

    #[test]
    fn merge_replaces_files_and_keeps_others() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("staging");
        let target = temp.path().join("target");
        fs::create_dir_all(staging.join("sub")).unwrap();
        fs::create_dir_all(target.join("sub")).unwrap();
        fs::write(staging.join("results.html"), "new").unwrap();
        fs::write(staging.join("sub/a.txt"), "a").unwrap();
        fs::write(target.join("results.html"), "old").unwrap();
        fs::write(target.join("sub/b.txt"), "b").unwrap();

        merge_dir(&staging, &target).unwrap();

        assert_eq!(fs::read_to_string(target.join("results.html")).unwrap(), "new");
        assert!(target.join("sub/a.txt").exists());
        assert!(target.join("sub/b.txt").exists());
        assert!(is_empty_dir(&staging).unwrap());
    }
}
