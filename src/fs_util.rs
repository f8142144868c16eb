use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use glob::Pattern;
use tar::Archive;

use crate::domain::Accession;
use crate::error::SraError;

pub fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<(), SraError> {
    let archive_err = |message: String| SraError::Archive {
        path: archive_path.to_path_buf(),
        message,
    };
    let file = fs::File::open(archive_path).map_err(|err| archive_err(err.to_string()))?;
    fs::create_dir_all(target_dir).map_err(|err| SraError::Filesystem(err.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(target_dir)
        .map_err(|err| archive_err(err.to_string()))
}

pub fn name_pattern(glob: &str) -> Result<Pattern, SraError> {
    Pattern::new(glob)
        .map_err(|err| SraError::Filesystem(format!("invalid file pattern {glob}: {err}")))
}

/// `<accession><suffix>`, with the accession taken literally.
pub fn accession_pattern(accession: &Accession, suffix: &str) -> Result<Pattern, SraError> {
    name_pattern(&format!("{}{suffix}", Pattern::escape(accession.as_str())))
}

/// Direct children of `dir` whose file name matches `pattern`. A missing directory
/// yields nothing.
pub fn list_matching(dir: &Path, pattern: &Pattern) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| pattern.matches(name))
                .unwrap_or(false)
        })
        .collect()
}

/// Longest path first, ties broken lexically. Paired files (`SRR1_1`) sort ahead of the
/// unpaired `SRR1` file this way.
pub fn sort_read_files(files: &mut [Utf8PathBuf]) {
    files.sort_by(|a, b| {
        b.as_str()
            .len()
            .cmp(&a.as_str().len())
            .then_with(|| a.as_str().cmp(b.as_str()))
    });
}

/// Collects matching regular files as UTF-8 paths in read-file order.
pub fn collect_read_files(dir: &Path, pattern: &Pattern) -> Vec<Utf8PathBuf> {
    let mut files = list_matching(dir, pattern)
        .into_iter()
        .filter(|path| path.is_file())
        .filter_map(|path| Utf8PathBuf::from_path_buf(path).ok())
        .collect::<Vec<_>>();
    sort_read_files(&mut files);
    files
}

/// Best-effort removal of matching files and directories; returns how many were removed.
pub fn remove_matching(dir: &Path, pattern: &Pattern) -> usize {
    list_matching(dir, pattern)
        .into_iter()
        .filter(|path| {
            if path.is_dir() {
                fs::remove_dir_all(path).is_ok()
            } else {
                fs::remove_file(path).is_ok()
            }
        })
        .count()
}

/// Replaces `path` with `path.gz`, like `gzip -f`.
pub fn gzip_in_place(path: &Path) -> Result<PathBuf, SraError> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input =
        fs::File::open(path).map_err(|err| SraError::Compression(err.to_string()))?;
    let output =
        fs::File::create(&target).map_err(|err| SraError::Compression(err.to_string()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder).map_err(|err| SraError::Compression(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| SraError::Compression(err.to_string()))?;
    fs::remove_file(path).map_err(|err| SraError::Compression(err.to_string()))?;
    Ok(target)
}
