use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SraError {
    #[error("invalid run accession: {0:?}")]
    InvalidAccession(String),

    #[error("unknown read source: {0} (expected NCBI, SRA, GENBANK, EBI or ENA)")]
    InvalidSource(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{program} exited with {code}: {message}")]
    CommandFailed {
        program: String,
        code: String,
        message: String,
    },

    #[error("sratoolkit is not available: {0}")]
    #[diagnostic(help("check network access to ftp-trace.ncbi.nlm.nih.gov or pass --toolkit-dir"))]
    ToolkitUnavailable(String),

    #[error("failed to unpack {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("compression failed: {0}")]
    Compression(String),
}
