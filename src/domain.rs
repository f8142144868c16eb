use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::error::SraError;

/// A sequencing run accession such as `SRR2223576`.
///
/// The value is opaque apart from being used as a directory and file name prefix, so the
/// only checks are that it is non-empty and cannot escape the output root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = SraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed != "."
            && trimmed != ".."
            && !trimmed.contains(['/', '\\']);
        if !is_valid {
            return Err(SraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// NCBI Sequence Read Archive, read through the local sratoolkit.
    Ncbi,
    /// EBI European Nucleotide Archive, read through direct file URLs.
    Ebi,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ncbi => "NCBI",
            Source::Ebi => "EBI",
        }
    }

    pub fn default_order() -> Vec<Source> {
        vec![Source::Ncbi, Source::Ebi]
    }

    /// Parses a comma separated alias list such as `EBI,NCBI`. Empty items are skipped.
    pub fn parse_list(value: &str) -> Result<Vec<Source>, SraError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = SraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "NCBI" | "SRA" | "GENBANK" => Ok(Source::Ncbi),
            "EBI" | "ENA" => Ok(Source::Ebi),
            _ => Err(SraError::InvalidSource(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    SizeExceeded { bases: u64, limit: u64 },
    NoData,
    NoOutput,
    Failed(String),
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::SizeExceeded { bases, limit } => {
                write!(f, "{bases} bases exceeds the limit of {limit}")
            }
            EmptyReason::NoData => write!(f, "no data"),
            EmptyReason::NoOutput => write!(f, "no read files produced"),
            EmptyReason::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// What a single source produced for one accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Files(Vec<Utf8PathBuf>),
    Empty(EmptyReason),
}

impl SourceOutcome {
    /// Wraps collected files, turning an empty collection into `Empty(NoOutput)`.
    pub fn from_files(files: Vec<Utf8PathBuf>) -> Self {
        if files.is_empty() {
            SourceOutcome::Empty(EmptyReason::NoOutput)
        } else {
            SourceOutcome::Files(files)
        }
    }
}

/// Accession to output files, keyed in sorted order for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report(BTreeMap<String, Vec<Utf8PathBuf>>);

impl Report {
    pub fn insert(&mut self, accession: &Accession, files: Vec<Utf8PathBuf>) {
        self.0.insert(accession.as_str().to_string(), files);
    }

    pub fn get(&self, accession: &str) -> Option<&[Utf8PathBuf]> {
        self.0.get(accession).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
