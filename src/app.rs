use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info};

use crate::domain::{Accession, Report, Source, SourceOutcome};
use crate::error::SraError;

/// A place read files can be fetched from.
///
/// `try_fetch` reports recoverable failures as `SourceOutcome::Empty`; an `Err` aborts the
/// whole run and is reserved for conditions no other accession could recover from.
pub trait ReadSource {
    fn source(&self) -> Source;

    fn try_fetch(
        &self,
        accession: &Accession,
        output_dir: &Utf8Path,
        max_bases: Option<u64>,
    ) -> Result<SourceOutcome, SraError>;
}

pub struct App<N: ReadSource, E: ReadSource> {
    ncbi: N,
    ebi: E,
}

impl<N: ReadSource, E: ReadSource> App<N, E> {
    pub fn new(ncbi: N, ebi: E) -> Self {
        Self { ncbi, ebi }
    }

    fn adapter(&self, source: Source) -> &dyn ReadSource {
        match source {
            Source::Ncbi => &self.ncbi,
            Source::Ebi => &self.ebi,
        }
    }

    /// Fetches each accession in turn; every accession gets an entry, empty on failure.
    pub fn run(
        &self,
        accessions: &[Accession],
        output_root: &Utf8Path,
        sources: &[Source],
        max_bases: Option<u64>,
    ) -> Result<Report, SraError> {
        let mut report = Report::default();
        for accession in accessions {
            let files = self.fetch_accession(accession, output_root, sources, max_bases)?;
            report.insert(accession, files);
        }
        Ok(report)
    }

    /// Tries `sources` in order and returns the files of the first one that produced any.
    pub fn fetch_accession(
        &self,
        accession: &Accession,
        output_root: &Utf8Path,
        sources: &[Source],
        max_bases: Option<u64>,
    ) -> Result<Vec<Utf8PathBuf>, SraError> {
        let route = output_root.join(accession.as_str());
        if let Err(err) = fs::create_dir_all(route.as_std_path()) {
            error!("cannot create {route}: {err}");
            return Ok(Vec::new());
        }

        for &source in sources {
            let adapter = self.adapter(source);
            match adapter.try_fetch(accession, &route, max_bases)? {
                SourceOutcome::Files(files) => {
                    info!("{accession}: {} file(s) from {}", files.len(), adapter.source());
                    return Ok(files);
                }
                SourceOutcome::Empty(reason) => {
                    info!("{accession}: nothing from {} ({reason})", adapter.source());
                }
            }
        }
        error!("{accession}: no source produced read files");
        Ok(Vec::new())
    }
}
