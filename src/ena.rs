use camino::Utf8Path;
use tracing::{debug, error, info, warn};

use crate::app::ReadSource;
use crate::config::EnaSettings;
use crate::domain::{Accession, EmptyReason, Source, SourceOutcome};
use crate::error::SraError;
use crate::fetch::{FileFetcher, HttpTransport};
use crate::fs_util;

/// One data row of an ENA `filereport` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub base_count: u64,
    pub urls: Vec<String>,
}

/// Parses the row after the header line. Returns `None` when there is no row or it has a
/// single field. An unparseable base count reads as zero.
pub fn parse_file_report(text: &str) -> Option<FileReport> {
    let line = text.split('\n').nth(1)?.trim();
    let fields = line.split('\t').collect::<Vec<_>>();
    if fields.len() < 2 {
        return None;
    }

    let base_count = fields[1].trim().parse::<u64>().unwrap_or(0);
    let urls = fields[1..]
        .iter()
        .take(2)
        .find(|field| is_fastq_gz_list(field))
        .map(|field| field.split(';').map(normalize_url).collect())
        .unwrap_or_default();

    Some(FileReport { base_count, urls })
}

fn is_fastq_gz_list(field: &str) -> bool {
    let lower = field.to_lowercase();
    lower.contains("fastq.gz") || lower.contains("fq.gz")
}

/// ENA lists files as `ftp.sra.ebi.ac.uk/vol1/...` without a scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.contains("://") {
        url.to_string()
    } else {
        format!("ftp://{url}")
    }
}

pub struct EnaSource<T: HttpTransport> {
    fetcher: FileFetcher<T>,
    settings: EnaSettings,
}

impl<T: HttpTransport> EnaSource<T> {
    pub fn new(fetcher: FileFetcher<T>, settings: EnaSettings) -> Self {
        Self { fetcher, settings }
    }

    fn report_url(&self, accession: &Accession) -> String {
        self.settings.endpoint.replace("{acc}", accession.as_str())
    }
}

impl<T: HttpTransport> ReadSource for EnaSource<T> {
    fn source(&self) -> Source {
        Source::Ebi
    }

    fn try_fetch(
        &self,
        accession: &Accession,
        output_dir: &Utf8Path,
        max_bases: Option<u64>,
    ) -> Result<SourceOutcome, SraError> {
        info!("Downloading {accession} from EBI ftp site...");
        let text = match self
            .fetcher
            .transport()
            .get_text(&self.report_url(accession), self.settings.timeout)
        {
            Ok(text) => text,
            Err(err) => {
                error!("ENA file report for {accession} failed: {err:?}");
                return Ok(SourceOutcome::Empty(EmptyReason::Failed(err.to_string())));
            }
        };

        let Some(report) = parse_file_report(&text) else {
            debug!("ENA has no read run for {accession}");
            return Ok(SourceOutcome::Empty(EmptyReason::NoData));
        };
        if let Some(limit) = max_bases {
            if report.base_count > limit {
                warn!(
                    "{accession} has {} bases, above the limit of {limit}",
                    report.base_count
                );
                return Ok(SourceOutcome::Empty(EmptyReason::SizeExceeded {
                    bases: report.base_count,
                    limit,
                }));
            }
        }
        if report.base_count == 0 {
            debug!("ENA reports no bases for {accession}");
            return Ok(SourceOutcome::Empty(EmptyReason::NoData));
        }

        let route = output_dir.as_std_path();
        for url in report.urls.iter().filter(|url| url.len() > 2) {
            let Some(name) = url.rsplit('/').next().filter(|name| !name.is_empty()) else {
                continue;
            };
            if self.fetcher.fetch(url, &route.join(name)).is_none() {
                error!("giving up on {url}");
            }
        }

        let pattern = fs_util::accession_pattern(accession, "*.fastq.*")?;
        Ok(SourceOutcome::from_files(fs_util::collect_read_files(
            route, &pattern,
        )))
    }
}
