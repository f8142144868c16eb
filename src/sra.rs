use std::path::{Path, PathBuf};

use camino::Utf8Path;
use tracing::{debug, error, info, warn};

use crate::app::ReadSource;
use crate::config::SraSettings;
use crate::domain::{Accession, EmptyReason, Source, SourceOutcome};
use crate::error::SraError;
use crate::fetch::HttpTransport;
use crate::fs_util;
use crate::process::CommandRunner;
use crate::toolkit::{Toolkit, ToolkitPaths};

/// NCBI SRA through the local sratoolkit: `prefetch` for staging and size, `fasterq-dump`
/// for conversion, then gzip.
pub struct SraSource<R: CommandRunner, T: HttpTransport> {
    toolkit: Toolkit<R, T>,
    settings: SraSettings,
}

impl<R: CommandRunner, T: HttpTransport> SraSource<R, T> {
    pub fn new(toolkit: Toolkit<R, T>, settings: SraSettings) -> Self {
        Self { toolkit, settings }
    }

    fn runner(&self) -> &R {
        self.toolkit.runner()
    }

    /// Total bases reported by the staging run, or `None` when it could not be run or its
    /// output carried no size column.
    fn estimate_bases(&self, tools: &ToolkitPaths, accession: &Accession) -> Option<u64> {
        let args = expand_args(&self.settings.estimate_args, accession);
        let output = self
            .runner()
            .run(&tools.prefetch, &args, None)
            .and_then(|output| output.check(&tools.prefetch));
        match output {
            Ok(output) => {
                let bases = parse_estimate_bases(&output.stdout);
                if bases.is_none() {
                    debug!("no size column in estimate output for {accession}");
                }
                bases
            }
            Err(err) => {
                warn!("size estimate for {accession} unavailable: {err}");
                None
            }
        }
    }

    fn extract(
        &self,
        tools: &ToolkitPaths,
        accession: &Accession,
        route: &Path,
    ) -> Result<(), SraError> {
        let args = expand_args(&self.settings.extract_args, accession);
        self.runner()
            .run(&tools.fasterq_dump, &args, Some(route))?
            .check(&tools.fasterq_dump)?;
        Ok(())
    }

    fn cleanup(&self, accession: &Accession, route: &Path) -> Result<(), SraError> {
        let staged = fs_util::accession_pattern(accession, ".sra*")?;
        let removed = fs_util::remove_matching(&self.settings.cache_dir, &staged);
        let scratch = fs_util::name_pattern("fasterq.tmp*")?;
        let tmp_dirs = fs_util::remove_matching(route, &scratch);
        debug!(removed, tmp_dirs, "cleaned up after {accession}");
        Ok(())
    }

    fn cleanup_logged(&self, accession: &Accession, route: &Path) {
        if let Err(err) = self.cleanup(accession, route) {
            debug!("cleanup for {accession} skipped: {err}");
        }
    }

    fn compress(&self, accession: &Accession, route: &Path) -> Result<(), SraError> {
        let pattern = fs_util::accession_pattern(accession, "*.fastq")?;
        let fastq = fs_util::list_matching(route, &pattern);
        if fastq.is_empty() {
            return Ok(());
        }

        let mut args = vec!["-f".to_string()];
        args.extend(fastq.iter().map(|path| path.to_string_lossy().to_string()));
        for compressor in ["pigz", "gzip"] {
            let program = Path::new(compressor);
            match self
                .runner()
                .run(program, &args, None)
                .and_then(|output| output.check(program))
            {
                Ok(_) => return Ok(()),
                Err(err) => debug!("{compressor} unavailable: {err}"),
            }
        }

        warn!("no external compressor worked, compressing {accession} in-process");
        let leftover = fastq
            .into_iter()
            .filter(|path| path.exists())
            .collect::<Vec<PathBuf>>();
        for path in leftover {
            fs_util::gzip_in_place(&path)?;
        }
        Ok(())
    }
}

impl<R: CommandRunner, T: HttpTransport> ReadSource for SraSource<R, T> {
    fn source(&self) -> Source {
        Source::Ncbi
    }

    fn try_fetch(
        &self,
        accession: &Accession,
        output_dir: &Utf8Path,
        max_bases: Option<u64>,
    ) -> Result<SourceOutcome, SraError> {
        let tools = self.toolkit.ensure_available()?;
        info!("Downloading {accession} from NCBI using sratoolkit...");
        let route = output_dir.as_std_path();

        let bases = self.estimate_bases(&tools, accession);
        if let Some(limit) = max_bases {
            match bases {
                Some(bases) if bases > limit => {
                    warn!("{accession} has {bases} bases, above the limit of {limit}");
                    self.cleanup_logged(accession, route);
                    return Ok(SourceOutcome::Empty(EmptyReason::SizeExceeded { bases, limit }));
                }
                Some(_) => {}
                None => {
                    warn!("size of {accession} unknown, extracting without the limit of {limit}")
                }
            }
        }

        let extracted = self.extract(&tools, accession, route);
        self.cleanup_logged(accession, route);
        if let Err(err) = extracted {
            error!("fasterq-dump failed for {accession}: {err:?}");
            return Ok(SourceOutcome::Empty(EmptyReason::Failed(err.to_string())));
        }

        if let Err(err) = self.compress(accession, route) {
            warn!("compression of {accession} incomplete: {err}");
        }

        let pattern = fs_util::accession_pattern(accession, "*.fastq*")?;
        Ok(SourceOutcome::from_files(fs_util::collect_read_files(
            route, &pattern,
        )))
    }
}

pub fn expand_args(template: &[String], accession: &Accession) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{acc}", accession.as_str()))
        .collect()
}

/// Sums the third tab separated column of each line. The column carries a trailing unit
/// character and `,` thousands separators, both dropped before parsing; lines that do not
/// fit contribute nothing. `None` when no line fits.
pub fn parse_estimate_bases(text: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.split('\t').nth(2))
        .filter_map(|field| {
            let field = field.trim();
            let mut chars = field.chars();
            chars.next_back()?;
            chars.as_str().replace(',', "").parse::<u64>().ok()
        })
        .reduce(|total, bases| total.saturating_add(bases))
}
