use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sra_download::app::App;
use sra_download::config::{ConfigLoader, ConfigOverrides};
use sra_download::domain::{Accession, Source};
use sra_download::ena::EnaSource;
use sra_download::error::SraError;
use sra_download::fetch::{FileFetcher, HttpClient};
use sra_download::output::JsonOutput;
use sra_download::process::SystemRunner;
use sra_download::sra::SraSource;
use sra_download::toolkit::Toolkit;

#[derive(Parser)]
#[command(name = "sradownload")]
#[command(
    about = "Downloads SRA short reads by their run accessions from either NCBI or EBI and converts them into fastq.gz files"
)]
#[command(after_help = "Try it with \"sradownload SRR2223576 SRR2223582\"")]
#[command(version, author)]
struct Cli {
    /// Run accessions to fetch
    #[arg(required = true, value_name = "RUN")]
    runs: Vec<String>,

    /// Root folder for fetched short reads; each run is saved in a sub-folder [default: .]
    #[arg(short, long)]
    folder: Option<Utf8PathBuf>,

    /// Sources for reads, tried in order. Use EBI,NCBI if your connection to EBI is faster
    /// [default: NCBI,EBI]
    // Spelled out so clap takes `NCBI,EBI` as one value for `parse_list` instead of
    // collecting repeated `-s` flags.
    #[arg(short, long, value_parser = Source::parse_list)]
    source: Option<std::vec::Vec<Source>>,

    /// Skip a source for a run reporting more bases than this
    #[arg(short, long)]
    max_bases: Option<u64>,

    /// JSON config file [default: ./sradownload.json when present]
    #[arg(short, long)]
    config: Option<String>,

    /// Where sratoolkit is installed
    #[arg(long)]
    toolkit_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SraError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SraError) -> u8 {
    match error {
        SraError::InvalidAccession(_)
        | SraError::InvalidSource(_)
        | SraError::ConfigRead(_)
        | SraError::ConfigParse(_) => 2,
        SraError::ToolkitUnavailable(_)
        | SraError::MissingTool(_)
        | SraError::Http(_)
        | SraError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let accessions = cli
        .runs
        .iter()
        .map(|run| run.parse::<Accession>())
        .collect::<Result<Vec<_>, _>>()?;

    let config = ConfigLoader::resolve(cli.config.as_deref())?.apply(ConfigOverrides {
        folder: cli.folder,
        sources: cli.source,
        max_bases: cli.max_bases,
        toolkit_dir: cli.toolkit_dir,
    });

    let http = HttpClient::new()?;
    let toolkit = Toolkit::new(
        SystemRunner,
        FileFetcher::new(http.clone(), config.retry),
        config.toolkit.clone(),
    );
    let ncbi = SraSource::new(toolkit, config.sra.clone());
    let ebi = EnaSource::new(FileFetcher::new(http, config.retry), config.ena.clone());
    let app = App::new(ncbi, ebi);

    let report = app.run(
        &accessions,
        &config.folder,
        &config.sources,
        config.max_bases,
    )?;
    JsonOutput::print_report(&report).into_diagnostic()?;
    Ok(())
}
