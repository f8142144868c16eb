use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use sra_download::app::ReadSource;
use sra_download::config::{
    SraSettings, ToolkitSettings, default_estimate_args, default_extract_args,
};
use sra_download::domain::{Accession, EmptyReason, SourceOutcome};
use sra_download::error::SraError;
use sra_download::fetch::{FileFetcher, HttpTransport, RetryPolicy};
use sra_download::process::{CommandOutput, CommandRunner};
use sra_download::sra::SraSource;
use sra_download::toolkit::Toolkit;

/// Stands in for sratoolkit: `prefetch` prints a size table, `fasterq-dump` writes split
/// FASTQ files plus a scratch directory. No external compressor is available.
struct FakeToolkit {
    estimate: String,
    extract_ok: bool,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeToolkit {
    fn new(estimate: &str, extract_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            estimate: estimate.to_string(),
            extract_ok,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn called(&self, program: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|(name, args)| name == program && !args.is_empty())
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

impl CommandRunner for FakeToolkit {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, SraError> {
        let name = program
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push((name.clone(), args.to_vec()));

        match name.as_str() {
            "fasterq-dump" if args.is_empty() => Ok(ok("")),
            "prefetch" => Ok(ok(&self.estimate)),
            "fasterq-dump" => {
                let dir = cwd.unwrap();
                let acc = &args[0];
                fs::create_dir_all(dir.join("fasterq.tmp.host.42")).unwrap();
                if !self.extract_ok {
                    return Ok(CommandOutput {
                        code: Some(3),
                        stdout: String::new(),
                        stderr: format!("item not found: {acc}"),
                    });
                }
                for suffix in ["_1", "_2", ""] {
                    let path = dir.join(format!("{acc}{suffix}.fastq"));
                    fs::write(path, b"@r\nACGT\n+\nIIII\n").unwrap();
                }
                Ok(ok(""))
            }
            other => Err(SraError::MissingTool(other.to_string())),
        }
    }
}

struct NoNetwork;

impl HttpTransport for NoNetwork {
    fn get_text(&self, _url: &str, _timeout: Duration) -> Result<String, SraError> {
        Err(SraError::Http("offline".to_string()))
    }

    fn download(&self, _url: &str, _destination: &Path) -> Result<(), SraError> {
        Err(SraError::Http("offline".to_string()))
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    dir: Utf8PathBuf,
    cache: PathBuf,
}

fn fixture(acc: &str) -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("out").join(acc)).unwrap();
    fs::create_dir_all(&dir).unwrap();
    let cache = temp.path().join("ncbi/public/sra");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join(format!("{acc}.sra")), b"sra").unwrap();
    fs::write(cache.join(format!("{acc}.sra.vdbcache")), b"sra").unwrap();
    Fixture {
        _temp: temp,
        dir,
        cache,
    }
}

fn source(
    runner: Arc<FakeToolkit>,
    fixture: &Fixture,
) -> SraSource<Arc<FakeToolkit>, NoNetwork> {
    let policy = RetryPolicy {
        attempts: 3,
        delay: Duration::ZERO,
    };
    let toolkit = Toolkit::new(
        runner,
        FileFetcher::new(NoNetwork, policy),
        ToolkitSettings {
            install_dir: fixture.cache.join("toolkit"),
            bundle: "sratoolkit.test".to_string(),
            url: "https://example.org/sratoolkit.test.tar.gz".to_string(),
        },
    );
    SraSource::new(
        toolkit,
        SraSettings {
            cache_dir: fixture.cache.clone(),
            estimate_args: default_estimate_args(),
            extract_args: default_extract_args(),
        },
    )
}

#[test]
fn extracts_compresses_and_cleans_up() {
    let fixture = fixture("SRR1");
    let runner = FakeToolkit::new("SRR1\tbases\t1,000B\n", true);
    let acc: Accession = "SRR1".parse().unwrap();

    let outcome = source(runner.clone(), &fixture)
        .try_fetch(&acc, &fixture.dir, Some(5_000))
        .unwrap();

    assert_eq!(
        outcome,
        SourceOutcome::Files(vec![
            fixture.dir.join("SRR1_1.fastq.gz"),
            fixture.dir.join("SRR1_2.fastq.gz"),
            fixture.dir.join("SRR1.fastq.gz"),
        ])
    );
    assert!(!fixture.dir.join("SRR1_1.fastq").exists());
    assert!(!fixture.dir.join("fasterq.tmp.host.42").exists());
    assert!(!fixture.cache.join("SRR1.sra").exists());
    assert!(!fixture.cache.join("SRR1.sra.vdbcache").exists());

    let calls = runner.calls.lock().unwrap();
    let extract = calls
        .iter()
        .find(|(name, args)| name == "fasterq-dump" && !args.is_empty())
        .unwrap();
    assert_eq!(extract.1, vec!["SRR1", "-f", "--split-3", "-O", "."]);
    assert!(calls.iter().any(|(name, _)| name == "pigz"));
    assert!(calls.iter().any(|(name, _)| name == "gzip"));
}

#[test]
fn size_ceiling_skips_extraction() {
    let fixture = fixture("SRR2");
    let runner = FakeToolkit::new("SRR2\tbases\t9,000,000B\nSRR2\tbases\t1B\n", true);
    let acc: Accession = "SRR2".parse().unwrap();

    let outcome = source(runner.clone(), &fixture)
        .try_fetch(&acc, &fixture.dir, Some(5_000))
        .unwrap();

    assert_eq!(
        outcome,
        SourceOutcome::Empty(EmptyReason::SizeExceeded {
            bases: 9_000_001,
            limit: 5_000,
        })
    );
    assert!(!runner.called("fasterq-dump"));
    assert!(!fixture.cache.join("SRR2.sra").exists());
    assert!(!fixture.cache.join("SRR2.sra.vdbcache").exists());
}

#[test]
fn unreadable_size_extracts_despite_ceiling() {
    let fixture = fixture("SRR3");
    let runner = FakeToolkit::new(
        "2019-07-01T10:00:00 prefetch.2.9.6: 1) Downloading 'SRR3'...\n\
         2019-07-01T10:00:09 prefetch.2.9.6: 1) 'SRR3' was downloaded successfully\n",
        true,
    );
    let acc: Accession = "SRR3".parse().unwrap();

    let outcome = source(runner.clone(), &fixture)
        .try_fetch(&acc, &fixture.dir, Some(5_000))
        .unwrap();

    assert_matches!(outcome, SourceOutcome::Files(files) if files.len() == 3);
    assert!(runner.called("fasterq-dump"));
    assert!(!fixture.cache.join("SRR3.sra").exists());
}

#[test]
fn failed_extraction_still_cleans_up() {
    let fixture = fixture("SRR0000000");
    let runner = FakeToolkit::new("", false);
    let acc: Accession = "SRR0000000".parse().unwrap();

    let outcome = source(runner.clone(), &fixture)
        .try_fetch(&acc, &fixture.dir, None)
        .unwrap();

    assert_matches!(outcome, SourceOutcome::Empty(EmptyReason::Failed(_)));
    assert!(!fixture.dir.join("fasterq.tmp.host.42").exists());
    assert!(!fixture.cache.join("SRR0000000.sra").exists());
    assert!(!runner.called("pigz"));
}
