use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use sra_download::app::{App, ReadSource};
use sra_download::domain::{Accession, EmptyReason, Source, SourceOutcome};
use sra_download::error::SraError;
use sra_download::output::JsonOutput;

/// Produces one file named after the accession, or nothing, and counts calls.
struct MockSource {
    source: Source,
    produces: bool,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    fn new(source: Source, produces: bool) -> Self {
        Self {
            source,
            produces,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ReadSource for &MockSource {
    fn source(&self) -> Source {
        self.source
    }

    fn try_fetch(
        &self,
        accession: &Accession,
        output_dir: &Utf8Path,
        _max_bases: Option<u64>,
    ) -> Result<SourceOutcome, SraError> {
        self.calls.lock().unwrap().push(accession.to_string());
        if !self.produces {
            return Ok(SourceOutcome::Empty(EmptyReason::NoData));
        }
        let path = output_dir.join(format!("{accession}_{}.fastq.gz", self.source));
        std::fs::write(path.as_std_path(), b"reads").unwrap();
        Ok(SourceOutcome::Files(vec![path]))
    }
}

struct FatalSource;

impl ReadSource for FatalSource {
    fn source(&self) -> Source {
        Source::Ncbi
    }

    fn try_fetch(
        &self,
        _accession: &Accession,
        _output_dir: &Utf8Path,
        _max_bases: Option<u64>,
    ) -> Result<SourceOutcome, SraError> {
        Err(SraError::ToolkitUnavailable("offline".to_string()))
    }
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn acc(value: &str) -> Accession {
    value.parse().unwrap()
}

#[test]
fn first_productive_source_wins() {
    let (_temp, root) = temp_root();
    let ncbi = MockSource::new(Source::Ncbi, true);
    let ebi = MockSource::new(Source::Ebi, true);
    let app = App::new(&ncbi, &ebi);

    let report = app
        .run(&[acc("SRR1")], &root, &[Source::Ebi, Source::Ncbi], None)
        .unwrap();

    let files = report.get("SRR1").unwrap();
    assert_eq!(files, [root.join("SRR1").join("SRR1_EBI.fastq.gz")]);
    assert_eq!(ebi.calls(), 1);
    assert_eq!(ncbi.calls(), 0);
}

#[test]
fn falls_through_to_next_source() {
    let (_temp, root) = temp_root();
    let ncbi = MockSource::new(Source::Ncbi, false);
    let ebi = MockSource::new(Source::Ebi, true);
    let app = App::new(&ncbi, &ebi);

    let report = app
        .run(&[acc("SRR1")], &root, &Source::default_order(), None)
        .unwrap();

    assert_eq!(report.get("SRR1").unwrap().len(), 1);
    assert_eq!(ncbi.calls(), 1);
    assert_eq!(ebi.calls(), 1);
}

#[test]
fn failed_accessions_are_present_and_empty() {
    let (_temp, root) = temp_root();
    let ncbi = MockSource::new(Source::Ncbi, false);
    let ebi = MockSource::new(Source::Ebi, false);
    let app = App::new(&ncbi, &ebi);

    let report = app
        .run(&[acc("SRR0000000")], &root, &Source::default_order(), None)
        .unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.get("SRR0000000"), Some(&[][..]));
    assert_eq!(
        JsonOutput::render(&report).unwrap(),
        "{\n  \"SRR0000000\": []\n}"
    );
}

#[test]
fn rerun_into_existing_directory() {
    let (_temp, root) = temp_root();
    let ncbi = MockSource::new(Source::Ncbi, true);
    let ebi = MockSource::new(Source::Ebi, false);
    let app = App::new(&ncbi, &ebi);

    let first = app
        .run(&[acc("SRR1")], &root, &Source::default_order(), None)
        .unwrap();
    let second = app
        .run(&[acc("SRR1")], &root, &Source::default_order(), None)
        .unwrap();

    assert_eq!(first, second);
    assert!(root.join("SRR1").is_dir());
}

#[test]
fn report_keys_are_sorted() {
    let (_temp, root) = temp_root();
    let ncbi = MockSource::new(Source::Ncbi, false);
    let ebi = MockSource::new(Source::Ebi, false);
    let app = App::new(&ncbi, &ebi);

    let report = app
        .run(&[acc("SRR9"), acc("ERR1")], &root, &[Source::Ebi], None)
        .unwrap();

    let json = JsonOutput::render(&report).unwrap();
    assert!(json.find("ERR1").unwrap() < json.find("SRR9").unwrap());
    assert_eq!(ncbi.calls(), 0);
}

#[test]
fn fatal_source_error_aborts_run() {
    let (_temp, root) = temp_root();
    let ebi = MockSource::new(Source::Ebi, true);
    let app = App::new(FatalSource, &ebi);

    let result = app.run(&[acc("SRR1")], &root, &Source::default_order(), None);

    assert_matches!(result, Err(SraError::ToolkitUnavailable(_)));
    assert_eq!(ebi.calls(), 0);
}
