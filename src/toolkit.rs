use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::config::ToolkitSettings;
use crate::error::SraError;
use crate::fetch::{FileFetcher, HttpTransport};
use crate::fs_util;
use crate::process::CommandRunner;

/// Executables of an installed sratoolkit bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitPaths {
    pub prefetch: PathBuf,
    pub fasterq_dump: PathBuf,
}

impl ToolkitPaths {
    pub fn in_bin_dir(bin_dir: &Path) -> Self {
        Self {
            prefetch: bin_dir.join("prefetch"),
            fasterq_dump: bin_dir.join("fasterq-dump"),
        }
    }
}

/// Keeps a pinned sratoolkit release under the install directory, fetching it on first use.
pub struct Toolkit<R: CommandRunner, T: HttpTransport> {
    runner: R,
    fetcher: FileFetcher<T>,
    settings: ToolkitSettings,
    ready: OnceLock<ToolkitPaths>,
}

impl<R: CommandRunner, T: HttpTransport> Toolkit<R, T> {
    pub fn new(runner: R, fetcher: FileFetcher<T>, settings: ToolkitSettings) -> Self {
        Self {
            runner,
            fetcher,
            settings,
            ready: OnceLock::new(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn paths(&self) -> ToolkitPaths {
        ToolkitPaths::in_bin_dir(&self.settings.bin_dir())
    }

    /// Runs `fasterq-dump` bare, installing the bundle when that fails. The result is
    /// remembered, so later calls do not spawn anything.
    pub fn ensure_available(&self) -> Result<ToolkitPaths, SraError> {
        if let Some(paths) = self.ready.get() {
            return Ok(paths.clone());
        }

        let paths = self.paths();
        if !self.responds(&paths.fasterq_dump) {
            warn!(
                "{} is required. Downloading from the NCBI website...",
                self.settings.bundle
            );
            self.install()?;
            if !self.responds(&paths.fasterq_dump) {
                return Err(SraError::ToolkitUnavailable(format!(
                    "{} does not run after installation",
                    paths.fasterq_dump.display()
                )));
            }
            info!(
                "{} has been downloaded. You will not see this the next time.",
                self.settings.bundle
            );
        }

        Ok(self.ready.get_or_init(|| paths).clone())
    }

    fn responds(&self, program: &Path) -> bool {
        match self.runner.run(program, &[], None) {
            Ok(output) => output.success(),
            Err(err) => {
                debug!("toolkit check failed: {err}");
                false
            }
        }
    }

    fn install(&self) -> Result<(), SraError> {
        let install_dir = &self.settings.install_dir;
        fs::create_dir_all(install_dir)
            .map_err(|err| SraError::ToolkitUnavailable(err.to_string()))?;

        let staging = Builder::new()
            .prefix(".download-")
            .tempdir_in(install_dir)
            .map_err(|err| SraError::ToolkitUnavailable(err.to_string()))?;
        let archive_name = self
            .settings
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("sratoolkit.tar.gz");
        let archive = staging.path().join(archive_name);

        self.fetcher
            .fetch(&self.settings.url, &archive)
            .ok_or_else(|| {
                SraError::ToolkitUnavailable(format!("could not download {}", self.settings.url))
            })?;
        info!("unpacking {} into {}", archive_name, install_dir.display());
        fs_util::extract_tar_gz(&archive, install_dir)
            .map_err(|err| SraError::ToolkitUnavailable(err.to_string()))
    }
}
