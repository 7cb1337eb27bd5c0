//! Offline corpus population: mirror PDFs from the NCBI FTP server and unpack
//! the `.tar.gz` bundles some sources ship.

pub mod archive;
pub mod ftp;

use crate::error::TransferError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use archive::{extract_pdfs, ExtractionSummary};
pub use ftp::{
    parse_list_line, Connector, CorpusFetcher, FetchSummary, FtpSession, ListingEntry,
    SuppaftpConnector,
};

pub const FTP_HOST: &str = "ftp.ncbi.nlm.nih.gov";
pub const DEFAULT_WORKERS: usize = 4;
pub const DOWNLOAD_DELAY: Duration = Duration::from_millis(500);
pub const SUBDIRECTORY_PATTERN: &str = r"^[0-9a-f]{2}$";
pub const LOG_FILE_NAME: &str = "scraper.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Pmc,
    Nlm,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Pmc, Source::Nlm];

    pub fn name(self) -> &'static str {
        match self {
            Source::Pmc => "PMC",
            Source::Nlm => "NLM",
        }
    }

    pub fn remote_root(self) -> &'static str {
        match self {
            Source::Pmc => "/pub/pmc/oa_pdf/00",
            Source::Nlm => "/pub/litarch",
        }
    }

    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|source| source.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = TransferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.name() == value)
            .ok_or_else(|| TransferError::UnknownSource {
                given: value.to_string(),
                available: Self::available(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_dir: PathBuf,
    pub source: Source,
    pub workers: usize,
    pub delay: Duration,
}

impl FetchConfig {
    pub fn new(base_dir: impl Into<PathBuf>, source: Source) -> Self {
        Self {
            base_dir: base_dir.into(),
            source,
            workers: DEFAULT_WORKERS,
            delay: DOWNLOAD_DELAY,
        }
    }

    /// `{base_dir}/{source}`: downloads and the log file land here.
    pub fn source_dir(&self) -> PathBuf {
        self.base_dir.join(self.source.name())
    }

    pub fn log_path(&self) -> PathBuf {
        self.source_dir().join(LOG_FILE_NAME)
    }
}

/// Maps a remote file under `remote_dir` to its place under `local_dir`.
pub fn local_path_for(remote_dir: &str, remote_file: &str, local_dir: &Path) -> PathBuf {
    let relative = remote_file
        .strip_prefix(remote_dir)
        .unwrap_or(remote_file)
        .trim_start_matches('/');
    local_dir.join(relative)
}
