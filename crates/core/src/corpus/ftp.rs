use super::{local_path_for, FetchConfig, SUBDIRECTORY_PATTERN};
use crate::error::TransferError;
use regex::Regex;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use suppaftp::{FtpError, FtpStream};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

/// The FTP operations the fetcher needs. Calls block.
pub trait FtpSession: Send {
    /// Raw `LIST` lines for `path`.
    fn list(&mut self, path: &str) -> Result<Vec<String>, TransferError>;

    /// Streams the remote file into `sink`, returning the bytes copied.
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, TransferError>;

    fn quit(&mut self) -> Result<(), TransferError>;
}

/// Opens a fresh, logged-in session. Each worker gets its own.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn FtpSession>, TransferError>;
}

fn ftp_error(context: impl Into<String>, error: suppaftp::FtpError) -> TransferError {
    TransferError::Ftp {
        context: context.into(),
        details: error.to_string(),
    }
}

impl FtpSession for FtpStream {
    fn list(&mut self, path: &str) -> Result<Vec<String>, TransferError> {
        FtpStream::list(self, Some(path)).map_err(|error| ftp_error(path, error))
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, TransferError> {
        self.retr(path, |reader| {
            io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
        })
        .map_err(|error| ftp_error(path, error))
    }

    fn quit(&mut self) -> Result<(), TransferError> {
        FtpStream::quit(self).map_err(|error| ftp_error("quit", error))
    }
}

/// Anonymous login against a real server on port 21.
pub struct SuppaftpConnector {
    host: String,
}

impl SuppaftpConnector {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Connector for SuppaftpConnector {
    fn connect(&self) -> Result<Box<dyn FtpSession>, TransferError> {
        let address = format!("{}:21", self.host);
        let mut stream = FtpStream::connect(&address).map_err(|error| {
            error!(host = %self.host, %error, "ftp connection failed");
            ftp_error(address.clone(), error)
        })?;
        stream
            .login("anonymous", "anonymous")
            .map_err(|error| ftp_error("login", error))?;
        stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|error| ftp_error("binary mode", error))?;
        Ok(Box::new(stream))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Parses one Unix-style `LIST` line. The name is the last whitespace-separated
/// token; a leading `d` marks a directory.
pub fn parse_list_line(line: &str) -> Option<ListingEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("total ") {
        return None;
    }

    let name = line.split_whitespace().last()?;
    if name == "." || name == ".." {
        return None;
    }

    Some(ListingEntry {
        name: name.to_string(),
        is_dir: line.starts_with('d'),
    })
}

/// Every file below `path`, depth first. A directory that cannot be listed is
/// logged and contributes nothing.
pub fn list_files_recursive(session: &mut dyn FtpSession, path: &str) -> Vec<String> {
    let lines = match session.list(path) {
        Ok(lines) => lines,
        Err(error) => {
            error!(path, %error, "failed to list directory");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for entry in lines.iter().filter_map(|line| parse_list_line(line)) {
        let full_path = format!("{path}/{}", entry.name);
        if entry.is_dir {
            directories.push(full_path);
        } else {
            files.push(full_path);
        }
    }

    for directory in directories {
        files.extend(list_files_recursive(session, &directory));
    }
    files
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub subdirectories: usize,
    pub downloaded: usize,
    pub failed_subdirectories: Vec<String>,
}

/// Mirrors one source into `{base_dir}/{source}` with a fixed pool of workers,
/// one remote subdirectory per task.
#[derive(Clone)]
pub struct CorpusFetcher {
    connector: Arc<dyn Connector>,
    config: Arc<FetchConfig>,
    subdirectory: Regex,
}

impl CorpusFetcher {
    pub fn new(connector: Arc<dyn Connector>, config: FetchConfig) -> Result<Self, TransferError> {
        Ok(Self {
            connector,
            config: Arc::new(config),
            subdirectory: Regex::new(SUBDIRECTORY_PATTERN)?,
        })
    }

    pub async fn run(&self) -> Result<FetchSummary, TransferError> {
        fs::create_dir_all(self.config.source_dir())?;

        let lister = self.clone();
        let subdirectories = task::spawn_blocking(move || lister.subdirectories()).await??;
        info!(
            source = %self.config.source,
            count = subdirectories.len(),
            "found subdirectories to process"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        for subdirectory in subdirectories {
            let worker = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let name = subdirectory.clone();
                let result = task::spawn_blocking(move || worker.fetch_subdirectory(&name))
                    .await
                    .map_err(TransferError::from)
                    .and_then(|result| result);
                (subdirectory, result)
            });
        }

        let mut summary = FetchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let (subdirectory, result) = joined?;
            summary.subdirectories += 1;
            match result {
                Ok(downloaded) => {
                    info!(%subdirectory, files = downloaded, "completed directory");
                    summary.downloaded += downloaded;
                }
                Err(error) => {
                    error!(%subdirectory, %error, "directory failed");
                    summary.failed_subdirectories.push(subdirectory);
                }
            }
        }

        summary.failed_subdirectories.sort();
        info!(total = summary.downloaded, "scraping completed");
        Ok(summary)
    }

    /// Top-level subdirectories of the source root whose names match the
    /// two-hex-digit layout.
    fn subdirectories(&self) -> Result<Vec<String>, TransferError> {
        let mut session = self.connector.connect()?;
        let root = self.config.source.remote_root();
        let lines = session.list(root)?;
        if let Err(error) = session.quit() {
            warn!(%error, "ftp quit failed");
        }

        Ok(lines
            .iter()
            .filter_map(|line| parse_list_line(line))
            .filter(|entry| entry.is_dir && self.subdirectory.is_match(&entry.name))
            .map(|entry| entry.name)
            .collect())
    }

    /// Downloads everything under one subdirectory that is not already on disk.
    /// Returns the number of files written.
    fn fetch_subdirectory(&self, subdirectory: &str) -> Result<usize, TransferError> {
        let mut session = self.connector.connect()?;
        let remote_dir = format!("{}/{subdirectory}", self.config.source.remote_root());
        let local_dir = self.config.source_dir().join(subdirectory);

        let mut downloaded = 0;
        for remote_file in list_files_recursive(session.as_mut(), &remote_dir) {
            let local_path = local_path_for(&remote_dir, &remote_file, &local_dir);
            if local_path.exists() {
                info!(path = %local_path.display(), "skipping existing file");
                continue;
            }

            match download(session.as_mut(), &remote_file, &local_path) {
                Ok(bytes) => {
                    let extension = Path::new(&remote_file)
                        .extension()
                        .map(|ext| format!(".{}", ext.to_string_lossy()))
                        .unwrap_or_default();
                    info!(remote = %remote_file, %extension, bytes, "downloaded");
                    downloaded += 1;
                }
                Err(error) => error!(remote = %remote_file, %error, "download failed"),
            }

            if !self.config.delay.is_zero() {
                thread::sleep(self.config.delay);
            }
        }

        if let Err(error) = session.quit() {
            warn!(%subdirectory, %error, "ftp quit failed");
        }
        Ok(downloaded)
    }
}

/// Where a download is written until it completes.
fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams `remote_file` into a `.part` file next to `local_path` and renames
/// it into place once the transfer succeeds. A failed transfer leaves nothing
/// at `local_path`, so the next run fetches it again.
fn download(
    session: &mut dyn FtpSession,
    remote_file: &str,
    local_path: &Path,
) -> Result<u64, TransferError> {
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(local_path);
    let transfer = File::create(&partial)
        .map_err(TransferError::from)
        .and_then(|mut file| {
            let bytes = session.retrieve(remote_file, &mut file)?;
            file.flush()?;
            Ok(bytes)
        });

    match transfer {
        Ok(bytes) => {
            fs::rename(&partial, local_path)?;
            Ok(bytes)
        }
        Err(error) => {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %cleanup, "could not remove partial download");
                }
            }
            Err(error)
        }
    }
}
