use crate::error::TransferError;
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{error, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub archives: usize,
    pub extracted: Vec<PathBuf>,
    pub failed_archives: Vec<PathBuf>,
}

fn is_tar_gz(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".tar.gz"))
}

/// Extracts the `.pdf` members of every `.tar.gz` under `source_dir` into
/// `target_dir`, keeping only each member's file name. An archive that cannot
/// be read is logged and skipped.
pub fn extract_pdfs(source_dir: &Path, target_dir: &Path) -> Result<ExtractionSummary, TransferError> {
    fs::create_dir_all(target_dir)?;

    let mut archives = WalkDir::new(source_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_tar_gz(entry.path()))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    archives.sort();

    let mut summary = ExtractionSummary::default();
    for archive in archives {
        summary.archives += 1;
        match extract_archive(&archive, target_dir) {
            Ok(extracted) => summary.extracted.extend(extracted),
            Err(error) => {
                error!(archive = %archive.display(), %error, "failed to extract archive");
                summary.failed_archives.push(archive);
            }
        }
    }

    info!(
        archives = summary.archives,
        pdfs = summary.extracted.len(),
        "extraction finished"
    );
    Ok(summary)
}

fn extract_archive(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let archive_error = |details: std::io::Error| TransferError::Archive {
        path: archive_path.display().to_string(),
        details: details.to_string(),
    };

    let file = fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut extracted = Vec::new();
    for item in archive.entries().map_err(archive_error)? {
        let mut entry = item.map_err(archive_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let member = entry.path().map_err(archive_error)?.into_owned();
        let is_pdf = member
            .extension()
            .is_some_and(|ext| ext == "pdf");
        let Some(file_name) = member.file_name().filter(|_| is_pdf) else {
            continue;
        };

        let target = target_dir.join(file_name);
        info!(path = %target.display(), "extracting");
        entry.unpack(&target).map_err(archive_error)?;
        extracted.push(target);
    }

    Ok(extracted)
}
