use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{EmbedError, IngestError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{
    FileOutcome, IndexRecord, IngestionOptions, IngestionReport, RecordMetadata, SourceDocument,
};
use crate::traits::VectorStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// File name without its extension, with spaces turned into `-` and path
/// separators into `_`. Used as the prefix of every record id.
pub fn safe_filename(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 && !file_name[dot..].contains(['/', '\\']) => &file_name[..dot],
        _ => file_name,
    };

    stem.replace(' ', "-").replace(['/', '\\'], "_")
}

pub fn record_id(safe_name: &str, chunk_index: u64) -> String {
    format!("{safe_name}-chunk-{chunk_index}")
}

/// Builds the records for one batch of chunks. `first_index` is the position of
/// the batch's first chunk within the whole document.
pub fn build_records(
    file_name: &str,
    chunks: &[String],
    vectors: Vec<Vec<f32>>,
    first_index: u64,
) -> Vec<IndexRecord> {
    let safe_name = safe_filename(file_name);

    chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(offset, (chunk, values))| {
            let chunk_index = first_index + offset as u64;
            IndexRecord {
                id: record_id(&safe_name, chunk_index),
                values,
                metadata: RecordMetadata {
                    chunk: chunk.clone(),
                    file_name: file_name.to_string(),
                    chunk_index,
                },
            }
        })
        .collect()
}

/// Extract → chunk → embed → upsert, one document at a time.
pub struct IngestionPipeline {
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        options: &IngestionOptions,
    ) -> Result<Self, IngestError> {
        if options.upsert_batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "upsert batch size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            extractor: Arc::new(LopdfExtractor),
            embedder,
            store,
            chunking: ChunkingConfig::try_from(options)?,
            batch_size: options.upsert_batch_size,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Ingests every document, isolating failures per file. Outcomes keep the
    /// input order.
    pub async fn ingest(&self, documents: &[SourceDocument], namespace: &str) -> IngestionReport {
        let mut report = IngestionReport::default();
        for document in documents {
            report.push(self.ingest_one(document, namespace).await);
        }

        info!(
            namespace,
            files = report.files.len(),
            total_chunks = report.total_chunks,
            "ingestion finished"
        );
        report
    }

    pub async fn ingest_one(&self, document: &SourceDocument, namespace: &str) -> FileOutcome {
        match self.ingest_document(document, namespace).await {
            Ok(chunks) => {
                info!(file = %document.file_name, chunks, "ingested document");
                FileOutcome::success(&document.file_name, chunks)
            }
            Err(error) => {
                warn!(file = %document.file_name, %error, "failed to ingest document");
                FileOutcome::failure(&document.file_name, error)
            }
        }
    }

    /// Returns the number of chunks written. A failure part-way leaves the
    /// batches already upserted in the store.
    pub async fn ingest_document(
        &self,
        document: &SourceDocument,
        namespace: &str,
    ) -> Result<usize, IngestError> {
        let extractor = self.extractor.clone();
        let bytes = document.bytes.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes)).await??;
        let chunks = split_text(&text, self.chunking);

        for (batch_number, batch) in chunks.chunks(self.batch_size).enumerate() {
            let first_index = (batch_number * self.batch_size) as u64;
            let vectors = self.embedder.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EmbedError::Response {
                    provider: self.embedder.name().to_string(),
                    details: format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                }
                .into());
            }

            let records = build_records(&document.file_name, batch, vectors, first_index);
            self.store.upsert(namespace, &records).await?;
            debug!(
                file = %document.file_name,
                batch = batch_number,
                records = records.len(),
                "upserted batch"
            );
        }

        Ok(chunks.len())
    }

    /// Ingests every PDF under `folder`, recursively, in path order.
    pub async fn ingest_folder(
        &self,
        folder: &Path,
        namespace: &str,
    ) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }

        let mut report = IngestionReport::default();
        for path in files {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            info!(file = %file_name, "processing");

            let outcome = match fs::read(&path) {
                Ok(bytes) => {
                    self.ingest_one(&SourceDocument::new(file_name, bytes), namespace)
                        .await
                }
                Err(error) => FileOutcome::failure(file_name, IngestError::Io(error)),
            };
            report.push(outcome);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::fixtures::pdf_with_pages;
    use crate::fakes::{PickyEmbedder, RecordingStore, ShapeEmbedder, StaticExtractor};
    use crate::models::FileStatus;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn pipeline(store: Arc<RecordingStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(ShapeEmbedder),
            store,
            &IngestionOptions::default(),
        )
        .unwrap()
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|index| format!("w{index:03}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn safe_filename_strips_extension_and_unsafe_characters() {
        assert_eq!(safe_filename("Pump Manual v2.pdf"), "Pump-Manual-v2");
        assert_eq!(safe_filename("a/b\\c d.PDF"), "a_b_c-d");
        assert_eq!(safe_filename("archive.tar.pdf"), "archive.tar");
        assert_eq!(safe_filename(".hidden"), ".hidden");
        assert_eq!(safe_filename("dir.v1/readme"), "dir.v1_readme");
    }

    #[test]
    fn records_number_chunks_from_the_batch_offset() {
        let chunks = vec!["one".to_string(), "two".to_string()];
        let records = build_records("My File.pdf", &chunks, vec![vec![1.0], vec![2.0]], 32);

        assert_eq!(records[0].id, "My-File-chunk-32");
        assert_eq!(records[1].id, "My-File-chunk-33");
        assert_eq!(records[1].metadata.chunk, "two");
        assert_eq!(records[1].metadata.file_name, "My File.pdf");
        assert_eq!(records[1].metadata.chunk_index, 33);
    }

    #[tokio::test]
    async fn upserts_are_batched_by_32_and_cover_every_chunk_once() {
        let store = Arc::new(RecordingStore::default());
        let options = IngestionOptions {
            max_chunk_size: 20,
            ..IngestionOptions::default()
        };
        let pipeline = IngestionPipeline::new(
            Arc::new(ShapeEmbedder),
            store.clone(),
            &options,
        )
        .unwrap()
        .with_extractor(Arc::new(StaticExtractor(words(300))));

        let chunk_count = pipeline
            .ingest_document(&SourceDocument::new("big.pdf", Vec::new()), "ns1")
            .await
            .unwrap();

        let upserts = store.upserted();
        assert!(chunk_count > 64);
        assert_eq!(upserts.len(), chunk_count.div_ceil(32));
        assert!(upserts.iter().all(|(_, batch)| batch.len() <= 32));

        let indices = upserts
            .iter()
            .flat_map(|(_, batch)| batch.iter().map(|record| record.metadata.chunk_index))
            .collect::<Vec<_>>();
        assert_eq!(indices, (0..chunk_count as u64).collect::<Vec<_>>());

        let ids = upserts
            .iter()
            .flat_map(|(_, batch)| batch.iter().map(|record| record.id.clone()))
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), chunk_count);
    }

    #[tokio::test]
    async fn one_unreadable_file_does_not_stop_the_others() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone());
        let documents = vec![
            SourceDocument::new("first.pdf", pdf_with_pages(&["Pump maintenance schedule"])),
            SourceDocument::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec()),
            SourceDocument::new("third.pdf", pdf_with_pages(&["Valve torque table", "Seal kit"])),
        ];

        let report = pipeline.ingest(&documents, "ns1").await;

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.files[0].status, FileStatus::Success);
        assert!(report.files[0].chunks > 0);
        assert_eq!(report.files[1].status, FileStatus::Error);
        assert_eq!(report.files[1].chunks, 0);
        assert!(report.files[1]
            .error
            .as_deref()
            .is_some_and(|message| message.contains("pdf extraction failed")));
        assert_eq!(report.files[2].status, FileStatus::Success);
        assert!(report.files[2].chunks > 0);
        assert_eq!(
            report.total_chunks,
            report.files[0].chunks + report.files[2].chunks
        );
        assert!(store
            .upserted()
            .iter()
            .all(|(_, batch)| batch.iter().all(|record| record.metadata.file_name != "broken.pdf")));
    }

    struct ThreadRecordingExtractor(std::sync::Mutex<Vec<std::thread::ThreadId>>);

    impl PdfExtractor for ThreadRecordingExtractor {
        fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError> {
            self.0.lock().unwrap().push(std::thread::current().id());
            if bytes == b"panic" {
                panic!("malformed object stream");
            }
            Ok("Intake filter interval".to_string())
        }
    }

    #[tokio::test]
    async fn extraction_runs_off_the_async_thread() {
        let extractor = Arc::new(ThreadRecordingExtractor(Default::default()));
        let pipeline =
            pipeline(Arc::new(RecordingStore::default())).with_extractor(extractor.clone());

        let outcome = pipeline
            .ingest_one(&SourceDocument::new("a.pdf", b"%PDF".to_vec()), "ns1")
            .await;

        assert!(outcome.is_success());
        let threads = extractor.0.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn panicking_extractor_fails_only_that_file() {
        let pipeline = pipeline(Arc::new(RecordingStore::default()))
            .with_extractor(Arc::new(ThreadRecordingExtractor(Default::default())));
        let documents = vec![
            SourceDocument::new("bad.pdf", b"panic".to_vec()),
            SourceDocument::new("good.pdf", b"%PDF".to_vec()),
        ];

        let report = pipeline.ingest(&documents, "ns1").await;

        assert_eq!(report.files[0].status, FileStatus::Error);
        assert!(report.files[0]
            .error
            .as_deref()
            .is_some_and(|message| message.contains("extraction task failed")));
        assert_eq!(report.files[1].status, FileStatus::Success);
    }

    #[tokio::test]
    async fn embedding_and_store_failures_are_isolated_per_file() {
        let store = Arc::new(RecordingStore {
            fail_writes_for: Some("store-down.pdf".to_string()),
            ..RecordingStore::default()
        });
        let pipeline = IngestionPipeline::new(
            Arc::new(PickyEmbedder { poison: "poison" }),
            store.clone(),
            &IngestionOptions::default(),
        )
        .unwrap()
        .with_extractor(Arc::new(StaticExtractor("plain text".to_string())));

        let ok = pipeline
            .ingest(&[SourceDocument::new("ok.pdf", Vec::new())], "ns1")
            .await;
        let down = pipeline
            .ingest(&[SourceDocument::new("store-down.pdf", Vec::new())], "ns1")
            .await;

        assert_eq!(ok.total_chunks, 1);
        assert_eq!(down.files[0].status, FileStatus::Error);
        assert!(down.files[0]
            .error
            .as_deref()
            .is_some_and(|message| message.contains("write")));

        let poisoned = IngestionPipeline::new(
            Arc::new(PickyEmbedder { poison: "poison" }),
            store,
            &IngestionOptions::default(),
        )
        .unwrap()
        .with_extractor(Arc::new(StaticExtractor("poison pill".to_string())));
        let report = poisoned
            .ingest(&[SourceDocument::new("p.pdf", Vec::new())], "ns1")
            .await;
        assert_eq!(report.files[0].status, FileStatus::Error);
        assert_eq!(report.total_chunks, 0);
    }

    #[tokio::test]
    async fn reingesting_a_file_reuses_ids_and_metadata() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone());
        let document = SourceDocument::new("Manual A.pdf", pdf_with_pages(&["Torque values"]));

        pipeline.ingest(&[document.clone()], "ns1").await;
        pipeline.ingest(&[document], "ns1").await;

        let upserts = store.upserted();
        assert_eq!(upserts.len(), 2);
        assert_eq!(upserts[0], upserts[1]);
        assert_eq!(upserts[0].1[0].id, "Manual-A-chunk-0");
    }

    #[tokio::test]
    async fn empty_text_is_a_successful_file_with_no_chunks() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = pipeline(store.clone()).with_extractor(Arc::new(StaticExtractor(String::new())));

        let report = pipeline
            .ingest(&[SourceDocument::new("blank.pdf", Vec::new())], "ns1")
            .await;

        assert_eq!(report.files[0], FileOutcome::success("blank.pdf", 0));
        assert!(store.upserted().is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let options = IngestionOptions {
            upsert_batch_size: 0,
            ..IngestionOptions::default()
        };
        let result = IngestionPipeline::new(
            Arc::new(ShapeEmbedder),
            Arc::new(RecordingStore::default()),
            &options,
        );
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn folder_ingestion_reports_each_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("good.pdf"), pdf_with_pages(&["Coolant level"]))?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let store = Arc::new(RecordingStore::default());
        let report = pipeline(store).ingest_folder(dir.path(), "ns1").await?;

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].filename, "good.pdf");
        assert!(report.files[0].is_success());
        assert_eq!(report.files[1].filename, "unreadable.pdf");
        assert!(!report.files[1].is_success());
        Ok(())
    }

    #[tokio::test]
    async fn folder_ingestion_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = pipeline(Arc::new(RecordingStore::default()))
            .ingest_folder(dir.path(), "ns1")
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
