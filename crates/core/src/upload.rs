use crate::error::IngestError;
use crate::ingest::IngestionPipeline;
use crate::models::{FileOutcome, IngestionReport, SourceDocument};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One file as sent by a client: a `data:` URL or bare base64 content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub content: String,
}

/// Decodes `content` into raw bytes. Accepts `data:<mime>;base64,<payload>`
/// and bare base64; surrounding whitespace is ignored.
pub fn decode_content(content: &str) -> Result<Vec<u8>, IngestError> {
    let content = content.trim();
    let payload = match content.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                IngestError::Decode("data url has no ',' separator".to_string())
            })?;
            if !header.ends_with(";base64") {
                return Err(IngestError::Decode(format!(
                    "data url is not base64 encoded ({header})"
                )));
            }
            payload
        }
        None => content,
    };

    if payload.is_empty() {
        return Err(IngestError::Decode("content is empty".to_string()));
    }

    STANDARD
        .decode(payload)
        .map_err(|error| IngestError::Decode(error.to_string()))
}

impl TryFrom<&UploadedFile> for SourceDocument {
    type Error = IngestError;

    fn try_from(upload: &UploadedFile) -> Result<Self, Self::Error> {
        Ok(SourceDocument::new(
            upload.filename.clone(),
            decode_content(&upload.content)?,
        ))
    }
}

/// Decodes and ingests each upload in order. Payloads that fail to decode are
/// reported as errors without stopping the others.
pub async fn ingest_uploads(
    pipeline: &IngestionPipeline,
    uploads: &[UploadedFile],
    namespace: &str,
) -> IngestionReport {
    let mut report = IngestionReport::default();

    for upload in uploads {
        let outcome = match SourceDocument::try_from(upload) {
            Ok(document) => pipeline.ingest_one(&document, namespace).await,
            Err(error) => {
                warn!(file = %upload.filename, %error, "rejected upload");
                FileOutcome::failure(&upload.filename, error)
            }
        };
        report.push(outcome);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::fixtures::pdf_with_pages;
    use crate::fakes::{RecordingStore, ShapeEmbedder};
    use crate::models::{FileStatus, IngestionOptions};
    use std::sync::Arc;

    #[test]
    fn data_url_and_bare_base64_decode_to_the_same_bytes() {
        let encoded = STANDARD.encode(b"%PDF-1.4");
        assert_eq!(decode_content(&encoded).unwrap(), b"%PDF-1.4");
        assert_eq!(
            decode_content(&format!("data:application/pdf;base64,{encoded}")).unwrap(),
            b"%PDF-1.4"
        );
    }

    #[test]
    fn malformed_payloads_are_decode_errors() {
        for content in [
            "",
            "not base64!!",
            "data:application/pdf;base64",
            "data:text/plain,hello",
        ] {
            assert!(
                matches!(decode_content(content), Err(IngestError::Decode(_))),
                "{content:?} should fail"
            );
        }
    }

    #[tokio::test]
    async fn undecodable_upload_is_reported_and_others_still_ingest() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = IngestionPipeline::new(
            Arc::new(ShapeEmbedder),
            store.clone(),
            &IngestionOptions::default(),
        )
        .unwrap();
        let good = STANDARD.encode(pdf_with_pages(&["Filter replacement interval"]));
        let uploads = vec![
            UploadedFile {
                filename: "bad.pdf".to_string(),
                content: "data:application/pdf;base64,@@@".to_string(),
            },
            UploadedFile {
                filename: "good.pdf".to_string(),
                content: format!("data:application/pdf;base64,{good}"),
            },
        ];

        let report = ingest_uploads(&pipeline, &uploads, "ns1").await;

        assert_eq!(report.files[0].status, FileStatus::Error);
        assert!(report.files[0]
            .error
            .as_deref()
            .is_some_and(|message| message.starts_with("invalid upload payload")));
        assert_eq!(report.files[1].status, FileStatus::Success);
        assert_eq!(report.total_chunks, report.files[1].chunks);
        assert_eq!(store.upserted().len(), 1);
    }
}
