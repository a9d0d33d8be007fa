//! Document uploads: file in the `documents` bucket plus a row describing it.

use crate::backend::{BlobStore, DataStore, Filter};
use crate::error::{BackendError, RecordError};
use crate::records::{newest_first, row_id, signed_in_user};
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const DOCUMENTS_TABLE: &str = "documents";
pub const DOCUMENTS_BUCKET: &str = "documents";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "row_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub embedding_ready: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct Documents {
    session: SessionStore,
    data: Arc<dyn DataStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Documents {
    pub fn new(session: SessionStore, data: Arc<dyn DataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            session,
            data,
            blobs,
        }
    }

    /// Reject anything that is not a PDF or Word file, or is over 10 MiB.
    pub fn validate(upload: &Upload) -> Result<(), RecordError> {
        if !ALLOWED_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
            return Err(RecordError::Validation(format!(
                "Unsupported file type '{}': upload a PDF, DOC or DOCX file",
                upload.content_type
            )));
        }
        if upload.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(RecordError::Validation(
                "File size must be less than 10MB".to_string(),
            ));
        }
        if upload.file_name.trim().is_empty() || upload.file_name.contains('/') {
            return Err(RecordError::Validation(format!(
                "Invalid file name '{}'",
                upload.file_name
            )));
        }
        Ok(())
    }

    /// Store the file, then record it. Returns the storage path.
    pub async fn upload(&self, upload: Upload) -> Result<String, RecordError> {
        Self::validate(&upload)?;
        let user_id = signed_in_user(&self.session)?;

        let path = format!(
            "{}/{}-{}",
            user_id,
            Utc::now().timestamp_millis(),
            upload.file_name
        );
        self.blobs
            .upload_blob(DOCUMENTS_BUCKET, &path, upload.bytes, &upload.content_type)
            .await?;

        let row = json!({
            "user_id": user_id,
            "name": upload.file_name,
            "path": path,
            "embedding_ready": false,
            "created_at": Utc::now(),
        });
        self.data.upsert_record(DOCUMENTS_TABLE, row).await?;

        info!("Uploaded document {}", path);
        Ok(path)
    }

    /// The signed-in user's documents, newest first.
    pub async fn list(&self) -> Result<Vec<Document>, RecordError> {
        let user_id = signed_in_user(&self.session)?;
        let rows = self
            .data
            .fetch_records(DOCUMENTS_TABLE, &Filter::eq("user_id", user_id))
            .await?;

        let mut documents = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Document>(row) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!("Skipping malformed document row: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();
        newest_first(&mut documents, |d| d.created_at);
        Ok(documents)
    }

    /// Remove the stored file, then its row.
    pub async fn delete(&self, document: &Document) -> Result<(), RecordError> {
        signed_in_user(&self.session)?;
        self.blobs.delete_blob(DOCUMENTS_BUCKET, &document.path).await?;
        self.data
            .delete_record(DOCUMENTS_TABLE, &Filter::eq("id", document.id.as_str()))
            .await
            .map_err(|e: BackendError| {
                warn!("File {} removed but its row remains: {}", document.path, e);
                RecordError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::storage::MemoryStore;

    fn pdf(name: &str, size: usize) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![0u8; size],
        }
    }

    async fn signed_in() -> (InMemoryBackend, Documents) {
        let backend = InMemoryBackend::new().with_user("asha@example.com", "pw", "Asha", "en");
        let session = SessionStore::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            Arc::new(MemoryStore::new()),
        );
        session.sign_in("asha@example.com", "pw").await.unwrap();
        let documents = Documents::new(session, Arc::new(backend.clone()), Arc::new(backend.clone()));
        (backend, documents)
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_accepts_word_and_pdf() {
        for content_type in ALLOWED_CONTENT_TYPES {
            let upload = Upload {
                file_name: "prospectus".to_string(),
                content_type: content_type.to_string(),
                bytes: vec![1, 2, 3],
            };
            assert!(Documents::validate(&upload).is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_other_types() {
        let upload = Upload {
            file_name: "chart.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1],
        };
        assert!(matches!(
            Documents::validate(&upload),
            Err(RecordError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_size_limit() {
        assert!(Documents::validate(&pdf("a.pdf", MAX_UPLOAD_BYTES)).is_ok());
        assert!(Documents::validate(&pdf("a.pdf", MAX_UPLOAD_BYTES + 1)).is_err());
    }

    // ==================== Upload Tests ====================

    #[tokio::test]
    async fn test_upload_requires_session() {
        let backend = InMemoryBackend::new();
        let session = SessionStore::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            Arc::new(MemoryStore::new()),
        );
        let documents = Documents::new(session, Arc::new(backend.clone()), Arc::new(backend));

        let err = documents.upload(pdf("a.pdf", 10)).await.unwrap_err();
        assert_eq!(err, RecordError::NoProfile);
    }

    #[tokio::test]
    async fn test_upload_stores_blob_then_row() {
        let (backend, documents) = signed_in().await;
        let user_id = backend.user_id("asha@example.com").unwrap();

        let path = documents.upload(pdf("bond-terms.pdf", 64)).await.unwrap();

        assert!(path.starts_with(&format!("{}/", user_id)));
        assert!(path.ends_with("-bond-terms.pdf"));
        assert_eq!(backend.blob(DOCUMENTS_BUCKET, &path).unwrap().len(), 64);

        let listed = documents.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "bond-terms.pdf");
        assert_eq!(listed[0].path, path);
        assert!(!listed[0].embedding_ready);
    }

    #[tokio::test]
    async fn test_failed_blob_upload_writes_no_row() {
        let (backend, documents) = signed_in().await;
        backend.set_offline(true);

        assert!(documents.upload(pdf("a.pdf", 1)).await.is_err());

        backend.set_offline(false);
        assert!(backend.rows(DOCUMENTS_TABLE).is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_row() {
        let (backend, documents) = signed_in().await;
        let path = documents.upload(pdf("a.pdf", 1)).await.unwrap();
        let document = documents.list().await.unwrap().remove(0);

        documents.delete(&document).await.unwrap();

        assert!(backend.blob(DOCUMENTS_BUCKET, &path).is_none());
        assert!(documents.list().await.unwrap().is_empty());
    }
}
