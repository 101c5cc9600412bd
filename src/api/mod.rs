//! Request handlers for the ingestion and search API.
//!
//! [`DocumentService`] turns API bodies into engine calls: it embeds text
//! through the configured [`EmbeddingService`], extracts uploads through a
//! [`TextExtractor`], and maps every failure to an [`ApiError`] carrying an
//! HTTP status. It knows nothing about sockets; the `http` feature wires it
//! into an axum router (see [`http`]).
//!
//! | Route | Body | Success |
//! |-------|------|---------|
//! | `POST /add` | [`AddRequest`] | 201 [`AddResponse`] |
//! | `POST /search` | [`SearchBody`] | 200 [`SearchResponse`] |
//! | `POST /upload` | multipart, see [`Upload`] | 200 [`UploadResponse`] |

#[cfg(feature = "http")]
pub mod http;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::document::{NewDocument, Payload, ReturnFields, SourceRef};
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::engine::SearchEngine;
use crate::error::{DocSearchError, Result, ValidationError};
use crate::extract::{strip_newlines, PlainTextExtractor, TextExtractor};
use crate::search::{SearchRequest, DEFAULT_K};
use crate::types::DocumentId;

/// Message returned by a successful `/add`.
pub const ADDED: &str = "Document added successfully";

/// Message returned by a successful `/upload`.
pub const PROCESSED: &str = "File successfully processed";

/// `/upload` without a `file` part.
pub const NO_FILE_PART: &str = "No file part in the request";

/// `/upload` with a file part but an empty filename.
pub const NO_FILE_SELECTED: &str = "No file selected for uploading";

/// `/upload` whose file yields no text.
pub const NO_TEXT: &str = "Unable to extract text from the file";

// ============================================================================
// Bodies
// ============================================================================

/// Body of `POST /add`.
///
/// `content` is embedded unless `vector` is given. Extra `fields` are
/// stored and returned by searches.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AddRequest {
    /// Document id.
    pub id: Option<String>,
    /// Tag; required.
    pub tag: Option<String>,
    /// Text to store and, without `vector`, to embed.
    pub content: Option<String>,
    /// Precomputed embedding.
    pub vector: Option<Vec<f32>>,
    /// Additional stored fields.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Response of `POST /add`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddResponse {
    /// Always [`ADDED`].
    pub status: String,
}

/// Body of `POST /search`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchBody {
    /// Query text, embedded unless `vector` is given.
    pub query: Option<String>,
    /// Precomputed query embedding.
    pub vector: Option<Vec<f32>>,
    /// Restrict to one tag; absent searches every document.
    pub tag: Option<String>,
    /// Number of results, default 3.
    pub k: Option<usize>,
    /// Payload fields to return; absent returns all.
    pub return_fields: Option<Vec<String>>,
}

/// One search result as returned over the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document id.
    pub id: String,
    /// Similarity, higher is closer.
    pub score: f32,
    /// Document tag.
    pub tag: String,
    /// Returned payload fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// Response of `POST /search`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits, best first.
    pub results: Vec<SearchResult>,
}

/// The file part of an upload.
#[derive(Clone, Debug, Default)]
pub struct FilePart {
    /// Client-side filename.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Parsed `POST /upload` form.
#[derive(Clone, Debug, Default)]
pub struct Upload {
    /// The `file` part, if present.
    pub file: Option<FilePart>,
    /// `bucketName` form field.
    pub bucket_name: Option<String>,
    /// `objName` form field.
    pub obj_name: Option<String>,
}

/// Response of `POST /upload`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always [`PROCESSED`].
    pub message: String,
    /// Filename of the processed upload.
    pub filename: String,
}

/// An error as returned over the API: a status and `{"error": message}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// HTTP status code.
    #[serde(skip)]
    pub status: u16,
    /// Human-readable message.
    #[serde(rename = "error")]
    pub message: String,
}

impl ApiError {
    /// A 400 with a fixed message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

impl From<DocSearchError> for ApiError {
    fn from(err: DocSearchError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            warn!(error = %err, "Request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        DocSearchError::from(err).into()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

// ============================================================================
// Service
// ============================================================================

/// The engine plus the collaborators the API needs.
pub struct DocumentService {
    engine: SearchEngine,
    embedder: Box<dyn EmbeddingService>,
    extractor: Box<dyn TextExtractor>,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("engine", &self.engine)
            .field("embedding_dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    /// Wraps an engine with explicit collaborators.
    ///
    /// # Errors
    ///
    /// `Config` if the embedder's dimension differs from the index.
    pub fn new(
        engine: SearchEngine,
        embedder: Box<dyn EmbeddingService>,
        extractor: Box<dyn TextExtractor>,
    ) -> Result<Self> {
        let dimension = engine.config().dimension();
        if embedder.dimension() != dimension {
            return Err(DocSearchError::config(format!(
                "embedding service produces {} dimensions, index has {}",
                embedder.dimension(),
                dimension
            )));
        }
        Ok(Self {
            engine,
            embedder,
            extractor,
        })
    }

    /// Wraps an engine with the embedder its config selects and the
    /// plain-text extractor.
    pub fn from_engine(engine: SearchEngine) -> Result<Self> {
        let embedder = create_embedding_service(engine.config())?;
        Self::new(engine, embedder, Box::new(PlainTextExtractor))
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Releases the service, closing the engine.
    pub fn close(self) -> Result<()> {
        self.engine.close()
    }

    /// Handles `POST /add`.
    #[instrument(skip(self, request), fields(id = ?request.id))]
    pub fn add(&self, request: AddRequest) -> std::result::Result<AddResponse, ApiError> {
        let id = DocumentId::parse(required(request.id, "id")?)?;
        let tag = required(request.tag, "tag")?;

        let vector = match (request.vector, request.content.as_deref()) {
            (Some(vector), _) => vector,
            (None, Some(content)) => self.embedder.embed(content)?,
            (None, None) => return Err(ValidationError::required_field("content").into()),
        };

        let mut payload = Payload {
            content: request.content,
            extra: request.fields,
            ..Default::default()
        };
        payload.extra.retain(|_, v| !v.is_empty());

        self.engine.add_document(NewDocument {
            id,
            vector,
            tag,
            payload,
        })?;

        Ok(AddResponse {
            status: ADDED.to_string(),
        })
    }

    /// Handles `POST /search`.
    #[instrument(skip(self, body), fields(tag = ?body.tag, k = ?body.k))]
    pub fn search(&self, body: SearchBody) -> std::result::Result<SearchResponse, ApiError> {
        let vector = match (body.vector, body.query.as_deref()) {
            (Some(vector), _) => vector,
            (None, Some(query)) => self.embedder.embed(query)?,
            (None, None) => return Err(ValidationError::required_field("query").into()),
        };

        let mut request = SearchRequest::new(vector, body.k.unwrap_or(DEFAULT_K));
        if let Some(tag) = body.tag {
            request = request.with_tag(tag);
        }
        if let Some(names) = body.return_fields {
            request = request.with_fields(ReturnFields::Only(names));
        }

        let results = self
            .engine
            .search_with(request)?
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id.into_inner(),
                score: hit.score,
                tag: hit.tag,
                fields: hit
                    .payload
                    .fields()
                    .into_iter()
                    .filter(|(_, v)| !v.is_empty())
                    .collect(),
            })
            .collect();

        Ok(SearchResponse { results })
    }

    /// Handles `POST /upload`.
    ///
    /// The extracted text has its line breaks removed, is embedded, and is
    /// stored under `bucketName/objName` with the configured default tag.
    #[instrument(skip(self, upload), fields(bucket = ?upload.bucket_name, object = ?upload.obj_name))]
    pub fn upload(&self, upload: Upload) -> std::result::Result<UploadResponse, ApiError> {
        let Some(file) = upload.file else {
            return Err(ApiError::bad_request(NO_FILE_PART));
        };
        if file.filename.is_empty() {
            return Err(ApiError::bad_request(NO_FILE_SELECTED));
        }
        let bucket = required(upload.bucket_name, "bucketName")?;
        let object = required(upload.obj_name, "objName")?;
        let id = DocumentId::for_object(&bucket, &object)?;

        let text = match self.extractor.extract(&file.filename, &file.bytes) {
            Ok(text) => strip_newlines(&text),
            Err(e) if e.is_extraction() => {
                debug!(error = %e, "Extraction yielded no text");
                return Err(ApiError::bad_request(NO_TEXT));
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Err(ApiError::bad_request(NO_TEXT));
        }

        let vector = self.embedder.embed(&text)?;
        self.engine.add_document(NewDocument {
            id,
            vector,
            tag: self.engine.config().default_tag.clone(),
            payload: Payload {
                content: Some(text),
                filename: Some(file.filename.clone()),
                source: Some(SourceRef { bucket, object }),
                extra: BTreeMap::new(),
            },
        })?;

        Ok(UploadResponse {
            message: PROCESSED.to_string(),
            filename: file.filename,
        })
    }
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::required_field(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbeddingDimension};
    use crate::embedding::ExternalEmbedding;

    fn service() -> DocumentService {
        let config = Config::with_hashing_embeddings(EmbeddingDimension::Custom(64));
        let engine = SearchEngine::open_in_memory(config).unwrap();
        DocumentService::from_engine(engine).unwrap()
    }

    fn add(svc: &DocumentService, id: &str, tag: &str, content: &str) {
        svc.add(AddRequest {
            id: Some(id.into()),
            tag: Some(tag.into()),
            content: Some(content.into()),
            ..Default::default()
        })
        .unwrap();
    }

    #[test]
    fn test_add_and_search_text() {
        let svc = service();
        add(&svc, "1", "ST", "rust embedded database");
        add(&svc, "2", "ST", "baking sourdough bread");

        let response = svc
            .search(SearchBody {
                query: Some("embedded database in rust".into()),
                tag: Some("ST".into()),
                k: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, "1");
        assert_eq!(
            response.results[0].fields.get("content").map(String::as_str),
            Some("rust embedded database")
        );
    }

    #[test]
    fn test_search_defaults_to_three() {
        let svc = service();
        for i in 0..5 {
            add(&svc, &i.to_string(), "ST", &format!("document number {}", i));
        }
        let response = svc
            .search(SearchBody {
                query: Some("document".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.results.len(), DEFAULT_K);
    }

    #[test]
    fn test_add_missing_fields_is_400() {
        let svc = service();
        let err = svc
            .add(AddRequest {
                id: Some("1".into()),
                content: Some("x".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("tag"));

        let err = svc
            .add(AddRequest {
                id: Some("1".into()),
                tag: Some("ST".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_add_rejects_fields_shadowing_result_keys() {
        let svc = service();
        for key in ["id", "score", "tag"] {
            let err = svc
                .add(AddRequest {
                    id: Some("real".into()),
                    tag: Some("ST".into()),
                    content: Some("hello".into()),
                    fields: [(key.to_string(), "spoofed".to_string())].into(),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(err.status, 400);
            assert!(err.message.contains("reserved"), "{}", err.message);
        }
        assert!(svc.engine().is_empty().unwrap());

        add(&svc, "real", "ST", "hello");
        let response = svc
            .search(SearchBody {
                query: Some("hello".into()),
                ..Default::default()
            })
            .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["results"][0]["id"], "real");
    }

    #[test]
    fn test_add_wrong_vector_dimension_is_400() {
        let svc = service();
        let err = svc
            .add(AddRequest {
                id: Some("1".into()),
                tag: Some("ST".into()),
                vector: Some(vec![1.0, 2.0]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("dimension"));
    }

    #[test]
    fn test_upload_flow() {
        let svc = service();
        let response = svc
            .upload(Upload {
                file: Some(FilePart {
                    filename: "notes.txt".into(),
                    bytes: b"vector\nsearch\nengine".to_vec(),
                }),
                bucket_name: Some("bucket".into()),
                obj_name: Some("notes.txt".into()),
            })
            .unwrap();
        assert_eq!(response.message, PROCESSED);
        assert_eq!(response.filename, "notes.txt");

        let doc = svc.engine().get_document("bucket/notes.txt").unwrap().unwrap();
        assert_eq!(doc.tag, "ST");
        assert_eq!(doc.payload.content.as_deref(), Some("vectorsearchengine"));
        assert_eq!(doc.payload.field("object"), Some("notes.txt"));
    }

    #[test]
    fn test_upload_errors() {
        let svc = service();

        let err = svc.upload(Upload::default()).unwrap_err();
        assert_eq!(err, ApiError::bad_request(NO_FILE_PART));

        let err = svc
            .upload(Upload {
                file: Some(FilePart::default()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ApiError::bad_request(NO_FILE_SELECTED));

        let err = svc
            .upload(Upload {
                file: Some(FilePart {
                    filename: "empty.txt".into(),
                    bytes: b"\n\n".to_vec(),
                }),
                bucket_name: Some("b".into()),
                obj_name: Some("o".into()),
            })
            .unwrap_err();
        assert_eq!(err, ApiError::bad_request(NO_TEXT));
    }

    #[test]
    fn test_external_embedder_requires_vectors() {
        let engine = SearchEngine::open_in_memory(Config::with_index(
            3,
            crate::vector::DistanceMetric::Cosine,
        ))
        .unwrap();
        let svc = DocumentService::new(
            engine,
            Box::new(ExternalEmbedding::new(3)),
            Box::new(PlainTextExtractor),
        )
        .unwrap();

        let err = svc
            .search(SearchBody {
                query: Some("text".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status, 500);

        let ok = svc
            .search(SearchBody {
                vector: Some(vec![1.0, 0.0, 0.0]),
                ..Default::default()
            })
            .unwrap();
        assert!(ok.results.is_empty());
    }

    #[test]
    fn test_embedder_dimension_must_match() {
        let engine = SearchEngine::open_in_memory(Config::with_index(
            3,
            crate::vector::DistanceMetric::Cosine,
        ))
        .unwrap();
        let err = DocumentService::new(
            engine,
            Box::new(ExternalEmbedding::new(4)),
            Box::new(PlainTextExtractor),
        )
        .unwrap_err();
        assert!(matches!(err, DocSearchError::Config { .. }));
    }

    #[test]
    fn test_api_error_body() {
        let json = serde_json::to_value(ApiError::bad_request(NO_TEXT)).unwrap();
        assert_eq!(json, serde_json::json!({ "error": NO_TEXT }));
    }
}
