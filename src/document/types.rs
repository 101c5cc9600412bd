//! Data types for documents and their payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, Embedding};

/// Payload field names that map onto typed [`Payload`] fields.
const TYPED_FIELDS: [&str; 4] = ["content", "filename", "bucket", "object"];

/// Names [`Payload::extra`] keys must not use: the typed fields plus the
/// keys every search result carries.
pub const RESERVED_FIELDS: [&str; 7] = [
    "content", "filename", "bucket", "object", "id", "score", "tag",
];

/// Location of an uploaded object in external blob storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Bucket (or container) name.
    pub bucket: String,
    /// Object key within the bucket.
    pub object: String,
}

/// Non-vector data stored alongside a document.
///
/// The typed fields cover what ingestion produces; anything else goes
/// into `extra`. For projection, `bucket` and `object` address the two
/// halves of [`source`](Self::source).
///
/// # Example
///
/// ```rust
/// use docsearch::Payload;
///
/// let payload = Payload::with_content("the quick brown fox").with_extra("lang", "en");
/// assert_eq!(payload.field("content"), Some("the quick brown fox"));
/// assert_eq!(payload.field("lang"), Some("en"));
/// assert_eq!(payload.field("filename"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Raw text of the document.
    pub content: Option<String>,

    /// Original filename for uploaded documents.
    pub filename: Option<String>,

    /// Blob storage location for uploaded documents.
    pub source: Option<SourceRef>,

    /// Free-form string fields.
    pub extra: BTreeMap<String, String>,
}

impl Payload {
    /// Creates a payload holding only `content`.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Adds an extra field, returning the payload.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Looks up a field by its projection name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "content" => self.content.as_deref(),
            "filename" => self.filename.as_deref(),
            "bucket" => self.source.as_ref().map(|s| s.bucket.as_str()),
            "object" => self.source.as_ref().map(|s| s.object.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Flattens every present field into a name -> value map.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut out = self.extra.clone();
        for name in TYPED_FIELDS {
            if let Some(value) = self.field(name) {
                out.insert(name.to_string(), value.to_string());
            }
        }
        out
    }

    /// Returns a copy restricted to the requested fields.
    ///
    /// A `source` survives projection if either `bucket` or `object` is
    /// requested; the unrequested half is blanked.
    pub fn project(&self, fields: &ReturnFields) -> Payload {
        match fields {
            ReturnFields::All => self.clone(),
            ReturnFields::None => Payload::default(),
            ReturnFields::Only(names) => {
                let wants = |name: &str| names.iter().any(|n| n == name);
                let source = self.source.as_ref().and_then(|s| {
                    let (bucket, object) = (wants("bucket"), wants("object"));
                    (bucket || object).then(|| SourceRef {
                        bucket: if bucket { s.bucket.clone() } else { String::new() },
                        object: if object { s.object.clone() } else { String::new() },
                    })
                });
                Payload {
                    content: self.content.clone().filter(|_| wants("content")),
                    filename: self.filename.clone().filter(|_| wants("filename")),
                    source,
                    extra: self
                        .extra
                        .iter()
                        .filter(|(k, _)| wants(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                }
            }
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.filename.is_none()
            && self.source.is_none()
            && self.extra.is_empty()
    }
}

/// Which payload fields a search returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReturnFields {
    /// Every stored field.
    #[default]
    All,
    /// Ids and scores only.
    None,
    /// The named fields (see [`Payload::field`] for names).
    Only(Vec<String>),
}

impl ReturnFields {
    /// Builds an `Only` projection from field names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }
}

/// A document as stored in the index.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Unique id within the index.
    pub id: DocumentId,

    /// Embedding vector (length equals the index dimension).
    pub vector: Embedding,

    /// Partition label used for filtered search.
    pub tag: String,

    /// Stored fields.
    pub payload: Payload,
}

/// Input for [`SearchEngine::add_document`](crate::SearchEngine::add_document).
///
/// # Example
///
/// ```rust
/// use docsearch::{DocumentId, NewDocument, Payload};
///
/// let doc = NewDocument {
///     id: DocumentId::parse("doc-1").unwrap(),
///     vector: vec![1.0, 0.0, 0.0],
///     tag: "ST".into(),
///     payload: Payload::with_content("hello"),
/// };
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct NewDocument {
    /// Document id. Reusing an id replaces the stored document.
    pub id: DocumentId,

    /// Embedding vector.
    pub vector: Embedding,

    /// Partition label. Required.
    pub tag: String,

    /// Stored fields.
    pub payload: Payload,
}

impl From<NewDocument> for Document {
    fn from(doc: NewDocument) -> Self {
        Self {
            id: doc.id,
            vector: doc.vector,
            tag: doc.tag,
            payload: doc.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded() -> Payload {
        Payload {
            content: None,
            filename: Some("a.txt".into()),
            source: Some(SourceRef {
                bucket: "b".into(),
                object: "a.txt".into(),
            }),
            extra: BTreeMap::from([("lang".to_string(), "en".to_string())]),
        }
    }

    #[test]
    fn test_field_lookup() {
        let p = uploaded();
        assert_eq!(p.field("filename"), Some("a.txt"));
        assert_eq!(p.field("bucket"), Some("b"));
        assert_eq!(p.field("object"), Some("a.txt"));
        assert_eq!(p.field("lang"), Some("en"));
        assert_eq!(p.field("content"), None);
        assert_eq!(p.field("missing"), None);
    }

    #[test]
    fn test_fields_flattens_everything_present() {
        let fields = uploaded().fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["bucket"], "b");
        assert!(!fields.contains_key("content"));
    }

    #[test]
    fn test_project_all_and_none() {
        let p = uploaded();
        assert_eq!(p.project(&ReturnFields::All), p);
        assert!(p.project(&ReturnFields::None).is_empty());
    }

    #[test]
    fn test_project_only() {
        let p = uploaded().project(&ReturnFields::only(["bucket", "lang"]));
        assert_eq!(p.filename, None);
        assert_eq!(p.field("bucket"), Some("b"));
        assert_eq!(p.field("object"), Some(""));
        assert_eq!(p.field("lang"), Some("en"));
    }

    #[test]
    fn test_project_only_unknown_field_is_empty() {
        let p = uploaded().project(&ReturnFields::only(["nope"]));
        assert!(p.is_empty());
    }

    #[test]
    fn test_payload_serialization() {
        let p = uploaded();
        let bytes = bincode::serialize(&p).unwrap();
        let restored: Payload = bincode::deserialize(&bytes).unwrap();
        assert_eq!(p, restored);
    }
}
