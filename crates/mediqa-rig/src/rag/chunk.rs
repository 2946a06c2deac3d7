//! Document chunks and their deterministic identifiers.

use mediqa_vector::VectorRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Metadata keys stored alongside every chunk vector.
pub(crate) mod keys {
    pub const TEXT: &str = "text";
    pub const TITLE: &str = "title";
    pub const DOCUMENT_ID: &str = "document_id";
    pub const SOURCE: &str = "source";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const CONTENT_HASH: &str = "content_hash";
}

/// Returns the hex SHA-256 of a document's content.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Derives the chunk id from its document, content and position.
///
/// Identical inputs always yield the same UUID, so repopulating an unchanged
/// document overwrites instead of duplicating.
pub fn chunk_id(document_id: &str, content_hash: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0]);
    hasher.update(content_hash.as_bytes());
    hasher.update([0]);
    hasher.update((chunk_index as u64).to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    let uuid: Uuid = Builder::from_random_bytes(bytes).into_uuid();
    uuid.to_string()
}

/// A bounded slice of a source document, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Deterministic chunk id.
    pub id: String,
    /// Document identifier, the corpus-relative path.
    pub document_id: String,
    /// Human readable title, the file stem.
    pub title: String,
    /// Source path.
    pub source: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Hash of the whole document content.
    pub content_hash: String,
    /// Chunk text.
    pub text: String,
}

impl DocumentChunk {
    /// Converts the chunk into a vector record.
    pub fn into_record(self, vector: Vec<f32>) -> VectorRecord {
        VectorRecord::new(self.id, vector)
            .with_field(keys::TEXT, json!(self.text))
            .with_field(keys::TITLE, json!(self.title))
            .with_field(keys::DOCUMENT_ID, json!(self.document_id))
            .with_field(keys::SOURCE, json!(self.source))
            .with_field(keys::CHUNK_INDEX, json!(self.chunk_index))
            .with_field(keys::CONTENT_HASH, json!(self.content_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_stable_uuids() {
        let hash = content_hash("Aspirin reduces fever.");
        let a = chunk_id("Aspirin", &hash, 0);
        let b = chunk_id("Aspirin", &hash, 0);

        assert_eq!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
        assert_ne!(a, chunk_id("Aspirin", &hash, 1));
        assert_ne!(a, chunk_id("Aspirin", &content_hash("changed"), 0));
    }

    #[test]
    fn record_carries_provenance() {
        let chunk = DocumentChunk {
            id: chunk_id("Aspirin", "abc", 0),
            document_id: "Aspirin".into(),
            title: "Aspirin".into(),
            source: "knowledge/Aspirin.txt".into(),
            chunk_index: 0,
            content_hash: "abc".into(),
            text: "Aspirin reduces fever.".into(),
        };

        let record = chunk.into_record(vec![1.0, 0.0]);
        assert_eq!(record.metadata[keys::TEXT], json!("Aspirin reduces fever."));
        assert_eq!(record.metadata[keys::CHUNK_INDEX], json!(0));
    }
}
