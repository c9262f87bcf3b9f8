//! SQLite-backed vector store.
//!
//! One physical table (`vector_entries`) stands in for per-workspace
//! ChromaDB collections: the `collection` column holds `workspace_<id>`, so
//! every workspace's logical collection lives in the same table, scoped by
//! a `WHERE collection = ?` predicate on every query. Search is exact
//! cosine similarity via a full scan of the scoped rows — the teacher's own
//! `search.rs` already does brute-force scoring over SQLite rows, and the
//! dependency stack carries no ANN crate, so this keeps that precedent
//! rather than reaching for one.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::cache::{Cache, VECTOR_SEARCH_TTL};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{BoundingBox, ChunkType, EntryKind};

fn collection_name(workspace_id: &str) -> String {
    format!("workspace_{}", workspace_id)
}

pub struct ChunkEntry {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub page_number: i64,
    pub section_name: String,
    pub entry_type: ChunkType,
    /// Chunk-vs-clause discriminator, kept distinct from `entry_type`
    /// (spec data model's two separate metadata keys).
    pub kind: EntryKind,
    pub text: String,
    pub embedding: Vec<f32>,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub page_number: i64,
    pub section_name: String,
    pub text: String,
    pub similarity: f32,
    pub bbox: Option<BoundingBox>,
}

/// Similarity floor below which a match is discarded
/// (`original_source/backend/src/services/vector_store.py`'s `MIN_SIMILARITY_THRESHOLD`).
pub const MIN_SIMILARITY_THRESHOLD: f32 = -0.3;

/// Default candidate pool size before truncation to the top results.
pub const DEFAULT_N_RESULTS: usize = 10;

/// Strip metadata keys whose value would break JSON round-tripping or have
/// no meaning once stored: empty strings and nulls. Mirrors
/// `vector_store.py`'s `_clean_metadata`.
fn clean_metadata(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let cleaned: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            serde_json::Value::Object(cleaned)
        }
        other => other.clone(),
    }
}

pub async fn index_chunks(
    pool: &SqlitePool,
    cache: &Cache,
    workspace_id: &str,
    entries: &[ChunkEntry],
) -> Result<()> {
    let collection = collection_name(workspace_id);

    for entry in entries {
        let bbox_json = entry
            .bbox
            .map(|b| serde_json::to_string(&b))
            .transpose()?;
        let extra = clean_metadata(&serde_json::json!({}));

        sqlx::query(
            r#"
            INSERT INTO vector_entries
                (id, collection, workspace_id, document_id, document_name,
                 chunk_id, page_number, section_name, entry_type, kind, text,
                 embedding, bbox_json, extra_metadata_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&collection)
        .bind(workspace_id)
        .bind(&entry.document_id)
        .bind(&entry.document_name)
        .bind(&entry.chunk_id)
        .bind(entry.page_number)
        .bind(&entry.section_name)
        .bind(entry.entry_type.as_str())
        .bind(entry.kind.as_str())
        .bind(&entry.text)
        .bind(vec_to_blob(&entry.embedding))
        .bind(bbox_json)
        .bind(extra.to_string())
        .execute(pool)
        .await?;
    }

    cache.invalidate_workspace(workspace_id).await;
    Ok(())
}

/// Score every row in the workspace's collection against `query_embedding`,
/// drop anything below [`MIN_SIMILARITY_THRESHOLD`], and return the top
/// `limit` by similarity. `include_chunks`/`include_clauses` restrict the
/// scan to the corresponding `kind` of entry; passing both `false` returns
/// no results. Results are cached under
/// `vector_search:{workspace_id}:{hash}` for [`VECTOR_SEARCH_TTL`].
pub async fn search(
    pool: &SqlitePool,
    cache: &Cache,
    workspace_id: &str,
    query_embedding: &[f32],
    limit: usize,
    include_chunks: bool,
    include_clauses: bool,
) -> Result<Vec<ScoredEntry>> {
    if !include_chunks && !include_clauses {
        return Ok(Vec::new());
    }

    let collection = collection_name(workspace_id);
    let embedding_hex = hex::encode(vec_to_blob(query_embedding));
    let cache_key = format!(
        "vector_search:{}:{}:{}:chunks={}:clauses={}",
        workspace_id,
        crate::cache::hash_text(&embedding_hex),
        limit,
        include_chunks,
        include_clauses
    );

    if let Some(cached) = cache.get::<Vec<ScoredEntry>>(&cache_key).await {
        return Ok(cached);
    }

    let rows = if include_chunks && include_clauses {
        sqlx::query(
            r#"
            SELECT chunk_id, document_id, document_name, page_number, section_name,
                   text, embedding, bbox_json
            FROM vector_entries
            WHERE collection = ?
            "#,
        )
        .bind(&collection)
        .fetch_all(pool)
        .await?
    } else {
        let kind = if include_chunks {
            EntryKind::Chunk
        } else {
            EntryKind::Clause
        };
        sqlx::query(
            r#"
            SELECT chunk_id, document_id, document_name, page_number, section_name,
                   text, embedding, bbox_json
            FROM vector_entries
            WHERE collection = ? AND kind = ?
            "#,
        )
        .bind(&collection)
        .bind(kind.as_str())
        .fetch_all(pool)
        .await?
    };

    let mut scored: Vec<ScoredEntry> = rows
        .iter()
        .map(|row| {
            let embedding_blob: Vec<u8> = row.get("embedding");
            let embedding = blob_to_vec(&embedding_blob);
            let similarity = cosine_similarity(query_embedding, &embedding);
            let bbox_json: Option<String> = row.get("bbox_json");
            let bbox = bbox_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok());

            ScoredEntry {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                document_name: row.get("document_name"),
                page_number: row.get("page_number"),
                section_name: row.get("section_name"),
                text: row.get("text"),
                similarity,
                bbox,
            }
        })
        .filter(|s| s.similarity > MIN_SIMILARITY_THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
    scored.truncate(limit);

    cache.set(&cache_key, &scored, VECTOR_SEARCH_TTL).await;
    Ok(scored)
}

pub async fn delete_document(
    pool: &SqlitePool,
    cache: &Cache,
    workspace_id: &str,
    document_id: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM vector_entries WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;
    cache.invalidate_document(document_id, workspace_id).await;
    Ok(())
}

pub async fn delete_workspace(pool: &SqlitePool, cache: &Cache, workspace_id: &str) -> Result<()> {
    let collection = collection_name(workspace_id);
    sqlx::query("DELETE FROM vector_entries WHERE collection = ?")
        .bind(&collection)
        .execute(pool)
        .await?;
    cache.invalidate_workspace(workspace_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_metadata_drops_empty_and_null() {
        let input = serde_json::json!({"a": "", "b": null, "c": "kept", "d": 1});
        let cleaned = clean_metadata(&input);
        let obj = cleaned.as_object().unwrap();
        assert!(!obj.contains_key("a"));
        assert!(!obj.contains_key("b"));
        assert_eq!(obj.get("c").unwrap(), "kept");
        assert_eq!(obj.get("d").unwrap(), 1);
    }

    #[test]
    fn collection_name_scopes_by_workspace() {
        assert_eq!(collection_name("w1"), "workspace_w1");
    }
}
