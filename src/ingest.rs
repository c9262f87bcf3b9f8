//! Ingestion pipeline: upload, background processing, and deletion.
//!
//! Grounded on the teacher's `tokio::spawn` background-work scheduling
//! model (`main.rs`/`server.rs`) and the transactional SQL idiom from this
//! file's previous `upsert_document`/`replace_chunks` — reused here for
//! the new upload/process/delete contract.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::Config;
use crate::embedding;
use crate::llm::LlmClient;
use crate::models::{Document, DocumentKind, DocumentStatus};
use crate::structure::{self, ExtractedChunk};
use crate::vector_store::{self, ChunkEntry};

pub struct IngestContext {
    pub pool: SqlitePool,
    pub cache: Cache,
    pub config: Arc<Config>,
}

/// Stage the file, insert the `Uploaded` row, invalidate workspace caches,
/// and enqueue background processing. On row-creation failure the staged
/// file is deleted so nothing orphaned is left on disk.
pub async fn upload_document(
    ctx: Arc<IngestContext>,
    workspace_id: &str,
    original_filename: &str,
    display_name: &str,
    bytes: Vec<u8>,
) -> Result<Document> {
    let kind = original_filename
        .rsplit('.')
        .next()
        .and_then(DocumentKind::from_extension)
        .ok_or_else(|| anyhow::anyhow!("unsupported file type: {}", original_filename))?;

    let document_id = Uuid::new_v4().to_string();
    let storage_path = ctx
        .config
        .upload_dir
        .join(&document_id)
        .with_extension(kind.extension());

    if let Some(parent) = storage_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&storage_path, &bytes).await?;

    let now = Utc::now();
    let size_bytes = bytes.len() as i64;

    let insert_result = sqlx::query(
        r#"
        INSERT INTO documents
            (id, workspace_id, display_name, original_filename, storage_path, kind,
             size_bytes, page_count, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
        "#,
    )
    .bind(&document_id)
    .bind(workspace_id)
    .bind(display_name)
    .bind(original_filename)
    .bind(storage_path.to_string_lossy().to_string())
    .bind(kind.extension())
    .bind(size_bytes)
    .bind("uploaded")
    .bind(now.timestamp())
    .bind(now.timestamp())
    .execute(&ctx.pool)
    .await;

    if insert_result.is_err() {
        let _ = tokio::fs::remove_file(&storage_path).await;
        insert_result?;
    }

    ctx.cache.invalidate_workspace(workspace_id).await;

    let document = Document {
        id: document_id.clone(),
        workspace_id: workspace_id.to_string(),
        display_name: display_name.to_string(),
        original_filename: original_filename.to_string(),
        storage_path: storage_path.to_string_lossy().to_string(),
        kind,
        size_bytes,
        page_count: None,
        status: DocumentStatus::Uploaded,
        created_at: now,
        updated_at: now,
    };

    tokio::spawn(process_document(ctx, document_id));

    Ok(document)
}

/// Background task: reload the row (abort cleanly if it was deleted during
/// the race), run structure extraction, index the chunks, and transition
/// status. Indexing failures do not flip the document back to `Failed` —
/// it stays `Processed` with possibly zero indexed chunks.
async fn process_document(ctx: Arc<IngestContext>, document_id: String) {
    let row = match sqlx::query(
        "SELECT workspace_id, storage_path, kind, original_filename FROM documents WHERE id = ?",
    )
    .bind(&document_id)
    .fetch_optional(&ctx.pool)
    .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            crate::logging::info("ingest_abort_deleted", &document_id);
            return;
        }
        Err(e) => {
            crate::logging::error("ingest_reload_failed", &e.to_string());
            return;
        }
    };

    let workspace_id: String = row.get("workspace_id");
    let storage_path: String = row.get("storage_path");
    let kind_str: String = row.get("kind");
    let kind = DocumentKind::from_extension(&kind_str).unwrap_or(DocumentKind::Pdf);

    let _ = set_status(&ctx.pool, &document_id, DocumentStatus::Processing).await;

    let bytes = match tokio::fs::read(&storage_path).await {
        Ok(b) => b,
        Err(e) => {
            fail(&ctx, &document_id, "read_file", &e.to_string()).await;
            return;
        }
    };

    let llm = LlmClient::new(&ctx.config.llm).ok();

    let result = structure::extract_structure(&document_id, kind, &bytes, llm.as_ref()).await;
    let structured = match result {
        Ok(s) => s,
        Err(e) => {
            fail(&ctx, &document_id, "structure_extraction", &e.to_string()).await;
            return;
        }
    };

    match document_still_exists(&ctx.pool, &document_id).await {
        Ok(true) => {}
        Ok(false) => {
            crate::logging::info("ingest_abort_deleted", &document_id);
            return;
        }
        Err(e) => {
            crate::logging::error("ingest_reload_failed", &e.to_string());
            return;
        }
    }

    if let Err(e) = sqlx::query(
        "UPDATE documents SET page_count = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(structured.page_count)
    .bind("processed")
    .bind(Utc::now().timestamp())
    .bind(&document_id)
    .execute(&ctx.pool)
    .await
    {
        crate::logging::error("ingest_status_update_failed", &e.to_string());
        return;
    }

    match document_still_exists(&ctx.pool, &document_id).await {
        Ok(true) => {}
        Ok(false) => {
            crate::logging::info("ingest_abort_deleted", &document_id);
            return;
        }
        Err(e) => {
            crate::logging::error("ingest_reload_failed", &e.to_string());
            return;
        }
    }

    let document_name: String = row.get("original_filename");
    if let Err(e) = index_extracted_chunks(
        &ctx,
        &workspace_id,
        &document_id,
        &document_name,
        &structured.chunks,
    )
    .await
    {
        crate::logging::warn("ingest_indexing_failed", &e.to_string());
    }

    ctx.cache.invalidate_document(&document_id, &workspace_id).await;
}

async fn document_still_exists(pool: &SqlitePool, document_id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
        .bind(document_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

async fn index_extracted_chunks(
    ctx: &IngestContext,
    workspace_id: &str,
    document_id: &str,
    document_name: &str,
    chunks: &[ExtractedChunk],
) -> Result<()> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedding::embed_batch(&ctx.cache, &ctx.config.embedding, &texts).await;

    let entries: Vec<ChunkEntry> = chunks
        .iter()
        .zip(vectors.into_iter())
        .filter_map(|(chunk, vector)| {
            vector.map(|embedding| ChunkEntry {
                chunk_id: chunk.id.clone(),
                document_id: document_id.to_string(),
                document_name: document_name.to_string(),
                page_number: chunk.page_number,
                section_name: chunk.section_name.clone(),
                entry_type: chunk.chunk_type,
                kind: crate::models::EntryKind::Chunk,
                text: chunk.text.clone(),
                embedding,
                bbox: chunk.bbox,
            })
        })
        .collect();

    vector_store::index_chunks(&ctx.pool, &ctx.cache, workspace_id, &entries).await
}

async fn set_status(pool: &SqlitePool, document_id: &str, status: DocumentStatus) -> Result<()> {
    let status_str = match status {
        DocumentStatus::Uploaded => "uploaded",
        DocumentStatus::Processing => "processing",
        DocumentStatus::Processed => "processed",
        DocumentStatus::Failed => "failed",
    };
    sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status_str)
        .bind(Utc::now().timestamp())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn fail(ctx: &IngestContext, document_id: &str, stage: &str, detail: &str) {
    crate::logging::error("ingest_failed", &format!("stage={} detail={}", stage, detail));
    let _ = set_status(&ctx.pool, document_id, DocumentStatus::Failed).await;
}

/// Delete the on-disk file (idempotent), purge vector entries, invalidate
/// caches, then delete the row. Cascades remove clauses via foreign-key
/// ownership at the query layer (no `ON DELETE CASCADE` in SQLite without
/// pragma support, so clause rows are deleted explicitly).
pub async fn delete_document(ctx: &IngestContext, workspace_id: &str, document_id: &str) -> Result<()> {
    let storage_path: Option<String> =
        sqlx::query_scalar("SELECT storage_path FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&ctx.pool)
            .await?;

    if let Some(path) = storage_path {
        let _ = tokio::fs::remove_file(PathBuf::from(path)).await;
    }

    vector_store::delete_document(&ctx.pool, &ctx.cache, workspace_id, document_id).await?;

    sqlx::query("DELETE FROM clauses WHERE document_id = ?")
        .bind(document_id)
        .execute(&ctx.pool)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document_id)
        .execute(&ctx.pool)
        .await?;

    ctx.cache.invalidate_document(document_id, workspace_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_detection_from_filename() {
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_extension("exe"), None);
    }
}
