//! End-to-end tests against the library crate directly (no spawned
//! binary): build a temp SQLite database, run migrations, exercise the
//! ingest/vector-store/auth modules the way the HTTP layer does.

use std::sync::Arc;
use std::time::Duration;

use contractiq::cache::Cache;
use contractiq::config::{self, Config};
use contractiq::ingest::{self, IngestContext};
use contractiq::migrate;
use contractiq::models::{ChunkType, DocumentStatus, EntryKind};
use contractiq::vector_store::{self, ChunkEntry};
use tempfile::TempDir;

async fn test_config(tmp: &TempDir) -> Config {
    let config_path = tmp.path().join("contractiq.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"database_url = "sqlite:{}/test.db"
upload_dir = "{}/uploads"
secret_key = "test-secret"
"#,
            tmp.path().display(),
            tmp.path().display(),
        ),
    )
    .unwrap();
    config::load_config(&config_path).unwrap()
}

async fn test_context(tmp: &TempDir) -> Arc<IngestContext> {
    let config = test_config(tmp).await;
    let pool = contractiq::db::connect(&config).await.unwrap();
    migrate::run_migrations_on(&pool).await.unwrap();
    Arc::new(IngestContext {
        pool,
        cache: Cache::in_memory(),
        config: Arc::new(config),
    })
}

async fn seed_workspace(ctx: &IngestContext, owner_id: &str) -> String {
    let workspace_id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO users (id, email, password_hash, display_name, created_at) VALUES (?, 'a@b.com', 'x', 'A', 0)")
        .bind(owner_id)
        .execute(&ctx.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO workspaces (id, owner_id, name, created_at) VALUES (?, ?, 'W', 0)")
        .bind(&workspace_id)
        .bind(owner_id)
        .execute(&ctx.pool)
        .await
        .unwrap();
    workspace_id
}

/// Minimal valid PDF with three pages, the third containing the literal
/// termination phrase (Scenario A).
fn three_page_pdf_with_termination_clause() -> Vec<u8> {
    let pages = [
        "Page one. Recitals and definitions.",
        "Page two. Scope of services.",
        "Either party may terminate this Agreement with thirty (30) days written notice.",
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    let mut obj_num = 1;

    offsets.push(out.len());
    out.extend_from_slice(format!("{} 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n", obj_num).as_bytes());
    obj_num += 1;

    let pages_obj = obj_num;
    let kids: String = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + i * 2))
        .collect::<Vec<_>>()
        .join(" ");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            pages_obj,
            kids,
            pages.len()
        )
        .as_bytes(),
    );
    obj_num += 1;

    for text in pages.iter() {
        let page_obj = obj_num;
        let content_obj = obj_num + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent {} 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 99 0 R >> >> >> endobj\n",
                page_obj, pages_obj, content_obj
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        out.extend_from_slice(
            format!("{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n", content_obj, stream.len(), stream).as_bytes(),
        );
        obj_num += 2;
    }

    offsets.push(out.len());
    out.extend_from_slice(b"99 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");

    let xref_start = out.len();
    let total_objs = offsets.len() + 1;
    out.extend_from_slice(format!("xref\n0 {}\n", total_objs).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", total_objs, xref_start).as_bytes(),
    );
    out
}

#[tokio::test]
async fn ingest_reaches_processed_with_page_count() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;
    let workspace_id = seed_workspace(&ctx, "owner-1").await;

    let document = ingest::upload_document(
        ctx.clone(),
        &workspace_id,
        "msa.pdf",
        "Master Services Agreement",
        three_page_pdf_with_termination_clause(),
    )
    .await
    .unwrap();

    assert_eq!(document.status, DocumentStatus::Uploaded);

    let mut status = DocumentStatus::Uploaded;
    for _ in 0..50 {
        let row: (String,) = sqlx::query_as("SELECT status FROM documents WHERE id = ?")
            .bind(&document.id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
        status = match row.0.as_str() {
            "uploaded" => DocumentStatus::Uploaded,
            "processing" => DocumentStatus::Processing,
            "processed" => DocumentStatus::Processed,
            _ => DocumentStatus::Failed,
        };
        if status == DocumentStatus::Processed || status == DocumentStatus::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(status, DocumentStatus::Processed);

    let page_count: Option<i64> = sqlx::query_scalar("SELECT page_count FROM documents WHERE id = ?")
        .bind(&document.id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(page_count, Some(3));
}

#[tokio::test]
async fn delete_during_processing_leaves_no_trace() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;
    let workspace_id = seed_workspace(&ctx, "owner-1").await;

    let document = ingest::upload_document(
        ctx.clone(),
        &workspace_id,
        "msa.pdf",
        "Master Services Agreement",
        three_page_pdf_with_termination_clause(),
    )
    .await
    .unwrap();

    // Race the background task: delete immediately.
    ingest::delete_document(&ctx, &workspace_id, &document.id).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
        .bind(&document.id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // Give the background task a chance to run; it must abort cleanly
    // rather than resurrect the row or leave vector entries behind.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
        .bind(&document.id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let vector_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_entries WHERE document_id = ?")
        .bind(&document.id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(vector_entries, 0);
}

#[tokio::test]
async fn vector_store_returns_closest_chunk_in_top_k() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;
    let workspace_id = seed_workspace(&ctx, "owner-1").await;

    let entries = vec![
        ChunkEntry {
            chunk_id: "c1".to_string(),
            document_id: "doc-1".to_string(),
            document_name: "msa.pdf".to_string(),
            page_number: 1,
            section_name: "Recitals".to_string(),
            entry_type: ChunkType::Clause,
            kind: EntryKind::Chunk,
            text: "This agreement is between the parties.".to_string(),
            embedding: vec![1.0, 0.0, 0.0],
            bbox: None,
        },
        ChunkEntry {
            chunk_id: "c2".to_string(),
            document_id: "doc-1".to_string(),
            document_name: "msa.pdf".to_string(),
            page_number: 2,
            section_name: "Scope".to_string(),
            entry_type: ChunkType::Clause,
            kind: EntryKind::Chunk,
            text: "Services include consulting and support.".to_string(),
            embedding: vec![0.0, 1.0, 0.0],
            bbox: None,
        },
        ChunkEntry {
            chunk_id: "c3".to_string(),
            document_id: "doc-1".to_string(),
            document_name: "msa.pdf".to_string(),
            page_number: 3,
            section_name: "Termination".to_string(),
            entry_type: ChunkType::Clause,
            kind: EntryKind::Chunk,
            text: "Either party may terminate this Agreement with thirty (30) days written notice.".to_string(),
            embedding: vec![0.0, 0.0, 1.0],
            bbox: None,
        },
    ];

    vector_store::index_chunks(&ctx.pool, &ctx.cache, &workspace_id, &entries)
        .await
        .unwrap();

    let hits = vector_store::search(&ctx.pool, &ctx.cache, &workspace_id, &[0.0, 0.1, 0.95], 3, true, false)
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk_id, "c3");
    assert_eq!(hits[0].page_number, 3);
    assert!(hits[0].similarity > 0.0);
}

#[tokio::test]
async fn workspace_scoped_search_does_not_see_other_workspace_chunks() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;
    let workspace_a = seed_workspace(&ctx, "owner-a").await;
    let workspace_b = seed_workspace(&ctx, "owner-b").await;

    let entry = ChunkEntry {
        chunk_id: "c1".to_string(),
        document_id: "doc-a".to_string(),
        document_name: "a.pdf".to_string(),
        page_number: 1,
        section_name: "Body".to_string(),
        entry_type: ChunkType::Clause,
        kind: EntryKind::Chunk,
        text: "confidential text".to_string(),
        embedding: vec![1.0, 0.0],
        bbox: None,
    };
    vector_store::index_chunks(&ctx.pool, &ctx.cache, &workspace_a, std::slice::from_ref(&entry))
        .await
        .unwrap();

    let hits = vector_store::search(&ctx.pool, &ctx.cache, &workspace_b, &[1.0, 0.0], 10, true, false)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn auth_register_then_authenticate_round_trips() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;

    let user_id = contractiq::auth::register_user(&ctx.pool, "user@example.com", "hunter22", "User")
        .await
        .unwrap();

    let authenticated_id = contractiq::auth::authenticate(&ctx.pool, "user@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(user_id, authenticated_id);

    let rejected = contractiq::auth::authenticate(&ctx.pool, "user@example.com", "wrong-password").await;
    assert!(rejected.is_err());

    let token = contractiq::auth::issue_token("test-secret", &user_id, 60);
    let verified = contractiq::auth::verify_token("test-secret", &token).unwrap();
    assert_eq!(verified, user_id);
}

#[tokio::test]
async fn workspace_ownership_check_rejects_non_owner() {
    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp).await;
    let workspace_id = seed_workspace(&ctx, "owner-1").await;

    let owned = contractiq::auth::workspace_owned_by(&ctx.pool, &workspace_id, "owner-1").await;
    assert!(owned.is_ok());

    let forbidden = contractiq::auth::workspace_owned_by(&ctx.pool, &workspace_id, "someone-else").await;
    assert!(forbidden.is_err());

    let missing = contractiq::auth::workspace_owned_by(&ctx.pool, "no-such-workspace", "owner-1").await;
    assert!(missing.is_err());
}
