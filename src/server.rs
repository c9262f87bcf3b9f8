//! HTTP API surface (Axum).
//!
//! Routes mirror the teacher's `server.rs` shape (a flat `Router` with one
//! `AppState`, CORS permissive by default, a thin per-route handler), wired
//! to the new domain's modules instead of the teacher's search/get/sources
//! trio. Bearer-token auth is enforced per-handler rather than via a single
//! global middleware layer, since `/auth/*` and `/health` must stay open.
//!
//! # Error Contract
//!
//! Every non-2xx response is the [`crate::errors::AppError`] envelope.
//!
//! # CORS
//!
//! Origins are restricted to `config.cors_origins`; `"*"` (the default)
//! permits any origin, matching the teacher's permissive default.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::auth;
use crate::cache::Cache;
use crate::config::Config;
use crate::dedup;
use crate::errors::{AppError, AppResult};
use crate::ingest::{self, IngestContext};
use crate::llm::LlmClient;
use crate::models::{
    Citation, Clause, ClauseType, Document, DocumentKind, DocumentStatus, MessageRole, RiskFlag,
    Workspace,
};
use crate::rag::{self, HistoryTurn};

#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    cache: Cache,
    config: Arc<Config>,
    ingest: Arc<IngestContext>,
}

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = crate::db::connect(config).await?;
    let config = Arc::new(config.clone());
    let cache = Cache::in_memory();

    let ingest = Arc::new(IngestContext {
        pool: pool.clone(),
        cache: cache.clone(),
        config: config.clone(),
    });

    let state = AppState {
        pool,
        cache,
        config: config.clone(),
        ingest,
    };

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/workspaces", post(handle_create_workspace).get(handle_list_workspaces))
        .route("/workspaces/:id", delete(handle_delete_workspace))
        .route("/documents/upload", post(handle_upload))
        .route("/documents/:id/file", get(handle_document_file))
        .route("/documents/:id", delete(handle_delete_document))
        .route("/documents/:id/extract-clauses", post(handle_extract_clauses))
        .route("/documents/:id/clauses", get(handle_list_clauses))
        .route("/workspaces/:id/conversations", post(handle_create_conversation))
        .route("/conversations/:id/ask", post(handle_ask))
        .layer(cors)
        .with_state(state);

    crate::logging::info("server_listen", &bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ auth ============

fn bearer_user_id(headers: &HeaderMap, secret_key: &str) -> AppResult<String> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))?;
    auth::verify_token(secret_key, token)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    display_name: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
    user_id: String,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let user_id = auth::register_user(&state.pool, &req.email, &req.password, &req.display_name).await?;
    let token = auth::issue_token(&state.config.secret_key, &user_id, state.config.access_token_expire_minutes);
    Ok((StatusCode::CREATED, Json(TokenResponse { token, user_id })))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user_id = auth::authenticate(&state.pool, &req.email, &req.password).await?;
    let token = auth::issue_token(&state.config.secret_key, &user_id, state.config.access_token_expire_minutes);
    Ok(Json(TokenResponse { token, user_id }))
}

// ============ workspaces ============

#[derive(Deserialize)]
struct CreateWorkspaceRequest {
    name: String,
}

async fn handle_create_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateWorkspaceRequest>,
) -> AppResult<(StatusCode, Json<Workspace>)> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    if req.name.trim().is_empty() {
        return Err(AppError::field_validation("name", "must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    sqlx::query("INSERT INTO workspaces (id, owner_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&user_id)
        .bind(&req.name)
        .bind(now.timestamp())
        .execute(&state.pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Workspace {
            id,
            owner_id: user_id,
            name: req.name,
            created_at: now,
        }),
    ))
}

async fn handle_list_workspaces(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Workspace>>> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    let rows = sqlx::query("SELECT id, owner_id, name, created_at FROM workspaces WHERE owner_id = ?")
        .bind(&user_id)
        .fetch_all(&state.pool)
        .await?;

    let workspaces = rows
        .into_iter()
        .map(|row| Workspace {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            name: row.get("name"),
            created_at: chrono::DateTime::from_timestamp(row.get("created_at"), 0).unwrap_or_default(),
        })
        .collect();

    Ok(Json(workspaces))
}

async fn handle_delete_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> AppResult<StatusCode> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    auth::workspace_owned_by(&state.pool, &workspace_id, &user_id).await?;

    let document_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM documents WHERE workspace_id = ?")
            .bind(&workspace_id)
            .fetch_all(&state.pool)
            .await?;
    for document_id in &document_ids {
        ingest::delete_document(&state.ingest, &workspace_id, document_id).await?;
    }

    sqlx::query("DELETE FROM conversation_messages WHERE conversation_id IN (SELECT id FROM conversations WHERE workspace_id = ?)")
        .bind(&workspace_id)
        .execute(&state.pool)
        .await?;
    sqlx::query("DELETE FROM conversations WHERE workspace_id = ?")
        .bind(&workspace_id)
        .execute(&state.pool)
        .await?;
    crate::vector_store::delete_workspace(&state.pool, &state.cache, &workspace_id).await?;
    sqlx::query("DELETE FROM workspaces WHERE id = ?")
        .bind(&workspace_id)
        .execute(&state.pool)
        .await?;

    state.cache.invalidate_workspace(&workspace_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ============ documents ============

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Document>)> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;

    let mut workspace_id: Option<String> = None;
    let mut display_name: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "workspace_id" => {
                workspace_id = Some(field.text().await.map_err(|e| AppError::validation(e.to_string()))?);
            }
            "display_name" => {
                display_name = Some(field.text().await.map_err(|e| AppError::validation(e.to_string()))?);
            }
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                bytes = Some(field.bytes().await.map_err(|e| AppError::validation(e.to_string()))?.to_vec());
            }
            _ => {}
        }
    }

    let workspace_id = workspace_id.ok_or_else(|| AppError::field_validation("workspace_id", "required"))?;
    auth::workspace_owned_by(&state.pool, &workspace_id, &user_id).await?;

    let filename = filename.ok_or_else(|| AppError::field_validation("file", "required"))?;
    let bytes = bytes.ok_or_else(|| AppError::field_validation("file", "required"))?;

    let max_bytes = state.config.max_file_size_mb * 1024 * 1024;
    if bytes.len() as u64 > max_bytes {
        return Err(AppError::validation(format!(
            "file exceeds the {} MB limit",
            state.config.max_file_size_mb
        )));
    }

    let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    if !state.config.allowed_file_types.iter().any(|allowed| allowed == &ext) {
        return Err(AppError::validation(format!("unsupported file type: .{}", ext)));
    }
    if DocumentKind::from_extension(&ext).is_none() {
        return Err(AppError::validation(format!("unsupported file type: .{}", ext)));
    }

    let display_name = display_name.unwrap_or_else(|| filename.clone());

    let document = ingest::upload_document(state.ingest.clone(), &workspace_id, &filename, &display_name, bytes)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(document)))
}

async fn load_document_row(pool: &SqlitePool, document_id: &str) -> AppResult<Document> {
    let row = sqlx::query(
        r#"
        SELECT id, workspace_id, display_name, original_filename, storage_path, kind,
               size_bytes, page_count, status, created_at, updated_at
        FROM documents WHERE id = ?
        "#,
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("document", document_id))?;

    let kind_str: String = row.get("kind");
    let status_str: String = row.get("status");

    Ok(Document {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        display_name: row.get("display_name"),
        original_filename: row.get("original_filename"),
        storage_path: row.get("storage_path"),
        kind: DocumentKind::from_extension(&kind_str).unwrap_or(DocumentKind::Pdf),
        size_bytes: row.get("size_bytes"),
        page_count: row.get("page_count"),
        status: match status_str.as_str() {
            "uploaded" => DocumentStatus::Uploaded,
            "processing" => DocumentStatus::Processing,
            "processed" => DocumentStatus::Processed,
            _ => DocumentStatus::Failed,
        },
        created_at: chrono::DateTime::from_timestamp(row.get("created_at"), 0).unwrap_or_default(),
        updated_at: chrono::DateTime::from_timestamp(row.get("updated_at"), 0).unwrap_or_default(),
    })
}

async fn handle_document_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> AppResult<Response> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    let document = load_document_row(&state.pool, &document_id).await?;
    auth::workspace_owned_by(&state.pool, &document.workspace_id, &user_id).await?;

    let bytes = tokio::fs::read(&document.storage_path)
        .await
        .map_err(|e| AppError::not_found("document file", e.to_string()))?;

    let content_type = match document.kind {
        DocumentKind::Pdf => "application/pdf",
        DocumentKind::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, "inline")
        .body(Body::from(bytes))
        .unwrap())
}

async fn handle_delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> AppResult<StatusCode> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    let document = load_document_row(&state.pool, &document_id).await?;
    auth::workspace_owned_by(&state.pool, &document.workspace_id, &user_id).await?;

    ingest::delete_document(&state.ingest, &document.workspace_id, &document_id)
        .await
        .map_err(AppError::from)?;

    Ok(StatusCode::NO_CONTENT)
}

// ============ clauses ============

#[derive(Deserialize)]
struct ExtractClausesRequest {
    #[serde(default)]
    force_re_extract: bool,
}

#[derive(Serialize)]
struct ExtractClausesResponse {
    clause_count: usize,
}

async fn handle_extract_clauses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Json(req): Json<ExtractClausesRequest>,
) -> AppResult<Json<ExtractClausesResponse>> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    let document = load_document_row(&state.pool, &document_id).await?;
    auth::workspace_owned_by(&state.pool, &document.workspace_id, &user_id).await?;

    if document.status != DocumentStatus::Processed {
        return Err(AppError::validation(
            "document has not finished processing yet",
        ));
    }

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clauses WHERE document_id = ?")
        .bind(&document_id)
        .fetch_one(&state.pool)
        .await?;
    if existing > 0 && !req.force_re_extract {
        return Ok(Json(ExtractClausesResponse {
            clause_count: existing as usize,
        }));
    }

    // Re-confirm the document still exists after the (possibly slow) LLM
    // round-trips below; a delete racing with extraction surfaces as 410.
    let bytes = tokio::fs::read(&document.storage_path)
        .await
        .map_err(|_| AppError::gone("document", &document_id))?;

    let llm = LlmClient::new(&state.config.llm).map_err(|e| AppError::processing("clause_extraction", e.to_string()))?;
    let structured = crate::structure::extract_structure(&document_id, document.kind, &bytes, Some(&llm))
        .await
        .map_err(|e| AppError::processing("document_processing", e.to_string()))?;

    if !document_still_exists(&state.pool, &document_id).await? {
        return Err(AppError::gone("document", &document_id));
    }

    let raw_clauses = crate::clauses::extract_clauses(&document_id, &structured.chunks, &llm).await;
    let deduped = dedup::deduplicate(raw_clauses, Some(&llm)).await;

    if req.force_re_extract {
        sqlx::query("DELETE FROM clauses WHERE document_id = ?")
            .bind(&document_id)
            .execute(&state.pool)
            .await?;
    }

    for clause in &deduped {
        insert_clause(&state.pool, clause).await?;
    }

    Ok(Json(ExtractClausesResponse {
        clause_count: deduped.len(),
    }))
}

async fn document_still_exists(pool: &SqlitePool, document_id: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
        .bind(document_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

async fn insert_clause(pool: &SqlitePool, clause: &Clause) -> AppResult<()> {
    let flags_json = serde_json::to_string(&clause.risk_flags)?;
    sqlx::query(
        r#"
        INSERT INTO clauses
            (id, document_id, clause_type, clause_subtype, extracted_text, page_number,
             section_name, confidence_score, risk_score, risk_flags_json, risk_reasoning)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&clause.id)
    .bind(&clause.document_id)
    .bind(clause.clause_type.as_str())
    .bind(&clause.clause_subtype)
    .bind(&clause.extracted_text)
    .bind(clause.page_number)
    .bind(&clause.section_name)
    .bind(clause.confidence_score)
    .bind(clause.risk_score)
    .bind(flags_json)
    .bind(&clause.risk_reasoning)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Deserialize)]
struct ListClausesQuery {
    clause_type: Option<String>,
    page: Option<i64>,
    min_risk: Option<f64>,
    max_risk: Option<f64>,
    flag: Option<String>,
}

async fn handle_list_clauses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Query(q): Query<ListClausesQuery>,
) -> AppResult<Json<Vec<Clause>>> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    let document = load_document_row(&state.pool, &document_id).await?;
    auth::workspace_owned_by(&state.pool, &document.workspace_id, &user_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT id, document_id, clause_type, clause_subtype, extracted_text, page_number,
               section_name, confidence_score, risk_score, risk_flags_json, risk_reasoning
        FROM clauses WHERE document_id = ?
        "#,
    )
    .bind(&document_id)
    .fetch_all(&state.pool)
    .await?;

    let min_risk = q.min_risk.unwrap_or(f64::MIN);
    let max_risk = q.max_risk.unwrap_or(f64::MAX);
    let flag_filter = q.flag.as_deref().and_then(RiskFlag::from_str_loose);

    let clauses: Vec<Clause> = rows
        .into_iter()
        .filter_map(|row| {
            let clause_type_str: String = row.get("clause_type");
            let risk_flags_json: String = row.get("risk_flags_json");
            let risk_flags: Vec<RiskFlag> = serde_json::from_str(&risk_flags_json).unwrap_or_default();

            let clause = Clause {
                id: row.get("id"),
                document_id: row.get("document_id"),
                clause_type: ClauseType::from_str_loose(&clause_type_str),
                clause_subtype: row.get("clause_subtype"),
                extracted_text: row.get("extracted_text"),
                page_number: row.get("page_number"),
                section_name: row.get("section_name"),
                confidence_score: row.get("confidence_score"),
                risk_score: row.get("risk_score"),
                risk_flags,
                risk_reasoning: row.get("risk_reasoning"),
            };

            if let Some(ref t) = q.clause_type {
                if clause.clause_type.as_str() != t {
                    return None;
                }
            }
            if let Some(page) = q.page {
                if clause.page_number != page {
                    return None;
                }
            }
            if clause.risk_score < min_risk || clause.risk_score > max_risk {
                return None;
            }
            if let Some(flag) = flag_filter {
                if !clause.risk_flags.contains(&flag) {
                    return None;
                }
            }

            Some(clause)
        })
        .collect();

    Ok(Json(clauses))
}

// ============ conversations & ask ============

#[derive(Serialize)]
struct ConversationResponse {
    id: String,
    workspace_id: String,
}

async fn handle_create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> AppResult<(StatusCode, Json<ConversationResponse>)> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;
    auth::workspace_owned_by(&state.pool, &workspace_id, &user_id).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO conversations (id, workspace_id, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(&workspace_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&state.pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse { id, workspace_id }),
    ))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    document_id: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    citations: Vec<Citation>,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Json(req): Json<AskRequest>,
) -> AppResult<Json<AskResponse>> {
    let user_id = bearer_user_id(&headers, &state.config.secret_key)?;

    let workspace_id: String =
        sqlx::query_scalar("SELECT workspace_id FROM conversations WHERE id = ?")
            .bind(&conversation_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::not_found("conversation", &conversation_id))?;
    auth::workspace_owned_by(&state.pool, &workspace_id, &user_id).await?;

    if req.question.trim().is_empty() {
        return Err(AppError::field_validation("question", "must not be empty"));
    }

    let history = load_history(&state.pool, &conversation_id).await?;
    let next_index = history.len() as i64;

    let result = if !LlmClient::is_available() {
        Ok(rag::answer_without_llm(&req.question))
    } else {
        let llm = LlmClient::new(&state.config.llm)
            .map_err(|e| AppError::processing("rag_pipeline", e.to_string()))?;

        rag::answer(
            &state.pool,
            &state.cache,
            &state.config.embedding,
            &llm,
            &workspace_id,
            &req.question,
            req.document_id.as_deref(),
            &history,
        )
        .await
    };

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            insert_message(&state.pool, &conversation_id, next_index, MessageRole::User, &req.question, &[]).await?;
            let notice = "Sorry, I ran into an error answering that question. Please try again.";
            insert_message(&state.pool, &conversation_id, next_index + 1, MessageRole::Assistant, notice, &[]).await?;
            return Err(AppError::processing("rag_pipeline", e.to_string()));
        }
    };

    insert_message(&state.pool, &conversation_id, next_index, MessageRole::User, &req.question, &[]).await?;
    insert_message(
        &state.pool,
        &conversation_id,
        next_index + 1,
        MessageRole::Assistant,
        &result.answer,
        &result.citations,
    )
    .await?;

    Ok(Json(AskResponse {
        answer: result.answer,
        citations: result.citations,
    }))
}

async fn load_history(pool: &SqlitePool, conversation_id: &str) -> AppResult<Vec<HistoryTurn>> {
    let rows = sqlx::query("SELECT role, content FROM conversation_messages WHERE conversation_id = ? ORDER BY msg_index ASC")
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let role_str: String = row.get("role");
            HistoryTurn {
                role: if role_str == "assistant" { MessageRole::Assistant } else { MessageRole::User },
                content: row.get("content"),
            }
        })
        .collect())
}

async fn insert_message(
    pool: &SqlitePool,
    conversation_id: &str,
    index: i64,
    role: MessageRole,
    content: &str,
    citations: &[Citation],
) -> AppResult<()> {
    let role_str = match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };
    let citations_json = serde_json::to_string(citations)?;
    sqlx::query(
        r#"
        INSERT INTO conversation_messages
            (id, conversation_id, msg_index, role, content, citations_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(conversation_id)
    .bind(index)
    .bind(role_str)
    .bind(content)
    .bind(citations_json)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

// ============ health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
