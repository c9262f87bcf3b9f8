//! # ContractIQ
//!
//! **Contract and procurement document intelligence.**
//!
//! ContractIQ ingests PDF and DOCX contracts, extracts their page/section
//! structure, indexes them for retrieval, pulls out typed and risk-scored
//! clauses, and answers grounded questions over a workspace's documents with
//! citations back to the source page.
//!
//! ## Architecture
//!
//! ```text
//! Upload → Structure Extraction → Chunk Embedding → Vector Store
//!                                                        │
//!                    ┌───────────────────────────────────┤
//!                    ▼                                    ▼
//!             Clause Extraction                     RAG Question Answering
//!             + Deduplication                       (retrieve → generate)
//!                    │                                    │
//!                    ▼                                    ▼
//!                SQLite                              HTTP (ctl serve) / CLI
//! ```
//!
//! ## Data Flow
//!
//! 1. **Upload** ([`ingest`]) stages the file and creates an `Uploaded` row,
//!    then enqueues background processing.
//! 2. **Structure extraction** ([`structure`]) turns raw bytes into paged
//!    text, LLM-structured sections and chunks, with deterministic coverage
//!    repair for anything the LLM call missed.
//! 3. Chunks are **embedded** ([`embedding`]) and written into the
//!    **vector store** ([`vector_store`]), a per-workspace collection over a
//!    single SQLite table.
//! 4. **Clause extraction** ([`clauses`]) and **deduplication** ([`dedup`])
//!    turn chunks into typed, risk-scored [`models::Clause`]s on request.
//! 5. **RAG** ([`rag`]) answers workspace-scoped questions: retrieve top
//!    chunks, generate a cited answer, validate citations against the
//!    retrieved set.
//! 6. Results are exposed via the **CLI** (`ctl`) and the **HTTP server**
//!    ([`server`]).
//!
//! ## Quick Start
//!
//! ```bash
//! ctl init                                    # create database
//! ctl serve                                   # start the HTTP API
//! ctl ingest ./msa.pdf --workspace w1          # ingest a document
//! ctl ask "what are the termination terms?" --conversation c1
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing, env-overlay, and validation |
//! | [`models`] | Core data types: documents, chunks, clauses, citations |
//! | [`errors`] | HTTP-facing error taxonomy and response envelope |
//! | [`retry`] | Exponential backoff with jitter for transient failures |
//! | [`cache`] | Fail-open key-value cache with pattern invalidation |
//! | [`logging`] | Leveled stderr logging, human or JSON |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`embedding`] | Embedding provider trait, cache- and retry-aware entry points |
//! | [`llm`] | Structured-output chat completion client |
//! | [`vector_store`] | Per-workspace vector collections over SQLite |
//! | [`structure`] | Document structure extraction (sections, chunks, coordinates) |
//! | [`clauses`] | Clause extraction: chunks to typed, risk-scored clauses |
//! | [`dedup`] | Clause deduplication via LLM-oracle pairwise comparison |
//! | [`rag`] | Retrieve-then-generate question answering with citations |
//! | [`ingest`] | Upload, background processing, and deletion |
//! | [`auth`] | Bearer-token issuance/verification, workspace ownership |
//! | [`server`] | HTTP API surface (Axum) |
//!
//! ## Configuration
//!
//! ContractIQ is configured via a TOML file (default: `config/contractiq.toml`),
//! with every option overridable by an identically-named upper-cased
//! environment variable. See [`config`] for all available options and
//! [`config::load_config`] for validation rules.

pub mod auth;
pub mod cache;
pub mod clauses;
pub mod config;
pub mod db;
pub mod dedup;
pub mod embedding;
pub mod errors;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod retry;
pub mod server;
pub mod structure;
pub mod vector_store;
