//! # Quarry
//!
//! Local document question answering: ingest files into SQLite, retrieve
//! passages with hybrid vector + keyword search, answer from an LLM with a
//! question/answer cache, and run a small tool-using agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────┐
//! │   Files     │──▶│  Ingest      │──▶│  SQLite    │
//! │ txt/md/pdf  │   │ Chunk+Embed │   │ FTS5+Vec   │
//! └─────────────┘   └─────────────┘   └────┬──────┘
//!                                          │
//!                               ┌──────────┴─────────┐
//!                               ▼                    ▼
//!                        ┌────────────┐       ┌────────────┐
//!                        │ Retriever  │──────▶│ Answer /   │
//!                        │ (RRF)      │       │ Agent      │
//!                        └────────────┘       └─────┬──────┘
//!                                                   │
//!                                      ┌────────────┴─────┐
//!                                      ▼                  ▼
//!                                 ┌────────┐        ┌──────────┐
//!                                 │  CLI   │        │   HTTP   │
//!                                 └────────┘        └──────────┘
//! ```
//!
//! The retrieval, caching, and agent logic lives in `quarry-core`; this
//! crate supplies its SQLite, HTTP, and configuration plumbing.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`extract`] | Text extraction from txt, md, and pdf files |
//! | [`chunk`] | Paragraph chunking |
//! | [`embedding`] | Embedding providers |
//! | [`ingest`] | File ingestion pipeline |
//! | [`sqlite_index`] | Vector, keyword, and stats collaborators over SQLite |
//! | [`cache_store`] | SQLite answer-cache store |
//! | [`http`] | JSON POST with retry |
//! | [`llm`] | Chat-completions language model client |
//! | [`services`] | Component wiring |
//! | [`commands`] | CLI command handlers |
//! | [`stats`] | Corpus statistics |
//! | [`server`] | HTTP API |

pub mod cache_store;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod services;
pub mod sqlite_index;
pub mod stats;
