//! # Quarry Core
//!
//! Runtime-agnostic logic for Quarry: reciprocal-rank fusion, the hybrid
//! retriever, the answer cache, the tool registry, and the bounded
//! reasoning loop.
//!
//! Every external system (vector index, keyword index, language model,
//! cache store) is reached through a trait defined here. The `quarry` app
//! crate supplies SQLite- and HTTP-backed implementations; tests supply
//! scripted fakes.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Retrieved/fused items, reasoning steps, agent results |
//! | [`error`] | Typed error taxonomy |
//! | [`index`] | Embedding, vector, keyword, and statistics collaborator traits |
//! | [`llm`] | Language model collaborator trait |
//! | [`fusion`] | Weighted reciprocal-rank fusion |
//! | [`retriever`] | Hybrid retrieval and context rendering |
//! | [`cache`] | Answer cache over a pluggable key/value store |
//! | [`calculator`] | Arithmetic expression parser and evaluator |
//! | [`tools`] | Fixed tool set used by the agent |
//! | [`agent`] | Think/act/observe loop and model-output parsing |
//! | [`answer`] | Retrieve → cache → synthesize question answering |

pub mod agent;
pub mod answer;
pub mod cache;
pub mod calculator;
pub mod error;
pub mod fusion;
pub mod index;
pub mod llm;
pub mod models;
pub mod retriever;
pub mod tools;

pub use error::{Collaborator, CoreError};
