//! # coursebot: retrieval-augmented course assistant
//!
//! Indexes course transcripts into a local SQLite + sqlite-vec store and
//! answers questions about them with Claude, which searches the store through
//! tool calls.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON config file plus `.env` / environment overrides
//! - **[`document`]**: course file reading (txt, pdf, docx), parsing and chunking
//! - **[`embedder`]**: sentence embeddings via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`db`]**: SQLite schema, course catalog and chunk vector search
//! - **[`vector_store`]**: async retrieval facade with course name resolution
//! - **[`tools`]**: course search and outline tools exposed to the model
//! - **[`llm`]**: Anthropic Messages client and the tool-calling generator
//! - **[`session`]**: per-conversation history
//! - **[`rag`]**: orchestrates indexing and question answering
//! - **[`server`]**: axum HTTP API and static frontend
//! - **[`doctor`]**: setup diagnostics

pub mod config;
pub mod db;
pub mod doctor;
pub mod document;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;
pub mod session;
pub mod tools;
pub mod vector_store;
