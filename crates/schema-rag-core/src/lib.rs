//! # schema-rag core
//!
//! Vendor-neutral logic for schema-rag: data models, the service traits the
//! pipeline consumes, bounded-concurrency document aggregation, structured
//! extraction from generated text, prompt assembly, and the request
//! pipeline that sequences them.
//!
//! This crate knows nothing about configuration files, HTTP frameworks, or
//! concrete vendors. Every external collaborator (embedding, similarity
//! search, generation, document fetch) is injected as a trait object, so the
//! whole pipeline can be driven by in-memory fakes.
//!
//! ```text
//! query ─▶ Embedder ─▶ VectorIndex ─▶ aggregate ─▶ prompt ─▶ Generator ─▶ Extractor
//!                                      (Fetcher)
//! ```

pub mod aggregate;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod services;
