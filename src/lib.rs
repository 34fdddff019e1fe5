//! # schema-rag
//!
//! Retrieval-augmented schema design. Questions about a relational schema
//! are embedded, matched against reference documents in a Pinecone index,
//! and answered by Gemini with the retrieved documents as context. The
//! answer is then split back into structured artifacts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌───────────┐
//! │  Gemini  │──▶│ Pinecone  │──▶│ Aggregator │──▶│  Gemini  │──▶│ Extractor │
//! │  embed   │   │  search   │   │ HTTP fetch │   │ generate │   │ JSON+SQL  │
//! └──────────┘   └───────────┘   └────────────┘   └──────────┘   └───────────┘
//!                                                                      │
//!                                              ┌───────────────────────┤
//!                                              ▼                       ▼
//!                                         ┌──────────┐           ┌──────────┐
//!                                         │   CLI    │           │   HTTP   │
//!                                         │  (srag)  │           │  server  │
//!                                         └──────────┘           └──────────┘
//! ```
//!
//! The retrieval, aggregation, extraction, and orchestration logic lives in
//! the `schema-rag-core` crate. This crate supplies the concrete clients,
//! configuration, CLI commands, and server.
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=... PINECONE_API_KEY=...
//! srag check
//! srag agent --schema schema.json --request "add a members table"
//! srag chat --query "when should I denormalize?"
//! srag report --analytics analytics.json --schema schema.json
//! srag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, environment overrides |
//! | [`gemini`] | Gemini embedding and generation clients |
//! | [`vector`] | Pinecone similarity search |
//! | [`fetch`] | HTTP document fetcher |
//! | [`services`] | Config → pipeline wiring |
//! | [`agent`], [`chat`], [`report`], [`extract`], [`check`] | CLI commands |
//! | [`server`] | HTTP server |

pub mod agent;
pub mod chat;
pub mod check;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod gemini;
pub mod report;
pub mod server;
pub mod services;
pub mod vector;
