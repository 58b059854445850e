//! # Research Digest
//!
//! Ingests newly arrived research PDFs, summarizes their abstracts into a
//! semantic index, and compiles a weekly digest that sets the week's papers
//! against the accumulated corpus.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │ papers dir │──▶│ new window + │──▶│   fast    │──▶│  SQLite  │
//! │  (*.pdf)   │   │   abstract   │   │ summarizer│   │ summaries│
//! └─────┬──────┘   └──────────────┘   └───────────┘   └────┬─────┘
//!       │                                                  │ nearest k
//!       ▼                                                  ▼
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────────────┐
//! │ week window +│──▶│    rich     │──▶│ summary_<date>.md report │
//! │   abstracts  │   │  completer  │   └──────────────────────────┘
//! └──────────────┘   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overlay |
//! | [`models`] | Core data types |
//! | [`scan`] | Non-recursive document listing |
//! | [`window`] | "new" and "week" time-window predicates |
//! | [`extract`] | PDF page text and abstract location |
//! | [`identity`] | Storage key for summaries |
//! | [`summarize`] | Fast and rich summarization backends |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`store`] | Summary store trait, SQLite and in-memory backends |
//! | [`ingest`] | Ingestion pipeline |
//! | [`digest`] | Weekly digest pipeline |
//! | [`render`] | Report rendering |
//! | [`lock`] | Run-level mutual exclusion |
//! | [`run`] | Per-run orchestration with guaranteed flush |
//! | [`similar`] | `rdigest similar` lookup |
//! | [`stats`] | `rdigest stats` overview |

pub mod config;
pub mod db;
pub mod digest;
pub mod embedding;
pub mod extract;
pub mod identity;
pub mod ingest;
pub mod lock;
pub mod migrate;
pub mod models;
pub mod render;
pub mod run;
pub mod scan;
pub mod similar;
pub mod stats;
pub mod store;
pub mod summarize;
pub mod window;
