//! # rankchat
//!
//! A CSV ranking service with a chat interface over a local LLM.
//!
//! rankchat ingests a CSV file, derives a per-row score from its numeric
//! columns, stores the rows as a ranked record set in SQLite, and lets a
//! user ask questions about the data: each question is relayed, together
//! with the top-ranked records, to a locally running Ollama-compatible
//! model server, and the conversation is persisted per upload.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ CSV file │──▶│  Scoring    │──▶│  SQLite   │
//! │ (upload) │   │ rank+score │   │ 4 tables  │
//! └──────────┘   └────────────┘   └────┬─────┘
//!                                      │
//!                   ┌──────────────────┤
//!                   ▼                  ▼
//!              ┌──────────┐     ┌──────────┐    ┌────────┐
//!              │   CLI    │     │   HTTP   │──▶│ Ollama  │
//!              │(rankchat)│     │  (JSON)  │    │ /api/…  │
//!              └──────────┘     └──────────┘    └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rankchat init                    # create database
//! rankchat upload people.csv      # ingest and rank
//! rankchat show <upload-id>       # top-ranked window
//! rankchat chat <upload-id> "who leads and why?"
//! rankchat serve                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scoring`] | Score + rank computation (pure) |
//! | [`ingest`] | CSV parsing and atomic persistence |
//! | [`store`] | SQLite repository |
//! | [`relay`] | Prompt assembly and the generation-service client |
//! | [`chat`] | Chat turn orchestration |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod config;
pub mod db;
pub mod ingest;
pub mod list;
pub mod migrate;
pub mod models;
pub mod relay;
pub mod scoring;
pub mod server;
pub mod show;
pub mod store;
