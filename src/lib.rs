//! # Settings Search
//!
//! Search-index extraction for a device-settings application.
//!
//! The crate crawls every settings contributor (built-in screens and
//! external components that opt in), turns their preference documents and
//! raw entries into canonical, locale-normalized rows, and keeps track of
//! which rows are currently enabled.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Contributors │──▶│  Collector  │──▶│  Converter  │──▶│  Writer  │
//! │ (transport)  │   │ PreIndexData│   │ IndexData[] │   │  SQLite  │
//! └──────────────┘   └─────────────┘   └──────┬──────┘   └──────────┘
//!                                             │
//!                                   ┌─────────┴─────────┐
//!                                   ▼                   ▼
//!                             ┌──────────┐        ┌───────────┐
//!                             │  Parser  │        │ Normalizer│
//!                             └──────────┘        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sidx init                 # create database
//! sidx contributors         # list what will be crawled
//! sidx crawl                # full or incremental, decided automatically
//! sidx stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`normalize`] | Text folding for search matching |
//! | [`xml_parser`] | Preference-screen document parser |
//! | [`payload`] | Result payloads (deep link, inline switch) |
//! | [`models`] | Contributor-facing data types |
//! | [`index_data`] | Canonical index row and its builder |
//! | [`collector`] | Trust filter and concurrent contributor queries |
//! | [`converter`] | Pre-index data → index rows |
//! | [`traits`] | Transport, document, payload and writer seams |
//! | [`sqlite_writer`] | SQLite index writer and crawl state |
//! | [`memory_writer`] | In-memory index writer |
//! | [`connector_fs`] | Contributors backed by directories on disk |
//! | [`indexer`] | Crawl orchestration |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod collector;
pub mod config;
pub mod connector_fs;
pub mod contributors;
pub mod converter;
pub mod db;
pub mod error;
pub mod index_data;
pub mod indexer;
pub mod memory_writer;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod payload;
pub mod sqlite_writer;
pub mod stats;
pub mod traits;
pub mod xml_parser;
