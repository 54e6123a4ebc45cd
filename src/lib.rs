//! Wikishard: wiki-markup dump extraction into sharded JSON records
//!
//! This crate turns a MediaWiki XML export into typed, cleaned records grouped by
//! category and written as size-bounded JSON array shards:
//!
//! 1. **Reading** -- Stream `<page>` elements out of a plain or BZ2-compressed dump
//! 2. **Classification** -- Find each page's infobox, parse its fields, clean the values
//!    and run the detector cascade to decide what kind of page it is
//! 3. **Association** -- Merge sub-pages (`X/Lore`, `X/Voice-Overs`, `X/Companion`,
//!    `X: Namecard`) into their primary record, whichever arrives first
//! 4. **Sharding** -- Write every category into JSON files bounded by bytes, items and
//!    file count; every file is a complete array on its own
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML reader with BZ2 decompression
//! - [`template`] -- Balanced `{{...}}` template extraction
//! - [`fields`] -- `|key = value` infobox field parsing
//! - [`clean`] -- Wiki-markup to plain text normalization
//! - [`content`] -- Section and lead-sentence helpers
//! - [`entities`] -- Per-kind mapping from a page to an `EntityRecord`
//! - [`satellites`] -- Lore, voice-over, companion and namecard sub-page parsers
//! - [`resolver`] -- Detector cascade and the pending satellite ledger
//! - [`sink`] -- Count- and bucket-sharded JSON writers
//! - [`registry`] -- Category keys and their shard policies
//! - [`ignore`] -- Title and keyword skip list
//! - [`extract`] -- The single extraction pass
//! - [`models`] -- Core data types
//! - [`stats`] -- Run counters
//! - [`config`] -- Constants and defaults
//!
//! # Example Usage
//!
//! ```bash
//! # Extract everything, 4 MiB per shard at most
//! wikishard extract -i wiki-pages-articles.xml.bz2 -o output/ --max-shard-bytes 4194304
//!
//! # See how a single page is classified
//! wikishard inspect -i wiki-pages-articles.xml.bz2 -t "Amber/Lore"
//! ```

pub mod clean;
pub mod config;
pub mod content;
pub mod entities;
pub mod extract;
pub mod fields;
pub mod ignore;
pub mod models;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod satellites;
pub mod sink;
pub mod stats;
pub mod template;
