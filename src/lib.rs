//! Wikidict: wiki dump to offline dictionary conversion pipeline
//!
//! This crate converts a compiled wiki database into a stream of
//! serialized article records (HTML body + tags + metadata) ready for
//! packaging into an offline dictionary container:
//!
//! 1. **Configuration** -- Load the site description and content filters
//!    once, build the redirect alias set, announce run metadata
//! 2. **Conversion** -- Per title: fetch raw text, short-circuit
//!    redirects, parse to a document tree, render to constrained XHTML,
//!    apply text replacements
//! 3. **Scheduling** -- Drive the conversion over the full title stream
//!    with a bounded worker pool, recover from stuck workers by recreating
//!    the pool, and report every outcome to the consumer exactly once
//!
//! # Architecture
//!
//! The pipeline is designed for isolation and recoverability:
//!
//! - **Per-worker contexts** -- Each worker thread builds its own context
//!   from immutable shared configuration at startup; nothing mutates
//!   shared state during the run
//! - **Chunked dispatch** -- Titles flow to the pool in fixed-size chunks
//!   with unordered completion inside a chunk
//! - **Timeout recovery** -- A stalled pool is discarded wholesale and the
//!   chunk's unreported titles are redispatched to a fresh pool
//! - **Failure isolation** -- Per-article failures (including worker
//!   panics) are reported and the batch continues; only configuration
//!   errors are fatal
//!
//! # Key Modules
//!
//! - [`scheduler`] -- Batch driver: chunking, timeout recovery, early
//!   termination, interrupt handling
//! - [`pool`] -- Worker pool built on threads and channels
//! - [`pipeline`] -- Per-article conversion state machine
//! - [`render`] -- Document tree to constrained XHTML
//! - [`refs`] -- Footnote reference tracking per group
//! - [`redirect`] -- Redirect directive detection
//! - [`filters`] -- Page/class/id exclusion and text replacements
//! - [`langlinks`] -- Synthetic redirects from language links
//! - [`parser`] -- Markup parser seam plus a regex-level fallback
//! - [`tree`] -- Document-tree node vocabulary
//! - [`db`] -- Article database interface
//! - [`siteinfo`] -- Site description loading
//! - [`consumer`] -- Packager interface plus a JSONL reference sink
//! - [`models`] -- Conversion results and payload wire format
//! - [`stats`] -- Run counters
//! - [`config`] -- Tuning constants

pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod filters;
pub mod langlinks;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod pool;
pub mod redirect;
pub mod refs;
pub mod render;
pub mod scheduler;
pub mod siteinfo;
pub mod stats;
pub mod tree;
