//! Binds security-patch hunks to nodes of a pre-existing Code Property
//! Graph (CPG), tolerating drift between the patch's assumed line numbers
//! and the current on-disk code via fuzzy application.
//!
//! `patchgrapher` does not parse source code into a CPG itself (that's a
//! separate system's job, reached through the [`orchestrator::SourceImporter`]
//! and [`graph::GraphEngine`] collaborator traits); it ingests unified-diff
//! patch files, works out which hunk touched which line range, and links
//! that range to the right file-version node — vulnerable or patched —
//! with the right edge kind.
//!
//! ## Pipeline
//!
//! 1. [`diff_file::parse_patch_file`] reads one patch file into a
//!    [`model::PatchFile`].
//! 2. [`fuzzy::FuzzyApplier`] shells out to the system `patch`(1) binary to
//!    apply it against a scratch [`workspace::WorkspaceManager`] copy of the
//!    affected files, tolerating line drift and detecting the
//!    already-applied (reverse) case.
//! 3. [`drift::DriftTracker`] and [`hunk_parser::parse`] turn the applier's
//!    per-hunk resolutions into drift-corrected [`model::Segment`] lists.
//! 4. [`graph::GraphLinker`] links those segments to CPG file nodes through
//!    a [`graph::GraphEngine`], enforcing the vulnerable-vs-patched routing
//!    rule.
//! 5. [`orchestrator::IngestionOrchestrator`] drives one patch file through
//!    that whole pipeline; [`scheduler::BatchScheduler`] runs many of them
//!    under a bounded worker pool.
//!
//! ## Example
//!
//! ```no_run
//! use patchgrapher::config::EngineConfig;
//! use patchgrapher::graph::InMemoryGraphEngine;
//! use patchgrapher::orchestrator::IngestionOrchestrator;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = InMemoryGraphEngine::new();
//! let config = EngineConfig::default();
//! let orchestrator = IngestionOrchestrator::new(&engine, &config);
//! let outcome = orchestrator.ingest(Path::new("CVE-2020-1.patch"), Path::new("./linux"), "linux", false)?;
//! println!("{} hunk(s) applied", outcome.summary.actual_hunks);
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod diff_file;
pub mod drift;
pub mod error;
pub mod fuzzy;
pub mod graph;
pub mod hunk_parser;
pub mod model;
pub mod orchestrator;
pub mod scheduler;
pub mod stats;
pub mod workspace;
