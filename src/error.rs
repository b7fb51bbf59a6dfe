//! Typed error enums, one per component boundary: every I/O-bearing
//! variant carries the affected path alongside the source error.
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing a [`crate::model::PatchFile`] from disk.
#[derive(Error, Debug)]
pub enum DiffParseError {
    #[error("I/O error while reading patch file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A `diff `-scoped section has hunk lines but no `--- `/`+++ ` header.
    #[error("patch file {path:?} has a diff section with no file header")]
    MissingFileHeader { path: PathBuf },
}

/// Errors raised while invoking and parsing the output of the external
/// unified-diff applier (spec §4.1).
#[derive(Error, Debug)]
pub enum FuzzyApplyError {
    #[error("failed to spawn external patch utility '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    /// Non-zero exit that isn't one of the recognized states.
    #[error("external patch utility exited with status {status}: {stderr}")]
    ExternalToolFailure { status: i32, stderr: String },
    /// The applier's stdout contained bytes that are not valid UTF-8.
    #[error("could not decode patch utility output as UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    /// A patch already marked `reversed` was itself detected as reversed.
    #[error("patch was marked reversed but the applier reports it is reversed again (double reverse)")]
    DoubleReverse,
}

/// Errors raised while turning one hunk's raw body into [`crate::model::Segment`]s
/// (spec §4.2).
#[derive(Error, Debug)]
pub enum HunkParseError {
    /// A `-` line immediately followed a `+` line within one hunk body.
    #[error("malformed hunk: a removed line follows an added line without intervening context")]
    InputMalformed,
}

/// Errors raised by [`crate::workspace::WorkspaceManager`] (spec §4.4).
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("I/O error while preparing workspace for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while linking segments to CPG nodes (spec §4.5).
#[derive(Error, Debug)]
pub enum GraphLinkError {
    #[error("graph engine query failed: {0}")]
    Engine(String),
    /// Optimistic-concurrency retry budget exhausted (spec §5, §7).
    #[error("graph write conflict: retries exhausted after {attempts} attempt(s)")]
    Conflict { attempts: u32 },
}

/// Top-level error for one patch file's ingestion (spec §4.6, §7).
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    DiffParse(#[from] DiffParseError),
    #[error(transparent)]
    FuzzyApply(#[from] FuzzyApplyError),
    #[error(transparent)]
    HunkParse(#[from] HunkParseError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    GraphLink(#[from] GraphLinkError),
    /// The target file for a sub-patch was not found in the code base
    /// (spec §7 `FileNotFound`). Non-fatal at the orchestrator level; the
    /// sub-patch is skipped and ingestion continues.
    #[error("target file not found: {0}")]
    FileNotFound(PathBuf),
}
