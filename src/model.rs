//! Core data model (spec §3): [`PatchFile`], [`SubPatch`], [`Hunk`],
//! [`Segment`], [`FuzzyReport`], and the opaque graph node identifiers
//! `GraphLinker` operates on.
//!
//! Node identities are plain newtypes over the engine's own id type rather
//! than heap-allocated objects with back-pointers: the orchestrator only
//! ever holds ids, never references into the graph (spec §9, "Cyclic graph
//! references").
use std::path::PathBuf;

/// Opaque id of a `PatchNode`, as returned by [`crate::graph::GraphEngine::create_patch_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchNodeId(pub u64);

/// Opaque id of a `PatchFileNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchFileNodeId(pub u64);

/// Opaque id of a `HunkNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HunkNodeId(pub u64);

/// Opaque id of a CPG file-version node (externally owned, spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileNodeId(pub u64);

/// A raw, untyped vertex id as returned by `GraphEngine::add_vertex` (spec
/// §6). Callers immediately tag it as a [`PatchFileNodeId`] or
/// [`HunkNodeId`] depending on what they just created — the graph engine
/// itself, like a Gremlin/OrientDB backend, does not distinguish vertex
/// "types" at the id level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl From<NodeId> for PatchFileNodeId {
    fn from(id: NodeId) -> Self {
        PatchFileNodeId(id.0)
    }
}

impl From<NodeId> for HunkNodeId {
    fn from(id: NodeId) -> Self {
        HunkNodeId(id.0)
    }
}

impl From<PatchFileNodeId> for NodeId {
    fn from(id: PatchFileNodeId) -> Self {
        NodeId(id.0)
    }
}

impl From<HunkNodeId> for NodeId {
    fn from(id: HunkNodeId) -> Self {
        NodeId(id.0)
    }
}

impl From<PatchNodeId> for NodeId {
    fn from(id: PatchNodeId) -> Self {
        NodeId(id.0)
    }
}

/// One `@@`-delimited chunk of a unified diff (spec §3).
///
/// A hunk is the unit of failure for fuzzy application: the whole hunk
/// either applies at some line or it doesn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Starting line number as written in the `@@ -l,s +l,s @@` header.
    /// Not used for linking directly; superseded by the drift-corrected
    /// value FuzzyApplier reports for the current on-disk file.
    pub original_start_line: usize,
    /// Line count declared in the header's `-l,s` half.
    pub original_length: usize,
    /// Raw body lines, each still prefixed with `' '`, `'+'`, or `'-'`.
    pub lines: Vec<String>,
}

impl Hunk {
    /// Number of `+` lines in this hunk's body.
    pub fn lines_added(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('+')).count()
    }

    /// Number of `-` lines in this hunk's body.
    pub fn lines_removed(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('-')).count()
    }
}

/// One file-scoped section of a [`PatchFile`] (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPatch {
    /// Path relative to the code base root, e.g. `src/parser.c`.
    pub target_path: PathBuf,
    pub hunks: Vec<Hunk>,
}

impl SubPatch {
    pub fn lines_added(&self) -> usize {
        self.hunks.iter().map(Hunk::lines_added).sum()
    }

    pub fn lines_removed(&self) -> usize {
        self.hunks.iter().map(Hunk::lines_removed).sum()
    }
}

/// A unified-diff file on disk (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    pub path: PathBuf,
    /// Everything before the first line starting with `diff `.
    pub description: String,
    pub sub_patches: Vec<SubPatch>,
}

impl PatchFile {
    pub fn original_hunks(&self) -> usize {
        self.sub_patches.iter().map(|p| p.hunks.len()).sum()
    }

    pub fn original_lines_added(&self) -> usize {
        self.sub_patches.iter().map(SubPatch::lines_added).sum()
    }

    pub fn original_lines_removed(&self) -> usize {
        self.sub_patches.iter().map(SubPatch::lines_removed).sum()
    }
}

/// The parser's output unit (spec §3): one contiguous edit, classified.
///
/// Invariants (enforced by [`crate::hunk_parser::parse`]): within one hunk,
/// segments are ordered by `start` and non-overlapping; a `Replace` is
/// produced only for an immediately adjacent `-` run followed by a `+` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// `count` lines would be inserted at `start` (patched-file coordinates).
    Add { start: usize, count: usize },
    /// `count` contiguous lines deleted at `start` (vulnerable-file coordinates).
    Remove { start: usize, count: usize },
    /// `removed_count` lines at `start` are removed and `added_count` lines
    /// inserted at the same position.
    Replace {
        start: usize,
        removed_count: usize,
        added_count: usize,
    },
}

impl Segment {
    pub fn start(&self) -> usize {
        match *self {
            Segment::Add { start, .. } => start,
            Segment::Remove { start, .. } => start,
            Segment::Replace { start, .. } => start,
        }
    }
}

/// Per-hunk resolution reported by the external applier (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkResolution {
    /// The hunk applied; `line` is the drift-adjusted start in the current file.
    Applied { line: usize },
    /// The hunk could not be applied (`FAILED` in the applier's output).
    Failed,
    /// The hunk was ignored because its target file was missing.
    Ignored,
}

/// Per-sub-patch list of [`HunkResolution`]s, in hunk order.
pub type SubPatchResolution = Vec<HunkResolution>;

/// Result of running [`crate::fuzzy::FuzzyApplier::apply`] over one patch
/// file (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzzyReport {
    /// The applier reported the patch is already present in the target tree.
    AlreadyApplied,
    /// One entry per sub-patch, each a list of per-hunk resolutions.
    Resolved(Vec<SubPatchResolution>),
}

/// The aggregate counters [`crate::orchestrator::IngestionOrchestrator`]'s
/// `Finalize` step persists onto a PatchNode (spec §4.6, §6's "persisted
/// state" list), and [`crate::stats`] summarizes across many patches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSummary {
    pub project_name_set: bool,
    pub reversed: bool,
    pub original_files_affected: u64,
    pub original_lines_added: u64,
    pub original_lines_removed: u64,
    pub original_hunks: u64,
    pub actual_files_affected: u64,
    pub actual_lines_added: u64,
    pub actual_lines_removed: u64,
    pub actual_hunks: u64,
    pub avg_hunk_complexity: f64,
}

impl PatchSummary {
    /// `avgHunkComplexity = round((originalLinesAdded + originalLinesRemoved) / originalHunks, 3)`
    /// (spec §4.6), or `0.0` when there are no hunks at all.
    pub fn compute_avg_hunk_complexity(original_lines_added: u64, original_lines_removed: u64, original_hunks: u64) -> f64 {
        if original_hunks == 0 {
            return 0.0;
        }
        let raw = (original_lines_added + original_lines_removed) as f64 / original_hunks as f64;
        (raw * 1000.0).round() / 1000.0
    }

    /// A patch is "active" if it connected at least one CPG node (spec
    /// §4.6's zero-counters rollback criterion, mirrored in
    /// `patch_stats.py`'s `.filter{it.out("affects").toList().size > 0}`).
    pub fn is_active(&self) -> bool {
        self.actual_files_affected > 0
    }
}
