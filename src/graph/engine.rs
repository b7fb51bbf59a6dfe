//! The abstract graph-engine contract (spec §6). A real graph database
//! client implements this trait; this crate supplies only the contract and
//! an in-memory reference implementation ([`super::memory::InMemoryGraphEngine`]).
use crate::error::GraphLinkError;
use crate::model::{FileNodeId, HunkNodeId, NodeId, PatchFileNodeId, PatchNodeId};
use std::path::Path;

/// The operation a [`crate::model::Segment`] represents, used to select the
/// typed edge kind a hunk node is connected with (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Removes,
    Adds,
    Replaces,
}

/// A typed property value written onto a patch or hunk node (spec §6's
/// "typed property writes").
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}
impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::UInt(v)
    }
}
impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}
impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// The collaborator interface a graph database backend must provide (spec
/// §6). Every worker in [`crate::scheduler::BatchScheduler`] gets its own
/// session/handle to an implementor of this trait (spec §5).
pub trait GraphEngine: Send + Sync {
    /// Idempotent by `path`: returns the existing id if a patch node for
    /// this path already exists, otherwise creates a new one.
    fn create_patch_node(&self, path: &Path, description: &str) -> Result<PatchNodeId, GraphLinkError>;

    /// Removes all `PatchFileNode`s and `HunkNode`s owned by `patch`.
    fn cleanup_patch_effects(&self, patch: PatchNodeId) -> Result<(), GraphLinkError>;

    /// Looks up CPG file nodes by a trailing path suffix.
    fn query_file_by_path(&self, suffix: &str) -> Result<Vec<FileNodeId>, GraphLinkError>;

    /// Range-intersection link creation: connects `hunk` to every CPG node
    /// in `file` whose source range intersects `[start, end]` under `op`.
    /// Returns the number of CPG nodes linked.
    #[allow(clippy::too_many_arguments)]
    fn connect_patch_with_affected_code(
        &self,
        patch_file: PatchFileNodeId,
        file: FileNodeId,
        hunk: HunkNodeId,
        op: EdgeKind,
        start: usize,
        end: usize,
    ) -> Result<usize, GraphLinkError>;

    /// Creates a new, untyped vertex.
    fn add_vertex(&self) -> Result<NodeId, GraphLinkError>;

    /// Creates a labeled edge between two vertices (`affects`, `isFile`,
    /// `applies`, etc; spec §3).
    fn add_edge(&self, from: NodeId, to: NodeId, label: &str) -> Result<(), GraphLinkError>;

    /// Deletes a vertex and its incident edges.
    fn remove_vertex(&self, id: NodeId) -> Result<(), GraphLinkError>;

    /// Writes a typed property on a patch node (spec §6's persisted-state
    /// list: `reversed`, `originalHunks`, `avgHunkComplexity`, ...).
    fn set_patch_property(
        &self,
        patch: PatchNodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), GraphLinkError>;

    /// Writes a typed property on a hunk node (`linesAdded`, `linesRemoved`).
    fn set_hunk_property(&self, hunk: HunkNodeId, key: &str, value: PropertyValue) -> Result<(), GraphLinkError>;

    /// Commits any buffered mutations. Retried by the caller under
    /// optimistic-concurrency conflicts (spec §5, §7 `GraphConflict`).
    fn commit(&self) -> Result<(), GraphLinkError>;
}
