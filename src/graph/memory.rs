//! An in-memory [`GraphEngine`] reference implementation.
//!
//! Ships as the engine this crate's own test suite runs against, and as a
//! drop-in example for how a real backend would implement the contract. No
//! network or database crate is introduced: wiring a production graph
//! database is explicitly out of scope (spec §1).
//!
//! State is split across a handful of independently locked tables rather
//! than one coarse `Mutex`, the same "arena of ids, no back-pointers"
//! texture spec §9 asks for: nothing here holds a reference into another
//! node, only ids.
use super::engine::{EdgeKind, GraphEngine, PropertyValue};
use crate::error::GraphLinkError;
use crate::model::{FileNodeId, HunkNodeId, NodeId, PatchFileNodeId, PatchNodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct CodeRange {
    node: NodeId,
    start: usize,
    end: usize,
}

/// An in-memory, `Send + Sync` [`GraphEngine`]. Cheap to share as
/// `Arc<InMemoryGraphEngine>` across [`crate::scheduler::BatchScheduler`]
/// workers.
#[derive(Default)]
pub struct InMemoryGraphEngine {
    next_id: AtomicU64,
    patch_nodes_by_path: Mutex<HashMap<PathBuf, PatchNodeId>>,
    patch_properties: Mutex<HashMap<PatchNodeId, HashMap<String, PropertyValue>>>,
    hunk_properties: Mutex<HashMap<HunkNodeId, HashMap<String, PropertyValue>>>,
    vertices: Mutex<HashMap<u64, bool>>,
    edges: Mutex<Vec<(NodeId, NodeId, String)>>,
    owners: Mutex<HashMap<NodeId, PatchNodeId>>,
    /// Seeded CPG file registry: path -> file node ids. A real backend
    /// would have these pre-populated by the external source parser.
    files_by_path: Mutex<HashMap<String, Vec<FileNodeId>>>,
    /// Seeded CPG code node ranges, per file.
    code_ranges: Mutex<HashMap<FileNodeId, Vec<CodeRange>>>,
    /// Test hook: the next N `commit()` calls fail with `GraphConflict`
    /// (spec §5's optimistic-concurrency contention), to exercise
    /// [`crate::scheduler::BatchScheduler`]'s retry policy.
    injected_conflicts: AtomicU32,
}

impl InMemoryGraphEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/demo seeding: registers a CPG file node reachable by `path`.
    pub fn seed_file(&self, path: &str, id: FileNodeId) {
        self.files_by_path
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(id);
    }

    /// Test/demo seeding: registers a CPG code node spanning
    /// `[start, end]` (inclusive) in `file`.
    pub fn seed_code_node(&self, file: FileNodeId, start: usize, end: usize) -> NodeId {
        let id = self.alloc_id();
        self.code_ranges.lock().unwrap().entry(file).or_default().push(CodeRange {
            node: id,
            start,
            end,
        });
        id
    }

    /// Causes the next `count` calls to [`GraphEngine::commit`] to fail with
    /// [`GraphLinkError::Conflict`].
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    fn alloc_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// All edges labeled `label`, for test assertions.
    pub fn edges_with_label(&self, label: &str) -> Vec<(NodeId, NodeId)> {
        self.edges
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, l)| l == label)
            .map(|(from, to, _)| (*from, *to))
            .collect()
    }

    pub fn patch_property(&self, patch: PatchNodeId, key: &str) -> Option<PropertyValue> {
        self.patch_properties.lock().unwrap().get(&patch).and_then(|m| m.get(key).cloned())
    }

    pub fn hunk_property(&self, hunk: HunkNodeId, key: &str) -> Option<PropertyValue> {
        self.hunk_properties.lock().unwrap().get(&hunk).and_then(|m| m.get(key).cloned())
    }

    pub fn vertex_exists(&self, id: NodeId) -> bool {
        self.vertices.lock().unwrap().get(&id.0).copied().unwrap_or(false)
    }
}

impl GraphEngine for InMemoryGraphEngine {
    fn create_patch_node(&self, path: &Path, description: &str) -> Result<PatchNodeId, GraphLinkError> {
        let mut table = self.patch_nodes_by_path.lock().unwrap();
        if let Some(existing) = table.get(path) {
            return Ok(*existing);
        }
        let id = PatchNodeId(self.alloc_id().0);
        table.insert(path.to_path_buf(), id);
        drop(table);
        self.vertices.lock().unwrap().insert(id.0, true);
        self.set_patch_property(id, "description", PropertyValue::Text(description.to_string()))?;
        Ok(id)
    }

    fn cleanup_patch_effects(&self, patch: PatchNodeId) -> Result<(), GraphLinkError> {
        let owned: Vec<NodeId> = self
            .owners
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, owner)| **owner == patch)
            .map(|(node, _)| *node)
            .collect();
        for node in owned {
            self.remove_vertex(node)?;
        }
        self.owners.lock().unwrap().retain(|_, owner| *owner != patch);
        Ok(())
    }

    fn query_file_by_path(&self, suffix: &str) -> Result<Vec<FileNodeId>, GraphLinkError> {
        let table = self.files_by_path.lock().unwrap();
        Ok(table
            .iter()
            .filter(|(path, _)| path.ends_with(suffix))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect())
    }

    fn connect_patch_with_affected_code(
        &self,
        _patch_file: PatchFileNodeId,
        file: FileNodeId,
        hunk: HunkNodeId,
        op: EdgeKind,
        start: usize,
        end: usize,
    ) -> Result<usize, GraphLinkError> {
        let ranges = self.code_ranges.lock().unwrap();
        let Some(candidates) = ranges.get(&file) else {
            return Ok(0);
        };
        let label = match op {
            EdgeKind::Removes => "removes",
            EdgeKind::Adds => "adds",
            EdgeKind::Replaces => "replaces",
        };
        let mut count = 0;
        let mut new_edges = Vec::new();
        for range in candidates {
            if range.start <= end && start <= range.end {
                new_edges.push((NodeId(hunk.0), range.node, label.to_string()));
                count += 1;
            }
        }
        drop(ranges);
        self.edges.lock().unwrap().extend(new_edges);
        Ok(count)
    }

    fn add_vertex(&self) -> Result<NodeId, GraphLinkError> {
        let id = self.alloc_id();
        self.vertices.lock().unwrap().insert(id.0, true);
        Ok(id)
    }

    fn add_edge(&self, from: NodeId, to: NodeId, label: &str) -> Result<(), GraphLinkError> {
        self.edges.lock().unwrap().push((from, to, label.to_string()));
        if label == "affects" {
            // `to` is a PatchFileNode and `from` is its owning PatchNode.
            self.owners.lock().unwrap().insert(to, PatchNodeId(from.0));
        } else if label == "applies" {
            // `to` is a HunkNode; its owner is whichever PatchNode already
            // owns `from` (the PatchFileNode).
            if let Some(owner) = self.owners.lock().unwrap().get(&from).copied() {
                self.owners.lock().unwrap().insert(to, owner);
            }
        }
        Ok(())
    }

    fn remove_vertex(&self, id: NodeId) -> Result<(), GraphLinkError> {
        self.vertices.lock().unwrap().remove(&id.0);
        self.edges.lock().unwrap().retain(|(from, to, _)| *from != id && *to != id);
        self.owners.lock().unwrap().remove(&id);
        Ok(())
    }

    fn set_patch_property(&self, patch: PatchNodeId, key: &str, value: PropertyValue) -> Result<(), GraphLinkError> {
        self.patch_properties
            .lock()
            .unwrap()
            .entry(patch)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_hunk_property(&self, hunk: HunkNodeId, key: &str, value: PropertyValue) -> Result<(), GraphLinkError> {
        self.hunk_properties
            .lock()
            .unwrap()
            .entry(hunk)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn commit(&self) -> Result<(), GraphLinkError> {
        let remaining = self.injected_conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.injected_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(GraphLinkError::Conflict { attempts: 1 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_patch_node_is_idempotent_by_path() {
        let engine = InMemoryGraphEngine::new();
        let a = engine.create_patch_node(Path::new("x.patch"), "desc").unwrap();
        let b = engine.create_patch_node(Path::new("x.patch"), "desc").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn query_file_by_path_matches_suffix() {
        let engine = InMemoryGraphEngine::new();
        engine.seed_file("/repo/src/parser.c", FileNodeId(1));
        let found = engine.query_file_by_path("src/parser.c").unwrap();
        assert_eq!(found, vec![FileNodeId(1)]);
    }

    #[test]
    fn connect_counts_intersecting_ranges() {
        let engine = InMemoryGraphEngine::new();
        let file = FileNodeId(1);
        engine.seed_code_node(file, 5, 10);
        engine.seed_code_node(file, 20, 30);
        let patch_file = PatchFileNodeId(engine.add_vertex().unwrap().0);
        let hunk = HunkNodeId(engine.add_vertex().unwrap().0);
        let count = engine
            .connect_patch_with_affected_code(patch_file, file, hunk, EdgeKind::Removes, 8, 22)
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn cleanup_removes_owned_nodes() {
        let engine = InMemoryGraphEngine::new();
        let patch = engine.create_patch_node(Path::new("x.patch"), "").unwrap();
        let patch_file = engine.add_vertex().unwrap();
        engine.add_edge(NodeId(patch.0), patch_file, "affects").unwrap();
        assert!(engine.vertex_exists(patch_file));
        engine.cleanup_patch_effects(patch).unwrap();
        assert!(!engine.vertex_exists(patch_file));
    }

    #[test]
    fn injected_conflicts_are_consumed_once_each() {
        let engine = InMemoryGraphEngine::new();
        engine.inject_conflicts(2);
        assert!(engine.commit().is_err());
        assert!(engine.commit().is_err());
        assert!(engine.commit().is_ok());
    }
}
