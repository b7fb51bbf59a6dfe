//! GraphLinker (spec §4.5): turns one sub-patch's segments into graph nodes
//! and edges, enforcing the vulnerable-vs-patched routing rule.
use super::engine::{EdgeKind, GraphEngine};
use crate::error::GraphLinkError;
use crate::model::{FileNodeId, HunkNodeId, NodeId, PatchFileNodeId, PatchNodeId, Segment, SubPatch};
use std::path::Path;

/// Per-sub-patch link counts, returned so the orchestrator can roll the
/// `actual*` aggregate counters up onto the PatchNode (spec §4.6).
///
/// `removed_linked` and `added_linked_or_counted` are kept separate because
/// they persist onto distinct PatchNode properties (`actualLinesRemoved` is
/// an actual connected-CPG-node count; `actualLinesAdded` is either that
/// same kind of count, when a patched-file target was available, or a raw
/// line tally otherwise — spec §4.5's "recorded only as count" case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOutcome {
    pub patch_file: PatchFileNodeId,
    pub hunks_linked: usize,
    pub removed_linked: usize,
    pub added_linked_or_counted: usize,
}

impl LinkOutcome {
    pub fn total_effects(&self) -> usize {
        self.removed_linked + self.added_linked_or_counted
    }
}

/// Which file-version node a sub-patch's Remove/Add segments attach to
/// (spec §4.5's routing table). Built by the orchestrator once it knows
/// the patch direction and which CPG nodes it managed to resolve.
pub struct LinkTargets {
    /// CPG node segments classified `Remove` (or the remove half of a
    /// `Replace`) attach to.
    pub remove_target: FileNodeId,
    /// CPG node segments classified `Add` (or the add half of a
    /// `Replace`) attach to, if the patched file was imported/resolved.
    pub add_target: Option<FileNodeId>,
}

pub struct GraphLinker<'e> {
    engine: &'e dyn GraphEngine,
}

impl<'e> GraphLinker<'e> {
    pub fn new(engine: &'e dyn GraphEngine) -> Self {
        Self { engine }
    }

    /// Links one parsed sub-patch's segments against `targets`, creating a
    /// PatchFileNode under `patch` and one HunkNode per segment group (spec
    /// §4.5). `per_hunk_segments` groups segments by the unified-diff hunk
    /// they came from, preserving `linesAdded`/`linesRemoved` metadata.
    pub fn link_sub_patch(
        &self,
        patch: PatchNodeId,
        sub_patch: &SubPatch,
        per_hunk_segments: &[Vec<Segment>],
        targets: &LinkTargets,
    ) -> Result<LinkOutcome, GraphLinkError> {
        let patch_file_vertex = self.engine.add_vertex()?;
        let patch_file: PatchFileNodeId = patch_file_vertex.into();
        self.engine
            .add_edge(NodeId::from(patch), NodeId::from(patch_file), "affects")?;
        self.engine
            .add_edge(NodeId::from(patch_file), NodeId::from(targets.remove_target), "isFile")?;

        let mut outcome = LinkOutcome {
            patch_file,
            hunks_linked: 0,
            removed_linked: 0,
            added_linked_or_counted: 0,
        };
        for (hunk, segments) in sub_patch.hunks.iter().zip(per_hunk_segments) {
            let hunk_vertex = self.engine.add_vertex()?;
            let hunk_id: HunkNodeId = hunk_vertex.into();
            self.engine
                .add_edge(NodeId::from(patch_file), NodeId::from(hunk_id), "applies")?;
            self.engine
                .set_hunk_property(hunk_id, "linesAdded", (hunk.lines_added() as u64).into())?;
            self.engine
                .set_hunk_property(hunk_id, "linesRemoved", (hunk.lines_removed() as u64).into())?;

            let mut hunk_connected = 0;
            for segment in segments {
                let (removed, added) = self.link_segment(patch_file, hunk_id, *segment, targets)?;
                outcome.removed_linked += removed;
                outcome.added_linked_or_counted += added;
                hunk_connected += removed;
            }
            if hunk_connected > 0 {
                outcome.hunks_linked += 1;
            }
        }
        Ok(outcome)
    }

    /// Returns `(removed_or_replaced_linked, added_linked_or_counted)` for
    /// one segment.
    fn link_segment(
        &self,
        patch_file: PatchFileNodeId,
        hunk: HunkNodeId,
        segment: Segment,
        targets: &LinkTargets,
    ) -> Result<(usize, usize), GraphLinkError> {
        match segment {
            Segment::Remove { start, count } => {
                let linked = self.connect(patch_file, hunk, targets.remove_target, EdgeKind::Removes, start, count)?;
                Ok((linked, 0))
            }
            Segment::Add { start, count } => match targets.add_target {
                Some(target) => {
                    let linked = self.connect(patch_file, hunk, target, EdgeKind::Adds, start, count)?;
                    Ok((0, linked))
                }
                None => Ok((0, count)),
            },
            Segment::Replace {
                start,
                removed_count,
                added_count,
            } => {
                let removed =
                    self.connect(patch_file, hunk, targets.remove_target, EdgeKind::Replaces, start, removed_count)?;
                let added = match targets.add_target {
                    Some(target) => self.connect(patch_file, hunk, target, EdgeKind::Replaces, start, added_count)?,
                    None => added_count,
                };
                Ok((removed, added))
            }
        }
    }

    fn connect(
        &self,
        patch_file: PatchFileNodeId,
        hunk: HunkNodeId,
        file: FileNodeId,
        op: EdgeKind,
        start: usize,
        count: usize,
    ) -> Result<usize, GraphLinkError> {
        let end = start + count.saturating_sub(1);
        self.engine
            .connect_patch_with_affected_code(patch_file, file, hunk, op, start, end)
    }
}

/// Resolves the CPG file node(s) a sub-patch's segments route to, per spec
/// §4.5's forward/reverse table.
///
/// `reverse = false` (forward): Remove routes to the current on-disk
/// (vulnerable) file; Add routes to the patched file if it was imported.
/// `reverse = true`: Remove routes to the freshly imported vulnerable file
/// (derived by applying the patch to current on-disk); Add routes to
/// current on-disk, which is already the patched version.
pub fn resolve_targets(reverse: bool, current_on_disk: FileNodeId, imported_counterpart: Option<FileNodeId>) -> LinkTargets {
    if reverse {
        LinkTargets {
            remove_target: imported_counterpart.unwrap_or(current_on_disk),
            add_target: Some(current_on_disk),
        }
    } else {
        LinkTargets {
            remove_target: current_on_disk,
            add_target: imported_counterpart,
        }
    }
}

/// Resolves a sub-patch's target file to a single current-on-disk CPG node
/// via `engine.query_file_by_path`, honoring `truncate_path_suffix` (spec
/// §9's Open Question: `original_source/patch_importer.py` queries with
/// `filepath[-100:]`, a defensive workaround for index quirks that should
/// not be replicated unless the caller's index has the same quirk).
pub fn resolve_current_file(
    engine: &dyn GraphEngine,
    target_path: &Path,
    truncate_path_suffix: Option<usize>,
) -> Result<Option<FileNodeId>, GraphLinkError> {
    let full = target_path.to_string_lossy();
    let chars: Vec<char> = full.chars().collect();
    let owned: String = match truncate_path_suffix {
        Some(n) if n < chars.len() => chars[chars.len() - n..].iter().collect(),
        _ => full.into_owned(),
    };
    let mut matches = engine.query_file_by_path(&owned)?;
    Ok(matches.pop())
}
