//! IngestionOrchestrator (spec §4.6): drives one patch file end-to-end.
//!
//! State machine, grounded on `original_source/patch_importer.py::import_patch_file`:
//!
//! ```text
//!   Start -> DescribePatch -> CreatePatchNode -> SeedWorkspace
//!         -> TryForward -+- applied -> LinkSubPatches -> Finalize
//!                        +- AlreadyApplied -> TryReverse -> (same tail, reversed)
//!                        +- fatal -> Rollback
//! ```
use crate::config::EngineConfig;
use crate::diff_file::parse_patch_file;
use crate::drift::DriftTracker;
use crate::error::IngestError;
use crate::fuzzy::FuzzyApplier;
use crate::graph::{resolve_current_file, resolve_targets, GraphEngine, GraphLinker};
use crate::hunk_parser;
use crate::model::{FileNodeId, FuzzyReport, HunkResolution, PatchNodeId, PatchSummary, Segment, SubPatchResolution};
use crate::workspace::WorkspaceManager;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// The seam a real CPG source parser plugs into (spec §1's "C/C++ source
/// parser" is out of scope; this is its abstract interface, same pattern as
/// [`GraphEngine`]). Importing a freshly-patched or side-car vulnerable file
/// into the CPG requires one of these; without it, ingestion still
/// completes, just without a patched-file link target (spec §4.5's "else
/// recorded only as count" case).
pub trait SourceImporter: Send + Sync {
    /// Parses `absolute_path` and returns the id of its freshly created CPG
    /// file node.
    fn import_file(&self, absolute_path: &Path) -> Result<FileNodeId, IngestError>;
}

pub struct IngestionOrchestrator<'e> {
    engine: &'e dyn GraphEngine,
    config: &'e EngineConfig,
    applier: FuzzyApplier,
    source_importer: Option<&'e dyn SourceImporter>,
}

/// What [`IngestionOrchestrator::ingest`] produced for one patch file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestionOutcome {
    pub patch_node: PatchNodeId,
    pub summary: PatchSummary,
}

impl<'e> IngestionOrchestrator<'e> {
    pub fn new(engine: &'e dyn GraphEngine, config: &'e EngineConfig) -> Self {
        Self {
            engine,
            config,
            applier: FuzzyApplier::with_binary(config.patch_binary.clone()),
            source_importer: None,
        }
    }

    /// Wires in a CPG source-parser collaborator (see [`SourceImporter`]).
    pub fn with_source_importer(mut self, importer: &'e dyn SourceImporter) -> Self {
        self.source_importer = Some(importer);
        self
    }

    /// Drives one patch file through the full state machine. `project_name`
    /// identifies the code base the patch is being ingested against (spec
    /// §3 supplemental: a graph engine is shared across projects, mirroring
    /// `PythonShellInterface.setDatabaseName` in
    /// `original_source/patch_importer.py`).
    ///
    /// `dry_run` runs the whole pipeline and computes a [`PatchSummary`] but
    /// skips the final `commit()`, so nothing a real backend persists
    /// durably is ever written (SPEC_FULL §2 item 8's `-n`/`--dry-run`).
    pub fn ingest(&self, patch_path: &Path, code_base_root: &Path, project_name: &str, dry_run: bool) -> Result<IngestionOutcome, IngestError> {
        // DescribePatch
        let patch_file = parse_patch_file(patch_path)?;
        info!(
            "importing {} - {} sub-patch(es)",
            patch_path.display(),
            patch_file.sub_patches.len()
        );

        // CreatePatchNode
        let patch_node = self.engine.create_patch_node(patch_path, &patch_file.description)?;
        self.engine.cleanup_patch_effects(patch_node)?;
        if !project_name.is_empty() {
            self.engine
                .set_patch_property(patch_node, "projectName", project_name.to_string().into())?;
        }

        let side_car = side_car_vulnerable_dir(patch_path);
        let import_vulnerable_code = side_car.as_ref().is_some_and(|dir| dir.is_dir());
        let source_root = if import_vulnerable_code {
            side_car.clone().expect("checked above")
        } else {
            code_base_root.to_path_buf()
        };

        // SeedWorkspace
        let workspace = WorkspaceManager::new()?;
        workspace.seed(&patch_file.sub_patches, &source_root)?;

        // TryForward / TryReverse. The side-car vulnerable-code path never
        // retries in reverse: it is a dry-run applied purely to obtain
        // fuzzed offsets against an already-vulnerable tree (spec §4.6).
        let forward_report = self.applier.apply(patch_path, workspace.root(), false, import_vulnerable_code)?;
        let (report, reversed) = match forward_report {
            FuzzyReport::AlreadyApplied if !import_vulnerable_code => {
                info!("{} was already applied, retrying in reverse", patch_path.display());
                workspace.seed(&patch_file.sub_patches, &source_root)?;
                let reverse_report = self.applier.apply(patch_path, workspace.root(), true, import_vulnerable_code)?;
                (reverse_report, true)
            }
            other => (other, false),
        };
        let per_sub_patch_resolutions = match report {
            FuzzyReport::Resolved(v) => v,
            FuzzyReport::AlreadyApplied => unreachable!("a reverse apply reporting AlreadyApplied is a DoubleReverse error"),
        };

        let original_lines_added = patch_file.original_lines_added() as u64;
        let original_lines_removed = patch_file.original_lines_removed() as u64;
        let original_hunks = patch_file.original_hunks() as u64;

        self.engine.set_patch_property(patch_node, "reversed", reversed.into())?;
        self.engine
            .set_patch_property(patch_node, "originalFilesAffected", (patch_file.sub_patches.len() as u64).into())?;
        self.engine
            .set_patch_property(patch_node, "originalLinesAdded", original_lines_added.into())?;
        self.engine
            .set_patch_property(patch_node, "originalLinesRemoved", original_lines_removed.into())?;
        self.engine
            .set_patch_property(patch_node, "originalHunks", original_hunks.into())?;

        let link_linker = GraphLinker::new(self.engine);
        let mut actual_files_affected = 0u64;
        let mut actual_hunks = 0u64;
        let mut removed_linked_total = 0u64;
        let mut added_linked_total = 0u64;

        for (sub_patch, resolution) in patch_file.sub_patches.iter().zip(per_sub_patch_resolutions.iter()) {
            // Resolve the current-on-disk (vulnerable, forward case) CPG node.
            let current_file = if import_vulnerable_code {
                if !self.config.source_extensions.matches(&sub_patch.target_path) {
                    info!("skipping {} (extension not eligible)", sub_patch.target_path.display());
                    continue;
                }
                None
            } else {
                match resolve_current_file(self.engine, &sub_patch.target_path, self.config.truncate_path_suffix)? {
                    Some(id) => Some(id),
                    None => {
                        warn!("{} not found in the code base, skipping", sub_patch.target_path.display());
                        continue;
                    }
                }
            };

            // The freshly-imported counterpart: the side-car vulnerable file
            // (import_vulnerable_code, read from its own source tree) or, for
            // a reversed patch, the vulnerable file the reverse apply just
            // derived in the workspace (code_base_root/source_root still
            // holds the patched version; only the workspace copy was turned
            // back into the vulnerable one). Both need the same external
            // source-parser collaborator.
            let imported_counterpart = if import_vulnerable_code || reversed {
                match self.source_importer {
                    Some(importer) => {
                        let absolute = if import_vulnerable_code {
                            source_root.join(&sub_patch.target_path)
                        } else {
                            workspace.root().join(&sub_patch.target_path)
                        };
                        Some(importer.import_file(&absolute)?)
                    }
                    None => {
                        warn!(
                            "no source importer configured; {} will be linked by count only",
                            sub_patch.target_path.display()
                        );
                        None
                    }
                }
            } else {
                None
            };

            let (current_on_disk, counterpart) = if import_vulnerable_code {
                // There is no "current on-disk" vulnerable node in this mode;
                // the freshly imported side-car file takes that role.
                match imported_counterpart {
                    Some(id) => (id, None),
                    None => continue,
                }
            } else {
                (current_file.expect("checked above"), imported_counterpart)
            };

            let per_hunk_segments = parse_sub_patch_segments(&sub_patch.hunks, resolution, reversed)?;

            let targets = resolve_targets(reversed, current_on_disk, counterpart);
            let outcome = link_linker.link_sub_patch(patch_node, sub_patch, &per_hunk_segments, &targets)?;

            if outcome.total_effects() > 0 {
                actual_files_affected += 1;
                actual_hunks += outcome.hunks_linked as u64;
                removed_linked_total += outcome.removed_linked as u64;
                added_linked_total += outcome.added_linked_or_counted as u64;
                info!(
                    "{} - connected {} CPG node(s) ({} hunk(s) applied)",
                    sub_patch.target_path.display(),
                    outcome.total_effects(),
                    outcome.hunks_linked
                );
            } else {
                self.engine.remove_vertex(outcome.patch_file.into())?;
                info!("{} - no CPG nodes reachable, dropping patch-file node", sub_patch.target_path.display());
            }
        }

        let summary = self.finalize(
            patch_node,
            !project_name.is_empty(),
            reversed,
            patch_file.sub_patches.len() as u64,
            original_lines_added,
            original_lines_removed,
            original_hunks,
            actual_files_affected,
            added_linked_total,
            removed_linked_total,
            actual_hunks,
        )?;

        if summary.actual_files_affected == 0 && self.config.rollback_policy == crate::config::RollbackPolicy::Delete {
            self.engine.cleanup_patch_effects(patch_node)?;
            // The PatchNode itself has no owner; a real backend would expose
            // a dedicated delete-vertex-by-id here. The in-memory engine
            // treats `remove_vertex` uniformly for any vertex kind.
            self.engine.remove_vertex(patch_node.into())?;
        }

        if !dry_run {
            self.engine.commit()?;
        }
        Ok(IngestionOutcome { patch_node, summary })
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        patch_node: PatchNodeId,
        project_name_set: bool,
        reversed: bool,
        original_files_affected: u64,
        original_lines_added: u64,
        original_lines_removed: u64,
        original_hunks: u64,
        actual_files_affected: u64,
        actual_lines_added: u64,
        actual_lines_removed: u64,
        actual_hunks: u64,
    ) -> Result<PatchSummary, IngestError> {
        let avg_hunk_complexity = PatchSummary::compute_avg_hunk_complexity(original_lines_added, original_lines_removed, original_hunks);

        self.engine
            .set_patch_property(patch_node, "actualFilesAffected", actual_files_affected.into())?;
        self.engine
            .set_patch_property(patch_node, "actualLinesAdded", actual_lines_added.into())?;
        self.engine
            .set_patch_property(patch_node, "actualLinesRemoved", actual_lines_removed.into())?;
        self.engine.set_patch_property(patch_node, "actualHunks", actual_hunks.into())?;
        self.engine
            .set_patch_property(patch_node, "avgHunkComplexity", avg_hunk_complexity.into())?;

        Ok(PatchSummary {
            project_name_set,
            reversed,
            original_files_affected,
            original_lines_added,
            original_lines_removed,
            original_hunks,
            actual_files_affected,
            actual_lines_added,
            actual_lines_removed,
            actual_hunks,
            avg_hunk_complexity,
        })
    }
}

/// Converts one sub-patch's applier resolutions into per-hunk segment
/// lists, running each hunk's drift-corrected start line through
/// [`hunk_parser::parse`] (spec §4.2, §4.3). `DriftTracker` is scoped to
/// exactly one sub-patch's hunks, matching `_process_patch_hunks`'s
/// `global_line_delta` lifetime in `original_source/patch_importer.py`.
///
/// A `Failed` or `Ignored` hunk contributes no segments and does not
/// perturb the drift delta (spec §7: non-fatal, proceed with the rest).
/// Resolutions shorter than `hunks` (the applier emitted fewer lines than
/// there are hunks, e.g. the target file wasn't found at all) pad the
/// remainder as `Ignored`.
fn parse_sub_patch_segments(
    hunks: &[crate::model::Hunk],
    resolution: &SubPatchResolution,
    reversed: bool,
) -> Result<Vec<Vec<Segment>>, IngestError> {
    let mut drift = DriftTracker::new(reversed);
    let mut per_hunk = Vec::with_capacity(hunks.len());
    for (i, hunk) in hunks.iter().enumerate() {
        let resolved = resolution.get(i).copied().unwrap_or(HunkResolution::Ignored);
        match resolved {
            HunkResolution::Applied { line } => {
                let start = drift.adjust(line);
                let body = hunk.lines.join("\n");
                let segments = hunk_parser::parse(&body, start)?;
                drift.record(&segments);
                per_hunk.push(segments);
            }
            HunkResolution::Failed | HunkResolution::Ignored => per_hunk.push(Vec::new()),
        }
    }
    Ok(per_hunk)
}

/// Directory with the same base name as the patch file, sibling to it
/// (spec §6's auxiliary side-car tree).
fn side_car_vulnerable_dir(patch_path: &Path) -> Option<PathBuf> {
    let parent = patch_path.parent()?;
    let stem = patch_path.file_stem()?;
    Some(parent.join(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hunk;

    fn hunk(lines: &[&str]) -> Hunk {
        Hunk {
            original_start_line: 1,
            original_length: lines.len(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn side_car_dir_strips_the_patch_extension() {
        let dir = side_car_vulnerable_dir(Path::new("/patches/CVE-2020-1.patch")).unwrap();
        assert_eq!(dir, PathBuf::from("/patches/CVE-2020-1"));
    }

    #[test]
    fn side_car_dir_is_none_for_a_bare_filename() {
        // A relative path with no parent still has one (""), so this only
        // fails for paths `Path::parent()` truly can't split.
        assert!(side_car_vulnerable_dir(Path::new("/")).is_none());
    }

    #[test]
    fn applied_hunk_uses_drift_adjusted_start() {
        let hunks = vec![hunk(&[" ctx", "-old", "+new"])];
        let resolution = vec![HunkResolution::Applied { line: 10 }];
        let per_hunk = parse_sub_patch_segments(&hunks, &resolution, false).unwrap();
        assert_eq!(per_hunk.len(), 1);
        assert_eq!(
            per_hunk[0],
            vec![Segment::Replace {
                start: 11,
                removed_count: 1,
                added_count: 1,
            }]
        );
    }

    #[test]
    fn failed_and_ignored_hunks_contribute_no_segments_and_no_drift() {
        let hunks = vec![hunk(&["-a", "-b"]), hunk(&["+x"])];
        let resolution = vec![HunkResolution::Failed, HunkResolution::Applied { line: 5 }];
        let per_hunk = parse_sub_patch_segments(&hunks, &resolution, false).unwrap();
        assert!(per_hunk[0].is_empty());
        assert_eq!(per_hunk[1], vec![Segment::Add { start: 5, count: 1 }]);
    }

    #[test]
    fn missing_resolutions_pad_as_ignored() {
        let hunks = vec![hunk(&["+x"]), hunk(&["+y"])];
        let resolution = vec![HunkResolution::Applied { line: 1 }];
        let per_hunk = parse_sub_patch_segments(&hunks, &resolution, false).unwrap();
        assert_eq!(per_hunk.len(), 2);
        assert!(per_hunk[1].is_empty());
    }

    #[test]
    fn reverse_direction_never_accumulates_drift() {
        let hunks = vec![hunk(&["+a", "+b", "+c"]), hunk(&["+d"])];
        let resolution = vec![HunkResolution::Applied { line: 10 }, HunkResolution::Applied { line: 50 }];
        let per_hunk = parse_sub_patch_segments(&hunks, &resolution, true).unwrap();
        // a reverse apply reports already-current coordinates directly, so
        // the second hunk's start is untouched by the first hunk's adds.
        assert_eq!(per_hunk[1], vec![Segment::Add { start: 50, count: 1 }]);
    }
}
