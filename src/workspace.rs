//! WorkspaceManager (spec §4.4): scoped acquisition of a fresh scratch
//! directory, guaranteed release on all exit paths.
//!
//! Grounded on `original_source/patch_importer.py::_copy_affected_files`
//! for the seeding logic. `tempfile` is promoted from a dev-only
//! dependency to a normal one since scratch directories are part of the
//! core pipeline, not just test scaffolding.
use crate::error::WorkspaceError;
use crate::model::SubPatch;
use log::trace;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A per-patch scratch tree. Two separate ingestions never share one: each
/// [`WorkspaceManager`] owns its own [`TempDir`], torn down on `Drop`.
pub struct WorkspaceManager {
    dir: TempDir,
}

impl WorkspaceManager {
    /// Creates a fresh, empty scratch directory.
    pub fn new() -> Result<Self, WorkspaceError> {
        let dir = tempfile::tempdir().map_err(|e| WorkspaceError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// The scratch directory's root path. The external applier is only
    /// ever permitted to write here.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Copies each sub-patch's target file from `source_root` into the
    /// mirrored subpath of the workspace, skipping files that don't exist
    /// in the source (spec §4.4, §7 `FileNotFound` is raised later by the
    /// caller, not here — a missing file is simply not seeded).
    pub fn seed(&self, sub_patches: &[SubPatch], source_root: &Path) -> Result<(), WorkspaceError> {
        for sub_patch in sub_patches {
            let source_path = source_root.join(&sub_patch.target_path);
            if !source_path.is_file() {
                trace!("skipping seed of missing file {}", source_path.display());
                continue;
            }
            let dest_path = self.dir.path().join(&sub_patch.target_path);
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| WorkspaceError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            fs::copy(&source_path, &dest_path).map_err(|e| WorkspaceError::Io {
                path: source_path.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}
