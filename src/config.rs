//! Runtime configuration (spec §9's Open Question decisions; SPEC_FULL §3,
//! §4.7, §9). Kept a plain struct, not parsed from a file: the CLI (§9
//! surface) is the only source of these values today.
use std::collections::HashSet;

/// How [`crate::orchestrator::IngestionOrchestrator`] handles a patch whose
/// ingestion connected zero CPG nodes (spec §4.6, §9 Open Question 1).
///
/// `original_source/patch_importer.py` carries both code paths with the
/// delete path commented out; this crate makes the choice an explicit,
/// testable toggle instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Keep the PatchNode, with all `actual*` counters at zero. Default:
    /// matches `original_source/patch_importer.py`'s de facto behavior.
    #[default]
    Zero,
    /// Remove the PatchNode and everything it owns.
    Delete,
}

/// File extensions eligible for the side-car vulnerable-code import path
/// (spec §4.6, §9 Open Question 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExtensions(HashSet<String>);

impl Default for SourceExtensions {
    fn default() -> Self {
        Self(["c", "cpp", "h"].iter().map(|s| s.to_string()).collect())
    }
}

impl SourceExtensions {
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        Self(extensions.into_iter().collect())
    }

    /// Whether `path`'s extension (without the leading dot) is eligible.
    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension().and_then(|e| e.to_str()).map(|e| self.0.contains(e)).unwrap_or(false)
    }
}

/// Knobs threaded through [`crate::scheduler::BatchScheduler`] and
/// [`crate::orchestrator::IngestionOrchestrator`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded worker pool size (spec §4.7 default `N=8`).
    pub concurrency: usize,
    /// Spec §9 Open Question 2: `None` preserves the full relative path
    /// when querying CPG file nodes; `Some(n)` truncates the query to the
    /// last `n` characters, matching the original's `filepath[-100:]`.
    pub truncate_path_suffix: Option<usize>,
    pub source_extensions: SourceExtensions,
    pub rollback_policy: RollbackPolicy,
    /// Name of the external unified-diff applier binary (spec §6).
    pub patch_binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            truncate_path_suffix: None,
            source_extensions: SourceExtensions::default(),
            rollback_policy: RollbackPolicy::default(),
            patch_binary: "patch".to_string(),
        }
    }
}
