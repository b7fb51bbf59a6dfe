//! FuzzyApplier (spec §4.1): wraps the host's unified-diff applier,
//! tolerating drift between the patch's assumed line numbers and the
//! current on-disk code.
//!
//! Grounded almost line-for-line on
//! `original_source/patch_importer.py::_apply_patch`: same argument list to
//! the external `patch`(1) binary, same stdout state machine.
use crate::error::FuzzyApplyError;
use crate::model::{FuzzyReport, HunkResolution};
use log::trace;
use std::path::Path;
use std::process::{Command, Stdio};

/// Name of the external unified-diff applier, overridable for tests.
#[derive(Debug, Clone)]
pub struct FuzzyApplier {
    binary: String,
}

impl Default for FuzzyApplier {
    fn default() -> Self {
        Self {
            binary: "patch".to_string(),
        }
    }
}

impl FuzzyApplier {
    /// Uses a specific applier binary (e.g. a stub for tests) instead of
    /// the system `patch`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// Applies `patch_path` inside `workspace_root` and returns the
    /// per-hunk resolutions, or [`FuzzyReport::AlreadyApplied`] if the
    /// applier detects the patch is already present.
    ///
    /// `reverse` requests reverse-direction application; `dry_run` asks the
    /// applier not to touch the workspace files.
    pub fn apply(
        &self,
        patch_path: &Path,
        workspace_root: &Path,
        reverse: bool,
        dry_run: bool,
    ) -> Result<FuzzyReport, FuzzyApplyError> {
        let mut args: Vec<String> = vec![
            "--verbose".into(),
            "--ignore-whitespace".into(),
            "--strip".into(),
            "1".into(),
            "-r".into(),
            std::env::consts::OS
                .eq("windows")
                .then(|| "NUL".to_string())
                .unwrap_or_else(|| "/dev/null".to_string()),
            "-d".into(),
            workspace_root.display().to_string(),
            "-i".into(),
            patch_path.display().to_string(),
        ];
        if dry_run {
            args.push("--dry-run".into());
        }
        if reverse {
            args.push("-R".into());
            args.push("-f".into());
        }

        trace!("invoking {} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| FuzzyApplyError::Spawn {
                binary: self.binary.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8(output.stdout)?;
        match parse_applier_output(&stdout, reverse)? {
            Some(report) => Ok(report),
            None => {
                // No recognized terminal state was reached. Treat a
                // non-zero, otherwise-unparseable exit as fatal; a
                // zero exit with no hunks reported is a clean no-op
                // (e.g. the patch file was empty).
                if output.status.success() {
                    Ok(FuzzyReport::Resolved(Vec::new()))
                } else {
                    Err(FuzzyApplyError::ExternalToolFailure {
                        status: output.status.code().unwrap_or(-1),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    })
                }
            }
        }
    }
}

/// Parses the applier's stdout progress stream per spec §4.1.
///
/// Returns `Ok(None)` when the stream contained no recognized terminal
/// marker (caller falls back to the process exit code).
fn parse_applier_output(stdout: &str, reverse: bool) -> Result<Option<FuzzyReport>, FuzzyApplyError> {
    let mut sub_patches: Vec<Vec<HunkResolution>> = Vec::new();
    let mut any_hunk_line = false;

    for line in stdout.lines() {
        if line.starts_with("Reversed") {
            if reverse {
                return Err(FuzzyApplyError::DoubleReverse);
            }
            return Ok(Some(FuzzyReport::AlreadyApplied));
        }

        if line.starts_with("Hunk #1 ") {
            sub_patches.push(Vec::new());
            any_hunk_line = true;
        } else if line.starts_with("Hunk") {
            any_hunk_line = true;
            if sub_patches.is_empty() {
                // A continuation line arrived before any "Hunk #1 " line;
                // this can't happen with a well-formed applier, but don't
                // panic on an empty vec.
                sub_patches.push(Vec::new());
            }
        } else {
            continue;
        }

        if !line.starts_with("Hunk") {
            continue;
        }

        let current = sub_patches.last_mut().expect("just pushed or populated above");
        if line.contains("FAILED") {
            current.push(HunkResolution::Failed);
        } else if line.contains("ignored") {
            current.push(HunkResolution::Ignored);
        } else if let Some(line_no) = extract_at_line(line) {
            current.push(HunkResolution::Applied { line: line_no });
        }
    }

    if any_hunk_line {
        Ok(Some(FuzzyReport::Resolved(sub_patches)))
    } else {
        Ok(None)
    }
}

/// Extracts the integer following the token `at ` in a `patch` progress line.
fn extract_at_line(line: &str) -> Option<usize> {
    let idx = line.find("at ")?;
    let rest = &line[idx + 3..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_applied_hunks() {
        let stdout = "Hunk #1 succeeded at 11.\nHunk #2 succeeded at 42.\n";
        let report = parse_applier_output(stdout, false).unwrap().unwrap();
        match report {
            FuzzyReport::Resolved(v) => {
                assert_eq!(v.len(), 1);
                assert_eq!(
                    v[0],
                    vec![
                        HunkResolution::Applied { line: 11 },
                        HunkResolution::Applied { line: 42 }
                    ]
                );
            }
            _ => panic!("expected Resolved"),
        }
    }

    #[test]
    fn hunk_ten_does_not_trigger_new_subpatch() {
        let stdout = "Hunk #1 succeeded at 5.\nHunk #10 succeeded at 1234.\n";
        let report = parse_applier_output(stdout, false).unwrap().unwrap();
        match report {
            FuzzyReport::Resolved(v) => {
                assert_eq!(v.len(), 1);
                assert_eq!(v[0].len(), 2);
            }
            _ => panic!("expected Resolved"),
        }
    }

    #[test]
    fn failed_and_ignored_hunks_are_recorded() {
        let stdout = "Hunk #1 FAILED at 3.\nHunk #2 ignored.\n";
        let report = parse_applier_output(stdout, false).unwrap().unwrap();
        match report {
            FuzzyReport::Resolved(v) => {
                assert_eq!(v[0], vec![HunkResolution::Failed, HunkResolution::Ignored]);
            }
            _ => panic!("expected Resolved"),
        }
    }

    #[test]
    fn already_applied_is_detected() {
        let stdout = "Reversed (or previously applied) patch detected!  Assume -R? [n]\n";
        let report = parse_applier_output(stdout, false).unwrap().unwrap();
        assert_eq!(report, FuzzyReport::AlreadyApplied);
    }

    #[test]
    fn double_reverse_is_an_error() {
        let stdout = "Reversed (or previously applied) patch detected!  Assume -R? [n]\n";
        let err = parse_applier_output(stdout, true).unwrap_err();
        assert!(matches!(err, FuzzyApplyError::DoubleReverse));
    }

    #[test]
    fn multiple_sub_patches_separated_by_hunk_1() {
        let stdout = "Hunk #1 succeeded at 10.\nHunk #1 succeeded at 20.\nHunk #2 succeeded at 30.\n";
        let report = parse_applier_output(stdout, false).unwrap().unwrap();
        match report {
            FuzzyReport::Resolved(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[0], vec![HunkResolution::Applied { line: 10 }]);
                assert_eq!(
                    v[1],
                    vec![
                        HunkResolution::Applied { line: 20 },
                        HunkResolution::Applied { line: 30 }
                    ]
                );
            }
            _ => panic!("expected Resolved"),
        }
    }
}
