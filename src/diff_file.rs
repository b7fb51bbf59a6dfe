//! Parses a unified-diff file on disk into a [`PatchFile`] (spec §3, §6).
//!
//! A single pass over `.lines()` accumulates into `current_*` state
//! variables, flushed whenever a new section header appears, rather than
//! building an AST with a dedicated grammar. No markdown fence to look
//! for here; sections are delimited by lines starting with `diff `.
use crate::error::DiffParseError;
use crate::model::{Hunk, PatchFile, SubPatch};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads `path` and parses it as a unified-diff file.
///
/// # Errors
///
/// Returns [`DiffParseError::Io`] if the file can't be read, or
/// [`DiffParseError::MissingFileHeader`] if a `diff `-scoped section
/// contains hunk lines but never declares a `--- `/`+++ ` target path.
pub fn parse_patch_file(path: &Path) -> Result<PatchFile, DiffParseError> {
    let content = fs::read_to_string(path).map_err(|e| DiffParseError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_patch_content(path, &content)
}

fn parse_patch_content(path: &Path, content: &str) -> Result<PatchFile, DiffParseError> {
    let mut lines = content.lines().peekable();

    // The description is everything up to (not including) the first line
    // starting with "diff ". If no such line exists, the whole file is
    // treated as a single section and the description is empty.
    let mut description_lines = Vec::new();
    while let Some(line) = lines.peek() {
        if line.starts_with("diff ") {
            break;
        }
        description_lines.push(*line);
        lines.next();
    }
    let description = description_lines.join("\n").trim().to_string();

    let mut sub_patches: Vec<SubPatch> = Vec::new();

    let mut current_target: Option<PathBuf> = None;
    let mut current_hunks: Vec<Hunk> = Vec::new();
    let mut current_hunk_lines: Vec<String> = Vec::new();
    let mut current_hunk_header: Option<(usize, usize)> = None;
    let mut saw_any_header_in_section = false;

    macro_rules! flush_hunk {
        () => {
            if let Some((start, len)) = current_hunk_header.take() {
                current_hunks.push(Hunk {
                    original_start_line: start,
                    original_length: len,
                    lines: std::mem::take(&mut current_hunk_lines),
                });
            }
        };
    }

    macro_rules! flush_section {
        () => {
            flush_hunk!();
            if let Some(target) = current_target.take() {
                if !current_hunks.is_empty() {
                    sub_patches.push(SubPatch {
                        target_path: target,
                        hunks: std::mem::take(&mut current_hunks),
                    });
                }
            } else if !current_hunks.is_empty() {
                return Err(DiffParseError::MissingFileHeader {
                    path: path.to_path_buf(),
                });
            }
            saw_any_header_in_section = false;
        };
    }

    for line in lines {
        if line.starts_with("diff ") {
            flush_section!();
            continue;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            // A new `---` line always starts a fresh target path, even
            // within the same `diff ` section (multiple sub-patches can
            // share one `diff --git` preamble in some generators).
            if saw_any_header_in_section {
                flush_section!();
            }
            let path_part = rest.trim();
            if path_part != "/dev/null" {
                let stripped = path_part.strip_prefix("a/").unwrap_or(path_part);
                current_target = Some(PathBuf::from(stripped));
            }
            saw_any_header_in_section = true;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            if current_target.is_none() {
                let path_part = rest.trim();
                let stripped = path_part.strip_prefix("b/").unwrap_or(path_part);
                current_target = Some(PathBuf::from(stripped));
            }
            saw_any_header_in_section = true;
        } else if let Some(rest) = line.strip_prefix("@@") {
            flush_hunk!();
            current_hunk_header = Some(parse_hunk_header(rest).unwrap_or((0, 0)));
        } else if line.starts_with(['+', '-', ' ']) {
            current_hunk_lines.push(line.to_string());
        }
        // Lines like `\ No newline at end of file` or stray preamble
        // text are ignored; they carry no information this model needs.
    }
    flush_section!();

    Ok(PatchFile {
        path: path.to_path_buf(),
        description,
        sub_patches,
    })
}

/// Parses the `-l,s` half of a `@@ -l,s +l,s @@` header.
fn parse_hunk_header(rest: &str) -> Option<(usize, usize)> {
    let minus_part = rest.split(' ').find(|s| s.starts_with('-'))?;
    let minus_part = minus_part.strip_prefix('-')?;
    let mut parts = minus_part.splitn(2, ',');
    let start = parts.next()?.parse().ok()?;
    let len = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    Some((start, len))
}
