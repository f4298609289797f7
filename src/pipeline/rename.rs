//! Rename planning and application.
//!
//! A paper `science.aav9105.pdf` titled "Observation of Gravitational Waves"
//! becomes `Observation of Gravitational Waves(science.aav9105).pdf`. The
//! original stem always survives in parentheses, so the new name can be
//! traced back to the download and two papers with the same title never
//! collide.
//!
//! ## Title sanitisation
//!
//! Model output goes straight into a filename, so it is cleaned first:
//!
//! | input | output |
//! |-------|--------|
//! | control characters | space |
//! | `:` | ` - ` |
//! | `/` `\` `\|` | `-` |
//! | `"` | `'` |
//! | `<` `>` `?` `*` | dropped |
//! | `(` `)` | `[` `]` |
//!
//! Whitespace runs collapse to one space, leading/trailing spaces and
//! trailing dots are trimmed, and the result is capped at a character limit.
//! [`plan_rename`] then cuts it further, on a char boundary, so the complete
//! name stays within [`MAX_FILE_NAME_BYTES`].
//! Replacing parentheses keeps the first `(` of a planned name at the start
//! of the original stem, which is what [`original_stem_of`] relies on.

use crate::error::RenameError;
use crate::pipeline::classify::ClassificationResult;
use crate::pipeline::normalize::PendingFile;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::info;

/// The old/new path pair for one paper, computed before touching the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

impl RenamePlan {
    /// File name component of `new_path`.
    pub fn new_file_name(&self) -> String {
        self.new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Longest file name, in bytes, accepted by common filesystems (`NAME_MAX`).
pub const MAX_FILE_NAME_BYTES: usize = 255;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Make model-provided title text safe to embed in a filename.
pub fn sanitize_title(title: &str, max_chars: usize) -> String {
    let mut mapped = String::with_capacity(title.len());
    for ch in title.chars() {
        match ch {
            c if c.is_control() => mapped.push(' '),
            ':' => mapped.push_str(" - "),
            '/' | '\\' | '|' => mapped.push('-'),
            '"' => mapped.push('\''),
            '<' | '>' | '?' | '*' => {}
            '(' => mapped.push('['),
            ')' => mapped.push(']'),
            c => mapped.push(c),
        }
    }

    let collapsed = RE_WHITESPACE.replace_all(mapped.trim(), " ");
    let capped: String = collapsed.chars().take(max_chars).collect();
    capped.trim_end_matches([' ', '.']).to_string()
}

/// Longest prefix of `s` that fits in `max_bytes` and ends on a char boundary.
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `"{title}({stem}){extension}"`
pub fn planned_file_name(title: &str, stem: &str, extension: &str) -> String {
    format!("{title}({stem}){extension}")
}

/// Compute where a classified file should go.
///
/// The title is cut so the whole name fits in [`MAX_FILE_NAME_BYTES`] once
/// the stem and extension are appended.
///
/// Returns `None` when the document is not a paper, or when nothing of the
/// title survives sanitisation and the byte budget.
pub fn plan_rename(
    file: &PendingFile,
    result: &ClassificationResult,
    max_title_chars: usize,
) -> Option<RenamePlan> {
    if !result.is_paper {
        return None;
    }
    let title = sanitize_title(&result.title, max_title_chars);
    let suffix_bytes = planned_file_name("", &file.stem, &file.extension).len();
    let budget = MAX_FILE_NAME_BYTES.saturating_sub(suffix_bytes);
    let title = truncate_to_bytes(&title, budget).trim_end_matches([' ', '.']);
    if title.is_empty() {
        return None;
    }
    let name = planned_file_name(title, &file.stem, &file.extension);
    Some(RenamePlan {
        old_path: file.path.clone(),
        new_path: file.directory.join(name),
    })
}

/// Recover the original stem from a planned file name.
///
/// ```
/// use paper_renamer::pipeline::rename::original_stem_of;
///
/// assert_eq!(
///     original_stem_of("Observation of Gravitational Waves(science.aav9105).pdf"),
///     Some("science.aav9105")
/// );
/// ```
pub fn original_stem_of(file_name: &str) -> Option<&str> {
    let open = file_name.find('(')?;
    let close = file_name.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(&file_name[open + 1..close])
}

/// Perform the rename with a single `rename(2)`.
///
/// # Errors
/// * [`RenameError::Duplicate`]: something already exists at `new_path`;
///   the filesystem is left untouched.
/// * [`RenameError::Io`]: the rename itself failed.
pub fn apply(plan: &RenamePlan) -> Result<(), RenameError> {
    if std::fs::symlink_metadata(&plan.new_path).is_ok() {
        return Err(RenameError::Duplicate {
            path: plan.new_path.clone(),
        });
    }

    std::fs::rename(&plan.old_path, &plan.new_path).map_err(|e| RenameError::Io {
        from: plan.old_path.clone(),
        to: plan.new_path.clone(),
        source: e,
    })?;

    info!(
        "Renamed {} → {}",
        plan.old_path.display(),
        plan.new_path.display()
    );
    Ok(())
}
