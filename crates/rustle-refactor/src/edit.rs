use std::collections::BTreeMap;

use thiserror::Error;

pub use rustle_resolve::FileId;
pub use rustle_syntax::TextRange;

/// A single file edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEdit {
    pub file: FileId,
    pub range: TextRange,
    pub replacement: String,
}

impl TextEdit {
    pub fn insert(file: FileId, offset: usize, text: impl Into<String>) -> Self {
        Self {
            file,
            range: TextRange::new(offset, offset),
            replacement: text.into(),
        }
    }

    pub fn replace(file: FileId, range: TextRange, text: impl Into<String>) -> Self {
        Self {
            file,
            range,
            replacement: text.into(),
        }
    }

    pub fn delete(file: FileId, range: TextRange) -> Self {
        Self {
            file,
            range,
            replacement: String::new(),
        }
    }
}

/// A file-level operation. Applied before text edits; text edits address files by their
/// post-operation names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Rename { from: FileId, to: FileId },
    Create { file: FileId, contents: String },
    Delete { file: FileId },
}

/// A set of edits across potentially multiple files.
///
/// The edits are expected to be normalized (sorted, deduplicated, non-overlapping)
/// before being applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceEdit {
    pub file_ops: Vec<FileOp>,
    pub text_edits: Vec<TextEdit>,
}

impl WorkspaceEdit {
    pub fn new(text_edits: Vec<TextEdit>) -> Self {
        Self {
            file_ops: Vec::new(),
            text_edits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file_ops.is_empty() && self.text_edits.is_empty()
    }

    /// Returns edits grouped by file in deterministic order.
    pub fn edits_by_file(&self) -> BTreeMap<&FileId, Vec<&TextEdit>> {
        let mut map: BTreeMap<&FileId, Vec<&TextEdit>> = BTreeMap::new();
        for edit in &self.text_edits {
            map.entry(&edit.file).or_default().push(edit);
        }
        for edits in map.values_mut() {
            edits.sort_by(|a, b| {
                a.range
                    .start
                    .cmp(&b.range.start)
                    .then_with(|| a.range.end.cmp(&b.range.end))
                    .then_with(|| a.replacement.cmp(&b.replacement))
            });
        }
        map
    }

    /// Normalize edits (sort, deduplicate, and validate non-overlap).
    ///
    /// Inserts at the same position are merged in replacement order, so independently added
    /// `use` lines come out sorted.
    pub fn normalize(&mut self) -> Result<(), EditError> {
        self.text_edits.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.range.start.cmp(&b.range.start))
                .then_with(|| a.range.end.cmp(&b.range.end))
                .then_with(|| a.replacement.cmp(&b.replacement))
        });

        // Exact duplicates are redundant.
        self.text_edits
            .dedup_by(|a, b| a.file == b.file && a.range == b.range && a.replacement == b.replacement);

        let mut merged: Vec<TextEdit> = Vec::with_capacity(self.text_edits.len());
        for edit in self.text_edits.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.file == edit.file && last.range == edit.range && last.range.is_empty() {
                    last.replacement.push_str(&edit.replacement);
                    continue;
                }

                if last.file == edit.file && last.range == edit.range {
                    return Err(EditError::OverlappingEdits {
                        file: edit.file,
                        first: last.range,
                        second: edit.range,
                    });
                }
            }
            merged.push(edit);
        }

        self.text_edits = merged;

        // Validate non-overlap per file.
        let mut current_file: Option<&FileId> = None;
        let mut prev: Option<TextRange> = None;
        for edit in &self.text_edits {
            if edit.range.start > edit.range.end {
                return Err(EditError::InvalidRange {
                    file: edit.file.clone(),
                    range: edit.range,
                });
            }

            if current_file.map(|f| f != &edit.file).unwrap_or(true) {
                current_file = Some(&edit.file);
                prev = None;
            }

            if let Some(prev_range) = prev {
                if edit.range.start < prev_range.end {
                    return Err(EditError::OverlappingEdits {
                        file: edit.file.clone(),
                        first: prev_range,
                        second: edit.range,
                    });
                }
            }

            prev = Some(edit.range);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("invalid text range {range:?} in {file}")]
    InvalidRange { file: FileId, range: TextRange },
    #[error("overlapping edits in {file}: {first:?} overlaps {second:?}")]
    OverlappingEdits {
        file: FileId,
        first: TextRange,
        second: TextRange,
    },
    #[error("text edit range {range:?} is outside the file bounds (len={len}) in {file}")]
    OutOfBounds {
        file: FileId,
        range: TextRange,
        len: usize,
    },
    #[error("unknown file {0}")]
    UnknownFile(FileId),
    #[error("file already exists: {0}")]
    FileAlreadyExists(FileId),
}

/// Apply a set of edits to `original` and return the modified text.
///
/// The input edits must be non-overlapping and valid for the `original` text.
pub fn apply_text_edits(original: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(original.to_string());
    }

    let mut sorted = edits.to_vec();
    sorted.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then_with(|| b.range.end.cmp(&a.range.end))
            .then_with(|| b.replacement.cmp(&a.replacement))
    });

    let mut out = original.to_string();
    for edit in sorted {
        let len = out.len();
        if edit.range.end > len
            || edit.range.start > edit.range.end
            || !out.is_char_boundary(edit.range.start)
            || !out.is_char_boundary(edit.range.end)
        {
            return Err(EditError::OutOfBounds {
                file: edit.file,
                range: edit.range,
                len,
            });
        }

        out.replace_range(edit.range.start..edit.range.end, &edit.replacement);
    }

    Ok(out)
}

/// Apply file operations and text edits to an in-memory file map.
pub fn apply_workspace_edit(
    original: &BTreeMap<FileId, String>,
    edit: &WorkspaceEdit,
) -> Result<BTreeMap<FileId, String>, EditError> {
    let mut normalized = edit.clone();
    normalized.normalize()?;

    let mut files = original.clone();
    for op in &normalized.file_ops {
        match op {
            FileOp::Rename { from, to } => {
                if files.contains_key(to) {
                    return Err(EditError::FileAlreadyExists(to.clone()));
                }
                let text = files
                    .remove(from)
                    .ok_or_else(|| EditError::UnknownFile(from.clone()))?;
                files.insert(to.clone(), text);
            }
            FileOp::Create { file, contents } => {
                if files.contains_key(file) {
                    return Err(EditError::FileAlreadyExists(file.clone()));
                }
                files.insert(file.clone(), contents.clone());
            }
            FileOp::Delete { file } => {
                files
                    .remove(file)
                    .ok_or_else(|| EditError::UnknownFile(file.clone()))?;
            }
        }
    }

    for (file, edits) in normalized.edits_by_file() {
        let text = files
            .get(file)
            .ok_or_else(|| EditError::UnknownFile(file.clone()))?;
        let edits: Vec<TextEdit> = edits.into_iter().cloned().collect();
        let updated = apply_text_edits(text, &edits)?;
        files.insert(file.clone(), updated);
    }

    Ok(files)
}

/// Express the difference between two file maps as renames plus one full-document replacement
/// per changed file.
pub fn diff_as_workspace_edit(
    original: &BTreeMap<FileId, String>,
    modified: &BTreeMap<FileId, String>,
    renames: &[(FileId, FileId)],
) -> Result<WorkspaceEdit, EditError> {
    let mut out = WorkspaceEdit::default();
    let mut renamed_to: BTreeMap<&FileId, &FileId> = BTreeMap::new();
    for (from, to) in renames {
        out.file_ops.push(FileOp::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        renamed_to.insert(to, from);
    }

    for (file, new_text) in modified {
        let old_name = renamed_to.get(file).copied().unwrap_or(file);
        match original.get(old_name) {
            Some(old_text) if old_text == new_text => {}
            Some(old_text) => out.text_edits.push(TextEdit::replace(
                file.clone(),
                TextRange::new(0, old_text.len()),
                new_text.clone(),
            )),
            None => out.file_ops.push(FileOp::Create {
                file: file.clone(),
                contents: new_text.clone(),
            }),
        }
    }
    for file in original.keys() {
        let renamed_away = renames.iter().any(|(from, _)| from == file);
        if !renamed_away && !modified.contains_key(file) {
            out.file_ops.push(FileOp::Delete { file: file.clone() });
        }
    }

    out.normalize()?;
    Ok(out)
}

/// Grow `range` to whole lines (trailing newline included) when nothing else shares them.
pub(crate) fn whole_lines(text: &str, range: TextRange) -> TextRange {
    let start = rustle_syntax::line_start(text, range.start);
    if !text[start..range.start].trim().is_empty() {
        return range;
    }
    let rest = &text[range.end..];
    let line_end = rest.find('\n').map(|idx| range.end + idx + 1).unwrap_or(text.len());
    if !text[range.end..line_end].trim().is_empty() {
        return range;
    }
    TextRange::new(start, line_end)
}
