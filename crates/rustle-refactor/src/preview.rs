use std::collections::{BTreeMap, BTreeSet};

use similar::TextDiff;

use crate::edit::{apply_workspace_edit, EditError, FileId, FileOp, WorkspaceEdit};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Deleted,
    Modified,
    Renamed { from: FileId, to: FileId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePreview {
    pub file: FileId,
    pub change: FileChangeKind,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
    pub edit_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefactoringPreview {
    pub total_files: usize,
    pub total_edits: usize,
    pub file_ops: Vec<FileOp>,
    pub files: Vec<FilePreview>,
}

fn file_text_or_empty<'a>(files: &'a BTreeMap<FileId, String>, file: &FileId) -> &'a str {
    files.get(file).map(String::as_str).unwrap_or("")
}

/// Per-file unified diffs of applying `edit` to `original`. Renames are shown as one diff at
/// the destination path.
pub fn generate_preview(
    original: &BTreeMap<FileId, String>,
    edit: &WorkspaceEdit,
) -> Result<RefactoringPreview, EditError> {
    let mut normalized = edit.clone();
    normalized.normalize()?;

    let modified_files = apply_workspace_edit(original, &normalized)?;

    // Rename mapping (destination -> source).
    let mut rename_dests: BTreeMap<FileId, FileId> = BTreeMap::new();
    let mut rename_sources: BTreeSet<FileId> = BTreeSet::new();
    let mut rename_targets: BTreeSet<FileId> = BTreeSet::new();
    for op in &normalized.file_ops {
        let FileOp::Rename { from, to } = op else {
            continue;
        };
        rename_dests.insert(to.clone(), from.clone());
        rename_sources.insert(from.clone());
        rename_targets.insert(to.clone());
    }

    let mut all_files: BTreeSet<FileId> = BTreeSet::new();
    all_files.extend(original.keys().cloned());
    all_files.extend(modified_files.keys().cloned());
    for from in rename_sources.difference(&rename_targets) {
        all_files.remove(from);
    }

    let mut files = Vec::new();
    for file in all_files {
        let (change, before, after, header_from) = if let Some(from) = rename_dests.get(&file) {
            (
                FileChangeKind::Renamed {
                    from: from.clone(),
                    to: file.clone(),
                },
                file_text_or_empty(original, from),
                file_text_or_empty(&modified_files, &file),
                from.to_string(),
            )
        } else {
            let change = match (original.contains_key(&file), modified_files.contains_key(&file)) {
                (false, true) => FileChangeKind::Created,
                (true, false) => FileChangeKind::Deleted,
                _ => FileChangeKind::Modified,
            };
            (
                change,
                file_text_or_empty(original, &file),
                file_text_or_empty(&modified_files, &file),
                file.to_string(),
            )
        };
        let is_rename = matches!(change, FileChangeKind::Renamed { .. });
        if before == after && !is_rename {
            continue;
        }

        let diff = TextDiff::from_lines(before, after);
        let unified_diff = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a{header_from}"), &format!("b{file}"))
            .to_string();

        let edit_count = normalized
            .text_edits
            .iter()
            .filter(|edit| edit.file == file)
            .count();

        files.push(FilePreview {
            file: file.clone(),
            change,
            original: before.to_string(),
            modified: after.to_string(),
            unified_diff,
            edit_count,
        });
    }

    Ok(RefactoringPreview {
        total_files: files.len(),
        total_edits: normalized.text_edits.len(),
        file_ops: normalized.file_ops.clone(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{TextEdit, TextRange};
    use pretty_assertions::assert_eq;

    #[test]
    fn renamed_file_is_previewed_at_its_destination() {
        let original = BTreeMap::from([
            (FileId::new("/src/a/m.rs"), "fn f() {}\n".to_string()),
            (FileId::new("/src/lib.rs"), "mod a;\n".to_string()),
        ]);
        let edit = WorkspaceEdit {
            file_ops: vec![FileOp::Rename {
                from: FileId::new("/src/a/m.rs"),
                to: FileId::new("/src/b/m.rs"),
            }],
            text_edits: vec![TextEdit::replace(
                FileId::new("/src/lib.rs"),
                TextRange::new(4, 5),
                "b",
            )],
        };

        let preview = generate_preview(&original, &edit).unwrap();
        let changes: Vec<(String, FileChangeKind)> = preview
            .files
            .iter()
            .map(|file| (file.file.to_string(), file.change.clone()))
            .collect();
        assert_eq!(
            changes,
            vec![
                (
                    "/src/b/m.rs".to_string(),
                    FileChangeKind::Renamed {
                        from: FileId::new("/src/a/m.rs"),
                        to: FileId::new("/src/b/m.rs"),
                    }
                ),
                ("/src/lib.rs".to_string(), FileChangeKind::Modified),
            ]
        );
        let lib = &preview.files[1];
        assert!(lib.unified_diff.contains("-mod a;"));
        assert!(lib.unified_diff.contains("+mod b;"));
        assert_eq!(lib.edit_count, 1);
    }
}
