//! Cutting the moved declarations out of the source module and pasting them into the target.

use rustle_resolve::{Analysis, FileId, ModuleId};
use rustle_syntax::{line_indent, line_start, TextRange};

use crate::context::ElementToMove;
use crate::edit::{whole_lines, FileOp, TextEdit, WorkspaceEdit};
use crate::relocation::{MovedRegion, RelocationStep};
use crate::MoveError;

const INDENT_UNIT: &str = "    ";

/// The edits of the physical move and how offsets travel through it.
#[derive(Clone, Debug)]
pub struct PhysicalMove {
    pub edit: WorkspaceEdit,
    pub relocation: RelocationStep,
}

struct Piece {
    file: FileId,
    /// The declaration with its doc comments and attributes.
    range: TextRange,
    /// Lines that go away with it.
    cut: TextRange,
    text: String,
    indent: String,
}

/// Start of the `///` lines directly above `offset`.
fn doc_comment_start(text: &str, offset: usize) -> usize {
    let mut start = line_start(text, offset);
    if !text[start..offset].trim().is_empty() {
        return offset;
    }
    while start > 0 {
        let previous = line_start(text, start - 1);
        let line = text[previous..start].trim();
        if !line.starts_with("///") {
            break;
        }
        start = previous;
    }
    if start == line_start(text, offset) {
        offset
    } else {
        start + line_indent(text, start).len()
    }
}

/// Re-indent `text` from `from` to `to`, leaving its first line alone. Returns the new text and
/// the cumulative growth per line start (relative to `text`).
fn reindent(text: &str, from: &str, to: &str) -> (String, Vec<(usize, isize)>) {
    let mut out = String::with_capacity(text.len());
    let mut shifts = Vec::new();
    let mut growth: isize = 0;
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if idx == 0 || line.trim().is_empty() {
            out.push_str(line);
            offset += line.len();
            continue;
        }
        let stripped = line.strip_prefix(from).unwrap_or(line);
        growth += to.len() as isize - (line.len() - stripped.len()) as isize;
        shifts.push((offset, growth));
        out.push_str(to);
        out.push_str(stripped);
        offset += line.len();
    }
    (out, shifts)
}

fn piece(analysis: &Analysis, element: ElementToMove) -> Result<Piece, MoveError> {
    let item = element
        .item(analysis)
        .ok_or(MoveError::CannotMoveCrateRoot)?;
    let data = analysis.item(item);
    let text = analysis
        .file_text(&data.file)
        .ok_or_else(|| MoveError::UnsupportedElement(data.file.to_string()))?;
    let start = doc_comment_start(text, data.range.start);
    let range = TextRange::new(start, data.range.end);
    Ok(Piece {
        file: data.file.clone(),
        range,
        cut: whole_lines(text, range),
        text: range.slice(text).to_string(),
        indent: line_indent(text, start).to_string(),
    })
}

/// Where pasted declarations go in `target`, their indentation and the text around them.
struct Destination {
    file: FileId,
    offset: usize,
    indent: String,
    lead: String,
    trail: String,
}

fn destination(analysis: &Analysis, target: ModuleId) -> Destination {
    let data = analysis.module(target);
    let text = analysis.file_text(&data.file).unwrap_or("");
    match data.body {
        Some(body) => {
            let brace = body.r_brace.start;
            let brace_line = line_start(text, brace);
            let brace_indent = line_indent(text, brace).to_string();
            let indent = format!("{brace_indent}{INDENT_UNIT}");
            let has_items = !text[body.items_start..brace].trim().is_empty();
            if text[brace_line..brace].trim().is_empty() {
                Destination {
                    file: data.file.clone(),
                    offset: brace_line,
                    indent,
                    lead: if has_items { "\n".to_string() } else { String::new() },
                    trail: "\n".to_string(),
                }
            } else {
                Destination {
                    file: data.file.clone(),
                    offset: brace,
                    indent,
                    lead: "\n".to_string(),
                    trail: format!("\n{brace_indent}"),
                }
            }
        }
        None => {
            let lead = if text.trim().is_empty() {
                ""
            } else if text.ends_with("\n\n") {
                ""
            } else if text.ends_with('\n') {
                "\n"
            } else {
                "\n\n"
            };
            Destination {
                file: data.file.clone(),
                offset: text.len(),
                indent: String::new(),
                lead: lead.to_string(),
                trail: "\n".to_string(),
            }
        }
    }
}

/// New file names for the files of moved file modules (the module's own file and every file
/// below its directory).
fn file_renames(
    analysis: &Analysis,
    elements: &[ElementToMove],
    target: ModuleId,
) -> Vec<(FileId, FileId)> {
    let mut renames = Vec::new();
    let target_dir = analysis.module_dir(target);
    for element in elements {
        let ElementToMove::Mod(module) = *element else {
            continue;
        };
        let Some(name) = analysis.module(module).name.as_deref() else {
            continue;
        };
        let old_dir = analysis.module_dir(module);
        let new_dir = format!("{target_dir}{name}/");
        for descendant in analysis.module_ids() {
            let data = analysis.module(descendant);
            if !data.is_file_root() || !analysis.is_ancestor(module, descendant) {
                continue;
            }
            let file = data.file.as_str();
            let renamed = if descendant == module && !file.ends_with("/mod.rs") {
                format!("{target_dir}{name}.rs")
            } else if let Some(rest) = file.strip_prefix(old_dir) {
                format!("{new_dir}{rest}")
            } else {
                tracing::warn!(%file, "file module outside of its module directory");
                continue;
            };
            renames.push((data.file.clone(), FileId::new(renamed)));
        }
    }
    renames
}

/// Cut the declarations of `elements` and paste them at the end of `target`, renaming the files
/// of moved file modules to match their new place.
pub fn move_elements(
    analysis: &Analysis,
    elements: &[ElementToMove],
    target: ModuleId,
) -> Result<PhysicalMove, MoveError> {
    let mut pieces = elements
        .iter()
        .map(|&element| piece(analysis, element))
        .collect::<Result<Vec<_>, _>>()?;
    pieces.sort_by_key(|piece| (piece.file.clone(), piece.range.start));

    let dest = destination(analysis, target);
    let mut insertion = dest.lead.clone();
    let mut regions = Vec::new();
    let mut edits = Vec::new();
    for (idx, piece) in pieces.iter().enumerate() {
        if idx > 0 {
            insertion.push('\n');
        }
        insertion.push_str(&dest.indent);
        let (text, line_shifts) = reindent(&piece.text, &piece.indent, &dest.indent);
        regions.push(MovedRegion {
            file: piece.file.clone(),
            range: piece.range,
            dest_file: dest.file.clone(),
            dest_offset: dest.offset,
            offset_in_insertion: insertion.len(),
            line_shifts,
        });
        insertion.push_str(&text);
        insertion.push('\n');
        edits.push(TextEdit::delete(piece.file.clone(), piece.cut));
    }
    // The last line break comes from `trail`.
    insertion.pop();
    insertion.push_str(&dest.trail);
    edits.push(TextEdit::insert(dest.file.clone(), dest.offset, insertion));

    let renames = file_renames(analysis, elements, target);
    let edit = WorkspaceEdit {
        file_ops: renames
            .into_iter()
            .map(|(from, to)| FileOp::Rename { from, to })
            .collect(),
        text_edits: edits,
    };
    let relocation = RelocationStep::from_edit(&edit).with_regions(regions);
    tracing::debug!(
        pieces = pieces.len(),
        renames = edit.file_ops.len(),
        "physical move"
    );
    Ok(PhysicalMove { edit, relocation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_workspace_edit;
    use pretty_assertions::assert_eq;
    use rustle_resolve::Def;

    #[test]
    fn items_move_into_inline_modules_with_their_docs() {
        let text = "mod a {\n    /// Docs.\n    pub struct S {\n        x: u8,\n    }\n    fn keep() {}\n}\nmod b {\n    fn other() {}\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(s) = analysis.def_by_path("crate::a::S").unwrap() else {
            panic!("expected an item");
        };

        let moved = move_elements(&analysis, &[ElementToMove::Item(s)], b).unwrap();
        let files = apply_workspace_edit(analysis.files(), &moved.edit).unwrap();
        let updated = &files[&FileId::new("/src/lib.rs")];
        assert_eq!(
            updated,
            "mod a {\n    fn keep() {}\n}\nmod b {\n    fn other() {}\n\n    /// Docs.\n    pub struct S {\n        x: u8,\n    }\n}\n"
        );

        // `x` keeps pointing at the field.
        let x = text.find("x: u8").unwrap();
        let (file, mapped) = moved.relocation.map_offset(&FileId::new("/src/lib.rs"), x).unwrap();
        assert_eq!(file, FileId::new("/src/lib.rs"));
        assert_eq!(&updated[mapped..mapped + 5], "x: u8");
    }

    #[test]
    fn nested_items_are_reindented() {
        let text = "mod a {\n    mod inner {\n        pub fn f() {\n            g();\n        }\n    }\n}\nmod b {}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(f) = analysis.def_by_path("crate::a::inner::f").unwrap() else {
            panic!("expected an item");
        };

        let moved = move_elements(&analysis, &[ElementToMove::Item(f)], b).unwrap();
        let files = apply_workspace_edit(analysis.files(), &moved.edit).unwrap();
        let updated = &files[&FileId::new("/src/lib.rs")];
        assert_eq!(
            updated,
            "mod a {\n    mod inner {\n    }\n}\nmod b {\n    pub fn f() {\n        g();\n    }\n}\n"
        );
        let g = text.find("g()").unwrap();
        let (_, mapped) = moved.relocation.map_offset(&FileId::new("/src/lib.rs"), g).unwrap();
        assert_eq!(&updated[mapped..mapped + 3], "g()");
    }

    #[test]
    fn file_modules_are_renamed_with_their_children() {
        let analysis = Analysis::from_files([
            ("/src/lib.rs", "mod a;\nmod b;\n"),
            ("/src/a.rs", "pub mod m;\n"),
            ("/src/a/m.rs", "pub mod deep;\n"),
            ("/src/a/m/deep.rs", "pub fn f() {}\n"),
            ("/src/b.rs", ""),
        ]);
        let b = analysis.module_by_path("crate::b").unwrap();
        let m = analysis.module_by_path("crate::a::m").unwrap();

        let moved = move_elements(&analysis, &[ElementToMove::Mod(m)], b).unwrap();
        let files = apply_workspace_edit(analysis.files(), &moved.edit).unwrap();
        let names: Vec<&str> = files.keys().map(FileId::as_str).collect();
        assert_eq!(
            names,
            vec!["/src/a.rs", "/src/b.rs", "/src/b/m.rs", "/src/b/m/deep.rs", "/src/lib.rs"]
        );
        assert_eq!(files[&FileId::new("/src/a.rs")], "");
        assert_eq!(files[&FileId::new("/src/b.rs")], "pub mod m;\n");
    }
}
