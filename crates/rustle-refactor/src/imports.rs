//! Building text edits against one snapshot, with `use`-aware operations.
//!
//! Edits to `use` items are collected per item and rendered once, so removing several entries
//! from the same group, rewriting a prefix and splitting entries out all compose.

use std::collections::{BTreeMap, BTreeSet};

use rustle_resolve::{Analysis, Def, DefKind, FileId, ItemId, ModuleId, Scope, UseBinding};
use rustle_syntax::{is_keyword, line_indent, parse_path_text, TextRange, UseTree, UseTreeKind};

use crate::edit::{whole_lines, EditError, TextEdit, WorkspaceEdit};

#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingImport {
    name: String,
    path: String,
}

#[derive(Debug, Default)]
struct UseRewrite {
    delete: bool,
    /// Tree indices of group entries to drop.
    removed: Vec<Vec<usize>>,
    replacements: Vec<(TextRange, String)>,
    /// New `use` items (tree text only) to place after this one.
    split_out: Vec<String>,
}

/// Collects edits for one pass over a snapshot and turns them into a [`WorkspaceEdit`].
pub struct EditBuilder<'a> {
    analysis: &'a Analysis,
    edits: Vec<TextEdit>,
    uses: BTreeMap<ItemId, UseRewrite>,
    imports: BTreeMap<ModuleId, Vec<PendingImport>>,
    changes: usize,
}

/// Name an import binds and the path it imports, for `path` or `path as alias`.
fn import_parts(import: &str) -> Option<(&str, String)> {
    let (path, alias) = match import.split_once(" as ") {
        Some((path, alias)) => (path.trim(), Some(alias.trim())),
        None => (import.trim(), None),
    };
    let name = match alias {
        Some(alias) => alias.to_string(),
        None => parse_path_text(path)?.segments.last()?.name.text.clone(),
    };
    Some((path, name))
}

impl<'a> EditBuilder<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            edits: Vec::new(),
            uses: BTreeMap::new(),
            imports: BTreeMap::new(),
            changes: 0,
        }
    }

    pub fn analysis(&self) -> &'a Analysis {
        self.analysis
    }

    /// Number of requested changes that were not no-ops.
    pub fn changes(&self) -> usize {
        self.changes
    }

    fn is_unchanged(&self, file: &FileId, range: TextRange, text: &str) -> bool {
        self.analysis
            .file_text(file)
            .is_some_and(|current| range.slice(current) == text)
    }

    /// Replace text outside of `use` items.
    pub fn replace(&mut self, file: &FileId, range: TextRange, text: &str) {
        if self.is_unchanged(file, range, text) {
            return;
        }
        self.edits.push(TextEdit::replace(file.clone(), range, text));
        self.changes += 1;
    }

    /// Replace text inside the `use` item `item`.
    pub fn replace_in_use(&mut self, item: ItemId, range: TextRange, text: &str) {
        if self.is_unchanged(&self.analysis.item(item).file, range, text) {
            return;
        }
        let rewrite = self.uses.entry(item).or_default();
        if !rewrite.replacements.iter().any(|(existing, _)| *existing == range) {
            rewrite.replacements.push((range, text.to_string()));
            self.changes += 1;
        }
    }

    /// Remove the `use` item `item` entirely.
    pub fn delete_use(&mut self, item: ItemId) {
        let rewrite = self.uses.entry(item).or_default();
        if !rewrite.delete {
            rewrite.delete = true;
            self.changes += 1;
        }
    }

    /// Drop the group entry at `tree_index` from `item`, adding `new_entry` as a separate `use`
    /// right after it.
    pub fn split_use_entry(&mut self, item: ItemId, tree_index: &[usize], new_entry: Option<String>) {
        let rewrite = self.uses.entry(item).or_default();
        if !rewrite.removed.iter().any(|existing| existing == tree_index) {
            rewrite.removed.push(tree_index.to_vec());
        }
        if let Some(entry) = new_entry {
            if !rewrite.split_out.contains(&entry) {
                rewrite.split_out.push(entry);
            }
        }
        self.changes += 1;
    }

    /// Whether importing something bound as `name` into `scope` would clash with an existing
    /// name or an import added by this builder. `def` is what the import would bring in.
    pub fn import_collides(&self, scope: Scope, name: &str, def: Option<Def>) -> bool {
        if let Some(binding) = self.analysis.lookup_name(scope, name) {
            if def != Some(binding.def) {
                return true;
            }
        }
        let module_scope = Scope::module(scope.module);
        self.imports.get(&scope.module).is_some_and(|pending| {
            pending.iter().any(|import| {
                import.name == name
                    && import_parts(&import.path).and_then(|(path, _)| {
                        self.analysis.resolve_text(module_scope, path)
                    }) != def
            })
        })
    }

    /// Add `use <import>;` at module level of `scope`'s module, unless the same name is already
    /// bound to the same thing there. Returns whether an import was added.
    pub fn add_import(&mut self, scope: Scope, import: &str) -> bool {
        let module = scope.module;
        let Some((path, name)) = import_parts(import) else {
            tracing::error!(%import, "not an importable path");
            return false;
        };
        if is_keyword(&name) {
            return false;
        }
        let module_scope = Scope::module(module);
        let def = self.analysis.resolve_text(module_scope, path);
        if let (Some(def), Some(binding)) = (def, self.analysis.lookup_name(module_scope, &name)) {
            if binding.def == def {
                return false;
            }
        }
        let spelled = path.trim_start_matches("::");
        let already_written = self.analysis.module_use_leaves(module).any(|leaf| {
            matches!(&leaf.binding, UseBinding::Named(bound) if *bound == name)
                && leaf.segments.join("::") == spelled
        });
        if already_written {
            return false;
        }
        let pending = self.imports.entry(module).or_default();
        if pending.iter().any(|existing| existing.path == import) {
            return false;
        }
        pending.push(PendingImport {
            name,
            path: import.to_string(),
        });
        self.changes += 1;
        true
    }

    pub fn finish(self) -> Result<WorkspaceEdit, EditError> {
        let analysis = self.analysis;
        let mut edits = self.edits;
        for (&item, rewrite) in &self.uses {
            edits.extend(render_use_rewrite(analysis, item, rewrite));
        }
        for (&module, pending) in &self.imports {
            edits.push(render_imports(analysis, module, pending));
        }
        let mut edit = WorkspaceEdit::new(edits);
        edit.normalize()?;
        Ok(edit)
    }
}

fn apply_replacements(text: &str, range: TextRange, replacements: &[(TextRange, String)]) -> String {
    let mut inside: Vec<&(TextRange, String)> = replacements
        .iter()
        .filter(|(replaced, _)| range.covers(*replaced))
        .collect();
    inside.sort_by_key(|(replaced, _)| std::cmp::Reverse(replaced.start));
    let mut out = range.slice(text).to_string();
    for (replaced, new_text) in inside {
        out.replace_range(
            replaced.start - range.start..replaced.end - range.start,
            new_text,
        );
    }
    out
}

/// Text of `tree` after the rewrite, `None` when nothing of it is left.
fn render_tree(
    text: &str,
    tree: &UseTree,
    index: &mut Vec<usize>,
    rewrite: &UseRewrite,
) -> Option<String> {
    if rewrite.removed.iter().any(|removed| removed == index) {
        return None;
    }
    let touched = rewrite
        .removed
        .iter()
        .any(|removed| removed.starts_with(index));
    let UseTreeKind::Group { children, .. } = &tree.kind else {
        return Some(apply_replacements(text, tree.range, &rewrite.replacements));
    };
    if !touched {
        return Some(apply_replacements(text, tree.range, &rewrite.replacements));
    }

    let mut parts = Vec::new();
    for (idx, child) in children.iter().enumerate() {
        index.push(idx);
        parts.extend(render_tree(text, child, index, rewrite));
        index.pop();
    }
    let prefix = tree
        .path
        .as_ref()
        .map(|path| apply_replacements(text, path.range, &rewrite.replacements));
    match (parts.len(), prefix) {
        (0, _) => None,
        (1, Some(prefix)) => {
            let only = &parts[0];
            Some(if only == "self" {
                prefix
            } else if let Some(alias) = only.strip_prefix("self as ") {
                format!("{prefix} as {alias}")
            } else {
                format!("{prefix}::{only}")
            })
        }
        (1, None) => parts.pop(),
        (_, Some(prefix)) => Some(format!("{prefix}::{{{}}}", parts.join(", "))),
        (_, None) => Some(format!("{{{}}}", parts.join(", "))),
    }
}

fn render_use_rewrite(analysis: &Analysis, item: ItemId, rewrite: &UseRewrite) -> Vec<TextEdit> {
    let data = analysis.item(item);
    let Some(tree) = data.syntax.as_ref().and_then(|syntax| syntax.use_tree()) else {
        return Vec::new();
    };
    let Some(text) = analysis.file_text(&data.file) else {
        return Vec::new();
    };
    let file = data.file.clone();
    let indent = line_indent(text, data.range.start);
    let head = &text[data.range.start..tree.range.start];
    let tail = &text[tree.range.end..data.range.end];
    let split_items: Vec<String> = rewrite
        .split_out
        .iter()
        .map(|entry| format!("{head}{entry}{tail}"))
        .collect();

    let rendered = if rewrite.delete {
        None
    } else {
        render_tree(text, tree, &mut Vec::new(), rewrite)
    };
    match rendered {
        None if split_items.is_empty() => vec![TextEdit::delete(file, whole_lines(text, data.range))],
        None => vec![TextEdit::replace(
            file,
            data.range,
            split_items.join(&format!("\n{indent}")),
        )],
        Some(new_tree) => {
            let mut out = Vec::new();
            if new_tree != tree.range.slice(text) {
                out.push(TextEdit::replace(file.clone(), tree.range, new_tree));
            }
            for split in split_items {
                out.push(TextEdit::insert(
                    file.clone(),
                    data.range.end,
                    format!("\n{indent}{split}"),
                ));
            }
            out
        }
    }
}

/// End of the `//!` lines a file starts with.
fn after_inner_docs(text: &str) -> usize {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim_start().starts_with("//!") {
            break;
        }
        offset += line.len();
    }
    offset
}

fn render_imports(analysis: &Analysis, module: ModuleId, pending: &[PendingImport]) -> TextEdit {
    let data = analysis.module(module);
    let file = data.file.clone();
    let text = analysis.file_text(&file).unwrap_or("");
    let mut paths: Vec<&str> = pending.iter().map(|import| import.path.as_str()).collect();
    paths.sort_unstable();
    paths.dedup();

    let last_use = data
        .items
        .iter()
        .copied()
        .filter(|&item| analysis.item(item).kind == DefKind::Use)
        .last();
    if let Some(item) = last_use {
        let range = analysis.item(item).range;
        let indent = line_indent(text, range.start);
        let lines: String = paths
            .iter()
            .map(|path| format!("\n{indent}use {path};"))
            .collect();
        return TextEdit::insert(file, range.end, lines);
    }

    match data.body {
        Some(body) => {
            let offset = body.items_start;
            let brace_indent = line_indent(text, body.r_brace.start);
            let indent = match data.items.first() {
                Some(&first) => line_indent(text, analysis.item(first).range.start).to_string(),
                None => format!("{brace_indent}    "),
            };
            let mut lines: String = paths
                .iter()
                .map(|path| format!("\n{indent}use {path};"))
                .collect();
            if !data.items.is_empty() {
                lines.push('\n');
            } else if !text[offset..body.r_brace.start].contains('\n') {
                lines.push('\n');
                lines.push_str(brace_indent);
            }
            TextEdit::insert(file, offset, lines)
        }
        None => {
            let start = analysis.module_items_start(module);
            let (offset, mut lines) = if start == 0 {
                let docs_end = after_inner_docs(text);
                let lead = if docs_end > 0 { "\n" } else { "" };
                (docs_end, lead.to_string())
            } else {
                (start, "\n\n".to_string())
            };
            for path in &paths {
                lines.push_str(&format!("use {path};\n"));
            }
            let rest = &text[offset..];
            if !rest.trim().is_empty() && !rest.starts_with('\n') {
                lines.push('\n');
            }
            TextEdit::insert(file, offset, lines)
        }
    }
}

/// Remove duplicate module-level `use` items and imports of names declared in the same module,
/// in the given files.
pub(crate) fn optimize_imports(
    analysis: &Analysis,
    files: &BTreeSet<FileId>,
) -> Result<WorkspaceEdit, EditError> {
    let mut edits = Vec::new();
    for module in analysis.module_ids() {
        let data = analysis.module(module);
        if !files.contains(&data.file) {
            continue;
        }
        let Some(text) = analysis.file_text(&data.file) else {
            continue;
        };
        let mut seen: Vec<String> = Vec::new();
        for &item in &data.items {
            let item_data = analysis.item(item);
            if item_data.kind != DefKind::Use {
                continue;
            }
            let key: String = item_data
                .range
                .slice(text)
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect();
            if seen.contains(&key) || imports_own_item(analysis, module, item) {
                tracing::trace!(%key, "removing redundant import");
                edits.push(TextEdit::delete(
                    data.file.clone(),
                    whole_lines(text, item_data.range),
                ));
            } else {
                seen.push(key);
            }
        }
    }
    let mut edit = WorkspaceEdit::new(edits);
    edit.normalize()?;
    Ok(edit)
}

/// A private `use a::b::X;` in the module that declares `X` itself.
fn imports_own_item(analysis: &Analysis, module: ModuleId, item: ItemId) -> bool {
    let data = analysis.item(item);
    let Some(syntax) = &data.syntax else {
        return false;
    };
    let Some(tree) = syntax.use_tree() else {
        return false;
    };
    if syntax.vis.is_some() || !matches!(tree.kind, UseTreeKind::Simple { alias: None }) {
        return false;
    }
    let Some(path) = &tree.path else {
        return false;
    };
    if path.segments.len() < 2 {
        return false;
    }
    let Some(text) = analysis.file_text(&data.file) else {
        return false;
    };
    match analysis.resolve_text(Scope::module(module), path.range.slice(text)) {
        Some(Def::Item(target)) => {
            let target_data = analysis.item(target);
            target_data.module == module && target_data.kind != DefKind::Variant
        }
        Some(Def::Module(target)) => analysis.parent(target) == Some(module),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::apply_workspace_edit;
    use pretty_assertions::assert_eq;

    fn use_item(analysis: &Analysis, text: &str) -> ItemId {
        analysis
            .item_ids()
            .find(|&item| {
                let data = analysis.item(item);
                data.kind == DefKind::Use
                    && analysis
                        .file_text(&data.file)
                        .is_some_and(|file| data.range.slice(file) == text)
            })
            .unwrap()
    }

    fn apply(analysis: &Analysis, builder: EditBuilder<'_>) -> String {
        let edit = builder.finish().unwrap();
        let files = apply_workspace_edit(analysis.files(), &edit).unwrap();
        files[&FileId::new("/src/lib.rs")].clone()
    }

    #[test]
    fn splitting_a_group_entry_keeps_the_rest() {
        let text = "mod a { pub struct S; pub struct T; }\nmod c {\n    use crate::a::{S, T};\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let item = use_item(&analysis, "use crate::a::{S, T};");

        let mut builder = EditBuilder::new(&analysis);
        builder.split_use_entry(item, &[0], Some("crate::b::S".to_string()));
        assert_eq!(
            apply(&analysis, builder),
            "mod a { pub struct S; pub struct T; }\nmod c {\n    use crate::a::T;\n    use crate::b::S;\n}\n"
        );
    }

    #[test]
    fn emptied_use_items_are_removed_with_their_line() {
        let text = "mod a { pub struct S; }\nmod c {\n    use crate::a::{S};\n    fn f() {}\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let item = use_item(&analysis, "use crate::a::{S};");

        let mut builder = EditBuilder::new(&analysis);
        builder.split_use_entry(item, &[0], None);
        assert_eq!(
            apply(&analysis, builder),
            "mod a { pub struct S; }\nmod c {\n    fn f() {}\n}\n"
        );
    }

    #[test]
    fn imports_go_after_existing_uses_and_are_not_duplicated() {
        let text = "mod a { pub struct S; pub struct T; }\nmod c {\n    use crate::a::T;\n\n    fn f() {}\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let c = analysis.module_by_path("crate::c").unwrap();

        let mut builder = EditBuilder::new(&analysis);
        assert!(builder.add_import(Scope::module(c), "crate::a::S"));
        assert!(!builder.add_import(Scope::module(c), "crate::a::S"));
        assert!(!builder.add_import(Scope::module(c), "crate::a::T"));
        assert_eq!(
            apply(&analysis, builder),
            "mod a { pub struct S; pub struct T; }\nmod c {\n    use crate::a::T;\n    use crate::a::S;\n\n    fn f() {}\n}\n"
        );
    }

    #[test]
    fn imports_into_an_empty_inline_module() {
        let text = "mod a { pub struct S; }\nmod b {}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let b = analysis.module_by_path("crate::b").unwrap();

        let mut builder = EditBuilder::new(&analysis);
        builder.add_import(Scope::module(b), "crate::a::S");
        assert_eq!(
            apply(&analysis, builder),
            "mod a { pub struct S; }\nmod b {\n    use crate::a::S;\n}\n"
        );
    }

    #[test]
    fn collisions_consider_existing_and_pending_names() {
        let text = "mod a { pub struct S; }\nmod x { pub struct S; }\nmod c {\n    struct S;\n}\nmod d {}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let c = analysis.module_by_path("crate::c").unwrap();
        let d = analysis.module_by_path("crate::d").unwrap();
        let a_s = analysis.def_by_path("crate::a::S").ok();
        let x_s = analysis.def_by_path("crate::x::S").ok();

        let mut builder = EditBuilder::new(&analysis);
        assert!(builder.import_collides(Scope::module(c), "S", a_s));
        assert!(!builder.import_collides(Scope::module(d), "S", a_s));
        builder.add_import(Scope::module(d), "crate::a::S");
        assert!(builder.import_collides(Scope::module(d), "S", x_s));
        assert!(!builder.import_collides(Scope::module(d), "S", a_s));
    }

    #[test]
    fn optimizer_drops_duplicate_and_self_imports() {
        let text = "mod a { pub struct S; }\nmod b {\n    use crate::a::S;\n    use crate::a::S;\n    use crate::b::T;\n    pub struct T;\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let edit =
            optimize_imports(&analysis, &BTreeSet::from([FileId::new("/src/lib.rs")])).unwrap();
        let files = apply_workspace_edit(analysis.files(), &edit).unwrap();
        assert_eq!(
            files[&FileId::new("/src/lib.rs")],
            "mod a { pub struct S; }\nmod b {\n    use crate::a::S;\n    pub struct T;\n}\n"
        );
    }
}
