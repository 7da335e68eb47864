//! Rewriting collected references against a post-move snapshot.
//!
//! References are collected before anything changes. Each pass rebuilds the [`Analysis`] and
//! finds the reference again through a [`Relocation`], then edits it through an
//! [`EditBuilder`].
//!
//! Pass one rewrites `use` paths and references whose new text is already final. Pass two
//! retargets the remaining code paths, keeping an existing qualifier and importing it when that
//! reads closer to what the user wrote.

use rustle_config::MoveConfig;
use rustle_resolve::{Analysis, Def, FileId, ItemId, ModuleId, PatId, PathId, Scope};
use rustle_syntax::{is_keyword, TextRange, UseTree, UseTreeKind};

use crate::imports::EditBuilder;
use crate::reference_info::{MoveReferenceInfo, PathAnchor, ReferenceKind};
use crate::relocation::Relocation;
use crate::resolver::PathResolver;

/// Maps anchors and declarations of the pre-move snapshot into a later one.
pub(crate) struct Remap<'a> {
    pub(crate) old: &'a Analysis,
    pub(crate) new: &'a Analysis,
    relocation: &'a Relocation,
}

impl<'a> Remap<'a> {
    pub(crate) fn new(old: &'a Analysis, new: &'a Analysis, relocation: &'a Relocation) -> Self {
        Self {
            old,
            new,
            relocation,
        }
    }

    pub(crate) fn offset(&self, file: &FileId, offset: usize) -> Option<(FileId, usize)> {
        self.relocation.map_offset(file, offset)
    }

    pub(crate) fn path(&self, anchor: &PathAnchor) -> Option<PathId> {
        let (file, offset) = self.offset(&anchor.file, anchor.start())?;
        self.new.path_at(&file, offset)
    }

    pub(crate) fn pat(&self, anchor: &PathAnchor) -> Option<PatId> {
        let (file, offset) = self.offset(&anchor.file, anchor.start())?;
        self.new.pat_at(&file, offset)
    }

    pub(crate) fn item(&self, item: ItemId) -> Option<ItemId> {
        let data = self.old.item(item);
        match &data.name {
            Some(name) => {
                let (file, offset) = self.offset(&data.file, name.range.start)?;
                self.new.item_at_name(&file, offset)
            }
            None => {
                let (file, offset) = self.offset(&data.file, data.range.start)?;
                self.new.item_starting_at(&file, offset)
            }
        }
    }

    pub(crate) fn module(&self, module: ModuleId) -> Option<ModuleId> {
        let data = self.old.module(module);
        match data.decl {
            Some(decl) => self.new.item(self.item(decl)?).child_module,
            None => self.new.module_for_file(&self.relocation.map_file(&data.file)),
        }
    }

    pub(crate) fn def(&self, def: Def) -> Option<Def> {
        match def {
            Def::Item(item) => self.item(item).map(Def::Item),
            Def::Module(module) => self.module(module).map(Def::Module),
        }
    }
}

fn lost(info: &MoveReferenceInfo) {
    tracing::warn!(
        file = %info.path_old.file,
        offset = info.path_old.start(),
        text = %info.path_old.text,
        "reference not found after the move"
    );
}

fn is_path_keyword(text: &str) -> bool {
    matches!(text, "crate" | "self" | "super")
}

/// `text` as the start of a `use` path: a bare name needs `self::` to mean the local item.
fn use_path_text(text: &str) -> String {
    if text.contains("::") || is_path_keyword(text) {
        text.to_string()
    } else {
        format!("self::{text}")
    }
}

fn use_entry<'t>(tree: &'t UseTree, tree_index: &[usize]) -> Option<&'t UseTree> {
    let mut entry = tree;
    for &idx in tree_index {
        let UseTreeKind::Group { children, .. } = &entry.kind else {
            return None;
        };
        entry = children.get(idx)?;
    }
    Some(entry)
}

/// Pass one: `use` paths, and references whose new text needs no further thought.
pub(crate) fn replace_directly(
    remap: &Remap<'_>,
    infos: &[MoveReferenceInfo],
    builder: &mut EditBuilder<'_>,
) {
    for info in infos
        .iter()
        .filter(|info| info.force_replace_directly || info.kind.is_use())
    {
        replace_reference(remap, info, builder);
    }
}

fn replace_reference(remap: &Remap<'_>, info: &MoveReferenceInfo, builder: &mut EditBuilder<'_>) {
    let analysis = remap.new;
    let Some(new_text) = info.new_text() else {
        tracing::warn!(text = %info.path_old.text, "no path names the target from here");
        return;
    };
    match info.kind {
        ReferenceKind::Pat => {
            let Some(pat) = remap.pat(&info.path_old) else {
                return lost(info);
            };
            replace_pat(analysis, pat, new_text, builder);
        }
        ReferenceKind::Path => {
            let Some(path) = remap.path(&info.path_old) else {
                return lost(info);
            };
            let occurrence = analysis.path(path);
            let range = occurrence.syntax.prefix_range(info.path_old.segments.len());
            builder.replace(&occurrence.file, range, new_text);
        }
        ReferenceKind::UsePath => {
            let Some(path) = remap.path(&info.path_old) else {
                return lost(info);
            };
            let occurrence = analysis.path(path);
            let Some(site) = &occurrence.use_site else {
                return lost(info);
            };
            let len = info.path_old.segments.len();
            let Some(tree) = analysis
                .item(site.item)
                .syntax
                .as_ref()
                .and_then(|syntax| syntax.use_tree())
            else {
                return lost(info);
            };
            let whole_simple = matches!(tree.kind, UseTreeKind::Simple { alias: None })
                && len == occurrence.syntax.segments.len();
            if whole_simple && !new_text.contains("::") && !is_path_keyword(new_text) {
                // `use crate::a::S;` inside the module that now declares `S`.
                builder.delete_use(site.item);
                return;
            }
            let range = occurrence.syntax.prefix_range(len);
            builder.replace_in_use(site.item, range, &use_path_text(new_text));
        }
        ReferenceKind::GroupedUsePath => {
            let Some(path) = remap.path(&info.path_old) else {
                return lost(info);
            };
            let occurrence = analysis.path(path);
            let Some(site) = &occurrence.use_site else {
                return lost(info);
            };
            let Some(entry) = analysis
                .item(site.item)
                .syntax
                .as_ref()
                .and_then(|syntax| syntax.use_tree())
                .and_then(|tree| use_entry(tree, &site.tree_index))
            else {
                return lost(info);
            };
            let Some(text) = analysis.file_text(&occurrence.file) else {
                return lost(info);
            };
            let anchor = occurrence.syntax.prefix_range(info.path_old.segments.len());
            let suffix = TextRange::new(anchor.end, entry.range.end).slice(text);
            let bare = !new_text.contains("::") && !is_path_keyword(new_text);
            let new_entry = if suffix.is_empty() && bare {
                None
            } else {
                Some(format!("{}{suffix}", use_path_text(new_text)))
            };
            builder.split_use_entry(site.item, &site.tree_index, new_entry);
        }
    }
}

fn replace_pat(analysis: &Analysis, pat: PatId, new_text: &str, builder: &mut EditBuilder<'_>) {
    let occurrence = analysis.pat(pat);
    if new_text.contains("::") {
        tracing::error!(
            name = %occurrence.name.text,
            %new_text,
            "pattern names cannot be qualified"
        );
        return;
    }
    builder.replace(&occurrence.file, occurrence.name.range, new_text);
}

/// Pass two: code paths that do not reach their target anymore.
pub(crate) fn retarget(
    remap: &Remap<'_>,
    infos: &[MoveReferenceInfo],
    builder: &mut EditBuilder<'_>,
    config: &MoveConfig,
) {
    for info in infos
        .iter()
        .filter(|info| !info.force_replace_directly && !info.kind.is_use())
    {
        retarget_reference(remap, info, builder, config);
    }
}

fn retarget_reference(
    remap: &Remap<'_>,
    info: &MoveReferenceInfo,
    builder: &mut EditBuilder<'_>,
    config: &MoveConfig,
) {
    let analysis = remap.new;
    let Some(target) = remap.def(info.target) else {
        tracing::warn!(text = %info.path_old.text, "target not found after the move");
        return;
    };
    let len = info.path_old.segments.len();

    if info.kind == ReferenceKind::Pat {
        let Some(pat) = remap.pat(&info.path_old) else {
            return lost(info);
        };
        if analysis.resolve_pat(pat) == Some(target) {
            return;
        }
        let Some(new_text) = info.new_text() else {
            return;
        };
        let occurrence = analysis.pat(pat);
        if config.keep_existing_style {
            if let Some((import, kept)) = keep_style(builder, occurrence.scope, info, new_text) {
                if !kept.contains("::") {
                    builder.add_import(Scope::module(occurrence.scope.module), &import);
                    builder.replace(&occurrence.file, occurrence.name.range, &kept);
                    return;
                }
            }
        }
        replace_pat(analysis, pat, new_text, builder);
        return;
    }

    let Some(path) = remap.path(&info.path_old) else {
        return lost(info);
    };
    if analysis.prefix_reaches(path, len, target) {
        tracing::trace!(text = %info.path_old.text, "reference still valid");
        return;
    }
    let Some(new_text) = info.new_text() else {
        tracing::warn!(text = %info.path_old.text, "no path names the target from here");
        return;
    };
    let occurrence = analysis.path(path);
    let range = occurrence.syntax.prefix_range(len);
    if config.keep_existing_style && !info.absolute {
        if let Some((import, kept)) = keep_style(builder, occurrence.scope, info, new_text) {
            builder.add_import(Scope::module(occurrence.scope.module), &import);
            builder.replace(&occurrence.file, range, &kept);
            return;
        }
    }
    builder.replace(&occurrence.file, range, new_text);
}

/// An import and the shortened reference that keeps as many trailing segments as the old
/// reference had, e.g. `a::S` becoming `b::S` plus `use crate::b;`.
fn keep_style(
    builder: &EditBuilder<'_>,
    scope: Scope,
    info: &MoveReferenceInfo,
    new_text: &str,
) -> Option<(String, String)> {
    let new_segments: Vec<&str> = new_text.split("::").collect();
    let old = &info.path_old.segments;
    let starts_with_super = old.first().is_some_and(|first| first == "super");
    if new_segments.len() <= old.len() && !starts_with_super {
        return None;
    }

    // Functions are kept as `module::func` when named across the move or through `super`.
    let mut keep = if starts_with_super {
        if info.target_is_fn {
            2
        } else {
            1
        }
    } else if old.len() == 1 && info.fn_across_move {
        2
    } else {
        old.len()
    };
    let analysis = builder.analysis();
    while keep < new_segments.len() {
        let split = new_segments.len() - keep;
        let name = new_segments[split];
        if !is_keyword(name) {
            let import = new_segments[..=split].join("::");
            let def = analysis.resolve_text(Scope::module(scope.module), &import);
            if def.is_some() && !builder.import_collides(scope, name, def) {
                return Some((import, new_segments[split..].join("::")));
            }
        }
        keep += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn use_paths_get_self_for_bare_names() {
        assert_eq!(use_path_text("S"), "self::S");
        assert_eq!(use_path_text("crate::b::S"), "crate::b::S");
        assert_eq!(use_path_text("super"), "super");
    }

    #[test]
    fn remap_finds_items_through_a_plain_edit() {
        use crate::edit::{apply_workspace_edit, TextEdit, WorkspaceEdit};
        use crate::relocation::RelocationStep;

        let old = Analysis::from_files([("/src/lib.rs", "mod a { pub struct S; }\n")]);
        let edit = WorkspaceEdit::new(vec![TextEdit::insert(
            FileId::new("/src/lib.rs"),
            0,
            "struct Before;\n",
        )]);
        let files = apply_workspace_edit(old.files(), &edit).unwrap();
        let new = Analysis::new(files);
        let mut relocation = Relocation::new();
        relocation.push(RelocationStep::from_edit(&edit));

        let remap = Remap::new(&old, &new, &relocation);
        let s = old.def_by_path("crate::a::S").unwrap();
        assert_eq!(remap.def(s), Some(new.def_by_path("crate::a::S").unwrap()));
        let a = old.module_by_path("crate::a").unwrap();
        assert_eq!(remap.module(a), Some(new.module_by_path("crate::a").unwrap()));
    }
}
