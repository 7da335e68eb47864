//! Turning collected references into rewrite plans.
//!
//! A [`MoveReferenceInfo`] records where a reference was written before the move and the text
//! that should name its target afterwards: an accessible path when one exists and a fallback
//! that is always well-formed.

use rustle_resolve::{Analysis, Def, DefKind, FileId, ItemId, ModuleId, PatId, PathId, Scope};
use rustle_syntax::{TextRange, UseTreeKind};

use crate::context::{ModPath, MoveContext};
use crate::references::is_absolute_path;

/// Where a reference was written: its file, the range of the rewritten text and that text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathAnchor {
    pub file: FileId,
    pub range: TextRange,
    pub segments: Vec<String>,
    pub text: String,
}

impl PathAnchor {
    fn for_path(analysis: &Analysis, path: PathId, len: usize) -> Self {
        let occurrence = analysis.path(path);
        let range = occurrence.syntax.prefix_range(len);
        let text = analysis
            .file_text(&occurrence.file)
            .map(|text| range.slice(text).to_string())
            .unwrap_or_default();
        Self {
            file: occurrence.file.clone(),
            range,
            segments: occurrence
                .syntax
                .segment_names()
                .take(len)
                .map(str::to_string)
                .collect(),
            text,
        }
    }

    fn for_pat(analysis: &Analysis, pat: PatId) -> Self {
        let occurrence = analysis.pat(pat);
        Self {
            file: occurrence.file.clone(),
            range: occurrence.name.range,
            segments: vec![occurrence.name.text.clone()],
            text: occurrence.name.text.clone(),
        }
    }

    pub fn start(&self) -> usize {
        self.range.start
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A path in code.
    Path,
    /// The path of a `use` tree that is not inside a group.
    UsePath,
    /// The path of an entry of a `use` group.
    GroupedUsePath,
    /// A bare name in pattern position.
    Pat,
}

impl ReferenceKind {
    pub fn is_use(self) -> bool {
        matches!(self, ReferenceKind::UsePath | ReferenceKind::GroupedUsePath)
    }
}

/// A reference to rewrite, described in terms of the pre-move snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReferenceInfo {
    /// The part of the reference that gets rewritten.
    pub path_old: PathAnchor,
    /// The reference as found, before it was widened to a full path.
    pub path_old_original: PathAnchor,
    pub kind: ReferenceKind,
    pub path_new_accessible: Option<String>,
    pub path_new_fallback: Option<String>,
    pub target: Def,
    /// Replace the text as is, without trying to keep the existing style.
    pub force_replace_directly: bool,
    pub(crate) path: Option<PathId>,
    pub(crate) scope: Scope,
    pub(crate) owner: ItemId,
    pub(crate) absolute: bool,
    pub(crate) target_is_fn: bool,
    /// The target is a function and, after the move, the reference runs from the source module
    /// to the target module or back.
    pub(crate) fn_across_move: bool,
}

impl MoveReferenceInfo {
    /// The text to write: the accessible path when there is one, the fallback otherwise.
    pub fn new_text(&self) -> Option<&str> {
        self.path_new_accessible
            .as_deref()
            .or(self.path_new_fallback.as_deref())
    }

    pub fn module(&self) -> ModuleId {
        self.scope.module
    }
}

fn use_kind(analysis: &Analysis, path: PathId) -> ReferenceKind {
    match &analysis.path(path).use_site {
        Some(site) if !site.tree_index.is_empty() => ReferenceKind::GroupedUsePath,
        Some(_) => ReferenceKind::UsePath,
        None => ReferenceKind::Path,
    }
}

fn is_fn(analysis: &Analysis, target: Def) -> bool {
    matches!(target, Def::Item(item) if analysis.item(item).kind == DefKind::Fn)
}

fn fn_across_move(ctx: &MoveContext<'_>, scope: Scope, owner: ItemId, target: Def) -> bool {
    if !is_fn(ctx.analysis, target) {
        return false;
    }
    let Some(home) = ctx.new_home(target) else {
        return false;
    };
    let location = ctx.new_code_location(scope, owner);
    let source = ctx.new_module_path(ctx.source);
    let target_path = ctx.target_path();
    (location == source && &home == target_path) || (&location == target_path && home == source)
}

fn base_info(
    ctx: &MoveContext<'_>,
    path: PathId,
    len: usize,
    target: Def,
) -> MoveReferenceInfo {
    let analysis = ctx.analysis;
    let occurrence = analysis.path(path);
    let anchor = PathAnchor::for_path(analysis, path, len);
    MoveReferenceInfo {
        path_old_original: anchor.clone(),
        path_old: anchor,
        kind: use_kind(analysis, path),
        path_new_accessible: None,
        path_new_fallback: None,
        target,
        force_replace_directly: false,
        path: Some(path),
        scope: occurrence.scope,
        owner: occurrence.owner,
        absolute: is_absolute_path(analysis, path),
        target_is_fn: is_fn(analysis, target),
        fn_across_move: fn_across_move(ctx, occurrence.scope, occurrence.owner, target),
    }
}

fn pat_info(ctx: &MoveContext<'_>, pat: PatId, target: Def) -> MoveReferenceInfo {
    let occurrence = ctx.analysis.pat(pat);
    let anchor = PathAnchor::for_pat(ctx.analysis, pat);
    MoveReferenceInfo {
        path_old_original: anchor.clone(),
        path_old: anchor,
        kind: ReferenceKind::Pat,
        path_new_accessible: None,
        path_new_fallback: None,
        target,
        force_replace_directly: false,
        path: None,
        scope: occurrence.scope,
        owner: occurrence.owner,
        absolute: false,
        target_is_fn: false,
        fn_across_move: false,
    }
}

/// Plan for a path inside the moved code that points at something staying behind. `None` when
/// the path keeps working unchanged.
pub(crate) fn create_outside_reference_info(
    ctx: &MoveContext<'_>,
    path: PathId,
    len: usize,
    target: Def,
) -> Option<MoveReferenceInfo> {
    let analysis = ctx.analysis;
    let resolver = ctx.resolver();
    let occurrence = analysis.path(path);
    let mut info = base_info(ctx, path, len, target);
    let in_source = ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner);

    if in_source && analysis.containing_module(target) == Some(ctx.target) {
        info.path_new_accessible = resolver.qualified_name_relative_to(target, ctx.target);
        info.force_replace_directly = true;
        return Some(info);
    }

    if info.absolute {
        let base = analysis.path_trace(path).first()?.def;
        let base_crate = analysis.def_crate(base);
        if base_crate != ctx.source_crate() && base_crate != ctx.target_crate() {
            return None;
        }
        if resolver.is_accessible(Scope::module(ctx.target), &info.path_old.text, target) {
            return None;
        }
    }

    info.path_new_accessible = resolver.find_shortest_importable_path(ctx.target, target);
    info.path_new_fallback = if in_source {
        resolver.qualified_name_relative_to(target, ctx.target)
    } else {
        resolver.qualified_name_in_crate(target, ctx.target_crate())
    };
    Some(info)
}

/// Plan for a pattern in the moved code naming a constant or unit struct that stays behind.
pub(crate) fn create_outside_pat_info(
    ctx: &MoveContext<'_>,
    pat: PatId,
    target: Def,
) -> Option<MoveReferenceInfo> {
    let mut info = pat_info(ctx, pat, target);
    if ctx.analysis.containing_module(target) == Some(ctx.target) {
        info.path_new_accessible = ctx.analysis.def_name(target).map(str::to_string);
        info.force_replace_directly = true;
        return Some(info);
    }
    info.path_new_accessible = ctx
        .resolver()
        .find_shortest_importable_path(ctx.target, target);
    info.path_new_fallback = ctx
        .resolver()
        .qualified_name_relative_to(target, ctx.target);
    Some(info)
}

/// New text for a moved element seen from code that will live in `location`.
fn inside_texts(
    ctx: &MoveContext<'_>,
    scope: Scope,
    location: &ModPath,
    target: Def,
) -> (Option<String>, Option<String>) {
    let analysis = ctx.analysis;
    let Some(name) = analysis.def_name(target) else {
        return (None, None);
    };
    let Some(new_path) = ctx.new_def_path(target) else {
        return (None, None);
    };
    let accessible = ctx
        .resolver()
        .find_shortest_importable_path(scope.module, Def::Module(ctx.target))
        .map(|module| format!("{module}::{name}"));
    let fallback = if location.is_ancestor_of(ctx.target_path()) {
        new_path.segments[location.segments.len()..].join("::")
    } else {
        new_path.render(analysis, location.krate)
    };
    (accessible, Some(fallback))
}

/// Plan for a usage of a moved element.
pub(crate) fn create_inside_reference_info(
    ctx: &MoveContext<'_>,
    path: PathId,
    len: usize,
    target: Def,
) -> Option<MoveReferenceInfo> {
    let occurrence = ctx.analysis.path(path);
    let mut info = base_info(ctx, path, len, target);
    if info.kind == ReferenceKind::GroupedUsePath {
        info.path_old_original = use_entry_anchor(ctx.analysis, path).unwrap_or(info.path_old.clone());
    }
    let name = ctx.analysis.def_name(target)?.to_string();
    let location = ctx.new_code_location(occurrence.scope, occurrence.owner);

    if ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner)
        || &location == ctx.target_path()
    {
        info.path_new_accessible = Some(name);
        info.force_replace_directly = true;
        return Some(info);
    }

    let (accessible, fallback) = inside_texts(ctx, occurrence.scope, &location, target);
    info.path_new_accessible = accessible;
    info.path_new_fallback = fallback;
    Some(info)
}

/// Plan for a pattern naming a moved constant or unit struct.
pub(crate) fn create_inside_pat_info(
    ctx: &MoveContext<'_>,
    pat: PatId,
    target: Def,
) -> Option<MoveReferenceInfo> {
    let occurrence = ctx.analysis.pat(pat);
    let mut info = pat_info(ctx, pat, target);
    let name = ctx.analysis.def_name(target)?.to_string();
    let location = ctx.new_code_location(occurrence.scope, occurrence.owner);
    if ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner)
        || &location == ctx.target_path()
    {
        info.path_new_accessible = Some(name);
        info.force_replace_directly = true;
        return Some(info);
    }
    let (accessible, fallback) = inside_texts(ctx, occurrence.scope, &location, target);
    info.path_new_accessible = accessible;
    info.path_new_fallback = fallback;
    Some(info)
}

/// The whole group entry a grouped `use` path belongs to, e.g. `m::{X, Y}` or `S as T`.
fn use_entry_anchor(analysis: &Analysis, path: PathId) -> Option<PathAnchor> {
    let occurrence = analysis.path(path);
    let site = occurrence.use_site.as_ref()?;
    let tree = analysis.item(site.item).syntax.as_ref()?.use_tree()?;
    let mut entry = tree;
    for &idx in &site.tree_index {
        let UseTreeKind::Group { children, .. } = &entry.kind else {
            return None;
        };
        entry = children.get(idx)?;
    }
    let text = analysis.file_text(&occurrence.file)?;
    Some(PathAnchor {
        file: occurrence.file.clone(),
        range: entry.range,
        segments: occurrence.syntax.segment_names().map(str::to_string).collect(),
        text: entry.range.slice(text).to_string(),
    })
}

/// Widen a reference whose matched prefix is a module used as a qualifier (`m::X` for a moved
/// `m`) to the first prefix that names something else, so the rewrite and the later validity
/// check talk about the full name.
pub(crate) fn convert_to_full_reference(
    ctx: &MoveContext<'_>,
    info: MoveReferenceInfo,
) -> MoveReferenceInfo {
    let analysis = ctx.analysis;
    let Some(path) = info.path else {
        return info;
    };
    if info.kind != ReferenceKind::Path {
        return info;
    }
    let own_len = analysis.path(path).syntax.segments.len();
    let len = info.path_old.segments.len();
    if !matches!(info.target, Def::Module(_)) || len >= own_len {
        return info;
    }

    let trace = analysis.path_trace(path);
    let mut widened = None;
    for candidate in len + 1..=own_len {
        let Some(binding) = trace.get(candidate - 1) else {
            break;
        };
        match binding.def {
            Def::Module(_) if candidate < own_len => continue,
            def => {
                widened = Some((candidate, def));
                break;
            }
        }
    }
    let Some((full_len, full_target)) = widened else {
        return info;
    };

    let anchor = PathAnchor::for_path(analysis, path, full_len);
    let Some(suffix) = anchor.text.strip_prefix(info.path_old.text.as_str()) else {
        tracing::error!(
            old = %info.path_old.text,
            full = %anchor.text,
            "reference is not a prefix of its full path"
        );
        return info;
    };
    let suffix = suffix.to_string();
    MoveReferenceInfo {
        path_new_accessible: info
            .path_new_accessible
            .as_ref()
            .map(|text| format!("{text}{suffix}")),
        path_new_fallback: info
            .path_new_fallback
            .as_ref()
            .map(|text| format!("{text}{suffix}")),
        path_old: anchor,
        target: full_target,
        target_is_fn: is_fn(ctx.analysis, full_target),
        fn_across_move: fn_across_move(ctx, info.scope, info.owner, full_target),
        ..info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElementToMove;
    use pretty_assertions::assert_eq;

    fn fixture() -> Analysis {
        Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    pub struct S;\n    pub mod m { pub fn f() {} }\n}\nmod b {}\nmod c {\n    fn g() -> crate::a::S { crate::a::m::f(); crate::a::S }\n}\n",
        )])
    }

    #[test]
    fn inside_references_prefer_the_shortest_import_path() {
        let analysis = fixture();
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let s = analysis.def_by_path("crate::a::S").unwrap();
        let Def::Item(s_item) = s else {
            panic!("expected an item");
        };
        let elements = [ElementToMove::Item(s_item)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let (path, len) = analysis.find_references(s)[0];
        let info = create_inside_reference_info(&ctx, path, len, s).unwrap();
        assert_eq!(info.path_old.text, "crate::a::S");
        assert_eq!(info.kind, ReferenceKind::Path);
        assert_eq!(info.path_new_accessible.as_deref(), Some("crate::b::S"));
        assert_eq!(info.path_new_fallback.as_deref(), Some("crate::b::S"));
        assert!(!info.force_replace_directly);
    }

    #[test]
    fn module_qualifiers_widen_to_the_full_name() {
        let analysis = fixture();
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let m = analysis.module_by_path("crate::a::m").unwrap();
        let f = analysis.def_by_path("crate::a::m::f").unwrap();
        let elements = [ElementToMove::Mod(m)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let (path, len) = analysis.find_references(Def::Module(m))[0];
        let info = create_inside_reference_info(&ctx, path, len, Def::Module(m)).unwrap();
        assert_eq!(info.path_old.text, "crate::a::m");

        let full = convert_to_full_reference(&ctx, info);
        assert_eq!(full.path_old.text, "crate::a::m::f");
        assert_eq!(full.path_old_original.text, "crate::a::m");
        assert_eq!(full.target, f);
        assert_eq!(full.path_new_accessible.as_deref(), Some("crate::b::m::f"));
    }
}
