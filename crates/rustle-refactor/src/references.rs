//! Collecting the paths a move affects.
//!
//! Two kinds of references matter:
//! - *usages* of the moved elements, anywhere in the workspace (including the moved code itself)
//! - *outside references*: paths inside the moved code that point at things staying behind and
//!   only resolve because of where the code currently lives

use rustle_resolve::{Analysis, Def, DefKind, ItemId, ModuleId, PatId, PathId, UseBinding};
use rustle_syntax::{is_keyword, PathContext};

use crate::cancel::{CancellationToken, Cancelled};
use crate::context::{ElementToMove, MoveContext};

/// Paths checked between two cancellation polls.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A place that names something the move is interested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveUsage {
    /// The first `len` own segments of `path` resolve to `target`.
    Path {
        path: PathId,
        len: usize,
        target: Def,
    },
    /// A unit struct, constant or static matched by bare name in a pattern.
    Pat { pat: PatId, target: Def },
    /// The `mod name;` declaration of a moved file module.
    ModDecl { item: ItemId, module: ModuleId },
}

impl MoveUsage {
    pub fn target(self) -> Def {
        match self {
            MoveUsage::Path { target, .. } | MoveUsage::Pat { target, .. } => target,
            MoveUsage::ModDecl { module, .. } => Def::Module(module),
        }
    }
}

/// Every usage of the moved elements, in a stable order: by crate, module path, file and
/// offset.
pub(crate) fn find_usages(ctx: &MoveContext<'_>) -> Vec<MoveUsage> {
    let analysis = ctx.analysis;
    let mut usages = Vec::new();
    for &element in ctx.elements {
        let target = element.def();
        let mut seen = Vec::new();
        for (path, len) in analysis.find_references(target) {
            if analysis.path(path).syntax.context == PathContext::MacroCall || seen.contains(&path) {
                continue;
            }
            seen.push(path);
            usages.push(MoveUsage::Path { path, len, target });
        }
        match element {
            ElementToMove::Item(item) => {
                if matches!(
                    analysis.item(item).kind,
                    DefKind::Struct | DefKind::Const | DefKind::Static
                ) {
                    usages.extend(
                        analysis
                            .find_pat_references(target)
                            .into_iter()
                            .map(|pat| MoveUsage::Pat { pat, target }),
                    );
                }
            }
            ElementToMove::Mod(module) => {
                let data = analysis.module(module);
                if let (None, Some(item)) = (data.body, data.decl) {
                    usages.push(MoveUsage::ModDecl { item, module });
                }
            }
        }
    }
    usages.sort_by_cached_key(|usage| sort_key(analysis, *usage));
    usages
}

fn sort_key(analysis: &Analysis, usage: MoveUsage) -> (String, String, String, usize) {
    let (module, file, offset) = match usage {
        MoveUsage::Path { path, .. } => {
            let occurrence = analysis.path(path);
            (
                occurrence.scope.module,
                occurrence.file.clone(),
                occurrence.syntax.range.start,
            )
        }
        MoveUsage::Pat { pat, .. } => {
            let occurrence = analysis.pat(pat);
            (
                occurrence.scope.module,
                occurrence.file.clone(),
                occurrence.name.range.start,
            )
        }
        MoveUsage::ModDecl { item, .. } => {
            let data = analysis.item(item);
            (data.module, data.file.clone(), data.range.start)
        }
    };
    (
        analysis.crate_data(analysis.module(module).krate).name.clone(),
        analysis.crate_relative_path(module),
        file.to_string(),
        offset,
    )
}

/// Whether the path is spelled from a crate root: `crate::..`, `::..` or `other_crate::..`.
pub(crate) fn is_absolute_path(analysis: &Analysis, path: PathId) -> bool {
    let syntax = &analysis.path(path).syntax;
    if syntax.leading_colon || syntax.first_segment() == "crate" {
        return true;
    }
    let first = syntax.first_segment();
    if matches!(first, "self" | "super" | "Self") {
        return false;
    }
    if analysis.crate_by_name(first).is_none() {
        return false;
    }
    let here = analysis.path(path).scope.module;
    matches!(
        analysis.path_trace(path).first().map(|binding| binding.def),
        Some(Def::Module(root))
            if analysis.module(root).parent.is_none() && !analysis.same_crate(root, here)
    )
}

/// The shortest prefix of `path` that names something other than a qualifying module: every
/// segment before it resolves to a module, and the whole path is taken when it names a module.
fn simple_prefix(analysis: &Analysis, path: PathId) -> Option<(usize, Def)> {
    let own_len = analysis.path(path).syntax.segments.len();
    let trace = analysis.path_trace(path);
    let prefix = analysis.path_prefix_len(path);
    for len in 1..=own_len {
        let binding = trace.get(prefix + len - 1)?;
        match binding.def {
            Def::Module(_) if len < own_len => continue,
            def => return Some((len, def)),
        }
    }
    None
}

/// Paths and patterns inside the moved code that refer to things staying behind and rely on
/// the code's current location: written from a crate root, starting with `super`, or written
/// directly in the source module.
pub(crate) fn collect_outside_references(
    ctx: &MoveContext<'_>,
    token: &CancellationToken,
) -> Result<Vec<MoveUsage>, Cancelled> {
    let analysis = ctx.analysis;
    let mut out = Vec::new();
    for (idx, path) in analysis.path_ids().enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 {
            token.check()?;
        }
        let occurrence = analysis.path(path);
        if occurrence.syntax.context == PathContext::MacroCall
            || !ctx.is_moved_code(occurrence.scope, occurrence.owner)
        {
            continue;
        }
        if occurrence
            .use_site
            .as_ref()
            .is_some_and(|site| !site.prefix.is_empty())
        {
            continue;
        }
        let relies_on_location = is_absolute_path(analysis, path)
            || occurrence.syntax.first_segment() == "super"
            || ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner);
        if !relies_on_location {
            continue;
        }
        let Some((len, target)) = simple_prefix(analysis, path) else {
            continue;
        };
        if ctx.is_moved_def(target) {
            continue;
        }
        out.push(MoveUsage::Path { path, len, target });
    }

    for pat in analysis.pat_ids() {
        let occurrence = analysis.pat(pat);
        if !ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner) {
            continue;
        }
        if let Some(target) = analysis.resolve_pat(pat) {
            if !ctx.is_moved_def(target) {
                out.push(MoveUsage::Pat { pat, target });
            }
        }
    }
    tracing::debug!(count = out.len(), "collected outside references");
    Ok(out)
}

/// Imports of the source module the moved code relies on but that cannot be resolved inside the
/// workspace (external crates, the standard library). They are copied to the target module.
pub(crate) fn collect_carried_imports(ctx: &MoveContext<'_>) -> Vec<String> {
    let analysis = ctx.analysis;
    let mut names: Vec<&str> = Vec::new();
    for path in analysis.path_ids() {
        let occurrence = analysis.path(path);
        if occurrence.use_site.is_some()
            || occurrence.syntax.leading_colon
            || !ctx.is_moved_top_level_code(occurrence.scope, occurrence.owner)
        {
            continue;
        }
        let first = occurrence.syntax.first_segment();
        if is_keyword(first) || analysis.path_trace(path).first().is_some() {
            continue;
        }
        if !names.contains(&first) {
            names.push(first);
        }
    }

    let mut imports = Vec::new();
    for leaf in analysis.module_use_leaves(ctx.source) {
        let UseBinding::Named(name) = &leaf.binding else {
            continue;
        };
        if !names.contains(&name.as_str()) {
            continue;
        }
        let segments: Vec<&str> = leaf.segments.iter().map(String::as_str).collect();
        let mut text = if leaf.leading_colon {
            format!("::{}", segments.join("::"))
        } else {
            segments.join("::")
        };
        if segments.last() != Some(&name.as_str()) {
            text.push_str(" as ");
            text.push_str(name);
        }
        if !imports.contains(&text) {
            imports.push(text);
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn outside_references_stop_at_the_first_non_module_segment() {
        let analysis = Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    pub enum E { V }\n    fn f() -> E { E::V }\n    pub mod inner { pub fn g() {} }\n    fn h() { inner::g() }\n}\nmod b {}\n",
        )]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(f) = analysis.def_by_path("crate::a::f").unwrap() else {
            panic!("expected an item");
        };
        let Def::Item(h) = analysis.def_by_path("crate::a::h").unwrap() else {
            panic!("expected an item");
        };
        let elements = [ElementToMove::Item(f), ElementToMove::Item(h)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let found: Vec<(String, usize)> = collect_outside_references(&ctx, &CancellationToken::default())
            .unwrap()
            .into_iter()
            .filter_map(|usage| match usage {
                MoveUsage::Path { path, len, .. } => {
                    let syntax = &analysis.path(path).syntax;
                    Some((syntax.segment_names().collect::<Vec<_>>().join("::"), len))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("E".to_string(), 1),
                ("E::V".to_string(), 1),
                ("inner::g".to_string(), 2),
            ]
        );
    }

    #[test]
    fn carried_imports_cover_unresolvable_names() {
        let analysis = Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    use std::collections::HashMap;\n    use std::fmt::Write as _;\n    use std::rc::Rc as Shared;\n    fn f() -> HashMap<u8, Shared<u8>> { HashMap::new() }\n}\nmod b {}\n",
        )]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(f) = analysis.def_by_path("crate::a::f").unwrap() else {
            panic!("expected an item");
        };
        let elements = [ElementToMove::Item(f)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        assert_eq!(
            collect_carried_imports(&ctx),
            vec![
                "std::collections::HashMap".to_string(),
                "std::rc::Rc as Shared".to_string()
            ]
        );
    }
}
