//! Method calls whose trait stops being in scope because one side of the call moves.
//!
//! A method call does not name its trait, so no path rewrite fixes it. When the calling code
//! and the trait end up in different modules and the trait is not imported by name, an import
//! for the trait is added where the call lives.

use rustle_resolve::{Analysis, Def, FileId, ItemId, MethodCallId, Scope, UseBinding};

use crate::cancel::{CancellationToken, Cancelled};
use crate::context::MoveContext;
use crate::imports::EditBuilder;
use crate::resolver::PathResolver;
use crate::retarget::Remap;

/// Calls checked between two cancellation polls.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A method call that needs its trait imported after the move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraitMethodRef {
    pub file: FileId,
    /// Start of the method name.
    pub offset: usize,
    pub trait_item: ItemId,
}

/// Whether a `use` visible in `scope` names `trait_item` explicitly. `block_only` limits the
/// search to imports written inside the body holding the call.
fn imported_by_name(analysis: &Analysis, scope: Scope, trait_item: ItemId, block_only: bool) -> bool {
    analysis.use_leaves().iter().any(|leaf| {
        let in_scope = if block_only {
            scope.block.is_some() && leaf.scope == scope
        } else {
            leaf.scope == scope || leaf.scope == Scope::module(scope.module)
        };
        if !in_scope || leaf.binding == UseBinding::Glob {
            return false;
        }
        let text = leaf.segments.join("::");
        let text = if leaf.leading_colon {
            format!("::{text}")
        } else {
            text
        };
        analysis.resolve_text(leaf.scope, &text) == Some(Def::Item(trait_item))
    })
}

/// Method calls where exactly one of the call and its trait moves.
pub(crate) fn collect_trait_method_refs(
    ctx: &MoveContext<'_>,
    token: &CancellationToken,
) -> Result<Vec<TraitMethodRef>, Cancelled> {
    let analysis = ctx.analysis;
    let mut refs = Vec::new();
    for (idx, call) in analysis.method_call_ids().enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 {
            token.check()?;
        }
        let occurrence = analysis.method_call(call);
        let Some(trait_item) = ctx.resolver().resolve_method_call(call) else {
            continue;
        };
        let call_moves = ctx.is_moved_code(occurrence.scope, occurrence.owner);
        let trait_moves = ctx.is_moved_item(trait_item);
        let needs_import = match (call_moves, trait_moves) {
            (true, false) => !imported_by_name(analysis, occurrence.scope, trait_item, true),
            (false, true) => !imported_by_name(analysis, occurrence.scope, trait_item, false),
            _ => false,
        };
        if needs_import {
            refs.push(TraitMethodRef {
                file: occurrence.file.clone(),
                offset: occurrence.name.range.start,
                trait_item,
            });
        }
    }
    tracing::debug!(count = refs.len(), "collected trait method calls");
    Ok(refs)
}

fn remapped_call(remap: &Remap<'_>, method: &TraitMethodRef) -> Option<MethodCallId> {
    let (file, offset) = remap.offset(&method.file, method.offset)?;
    remap.new.method_call_at(&file, offset)
}

/// Import the trait of every collected call that lost it. A trait whose name is taken is
/// imported as `_`.
pub(crate) fn insert_trait_imports(
    remap: &Remap<'_>,
    refs: &[TraitMethodRef],
    builder: &mut EditBuilder<'_>,
) {
    let analysis = remap.new;
    for method in refs {
        let (Some(call), Some(trait_item)) = (remapped_call(remap, method), remap.item(method.trait_item))
        else {
            tracing::warn!(file = %method.file, offset = method.offset, "method call not found after the move");
            continue;
        };
        let scope = analysis.method_call(call).scope;
        if analysis.traits_in_scope(scope).contains(&trait_item) {
            continue;
        }
        let module = scope.module;
        let target = Def::Item(trait_item);
        let Some(path) = analysis.importable_or_qualified(module, analysis.module(module).krate, target)
        else {
            tracing::debug!(file = %method.file, offset = method.offset, "no path names the trait");
            continue;
        };
        let Some(name) = analysis.item(trait_item).name_text() else {
            continue;
        };
        let module_scope = Scope::module(module);
        let import = if builder.import_collides(module_scope, name, Some(target)) {
            format!("{path} as _")
        } else {
            path
        };
        builder.add_import(module_scope, &import);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElementToMove;
    use pretty_assertions::assert_eq;

    #[test]
    fn moved_calls_and_stayed_calls_to_moved_traits_are_collected() {
        let analysis = Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    pub trait Greet { fn greet(&self); }\n    pub fn f(x: &dyn Greet) { x.greet(); }\n    pub fn g(x: &dyn Greet) { x.greet(); }\n}\nmod b {}\n",
        )]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(f) = analysis.def_by_path("crate::a::f").unwrap() else {
            panic!("expected an item");
        };
        let Def::Item(greet) = analysis.def_by_path("crate::a::Greet").unwrap() else {
            panic!("expected an item");
        };

        let elements = [ElementToMove::Item(f)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);
        let refs = collect_trait_method_refs(&ctx, &CancellationToken::default()).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].trait_item, greet);

        let elements = [ElementToMove::Item(greet)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);
        let refs = collect_trait_method_refs(&ctx, &CancellationToken::default()).unwrap();
        assert_eq!(refs.len(), 2);
    }
}
