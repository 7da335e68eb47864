//! Visibility edits: widening declarations that references would no longer see, and re-pointing
//! restricted visibilities of moved code at the modules they are meant to cover.

use std::collections::BTreeMap;

use rustle_config::MoveConfig;
use rustle_resolve::{Analysis, Def, ItemId, ModuleId};
use rustle_syntax::{VisKind, VisSyntax};

use crate::conflicts::{VisibilityChange, VisibilityFix};
use crate::context::{ModPath, MoveContext};
use crate::edit::TextEdit;

/// Decides whether the move may widen a declaration's visibility.
pub trait VisibilityPolicy: Send + Sync {
    fn allow_visibility_increase(
        &self,
        _analysis: &Analysis,
        _target: Def,
        _change: VisibilityChange,
    ) -> bool {
        true
    }
}

/// Policy driven by [`MoveConfig::allow_public_api_changes`]: `pub(crate)` is always fine,
/// `pub` only when public API changes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigVisibilityPolicy {
    allow_public_api_changes: bool,
}

impl ConfigVisibilityPolicy {
    pub fn from_config(config: &MoveConfig) -> Self {
        Self {
            allow_public_api_changes: config.allow_public_api_changes,
        }
    }
}

impl VisibilityPolicy for ConfigVisibilityPolicy {
    fn allow_visibility_increase(
        &self,
        _analysis: &Analysis,
        _target: Def,
        change: VisibilityChange,
    ) -> bool {
        change == VisibilityChange::PubCrate || self.allow_public_api_changes
    }
}

/// The item carrying the modifier for `def`: the `mod` item of a module, the enum of a variant.
fn modifier_item(analysis: &Analysis, def: Def) -> Option<ItemId> {
    match def {
        Def::Module(module) => analysis.module(module).decl,
        Def::Item(item) => Some(analysis.item(item).parent.unwrap_or(item)),
    }
}

fn set_visibility(analysis: &Analysis, item: ItemId, text: &str) -> Option<TextEdit> {
    let data = analysis.item(item);
    let syntax = data.syntax.as_ref()?;
    Some(match &syntax.vis {
        Some(vis) => TextEdit::replace(data.file.clone(), vis.range, text),
        None => TextEdit::insert(data.file.clone(), syntax.head_start, format!("{text} ")),
    })
}

/// What a restriction written in code living in `home` means.
fn restriction_scope(kind: &VisKind, home: &ModPath) -> Option<ModPath> {
    match kind {
        VisKind::Pub | VisKind::SelfScope => None,
        VisKind::Crate => Some(ModPath::root(home.krate)),
        VisKind::Super => home.parent(),
        VisKind::In(path) => {
            let mut current = home.clone();
            for (idx, segment) in path.segment_names().enumerate() {
                current = match segment {
                    "crate" if idx == 0 => ModPath::root(home.krate),
                    "self" if idx == 0 => current,
                    "super" => current.parent()?,
                    name => current.child(name),
                };
            }
            Some(current)
        }
    }
}

fn written_scope(analysis: &Analysis, module: ModuleId, kind: &VisKind) -> Option<ModuleId> {
    match kind {
        VisKind::Pub | VisKind::SelfScope => None,
        VisKind::Crate => Some(analysis.crate_root(module)),
        VisKind::Super => analysis.parent(module),
        VisKind::In(path) => analysis.resolve_module_lexically(module, path.segment_names()),
    }
}

fn render_restriction(ctx: &MoveContext<'_>, scope: &ModPath, home: &ModPath) -> String {
    if scope.segments.is_empty() {
        "pub(crate)".to_string()
    } else if scope == home {
        "pub(self)".to_string()
    } else if Some(scope) == home.parent().as_ref() {
        "pub(super)".to_string()
    } else {
        format!("pub(in {})", scope.render(ctx.analysis, home.krate))
    }
}

fn repoint(
    ctx: &MoveContext<'_>,
    item: ItemId,
    vis: &VisSyntax,
    home: &ModPath,
) -> Option<TextEdit> {
    let analysis = ctx.analysis;
    let data = analysis.item(item);
    let old_scope = written_scope(analysis, data.module, &vis.kind)?;
    let desired = ctx.repointed_scope(old_scope, home);
    let meaning = restriction_scope(&vis.kind, home);
    if meaning.as_ref() == Some(&desired) {
        return None;
    }
    Some(TextEdit::replace(
        data.file.clone(),
        vis.range,
        render_restriction(ctx, &desired, home),
    ))
}

/// Text edits for the accepted visibility fixes and for restricted visibilities in the moved
/// code whose meaning would change.
pub(crate) fn visibility_edits(ctx: &MoveContext<'_>, fixes: &[VisibilityFix]) -> Vec<TextEdit> {
    let analysis = ctx.analysis;
    let mut widest: BTreeMap<ItemId, VisibilityChange> = BTreeMap::new();
    for fix in fixes {
        let Some(item) = modifier_item(analysis, fix.target) else {
            continue;
        };
        let entry = widest.entry(item).or_insert(fix.change);
        *entry = (*entry).max(fix.change);
    }

    let mut edits = Vec::new();
    for (&item, change) in &widest {
        if let Some(edit) = set_visibility(analysis, item, change.as_str()) {
            edits.push(edit);
        }
    }

    for item in analysis.item_ids() {
        let data = analysis.item(item);
        if data.parent.is_some() || !ctx.is_moved_item(item) {
            continue;
        }
        let Some(syntax) = &data.syntax else {
            continue;
        };
        let Some(home) = ctx.new_home(Def::Item(item)) else {
            continue;
        };
        if !widest.contains_key(&item) {
            if let Some(vis) = &syntax.vis {
                edits.extend(repoint(ctx, item, vis, &home));
            }
        }
        for vis in &syntax.inner_vis {
            edits.extend(repoint(ctx, item, vis, &home));
        }
    }
    tracing::debug!(count = edits.len(), "visibility edits");
    edits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElementToMove;
    use crate::edit::apply_text_edits;
    use pretty_assertions::assert_eq;

    #[test]
    fn restrictions_follow_the_modules_they_cover() {
        let text = "mod a {\n    pub mod x {\n        pub(in crate::a) struct S;\n        pub(super) fn f() {}\n    }\n}\nmod b {}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let x = analysis.module_by_path("crate::a::x").unwrap();
        let elements = [ElementToMove::Mod(x)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let edits = visibility_edits(&ctx, &[]);
        let updated = apply_text_edits(text, &edits).unwrap();
        assert_eq!(
            updated,
            "mod a {\n    pub mod x {\n        pub(crate) struct S;\n        pub(crate) fn f() {}\n    }\n}\nmod b {}\n"
        );
    }

    #[test]
    fn fixes_widen_the_declaring_item() {
        let text = "mod a {\n    enum E { V }\n    pub(super) struct S;\n}\n";
        let analysis = Analysis::from_files([("/src/lib.rs", text)]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let variant = analysis.def_by_path("crate::a::E::V").unwrap();
        let s = analysis.def_by_path("crate::a::S").unwrap();
        let elements: [ElementToMove; 0] = [];
        let ctx = MoveContext::new(&analysis, &elements, a, a);

        let edits = visibility_edits(
            &ctx,
            &[
                VisibilityFix {
                    target: variant,
                    change: VisibilityChange::PubCrate,
                },
                VisibilityFix {
                    target: s,
                    change: VisibilityChange::Pub,
                },
            ],
        );
        assert_eq!(
            apply_text_edits(text, &edits).unwrap(),
            "mod a {\n    pub(crate) enum E { V }\n    pub struct S;\n}\n"
        );
    }

    #[test]
    fn config_policy_refuses_pub_without_api_changes() {
        let analysis = Analysis::from_files([("/src/lib.rs", "struct S;\n")]);
        let s = analysis.def_by_path("crate::S").unwrap();
        let policy = ConfigVisibilityPolicy::from_config(&MoveConfig {
            allow_public_api_changes: false,
            ..MoveConfig::default()
        });
        assert!(policy.allow_visibility_increase(&analysis, s, VisibilityChange::PubCrate));
        assert!(!policy.allow_visibility_increase(&analysis, s, VisibilityChange::Pub));
    }
}
