//! Problems a move would cause, found before anything is edited.

use std::collections::BTreeMap;
use std::fmt;

use rustle_config::MoveConfig;
use rustle_resolve::{Def, DefKind, ItemId, Visibility};
use rustle_syntax::ItemKind;

use crate::context::{ModPath, MoveContext};
use crate::reference_info::MoveReferenceInfo;
use crate::visibility::VisibilityPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConflictKind {
    /// A reference would no longer see its target.
    Visibility,
    /// The target module already has something with the moved element's name.
    NameCollision,
    /// An inherent impl and its type would end up in different crates.
    InherentImpl,
    /// A trait impl would have neither its trait nor its type in its crate.
    OrphanImpl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisibilityChange {
    PubCrate,
    Pub,
}

impl VisibilityChange {
    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityChange::PubCrate => "pub(crate)",
            VisibilityChange::Pub => "pub",
        }
    }
}

impl fmt::Display for VisibilityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widening a declaration's visibility so its references keep working.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisibilityFix {
    pub target: Def,
    pub change: VisibilityChange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveConflict {
    pub element: Def,
    pub kind: ConflictKind,
    pub message: String,
    /// What accepting the conflict does; `None` when it is only reported.
    pub fix: Option<VisibilityFix>,
}

fn describe(ctx: &MoveContext<'_>, def: Def) -> String {
    ctx.analysis
        .qualified_name_in_crate(def, ctx.source_crate())
        .unwrap_or_else(|| "<anonymous>".to_string())
}

/// The declaration whose modifier controls `def`'s visibility: the enum of a variant.
fn visibility_owner(ctx: &MoveContext<'_>, def: Def) -> Def {
    match def {
        Def::Item(item) => {
            let data = ctx.analysis.item(item);
            match (data.kind, data.parent) {
                (DefKind::Variant, Some(parent)) => Def::Item(parent),
                _ => def,
            }
        }
        Def::Module(_) => def,
    }
}

struct Failing {
    locations: Vec<ModPath>,
}

/// Visibility conflicts of references written in the moved code.
pub(crate) fn detect_outside_references_visibility_problems(
    ctx: &MoveContext<'_>,
    infos: &[MoveReferenceInfo],
    config: &MoveConfig,
    policy: &dyn VisibilityPolicy,
) -> Vec<MoveConflict> {
    detect_visibility_problems(ctx, infos, true, config, policy)
}

/// Visibility conflicts of references naming the moved elements.
pub(crate) fn detect_inside_references_visibility_problems(
    ctx: &MoveContext<'_>,
    infos: &[MoveReferenceInfo],
    config: &MoveConfig,
    policy: &dyn VisibilityPolicy,
) -> Vec<MoveConflict> {
    detect_visibility_problems(ctx, infos, false, config, policy)
}

/// Check that every reference still sees its target after the move. `outside` selects whether
/// the references are written in the moved code (true) or name the moved elements (false).
fn detect_visibility_problems(
    ctx: &MoveContext<'_>,
    infos: &[MoveReferenceInfo],
    outside: bool,
    config: &MoveConfig,
    policy: &dyn VisibilityPolicy,
) -> Vec<MoveConflict> {
    let mut failing: BTreeMap<Def, Failing> = BTreeMap::new();
    for info in infos {
        let location = ctx.new_code_location(info.scope, info.owner);
        if ctx.visible_after_move(info.target, &location) {
            continue;
        }
        let owner = visibility_owner(ctx, info.target);
        let entry = failing.entry(owner).or_insert_with(|| Failing {
            locations: Vec::new(),
        });
        if !entry.locations.contains(&location) {
            entry.locations.push(location);
        }
    }

    let mut conflicts = Vec::new();
    for (target, Failing { locations }) in failing {
        let Some(home) = ctx.new_home(target) else {
            continue;
        };
        let same_crate = locations.iter().all(|location| location.krate == home.krate);
        let (vis, _) = ctx.analysis.def_visibility(target);
        let change = match vis {
            Visibility::Public => continue,
            Visibility::Private if config.make_public_within_crate && same_crate => {
                VisibilityChange::PubCrate
            }
            Visibility::Private => VisibilityChange::Pub,
            Visibility::Restricted(_) if same_crate => VisibilityChange::PubCrate,
            Visibility::Restricted(_) => VisibilityChange::Pub,
        };
        let allowed = policy.allow_visibility_increase(ctx.analysis, target, change);
        let name = describe(ctx, target);
        let message = if outside {
            format!(
                "`{name}` is not visible from `{}`, where the moved code will live",
                ctx.target_path().render(ctx.analysis, ctx.source_crate())
            )
        } else {
            format!(
                "`{name}` will not be visible from {} module(s) that use it after the move",
                locations.len()
            )
        };
        tracing::debug!(%name, %change, allowed, "visibility conflict");
        conflicts.push(MoveConflict {
            element: target,
            kind: ConflictKind::Visibility,
            message,
            fix: allowed.then_some(VisibilityFix { target, change }),
        });
    }
    conflicts
}

fn impl_parts(ctx: &MoveContext<'_>, item: ItemId) -> Option<(Option<Def>, Option<Def>, bool)> {
    let analysis = ctx.analysis;
    let data = analysis.item(item);
    let ItemKind::Impl {
        trait_ref, self_ty, ..
    } = &data.syntax.as_ref()?.kind
    else {
        return None;
    };
    let resolve = |path: &Option<rustle_syntax::PathSyntax>| {
        let path = path.as_ref()?;
        let id = analysis.path_at(&data.file, path.range.start)?;
        analysis.resolve_path(id)
    };
    Some((resolve(self_ty), resolve(trait_ref), trait_ref.is_some()))
}

/// Impl blocks that would break when the move crosses a crate boundary: inherent impls must stay
/// with their type, and trait impls must keep their trait or type local.
pub(crate) fn check_impls(ctx: &MoveContext<'_>) -> Vec<MoveConflict> {
    if !ctx.crosses_crates() {
        return Vec::new();
    }
    let analysis = ctx.analysis;
    let mut conflicts = Vec::new();
    for item in analysis.item_ids() {
        let data = analysis.item(item);
        if data.kind != DefKind::Impl || data.parent.is_some() {
            continue;
        }
        let moved_impl = ctx.is_moved_item(item);
        if !moved_impl && analysis.module(data.module).krate != ctx.source_crate() {
            continue;
        }
        let Some((self_def, trait_def, is_trait_impl)) = impl_parts(ctx, item) else {
            continue;
        };

        if !is_trait_impl {
            let Some(self_def) = self_def else {
                continue;
            };
            if ctx.is_moved_def(self_def) != moved_impl {
                let name = describe(ctx, self_def);
                let message = if moved_impl {
                    format!("an inherent impl of `{name}` cannot move to another crate without its type")
                } else {
                    format!("`{name}` cannot move to another crate without its inherent impl")
                };
                conflicts.push(MoveConflict {
                    element: self_def,
                    kind: ConflictKind::InherentImpl,
                    message,
                    fix: None,
                });
            }
            continue;
        }

        let local_to = |def: Option<Def>, moved_side: bool| {
            def.is_some_and(|def| {
                if moved_side {
                    ctx.is_moved_def(def) || analysis.def_crate(def) == ctx.target_crate()
                } else {
                    !ctx.is_moved_def(def) && analysis.def_crate(def) == ctx.source_crate()
                }
            })
        };
        let relevant = moved_impl || self_def.is_some_and(|def| ctx.is_moved_def(def));
        if !relevant {
            continue;
        }
        if !local_to(trait_def, moved_impl) && !local_to(self_def, moved_impl) {
            let element = self_def.unwrap_or(Def::Item(item));
            conflicts.push(MoveConflict {
                element,
                kind: ConflictKind::OrphanImpl,
                message: format!(
                    "a trait impl for `{}` would have neither its trait nor its type in its crate",
                    describe(ctx, element)
                ),
                fix: None,
            });
        }
    }
    conflicts
}

/// Moved elements whose name is already taken in the target module.
pub(crate) fn check_name_collisions(ctx: &MoveContext<'_>) -> Vec<MoveConflict> {
    let analysis = ctx.analysis;
    let mut conflicts = Vec::new();
    for element in ctx.elements {
        let Some(name) = element.name(analysis) else {
            continue;
        };
        let def = element.def();
        let taken_by_item = analysis.module(ctx.target).items.iter().any(|&item| {
            let data = analysis.item(item);
            data.kind.binds_name() && data.name_text() == Some(name)
        });
        let taken_by_import = analysis.module_use_leaves(ctx.target).any(|leaf| {
            matches!(&leaf.binding, rustle_resolve::UseBinding::Named(bound) if bound == name)
                && analysis.lookup_name(rustle_resolve::Scope::module(ctx.target), name)
                    .is_some_and(|binding| binding.def != def)
        });
        if taken_by_item || taken_by_import {
            conflicts.push(MoveConflict {
                element: def,
                kind: ConflictKind::NameCollision,
                message: format!(
                    "`{}` already has something named `{name}`",
                    ctx.target_path().render(analysis, ctx.source_crate())
                ),
                fix: None,
            });
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElementToMove;
    use crate::visibility::ConfigVisibilityPolicy;
    use pretty_assertions::assert_eq;
    use rustle_resolve::Analysis;

    #[test]
    fn name_collisions_are_reported() {
        let analysis = Analysis::from_files([(
            "/src/lib.rs",
            "mod a { pub struct S; }\nmod b { struct S; }\n",
        )]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(s) = analysis.def_by_path("crate::a::S").unwrap() else {
            panic!("expected an item");
        };
        let elements = [ElementToMove::Item(s)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let conflicts = check_name_collisions(&ctx);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::NameCollision);
        assert_eq!(conflicts[0].message, "`crate::b` already has something named `S`");
    }

    #[test]
    fn inherent_impls_must_follow_their_type_across_crates() {
        let analysis = Analysis::from_files([
            (
                "/one/src/lib.rs",
                "mod a {\n    pub struct S;\n    impl S { fn f(&self) {} }\n}\n",
            ),
            ("/two/src/lib.rs", "pub mod b {}\n"),
        ]);
        let a = analysis.module_by_path("one::a").unwrap();
        let b = analysis.module_by_path("two::b").unwrap();
        let Def::Item(s) = analysis.def_by_path("one::a::S").unwrap() else {
            panic!("expected an item");
        };
        let elements = [ElementToMove::Item(s)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);

        let conflicts = check_impls(&ctx);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::InherentImpl);
        assert_eq!(conflicts[0].fix, None);
    }

    #[test]
    fn private_targets_get_a_widening_fix() {
        let analysis = Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    struct Helper;\n    pub fn f() -> Helper { Helper }\n}\nmod b {}\n",
        )]);
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let Def::Item(f) = analysis.def_by_path("crate::a::f").unwrap() else {
            panic!("expected an item");
        };
        let helper = analysis.def_by_path("crate::a::Helper").unwrap();
        let elements = [ElementToMove::Item(f)];
        let ctx = MoveContext::new(&analysis, &elements, a, b);
        let infos: Vec<MoveReferenceInfo> = analysis
            .find_references(helper)
            .into_iter()
            .filter_map(|(path, len)| {
                crate::reference_info::create_outside_reference_info(&ctx, path, len, helper)
            })
            .collect();
        assert_eq!(infos.len(), 2);

        let config = MoveConfig {
            make_public_within_crate: true,
            ..MoveConfig::default()
        };
        let policy = ConfigVisibilityPolicy::from_config(&config);
        let conflicts = detect_visibility_problems(&ctx, &infos, true, &config, &policy);
        assert_eq!(
            conflicts.iter().map(|c| c.fix).collect::<Vec<_>>(),
            vec![Some(VisibilityFix {
                target: helper,
                change: VisibilityChange::PubCrate
            })]
        );
    }
}
