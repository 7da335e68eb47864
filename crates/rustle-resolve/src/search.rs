use rustle_syntax::ItemKind;

use crate::db::{Analysis, DefKind, UseBinding};
use crate::ids::{Def, ItemId, MethodCallId, PatId, PathId, Scope};

impl Analysis {
    /// Every path occurrence with a prefix resolving to `def`, paired with the length (in own
    /// segments) of that prefix. `use` group prefixes count once, on the path that spells them.
    pub fn find_references(&self, def: Def) -> Vec<(PathId, usize)> {
        let mut out = Vec::new();
        for path in self.path_ids() {
            let prefix_len = self.path_prefix_len(path);
            let trace = self.path_trace(path);
            let Some(idx) = trace.iter().position(|binding| binding.def == def) else {
                continue;
            };
            if idx >= prefix_len {
                out.push((path, idx + 1 - prefix_len));
            }
        }
        out
    }

    /// Pattern identifiers that name `def` (unit structs, variants, constants).
    pub fn find_pat_references(&self, def: Def) -> Vec<PatId> {
        self.pat_ids()
            .filter(|&pat| self.resolve_pat(pat) == Some(def))
            .collect()
    }

    /// Traits whose methods are callable in `scope` by method syntax.
    pub fn traits_in_scope(&self, scope: Scope) -> Vec<ItemId> {
        let mut traits = Vec::new();
        let push = |def: Def, traits: &mut Vec<ItemId>| {
            if let Def::Item(item) = def {
                if self.item(item).kind == DefKind::Trait && !traits.contains(&item) {
                    traits.push(item);
                }
            }
        };

        for &item in &self.module(scope.module).items {
            if self.item(item).kind == DefKind::Trait {
                push(Def::Item(item), &mut traits);
            }
        }
        let mut leaf_lists = vec![&self.module_leaves[scope.module.idx()]];
        if let Some(leaves) = scope.block.and_then(|block| self.block_leaves.get(&block)) {
            leaf_lists.push(leaves);
        }
        for &idx in leaf_lists.into_iter().flatten() {
            let leaf = &self.leaves[idx];
            let segments: Vec<&str> = leaf.segments.iter().map(String::as_str).collect();
            let trace = self.trace_segments(leaf.scope, leaf.leading_colon, &segments, 0, Some(leaf.item));
            if trace.len() != segments.len() {
                continue;
            }
            let Some(base) = trace.last().map(|binding| binding.def) else {
                continue;
            };
            match (&leaf.binding, base) {
                (UseBinding::Glob, Def::Module(module)) => {
                    for &item in &self.module(module).items {
                        let data = self.item(item);
                        if data.kind == DefKind::Trait
                            && self.is_visible_from(data.vis, module, scope.module)
                        {
                            push(Def::Item(item), &mut traits);
                        }
                    }
                }
                (UseBinding::Glob, _) => {}
                (_, def) => push(def, &mut traits),
            }
        }
        traits
    }

    /// Method names a trait declares.
    pub fn trait_methods(&self, item: ItemId) -> &[rustle_syntax::Name] {
        match self.item(item).syntax.as_ref().map(|syntax| &syntax.kind) {
            Some(ItemKind::Trait { methods }) => methods.as_slice(),
            _ => &[],
        }
    }

    fn has_inherent_method(&self, name: &str) -> bool {
        self.items.iter().any(|data| match data.syntax.as_ref().map(|syntax| &syntax.kind) {
            Some(ItemKind::Impl {
                trait_ref: None,
                methods,
                ..
            }) => methods.iter().any(|method| method.text == name),
            _ => false,
        })
    }

    /// The trait a method call goes through, when it can be told by name alone: exactly one
    /// trait in scope declares the method and no inherent impl has a method of that name.
    pub fn resolve_method_call(&self, call: MethodCallId) -> Option<ItemId> {
        let occurrence = self.method_call(call);
        let name = occurrence.name.text.as_str();
        if self.has_inherent_method(name) {
            return None;
        }
        let mut candidates = self
            .traits_in_scope(occurrence.scope)
            .into_iter()
            .filter(|&item| self.trait_methods(item).iter().any(|method| method.text == name));
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }

    /// Method calls that could go through `trait_item` if it were in scope.
    pub fn method_calls_named_in(&self, trait_item: ItemId) -> Vec<MethodCallId> {
        let methods = self.trait_methods(trait_item);
        self.method_call_ids()
            .filter(|&call| {
                let name = &self.method_call(call).name.text;
                methods.iter().any(|method| &method.text == name)
            })
            .collect()
    }
}
