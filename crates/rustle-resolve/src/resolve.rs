//! Name lookup and path resolution.
//!
//! Resolution walks a path segment by segment and records a [`Binding`] for every segment it
//! manages to resolve. Callers use the trace both to find what a prefix of a path refers to and
//! to check that each step is visible from the place the path is written.

use rustle_syntax::{parse_path_text, PathSyntax};

use crate::db::{Analysis, DefKind, UseBinding};
use crate::ids::{Def, ItemId, ModuleId, PatId, PathId, Scope, Visibility};

/// Import chains longer than this are treated as unresolved (cyclic globs and re-exports).
const MAX_RESOLVE_DEPTH: usize = 32;

/// How one path segment was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub def: Def,
    /// Visibility of the name that was used, which is the visibility of the `use` for
    /// re-exported names.
    pub vis: Visibility,
    /// Module that owns the name.
    pub owner: ModuleId,
    pub via_use: bool,
}

impl Binding {
    fn always_visible(def: Def, owner: ModuleId) -> Self {
        Self {
            def,
            vis: Visibility::Public,
            owner,
            via_use: false,
        }
    }
}

impl Analysis {
    fn is_qualifier(&self, def: Def) -> bool {
        match def {
            Def::Module(_) => true,
            Def::Item(item) => self.item(item).kind.is_type_like(),
        }
    }

    fn item_binding(&self, item: ItemId) -> Option<Binding> {
        let data = self.item(item);
        Some(Binding {
            def: self.def_for_item(item)?,
            vis: data.vis,
            owner: data.module,
            via_use: false,
        })
    }

    /// The name an item introduces into its module.
    fn bound_name(&self, item: ItemId) -> Option<&str> {
        let data = self.item(item);
        if !data.kind.binds_name() {
            return None;
        }
        if let (DefKind::ExternCrate, Some(syntax)) = (data.kind, &data.syntax) {
            if let rustle_syntax::ItemKind::ExternCrate { alias: Some(alias) } = &syntax.kind {
                return Some(alias.text.as_str());
            }
        }
        data.name_text()
    }

    fn leaf_indices(&self, scope: Scope) -> &[usize] {
        match scope.block {
            Some(block) => self
                .block_leaves
                .get(&block)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            None => &self.module_leaves[scope.module.idx()],
        }
    }

    /// Look `name` up among the imports of `scope` (only the block for block scopes).
    fn lookup_in_imports(
        &self,
        scope: Scope,
        name: &str,
        qualifier: bool,
        depth: usize,
        exclude: Option<ItemId>,
    ) -> Option<Binding> {
        let leaves = self.leaf_indices(scope);
        for &idx in leaves {
            let leaf = &self.leaves[idx];
            if Some(leaf.item) == exclude {
                continue;
            }
            if !matches!(&leaf.binding, UseBinding::Named(bound) if bound == name) {
                continue;
            }
            if let Some(def) = self.resolve_leaf(idx, depth + 1) {
                return Some(Binding {
                    def,
                    vis: self.item(leaf.item).vis,
                    owner: scope.module,
                    via_use: true,
                });
            }
        }
        for &idx in leaves {
            let leaf = &self.leaves[idx];
            if leaf.binding != UseBinding::Glob || Some(leaf.item) == exclude {
                continue;
            }
            let Some(base) = self.resolve_leaf(idx, depth + 1) else {
                continue;
            };
            if base == Def::Module(scope.module) && scope.block.is_none() {
                continue;
            }
            if let Some(found) = self.lookup_member_inner(base, name, qualifier, depth + 1, None) {
                return Some(Binding {
                    def: found.def,
                    vis: self.item(leaf.item).vis,
                    owner: scope.module,
                    via_use: true,
                });
            }
        }
        None
    }

    fn lookup_member_inner(
        &self,
        container: Def,
        name: &str,
        qualifier: bool,
        depth: usize,
        exclude: Option<ItemId>,
    ) -> Option<Binding> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        match container {
            Def::Module(module) => {
                let mut fallback = None;
                for &item in &self.module(module).items {
                    if self.bound_name(item) != Some(name) {
                        continue;
                    }
                    let Some(binding) = self.item_binding(item) else {
                        continue;
                    };
                    if !qualifier || self.is_qualifier(binding.def) {
                        return Some(binding);
                    }
                    fallback.get_or_insert(binding);
                }
                if fallback.is_some() {
                    return fallback;
                }
                self.lookup_in_imports(Scope::module(module), name, qualifier, depth, exclude)
            }
            Def::Item(item) => {
                let data = self.item(item);
                if data.kind != DefKind::Enum {
                    return None;
                }
                data.children
                    .iter()
                    .copied()
                    .find(|&variant| self.item(variant).name_text() == Some(name))
                    .map(|variant| Binding {
                        def: Def::Item(variant),
                        vis: data.vis,
                        owner: data.module,
                        via_use: false,
                    })
            }
        }
    }

    /// Resolve `name` as a member of a module or enum.
    pub fn lookup_member(&self, container: Def, name: &str) -> Option<Binding> {
        self.lookup_member_inner(container, name, false, 0, None)
    }

    fn lookup_in_scope(
        &self,
        scope: Scope,
        name: &str,
        qualifier: bool,
        depth: usize,
        exclude: Option<ItemId>,
    ) -> Option<Binding> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        if scope.block.is_some() {
            if let Some(binding) = self.lookup_in_imports(scope, name, qualifier, depth, exclude) {
                return Some(binding);
            }
        }
        if let Some(binding) =
            self.lookup_member_inner(Def::Module(scope.module), name, qualifier, depth, exclude)
        {
            return Some(binding);
        }
        let krate = self.crate_by_name(name)?;
        Some(Binding::always_visible(
            Def::Module(self.crate_data(krate).root),
            scope.module,
        ))
    }

    /// Resolve a name the way an unqualified path segment written in `scope` would be.
    pub fn lookup_name(&self, scope: Scope, name: &str) -> Option<Binding> {
        self.lookup_in_scope(scope, name, false, 0, None)
    }

    fn resolve_leaf(&self, idx: usize, depth: usize) -> Option<Def> {
        let leaf = &self.leaves[idx];
        let segments: Vec<&str> = leaf.segments.iter().map(String::as_str).collect();
        let trace = self.trace_segments(leaf.scope, leaf.leading_colon, &segments, depth, Some(leaf.item));
        if trace.len() == segments.len() {
            trace.last().map(|binding| binding.def)
        } else {
            None
        }
    }

    pub(crate) fn trace_segments(
        &self,
        scope: Scope,
        leading_colon: bool,
        segments: &[&str],
        depth: usize,
        exclude: Option<ItemId>,
    ) -> Vec<Binding> {
        let mut trace = Vec::with_capacity(segments.len());
        let Some((&first, rest)) = segments.split_first() else {
            return trace;
        };
        if depth > MAX_RESOLVE_DEPTH {
            return trace;
        }
        let here = scope.module;
        let root = self.crate_data(self.module(here).krate).root;
        let first_binding = if leading_colon {
            self.crate_by_name(first)
                .map(|krate| Binding::always_visible(Def::Module(self.crate_data(krate).root), here))
        } else {
            match first {
                "crate" => Some(Binding::always_visible(Def::Module(root), here)),
                "self" => Some(Binding::always_visible(Def::Module(here), here)),
                "super" => self
                    .module(here)
                    .parent
                    .map(|parent| Binding::always_visible(Def::Module(parent), here)),
                "Self" => None,
                name => self.lookup_in_scope(scope, name, !rest.is_empty(), depth, exclude),
            }
        };
        let Some(first_binding) = first_binding else {
            return trace;
        };
        trace.push(first_binding);

        for (idx, &segment) in rest.iter().enumerate() {
            let current = trace[trace.len() - 1];
            let qualifier = idx + 1 < rest.len();
            let next = match (segment, current.def) {
                ("self", _) => Some(current),
                ("super", Def::Module(module)) => self
                    .module(module)
                    .parent
                    .map(|parent| Binding::always_visible(Def::Module(parent), here)),
                (name, def) => self.lookup_member_inner(def, name, qualifier, depth, None),
            };
            match next {
                Some(binding) => trace.push(binding),
                None => break,
            }
        }
        trace
    }

    /// Full segment list of a path occurrence, including group prefixes of `use` trees.
    pub fn path_segments(&self, path: PathId) -> (bool, Vec<&str>) {
        let occurrence = self.path(path);
        let own = occurrence.syntax.segment_names();
        match &occurrence.use_site {
            Some(site) if !site.prefix.is_empty() => {
                let mut segments: Vec<&str> = site.prefix.iter().map(String::as_str).collect();
                segments.extend(own);
                (site.prefix_leading_colon, segments)
            }
            _ => (occurrence.syntax.leading_colon, own.collect()),
        }
    }

    /// Number of segments contributed by enclosing `use` groups.
    pub fn path_prefix_len(&self, path: PathId) -> usize {
        self.path(path)
            .use_site
            .as_ref()
            .map(|site| site.prefix.len())
            .unwrap_or(0)
    }

    /// Per-segment resolution of a path occurrence, group prefixes included.
    pub fn path_trace(&self, path: PathId) -> Vec<Binding> {
        let occurrence = self.path(path);
        let (leading_colon, segments) = self.path_segments(path);
        let exclude = occurrence.use_site.as_ref().map(|site| site.item);
        self.trace_segments(occurrence.scope, leading_colon, &segments, 0, exclude)
    }

    /// What the first `len` segments of the occurrence's own text resolve to.
    pub fn resolve_path_prefix(&self, path: PathId, len: usize) -> Option<Def> {
        let trace = self.path_trace(path);
        let idx = self.path_prefix_len(path) + len.checked_sub(1)?;
        trace.get(idx).map(|binding| binding.def)
    }

    pub fn resolve_path(&self, path: PathId) -> Option<Def> {
        let len = self.path(path).syntax.segments.len();
        self.resolve_path_prefix(path, len)
    }

    fn syntax_trace(&self, scope: Scope, syntax: &PathSyntax) -> (usize, Vec<Binding>) {
        let segments: Vec<&str> = syntax.segment_names().collect();
        let trace = self.trace_segments(scope, syntax.leading_colon, &segments, 0, None);
        (segments.len(), trace)
    }

    /// Resolve path text as if it were written in `scope`.
    pub fn resolve_text(&self, scope: Scope, text: &str) -> Option<Def> {
        let syntax = parse_path_text(text)?;
        let (len, trace) = self.syntax_trace(scope, &syntax);
        (trace.len() == len).then(|| trace[len - 1].def)
    }

    /// Whether `text`, written in `scope`, resolves to `target` through names that are all
    /// visible from `scope`.
    pub fn is_accessible_text(&self, scope: Scope, text: &str, target: Def) -> bool {
        let Some(syntax) = parse_path_text(text) else {
            return false;
        };
        let (len, trace) = self.syntax_trace(scope, &syntax);
        trace.len() == len
            && trace[len - 1].def == target
            && self.trace_is_visible(&trace, scope.module)
    }

    /// Whether every binding after the first is visible from `from`.
    pub fn trace_is_visible(&self, trace: &[Binding], from: ModuleId) -> bool {
        trace
            .iter()
            .skip(1)
            .all(|binding| self.is_visible_from(binding.vis, binding.owner, from))
    }

    /// Resolve a lone identifier in pattern position. Only unit-like items can be matched by a
    /// bare name, so anything else is a fresh binding.
    pub fn resolve_pat(&self, pat: PatId) -> Option<Def> {
        let occurrence = self.pat(pat);
        let binding = self.lookup_name(occurrence.scope, &occurrence.name.text)?;
        match binding.def {
            Def::Item(item)
                if matches!(
                    self.item(item).kind,
                    DefKind::Struct | DefKind::Variant | DefKind::Const | DefKind::Static
                ) =>
            {
                Some(binding.def)
            }
            _ => None,
        }
    }
}
