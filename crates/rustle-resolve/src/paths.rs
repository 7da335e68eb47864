use std::collections::{HashSet, VecDeque};

use crate::db::{Analysis, DefKind, UseBinding};
use crate::ids::{CrateId, Def, ModuleId};
use crate::ResolveError;

/// Longest path (in segments) `find_shortest_importable_path` will consider.
const MAX_IMPORT_PATH_LEN: usize = 12;

impl Analysis {
    /// Module names from the crate root down to `module` (empty for the root).
    pub fn module_path(&self, module: ModuleId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ancestors(module)
            .filter_map(|current| self.module(current).name.as_deref())
            .collect();
        names.reverse();
        names
    }

    /// `crate::a::b` style path of a module, rooted at `crate` even for other crates.
    pub fn crate_relative_path(&self, module: ModuleId) -> String {
        let mut path = String::from("crate");
        for name in self.module_path(module) {
            path.push_str("::");
            path.push_str(name);
        }
        path
    }

    pub fn def_crate(&self, def: Def) -> CrateId {
        match def {
            Def::Module(module) => self.module(module).krate,
            Def::Item(item) => self.module(self.item(item).module).krate,
        }
    }

    pub fn def_name(&self, def: Def) -> Option<&str> {
        match def {
            Def::Module(module) => self.module(module).name.as_deref(),
            Def::Item(item) => self.item(item).name_text(),
        }
    }

    /// Segments naming `def` below its crate root.
    pub fn def_segments(&self, def: Def) -> Option<Vec<&str>> {
        match def {
            Def::Module(module) => Some(self.module_path(module)),
            Def::Item(item) => {
                let data = self.item(item);
                let mut segments = match (data.kind, data.parent) {
                    (DefKind::Variant, Some(parent)) => self.def_segments(Def::Item(parent))?,
                    _ => self.module_path(data.module),
                };
                segments.push(data.name_text()?);
                Some(segments)
            }
        }
    }

    /// Path of `def` starting with `crate` (inside `context_crate`) or with the crate name.
    pub fn qualified_name_in_crate(&self, def: Def, context_crate: CrateId) -> Option<String> {
        let krate = self.def_crate(def);
        let root = if krate == context_crate {
            "crate"
        } else {
            self.crate_data(krate).name.as_str()
        };
        let mut path = root.to_string();
        for segment in self.def_segments(def)? {
            path.push_str("::");
            path.push_str(segment);
        }
        Some(path)
    }

    /// Path of `def` relative to `context` when `def` lives inside it, `self` for the context
    /// module itself, and the crate-qualified path otherwise.
    pub fn qualified_name_relative_to(&self, def: Def, context: ModuleId) -> Option<String> {
        if def == Def::Module(context) {
            return Some("self".to_string());
        }
        let context_crate = self.module(context).krate;
        let anchor = match def {
            Def::Module(module) => self.parent(module),
            Def::Item(item) => Some(self.item(item).module),
        };
        match anchor {
            Some(anchor)
                if self.def_crate(def) == context_crate && self.is_ancestor(context, anchor) =>
            {
                let depth = self.module_path(context).len();
                let segments = self.def_segments(def)?;
                Some(segments[depth..].join("::"))
            }
            _ => self.qualified_name_in_crate(def, context_crate),
        }
    }

    /// Shortest path that can be written in a `use` inside `from` to reach `target`.
    ///
    /// The search walks visible names breadth-first from the crate root of `from` (as `crate`)
    /// and then from the roots of the other library crates (by name), following `pub use`
    /// re-exports. Ties go to the own crate.
    pub fn find_shortest_importable_path(&self, from: ModuleId, target: Def) -> Option<String> {
        let own = self.module(from).krate;
        let mut roots = vec![(self.crate_data(own).root, "crate".to_string())];
        roots.extend(
            self.crates
                .iter()
                .enumerate()
                .filter(|(idx, data)| *idx != own.idx() && data.is_lib)
                .map(|(_, data)| (data.root, data.name.clone())),
        );

        for (root, name) in &roots {
            if target == Def::Module(*root) {
                return Some(name.clone());
            }
        }

        let mut queue: VecDeque<(ModuleId, Vec<String>)> = roots
            .into_iter()
            .map(|(root, name)| (root, vec![name]))
            .collect();
        let mut seen: HashSet<ModuleId> = queue.iter().map(|(module, _)| *module).collect();

        while let Some((module, path)) = queue.pop_front() {
            if path.len() >= MAX_IMPORT_PATH_LEN {
                continue;
            }
            for (name, def) in self.visible_bindings(module, from) {
                let mut next = path.clone();
                next.push(name.to_string());
                if def == target {
                    return Some(next.join("::"));
                }
                match def {
                    Def::Module(child) => {
                        if seen.insert(child) {
                            queue.push_back((child, next));
                        }
                    }
                    Def::Item(item) if self.item(item).kind == DefKind::Enum => {
                        if let Some(variant) = self
                            .item(item)
                            .children
                            .iter()
                            .find(|&&variant| Def::Item(variant) == target)
                        {
                            next.push(self.item(*variant).name_text()?.to_string());
                            return Some(next.join("::"));
                        }
                    }
                    Def::Item(_) => {}
                }
            }
        }
        None
    }

    /// Names declared or re-exported by `module` that `from` may use, in declaration order.
    fn visible_bindings(&self, module: ModuleId, from: ModuleId) -> Vec<(&str, Def)> {
        let mut out = Vec::new();
        for &item in &self.module(module).items {
            let data = self.item(item);
            if !data.kind.binds_name() || !self.is_visible_from(data.vis, module, from) {
                continue;
            }
            if let (Some(name), Some(def)) = (data.name_text(), self.def_for_item(item)) {
                out.push((name, def));
            }
        }
        for &idx in &self.module_leaves[module.idx()] {
            let leaf = &self.leaves[idx];
            let UseBinding::Named(name) = &leaf.binding else {
                continue;
            };
            if !self.is_visible_from(self.item(leaf.item).vis, module, from) {
                continue;
            }
            let segments: Vec<&str> = leaf.segments.iter().map(String::as_str).collect();
            let trace = self.trace_segments(leaf.scope, leaf.leading_colon, &segments, 0, Some(leaf.item));
            if trace.len() == segments.len() {
                if let Some(binding) = trace.last() {
                    out.push((name.as_str(), binding.def));
                }
            }
        }
        out
    }

    /// Look up a module by `crate::a::b` (first crate) or `crate_name::a::b`.
    pub fn module_by_path(&self, path: &str) -> Result<ModuleId, ResolveError> {
        match self.def_by_path(path)? {
            Def::Module(module) => Ok(module),
            Def::Item(_) => Err(ResolveError::NotAModule(path.to_string())),
        }
    }

    /// Look up a declaration by `crate::a::Item` (first crate) or `crate_name::a::Item`.
    pub fn def_by_path(&self, path: &str) -> Result<Def, ResolveError> {
        let unknown = || ResolveError::UnknownPath(path.to_string());
        let mut segments = path.split("::").map(str::trim);
        let root = match segments.next() {
            Some("crate") => self.crates.first().map(|data| data.root),
            Some(name) => self
                .crate_by_name(name)
                .map(|krate| self.crate_data(krate).root),
            None => None,
        }
        .ok_or_else(unknown)?;

        let mut current = Def::Module(root);
        for segment in segments {
            current = match current {
                Def::Module(module) => self
                    .module(module)
                    .items
                    .iter()
                    .copied()
                    .find(|&item| {
                        let data = self.item(item);
                        data.kind.binds_name() && data.name_text() == Some(segment)
                    })
                    .and_then(|item| self.def_for_item(item)),
                Def::Item(item) => self
                    .item(item)
                    .children
                    .iter()
                    .copied()
                    .find(|&variant| self.item(variant).name_text() == Some(segment))
                    .map(Def::Item),
            }
            .ok_or_else(unknown)?;
        }
        Ok(current)
    }
}
