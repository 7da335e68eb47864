use std::collections::HashSet;

use rustle_resolve::{Analysis, CrateId, Def, DefKind, ItemId, ModuleId, Scope, Visibility};

use crate::resolver::PathResolver;

/// A declaration being moved: a top-level item of the source module, or one of its child
/// modules (inline or file).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementToMove {
    Item(ItemId),
    Mod(ModuleId),
}

impl ElementToMove {
    pub fn def(self) -> Def {
        match self {
            ElementToMove::Item(item) => Def::Item(item),
            ElementToMove::Mod(module) => Def::Module(module),
        }
    }

    /// The item that spells the element in its parent: the item itself, or the `mod` item.
    pub fn item(self, analysis: &Analysis) -> Option<ItemId> {
        match self {
            ElementToMove::Item(item) => Some(item),
            ElementToMove::Mod(module) => analysis.module(module).decl,
        }
    }

    pub fn name(self, analysis: &Analysis) -> Option<&str> {
        analysis.def_name(self.def())
    }
}

/// A module location described by name, so it can talk about where things will be after the
/// move while only the pre-move snapshot exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ModPath {
    pub(crate) krate: CrateId,
    pub(crate) segments: Vec<String>,
}

impl ModPath {
    pub(crate) fn of(analysis: &Analysis, module: ModuleId) -> Self {
        Self {
            krate: analysis.module(module).krate,
            segments: analysis
                .module_path(module)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub(crate) fn root(krate: CrateId) -> Self {
        Self {
            krate,
            segments: Vec::new(),
        }
    }

    pub(crate) fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self {
            krate: self.krate,
            segments,
        }
    }

    pub(crate) fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            krate: self.krate,
            segments: rest.to_vec(),
        })
    }

    /// `self` is `other` or one of its ancestors.
    pub(crate) fn is_ancestor_of(&self, other: &ModPath) -> bool {
        self.krate == other.krate && other.segments.starts_with(&self.segments)
    }

    /// The innermost module containing both; the root of `other`'s crate across crates.
    pub(crate) fn common_ancestor(&self, other: &ModPath) -> ModPath {
        if self.krate != other.krate {
            return ModPath::root(other.krate);
        }
        let shared = self
            .segments
            .iter()
            .zip(&other.segments)
            .take_while(|(a, b)| a == b)
            .count();
        ModPath {
            krate: self.krate,
            segments: self.segments[..shared].to_vec(),
        }
    }

    /// `crate::a::b`, with the crate name instead of `crate` when seen from another crate.
    pub(crate) fn render(&self, analysis: &Analysis, from_crate: CrateId) -> String {
        let mut out = if self.krate == from_crate {
            "crate".to_string()
        } else {
            analysis.crate_data(self.krate).name.clone()
        };
        for segment in &self.segments {
            out.push_str("::");
            out.push_str(segment);
        }
        out
    }
}

/// Everything the passes need to know about one move: the pre-move snapshot, what moves, and
/// where things end up.
pub(crate) struct MoveContext<'a> {
    pub(crate) analysis: &'a Analysis,
    pub(crate) elements: &'a [ElementToMove],
    pub(crate) source: ModuleId,
    pub(crate) target: ModuleId,
    moved_items: HashSet<ItemId>,
    moved_modules: Vec<ModuleId>,
    target_path: ModPath,
}

impl<'a> MoveContext<'a> {
    pub(crate) fn new(
        analysis: &'a Analysis,
        elements: &'a [ElementToMove],
        source: ModuleId,
        target: ModuleId,
    ) -> Self {
        let moved_items = elements
            .iter()
            .filter_map(|element| element.item(analysis))
            .collect();
        let moved_modules = elements
            .iter()
            .filter_map(|element| match element {
                ElementToMove::Mod(module) => Some(*module),
                ElementToMove::Item(_) => None,
            })
            .collect();
        Self {
            analysis,
            elements,
            source,
            target,
            moved_items,
            moved_modules,
            target_path: ModPath::of(analysis, target),
        }
    }

    pub(crate) fn resolver(&self) -> &'a dyn PathResolver {
        self.analysis
    }

    pub(crate) fn target_path(&self) -> &ModPath {
        &self.target_path
    }

    pub(crate) fn source_crate(&self) -> CrateId {
        self.analysis.module(self.source).krate
    }

    pub(crate) fn target_crate(&self) -> CrateId {
        self.analysis.module(self.target).krate
    }

    pub(crate) fn crosses_crates(&self) -> bool {
        self.source_crate() != self.target_crate()
    }

    /// The moved module `module` is in, if any.
    pub(crate) fn moved_root_of(&self, module: ModuleId) -> Option<ModuleId> {
        self.analysis
            .ancestors(module)
            .find(|ancestor| self.moved_modules.contains(ancestor))
    }

    /// The top-level item containing `item` (itself for top-level items).
    pub(crate) fn top_item(&self, item: ItemId) -> ItemId {
        let mut current = item;
        while let Some(parent) = self.analysis.item(current).parent {
            current = parent;
        }
        current
    }

    pub(crate) fn is_moved_item(&self, item: ItemId) -> bool {
        self.moved_items.contains(&self.top_item(item))
            || self.moved_root_of(self.analysis.item(item).module).is_some()
    }

    pub(crate) fn is_moved_def(&self, def: Def) -> bool {
        match def {
            Def::Module(module) => self.moved_root_of(module).is_some(),
            Def::Item(item) => self.is_moved_item(item),
        }
    }

    /// Whether code written in `scope` by `owner` travels with the move.
    pub(crate) fn is_moved_code(&self, scope: Scope, owner: ItemId) -> bool {
        self.moved_root_of(scope.module).is_some() || self.moved_items.contains(&self.top_item(owner))
    }

    /// Whether the code sits directly in the source module (a moved top-level item, not the
    /// inside of a moved module).
    pub(crate) fn is_moved_top_level_code(&self, scope: Scope, owner: ItemId) -> bool {
        scope.module == self.source && self.moved_items.contains(&self.top_item(owner))
    }

    /// Where `module` will be after the move.
    pub(crate) fn new_module_path(&self, module: ModuleId) -> ModPath {
        let Some(root) = self.moved_root_of(module) else {
            return ModPath::of(self.analysis, module);
        };
        let depth = self.analysis.module_path(root).len();
        let mut path = self.target_path.clone();
        for segment in &self.analysis.module_path(module)[depth - 1..] {
            path.segments.push(segment.to_string());
        }
        path
    }

    /// Module the code written in `scope` by `owner` will live in after the move.
    pub(crate) fn new_code_location(&self, scope: Scope, owner: ItemId) -> ModPath {
        if self.moved_root_of(scope.module).is_none() && self.moved_items.contains(&self.top_item(owner)) {
            self.target_path.clone()
        } else {
            self.new_module_path(scope.module)
        }
    }

    /// Module declaring `def` after the move.
    pub(crate) fn new_home(&self, def: Def) -> Option<ModPath> {
        match def {
            Def::Item(item) => {
                let module = self.analysis.item(item).module;
                if self.moved_items.contains(&self.top_item(item)) && self.moved_root_of(module).is_none() {
                    Some(self.target_path.clone())
                } else {
                    Some(self.new_module_path(module))
                }
            }
            Def::Module(module) => {
                if self.moved_modules.contains(&module) {
                    Some(self.target_path.clone())
                } else {
                    self.analysis
                        .parent(module)
                        .map(|parent| self.new_module_path(parent))
                }
            }
        }
    }

    /// Where `def` itself will be named from after the move, as the module path plus its name.
    pub(crate) fn new_def_path(&self, def: Def) -> Option<ModPath> {
        let home = match def {
            Def::Item(item) if self.analysis.item(item).kind == DefKind::Variant => {
                let parent = self.analysis.item(item).parent?;
                self.new_def_path(Def::Item(parent))?
            }
            _ => self.new_home(def)?,
        };
        Some(home.child(self.analysis.def_name(def)?))
    }

    /// Scope a restriction to `scope` will cover once its item lives in `new_home`: modules
    /// that move along keep covering the same code, modules that stay behind are kept while
    /// they still contain the item and widened to the common ancestor otherwise.
    pub(crate) fn repointed_scope(&self, scope: ModuleId, new_home: &ModPath) -> ModPath {
        if self.moved_root_of(scope).is_some() {
            return self.new_module_path(scope);
        }
        let old = ModPath::of(self.analysis, scope);
        if old.is_ancestor_of(new_home) {
            old
        } else {
            old.common_ancestor(new_home)
        }
    }

    /// The restriction `def` will have after the move (`None` for public), with restricted
    /// visibilities of moved code re-pointed.
    pub(crate) fn post_move_scope(&self, def: Def) -> Option<ModPath> {
        let (vis, _) = self.analysis.def_visibility(def);
        let home = self.new_home(def)?;
        match vis {
            Visibility::Public => None,
            Visibility::Private => Some(home),
            Visibility::Restricted(scope) if self.is_moved_def(def) => {
                Some(self.repointed_scope(scope, &home))
            }
            Visibility::Restricted(scope) => Some(ModPath::of(self.analysis, scope)),
        }
    }

    /// Whether `def` will be visible from code living in `from` after the move.
    pub(crate) fn visible_after_move(&self, def: Def, from: &ModPath) -> bool {
        self.post_move_scope(def)
            .map_or(true, |scope| scope.is_ancestor_of(from))
    }
}
