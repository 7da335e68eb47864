use rustle_resolve::{Analysis, CrateId, Def, ItemId, MethodCallId, ModuleId, PathId, Scope};

/// The semantic queries the move refactoring needs from the language model.
///
/// [`Analysis`] implements it; the engine never asks the model anything outside this trait
/// except for structural navigation (items, modules, path occurrences).
pub trait PathResolver: Sync {
    /// What the first `len` own segments of a path occurrence resolve to.
    fn resolve_path_prefix(&self, path: PathId, len: usize) -> Option<Def>;

    /// Whether every name along the first `len` own segments of `path` is visible where the
    /// path is written.
    fn path_prefix_is_accessible(&self, path: PathId, len: usize) -> bool;

    fn find_shortest_importable_path(&self, from: ModuleId, target: Def) -> Option<String>;

    /// Whether `text`, written in `scope`, reaches `target` through visible names.
    fn is_accessible(&self, scope: Scope, text: &str, target: Def) -> bool;

    fn qualified_name_relative_to(&self, target: Def, context: ModuleId) -> Option<String>;

    fn qualified_name_in_crate(&self, target: Def, context_crate: CrateId) -> Option<String>;

    fn resolve_method_call(&self, call: MethodCallId) -> Option<ItemId>;

    fn resolve_path(&self, path: PathId) -> Option<Def>;

    /// Whether the first `len` own segments of `path` name `target` from where they are written.
    fn prefix_reaches(&self, path: PathId, len: usize, target: Def) -> bool {
        self.resolve_path_prefix(path, len) == Some(target)
            && self.path_prefix_is_accessible(path, len)
    }

    /// The shortest importable path from `from`, or the crate-qualified name when nothing
    /// visible reaches `target`.
    fn importable_or_qualified(
        &self,
        from: ModuleId,
        from_crate: CrateId,
        target: Def,
    ) -> Option<String> {
        self.find_shortest_importable_path(from, target)
            .or_else(|| self.qualified_name_in_crate(target, from_crate))
    }
}

impl PathResolver for Analysis {
    fn resolve_path_prefix(&self, path: PathId, len: usize) -> Option<Def> {
        Analysis::resolve_path_prefix(self, path, len)
    }

    fn path_prefix_is_accessible(&self, path: PathId, len: usize) -> bool {
        let trace = self.path_trace(path);
        let end = self.path_prefix_len(path) + len;
        trace.len() >= end && self.trace_is_visible(&trace[..end], self.path(path).scope.module)
    }

    fn find_shortest_importable_path(&self, from: ModuleId, target: Def) -> Option<String> {
        Analysis::find_shortest_importable_path(self, from, target)
    }

    fn is_accessible(&self, scope: Scope, text: &str, target: Def) -> bool {
        self.is_accessible_text(scope, text, target)
    }

    fn qualified_name_relative_to(&self, target: Def, context: ModuleId) -> Option<String> {
        Analysis::qualified_name_relative_to(self, target, context)
    }

    fn qualified_name_in_crate(&self, target: Def, context_crate: CrateId) -> Option<String> {
        Analysis::qualified_name_in_crate(self, target, context_crate)
    }

    fn resolve_method_call(&self, call: MethodCallId) -> Option<ItemId> {
        Analysis::resolve_method_call(self, call)
    }

    fn resolve_path(&self, path: PathId) -> Option<Def> {
        Analysis::resolve_path(self, path)
    }
}
