use crate::db::Analysis;
use crate::ids::{Def, ModuleId, Visibility};

impl Analysis {
    pub fn parent(&self, module: ModuleId) -> Option<ModuleId> {
        self.module(module).parent
    }

    /// `module` and its ancestors, innermost first.
    pub fn ancestors(&self, module: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        std::iter::successors(Some(module), move |&current| self.parent(current))
    }

    /// Whether `ancestor` is `module` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: ModuleId, module: ModuleId) -> bool {
        self.ancestors(module).any(|current| current == ancestor)
    }

    pub fn crate_root(&self, module: ModuleId) -> ModuleId {
        self.crate_data(self.module(module).krate).root
    }

    pub fn same_crate(&self, a: ModuleId, b: ModuleId) -> bool {
        self.module(a).krate == self.module(b).krate
    }

    /// Whether a name with `vis`, declared in `owner`, can be named from `from`.
    pub fn is_visible_from(&self, vis: Visibility, owner: ModuleId, from: ModuleId) -> bool {
        match vis {
            Visibility::Public => true,
            Visibility::Private => self.is_ancestor(owner, from),
            Visibility::Restricted(scope) => self.is_ancestor(scope, from),
        }
    }

    /// Declared visibility of a definition and the module declaring it.
    ///
    /// Crate roots have no declaration and count as public.
    pub fn def_visibility(&self, def: Def) -> (Visibility, ModuleId) {
        match def {
            Def::Item(item) => {
                let data = self.item(item);
                (data.vis, data.module)
            }
            Def::Module(module) => {
                let data = self.module(module);
                match (data.decl, data.parent) {
                    (Some(decl), Some(parent)) => (self.item(decl).vis, parent),
                    _ => (Visibility::Public, module),
                }
            }
        }
    }

    pub fn is_def_visible_from(&self, def: Def, from: ModuleId) -> bool {
        let (vis, owner) = self.def_visibility(def);
        self.is_visible_from(vis, owner, from)
    }

    /// The module a definition lives in (its parent, for modules).
    pub fn containing_module(&self, def: Def) -> Option<ModuleId> {
        match def {
            Def::Item(item) => Some(self.item(item).module),
            Def::Module(module) => self.parent(module),
        }
    }
}
