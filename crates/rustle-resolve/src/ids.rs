/// Identifier for a workspace file (a `/`-separated path).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! arena_id {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub(crate) fn idx(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

arena_id!(CrateId, ModuleId, ItemId, PathId, PatId, MethodCallId);

/// A declaration a path can resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Def {
    Module(ModuleId),
    Item(ItemId),
}

/// Where a name is looked up: a module, optionally narrowed to the body of one of its items
/// (for `use` items nested in function bodies).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Scope {
    pub module: ModuleId,
    pub block: Option<ItemId>,
}

impl Scope {
    pub fn module(module: ModuleId) -> Self {
        Self {
            module,
            block: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible in the declaring module and its descendants.
    Private,
    /// Visible in the given module and its descendants.
    Restricted(ModuleId),
    Public,
}
