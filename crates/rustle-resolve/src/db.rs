use std::collections::{BTreeMap, HashMap, HashSet};

use rustle_syntax::{
    parse_file, Item, ItemKind, Name, PathSyntax, TextRange, UseTree, UseTreeKind, VisKind,
    VisSyntax,
};

use crate::ids::{CrateId, Def, FileId, ItemId, MethodCallId, ModuleId, PatId, PathId, Scope, Visibility};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateData {
    pub name: String,
    pub root: ModuleId,
    pub root_file: FileId,
    pub is_lib: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleBody {
    pub l_brace: TextRange,
    pub r_brace: TextRange,
    pub items_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleData {
    /// `None` for crate roots.
    pub name: Option<String>,
    pub krate: CrateId,
    pub parent: Option<ModuleId>,
    pub file: FileId,
    /// The `mod name` item declaring this module.
    pub decl: Option<ItemId>,
    /// Brace ranges for inline modules.
    pub body: Option<ModuleBody>,
    /// Direct items in declaration order, excluding `use` items nested in bodies.
    pub items: Vec<ItemId>,
    pub children: Vec<ModuleId>,
    /// Directory holding file modules declared by this module.
    pub(crate) dir: String,
    /// Offset right after inner attributes of a file module.
    pub(crate) inner_attrs_end: usize,
}

impl ModuleData {
    pub fn is_file_root(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Mod,
    Use,
    Fn,
    Struct,
    Union,
    Enum,
    Variant,
    Const,
    Static,
    TypeAlias,
    Trait,
    Impl,
    MacroRules,
    MacroCall,
    ExternCrate,
}

impl DefKind {
    fn of(kind: &ItemKind) -> Self {
        match kind {
            ItemKind::Mod { .. } => DefKind::Mod,
            ItemKind::Use(_) => DefKind::Use,
            ItemKind::Fn => DefKind::Fn,
            ItemKind::Struct => DefKind::Struct,
            ItemKind::Union => DefKind::Union,
            ItemKind::Enum { .. } => DefKind::Enum,
            ItemKind::Const => DefKind::Const,
            ItemKind::Static => DefKind::Static,
            ItemKind::TypeAlias => DefKind::TypeAlias,
            ItemKind::Trait { .. } => DefKind::Trait,
            ItemKind::Impl { .. } => DefKind::Impl,
            ItemKind::MacroRules => DefKind::MacroRules,
            ItemKind::MacroCall => DefKind::MacroCall,
            ItemKind::ExternCrate { .. } => DefKind::ExternCrate,
        }
    }

    /// Kinds that introduce a name into their module.
    pub fn binds_name(self) -> bool {
        !matches!(
            self,
            DefKind::Use | DefKind::Impl | DefKind::MacroCall | DefKind::Variant
        )
    }

    pub fn is_type_like(self) -> bool {
        matches!(
            self,
            DefKind::Struct | DefKind::Union | DefKind::Enum | DefKind::Trait | DefKind::TypeAlias
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    pub kind: DefKind,
    pub name: Option<Name>,
    pub module: ModuleId,
    pub file: FileId,
    pub range: TextRange,
    /// The enum of a variant, or the item whose body holds a nested `use`.
    pub parent: Option<ItemId>,
    pub vis: Visibility,
    /// Module declared by a `mod` item.
    pub child_module: Option<ModuleId>,
    /// Variants of an enum.
    pub children: Vec<ItemId>,
    /// `None` for enum variants.
    pub syntax: Option<Item>,
}

impl ItemData {
    pub fn name_text(&self) -> Option<&str> {
        self.name.as_ref().map(|name| name.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseBinding {
    Named(String),
    /// `use path as _;`
    Underscore,
    Glob,
}

/// One imported path of a `use` item, with group prefixes flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseLeaf {
    pub item: ItemId,
    pub scope: Scope,
    /// Full path; a trailing `self` is already stripped.
    pub segments: Vec<String>,
    pub leading_colon: bool,
    pub binding: UseBinding,
    /// Child indices from the root of the use tree to this leaf.
    pub tree_index: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    pub item: ItemId,
    /// Segments contributed by enclosing group prefixes.
    pub prefix: Vec<String>,
    pub prefix_leading_colon: bool,
    pub tree_index: Vec<usize>,
    /// Member of a group with more than one entry.
    pub in_group: bool,
    /// The path ends the tree (not the prefix of a group).
    pub is_leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOccurrence {
    pub file: FileId,
    pub scope: Scope,
    /// Item containing the path: a top-level item or a `use` item.
    pub owner: ItemId,
    pub syntax: PathSyntax,
    pub use_site: Option<UseSite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOccurrence {
    pub file: FileId,
    pub scope: Scope,
    pub owner: ItemId,
    pub name: Name,
}

/// Immutable semantic snapshot of a set of files.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub(crate) files: BTreeMap<FileId, String>,
    pub(crate) crates: Vec<CrateData>,
    pub(crate) modules: Vec<ModuleData>,
    pub(crate) items: Vec<ItemData>,
    pub(crate) leaves: Vec<UseLeaf>,
    pub(crate) paths: Vec<PathOccurrence>,
    pub(crate) pats: Vec<NameOccurrence>,
    pub(crate) method_calls: Vec<NameOccurrence>,
    pub(crate) module_leaves: Vec<Vec<usize>>,
    pub(crate) block_leaves: HashMap<ItemId, Vec<usize>>,
    pub(crate) path_index: HashMap<(FileId, usize), PathId>,
    pub(crate) item_index: HashMap<(FileId, usize), ItemId>,
    pub(crate) pat_index: HashMap<(FileId, usize), PatId>,
    pub(crate) method_call_index: HashMap<(FileId, usize), MethodCallId>,
    pub(crate) module_by_file: HashMap<FileId, ModuleId>,
}

impl Analysis {
    /// Build a snapshot from file contents keyed by path.
    ///
    /// Crates are discovered from `<dir>/src/lib.rs` and `<dir>/src/main.rs`; the crate name is
    /// the name of `<dir>` (with `-` mapped to `_`). File modules are found through `mod`
    /// declarations using the usual `name.rs` / `name/mod.rs` layout.
    pub fn new(files: BTreeMap<FileId, String>) -> Self {
        let mut builder = Builder {
            analysis: Analysis {
                files,
                crates: Vec::new(),
                modules: Vec::new(),
                items: Vec::new(),
                leaves: Vec::new(),
                paths: Vec::new(),
                pats: Vec::new(),
                method_calls: Vec::new(),
                module_leaves: Vec::new(),
                block_leaves: HashMap::new(),
                path_index: HashMap::new(),
                item_index: HashMap::new(),
                pat_index: HashMap::new(),
                method_call_index: HashMap::new(),
                module_by_file: HashMap::new(),
            },
            claimed: HashSet::new(),
            pending_vis: Vec::new(),
        };

        let roots: Vec<(FileId, String, bool)> = builder
            .analysis
            .files
            .keys()
            .filter_map(|file| {
                let path = file.as_str();
                let (prefix, is_lib) = if let Some(prefix) = path.strip_suffix("src/lib.rs") {
                    (prefix, true)
                } else {
                    (path.strip_suffix("src/main.rs")?, false)
                };
                Some((file.clone(), prefix.to_string(), is_lib))
            })
            .collect();

        for (root_file, prefix, is_lib) in roots {
            builder.add_crate(root_file, &prefix, is_lib);
        }
        builder.resolve_visibilities();
        builder.build_indexes();
        tracing::debug!(
            crates = builder.analysis.crates.len(),
            modules = builder.analysis.modules.len(),
            items = builder.analysis.items.len(),
            paths = builder.analysis.paths.len(),
            "built analysis snapshot"
        );
        builder.analysis
    }

    pub fn from_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            files
                .into_iter()
                .map(|(path, text)| (FileId::new(path), text.to_string()))
                .collect(),
        )
    }

    pub fn files(&self) -> &BTreeMap<FileId, String> {
        &self.files
    }

    pub fn file_text(&self, file: &FileId) -> Option<&str> {
        self.files.get(file).map(String::as_str)
    }

    pub fn crates(&self) -> &[CrateData] {
        &self.crates
    }

    pub fn crate_data(&self, krate: CrateId) -> &CrateData {
        &self.crates[krate.idx()]
    }

    pub fn crate_by_name(&self, name: &str) -> Option<CrateId> {
        self.crates
            .iter()
            .position(|data| data.is_lib && data.name == name)
            .map(|idx| CrateId(idx as u32))
    }

    pub fn module(&self, module: ModuleId) -> &ModuleData {
        &self.modules[module.idx()]
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(|idx| ModuleId(idx as u32))
    }

    pub fn item(&self, item: ItemId) -> &ItemData {
        &self.items[item.idx()]
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        (0..self.items.len()).map(|idx| ItemId(idx as u32))
    }

    pub fn path(&self, path: PathId) -> &PathOccurrence {
        &self.paths[path.idx()]
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> + '_ {
        (0..self.paths.len()).map(|idx| PathId(idx as u32))
    }

    pub fn pat(&self, pat: PatId) -> &NameOccurrence {
        &self.pats[pat.idx()]
    }

    pub fn pat_ids(&self) -> impl Iterator<Item = PatId> + '_ {
        (0..self.pats.len()).map(|idx| PatId(idx as u32))
    }

    pub fn method_call(&self, call: MethodCallId) -> &NameOccurrence {
        &self.method_calls[call.idx()]
    }

    pub fn method_call_ids(&self) -> impl Iterator<Item = MethodCallId> + '_ {
        (0..self.method_calls.len()).map(|idx| MethodCallId(idx as u32))
    }

    pub fn use_leaves(&self) -> &[UseLeaf] {
        &self.leaves
    }

    /// Leaves of `use` items placed directly in `module`.
    pub fn module_use_leaves(&self, module: ModuleId) -> impl Iterator<Item = &UseLeaf> + '_ {
        self.module_leaves[module.idx()]
            .iter()
            .map(move |&idx| &self.leaves[idx])
    }

    pub fn path_at(&self, file: &FileId, offset: usize) -> Option<PathId> {
        self.path_index.get(&(file.clone(), offset)).copied()
    }

    pub fn pat_at(&self, file: &FileId, offset: usize) -> Option<PatId> {
        self.pat_index.get(&(file.clone(), offset)).copied()
    }

    pub fn method_call_at(&self, file: &FileId, offset: usize) -> Option<MethodCallId> {
        self.method_call_index.get(&(file.clone(), offset)).copied()
    }

    /// The top-level item whose range starts at `offset` (used for unnamed items like impls).
    pub fn item_starting_at(&self, file: &FileId, offset: usize) -> Option<ItemId> {
        self.item_ids().find(|&item| {
            let data = self.item(item);
            data.parent.is_none() && &data.file == file && data.range.start == offset
        })
    }

    /// Directory holding the file modules `module` declares, e.g. `/src/a/`.
    pub fn module_dir(&self, module: ModuleId) -> &str {
        &self.module(module).dir
    }

    /// The item whose name starts at `offset`.
    pub fn item_at_name(&self, file: &FileId, offset: usize) -> Option<ItemId> {
        self.item_index.get(&(file.clone(), offset)).copied()
    }

    /// Crate root or file module loaded from `file`.
    pub fn module_for_file(&self, file: &FileId) -> Option<ModuleId> {
        self.module_by_file.get(file).copied()
    }

    /// Offset where new items go at the start of `module`.
    pub fn module_items_start(&self, module: ModuleId) -> usize {
        let data = self.module(module);
        match data.body {
            Some(body) => body.items_start,
            None => data.inner_attrs_end,
        }
    }

    /// Offset where new items go at the end of `module`.
    pub fn module_items_end(&self, module: ModuleId) -> usize {
        let data = self.module(module);
        match data.body {
            Some(body) => body.r_brace.start,
            None => self.file_text(&data.file).map(str::len).unwrap_or(0),
        }
    }
}

struct Builder {
    analysis: Analysis,
    claimed: HashSet<FileId>,
    pending_vis: Vec<(ItemId, Option<VisSyntax>)>,
}

impl Builder {
    fn add_crate(&mut self, root_file: FileId, prefix: &str, is_lib: bool) {
        if !self.claimed.insert(root_file.clone()) {
            return;
        }
        let name = prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("root")
            .replace('-', "_");
        let krate = CrateId(self.analysis.crates.len() as u32);
        let Some(text) = self.analysis.files.get(&root_file).cloned() else {
            return;
        };
        let file = parse_file(&text);
        let root = self.alloc_module(ModuleData {
            name: None,
            krate,
            parent: None,
            file: root_file.clone(),
            decl: None,
            body: None,
            items: Vec::new(),
            children: Vec::new(),
            dir: format!("{prefix}src/"),
            inner_attrs_end: file.inner_attrs_end,
        });
        self.analysis.crates.push(CrateData {
            name,
            root,
            root_file: root_file.clone(),
            is_lib,
        });
        self.analysis.module_by_file.insert(root_file.clone(), root);
        self.lower_items(root, &root_file, &file.items);
    }

    fn alloc_module(&mut self, data: ModuleData) -> ModuleId {
        let id = ModuleId(self.analysis.modules.len() as u32);
        if let Some(parent) = data.parent {
            self.analysis.modules[parent.idx()].children.push(id);
        }
        self.analysis.modules.push(data);
        self.analysis.module_leaves.push(Vec::new());
        id
    }

    fn alloc_item(&mut self, data: ItemData, vis: Option<VisSyntax>) -> ItemId {
        let id = ItemId(self.analysis.items.len() as u32);
        self.analysis.items.push(data);
        self.pending_vis.push((id, vis));
        id
    }

    fn lower_items(&mut self, module: ModuleId, file: &FileId, items: &[Item]) {
        for syntax in items {
            let id = self.alloc_item(
                ItemData {
                    kind: DefKind::of(&syntax.kind),
                    name: syntax.name.clone(),
                    module,
                    file: file.clone(),
                    range: syntax.range,
                    parent: None,
                    vis: Visibility::Private,
                    child_module: None,
                    children: Vec::new(),
                    syntax: Some(syntax.clone()),
                },
                syntax.vis.clone(),
            );
            self.analysis.modules[module.idx()].items.push(id);

            match &syntax.kind {
                ItemKind::Mod { body } => {
                    let child = match (body, syntax.name_text()) {
                        (Some(body), Some(name)) => {
                            let dir = format!("{}{name}/", self.analysis.modules[module.idx()].dir);
                            let child = self.alloc_module(ModuleData {
                                name: Some(name.to_string()),
                                krate: self.analysis.modules[module.idx()].krate,
                                parent: Some(module),
                                file: file.clone(),
                                decl: Some(id),
                                body: Some(ModuleBody {
                                    l_brace: body.l_brace,
                                    r_brace: body.r_brace,
                                    items_start: body.items_start,
                                }),
                                items: Vec::new(),
                                children: Vec::new(),
                                dir,
                                inner_attrs_end: 0,
                            });
                            self.lower_items(child, file, &body.items);
                            Some(child)
                        }
                        (None, Some(name)) => self.load_file_module(module, id, name),
                        _ => None,
                    };
                    self.analysis.items[id.idx()].child_module = child;
                }
                ItemKind::Enum { variants } => {
                    for variant in variants {
                        let variant_id = self.alloc_item(
                            ItemData {
                                kind: DefKind::Variant,
                                name: Some(variant.clone()),
                                module,
                                file: file.clone(),
                                range: variant.range,
                                parent: Some(id),
                                vis: Visibility::Private,
                                child_module: None,
                                children: Vec::new(),
                                syntax: None,
                            },
                            None,
                        );
                        self.analysis.items[id.idx()].children.push(variant_id);
                    }
                }
                ItemKind::Use(tree) => {
                    self.lower_use(id, Scope::module(module), file, tree);
                }
                _ => {}
            }

            let scope = Scope {
                module,
                block: Some(id),
            };
            for nested in &syntax.nested_uses {
                let nested_id = self.alloc_item(
                    ItemData {
                        kind: DefKind::Use,
                        name: None,
                        module,
                        file: file.clone(),
                        range: nested.range,
                        parent: Some(id),
                        vis: Visibility::Private,
                        child_module: None,
                        children: Vec::new(),
                        syntax: Some(nested.clone()),
                    },
                    None,
                );
                if let Some(tree) = nested.use_tree() {
                    self.lower_use(nested_id, scope, file, tree);
                }
            }
            for path in &syntax.refs {
                self.analysis.paths.push(PathOccurrence {
                    file: file.clone(),
                    scope,
                    owner: id,
                    syntax: path.clone(),
                    use_site: None,
                });
            }
            for name in &syntax.pat_idents {
                self.analysis.pats.push(NameOccurrence {
                    file: file.clone(),
                    scope,
                    owner: id,
                    name: name.clone(),
                });
            }
            for name in &syntax.method_calls {
                self.analysis.method_calls.push(NameOccurrence {
                    file: file.clone(),
                    scope,
                    owner: id,
                    name: name.clone(),
                });
            }
        }
    }

    fn load_file_module(&mut self, parent: ModuleId, decl: ItemId, name: &str) -> Option<ModuleId> {
        let dir = self.analysis.modules[parent.idx()].dir.clone();
        let candidates = [format!("{dir}{name}.rs"), format!("{dir}{name}/mod.rs")];
        let file = candidates
            .into_iter()
            .map(FileId::new)
            .find(|file| self.analysis.files.contains_key(file) && !self.claimed.contains(file))?;
        self.claimed.insert(file.clone());
        let text = self.analysis.files.get(&file)?.clone();
        let parsed = parse_file(&text);
        let child = self.alloc_module(ModuleData {
            name: Some(name.to_string()),
            krate: self.analysis.modules[parent.idx()].krate,
            parent: Some(parent),
            file: file.clone(),
            decl: Some(decl),
            body: None,
            items: Vec::new(),
            children: Vec::new(),
            dir: format!("{dir}{name}/"),
            inner_attrs_end: parsed.inner_attrs_end,
        });
        self.analysis.module_by_file.insert(file.clone(), child);
        self.lower_items(child, &file, &parsed.items);
        Some(child)
    }

    fn lower_use(&mut self, item: ItemId, scope: Scope, file: &FileId, tree: &UseTree) {
        let mut index = Vec::new();
        self.lower_use_tree(item, scope, file, tree, &[], false, &mut index, false);
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_use_tree(
        &mut self,
        item: ItemId,
        scope: Scope,
        file: &FileId,
        tree: &UseTree,
        prefix: &[String],
        prefix_leading_colon: bool,
        index: &mut Vec<usize>,
        in_group: bool,
    ) {
        let own: Vec<String> = tree
            .path
            .iter()
            .flat_map(|path| path.segment_names().map(str::to_string))
            .collect();
        let leading_colon = if prefix.is_empty() {
            tree.path.as_ref().is_some_and(|path| path.leading_colon)
        } else {
            prefix_leading_colon
        };
        if let Some(path) = &tree.path {
            self.analysis.paths.push(PathOccurrence {
                file: file.clone(),
                scope,
                owner: item,
                syntax: path.clone(),
                use_site: Some(UseSite {
                    item,
                    prefix: prefix.to_vec(),
                    prefix_leading_colon,
                    tree_index: index.clone(),
                    in_group,
                    is_leaf: !matches!(tree.kind, UseTreeKind::Group { .. }),
                }),
            });
        }

        let mut full = prefix.to_vec();
        full.extend(own);
        match &tree.kind {
            UseTreeKind::Simple { alias } => {
                let mut segments = full;
                if segments.last().map(String::as_str) == Some("self") {
                    segments.pop();
                }
                let Some(last) = segments.last().cloned() else {
                    return;
                };
                let binding = match alias {
                    Some(alias) if alias.text == "_" => UseBinding::Underscore,
                    Some(alias) => UseBinding::Named(alias.text.clone()),
                    None => UseBinding::Named(last),
                };
                self.analysis.leaves.push(UseLeaf {
                    item,
                    scope,
                    segments,
                    leading_colon,
                    binding,
                    tree_index: index.clone(),
                });
            }
            UseTreeKind::Glob => {
                if full.is_empty() {
                    return;
                }
                self.analysis.leaves.push(UseLeaf {
                    item,
                    scope,
                    segments: full,
                    leading_colon,
                    binding: UseBinding::Glob,
                    tree_index: index.clone(),
                });
            }
            UseTreeKind::Group { children, .. } => {
                let grouped = children.len() > 1;
                for (idx, child) in children.iter().enumerate() {
                    index.push(idx);
                    self.lower_use_tree(item, scope, file, child, &full, leading_colon, index, grouped);
                    index.pop();
                }
            }
        }
    }

    fn resolve_visibilities(&mut self) {
        let pending = std::mem::take(&mut self.pending_vis);
        for (item, vis) in pending {
            let module = self.analysis.items[item.idx()].module;
            let resolved = self.resolve_vis(module, vis.as_ref());
            self.analysis.items[item.idx()].vis = resolved;
        }
        // Variants share the visibility of their enum.
        for idx in 0..self.analysis.items.len() {
            if self.analysis.items[idx].kind == DefKind::Variant {
                if let Some(parent) = self.analysis.items[idx].parent {
                    self.analysis.items[idx].vis = self.analysis.items[parent.idx()].vis;
                }
            }
        }
    }

    fn resolve_vis(&self, module: ModuleId, vis: Option<&VisSyntax>) -> Visibility {
        let modules = &self.analysis.modules;
        let Some(vis) = vis else {
            return Visibility::Private;
        };
        match &vis.kind {
            VisKind::Pub => Visibility::Public,
            VisKind::Crate => {
                let krate = modules[module.idx()].krate;
                Visibility::Restricted(self.analysis.crates[krate.idx()].root)
            }
            VisKind::SelfScope => Visibility::Private,
            VisKind::Super => modules[module.idx()]
                .parent
                .map(Visibility::Restricted)
                .unwrap_or(Visibility::Private),
            VisKind::In(path) => self
                .analysis
                .resolve_module_lexically(module, path.segment_names())
                .map(Visibility::Restricted)
                .unwrap_or(Visibility::Private),
        }
    }

    fn build_indexes(&mut self) {
        let analysis = &mut self.analysis;
        for (idx, leaf) in analysis.leaves.iter().enumerate() {
            match leaf.scope.block {
                Some(block) => analysis.block_leaves.entry(block).or_default().push(idx),
                None => analysis.module_leaves[leaf.scope.module.idx()].push(idx),
            }
        }
        for (idx, path) in analysis.paths.iter().enumerate() {
            analysis
                .path_index
                .insert((path.file.clone(), path.syntax.range.start), PathId(idx as u32));
        }
        for (idx, pat) in analysis.pats.iter().enumerate() {
            analysis
                .pat_index
                .insert((pat.file.clone(), pat.name.range.start), PatId(idx as u32));
        }
        for (idx, call) in analysis.method_calls.iter().enumerate() {
            analysis.method_call_index.insert(
                (call.file.clone(), call.name.range.start),
                MethodCallId(idx as u32),
            );
        }
        for (idx, item) in analysis.items.iter().enumerate() {
            if let Some(name) = &item.name {
                analysis
                    .item_index
                    .insert((item.file.clone(), name.range.start), ItemId(idx as u32));
            }
        }
    }
}

impl Analysis {
    /// Resolve a module path of the form allowed in `pub(in ..)`: `crate`, `self`, `super`
    /// and child module names.
    pub fn resolve_module_lexically<'a>(
        &self,
        from: ModuleId,
        segments: impl Iterator<Item = &'a str>,
    ) -> Option<ModuleId> {
        let mut current = from;
        for (idx, segment) in segments.enumerate() {
            current = match segment {
                "crate" if idx == 0 => {
                    let krate = self.modules[from.idx()].krate;
                    self.crates[krate.idx()].root
                }
                "self" if idx == 0 => from,
                "super" => self.modules[current.idx()].parent?,
                name => *self.modules[current.idx()]
                    .children
                    .iter()
                    .find(|child| self.modules[child.idx()].name.as_deref() == Some(name))?,
            };
        }
        Some(current)
    }

    /// What naming `item` refers to: the declared module for `mod` items, the crate root for
    /// `extern crate`, the item itself otherwise.
    pub fn def_for_item(&self, item: ItemId) -> Option<Def> {
        let data = self.item(item);
        match data.kind {
            DefKind::Mod => Some(data.child_module.map(Def::Module).unwrap_or(Def::Item(item))),
            DefKind::ExternCrate => {
                let name = data.name_text()?;
                let krate = self.crate_by_name(name)?;
                Some(Def::Module(self.crate_data(krate).root))
            }
            _ => Some(Def::Item(item)),
        }
    }
}
