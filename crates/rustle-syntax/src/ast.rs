use crate::TextRange;

/// An identifier together with its source range. Raw identifiers are stored without `r#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub text: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub items: Vec<Item>,
    /// Offset right after the last inner attribute (`#![...]`), or `0`.
    pub inner_attrs_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub name: Option<Name>,
    pub vis: Option<VisSyntax>,
    /// Full range including outer attributes.
    pub range: TextRange,
    /// Start of the item after its attributes; a missing visibility modifier is inserted here.
    pub head_start: usize,
    /// Paths mentioned by this item (signature and body), excluding nested `use` items.
    pub refs: Vec<PathSyntax>,
    /// Single identifiers in pattern position (`let X = ..`, `X => ..`).
    pub pat_idents: Vec<Name>,
    /// Method names in `.name(` call position.
    pub method_calls: Vec<Name>,
    /// Visibility modifiers of fields and nested declarations.
    pub inner_vis: Vec<VisSyntax>,
    /// `use` items nested inside bodies.
    pub nested_uses: Vec<Item>,
}

impl Item {
    pub fn name_text(&self) -> Option<&str> {
        self.name.as_ref().map(|name| name.text.as_str())
    }

    pub fn use_tree(&self) -> Option<&UseTree> {
        match &self.kind {
            ItemKind::Use(tree) => Some(tree),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Mod { body: Option<ModBody> },
    Use(UseTree),
    Fn,
    Struct,
    Union,
    Enum { variants: Vec<Name> },
    Const,
    Static,
    TypeAlias,
    Trait { methods: Vec<Name> },
    Impl {
        trait_ref: Option<PathSyntax>,
        self_ty: Option<PathSyntax>,
        methods: Vec<Name>,
    },
    MacroRules,
    MacroCall,
    ExternCrate { alias: Option<Name> },
}

impl ItemKind {
    pub fn is_fn(&self) -> bool {
        matches!(self, ItemKind::Fn)
    }

    /// Kinds that may appear as a non-final segment of a path.
    pub fn is_path_qualifier(&self) -> bool {
        matches!(
            self,
            ItemKind::Mod { .. }
                | ItemKind::Enum { .. }
                | ItemKind::Struct
                | ItemKind::Union
                | ItemKind::Trait { .. }
                | ItemKind::TypeAlias
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModBody {
    pub items: Vec<Item>,
    pub l_brace: TextRange,
    pub r_brace: TextRange,
    /// Offset after the opening brace and any inner attributes.
    pub items_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathContext {
    Plain,
    /// The path of a macro invocation (`path!(..)`).
    MacroCall,
    Use,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: Name,
    /// Turbofish arguments following the segment (`::<T>`), if any.
    pub generic_args: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSyntax {
    pub range: TextRange,
    pub leading_colon: bool,
    pub segments: Vec<Segment>,
    pub context: PathContext,
}

impl PathSyntax {
    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|segment| segment.name.text.as_str())
    }

    /// Range covering the first `len` segments, without trailing generic arguments.
    pub fn prefix_range(&self, len: usize) -> TextRange {
        let last = &self.segments[len.clamp(1, self.segments.len()) - 1];
        TextRange::new(self.range.start, last.name.range.end)
    }

    pub fn first_segment(&self) -> &str {
        self.segments
            .first()
            .map(|segment| segment.name.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseTree {
    pub range: TextRange,
    pub path: Option<PathSyntax>,
    pub kind: UseTreeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseTreeKind {
    Simple { alias: Option<Name> },
    Glob,
    Group { children: Vec<UseTree>, braces: TextRange },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisSyntax {
    pub range: TextRange,
    pub kind: VisKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisKind {
    Pub,
    Crate,
    SelfScope,
    Super,
    In(PathSyntax),
}
