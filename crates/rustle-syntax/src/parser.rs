use crate::ast::{
    Item, ItemKind, ModBody, Name, PathContext, PathSyntax, Segment, SourceFile, UseTree,
    UseTreeKind, VisKind, VisSyntax,
};
use crate::lexer::{lex, Token, TokenKind};
use crate::TextRange;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "yield",
];

/// Keywords that may start a path.
const PATH_KEYWORDS: &[&str] = &["crate", "self", "super", "Self"];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Parse a Rust file into its item tree.
///
/// The parser is tolerant: tokens it does not understand are skipped, so partially
/// written code still yields the items around it.
pub fn parse_file(src: &str) -> SourceFile {
    let mut parser = Parser::new(src);
    let inner_attrs_end = parser.skip_inner_attrs().unwrap_or(0);
    let items = parser.parse_items(false);
    SourceFile {
        items,
        inner_attrs_end,
    }
}

/// Parse a standalone path such as `crate::a::S` or `::dep::x`.
pub fn parse_path_text(text: &str) -> Option<PathSyntax> {
    let parser = Parser::new(text);
    let (path, next) = parser.parse_path_at(0, PathContext::Plain)?;
    if next != parser.tokens.len() {
        return None;
    }
    Some(path)
}

/// Parse the tree of a standalone `use` item such as `use a::{b, c};`.
pub fn parse_use_text(text: &str) -> Option<UseTree> {
    let file = parse_file(text);
    match file.items.into_iter().next()?.kind {
        ItemKind::Use(tree) => Some(tree),
        _ => None,
    }
}

#[derive(Default)]
struct Scan {
    refs: Vec<PathSyntax>,
    pat_idents: Vec<Name>,
    method_calls: Vec<Name>,
    inner_vis: Vec<VisSyntax>,
    nested_uses: Vec<Item>,
}

#[derive(Clone, Copy)]
enum Terminator {
    Semi,
    SemiOrBlock,
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            tokens: lex(src),
            pos: 0,
        }
    }

    fn tok(&self, idx: usize) -> Option<Token> {
        self.tokens.get(idx).copied()
    }

    fn text(&self, idx: usize) -> &'a str {
        self.tokens
            .get(idx)
            .map(|token| token.range.slice(self.src))
            .unwrap_or("")
    }

    fn is_punct(&self, idx: usize, ch: char) -> bool {
        self.tok(idx).is_some_and(|token| token.is_punct(ch))
    }

    fn is_kind(&self, idx: usize, kind: TokenKind) -> bool {
        self.tok(idx).is_some_and(|token| token.kind == kind)
    }

    fn is_ident(&self, idx: usize) -> bool {
        self.is_kind(idx, TokenKind::Ident)
    }

    fn is_word(&self, idx: usize, word: &str) -> bool {
        self.is_ident(idx) && self.text(idx) == word
    }

    /// An identifier that is not a reserved word.
    fn is_plain_ident(&self, idx: usize) -> bool {
        self.is_ident(idx) && !is_keyword(self.text(idx))
    }

    fn name_at(&self, idx: usize) -> Name {
        let text = self.text(idx);
        let range = self.tokens[idx].range;
        Name {
            text: text.strip_prefix("r#").unwrap_or(text).to_string(),
            range,
        }
    }

    fn end_of(&self, idx: usize) -> usize {
        self.tok(idx)
            .or_else(|| self.tokens.last().copied())
            .map(|token| token.range.end)
            .unwrap_or(0)
    }

    /// Index of the token closing the delimiter at `open`.
    fn matching(&self, open: usize) -> usize {
        let mut depth = 0usize;
        for idx in open..self.tokens.len() {
            match self.tokens[idx].kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return idx;
                    }
                }
                _ => {}
            }
        }
        self.tokens.len().saturating_sub(1)
    }

    /// Index of the `>` closing the `<` at `open`.
    fn matching_angle(&self, open: usize) -> usize {
        let mut depth = 0usize;
        let mut idx = open;
        while idx < self.tokens.len() {
            match self.tokens[idx].kind {
                TokenKind::Punct('<') => depth += 1,
                TokenKind::Punct('>') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return idx;
                    }
                }
                TokenKind::Punct('(' | '[' | '{') => {
                    idx = self.matching(idx);
                }
                TokenKind::Punct(';' | '}') => return idx.saturating_sub(1),
                _ => {}
            }
            idx += 1;
        }
        self.tokens.len().saturating_sub(1)
    }

    fn item_end(&self, from: usize, terminator: Terminator) -> usize {
        let mut idx = from;
        while idx < self.tokens.len() {
            match self.tokens[idx].kind {
                TokenKind::Punct(';') => return idx,
                TokenKind::Punct('{') => {
                    let close = self.matching(idx);
                    if matches!(terminator, Terminator::SemiOrBlock) {
                        return close;
                    }
                    idx = close;
                }
                TokenKind::Punct('(' | '[') => idx = self.matching(idx),
                TokenKind::Punct('}') => return idx.saturating_sub(1).max(from),
                _ => {}
            }
            idx += 1;
        }
        self.tokens.len().saturating_sub(1)
    }

    fn skip_attr(&self, idx: usize) -> Option<usize> {
        if !self.is_punct(idx, '#') {
            return None;
        }
        let open = if self.is_punct(idx + 1, '!') { idx + 2 } else { idx + 1 };
        if !self.is_punct(open, '[') {
            return None;
        }
        Some(self.matching(open) + 1)
    }

    fn skip_inner_attrs(&mut self) -> Option<usize> {
        let mut end = None;
        while self.is_punct(self.pos, '#') && self.is_punct(self.pos + 1, '!') {
            let Some(next) = self.skip_attr(self.pos) else {
                break;
            };
            end = Some(self.end_of(next - 1));
            self.pos = next;
        }
        end
    }

    fn parse_items(&mut self, until_rbrace: bool) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(token) = self.tok(self.pos) {
            if token.is_punct('}') {
                if until_rbrace {
                    break;
                }
                self.pos += 1;
                continue;
            }
            if token.is_punct(';') {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            match self.parse_item() {
                Some(item) => items.push(item),
                None => {
                    tracing::trace!(text = self.text(start), "skipping token outside of an item");
                    self.pos = start + 1;
                }
            }
        }
        items
    }

    fn parse_item(&mut self) -> Option<Item> {
        let start = self.tok(self.pos)?.range.start;
        while let Some(next) = self.skip_attr(self.pos) {
            self.pos = next;
        }
        let head_start = self.tok(self.pos)?.range.start;
        let vis = if self.is_word(self.pos, "pub") {
            let (vis, next) = self.parse_vis_at(self.pos);
            self.pos = next;
            Some(vis)
        } else {
            None
        };

        // Qualifiers that do not change the item kind.
        loop {
            let word = self.text(self.pos);
            match word {
                "default" | "unsafe" | "async" | "auto" if self.is_ident(self.pos + 1) => {
                    self.pos += 1
                }
                "const" if matches!(self.text(self.pos + 1), "fn" | "unsafe" | "async" | "extern") => {
                    self.pos += 1
                }
                "extern" if self.is_kind(self.pos + 1, TokenKind::Literal) && self.is_ident(self.pos + 2) => {
                    self.pos += 2
                }
                "extern" if self.is_word(self.pos + 1, "fn") => self.pos += 1,
                _ => break,
            }
        }

        let kw = self.pos;
        let word = if self.is_ident(kw) { self.text(kw) } else { "" };
        let mut item = Item {
            kind: ItemKind::Fn,
            name: None,
            vis,
            range: TextRange::empty(start),
            head_start,
            refs: Vec::new(),
            pat_idents: Vec::new(),
            method_calls: Vec::new(),
            inner_vis: Vec::new(),
            nested_uses: Vec::new(),
        };

        let end = match word {
            "mod" if self.is_plain_ident(kw + 1) => {
                item.name = Some(self.name_at(kw + 1));
                if self.is_punct(kw + 2, '{') {
                    self.pos = kw + 3;
                    let l_brace = self.tokens[kw + 2].range;
                    let items_start = self.skip_inner_attrs().unwrap_or(l_brace.end);
                    let items = self.parse_items(true);
                    let close = self.pos.min(self.tokens.len().saturating_sub(1));
                    let r_brace = self.tokens[close].range;
                    item.kind = ItemKind::Mod {
                        body: Some(ModBody {
                            items,
                            l_brace,
                            r_brace,
                            items_start,
                        }),
                    };
                    close
                } else {
                    item.kind = ItemKind::Mod { body: None };
                    self.item_end(kw + 2, Terminator::Semi)
                }
            }
            "use" => {
                let (tree, end) = self.parse_use_item_at(kw);
                item.kind = ItemKind::Use(tree);
                end
            }
            "extern" if self.is_word(kw + 1, "crate") && self.is_ident(kw + 2) => {
                item.name = Some(self.name_at(kw + 2));
                let mut alias = None;
                if self.is_word(kw + 3, "as") && self.is_ident(kw + 4) {
                    alias = Some(self.name_at(kw + 4));
                }
                item.kind = ItemKind::ExternCrate { alias };
                self.item_end(kw + 3, Terminator::Semi)
            }
            "fn" | "struct" | "trait" | "type" if self.is_plain_ident(kw + 1) => {
                item.name = Some(self.name_at(kw + 1));
                let terminator = if word == "type" {
                    Terminator::Semi
                } else {
                    Terminator::SemiOrBlock
                };
                let end = self.item_end(kw + 2, terminator);
                item.kind = match word {
                    "fn" => ItemKind::Fn,
                    "struct" => ItemKind::Struct,
                    "type" => ItemKind::TypeAlias,
                    _ => ItemKind::Trait {
                        methods: self.fn_names_in_block(kw + 2, end),
                    },
                };
                self.scan_into(kw + 2, end + 1, &mut item);
                end
            }
            "union"
                if self.is_plain_ident(kw + 1)
                    && (self.is_punct(kw + 2, '{') || self.is_punct(kw + 2, '<')) =>
            {
                item.name = Some(self.name_at(kw + 1));
                item.kind = ItemKind::Union;
                let end = self.item_end(kw + 2, Terminator::SemiOrBlock);
                self.scan_into(kw + 2, end + 1, &mut item);
                end
            }
            "enum" if self.is_plain_ident(kw + 1) => {
                item.name = Some(self.name_at(kw + 1));
                let end = self.item_end(kw + 2, Terminator::SemiOrBlock);
                let body = (kw + 2..=end).find(|&idx| self.is_punct(idx, '{'));
                let header_end = body.unwrap_or(end + 1);
                self.scan_into(kw + 2, header_end, &mut item);
                let variants = match body {
                    Some(open) => self.parse_variants(open, end, &mut item),
                    None => Vec::new(),
                };
                item.kind = ItemKind::Enum { variants };
                end
            }
            "const" | "static" => {
                let mut name_idx = kw + 1;
                if self.is_word(name_idx, "mut") {
                    name_idx += 1;
                }
                if self.is_plain_ident(name_idx) || self.is_word(name_idx, "_") {
                    item.name = Some(self.name_at(name_idx));
                }
                item.kind = if word == "const" {
                    ItemKind::Const
                } else {
                    ItemKind::Static
                };
                let end = self.item_end(name_idx + 1, Terminator::Semi);
                self.scan_into(name_idx + 1, end + 1, &mut item);
                end
            }
            "impl" => {
                let end = self.item_end(kw + 1, Terminator::SemiOrBlock);
                let (trait_ref, self_ty) = self.impl_header(kw + 1);
                let methods = self.fn_names_in_block(kw + 1, end);
                item.kind = ItemKind::Impl {
                    trait_ref,
                    self_ty,
                    methods,
                };
                self.scan_into(kw + 1, end + 1, &mut item);
                end
            }
            "macro_rules" if self.is_punct(kw + 1, '!') && self.is_ident(kw + 2) => {
                item.name = Some(self.name_at(kw + 2));
                item.kind = ItemKind::MacroRules;
                let close = self.matching(kw + 3);
                if self.is_punct(close + 1, ';') {
                    close + 1
                } else {
                    close
                }
            }
            _ => {
                let is_path_start = self.is_plain_ident(kw)
                    || PATH_KEYWORDS.contains(&word)
                    || self.is_kind(kw, TokenKind::PathSep);
                if !is_path_start {
                    return None;
                }
                let (path, next) = self.parse_path_at(kw, PathContext::MacroCall)?;
                if !self.is_punct(next, '!') {
                    return None;
                }
                let open = next + 1;
                if !matches!(
                    self.tok(open).map(|token| token.kind),
                    Some(TokenKind::Punct('(' | '[' | '{'))
                ) {
                    return None;
                }
                let close = self.matching(open);
                item.kind = ItemKind::MacroCall;
                item.refs.push(path);
                self.scan_into(open + 1, close, &mut item);
                if self.is_punct(close + 1, ';') {
                    close + 1
                } else {
                    close
                }
            }
        };

        item.range = TextRange::new(start, self.end_of(end).max(start));
        self.pos = end + 1;
        Some(item)
    }

    fn parse_vis_at(&self, idx: usize) -> (VisSyntax, usize) {
        let pub_range = self.tokens[idx].range;
        let simple = (
            VisSyntax {
                range: pub_range,
                kind: VisKind::Pub,
            },
            idx + 1,
        );
        if !self.is_punct(idx + 1, '(') {
            return simple;
        }
        let close = self.matching(idx + 1);
        let kind = match self.text(idx + 2) {
            "crate" if close == idx + 3 => VisKind::Crate,
            "self" if close == idx + 3 => VisKind::SelfScope,
            "super" if close == idx + 3 => VisKind::Super,
            "in" => match self.parse_path_at(idx + 3, PathContext::Plain) {
                Some((path, next)) if next == close => VisKind::In(path),
                _ => return simple,
            },
            _ => return simple,
        };
        (
            VisSyntax {
                range: TextRange::new(pub_range.start, self.end_of(close)),
                kind,
            },
            close + 1,
        )
    }

    /// Parses `use tree;` with `idx` on the `use` keyword. Returns the tree and the index of
    /// the item's last token.
    fn parse_use_item_at(&self, idx: usize) -> (UseTree, usize) {
        let mut pos = idx + 1;
        let tree = self.parse_use_tree(&mut pos);
        let end = if self.is_punct(pos, ';') {
            pos
        } else {
            pos.saturating_sub(1).max(idx)
        };
        (tree, end)
    }

    fn parse_use_tree(&self, pos: &mut usize) -> UseTree {
        let start_idx = *pos;
        let start = self
            .tok(start_idx)
            .map(|token| token.range.start)
            .unwrap_or_else(|| self.end_of(start_idx));
        let mut path = None;
        let mut leading_colon = false;
        if self.is_kind(*pos, TokenKind::PathSep) {
            leading_colon = true;
            *pos += 1;
        }

        let mut segments = Vec::new();
        let mut path_end = start;
        let mut trailing_sep = false;
        while self.is_ident(*pos) && !self.is_word(*pos, "as") {
            segments.push(Segment {
                name: self.name_at(*pos),
                generic_args: None,
            });
            path_end = self.tokens[*pos].range.end;
            *pos += 1;
            if self.is_kind(*pos, TokenKind::PathSep) {
                *pos += 1;
                if !self.is_ident(*pos) {
                    trailing_sep = true;
                    break;
                }
            } else {
                break;
            }
        }
        if !segments.is_empty() {
            path = Some(PathSyntax {
                range: TextRange::new(start, path_end),
                leading_colon,
                segments,
                context: PathContext::Use,
            });
        }
        if trailing_sep && !self.is_punct(*pos, '*') && !self.is_punct(*pos, '{') {
            tracing::trace!(offset = path_end, "`use` path ends with `::`");
        }

        let kind = if self.is_punct(*pos, '*') {
            *pos += 1;
            UseTreeKind::Glob
        } else if self.is_punct(*pos, '{') {
            let open = *pos;
            let close = self.matching(open);
            *pos += 1;
            let mut children = Vec::new();
            while *pos < close {
                if self.is_punct(*pos, ',') {
                    *pos += 1;
                    continue;
                }
                let before = *pos;
                children.push(self.parse_use_tree(pos));
                if *pos == before {
                    *pos += 1;
                }
            }
            *pos = close + 1;
            UseTreeKind::Group {
                children,
                braces: TextRange::new(self.tokens[open].range.start, self.end_of(close)),
            }
        } else {
            let mut alias = None;
            if self.is_word(*pos, "as") && self.is_ident(*pos + 1) {
                alias = Some(self.name_at(*pos + 1));
                *pos += 2;
            }
            UseTreeKind::Simple { alias }
        };

        let end = if *pos > start_idx {
            self.end_of(*pos - 1)
        } else {
            start
        };
        UseTree {
            range: TextRange::new(start, end.max(start)),
            path,
            kind,
        }
    }

    /// Parses a path starting at `idx`. Returns the path and the index of the first token
    /// after it.
    fn parse_path_at(&self, idx: usize, context: PathContext) -> Option<(PathSyntax, usize)> {
        let start = self.tok(idx)?.range.start;
        let mut pos = idx;
        let leading_colon = self.is_kind(pos, TokenKind::PathSep);
        if leading_colon {
            pos += 1;
        }
        let mut segments = Vec::new();
        loop {
            if !self.is_ident(pos) {
                break;
            }
            let word = self.text(pos);
            if is_keyword(word) && !PATH_KEYWORDS.contains(&word) {
                break;
            }
            let name = self.name_at(pos);
            pos += 1;
            let mut generic_args = None;
            if self.is_kind(pos, TokenKind::PathSep) && self.is_punct(pos + 1, '<') {
                let close = self.matching_angle(pos + 1);
                generic_args = Some(TextRange::new(
                    self.tokens[pos].range.start,
                    self.end_of(close),
                ));
                pos = close + 1;
            }
            segments.push(Segment { name, generic_args });
            if self.is_kind(pos, TokenKind::PathSep) && self.is_ident(pos + 1) {
                pos += 1;
                continue;
            }
            break;
        }
        let last = segments.last()?;
        let end = last
            .generic_args
            .map(|args| args.end)
            .unwrap_or(last.name.range.end);
        Some((
            PathSyntax {
                range: TextRange::new(start, end),
                leading_colon,
                segments,
                context,
            },
            pos,
        ))
    }

    fn impl_header(&self, from: usize) -> (Option<PathSyntax>, Option<PathSyntax>) {
        let mut pos = from;
        if self.is_punct(pos, '<') {
            pos = self.matching_angle(pos) + 1;
        }
        if self.is_punct(pos, '!') {
            pos += 1;
        }
        let Some((first, next)) = self.parse_path_at(pos, PathContext::Plain) else {
            return (None, None);
        };
        let mut pos = next;
        if self.is_punct(pos, '<') {
            pos = self.matching_angle(pos) + 1;
        }
        if self.is_word(pos, "for") {
            pos += 1;
            while self.is_punct(pos, '&') || self.is_word(pos, "mut") || self.is_word(pos, "dyn") {
                pos += 1;
            }
            let self_ty = self
                .parse_path_at(pos, PathContext::Plain)
                .map(|(path, _)| path);
            return (Some(first), self_ty);
        }
        (None, Some(first))
    }

    fn fn_names_in_block(&self, from: usize, end: usize) -> Vec<Name> {
        let Some(open) = (from..=end).find(|&idx| self.is_punct(idx, '{')) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut depth = 0usize;
        for idx in open..=end.min(self.tokens.len().saturating_sub(1)) {
            match self.tokens[idx].kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => depth = depth.saturating_sub(1),
                TokenKind::Ident if depth == 1 && self.text(idx) == "fn" => {
                    if self.is_plain_ident(idx + 1) {
                        names.push(self.name_at(idx + 1));
                    }
                }
                _ => {}
            }
        }
        names
    }

    fn parse_variants(&self, open: usize, close: usize, item: &mut Item) -> Vec<Name> {
        let mut variants = Vec::new();
        let mut pos = open + 1;
        while pos < close {
            if let Some(next) = self.skip_attr(pos) {
                pos = next;
                continue;
            }
            if self.is_punct(pos, ',') {
                pos += 1;
                continue;
            }
            if self.is_plain_ident(pos) {
                variants.push(self.name_at(pos));
                pos += 1;
            }
            // Payload and discriminant up to the next top-level comma.
            let from = pos;
            while pos < close && !self.is_punct(pos, ',') {
                if matches!(
                    self.tokens[pos].kind,
                    TokenKind::Punct('(' | '[' | '{')
                ) {
                    pos = self.matching(pos);
                }
                pos += 1;
            }
            self.scan_into(from, pos.min(close), item);
        }
        variants
    }

    fn scan_into(&self, from: usize, to: usize, item: &mut Item) {
        let mut scan = Scan::default();
        self.scan(from, to.min(self.tokens.len()), &mut scan);
        item.refs.extend(scan.refs);
        item.pat_idents.extend(scan.pat_idents);
        item.method_calls.extend(scan.method_calls);
        item.inner_vis.extend(scan.inner_vis);
        item.nested_uses.extend(scan.nested_uses);
    }

    /// Collects path occurrences and other references from `tokens[from..to]`.
    fn scan(&self, from: usize, to: usize, out: &mut Scan) {
        let mut pos = from;
        while pos < to {
            let token = self.tokens[pos];
            match token.kind {
                TokenKind::Punct('#') => {
                    pos = self.skip_attr(pos).unwrap_or(pos + 1);
                }
                TokenKind::Punct('.') => {
                    if self.is_ident(pos + 1) {
                        if self.is_punct(pos + 2, '(') || self.is_kind(pos + 2, TokenKind::PathSep) {
                            out.method_calls.push(self.name_at(pos + 1));
                        }
                        pos += 2;
                    } else {
                        pos += 1;
                    }
                }
                TokenKind::PathSep => {
                    let continues = pos > from
                        && matches!(
                            self.tokens[pos - 1].kind,
                            TokenKind::Ident | TokenKind::Punct('>' | ')')
                        );
                    if !continues && self.is_ident(pos + 1) {
                        pos = self.scan_path(pos, to, out);
                    } else {
                        pos += 1;
                    }
                }
                TokenKind::Ident => pos = self.scan_ident(pos, to, out),
                _ => pos += 1,
            }
        }
    }

    fn scan_ident(&self, pos: usize, to: usize, out: &mut Scan) -> usize {
        let word = self.text(pos);
        match word {
            "pub" => {
                let (vis, next) = self.parse_vis_at(pos);
                if vis.kind != VisKind::Pub {
                    out.inner_vis.push(vis);
                }
                next
            }
            "use" => {
                let (tree, end) = self.parse_use_item_at(pos);
                let range = TextRange::new(self.tokens[pos].range.start, self.end_of(end));
                out.nested_uses.push(Item {
                    kind: ItemKind::Use(tree),
                    name: None,
                    vis: None,
                    range,
                    head_start: range.start,
                    refs: Vec::new(),
                    pat_idents: Vec::new(),
                    method_calls: Vec::new(),
                    inner_vis: Vec::new(),
                    nested_uses: Vec::new(),
                });
                end + 1
            }
            "let" | "for" => {
                let mut next = pos + 1;
                while self.is_word(next, "mut") || self.is_word(next, "ref") {
                    next += 1;
                }
                let binds = self.is_plain_ident(next)
                    && !self.is_kind(next + 1, TokenKind::PathSep)
                    && !self.is_punct(next + 1, '(')
                    && !self.is_punct(next + 1, '{')
                    && (word == "let" || self.is_word(next + 1, "in"));
                if binds {
                    out.pat_idents.push(self.name_at(next));
                    next + 1
                } else {
                    next
                }
            }
            "fn" | "struct" | "enum" | "trait" | "type" | "mod" | "const" | "static" => {
                let mut next = pos + 1;
                if self.is_word(next, "mut") {
                    next += 1;
                }
                if self.is_plain_ident(next) {
                    next + 1
                } else {
                    next
                }
            }
            "macro_rules" if self.is_punct(pos + 1, '!') => {
                let open = pos + 3;
                if self.is_punct(open, '{') || self.is_punct(open, '(') {
                    self.matching(open) + 1
                } else {
                    pos + 2
                }
            }
            _ if is_keyword(word) && !PATH_KEYWORDS.contains(&word) => pos + 1,
            _ => self.scan_path(pos, to, out),
        }
    }

    fn scan_path(&self, pos: usize, to: usize, out: &mut Scan) -> usize {
        let Some((mut path, next)) = self.parse_path_at(pos, PathContext::Plain) else {
            return pos + 1;
        };
        let generic_args: Vec<TextRange> = path
            .segments
            .iter()
            .filter_map(|segment| segment.generic_args)
            .collect();

        let single = path.segments.len() == 1 && !path.leading_colon;
        let first = path.first_segment();
        let skip = first == "Self" || (single && first == "self");
        if single && self.is_punct(next, ':') {
            return next;
        }
        if single && self.is_kind(next, TokenKind::FatArrow) {
            out.pat_idents.push(path.segments[0].name.clone());
            return next;
        }
        if !skip {
            if self.is_punct(next, '!') && !self.is_punct(next + 1, '=') {
                path.context = PathContext::MacroCall;
            }
            out.refs.push(path);
        }

        // Turbofish arguments may mention further paths.
        for args in generic_args {
            let inner = (pos..next).filter(|&idx| args.covers(self.tokens[idx].range));
            let mut inner = inner.collect::<Vec<_>>().into_iter();
            // Skip `::` `<` and the closing `>`.
            let Some(from) = inner.nth(2) else {
                continue;
            };
            let close = inner.last().unwrap_or(from);
            self.scan(from, close.min(to), out);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ref_texts(src: &str, item: &Item) -> Vec<String> {
        item.refs
            .iter()
            .map(|path| path.range.slice(src).to_string())
            .collect()
    }

    #[test]
    fn parses_item_kinds_and_names() {
        let src = r#"
#![allow(dead_code)]
mod a;
pub(crate) mod b { pub struct Inner; }
/// Docs.
#[derive(Debug)]
pub struct S { pub(super) x: u32 }
enum E { A, B(u32), C { f: crate::T } }
const fn f() {}
impl Tr for S { fn m(&self) {} }
macro_rules! mac { () => {}; }
extern crate dep as renamed;
"#;
        let file = parse_file(src);
        let names: Vec<_> = file
            .items
            .iter()
            .map(|item| item.name_text().unwrap_or("-").to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "S", "E", "f", "-", "mac", "dep"]);
        assert!(file.inner_attrs_end > 0);

        let s = &file.items[2];
        assert!(!s.range.slice(src).starts_with("/// Docs."));
        assert!(s.range.slice(src).starts_with("#[derive(Debug)]"));
        assert_eq!(&src[s.head_start..s.head_start + 3], "pub");
        assert_eq!(s.inner_vis.len(), 1);
        assert_eq!(s.inner_vis[0].kind, VisKind::Super);

        match &file.items[3].kind {
            ItemKind::Enum { variants } => {
                let variants: Vec<_> = variants.iter().map(|v| v.text.as_str()).collect();
                assert_eq!(variants, vec!["A", "B", "C"]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(ref_texts(src, &file.items[3]), vec!["u32", "crate::T"]);

        match &file.items[5].kind {
            ItemKind::Impl {
                trait_ref,
                self_ty,
                methods,
            } => {
                assert_eq!(trait_ref.as_ref().map(|p| p.first_segment()), Some("Tr"));
                assert_eq!(self_ty.as_ref().map(|p| p.first_segment()), Some("S"));
                assert_eq!(methods.len(), 1);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        match &file.items[1].kind {
            ItemKind::Mod { body: Some(body) } => assert_eq!(body.items.len(), 1),
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(
            file.items[1].vis.as_ref().map(|vis| vis.kind.clone()),
            Some(VisKind::Crate)
        );
    }

    #[test]
    fn scans_paths_in_function_bodies() {
        let src = r#"
fn run(x: a::Foo) -> super::Bar {
    use crate::util::helper;
    let value = b::make::<c::Arg>(x);
    value.process();
    println!("{}", d::CONST);
    match value { e::Kind::One => {}, Two => {} }
    Self::new();
    helper()
}
"#;
        let file = parse_file(src);
        let run = &file.items[0];
        assert_eq!(
            ref_texts(src, run),
            vec![
                "a::Foo",
                "super::Bar",
                "b::make::<c::Arg>",
                "c::Arg",
                "x",
                "value",
                "println",
                "d::CONST",
                "value",
                "e::Kind::One",
                "helper",
            ]
        );
        let macro_path = run.refs.iter().find(|p| p.first_segment() == "println");
        assert_eq!(macro_path.map(|p| p.context), Some(PathContext::MacroCall));
        let make = &run.refs[2];
        assert_eq!(make.prefix_range(2).slice(src), "b::make");
        assert_eq!(run.nested_uses.len(), 1);
        let pats: Vec<_> = run.pat_idents.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(pats, vec!["value", "Two"]);
        let calls: Vec<_> = run.method_calls.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(calls, vec!["process"]);
    }

    #[test]
    fn parses_use_trees() {
        let src = "pub use a::{self, b::{C as D, E}, *};\nuse ::dep::X;";
        let file = parse_file(src);
        let tree = file.items[0].use_tree().cloned().expect("use item");
        assert_eq!(tree.path.as_ref().map(|p| p.range.slice(src)), Some("a"));
        let UseTreeKind::Group { children, .. } = &tree.kind else {
            panic!("expected group");
        };
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].path.as_ref().map(|p| p.first_segment()), Some("self"));
        assert!(matches!(children[2].kind, UseTreeKind::Glob));
        let UseTreeKind::Group { children: inner, .. } = &children[1].kind else {
            panic!("expected nested group");
        };
        assert_eq!(
            inner[0].kind,
            UseTreeKind::Simple {
                alias: Some(Name {
                    text: "D".into(),
                    range: TextRange::new(src.find("D").unwrap_or(0), src.find("D").unwrap_or(0) + 1),
                })
            }
        );
        assert_eq!(file.items[0].range.slice(src), "pub use a::{self, b::{C as D, E}, *};");

        let second = file.items[1].use_tree().expect("use item");
        assert!(second.path.as_ref().is_some_and(|p| p.leading_colon));
        assert_eq!(second.range.slice(src), "::dep::X");
    }

    #[test]
    fn parses_standalone_paths() {
        let path = parse_path_text("crate::a::S").expect("path");
        assert_eq!(path.segment_names().collect::<Vec<_>>(), vec!["crate", "a", "S"]);
        assert!(parse_path_text("a b").is_none());
    }
}
