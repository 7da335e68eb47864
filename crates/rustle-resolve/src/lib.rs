//! In-memory semantic model for Rustle.
//!
//! [`Analysis`] is an immutable snapshot built from a set of files. It discovers crates and
//! their module trees, lowers items into arenas, and answers the queries the move refactoring
//! needs:
//! - path resolution (per segment, with visibility of every step)
//! - qualified names and the shortest importable path to a declaration
//! - reference search over every path occurrence in the snapshot
//! - name-based method call to trait resolution
//!
//! The snapshot is `Sync` and never mutated, so independent queries can run in parallel.

mod db;
mod ids;
mod paths;
mod resolve;
mod search;
mod visibility;

pub use db::{
    Analysis, CrateData, DefKind, ItemData, ModuleBody, ModuleData, NameOccurrence,
    PathOccurrence, UseBinding, UseLeaf, UseSite,
};
pub use ids::{CrateId, Def, FileId, ItemId, MethodCallId, ModuleId, PatId, PathId, Scope, Visibility};
pub use resolve::Binding;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no module or item at `{0}`")]
    UnknownPath(String),
    #[error("`{0}` is not a module")]
    NotAModule(String),
}
