//! Move refactoring for Rust modules.
//!
//! Moving items or whole modules from one module to another means finding every path into and
//! out of the moved code, deciding how each one must be spelled afterwards, widening
//! visibilities that would otherwise break, and rewriting `use` items. This crate does all of
//! that against an in-memory [`Analysis`](rustle_resolve::Analysis) snapshot and returns the
//! result as edits.
//!
//! The entry points are [`MoveProcessor`] for the staged flow and [`move_items`] for a one-shot
//! move that accepts every conflict fix.

mod cancel;
mod conflicts;
mod context;
mod edit;
mod imports;
mod physical;
mod preview;
mod processor;
mod reference_info;
mod references;
mod relocation;
mod resolver;
mod retarget;
mod trait_methods;
mod visibility;

use thiserror::Error;

pub use cancel::{CancellationToken, Cancelled};
pub use conflicts::{ConflictKind, MoveConflict, VisibilityChange, VisibilityFix};
pub use context::ElementToMove;
pub use edit::{
    apply_text_edits, apply_workspace_edit, diff_as_workspace_edit, EditError, FileId, FileOp,
    TextEdit, TextRange, WorkspaceEdit,
};
pub use imports::EditBuilder;
pub use physical::{move_elements, PhysicalMove};
pub use preview::{generate_preview, FileChangeKind, FilePreview, RefactoringPreview};
pub use processor::{move_items, MoveOutcome, MovePlan, MoveProcessor, MoveRequest, Preprocessed};
pub use reference_info::{MoveReferenceInfo, PathAnchor, ReferenceKind};
pub use references::MoveUsage;
pub use relocation::{MovedRegion, Relocation, RelocationStep};
pub use resolver::PathResolver;
pub use trait_methods::TraitMethodRef;
pub use visibility::{ConfigVisibilityPolicy, VisibilityPolicy};

pub use rustle_resolve::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("nothing to move")]
    NoElements,
    #[error("`{0}` is both the source and the target of the move")]
    SameSourceAndTarget(String),
    #[error("all moved elements must come from the same module")]
    MultipleSourceModules,
    #[error("cannot move a module into its own descendant `{0}`")]
    TargetInsideMovedModule(String),
    #[error("a crate root cannot be moved")]
    CannotMoveCrateRoot,
    #[error("`{0}` cannot be moved on its own")]
    UnsupportedElement(String),
    #[error("`{0}` was lost while applying the move")]
    LostElement(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
