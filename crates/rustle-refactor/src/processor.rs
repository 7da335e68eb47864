//! Orchestration of a move: validation, pre-analysis, conflict review and the ordered rewrite.
//!
//! The data flows through explicit stages:
//!
//! 1. [`MoveProcessor::find_usages`] and [`MoveProcessor::preprocess_usages`] read the pre-move
//!    snapshot and produce a [`Preprocessed`] value holding every planned rewrite and conflict.
//! 2. The caller accepts conflicts, turning it into a [`MovePlan`].
//! 3. [`MoveProcessor::perform_refactoring`] applies the plan step by step, rebuilding the
//!    [`Analysis`] after each step and mapping the collected anchors through a [`Relocation`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustle_config::MoveConfig;
use rustle_resolve::{Analysis, Def, DefKind, FileId, ModuleId, Scope};
use serde::{Deserialize, Serialize};

use crate::cancel::{CancellationToken, Cancelled};
use crate::conflicts::{
    check_impls, check_name_collisions, detect_inside_references_visibility_problems,
    detect_outside_references_visibility_problems, MoveConflict, VisibilityFix,
};
use crate::context::{ElementToMove, MoveContext};
use crate::edit::{apply_workspace_edit, diff_as_workspace_edit, EditError, FileOp, WorkspaceEdit};
use crate::imports::{optimize_imports, EditBuilder};
use crate::physical::{move_elements, PhysicalMove};
use crate::preview::{generate_preview, RefactoringPreview};
use crate::reference_info::{
    convert_to_full_reference, create_inside_pat_info, create_inside_reference_info,
    create_outside_pat_info, create_outside_reference_info, MoveReferenceInfo,
};
use crate::references::{collect_carried_imports, collect_outside_references, find_usages, MoveUsage};
use crate::relocation::{Relocation, RelocationStep};
use crate::retarget::{replace_directly, retarget, Remap};
use crate::trait_methods::{collect_trait_method_refs, insert_trait_imports, TraitMethodRef};
use crate::visibility::{visibility_edits, ConfigVisibilityPolicy, VisibilityPolicy};
use crate::MoveError;

/// Usages checked between two cancellation polls.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A validated move of items and modules out of one module into another.
pub struct MoveProcessor {
    analysis: Analysis,
    elements: Vec<ElementToMove>,
    source: ModuleId,
    target: ModuleId,
    config: MoveConfig,
    policy: Arc<dyn VisibilityPolicy>,
}

impl std::fmt::Debug for MoveProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveProcessor")
            .field("elements", &self.elements)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything the pre-analysis found, before the caller decided about conflicts.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    outside: Vec<MoveReferenceInfo>,
    inside: Vec<MoveReferenceInfo>,
    trait_methods: Vec<TraitMethodRef>,
    conflicts: Vec<MoveConflict>,
    carried_imports: Vec<String>,
}

/// Planned rewrites plus the visibility fixes of the accepted conflicts.
#[derive(Clone, Debug)]
pub struct MovePlan {
    outside: Vec<MoveReferenceInfo>,
    inside: Vec<MoveReferenceInfo>,
    trait_methods: Vec<TraitMethodRef>,
    carried_imports: Vec<String>,
    fixes: Vec<VisibilityFix>,
    /// Conflicts that were rejected or have no fix.
    unresolved: Vec<MoveConflict>,
}

/// Result of a finished move.
#[derive(Clone, Debug)]
pub struct MoveOutcome {
    /// Every file of the workspace after the move.
    pub files: BTreeMap<FileId, String>,
    /// The change from the original files: renames plus one replacement per changed file.
    pub edit: WorkspaceEdit,
    pub renames: Vec<(FileId, FileId)>,
    /// New paths of the moved elements, from their crate root.
    pub moved: Vec<String>,
    pub references_updated: usize,
    pub visibility_changes: usize,
    pub unresolved_conflicts: Vec<MoveConflict>,
}

/// A move described by paths, e.g. `{ items: ["crate::a::S"], target: "crate::b" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub items: Vec<String>,
    pub target: String,
}

impl MoveOutcome {
    /// Per-file unified diffs of the move, given the files it started from.
    pub fn preview(&self, original: &BTreeMap<FileId, String>) -> Result<RefactoringPreview, EditError> {
        generate_preview(original, &self.edit)
    }
}

impl Preprocessed {
    pub fn conflicts(&self) -> &[MoveConflict] {
        &self.conflicts
    }

    pub fn outside_references(&self) -> &[MoveReferenceInfo] {
        &self.outside
    }

    pub fn inside_references(&self) -> &[MoveReferenceInfo] {
        &self.inside
    }

    pub fn accept_all(self) -> MovePlan {
        self.accept(|_| true)
    }

    /// Keep the fixes of the conflicts `decide` accepts.
    pub fn accept(self, mut decide: impl FnMut(&MoveConflict) -> bool) -> MovePlan {
        let mut fixes = Vec::new();
        let mut unresolved = Vec::new();
        for conflict in self.conflicts {
            match conflict.fix {
                Some(fix) if decide(&conflict) => fixes.push(fix),
                _ => unresolved.push(conflict),
            }
        }
        MovePlan {
            outside: self.outside,
            inside: self.inside,
            trait_methods: self.trait_methods,
            carried_imports: self.carried_imports,
            fixes,
            unresolved,
        }
    }
}

impl MovePlan {
    pub fn fixes(&self) -> &[VisibilityFix] {
        &self.fixes
    }

    pub fn unresolved_conflicts(&self) -> &[MoveConflict] {
        &self.unresolved
    }
}

fn element_name(analysis: &Analysis, element: ElementToMove) -> String {
    element.name(analysis).unwrap_or("<anonymous>").to_string()
}

/// `mod` items become module elements; anything without its own syntax cannot be moved.
fn normalize_element(analysis: &Analysis, element: ElementToMove) -> Result<ElementToMove, MoveError> {
    match element {
        ElementToMove::Mod(module) => {
            if analysis.module(module).decl.is_none() {
                return Err(MoveError::CannotMoveCrateRoot);
            }
            Ok(element)
        }
        ElementToMove::Item(item) => {
            let data = analysis.item(item);
            if let Some(module) = data.child_module {
                return normalize_element(analysis, ElementToMove::Mod(module));
            }
            let unsupported = matches!(data.kind, DefKind::Mod | DefKind::Use | DefKind::ExternCrate);
            if unsupported || data.parent.is_some() || data.syntax.is_none() {
                return Err(MoveError::UnsupportedElement(element_name(analysis, element)));
            }
            Ok(element)
        }
    }
}

fn source_module(analysis: &Analysis, element: ElementToMove) -> Option<ModuleId> {
    match element {
        ElementToMove::Item(item) => Some(analysis.item(item).module),
        ElementToMove::Mod(module) => analysis.parent(module),
    }
}

impl MoveProcessor {
    pub fn new(
        analysis: Analysis,
        elements: Vec<ElementToMove>,
        target: ModuleId,
        config: &MoveConfig,
    ) -> Result<Self, MoveError> {
        if elements.is_empty() {
            return Err(MoveError::NoElements);
        }
        let mut normalized = elements
            .into_iter()
            .map(|element| normalize_element(&analysis, element))
            .collect::<Result<Vec<_>, _>>()?;
        normalized.sort();
        normalized.dedup();

        let mut sources = normalized
            .iter()
            .map(|&element| source_module(&analysis, element));
        let source = sources.next().flatten().ok_or(MoveError::CannotMoveCrateRoot)?;
        if sources.any(|other| other != Some(source)) {
            return Err(MoveError::MultipleSourceModules);
        }
        if source == target {
            return Err(MoveError::SameSourceAndTarget(
                analysis.crate_relative_path(target),
            ));
        }
        for element in &normalized {
            if let ElementToMove::Mod(module) = *element {
                if analysis.is_ancestor(module, target) {
                    return Err(MoveError::TargetInsideMovedModule(
                        analysis.crate_relative_path(target),
                    ));
                }
            }
        }

        tracing::debug!(
            elements = normalized.len(),
            source = %analysis.crate_relative_path(source),
            target = %analysis.crate_relative_path(target),
            "move validated"
        );
        Ok(Self {
            analysis,
            elements: normalized,
            source,
            target,
            config: config.clone(),
            policy: Arc::new(ConfigVisibilityPolicy::from_config(config)),
        })
    }

    /// Replace the visibility policy derived from the configuration.
    pub fn with_policy(mut self, policy: Arc<dyn VisibilityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn elements(&self) -> &[ElementToMove] {
        &self.elements
    }

    pub fn source(&self) -> ModuleId {
        self.source
    }

    pub fn target(&self) -> ModuleId {
        self.target
    }

    fn context(&self) -> MoveContext<'_> {
        MoveContext::new(&self.analysis, &self.elements, self.source, self.target)
    }

    /// Usages of the moved elements in the whole workspace.
    pub fn find_usages(&self) -> Vec<MoveUsage> {
        find_usages(&self.context())
    }

    /// Plan every rewrite and find the conflicts, without changing anything.
    pub fn preprocess_usages(
        &self,
        usages: &[MoveUsage],
        token: &CancellationToken,
    ) -> Result<Preprocessed, Cancelled> {
        let ctx = self.context();
        token.check()?;
        let ((outside, inside), trait_methods) = rayon::join(
            || {
                rayon::join(
                    || outside_infos(&ctx, token),
                    || inside_infos(&ctx, usages, token),
                )
            },
            || collect_trait_method_refs(&ctx, token),
        );
        let (outside, inside, trait_methods) = (outside?, inside?, trait_methods?);
        token.check()?;

        let policy = self.policy.as_ref();
        let mut conflicts =
            detect_outside_references_visibility_problems(&ctx, &outside, &self.config, policy);
        conflicts.extend(detect_inside_references_visibility_problems(
            &ctx,
            &inside,
            &self.config,
            policy,
        ));
        conflicts.extend(check_impls(&ctx));
        conflicts.extend(check_name_collisions(&ctx));

        let outside: Vec<_> = outside
            .into_iter()
            .map(|info| convert_to_full_reference(&ctx, info))
            .collect();
        let inside: Vec<_> = inside
            .into_iter()
            .map(|info| convert_to_full_reference(&ctx, info))
            .collect();
        let carried_imports = collect_carried_imports(&ctx);

        tracing::debug!(
            outside = outside.len(),
            inside = inside.len(),
            trait_methods = trait_methods.len(),
            conflicts = conflicts.len(),
            "preprocessed move"
        );
        Ok(Preprocessed {
            outside,
            inside,
            trait_methods,
            conflicts,
            carried_imports,
        })
    }

    /// Apply `plan`. `move_step` performs the physical move on the snapshot it is given;
    /// [`move_elements`] is the default.
    pub fn perform_refactoring<F>(&self, plan: MovePlan, move_step: F) -> Result<MoveOutcome, MoveError>
    where
        F: FnOnce(&Analysis, &[ElementToMove], ModuleId) -> Result<PhysicalMove, MoveError>,
    {
        let original = &self.analysis;
        let mut session = Session::new(original);

        let edits = visibility_edits(&self.context(), &plan.fixes);
        let visibility_changes = edits.len();
        let mut edit = WorkspaceEdit::new(edits);
        edit.normalize()?;
        let step = RelocationStep::from_edit(&edit);
        session.apply(&edit, step)?;

        let (elements, target) = {
            let remap = session.remap();
            let elements = self
                .elements
                .iter()
                .map(|&element| {
                    let remapped = match element {
                        ElementToMove::Item(item) => remap.item(item).map(ElementToMove::Item),
                        ElementToMove::Mod(module) => remap.module(module).map(ElementToMove::Mod),
                    };
                    remapped.ok_or_else(|| MoveError::LostElement(element_name(original, element)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let target = remap
                .module(self.target)
                .ok_or_else(|| MoveError::LostElement(original.crate_relative_path(self.target)))?;
            (elements, target)
        };

        let physical = move_step(&session.analysis, &elements, target)?;
        let renames: Vec<(FileId, FileId)> = physical
            .edit
            .file_ops
            .iter()
            .filter_map(|op| match op {
                FileOp::Rename { from, to } => Some((from.clone(), to.clone())),
                _ => None,
            })
            .collect();
        session.apply(&physical.edit, physical.relocation)?;

        let config = &self.config;
        let mut references_updated = 0;
        references_updated += session.run("outside references, direct", |remap, builder| {
            replace_directly(remap, &plan.outside, builder);
        })?;
        references_updated += session.run("outside references, retarget", |remap, builder| {
            retarget(remap, &plan.outside, builder, config);
            carry_imports(remap, self.target, &plan.carried_imports, builder);
        })?;
        references_updated += session.run("trait imports", |remap, builder| {
            insert_trait_imports(remap, &plan.trait_methods, builder);
        })?;
        references_updated += session.run("inside references, direct", |remap, builder| {
            replace_directly(remap, &plan.inside, builder);
        })?;
        references_updated += session.run("inside references, retarget", |remap, builder| {
            retarget(remap, &plan.inside, builder, config);
        })?;

        if config.optimize_imports {
            let changed = session.changed_files(&renames);
            let edit = optimize_imports(&session.analysis, &changed)?;
            let step = RelocationStep::from_edit(&edit);
            session.apply(&edit, step)?;
        }

        let files = session.analysis.files().clone();
        let edit = diff_as_workspace_edit(original.files(), &files, &renames)?;
        let moved = {
            let remap = session.remap();
            let analysis = &session.analysis;
            self.elements
                .iter()
                .filter_map(|&element| remap.def(element.def()))
                .filter_map(|def| analysis.qualified_name_in_crate(def, analysis.def_crate(def)))
                .collect::<Vec<_>>()
        };
        tracing::info!(
            moved = ?moved,
            references = references_updated,
            visibility = visibility_changes,
            files = edit.text_edits.len() + edit.file_ops.len(),
            "move finished"
        );
        Ok(MoveOutcome {
            files,
            edit,
            renames,
            moved,
            references_updated,
            visibility_changes,
            unresolved_conflicts: plan.unresolved,
        })
    }
}

/// The current snapshot of a running move and how the original offsets map into it.
struct Session<'a> {
    original: &'a Analysis,
    analysis: Analysis,
    relocation: Relocation,
}

impl<'a> Session<'a> {
    fn new(original: &'a Analysis) -> Self {
        Self {
            original,
            analysis: original.clone(),
            relocation: Relocation::new(),
        }
    }

    fn remap(&self) -> Remap<'_> {
        Remap::new(self.original, &self.analysis, &self.relocation)
    }

    fn apply(&mut self, edit: &WorkspaceEdit, step: RelocationStep) -> Result<(), MoveError> {
        if edit.is_empty() {
            return Ok(());
        }
        let files = apply_workspace_edit(self.analysis.files(), edit)?;
        self.analysis = Analysis::new(files);
        self.relocation.push(step);
        Ok(())
    }

    /// One rewrite pass against the current snapshot. Returns the number of changes it made.
    fn run(
        &mut self,
        name: &str,
        pass: impl FnOnce(&Remap<'_>, &mut EditBuilder<'_>),
    ) -> Result<usize, MoveError> {
        let (edit, changes) = {
            let remap = self.remap();
            let mut builder = EditBuilder::new(&self.analysis);
            pass(&remap, &mut builder);
            let changes = builder.changes();
            (builder.finish()?, changes)
        };
        let step = RelocationStep::from_edit(&edit);
        self.apply(&edit, step)?;
        tracing::debug!(pass = name, changes, "rewrite pass done");
        Ok(changes)
    }

    /// Files whose text differs from the original (renamed files compare with their old name).
    fn changed_files(&self, renames: &[(FileId, FileId)]) -> BTreeSet<FileId> {
        self.analysis
            .files()
            .iter()
            .filter(|(file, text)| {
                let old_name = renames
                    .iter()
                    .find(|(_, to)| to == *file)
                    .map(|(from, _)| from)
                    .unwrap_or(file);
                self.original.files().get(old_name) != Some(*text)
            })
            .map(|(file, _)| file.clone())
            .collect()
    }
}

fn outside_infos(
    ctx: &MoveContext<'_>,
    token: &CancellationToken,
) -> Result<Vec<MoveReferenceInfo>, Cancelled> {
    let usages = collect_outside_references(ctx, token)?;
    Ok(usages
        .into_iter()
        .filter_map(|usage| match usage {
            MoveUsage::Path { path, len, target } => {
                create_outside_reference_info(ctx, path, len, target)
            }
            MoveUsage::Pat { pat, target } => create_outside_pat_info(ctx, pat, target),
            MoveUsage::ModDecl { .. } => None,
        })
        .collect())
}

fn inside_infos(
    ctx: &MoveContext<'_>,
    usages: &[MoveUsage],
    token: &CancellationToken,
) -> Result<Vec<MoveReferenceInfo>, Cancelled> {
    let mut infos = Vec::new();
    for (idx, usage) in usages.iter().enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 {
            token.check()?;
        }
        let info = match *usage {
            MoveUsage::Path { path, len, target } => {
                create_inside_reference_info(ctx, path, len, target)
            }
            MoveUsage::Pat { pat, target } => create_inside_pat_info(ctx, pat, target),
            // The physical step renames the file; the declaration itself moves with the module.
            MoveUsage::ModDecl { .. } => None,
        };
        infos.extend(info);
    }
    Ok(infos)
}

/// Copy the source module's external imports the moved code relies on into the target.
fn carry_imports(
    remap: &Remap<'_>,
    target: ModuleId,
    imports: &[String],
    builder: &mut EditBuilder<'_>,
) {
    if imports.is_empty() {
        return;
    }
    let Some(target) = remap.module(target) else {
        tracing::error!("target module not found after the move");
        return;
    };
    let scope = Scope::module(target);
    for import in imports {
        let name = match import.split_once(" as ") {
            Some((_, alias)) => alias.trim(),
            None => import.rsplit("::").next().unwrap_or(import),
        };
        if builder.import_collides(scope, name, None) {
            tracing::warn!(%import, "target already binds the name of a carried import");
            continue;
        }
        builder.add_import(scope, import);
    }
}

/// Resolve `path` (`crate::a::S`, `mycrate::a`) to an element.
fn element_by_path(analysis: &Analysis, path: &str) -> Result<ElementToMove, MoveError> {
    Ok(match analysis.def_by_path(path)? {
        Def::Module(module) => ElementToMove::Mod(module),
        Def::Item(item) => ElementToMove::Item(item),
    })
}

/// Move the items and modules named in `request`, accepting every conflict fix.
pub fn move_items(
    files: BTreeMap<FileId, String>,
    request: &MoveRequest,
    config: &MoveConfig,
) -> Result<MoveOutcome, MoveError> {
    let analysis = Analysis::new(files);
    let elements = request
        .items
        .iter()
        .map(|path| element_by_path(&analysis, path))
        .collect::<Result<Vec<_>, _>>()?;
    let target = analysis.module_by_path(&request.target)?;
    let processor = MoveProcessor::new(analysis, elements, target, config)?;
    let usages = processor.find_usages();
    let preprocessed = processor.preprocess_usages(&usages, &CancellationToken::default())?;
    processor.perform_refactoring(preprocessed.accept_all(), move_elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analysis() -> Analysis {
        Analysis::from_files([(
            "/src/lib.rs",
            "mod a {\n    pub struct S;\n    pub mod inner {}\n}\nmod b {}\nmod c {\n    pub struct T;\n}\n",
        )])
    }

    fn element(analysis: &Analysis, path: &str) -> ElementToMove {
        element_by_path(analysis, path).unwrap()
    }

    #[test]
    fn construction_rejects_invalid_moves() {
        let analysis = analysis();
        let a = analysis.module_by_path("crate::a").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let inner = analysis.module_by_path("crate::a::inner").unwrap();
        let config = MoveConfig::default();
        let s = element(&analysis, "crate::a::S");
        let t = element(&analysis, "crate::c::T");
        let root = analysis.crate_root(a);

        let err = MoveProcessor::new(analysis.clone(), Vec::new(), b, &config).unwrap_err();
        assert_eq!(err, MoveError::NoElements);

        let err = MoveProcessor::new(analysis.clone(), vec![s], a, &config).unwrap_err();
        assert_eq!(err, MoveError::SameSourceAndTarget("crate::a".to_string()));

        let err = MoveProcessor::new(analysis.clone(), vec![s, t], b, &config).unwrap_err();
        assert_eq!(err, MoveError::MultipleSourceModules);

        let err = MoveProcessor::new(analysis.clone(), vec![ElementToMove::Mod(a)], inner, &config)
            .unwrap_err();
        assert_eq!(err, MoveError::TargetInsideMovedModule("crate::a::inner".to_string()));

        let err = MoveProcessor::new(analysis, vec![ElementToMove::Mod(root)], b, &config).unwrap_err();
        assert_eq!(err, MoveError::CannotMoveCrateRoot);
    }

    #[test]
    fn mod_items_become_module_elements() {
        let analysis = analysis();
        let inner = analysis.module_by_path("crate::a::inner").unwrap();
        let b = analysis.module_by_path("crate::b").unwrap();
        let decl = analysis.module(inner).decl.unwrap();
        let processor = MoveProcessor::new(
            analysis,
            vec![ElementToMove::Item(decl), ElementToMove::Mod(inner)],
            b,
            &MoveConfig::default(),
        )
        .unwrap();
        assert_eq!(processor.elements(), &[ElementToMove::Mod(inner)]);
    }

    #[test]
    fn rejected_conflicts_keep_no_fix() {
        let files = BTreeMap::from([(
            FileId::new("/src/lib.rs"),
            "mod a {\n    struct S;\n    pub fn f() -> S { S }\n}\nmod b {}\n".to_string(),
        )]);
        let analysis = Analysis::new(files);
        let b = analysis.module_by_path("crate::b").unwrap();
        let f = element(&analysis, "crate::a::f");
        let processor = MoveProcessor::new(analysis, vec![f], b, &MoveConfig::default()).unwrap();
        let usages = processor.find_usages();
        let preprocessed = processor
            .preprocess_usages(&usages, &CancellationToken::default())
            .unwrap();
        assert_eq!(preprocessed.conflicts().len(), 1);

        let plan = preprocessed.accept(|_| false);
        assert!(plan.fixes().is_empty());
        assert_eq!(plan.unresolved_conflicts().len(), 1);
    }
}
