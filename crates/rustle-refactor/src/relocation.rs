//! Old-offset to new-offset association across text-changing steps.
//!
//! Every step of a move that changes text reports what it did as a [`RelocationStep`]. The
//! orchestrator keeps them in a [`Relocation`] and maps the anchors it collected before the
//! move (a file and a byte offset) to where the same text lives afterwards.

use std::collections::BTreeMap;

use crate::edit::{FileId, FileOp, TextRange, WorkspaceEdit};

/// Text cut from one place and pasted at another by the same step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovedRegion {
    /// File the text was cut from (name before the step).
    pub file: FileId,
    pub range: TextRange,
    /// File the text was pasted into (name after the step).
    pub dest_file: FileId,
    /// Offset of the insertion edit in the destination, before the step.
    pub dest_offset: usize,
    /// Where the region's text starts inside the inserted string.
    pub offset_in_insertion: usize,
    /// `(line start relative to the region, cumulative growth from that line on)` for text that
    /// was re-indented while pasting.
    pub line_shifts: Vec<(usize, isize)>,
}

impl MovedRegion {
    fn shift_at(&self, rel: usize) -> isize {
        self.line_shifts
            .iter()
            .take_while(|(start, _)| *start <= rel)
            .last()
            .map(|(_, delta)| *delta)
            .unwrap_or(0)
    }
}

/// What one step did to the files: plain edits, moved regions and renames.
///
/// `edits` are keyed by the file name after the step's renames, like the text edits of a
/// [`WorkspaceEdit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelocationStep {
    edits: BTreeMap<FileId, Vec<(TextRange, usize)>>,
    regions: Vec<MovedRegion>,
    renames: BTreeMap<FileId, FileId>,
}

impl RelocationStep {
    pub fn from_edit(edit: &WorkspaceEdit) -> Self {
        let mut step = Self::default();
        for op in &edit.file_ops {
            if let FileOp::Rename { from, to } = op {
                step.renames.insert(from.clone(), to.clone());
            }
        }
        for text_edit in &edit.text_edits {
            step.edits
                .entry(text_edit.file.clone())
                .or_default()
                .push((text_edit.range, text_edit.replacement.len()));
        }
        for edits in step.edits.values_mut() {
            edits.sort();
        }
        step
    }

    pub fn with_regions(mut self, regions: Vec<MovedRegion>) -> Self {
        self.regions = regions;
        self
    }

    fn renamed(&self, file: &FileId) -> FileId {
        self.renames.get(file).cloned().unwrap_or_else(|| file.clone())
    }

    /// Offset after the step of `offset` in `file` (post-rename name). Text inserted exactly at
    /// `offset` lands before it when `after_inserts` is set.
    fn shift(&self, file: &FileId, offset: usize, after_inserts: bool) -> Option<usize> {
        let mut delta: isize = 0;
        for &(range, new_len) in self.edits.get(file).into_iter().flatten() {
            if range.end <= offset {
                if range.is_empty() && range.start == offset && !after_inserts {
                    continue;
                }
                delta += new_len as isize - range.len() as isize;
            } else if range.start < offset {
                // Inside replaced text.
                return None;
            }
        }
        usize::try_from(offset as isize + delta).ok()
    }

    pub fn map_file(&self, file: &FileId) -> FileId {
        self.renamed(file)
    }

    pub fn map_offset(&self, file: &FileId, offset: usize) -> Option<(FileId, usize)> {
        if let Some(region) = self
            .regions
            .iter()
            .find(|region| &region.file == file && region.range.contains(offset))
        {
            let rel = offset - region.range.start;
            let base = self.shift(&region.dest_file, region.dest_offset, false)?;
            let mapped = (base + region.offset_in_insertion + rel) as isize + region.shift_at(rel);
            return Some((region.dest_file.clone(), usize::try_from(mapped).ok()?));
        }
        let file = self.renamed(file);
        let mapped = self.shift(&file, offset, true)?;
        Some((file, mapped))
    }
}

/// A sequence of steps, mapped through in order.
#[derive(Clone, Debug, Default)]
pub struct Relocation {
    steps: Vec<RelocationStep>,
}

impl Relocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: RelocationStep) {
        self.steps.push(step);
    }

    /// Name `file` has after every rename.
    pub fn map_file(&self, file: &FileId) -> FileId {
        self.steps
            .iter()
            .fold(file.clone(), |current, step| step.map_file(&current))
    }

    pub fn map_offset(&self, file: &FileId, offset: usize) -> Option<(FileId, usize)> {
        let mut current = (file.clone(), offset);
        for step in &self.steps {
            current = step.map_offset(&current.0, current.1)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::TextEdit;
    use pretty_assertions::assert_eq;

    fn file(path: &str) -> FileId {
        FileId::new(path)
    }

    #[test]
    fn plain_edits_shift_later_offsets() {
        let edit = WorkspaceEdit::new(vec![
            TextEdit::insert(file("/a.rs"), 0, "pub "),
            TextEdit::replace(file("/a.rs"), TextRange::new(10, 20), "x"),
        ]);
        let step = RelocationStep::from_edit(&edit);

        assert_eq!(step.map_offset(&file("/a.rs"), 0), Some((file("/a.rs"), 4)));
        assert_eq!(step.map_offset(&file("/a.rs"), 5), Some((file("/a.rs"), 9)));
        assert_eq!(step.map_offset(&file("/a.rs"), 15), None);
        assert_eq!(step.map_offset(&file("/a.rs"), 25), Some((file("/a.rs"), 20)));
        assert_eq!(step.map_offset(&file("/b.rs"), 7), Some((file("/b.rs"), 7)));
    }

    #[test]
    fn moved_regions_follow_the_pasted_text() {
        // "mod a { struct S; }\nmod b {}\n": cut `struct S;` (8..17), paste before b's `}`.
        let edit = WorkspaceEdit::new(vec![
            TextEdit::delete(file("/lib.rs"), TextRange::new(8, 17)),
            TextEdit::insert(file("/lib.rs"), 27, "\n    struct S;\n"),
        ]);
        let step = RelocationStep::from_edit(&edit).with_regions(vec![MovedRegion {
            file: file("/lib.rs"),
            range: TextRange::new(8, 17),
            dest_file: file("/lib.rs"),
            dest_offset: 27,
            offset_in_insertion: 5,
            line_shifts: Vec::new(),
        }]);

        // `S` at 15 lands at 27 - 9 + 5 + 7.
        assert_eq!(step.map_offset(&file("/lib.rs"), 15), Some((file("/lib.rs"), 30)));
        // Text after the paste moves by the net change.
        assert_eq!(step.map_offset(&file("/lib.rs"), 28), Some((file("/lib.rs"), 34)));
    }

    #[test]
    fn renames_and_reindented_lines_compose() {
        let rename = WorkspaceEdit {
            file_ops: vec![FileOp::Rename {
                from: file("/src/a/m.rs"),
                to: file("/src/b/m.rs"),
            }],
            text_edits: Vec::new(),
        };
        let mut relocation = Relocation::new();
        relocation.push(RelocationStep::from_edit(&rename));
        relocation.push(
            RelocationStep::from_edit(&WorkspaceEdit::new(vec![TextEdit::insert(
                file("/src/lib.rs"),
                0,
                "fn f() {\n        x\n}",
            )]))
            .with_regions(vec![MovedRegion {
                file: file("/src/b/m.rs"),
                range: TextRange::new(0, 20),
                dest_file: file("/src/lib.rs"),
                dest_offset: 0,
                offset_in_insertion: 0,
                line_shifts: vec![(9, 4)],
            }]),
        );

        assert_eq!(
            relocation.map_offset(&file("/src/a/m.rs"), 3),
            Some((file("/src/lib.rs"), 3))
        );
        assert_eq!(
            relocation.map_offset(&file("/src/a/m.rs"), 13),
            Some((file("/src/lib.rs"), 17))
        );
    }
}
