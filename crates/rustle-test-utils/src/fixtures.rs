use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;

use rustle_resolve::{Analysis, FileId};

fn fixture_file_id(path: &str) -> FileId {
    let path = path.trim().replace('\\', "/");
    // Fixture paths are workspace-absolute; be lenient with relative ones.
    if path.starts_with('/') {
        FileId::new(path)
    } else {
        FileId::new(format!("/{path}"))
    }
}

/// A multi-file fixture with `$0`, `$1`, ... markers.
///
/// Marker IDs must be unique across the entire fixture; duplicate IDs will
/// panic during parsing.
pub struct Fixture {
    files: BTreeMap<FileId, String>,
    markers: HashMap<u32, (FileId, usize)>,
}

impl Fixture {
    #[must_use]
    pub fn parse(fixture: &str) -> Self {
        let mut current_path: Option<String> = None;
        let mut current_text = String::new();
        let mut files: Vec<(FileId, String)> = Vec::new();

        for line in fixture.lines() {
            if let Some(rest) = line.strip_prefix("//-") {
                if let Some(path) = current_path.take() {
                    files.push((fixture_file_id(&path), current_text));
                    current_text = String::new();
                }

                current_path = Some(rest.trim().to_string());
                continue;
            }
            if current_path.is_none() {
                continue;
            }

            current_text.push_str(line);
            current_text.push('\n');
        }

        if let Some(path) = current_path.take() {
            files.push((fixture_file_id(&path), current_text));
        }

        let mut markers: HashMap<u32, (FileId, usize)> = HashMap::new();
        let mut file_texts = BTreeMap::new();
        for (file, text) in files {
            let (text, file_markers) = strip_markers(&text);
            for (id, offset) in file_markers {
                if let Some((prev_file, prev_offset)) = markers.insert(id, (file.clone(), offset)) {
                    panic!(
                        "duplicate fixture marker ${id} (first at {prev_file}:{prev_offset}, again at {file}:{offset})"
                    );
                }
            }
            file_texts.insert(file, text);
        }

        Self {
            files: file_texts,
            markers,
        }
    }

    pub fn files(&self) -> &BTreeMap<FileId, String> {
        &self.files
    }

    pub fn into_files(self) -> BTreeMap<FileId, String> {
        self.files
    }

    pub fn text(&self, path: &str) -> &str {
        self.files
            .get(&fixture_file_id(path))
            .unwrap_or_else(|| panic!("fixture has no file {path}"))
    }

    #[must_use]
    pub fn analysis(&self) -> Analysis {
        Analysis::new(self.files.clone())
    }

    #[must_use]
    pub fn marker_file(&self, id: u32) -> FileId {
        self.marker(id).0
    }

    #[must_use]
    pub fn marker_offset(&self, id: u32) -> usize {
        self.marker(id).1
    }

    fn marker(&self, id: u32) -> (FileId, usize) {
        self.markers
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("fixture has no marker ${id}"))
    }
}

fn strip_markers(text: &str) -> (String, Vec<(u32, usize)>) {
    let mut out = String::with_capacity(text.len());
    let mut markers = Vec::new();

    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut last = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }

            if j > i + 1 {
                out.push_str(&text[last..i]);
                let id: u32 = text[i + 1..j].parse().expect("marker id fits in u32");
                markers.push((id, out.len()));
                i = j;
                last = j;
                continue;
            }
        }

        i += 1;
    }

    out.push_str(&text[last..]);

    (out, markers)
}

/// Build a file map from `(path, text)` pairs.
pub fn files_to_map<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> BTreeMap<FileId, String> {
    files
        .into_iter()
        .map(|(path, text)| (fixture_file_id(path), text.to_string()))
        .collect()
}

/// Text with every line trimmed and blank lines dropped, so expectations do not depend on
/// indentation or vertical spacing.
pub fn normalize_layout(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Compare file sets, ignoring indentation and blank lines.
#[track_caller]
pub fn assert_files_eq(actual: &BTreeMap<FileId, String>, expected: &BTreeMap<FileId, String>) {
    let normalize = |files: &BTreeMap<FileId, String>| -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(file, text)| (file.to_string(), normalize_layout(text)))
            .collect()
    };
    pretty_assertions::assert_eq!(normalize(actual), normalize(expected));
}

/// Like [`assert_files_eq`], with the expectation written as a fixture.
#[track_caller]
pub fn assert_files_eq_fixture(actual: &BTreeMap<FileId, String>, expected: &str) {
    assert_files_eq(actual, Fixture::parse(expected).files());
}

/// Load a fixture directory into a `(/relative/path -> text)` map.
pub fn load_fixture_dir(dir: &Path) -> BTreeMap<FileId, String> {
    fn visit_dir(
        root: &Path,
        dir: &Path,
        out: &mut BTreeMap<FileId, String>,
    ) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                visit_dir(root, &path, out)?;
            } else {
                let rel = path
                    .strip_prefix(root)
                    .expect("fixture entries live under the fixture root");
                let text = fs::read_to_string(&path)?;
                out.insert(fixture_file_id(&rel.to_string_lossy()), text);
            }
        }
        Ok(())
    }

    let mut out = BTreeMap::new();
    visit_dir(dir, dir, &mut out).expect("fixture dir readable");
    out
}

/// Run `transform` over the `before` directory and compare with `after`.
///
/// With `BLESS=1` the `after` directory is (re)written from the result instead.
pub fn assert_fixture_transformed(
    before: &Path,
    after: &Path,
    mut transform: impl FnMut(&mut BTreeMap<FileId, String>),
) {
    let mut files = load_fixture_dir(before);
    transform(&mut files);

    if !after.exists() {
        if bless_enabled() {
            bless_fixture_dir(after, &files);
            return;
        }
        panic!(
            "missing expected fixture dir {} (run with `BLESS=1` to write it)",
            after.display()
        );
    }

    let expected = load_fixture_dir(after);
    if files != expected {
        if bless_enabled() {
            bless_fixture_dir(after, &files);
            return;
        }
        assert_files_eq(&files, &expected);
    }
}

fn bless_enabled() -> bool {
    let Ok(val) = env::var("BLESS") else {
        return false;
    };
    let val = val.trim().to_ascii_lowercase();
    !(val.is_empty() || val == "0" || val == "false")
}

fn bless_fixture_dir(dir: &Path, files: &BTreeMap<FileId, String>) {
    if dir.exists() {
        fs::remove_dir_all(dir).unwrap_or_else(|err| {
            panic!(
                "failed to remove existing fixture dir {}: {err}",
                dir.display()
            )
        });
    }
    for (file, text) in files {
        let rel = file.as_str().trim_start_matches('/');
        assert!(
            rel.split('/').all(|part| part != ".."),
            "fixture paths must not contain '..': {rel}"
        );
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|err| {
                panic!("failed to create fixture dir {}: {err}", parent.display())
            });
        }
        fs::write(&path, text)
            .unwrap_or_else(|err| panic!("failed to write fixture {}: {err}", path.display()));
    }
    tracing::info!(dir = %dir.display(), files = files.len(), "blessed fixture dir");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markers_keeps_macro_metavariables() {
        let input = "macro_rules! m { ($x:expr) => { $x } }\nfn $0f() {}";
        let (text, markers) = strip_markers(input);

        assert_eq!(text, "macro_rules! m { ($x:expr) => { $x } }\nfn f() {}");
        assert_eq!(markers, vec![(0, text.find("f()").unwrap())]);
    }

    #[test]
    fn fixture_splits_files_and_records_markers() {
        let fixture = Fixture::parse("//- /src/lib.rs\nmod a;\n//- src/a.rs\npub struct $1S;");

        assert_eq!(fixture.text("/src/lib.rs"), "mod a;\n");
        assert_eq!(fixture.text("/src/a.rs"), "pub struct S;\n");
        assert_eq!(fixture.marker_file(1), FileId::new("/src/a.rs"));
        assert_eq!(fixture.marker_offset(1), "pub struct ".len());
    }

    #[test]
    #[should_panic(expected = "duplicate fixture marker $0")]
    fn duplicate_marker_ids_panic() {
        let _ = Fixture::parse("//- /a.rs\n$0\n//- /b.rs\n$0");
    }

    #[test]
    fn layout_normalization_ignores_indentation_and_blank_lines() {
        assert_eq!(
            normalize_layout("  fn a() {}\n\n\tfn b() {}   \n"),
            "fn a() {}\nfn b() {}\n"
        );
    }
}
