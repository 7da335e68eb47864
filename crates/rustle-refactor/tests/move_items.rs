use std::path::Path;

use pretty_assertions::assert_eq;
use rustle_config::MoveConfig;
use rustle_refactor::{
    move_items, CancellationToken, Cancelled, ConflictKind, ElementToMove, FileId, MoveError,
    MoveProcessor, MoveRequest, ReferenceKind, ResolveError, VisibilityChange,
};
use rustle_resolve::{Analysis, Def};
use rustle_test_utils::{
    assert_files_eq, assert_files_eq_fixture, assert_fixture_transformed, files_to_map,
    normalize_layout,
};

fn request(items: &[&str], target: &str) -> MoveRequest {
    MoveRequest {
        items: items.iter().map(|item| item.to_string()).collect(),
        target: target.to_string(),
    }
}

#[test]
fn private_struct_is_widened_and_absolute_paths_follow_it() {
    let files = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\n"),
        (
            "/src/a.rs",
            "struct S;\n\nmod c {\n    fn g() -> crate::a::S {\n        crate::a::S\n    }\n}\n",
        ),
        ("/src/b.rs", ""),
    ]);

    let outcome = move_items(files, &request(&["crate::a::S"], "crate::b"), &MoveConfig::default())
        .expect("move succeeds");

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
mod a;
mod b;
//- /src/a.rs
mod c {
    fn g() -> crate::b::S {
        crate::b::S
    }
}
//- /src/b.rs
pub struct S;
"#,
    );
    assert_eq!(outcome.moved, vec!["crate::b::S".to_string()]);
    assert_eq!(outcome.visibility_changes, 1);
    assert!(outcome.unresolved_conflicts.is_empty());
}

#[test]
fn visibility_conflict_offers_pub() {
    let analysis = Analysis::from_files([
        ("/src/lib.rs", "mod a;\nmod b;\n"),
        (
            "/src/a.rs",
            "struct S;\n\nmod c {\n    fn g() -> crate::a::S {\n        crate::a::S\n    }\n}\n",
        ),
        ("/src/b.rs", ""),
    ]);
    let b = analysis.module_by_path("crate::b").unwrap();
    let Def::Item(s) = analysis.def_by_path("crate::a::S").unwrap() else {
        panic!("expected an item");
    };
    let processor =
        MoveProcessor::new(analysis, vec![ElementToMove::Item(s)], b, &MoveConfig::default())
            .unwrap();
    let usages = processor.find_usages();
    let preprocessed = processor
        .preprocess_usages(&usages, &CancellationToken::default())
        .unwrap();

    let conflicts = preprocessed.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Visibility);
    let fix = conflicts[0].fix.as_ref().expect("a fix is offered");
    assert_eq!(fix.target, Def::Item(s));
    assert_eq!(fix.change, VisibilityChange::Pub);
}

#[test]
fn import_in_the_target_module_is_dropped() {
    let files = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\n"),
        ("/src/a.rs", "pub fn helper() {}\n"),
        (
            "/src/b.rs",
            "use crate::a::helper;\n\npub fn run() {\n    helper();\n}\n",
        ),
    ]);

    let outcome = move_items(
        files,
        &request(&["crate::a::helper"], "crate::b"),
        &MoveConfig::default(),
    )
    .unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
mod a;
mod b;
//- /src/a.rs
//- /src/b.rs
pub fn run() {
    helper();
}

pub fn helper() {}
"#,
    );
    assert_eq!(outcome.visibility_changes, 0);
}

#[test]
fn references_from_the_target_become_bare_names() {
    let analysis = Analysis::from_files([
        ("/src/lib.rs", "mod a;\nmod b;\n"),
        ("/src/a.rs", "pub fn helper() {}\n"),
        (
            "/src/b.rs",
            "use crate::a::helper;\n\npub fn run() {\n    helper();\n}\n",
        ),
    ]);
    let b = analysis.module_by_path("crate::b").unwrap();
    let Def::Item(helper) = analysis.def_by_path("crate::a::helper").unwrap() else {
        panic!("expected an item");
    };
    let processor = MoveProcessor::new(
        analysis,
        vec![ElementToMove::Item(helper)],
        b,
        &MoveConfig::default(),
    )
    .unwrap();
    let usages = processor.find_usages();
    let preprocessed = processor
        .preprocess_usages(&usages, &CancellationToken::default())
        .unwrap();

    let inside = preprocessed.inside_references();
    assert_eq!(inside.len(), 2);
    assert!(inside.iter().all(|info| info.force_replace_directly));
    assert!(inside
        .iter()
        .all(|info| info.path_new_accessible.as_deref() == Some("helper")));
    assert_eq!(inside[0].kind, ReferenceKind::UsePath);
    assert_eq!(inside[1].kind, ReferenceKind::Path);
}

#[test]
fn grouped_import_is_split() {
    let files = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\nmod c;\n"),
        ("/src/a.rs", "pub struct X;\npub struct Y;\n"),
        ("/src/b.rs", ""),
        (
            "/src/c.rs",
            "use crate::a::{X, Y};\n\npub fn f(x: X, y: Y) {}\n",
        ),
    ]);

    let outcome =
        move_items(files, &request(&["crate::a::X"], "crate::b"), &MoveConfig::default()).unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
mod a;
mod b;
mod c;
//- /src/a.rs
pub struct Y;
//- /src/b.rs
pub struct X;
//- /src/c.rs
use crate::a::Y;
use crate::b::X;

pub fn f(x: X, y: Y) {}
"#,
    );
}

#[test]
fn qualified_paths_keep_their_length_and_import_the_qualifier() {
    let files = files_to_map([(
        "/src/lib.rs",
        r#"pub mod a {
    pub struct S;
}
pub mod b {
    pub mod deep {
        pub mod inner {}
    }
}
mod c {
    use crate::a;

    fn f() -> a::S {
        a::S
    }
}
"#,
    )]);

    let outcome = move_items(
        files,
        &request(&["crate::a::S"], "crate::b::deep::inner"),
        &MoveConfig::default(),
    )
    .unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
pub mod a {
}
pub mod b {
    pub mod deep {
        pub mod inner {
            pub struct S;
        }
    }
}
mod c {
    use crate::a;
    use crate::b::deep::inner;

    fn f() -> inner::S {
        inner::S
    }
}
"#,
    );
}

#[test]
fn without_style_preservation_paths_are_spelled_out() {
    let files = files_to_map([(
        "/src/lib.rs",
        r#"pub mod a {
    pub struct S;
}
pub mod b {
    pub mod deep {
        pub mod inner {}
    }
}
mod c {
    use crate::a;

    fn f() -> a::S {
        a::S
    }
}
"#,
    )]);
    let config = MoveConfig {
        keep_existing_style: false,
        ..MoveConfig::default()
    };

    let outcome = move_items(
        files,
        &request(&["crate::a::S"], "crate::b::deep::inner"),
        &config,
    )
    .unwrap();

    let lib = &outcome.files[&FileId::new("/src/lib.rs")];
    assert!(lib.contains("fn f() -> crate::b::deep::inner::S {"));
    assert!(!lib.contains("use crate::b::deep::inner;"));
}

#[test]
fn colliding_qualifier_widens_the_kept_path() {
    let files = files_to_map([(
        "/src/lib.rs",
        r#"pub mod a {
    pub fn f() {}
}
pub mod b {
    pub mod util {}
}
mod c {
    use crate::a;

    struct util;

    fn g() {
        a::f();
    }
}
"#,
    )]);

    let outcome = move_items(
        files,
        &request(&["crate::a::f"], "crate::b::util"),
        &MoveConfig::default(),
    )
    .unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
pub mod a {
}
pub mod b {
    pub mod util {
        pub fn f() {}
    }
}
mod c {
    use crate::a;
    use crate::b;

    struct util;

    fn g() {
        b::util::f();
    }
}
"#,
    );
}

#[test]
fn qualified_function_calls_keep_two_segments() {
    let files = files_to_map([(
        "/src/lib.rs",
        r#"pub mod a {
    pub fn f() {}
}
pub mod b {
    pub mod deep {
        pub mod inner {}
    }
}
mod c {
    use crate::a;

    fn g() {
        a::f();
    }
}
"#,
    )]);

    let outcome = move_items(
        files,
        &request(&["crate::a::f"], "crate::b::deep::inner"),
        &MoveConfig::default(),
    )
    .unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
pub mod a {
}
pub mod b {
    pub mod deep {
        pub mod inner {
            pub fn f() {}
        }
    }
}
mod c {
    use crate::a;
    use crate::b::deep::inner;

    fn g() {
        inner::f();
    }
}
"#,
    );
}

#[test]
fn bare_call_from_the_source_module_is_qualified_by_the_target() {
    let files = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\n"),
        ("/src/a.rs", "pub fn f() {}\n\npub fn g() {\n    f();\n}\n"),
        ("/src/b.rs", ""),
    ]);

    let outcome =
        move_items(files, &request(&["crate::a::f"], "crate::b"), &MoveConfig::default()).unwrap();

    assert_files_eq_fixture(
        &outcome.files,
        r#"
//- /src/lib.rs
mod a;
mod b;
//- /src/a.rs
use crate::b;

pub fn g() {
    b::f();
}
//- /src/b.rs
pub fn f() {}
"#,
    );
}

#[test]
fn paths_that_still_reach_the_moved_item_are_left_alone() {
    let lib = "mod a;\nmod b;\n\npub fn make() -> b::S {\n    b::S\n}\n";
    let files = files_to_map([
        ("/src/lib.rs", lib),
        ("/src/a.rs", "pub struct S;\n"),
        ("/src/b.rs", "pub use crate::a::S;\n"),
    ]);

    let outcome =
        move_items(files, &request(&["crate::a::S"], "crate::b"), &MoveConfig::default()).unwrap();

    let lib_file = FileId::new("/src/lib.rs");
    assert_eq!(outcome.files[&lib_file], lib);
    assert_eq!(
        normalize_layout(&outcome.files[&FileId::new("/src/b.rs")]),
        "pub struct S;\n"
    );

    let analysis = Analysis::new(outcome.files);
    let moved = analysis.def_by_path("crate::b::S").unwrap();
    let offset = lib.find("b::S").unwrap();
    let path = analysis.path_at(&lib_file, offset).expect("path in the signature");
    assert_eq!(analysis.resolve_path(path), Some(moved));
}

fn round_trip_files() -> std::collections::BTreeMap<FileId, String> {
    files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\nmod c;\n"),
        ("/src/a.rs", "pub struct S;\n"),
        ("/src/b.rs", ""),
        (
            "/src/c.rs",
            "pub fn f() -> crate::a::S {\n    crate::a::S\n}\n",
        ),
    ])
}

#[test]
fn moving_back_restores_the_original_text() {
    let original = round_trip_files();
    let config = MoveConfig::default();

    let there = move_items(original.clone(), &request(&["crate::a::S"], "crate::b"), &config)
        .unwrap();
    assert_eq!(
        there.files[&FileId::new("/src/c.rs")],
        "pub fn f() -> crate::b::S {\n    crate::b::S\n}\n"
    );

    let back = move_items(there.files, &request(&["crate::b::S"], "crate::a"), &config).unwrap();
    assert_eq!(back.files, original);
}

#[test]
fn outcome_previews_every_changed_file() {
    let original = round_trip_files();
    let outcome = move_items(
        original.clone(),
        &request(&["crate::a::S"], "crate::b"),
        &MoveConfig::default(),
    )
    .unwrap();

    let preview = outcome.preview(&original).unwrap();
    let mut changed: Vec<&str> = preview.files.iter().map(|file| file.file.as_str()).collect();
    changed.sort();
    assert_eq!(changed, vec!["/src/a.rs", "/src/b.rs", "/src/c.rs"]);
}

#[test]
fn moved_file_module_is_renamed() {
    let files = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\n\npub use crate::a::m::f;\n"),
        ("/src/a.rs", "pub mod m;\n"),
        ("/src/a/m.rs", "pub fn f() {}\n"),
        ("/src/b.rs", ""),
    ]);

    let outcome =
        move_items(files, &request(&["crate::a::m"], "crate::b"), &MoveConfig::default()).unwrap();

    assert_eq!(
        outcome.renames,
        vec![(FileId::new("/src/a/m.rs"), FileId::new("/src/b/m.rs"))]
    );
    assert!(!outcome.files.contains_key(&FileId::new("/src/a/m.rs")));
    assert_eq!(outcome.files[&FileId::new("/src/b/m.rs")], "pub fn f() {}\n");
    assert_eq!(outcome.files[&FileId::new("/src/b.rs")], "pub mod m;\n");
    let lib = &outcome.files[&FileId::new("/src/lib.rs")];
    assert!(lib.contains("b::m::f;"));
    assert!(!lib.contains("a::m"));
}

#[test]
fn usages_are_found_in_a_stable_order() {
    let analysis = Analysis::new(round_trip_files());
    let b = analysis.module_by_path("crate::b").unwrap();
    let Def::Item(s) = analysis.def_by_path("crate::a::S").unwrap() else {
        panic!("expected an item");
    };
    let processor =
        MoveProcessor::new(analysis, vec![ElementToMove::Item(s)], b, &MoveConfig::default())
            .unwrap();

    let first = processor.find_usages();
    assert_eq!(first.len(), 2);
    assert_eq!(first, processor.find_usages());
}

#[test]
fn cancelled_preprocessing_stops() {
    let analysis = Analysis::new(round_trip_files());
    let b = analysis.module_by_path("crate::b").unwrap();
    let Def::Item(s) = analysis.def_by_path("crate::a::S").unwrap() else {
        panic!("expected an item");
    };
    let processor =
        MoveProcessor::new(analysis, vec![ElementToMove::Item(s)], b, &MoveConfig::default())
            .unwrap();
    let usages = processor.find_usages();

    let token = CancellationToken::default();
    token.cancel();
    let err = processor.preprocess_usages(&usages, &token).unwrap_err();
    assert_eq!(err, Cancelled);
}

#[test]
fn invalid_requests_are_rejected() {
    let config = MoveConfig::default();

    let err = move_items(round_trip_files(), &request(&["crate::a::S"], "crate::missing"), &config)
        .unwrap_err();
    assert_eq!(
        err,
        MoveError::Resolve(ResolveError::UnknownPath("crate::missing".to_string()))
    );

    let err = move_items(round_trip_files(), &request(&["crate::a::S"], "crate::a"), &config)
        .unwrap_err();
    assert_eq!(err, MoveError::SameSourceAndTarget("crate::a".to_string()));

    let err = move_items(round_trip_files(), &request(&[], "crate::b"), &config).unwrap_err();
    assert_eq!(err, MoveError::NoElements);
}

#[test]
fn fixture_struct_move() {
    let before = Path::new("tests/fixtures/move_struct/before");
    let after = Path::new("tests/fixtures/move_struct/after");
    assert_fixture_transformed(before, after, |files| {
        let outcome = move_items(
            files.clone(),
            &request(&["crate::a::S"], "crate::b"),
            &MoveConfig::default(),
        )
        .expect("move succeeds");
        *files = outcome.files;
    });
}

#[test]
fn layout_insensitive_comparison_matches_moved_files() {
    let outcome = move_items(
        round_trip_files(),
        &request(&["crate::a::S"], "crate::b"),
        &MoveConfig::default(),
    )
    .unwrap();
    let expected = files_to_map([
        ("/src/lib.rs", "mod a;\nmod b;\nmod c;\n"),
        ("/src/a.rs", ""),
        ("/src/b.rs", "pub struct S;\n"),
        (
            "/src/c.rs",
            "pub fn f() -> crate::b::S {\n    crate::b::S\n}\n",
        ),
    ]);
    assert_files_eq(&outcome.files, &expected);
}
