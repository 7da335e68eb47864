use std::collections::BTreeMap;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rustle_config::MoveConfig;
use rustle_refactor::{
    move_items, CancellationToken, ElementToMove, FileId, MoveProcessor, MoveRequest,
};
use rustle_resolve::{Analysis, Def};

fn configure_rayon() {
    // Criterion's statistics use Rayon too; keep the pool small on constrained hosts.
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if std::env::var_os("RAYON_NUM_THREADS").is_none() {
            std::env::set_var("RAYON_NUM_THREADS", "1");
        }
    });
}

fn criterion_config() -> Criterion {
    configure_rayon();
    Criterion::default().configure_from_args()
}

/// A crate with `users` modules that each reach `crate::a::S` in a different style.
fn workspace(users: usize) -> BTreeMap<FileId, String> {
    let mut lib = String::from("mod a;\nmod b;\n");
    let mut files = BTreeMap::new();
    for idx in 0..users {
        lib.push_str(&format!("mod user{idx};\n"));
        let text = match idx % 3 {
            0 => format!("use crate::a::S;\n\npub fn f{idx}(s: S) -> S {{\n    s\n}}\n"),
            1 => format!("use crate::a;\n\npub fn f{idx}() -> a::S {{\n    a::S::new()\n}}\n"),
            _ => format!("pub fn f{idx}() -> crate::a::S {{\n    crate::a::S::new()\n}}\n"),
        };
        files.insert(FileId::new(format!("/src/user{idx}.rs")), text);
    }
    files.insert(FileId::new("/src/lib.rs"), lib);
    files.insert(
        FileId::new("/src/a.rs"),
        "pub struct S;\n\nimpl S {\n    pub fn new() -> Self {\n        S\n    }\n}\n".to_string(),
    );
    files.insert(FileId::new("/src/b.rs"), String::new());
    files
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess_usages");
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(20);

    for users in [10usize, 100] {
        let analysis = Analysis::new(workspace(users));
        let b = analysis.module_by_path("crate::b").expect("target exists");
        let Ok(Def::Item(s)) = analysis.def_by_path("crate::a::S") else {
            panic!("crate::a::S is an item");
        };
        let processor =
            MoveProcessor::new(analysis, vec![ElementToMove::Item(s)], b, &MoveConfig::default())
                .expect("valid move");
        let token = CancellationToken::default();
        group.bench_with_input(BenchmarkId::from_parameter(users), &processor, |bench, processor| {
            bench.iter(|| {
                let usages = processor.find_usages();
                black_box(processor.preprocess_usages(&usages, &token).expect("not cancelled"))
            })
        });
    }
    group.finish();
}

fn bench_move_items(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_items");
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(20);

    let request = MoveRequest {
        items: vec!["crate::a::S".to_string()],
        target: "crate::b".to_string(),
    };
    let config = MoveConfig::default();
    for users in [10usize, 100] {
        let files = workspace(users);
        group.bench_with_input(BenchmarkId::from_parameter(users), &files, |bench, files| {
            bench.iter_batched(
                || files.clone(),
                |files| black_box(move_items(files, &request, &config).expect("move succeeds")),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_preprocess, bench_move_items
}
criterion_main!(benches);
