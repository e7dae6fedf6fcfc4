use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::rc::Rc;
use tagtree::{Cursor, MergeCursor, MergeOptions, ValueStore};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;

fn build_json(offset: usize) -> String {
    let entries: Vec<String> = (0..N_KEYS)
        .map(|i| format!(r#""key{}": {{"id": {}, "tags": ["x", "y"]}}"#, i, i + offset))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn build_root(name: &str, offset: usize) -> Cursor {
    let store = ValueStore::from_json(name, &build_json(offset)).unwrap();
    Cursor::root(&Rc::new(store))
}

fn json_build_benchmark(c: &mut Criterion) {
    let text = build_json(0);
    c.bench_function("store_from_json_10k", |b| {
        b.iter(|| ValueStore::from_json("bench", &text).unwrap());
    });
}

fn keyed_lookup_benchmark(c: &mut Criterion) {
    let root = build_root("bench", 0);
    // first lookup builds the sorted key index
    assert!(root.get_elem("key0").is_valid());

    c.bench_function("cursor_get_elem_by_key_10k", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("key{}", i % N_KEYS);
            i += 1;
            root.get_elem(key.as_str()).get_elem("id").get(0i32)
        });
    });
}

fn merged_lookup_benchmark(c: &mut Criterion) {
    let stack = vec![build_root("base", 0), build_root("overlay", N_KEYS)];
    let merged = MergeCursor::from_stack(stack, MergeOptions::default().with_level(2)).into_cursor();
    assert_eq!(merged.size(), N_KEYS);

    c.bench_function("merge_cursor_get_elem_depth2_10k", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("key{}", i % N_KEYS);
            i += 1;
            merged.get_elem(key.as_str()).get_elem("tags").size()
        });
    });
}

fn save_open_benchmark(c: &mut Criterion) {
    let store = ValueStore::from_json("bench", &build_json(0)).unwrap();

    c.bench_function("store_save_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.ttr");
                (dir, path)
            },
            |(_dir, path)| store.save(&path).unwrap(),
            BatchSize::SmallInput,
        );
    });

    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.ttr");
    store.save(&path).unwrap();

    c.bench_function("store_open_10k", |b| {
        b.iter(|| ValueStore::open(&path).unwrap());
    });
}

criterion_group!(
    benches,
    json_build_benchmark,
    keyed_lookup_benchmark,
    merged_lookup_benchmark,
    save_open_benchmark
);
criterion_main!(benches);
