//! History performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lh_journal::{LocalVcs, ManualClock, VcsConfig};
use std::sync::Arc;

fn config() -> VcsConfig {
    VcsConfig {
        case_sensitive: Some(true),
        ..VcsConfig::default()
    }
}

/// A project with `files` files, each edited `edits` times
fn build(files: usize, edits: usize) -> LocalVcs {
    let clock = ManualClock::new(0);
    let mut vcs = LocalVcs::in_memory(config(), Arc::new(clock.clone()));
    vcs.create_directory("project").unwrap();
    for f in 0..files {
        vcs.create_file(&format!("project/file{f}.rs"), b"start", 0, false)
            .unwrap();
    }
    for e in 0..edits {
        for f in 0..files {
            clock.advance(1);
            let bytes = format!("file {f} edit {e}");
            vcs.change_file_content(&format!("project/file{f}.rs"), bytes.as_bytes(), e as i64)
                .unwrap();
        }
    }
    vcs
}

fn bench_recording(c: &mut Criterion) {
    c.bench_function("record_content_changes_100", |b| {
        b.iter(|| black_box(build(10, 10)));
    });
}

fn bench_revisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("revisions_for");
    for edits in [10, 100] {
        let vcs = build(10, edits);
        group.bench_with_input(BenchmarkId::from_parameter(edits), &vcs, |b, vcs| {
            b.iter(|| black_box(vcs.revisions_for("project/file3.rs").unwrap()));
        });
    }
    group.finish();
}

fn bench_recent_changes(c: &mut Criterion) {
    let vcs = build(10, 50);
    c.bench_function("recent_changes", |b| {
        b.iter(|| black_box(vcs.recent_changes().unwrap()));
    });
}

criterion_group!(benches, bench_recording, bench_revisions, bench_recent_changes);
criterion_main!(benches);
