// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the quire-core page model and history manager.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use quire_core::{Dims, Page, PageTransform, Session, Sides};

/// Benchmark the rotation/crop composition rule over a long angle walk.
fn bench_rotation_algebra(c: &mut Criterion) {
    c.bench_function("rotate 1000 quarter turns", |b| {
        b.iter(|| {
            let mut page = Page::new(1, 1, Dims::new(595.0, 842.0));
            page.crop = Sides::new(0.1, 0.2, 0.3, 0.4);
            for _ in 0..1000 {
                page.rotate(black_box(90));
            }
            black_box(page.crop);
        });
    });
}

/// Benchmark commit/undo churn over a 100-page sequence, the snapshot-heavy
/// path an interactive editing session exercises.
fn bench_history_churn(c: &mut Criterion) {
    c.bench_function("commit+undo on 100 pages", |b| {
        b.iter(|| {
            let mut session = Session::new();
            for n in 0..100 {
                session.push(Page::new(1, n + 1, Dims::new(595.0, 842.0)));
            }
            for _ in 0..20 {
                session.commit("Rotate");
                session
                    .rotate_pages(&[0], 90)
                    .expect("rotate in range");
            }
            for _ in 0..20 {
                session.undo();
            }
            black_box(session.len());
        });
    });
}

criterion_group!(benches, bench_rotation_algebra, bench_history_churn);
criterion_main!(benches);
