// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the upload hot path: filename sanitization and
// format classification run once per uploaded file.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printgate_document::{classify, sanitize_filename};

const NAMES: [&str; 4] = [
    "report.pdf",
    r"C:\Users\someone\Documents\Quarterly Report (final v2)!!.DOCX",
    "../../../../etc/passwd",
    "résumé – 2026.odt",
];

fn bench_sanitize(c: &mut Criterion) {
    c.bench_function("sanitize_filename (mixed)", |b| {
        b.iter(|| {
            for name in NAMES {
                black_box(sanitize_filename(black_box(name)));
            }
        });
    });
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify (mixed)", |b| {
        b.iter(|| {
            for name in NAMES {
                let _ = black_box(classify(black_box(name), Some("application/octet-stream")));
            }
        });
    });
}

criterion_group!(benches, bench_sanitize, bench_classify);
criterion_main!(benches);
