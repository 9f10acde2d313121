// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for [`aethonx_urlfilter::filter`] at archive-crawler-scale
//! URL volumes, to keep the full pipeline (normalize, dedup, score,
//! cluster, pattern-cap) cheap enough for high-volume sources.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aethonx_urlfilter::{filter, FilterConfig};

fn make_urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 5 {
            0 => format!("https://example.com/articles/{i}?utm_source=newsletter&ref=x"),
            1 => format!("https://example.com/users/{i}/profile.json"),
            2 => format!("https://example.com/static/app-{i}.css"),
            3 => format!("https://example.com/admin/users/{i}/edit"),
            _ => format!("https://example.com/api/v1/items/{i}"),
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_filter_pipeline");

    for n in [1_000usize, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || (make_urls(n), FilterConfig::default()),
                |(urls, config)| black_box(filter(&urls, &config)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
