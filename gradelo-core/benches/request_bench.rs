//! Benchmarks for request building
//!
//! Compares small and large parameter sets for GET and POST encoding.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use url::Url;

use gradelo_core::{HitType, HttpMethod, Params, RequestBuilder};

fn make_params(count: usize) -> Params {
    (0..count)
        .map(|i| (format!("param_{}", i), format!("value {} & more", i)))
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let builder = RequestBuilder::new(
        Url::parse("https://collect.example.com/v1/").unwrap(),
        HttpMethod::Get,
    );
    let now = Utc::now();

    let mut group = c.benchmark_group("build");
    for count in [0usize, 8, 64] {
        let params = make_params(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &params, |b, params| {
            b.iter(|| {
                builder
                    .build(
                        black_box(HitType::Event),
                        "site-42",
                        "3f1c2a6e-9b7d-4c1e-8a55-0d2f6b9e7c41",
                        params,
                        now,
                    )
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let request = RequestBuilder::new(
        Url::parse("https://collect.example.com/v1/").unwrap(),
        HttpMethod::Post,
    )
    .build(HitType::Pageview, "site-42", "client", &make_params(32), Utc::now())
    .unwrap();

    c.bench_function("query_string", |b| b.iter(|| black_box(&request).query_string()));
    c.bench_function("url_with_query", |b| b.iter(|| black_box(&request).url_with_query()));
}

criterion_group!(benches, bench_build, bench_encode);
criterion_main!(benches);
