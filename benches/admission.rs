//! Performance benchmarks for the admission pipeline.
//!
//! Run with: `cargo bench --bench admission`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Cold credential resolution | <1ms p99 | Full signature check |
//! | Cached credential resolution | <10us p99 | LRU cache hit |
//! | Parse + gate | <100us p99 | Scales with query size |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use query_gateway::{parse_document, CacheConfig, IdentityResolver, QueryGate, QueryLimits};

const SECRET: &[u8] = b"benchmark_secret_32_bytes_min___";

/// Create a signed bearer header.
fn bearer(sub: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({ "sub": sub, "iat": now, "exp": now + 3600 });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .unwrap_or_else(|e| panic!("failed to sign bench token: {e}"));
    format!("Bearer {token}")
}

/// Build a query nested `levels` deep.
fn nested(levels: usize) -> String {
    let mut query = String::new();
    for i in 1..=levels {
        query.push_str(&format!("{{ f{i} "));
    }
    query.push_str(&"}".repeat(levels));
    query
}

/// Build a flat query with `width` root fields.
fn flat(width: usize) -> String {
    let mut query = String::from("{ ");
    for i in 0..width {
        query.push_str(&format!("f{i} "));
    }
    query.push('}');
    query
}

/// Benchmark cold credential resolution (no cache).
fn bench_cold_resolution(c: &mut Criterion) {
    let resolver = IdentityResolver::hs256(SECRET);
    let header = bearer("bench_user");

    let mut group = c.benchmark_group("cold_resolution");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hs256", |b| {
        b.iter(|| {
            let claims = resolver.resolve(black_box(Some(&header)));
            assert!(matches!(claims, Ok(Some(_))));
            claims
        })
    });
    group.finish();
}

/// Benchmark cached credential resolution.
fn bench_cached_resolution(c: &mut Criterion) {
    let resolver = IdentityResolver::hs256(SECRET).with_cache(CacheConfig::default());
    let header = bearer("bench_user");

    // Warm the cache.
    let _ = resolver.resolve(Some(&header));

    let mut group = c.benchmark_group("cached_resolution");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hs256", |b| {
        b.iter(|| {
            let claims = resolver.resolve(black_box(Some(&header)));
            assert!(matches!(claims, Ok(Some(_))));
            claims
        })
    });
    group.finish();
}

/// Benchmark parsing across query sizes.
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for width in [1, 10, 50, 100] {
        let query = flat(width);
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("fields", width), &query, |b, query| {
            b.iter(|| parse_document(black_box(query)))
        });
    }
    group.finish();
}

/// Benchmark the shape gate across nesting depths.
fn bench_gate(c: &mut Criterion) {
    let limits = QueryLimits {
        max_depth: 64,
        ..QueryLimits::default()
    };
    let gate = QueryGate::new(limits);

    let mut group = c.benchmark_group("gate");

    for depth in [1, 5, 20] {
        let document = parse_document(&nested(depth))
            .unwrap_or_else(|e| panic!("bench query failed to parse: {e}"));
        group.bench_with_input(BenchmarkId::new("depth", depth), &document, |b, doc| {
            b.iter(|| gate.check(black_box(doc)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cold_resolution,
    bench_cached_resolution,
    bench_parse,
    bench_gate
);
criterion_main!(benches);
