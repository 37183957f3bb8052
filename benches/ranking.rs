//! Benchmarks for similarity ranking.
//!
//! Ranks synthetic catalogs of 100, 1,000 and 10,000 descriptors against a
//! query, and measures the full query path over an in-memory catalog.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use image::{ImageFormat, Rgb, RgbImage};
use std::hint::black_box;
use std::io::Cursor;

use glimpse::config::GlimpseConfig;
use glimpse::models::{DescriptorRecord, ImageUpload};
use glimpse::{
    Candidate, CatalogBackend, CatalogItem, Descriptor, Extractor, ServiceContainer,
    SimilarityMatcher,
};

const FEATURE_SIZE: usize = 512;

// ============================================================================
// Helper Functions
// ============================================================================

/// Deterministic pseudo-random descriptor (LCG).
fn synthetic_descriptor(seed: usize) -> Descriptor {
    let mut state = (seed as u64).wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    let values = (0..FEATURE_SIZE)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 40) as f32) / ((1u64 << 24) as f32)
        })
        .collect();
    Descriptor::new(values)
}

fn candidates(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| Candidate::new(format!("sku-{i}"), synthetic_descriptor(i)))
        .collect()
}

fn query_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::from_fn(128, 128, |x, _| Rgb([x as u8, 90, 200]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_rank(c: &mut Criterion) {
    let matcher = SimilarityMatcher::default();
    let query = synthetic_descriptor(usize::MAX);
    let mut group = c.benchmark_group("rank");

    for count in [100usize, 1_000, 10_000] {
        let catalog = candidates(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &catalog, |b, catalog| {
            b.iter(|| matcher.rank(black_box(&query), black_box(catalog)));
        });
    }

    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let a = synthetic_descriptor(1);
    let b_vec = synthetic_descriptor(2);

    c.bench_function("cosine_similarity_512", |b| {
        b.iter(|| {
            SimilarityMatcher::similarity(
                Some(black_box(a.as_slice())),
                Some(black_box(b_vec.as_slice())),
            )
        });
    });
}

fn bench_query_path(c: &mut Criterion) {
    let services = ServiceContainer::in_memory(&GlimpseConfig::default()).unwrap();
    let backend = services.catalog_backend();
    let space = services.extractor().feature_space();
    for i in 0..1_000 {
        let item = CatalogItem::new(format!("sku-{i}"), format!("Product {i}"));
        backend.upsert_item(&item).unwrap();
        backend
            .store_descriptor(
                &item.id,
                &DescriptorRecord::new(synthetic_descriptor(i), space),
            )
            .unwrap();
    }

    let search = services.search();
    let upload = ImageUpload::Raw(query_png());

    let mut group = c.benchmark_group("query_path");
    group.sample_size(20);
    group.bench_function("1000_items", |b| {
        b.iter(|| search.search(black_box(&upload)));
    });
    group.finish();
}

criterion_group!(benches, bench_rank, bench_similarity, bench_query_path);
criterion_main!(benches);
