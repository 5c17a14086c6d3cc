//! Live edit benchmark suite.
//!
//! Benchmarks the hot paths of a live edit:
//! - Diffing a text node's old and new value
//! - Scanning HTML source into node payloads
//! - A protocol call round trip over the in-memory transport
//!
//! Run with: cargo bench --bench live_edit
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

use livedev_bridge::agents::compute_diff;
use livedev_bridge::agents::dom::each_node;
use livedev_bridge::{Inspector, InspectorConfig, MemoryTransport};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const TEXT_LENGTHS: &[usize] = &[64, 1_024, 16_384];
const PARAGRAPH_COUNTS: &[usize] = &[10, 100, 1_000];

// ============================================================================
// Fixtures
// ============================================================================

fn sample_text(len: usize) -> String {
    "lorem ipsum dolor sit amet ".chars().cycle().take(len).collect()
}

fn sample_page(paragraphs: usize) -> String {
    let mut html = String::from("<!DOCTYPE html><html><head><style>p { margin: 0 }</style></head><body>");
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p class=\"para\" data-index=\"{i}\">Paragraph <em>{i}</em></p><!-- {i} -->\n"
        ));
    }
    html.push_str("<script>window.ready = true;</script></body></html>");
    html
}

// ============================================================================
// Benchmark: Text Diff
// ============================================================================

fn bench_compute_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_diff");

    for &len in TEXT_LENGTHS {
        let old = sample_text(len);
        let mut new = old.clone();
        new.insert_str(len / 2, "brave ");

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("insert_middle", len), &len, |b, _| {
            b.iter(|| compute_diff(black_box(&old), black_box(&new)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: HTML Scan
// ============================================================================

fn bench_each_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("each_node");

    for &count in PARAGRAPH_COUNTS {
        let html = sample_page(count);

        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("paragraphs", count), &html, |b, html| {
            b.iter(|| {
                let mut nodes = 0usize;
                each_node(black_box(html), |_| nodes += 1);
                nodes
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Call Round Trip
// ============================================================================

fn bench_call_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let inspector = rt.block_on(async {
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());
        inspector.connect("memory://bench").await.expect("connect");
        Arc::new(peer).spawn_responder(|_| Ok(json!({ "ok": true })));
        inspector
    });

    c.bench_function("call_round_trip", |b| {
        b.to_async(&rt).iter(|| async {
            inspector
                .call("Runtime", "evaluate", json!({ "expression": "1" }))
                .await
                .expect("call")
        });
    });
}

criterion_group!(
    benches,
    bench_compute_diff,
    bench_each_node,
    bench_call_round_trip
);
criterion_main!(benches);
