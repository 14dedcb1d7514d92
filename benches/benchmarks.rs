//! Performance benchmarks for engine-agent
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use engine_agent::api::DesiredConfiguration;
use engine_agent::engine::{extract, validate, Engine, EngineSet, Payload};
use engine_agent::monitoring::{export_prometheus, Monitor};
use serde_json::{json, Value};

fn desired_document(inbounds: usize) -> Payload {
    let inbounds: Vec<Value> = (0..inbounds)
        .map(|i| {
            json!({
                "type": "vless",
                "tag": format!("vless-{}", i),
                "listen": "::",
                "listen_port": 10000 + i,
                "users": [{"uuid": format!("00000000-0000-0000-0000-{:012}", i)}]
            })
        })
        .collect();

    json!({
        "singbox": {"log": {"level": "warn"}, "inbounds": inbounds, "outbounds": [{"type": "direct"}]},
        "awg2": {"interface": {"address": "10.8.0.1/24", "listen_port": 51820}, "peers": []}
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn bench_extract(c: &mut Criterion) {
    let doc = desired_document(32);

    c.bench_function("extract_singbox", |b| {
        b.iter(|| extract(black_box(&doc), Engine::Singbox));
    });
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for size in [1, 32, 512] {
        let doc = desired_document(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| validate(black_box(doc), EngineSet::new(true, true)));
        });
    }

    group.finish();
}

fn bench_desired_config_parsing(c: &mut Criterion) {
    let body = json!({
        "node_id": "node-1",
        "desired_config_revision": 42,
        "applied_config_revision": 41,
        "engine_awg2_enabled": true,
        "engine_singbox_enabled": true,
        "desired_config": desired_document(64)
    })
    .to_string();

    c.bench_function("desired_config_parsing", |b| {
        b.iter(|| serde_json::from_str::<DesiredConfiguration>(black_box(&body)));
    });
}

fn bench_metrics_export(c: &mut Criterion) {
    let monitor = Monitor::new();
    monitor.record_heartbeat(true);
    monitor.record_fetch(42);
    monitor.record_apply(42, true, false);

    c.bench_function("metrics_export", |b| {
        b.iter(|| export_prometheus(black_box(&monitor.stats())));
    });
}

criterion_group!(
    benches,
    bench_extract,
    bench_validate,
    bench_desired_config_parsing,
    bench_metrics_export
);
criterion_main!(benches);
