//! Benchmarks for reply classification, rendering, and reveal stepping.
//!
//! Classification and rendering run once per reply; the reveal runs once per
//! character, so its per-tick cost bounds how fast long replies can be shown.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use triage_core::types::{RawDiagnosis, RawResponse};
use triage_session::{classify, render, Reveal, RevealPacing};

/// A diagnosis payload with every list populated.
fn full_diagnosis(index: usize) -> RawResponse {
    let list = |prefix: &str, n: usize| -> Option<Vec<String>> {
        Some((0..n).map(|i| format!("{} item {} ({})", prefix, i, index)).collect())
    };
    RawResponse::new()
        .with_diagnosis(RawDiagnosis {
            condition: Some(format!("Influenza variant {}", index)),
            probability: Some(0.82),
            recommendations: list("Recommendation", 3),
            medical_tests: list("Test", 4),
            medication: list("Medication", 3),
            lifestyle: list("Lifestyle", 5),
            precautions: list("Precaution", 4),
        })
        .with_severity_score(6.5)
        .with_home_remedy("Rest, warm fluids, and honey with ginger tea.")
}

fn bench_classify_and_render(c: &mut Criterion) {
    let payloads: Vec<RawResponse> = (0..100).map(full_diagnosis).collect();

    let mut group = c.benchmark_group("reply");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("classify_full_diagnosis", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let raw = payloads[idx % payloads.len()].clone();
            idx += 1;
            black_box(classify(raw))
        });
    });

    let classified: Vec<_> = payloads
        .iter()
        .cloned()
        .filter_map(|raw| classify(raw).ok())
        .collect();
    group.bench_function("render_full_diagnosis", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let response = &classified[idx % classified.len()];
            idx += 1;
            black_box(render(response))
        });
    });

    group.finish();
}

fn bench_reveal(c: &mut Criterion) {
    let text = classify(full_diagnosis(0))
        .map(|response| render(&response))
        .unwrap_or_default();
    let pacing = RevealPacing::instant();

    let mut group = c.benchmark_group("reveal");
    group.bench_function("step_full_reply", |b| {
        b.iter(|| {
            let reveal = Reveal::new(black_box(&text), &pacing);
            black_box(reveal.count())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_classify_and_render, bench_reveal);
criterion_main!(benches);
